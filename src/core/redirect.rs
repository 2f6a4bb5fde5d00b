//! Bounce-through ("redirect") query parameter detection.
//!
//! Many pages funnel navigation through a tracking or login URL that carries
//! the real destination in a query parameter. Before resolving a URL against
//! the snapshot index it is scanned for such a parameter so the archive
//! lookup targets the page the user actually wanted.
use url::Url;

/// Candidate parameter names, checked in order. The first candidate whose
/// value is an absolute URL or an absolute path wins; later matches are
/// never considered.
const REDIRECT_PARAMS: [&str; 14] = [
    "redirect",
    "redir",
    "next",
    "url",
    "u",
    "dest",
    "destination",
    "forward",
    "return",
    "RelayState",
    "goto",
    "callback",
    "continue",
    "target",
];

/// Outcome of scanning a URL for an embedded bounce-through destination.
///
/// A URL that fails to parse yields `NotFound` rather than an error; the
/// caller degrades to the original URL. The explicit variant exists so that
/// callers (and tests) can branch on "no redirect" directly instead of
/// comparing strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectTarget {
    /// A candidate parameter encoded a real destination.
    Found(String),
    /// No candidate matched, or the input was not a parseable URL.
    NotFound,
}

/// Scan `raw`'s query string for a bounce-through destination.
///
/// Absolute `http`/`https` values are returned verbatim. Absolute-path
/// values are promoted to absolute URLs using the input's scheme and host.
/// Anything else is skipped and the next candidate is tried.
pub fn scan(raw: &str) -> RedirectTarget {
    let Ok(parsed) = Url::parse(raw) else {
        return RedirectTarget::NotFound;
    };

    for param in REDIRECT_PARAMS {
        let Some((_, value)) = parsed.query_pairs().find(|(key, _)| key == param) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }

        if value.starts_with("http://") || value.starts_with("https://") {
            return RedirectTarget::Found(value.into_owned());
        }

        if value.starts_with('/') {
            let host = parsed.host_str().unwrap_or("");
            let base = match parsed.port() {
                Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
                None => format!("{}://{}", parsed.scheme(), host),
            };
            return RedirectTarget::Found(format!("{base}{value}"));
        }
    }

    RedirectTarget::NotFound
}

/// Follow the first bounce-through parameter, or return the input unchanged.
pub fn follow(raw: &str) -> String {
    match scan(raw) {
        RedirectTarget::Found(destination) => destination,
        RedirectTarget::NotFound => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_absolute_url_value() {
        let result = scan("http://tracker.example/out?redirect=https://destination.example/page");
        assert_eq!(
            result,
            RedirectTarget::Found("https://destination.example/page".to_string())
        );
    }

    #[test]
    fn test_promotes_absolute_path_using_scheme_and_host() {
        let result = scan("https://login.example/sso?next=/account/home");
        assert_eq!(
            result,
            RedirectTarget::Found("https://login.example/account/home".to_string())
        );
    }

    #[test]
    fn test_promoted_path_keeps_explicit_port() {
        let result = scan("http://login.example:8081/sso?next=/home");
        assert_eq!(
            result,
            RedirectTarget::Found("http://login.example:8081/home".to_string())
        );
    }

    #[test]
    fn test_candidate_list_order_wins_over_document_order() {
        // "url" precedes "goto" in the candidate list even though "goto"
        // appears first in the query string
        let result = scan("http://a.example/?goto=https://second.example/&url=https://first.example/");
        assert_eq!(
            result,
            RedirectTarget::Found("https://first.example/".to_string())
        );
    }

    #[test]
    fn test_non_url_value_is_skipped_for_later_candidates() {
        let result = scan("http://a.example/?redirect=homepage&goto=https://real.example/");
        assert_eq!(
            result,
            RedirectTarget::Found("https://real.example/".to_string())
        );
    }

    #[test]
    fn test_no_candidate_parameters() {
        assert_eq!(
            scan("http://a.example/page?foo=bar&baz=qux"),
            RedirectTarget::NotFound
        );
    }

    #[test]
    fn test_unparseable_url_degrades_to_not_found() {
        assert_eq!(scan("not a url at all"), RedirectTarget::NotFound);
    }

    #[test]
    fn test_relay_state_is_case_sensitive() {
        assert_eq!(
            scan("http://idp.example/saml?RelayState=https://sp.example/"),
            RedirectTarget::Found("https://sp.example/".to_string())
        );
        assert_eq!(
            scan("http://idp.example/saml?relaystate=https://sp.example/"),
            RedirectTarget::NotFound
        );
    }

    #[test]
    fn test_follow_returns_input_when_nothing_matches() {
        let raw = "http://a.example/page?foo=bar";
        assert_eq!(follow(raw), raw);
    }

    #[test]
    fn test_follow_is_idempotent_on_redirect_free_output() {
        let followed = follow("http://tracker.example/out?u=https://plain.example/page");
        assert_eq!(followed, "https://plain.example/page");
        assert_eq!(follow(&followed), followed);
    }
}
