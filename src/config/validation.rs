use std::net::SocketAddr;

use eyre::Result;
use url::Url;

use crate::config::models::ProxyConfig;

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Invalid snapshot date '{date}': {reason}")]
    InvalidDate { date: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Proxy configuration validator
pub struct ProxyConfigValidator;

impl ProxyConfigValidator {
    /// Validate the entire proxy configuration
    pub fn validate(config: &ProxyConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        if let Err(e) = Self::validate_snapshot_date(&config.snapshot_date) {
            errors.push(e);
        }

        if let Err(e) =
            Self::validate_endpoint_url(&config.archive.cdx_endpoint, "archive.cdx_endpoint")
        {
            errors.push(e);
        }

        if let Err(e) = Self::validate_web_prefix(&config.archive.web_prefix) {
            errors.push(e);
        }

        if config.fixed_origin.host.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "fixed_origin.host".to_string(),
            });
        }

        if config.limits.max_body_bytes == 0 {
            errors.push(ValidationError::InvalidField {
                field: "limits.max_body_bytes".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '0.0.0.0:8080')".to_string(),
            });
        }
        Ok(())
    }

    /// Validate the 8-digit snapshot date as a real calendar date
    fn validate_snapshot_date(date: &str) -> ValidationResult<()> {
        if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidDate {
                date: date.to_string(),
                reason: "Must be 8 digits in YYYYMMDD format".to_string(),
            });
        }

        if chrono::NaiveDate::parse_from_str(date, "%Y%m%d").is_err() {
            return Err(ValidationError::InvalidDate {
                date: date.to_string(),
                reason: "Not a valid calendar date".to_string(),
            });
        }

        Ok(())
    }

    /// Validate an outbound endpoint URL
    fn validate_endpoint_url(url: &str, field: &str) -> ValidationResult<()> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ValidationError::InvalidField {
                field: field.to_string(),
                message: "Must start with http:// or https://".to_string(),
            });
        }

        if Url::parse(url).is_err() {
            return Err(ValidationError::InvalidField {
                field: field.to_string(),
                message: format!("Not a parseable URL: '{url}'"),
            });
        }

        Ok(())
    }

    /// Validate the capture URL prefix
    fn validate_web_prefix(prefix: &str) -> ValidationResult<()> {
        Self::validate_endpoint_url(prefix, "archive.web_prefix")?;

        if !prefix.ends_with('/') {
            return Err(ValidationError::InvalidField {
                field: "archive.web_prefix".to_string(),
                message: "Must end with '/' so capture timestamps can be appended".to_string(),
            });
        }

        Ok(())
    }

    /// Format multiple validation errors into a single message
    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.is_empty() {
            return "No errors".to_string();
        }

        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProxyConfig::default();
        assert!(ProxyConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_rejects_short_date() {
        let config = ProxyConfig {
            snapshot_date: "2002".to_string(),
            ..ProxyConfig::default()
        };
        let err = ProxyConfigValidator::validate(&config).unwrap_err();
        assert!(err.to_string().contains("YYYYMMDD"));
    }

    #[test]
    fn test_rejects_non_numeric_date() {
        let config = ProxyConfig {
            snapshot_date: "2002abcd".to_string(),
            ..ProxyConfig::default()
        };
        assert!(ProxyConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_rejects_impossible_calendar_date() {
        // February 30th never happened, not even in 2002
        let config = ProxyConfig {
            snapshot_date: "20020230".to_string(),
            ..ProxyConfig::default()
        };
        let err = ProxyConfigValidator::validate(&config).unwrap_err();
        assert!(err.to_string().contains("calendar"));
    }

    #[test]
    fn test_accepts_leap_day() {
        let config = ProxyConfig {
            snapshot_date: "20000229".to_string(),
            ..ProxyConfig::default()
        };
        assert!(ProxyConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_rejects_bad_listen_address() {
        let config = ProxyConfig {
            listen_addr: "not-an-address".to_string(),
            ..ProxyConfig::default()
        };
        let err = ProxyConfigValidator::validate(&config).unwrap_err();
        assert!(err.to_string().contains("listen address"));
    }

    #[test]
    fn test_rejects_web_prefix_without_trailing_slash() {
        let mut config = ProxyConfig::default();
        config.archive.web_prefix = "http://web.archive.org/web".to_string();
        assert!(ProxyConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_aggregates_multiple_errors() {
        let config = ProxyConfig {
            listen_addr: "nope".to_string(),
            snapshot_date: "xyz".to_string(),
            ..ProxyConfig::default()
        };
        let err = ProxyConfigValidator::validate(&config).unwrap_err();
        assert!(err.to_string().contains("2 validation errors"));
    }
}
