use crate::database::models::{NewCheckin, NewService, Service};
use crate::error::{CoreError, CoreResult};
use crate::monitoring::checker::CheckType;
use url::Url;

/// Validation results with specific error messages
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { is_valid: true, error: None }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { is_valid: false, error: Some(msg.into()) }
    }

    pub fn into_result(self) -> CoreResult<()> {
        if self.is_valid {
            Ok(())
        } else {
            Err(CoreError::Validation(self.error.unwrap_or_else(|| "Validation failed".to_string())))
        }
    }
}

/// Validate HTTP/HTTPS URL endpoint
pub fn validate_http_endpoint(target: &str) -> ValidationResult {
    if target.trim().is_empty() {
        return ValidationResult::err("Target cannot be empty");
    }

    match Url::parse(target) {
        Ok(url) => {
            let scheme = url.scheme();
            if scheme != "http" && scheme != "https" {
                return ValidationResult::err(format!(
                    "Invalid scheme '{scheme}'. Must be http or https"
                ));
            }

            if url.host_str().is_none() {
                return ValidationResult::err("URL must have a valid host");
            }

            ValidationResult::ok()
        }
        Err(e) => {
            if !target.contains("://") {
                ValidationResult::err("URL must include scheme (http:// or https://)")
            } else {
                ValidationResult::err(format!("Invalid URL: {e}"))
            }
        }
    }
}

/// Validate TCP endpoint (host:port format)
///
/// Only the shape is checked; the host is resolved when the check runs.
pub fn validate_tcp_endpoint(target: &str) -> ValidationResult {
    let target = target.trim();
    if target.is_empty() {
        return ValidationResult::err("Target cannot be empty");
    }

    let Some((host, port)) = target.rsplit_once(':') else {
        return ValidationResult::err("TCP target must be in format 'host:port'");
    };

    // Bracketed IPv6 literal, e.g. [::1]:80
    let host = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host);
    if host.is_empty() || host.contains(' ') {
        return ValidationResult::err("TCP target must be in format 'host:port'");
    }

    match port.parse::<u16>() {
        Ok(port) if port > 0 => ValidationResult::ok(),
        Ok(_) => ValidationResult::err("Port must be between 1 and 65535"),
        Err(_) => ValidationResult::err("Invalid port number"),
    }
}

/// Validate a target against its check type
pub fn validate_target(check_type: CheckType, target: &str) -> ValidationResult {
    match check_type {
        CheckType::Http => validate_http_endpoint(target),
        CheckType::Tcp => validate_tcp_endpoint(target),
    }
}

/// Validate service name
pub fn validate_name(name: &str) -> ValidationResult {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return ValidationResult::err("Name cannot be empty");
    }

    if trimmed.len() > 100 {
        return ValidationResult::err("Name too long (max 100 characters)");
    }

    ValidationResult::ok()
}

/// Validate check interval
pub fn validate_interval(interval: u64) -> ValidationResult {
    if interval == 0 {
        return ValidationResult::err("Interval must be at least 1 second");
    }

    if interval > 86400 {
        return ValidationResult::err("Interval too long (max 24 hours)");
    }

    ValidationResult::ok()
}

/// Validate check timeout
pub fn validate_timeout(timeout: u64, interval: u64) -> ValidationResult {
    if timeout == 0 {
        return ValidationResult::err("Timeout must be at least 1 second");
    }

    if timeout >= interval {
        return ValidationResult::err("Timeout must be less than interval");
    }

    ValidationResult::ok()
}

fn validate_service_fields(
    name: &str,
    check_type: CheckType,
    target: &str,
    interval: u64,
    timeout: u64,
) -> CoreResult<()> {
    validate_name(name).into_result()?;
    validate_target(check_type, target).into_result()?;
    validate_interval(interval).into_result()?;
    validate_timeout(timeout, interval).into_result()
}

pub fn validate_new_service(service: &NewService) -> CoreResult<()> {
    validate_service_fields(
        &service.name,
        service.check_type,
        &service.target,
        service.interval_seconds,
        service.timeout_seconds,
    )
}

/// Validate a service after an update has been applied to it
pub fn validate_service(service: &Service) -> CoreResult<()> {
    validate_service_fields(
        &service.name,
        service.check_type,
        &service.target,
        service.interval_seconds,
        service.timeout_seconds,
    )
}

/// A checkin needs a name, an owning service and a non-zero period
pub fn validate_new_checkin(checkin: &NewCheckin) -> CoreResult<()> {
    validate_name(&checkin.name).into_result()?;
    if checkin.service_id <= 0 {
        return Err(CoreError::Validation("Checkin must belong to a service".to_string()));
    }
    validate_interval(checkin.interval_seconds).into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_validation() {
        assert!(validate_http_endpoint("http://example.com").is_valid);
        assert!(validate_http_endpoint("https://example.com").is_valid);
        assert!(validate_http_endpoint("http://192.168.1.1").is_valid);
        assert!(validate_http_endpoint("http://example.com:8080/path").is_valid);

        assert!(!validate_http_endpoint("").is_valid);
        assert!(!validate_http_endpoint("example.com").is_valid);
        assert!(!validate_http_endpoint("ftp://example.com").is_valid);
    }

    #[test]
    fn test_tcp_validation() {
        assert!(validate_tcp_endpoint("localhost:8080").is_valid);
        assert!(validate_tcp_endpoint("192.168.1.1:443").is_valid);
        assert!(validate_tcp_endpoint("example.com:22").is_valid);
        assert!(validate_tcp_endpoint("[::1]:5432").is_valid);

        assert!(!validate_tcp_endpoint("").is_valid);
        assert!(!validate_tcp_endpoint("localhost").is_valid);
        assert!(!validate_tcp_endpoint("localhost:").is_valid);
        assert!(!validate_tcp_endpoint("localhost:abc").is_valid);
        assert!(!validate_tcp_endpoint("localhost:0").is_valid);
        assert!(!validate_tcp_endpoint(":80").is_valid);
    }

    #[test]
    fn test_target_follows_check_type() {
        assert!(validate_target(CheckType::Http, "https://example.com").is_valid);
        assert!(!validate_target(CheckType::Http, "example.com:443").is_valid);
        assert!(validate_target(CheckType::Tcp, "example.com:443").is_valid);
        assert!(!validate_target(CheckType::Tcp, "https://example.com").is_valid);
    }

    #[test]
    fn test_timeout_validation() {
        assert!(validate_timeout(5, 10).is_valid);
        assert!(!validate_timeout(10, 10).is_valid);
        assert!(!validate_timeout(15, 10).is_valid);
        assert!(!validate_timeout(0, 10).is_valid);
    }

    #[test]
    fn test_new_checkin_validation() {
        let valid = NewCheckin { name: "backup".into(), service_id: 1, interval_seconds: 300 };
        assert!(validate_new_checkin(&valid).is_ok());

        let unnamed = NewCheckin { name: " ".into(), ..valid.clone() };
        assert!(matches!(validate_new_checkin(&unnamed), Err(CoreError::Validation(_))));

        let orphan = NewCheckin { service_id: 0, ..valid.clone() };
        assert!(matches!(validate_new_checkin(&orphan), Err(CoreError::Validation(_))));

        let no_period = NewCheckin { interval_seconds: 0, ..valid };
        assert!(matches!(validate_new_checkin(&no_period), Err(CoreError::Validation(_))));
    }
}
