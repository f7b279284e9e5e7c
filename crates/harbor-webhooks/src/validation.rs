//! URL and event-list validation for webhook registration.
//!
//! Webhook URLs must be http or https, and by default may not point at
//! private/internal addresses (SSRF protection). The private-host guard can
//! be relaxed for development and tests via configuration.

use std::net::IpAddr;

use crate::error::WebhookError;

/// Validate a webhook delivery URL.
///
/// Checks:
/// 1. URL is parseable
/// 2. Scheme is http or https
/// 3. Host is not a private/internal address, unless `allow_private_hosts`
pub fn validate_webhook_url(url: &str, allow_private_hosts: bool) -> Result<(), WebhookError> {
    let parsed = url::Url::parse(url)
        .map_err(|e| WebhookError::InvalidUrl(format!("Invalid URL format: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(WebhookError::InvalidUrl(format!(
                "Webhook URLs must use HTTP or HTTPS, got: {scheme}"
            )));
        }
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| WebhookError::InvalidUrl("URL must have a host".to_string()))?;

    if !allow_private_hosts {
        validate_host_not_internal(host)?;
    }

    Ok(())
}

/// Validate that a host is not a private/internal address.
///
/// Blocks:
/// - Loopback addresses (127.0.0.0/8)
/// - Private networks (10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16)
/// - Link-local (169.254.0.0/16, the cloud metadata endpoint range)
/// - CGNAT (100.64.0.0/10)
/// - IPv6 loopback and unspecified
/// - Internal hostnames (localhost, *.internal, *.local)
pub fn validate_host_not_internal(host: &str) -> Result<(), WebhookError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_internal_ip(&ip) {
            return Err(WebhookError::SsrfBlocked(format!(
                "Destination host {host} is a private/internal address"
            )));
        }
    }

    let lower = host.to_ascii_lowercase();
    if lower == "localhost"
        || lower == "metadata.google.internal"
        || lower.ends_with(".internal")
        || lower.ends_with(".local")
    {
        return Err(WebhookError::SsrfBlocked(format!(
            "Destination host {host} is a restricted internal hostname"
        )));
    }

    Ok(())
}

/// Check if an IP address belongs to a private/internal range.
fn is_internal_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

/// Validate the subscribed event list: non-empty, no blank names.
pub fn validate_events(events: &[String]) -> Result<(), WebhookError> {
    if events.is_empty() {
        return Err(WebhookError::Validation(
            "At least one event must be selected".to_string(),
        ));
    }
    for event in events {
        if event.trim().is_empty() {
            return Err(WebhookError::Validation(
                "Event names must not be blank".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- URL validation ---

    #[test]
    fn test_valid_https_url() {
        assert!(validate_webhook_url("https://example.com/webhooks", false).is_ok());
    }

    #[test]
    fn test_valid_http_url() {
        assert!(validate_webhook_url("http://example.com/webhooks", false).is_ok());
    }

    #[test]
    fn test_valid_url_with_port() {
        assert!(validate_webhook_url("https://hooks.example.com:8443/callback", false).is_ok());
    }

    #[test]
    fn test_invalid_url_format() {
        let result = validate_webhook_url("not-a-url", false);
        assert!(matches!(result, Err(WebhookError::InvalidUrl(_))));
    }

    #[test]
    fn test_unsupported_scheme() {
        let result = validate_webhook_url("ftp://example.com/webhooks", false);
        assert!(matches!(result, Err(WebhookError::InvalidUrl(_))));
    }

    #[test]
    fn test_ws_scheme_rejected() {
        let result = validate_webhook_url("ws://example.com/webhooks", false);
        assert!(matches!(result, Err(WebhookError::InvalidUrl(_))));
    }

    // --- SSRF protection ---

    #[test]
    fn test_ssrf_blocks_loopback() {
        assert!(validate_host_not_internal("127.0.0.1").is_err());
        assert!(validate_host_not_internal("127.0.0.2").is_err());
    }

    #[test]
    fn test_ssrf_blocks_private_ranges() {
        assert!(validate_host_not_internal("10.0.0.1").is_err());
        assert!(validate_host_not_internal("172.16.0.1").is_err());
        assert!(validate_host_not_internal("192.168.0.1").is_err());
    }

    #[test]
    fn test_ssrf_blocks_link_local() {
        assert!(validate_host_not_internal("169.254.169.254").is_err());
    }

    #[test]
    fn test_ssrf_blocks_cgnat() {
        assert!(validate_host_not_internal("100.64.0.1").is_err());
        assert!(validate_host_not_internal("100.127.255.255").is_err());
    }

    #[test]
    fn test_ssrf_blocks_ipv6_loopback_and_unspecified() {
        assert!(validate_host_not_internal("::1").is_err());
        assert!(validate_host_not_internal("::").is_err());
    }

    #[test]
    fn test_ssrf_blocks_internal_hostnames() {
        assert!(validate_host_not_internal("localhost").is_err());
        assert!(validate_host_not_internal("LOCALHOST").is_err());
        assert!(validate_host_not_internal("metadata.google.internal").is_err());
        assert!(validate_host_not_internal("service.internal").is_err());
        assert!(validate_host_not_internal("myhost.local").is_err());
    }

    #[test]
    fn test_ssrf_allows_public_hosts() {
        assert!(validate_host_not_internal("8.8.8.8").is_ok());
        assert!(validate_host_not_internal("example.com").is_ok());
        assert!(validate_host_not_internal("hooks.myapp.io").is_ok());
    }

    #[test]
    fn test_private_url_allowed_when_configured() {
        assert!(validate_webhook_url("http://127.0.0.1:8080/hook", true).is_ok());
        assert!(validate_webhook_url("http://localhost/hook", true).is_ok());
    }

    #[test]
    fn test_private_url_blocked_by_default() {
        let result = validate_webhook_url("https://10.0.0.1/webhook", false);
        assert!(matches!(result, Err(WebhookError::SsrfBlocked(_))));
    }

    // --- Event list validation ---

    #[test]
    fn test_empty_event_list_rejected() {
        let result = validate_events(&[]);
        assert!(matches!(result, Err(WebhookError::Validation(_))));
    }

    #[test]
    fn test_blank_event_name_rejected() {
        let events = vec!["lead.created".to_string(), "  ".to_string()];
        assert!(validate_events(&events).is_err());
    }

    #[test]
    fn test_valid_event_list() {
        let events = vec!["lead.created".to_string(), "property.updated".to_string()];
        assert!(validate_events(&events).is_ok());
    }
}
