use axum::http::{header, HeaderName, HeaderValue};
use axum::Router;
use std::env;
use tower_http::set_header::SetResponseHeaderLayer;

const HSTS_VALUE: &str = "max-age=31536000; includeSubDomains";
const CSP_API_VALUE: &str = "default-src 'none'; frame-ancestors 'none'";
const REFERRER_POLICY_VALUE: &str = "strict-origin-when-cross-origin";
const PERMISSIONS_POLICY_VALUE: &str = "geolocation=(), microphone=(), camera=()";

/// Attach the standard security response headers. HSTS is added only in
/// production (HTTPS environments).
pub fn apply_security_headers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let mut router = router;
    for layer in security_header_layers(is_production()) {
        router = router.layer(layer);
    }
    router
}

fn is_production() -> bool {
    env::var("RUST_ENV")
        .map(|v| v.to_lowercase() == "production")
        .unwrap_or(false)
}

fn security_header_layers(include_hsts: bool) -> Vec<SetResponseHeaderLayer<HeaderValue>> {
    let mut layers = vec![
        header_layer(header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        header_layer(header::X_FRAME_OPTIONS, "DENY"),
        header_layer(header::CONTENT_SECURITY_POLICY, CSP_API_VALUE),
        header_layer(header::REFERRER_POLICY, REFERRER_POLICY_VALUE),
        header_layer(
            HeaderName::from_static("permissions-policy"),
            PERMISSIONS_POLICY_VALUE,
        ),
    ];

    if include_hsts {
        tracing::info!("Security: HSTS header enabled (production mode)");
        layers.push(header_layer(header::STRICT_TRANSPORT_SECURITY, HSTS_VALUE));
    } else {
        tracing::info!("Security: HSTS header disabled (development mode)");
    }

    layers
}

fn header_layer(name: HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsts_only_in_production() {
        assert_eq!(security_header_layers(false).len(), 5);
        assert_eq!(security_header_layers(true).len(), 6);
    }

    #[test]
    fn test_header_values_are_valid() {
        for value in [HSTS_VALUE, CSP_API_VALUE, REFERRER_POLICY_VALUE, PERMISSIONS_POLICY_VALUE] {
            assert!(HeaderValue::from_str(value).is_ok());
        }
    }
}
