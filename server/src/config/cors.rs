use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::Config;
use crate::utils::error::AppError;

const PREFLIGHT_MAX_AGE_SECS: u64 = 86400;

pub fn create_cors_layer(config: &Config) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allowed_origins(&config.allowed_origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            HeaderName::from_static(crate::utils::auth::USER_ID_HEADER),
        ])
        .expose_headers([header::CONTENT_LENGTH, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(PREFLIGHT_MAX_AGE_SECS))
}

/// Parses configured origins, rejecting any that cannot be listed alongside
/// credentialed requests.
pub fn parse_origins(origins: &[String]) -> Result<Vec<HeaderValue>, AppError> {
    origins
        .iter()
        .map(|origin| {
            if origin == "*" {
                return Err(AppError::ConfigError(
                    "CORS_ALLOWED_ORIGINS cannot contain '*' when credentials are allowed"
                        .to_string(),
                ));
            }
            origin.parse::<HeaderValue>().map_err(|e| {
                AppError::ConfigError(format!("Invalid CORS origin '{}': {}", origin, e))
            })
        })
        .collect()
}

fn allowed_origins(origins: &[String]) -> AllowOrigin {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => {
                tracing::debug!("CORS: Allowing origin: {}", origin);
                Some(value)
            }
            Err(e) => {
                tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    if parsed.is_empty() {
        tracing::warn!("CORS: No valid origins configured, cross-origin requests are refused");
    } else {
        tracing::info!("CORS: Configured with {} allowed origin(s)", parsed.len());
    }
    AllowOrigin::list(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_cors_layer() {
        let _layer = create_cors_layer(&Config::for_development());
    }

    #[test]
    fn test_default_origins_are_valid() {
        for origin in &Config::for_development().allowed_origins {
            assert!(
                origin.parse::<HeaderValue>().is_ok(),
                "Default origin '{}' should be a valid HeaderValue",
                origin
            );
        }
    }

    #[test]
    fn test_parse_origins_rejects_bad_entries() {
        let good = vec!["https://events.campus.edu".to_string()];
        assert_eq!(parse_origins(&good).unwrap().len(), 1);

        let wildcard = vec!["*".to_string()];
        assert!(matches!(parse_origins(&wildcard), Err(AppError::ConfigError(_))));

        let garbled = vec!["https://ok.edu".to_string(), "bad\norigin".to_string()];
        assert!(matches!(parse_origins(&garbled), Err(AppError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_unlisted_origin_is_not_echoed() {
        use axum::body::Body;
        use axum::http::Request;
        use axum::routing::get;
        use axum::Router;
        use tower::ServiceExt;

        let mut config = Config::for_development();
        config.allowed_origins = vec!["bad\norigin".to_string()];
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(create_cors_layer(&config));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, "https://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}
