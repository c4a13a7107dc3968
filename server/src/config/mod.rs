use std::env;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

use crate::utils::error::AppError;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/campus_events";
const DEFAULT_SERVER_PORT: u16 = 3001;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";
const DEFAULT_GATEWAY_URL: &str = "https://api.razorpay.com";
const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_EMAIL_SENDER: &str = "events@localhost";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn from_env() -> Self {
        match env::var("RUST_ENV") {
            Ok(v) if v.eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Clone)]
pub struct PaymentConfig {
    pub key_id: String,
    pub key_secret: String,
    pub gateway_url: String,
    pub currency: String,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("gateway_url", &self.gateway_url)
            .field("currency", &self.currency)
            .finish()
    }
}

#[derive(Clone)]
pub struct EmailConfig {
    /// Serverless function endpoint. Notifications are only logged when unset.
    pub function_url: Option<String>,
    pub function_key: Option<String>,
    pub sender: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("function_url", &self.function_url)
            .field("function_key", &self.function_key.as_ref().map(|_| "[REDACTED]"))
            .field("sender", &self.sender)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub storage: StorageBackend,
    pub database_url: String,
    pub db_max_connections: u32,
    pub server_port: u16,
    pub allowed_origins: Vec<String>,
    /// `None` selects the in-process mock gateway.
    pub payment: Option<PaymentConfig>,
    pub email: EmailConfig,
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    match optional_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| AppError::ConfigError(format!("Invalid {}: {}", name, e))),
        None => Ok(default),
    }
}

/// Every configured origin must parse; production must name at least one.
fn check_origins(environment: Environment, origins: &[String]) -> Result<(), AppError> {
    cors::parse_origins(origins)?;
    if origins.is_empty() && environment.is_production() {
        return Err(AppError::ConfigError(
            "CORS_ALLOWED_ORIGINS must list at least one origin in production".to_string(),
        ));
    }
    Ok(())
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let environment = Environment::from_env();

        let storage = match optional_var("STORAGE").as_deref() {
            Some("memory") => StorageBackend::Memory,
            Some("postgres") | None => StorageBackend::Postgres,
            Some(other) => {
                return Err(AppError::ConfigError(format!(
                    "Unknown STORAGE backend '{}'",
                    other
                )))
            }
        };

        let payment = match (
            optional_var("PAYMENT_KEY_ID"),
            optional_var("PAYMENT_KEY_SECRET"),
        ) {
            (Some(key_id), Some(key_secret)) => Some(PaymentConfig {
                key_id,
                key_secret,
                gateway_url: optional_var("PAYMENT_GATEWAY_URL")
                    .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
                currency: optional_var("PAYMENT_CURRENCY")
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            }),
            (None, None) if !environment.is_production() => None,
            _ => {
                return Err(AppError::ConfigError(
                    "PAYMENT_KEY_ID and PAYMENT_KEY_SECRET must both be set".to_string(),
                ))
            }
        };

        let allowed_origins = optional_var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        check_origins(environment, &allowed_origins)?;

        Ok(Self {
            environment,
            storage,
            database_url: optional_var("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            db_max_connections: parsed_var("DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            server_port: parsed_var("SERVER_PORT", DEFAULT_SERVER_PORT)?,
            allowed_origins,
            payment,
            email: EmailConfig {
                function_url: optional_var("EMAIL_FUNCTION_URL"),
                function_key: optional_var("EMAIL_FUNCTION_KEY"),
                sender: optional_var("EMAIL_SENDER")
                    .unwrap_or_else(|| DEFAULT_EMAIL_SENDER.to_string()),
            },
        })
    }

    /// Development defaults: in-memory storage, mock gateway, logged email.
    pub fn for_development() -> Self {
        Self {
            environment: Environment::Development,
            storage: StorageBackend::Memory,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
            server_port: DEFAULT_SERVER_PORT,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .split(',')
                .map(str::to_string)
                .collect(),
            payment: None,
            email: EmailConfig {
                function_url: None,
                function_key: None,
                sender: DEFAULT_EMAIL_SENDER.to_string(),
            },
        }
    }

    pub fn currency(&self) -> &str {
        self.payment
            .as_ref()
            .map(|p| p.currency.as_str())
            .unwrap_or(DEFAULT_CURRENCY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_config_uses_mock_collaborators() {
        let config = Config::for_development();
        assert!(config.payment.is_none());
        assert!(config.email.function_url.is_none());
        assert_eq!(config.currency(), "INR");
        assert_eq!(config.storage, StorageBackend::Memory);
    }

    #[test]
    fn test_payment_secret_is_redacted() {
        let payment = PaymentConfig {
            key_id: "rzp_test_1".to_string(),
            key_secret: "s3cr3t".to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
        };
        let rendered = format!("{:?}", payment);
        assert!(rendered.contains("rzp_test_1"));
        assert!(!rendered.contains("s3cr3t"));
    }

    #[test]
    fn test_origins_are_checked_at_load() {
        let listed = vec!["https://events.campus.edu".to_string()];
        assert!(check_origins(Environment::Production, &listed).is_ok());
        assert!(check_origins(Environment::Development, &[]).is_ok());
        assert!(matches!(
            check_origins(Environment::Production, &[]),
            Err(AppError::ConfigError(_))
        ));
        assert!(matches!(
            check_origins(Environment::Development, &["*".to_string()]),
            Err(AppError::ConfigError(_))
        ));
    }
}
