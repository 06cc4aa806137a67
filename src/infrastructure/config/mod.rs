use axum::http::HeaderName;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, net::SocketAddr, sync::Arc, time::Duration};

use crate::presentation::middleware::{
    ClientKeyExtractor, CorsConfig, ForwardedHeader, HppPolicy, RateLimitPolicy, RemoteAddress,
};

const ENV_PREFIX: &str = "SCHOOL_API";

/// Runtime mode for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Local,
    Production,
}

impl std::fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl std::str::FromStr for RuntimeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(format!("Invalid runtime mode: {s}. Valid values: local, production")),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub mode: RuntimeMode,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub middleware: MiddlewareConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

/// Settings for every pipeline stage that has any
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    pub rate_limit: RateLimitSettings,
    pub cors: CorsSettings,
    pub hpp: HppSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window_seconds: u64,
    /// Key clients by `forwarded_header` instead of the peer address
    pub trust_forwarded_headers: bool,
    pub forwarded_header: String,
    pub include_headers: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsSettings {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HppSettings {
    pub check_query: bool,
    pub check_body: bool,
    pub body_content_type: String,
    pub whitelist: Vec<String>,
    pub max_body_bytes: usize,
}

impl AppConfig {
    /// Load configuration based on runtime mode
    ///
    /// # Errors
    /// Returns an error if environment variables are invalid
    pub fn load() -> Result<Self, config::ConfigError> {
        // Detect runtime mode from environment (default: local)
        let mode = std::env::var("RUN_MODE")
            .unwrap_or_else(|_| "local".to_string())
            .parse::<RuntimeMode>()
            .map_err(config::ConfigError::Message)?;

        Self::load_for_mode(mode)
    }

    /// Load configuration for a specific runtime mode
    ///
    /// # Errors
    /// Returns an error if environment variables are invalid or the resulting
    /// settings fail validation
    pub fn load_for_mode(mode: RuntimeMode) -> Result<Self, config::ConfigError> {
        // For local mode only, load .env.local file (if it exists) into the environment
        if mode == RuntimeMode::Local {
            dotenvy::from_filename(".env.local").ok();
        }

        // Environment variables override the defaults, e.g.
        // SCHOOL_API_MIDDLEWARE__RATE_LIMIT__MAX_REQUESTS=10
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("middleware.cors.allowed_origins")
                .with_list_parse_key("middleware.hpp.whitelist")
                .try_parsing(true),
        );

        let log_format = match mode {
            RuntimeMode::Local => "pretty",
            RuntimeMode::Production => "json",
        };

        let settings = builder
            .set_default("mode", mode.to_string())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", log_format)?
            .set_default("middleware.rate_limit.max_requests", 6)?
            .set_default("middleware.rate_limit.window_seconds", 60)?
            .set_default("middleware.rate_limit.trust_forwarded_headers", false)?
            .set_default("middleware.rate_limit.forwarded_header", "x-forwarded-for")?
            .set_default("middleware.rate_limit.include_headers", false)?
            .set_default(
                "middleware.cors.allowed_origins",
                vec!["https://localhost:8080", "https://my-example-url.com"],
            )?
            .set_default("middleware.hpp.check_query", true)?
            .set_default("middleware.hpp.check_body", true)?
            .set_default("middleware.hpp.body_content_type", "application/x-www-form-urlencoded")?
            .set_default(
                "middleware.hpp.whitelist",
                vec!["sortby", "sortorder", "name", "age", "class"],
            )?
            .set_default("middleware.hpp.max_body_bytes", 1_048_576)?
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    ///
    /// # Errors
    /// Returns a message naming the offending setting
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let rate_limit = &self.middleware.rate_limit;

        if rate_limit.window_seconds == 0 {
            return Err(config::ConfigError::Message(
                "middleware.rate_limit.window_seconds must be greater than zero".to_string(),
            ));
        }

        if rate_limit.trust_forwarded_headers
            && HeaderName::from_bytes(rate_limit.forwarded_header.as_bytes()).is_err()
        {
            return Err(config::ConfigError::Message(format!(
                "middleware.rate_limit.forwarded_header is not a valid header name: {}",
                rate_limit.forwarded_header
            )));
        }

        Ok(())
    }
}

impl ServerConfig {
    /// Get the socket address for binding
    ///
    /// # Errors
    /// Returns an error if host and port do not form a valid socket address
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl RateLimitSettings {
    pub fn policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            max_requests: self.max_requests,
            window: Duration::from_secs(self.window_seconds),
        }
    }

    pub fn key_extractor(&self) -> Arc<dyn ClientKeyExtractor> {
        if !self.trust_forwarded_headers {
            return Arc::new(RemoteAddress);
        }

        match HeaderName::from_bytes(self.forwarded_header.as_bytes()) {
            Ok(header) => Arc::new(ForwardedHeader::new(header)),
            Err(_) => Arc::new(ForwardedHeader::x_forwarded_for()),
        }
    }
}

impl From<&CorsSettings> for CorsConfig {
    fn from(settings: &CorsSettings) -> Self {
        CorsConfig::with_origins(settings.allowed_origins.iter().cloned())
    }
}

impl From<&HppSettings> for HppPolicy {
    fn from(settings: &HppSettings) -> Self {
        HppPolicy {
            check_query: settings.check_query,
            check_body: settings.check_body,
            body_content_type: settings.body_content_type.clone(),
            whitelist: settings.whitelist.iter().cloned().collect::<HashSet<_>>(),
            max_body_bytes: settings.max_body_bytes,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        mode: RuntimeMode::Local,
        server: ServerConfig { host: "127.0.0.1".to_string(), port: 0 },
        logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Pretty },
        middleware: MiddlewareConfig {
            rate_limit: RateLimitSettings {
                max_requests: 6,
                window_seconds: 60,
                trust_forwarded_headers: false,
                forwarded_header: "x-forwarded-for".to_string(),
                include_headers: false,
            },
            cors: CorsSettings {
                allowed_origins: vec![
                    "https://localhost:8080".to_string(),
                    "https://my-example-url.com".to_string(),
                ],
            },
            hpp: HppSettings {
                check_query: true,
                check_body: true,
                body_content_type: "application/x-www-form-urlencoded".to_string(),
                whitelist: ["sortby", "sortorder", "name", "age", "class"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
                max_body_bytes: 1_048_576,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{get, with_peer};
    use rstest::rstest;

    #[rstest]
    #[case("local", RuntimeMode::Local)]
    #[case("LOCAL", RuntimeMode::Local)]
    #[case("production", RuntimeMode::Production)]
    #[case("prod", RuntimeMode::Production)]
    fn test_runtime_mode_from_str(#[case] input: &str, #[case] expected: RuntimeMode) {
        assert_eq!(input.parse::<RuntimeMode>().unwrap(), expected);
    }

    #[test]
    fn test_runtime_mode_invalid() {
        let err = "staging".parse::<RuntimeMode>().unwrap_err();
        assert!(err.contains("Invalid runtime mode"));
    }

    #[test]
    fn test_runtime_mode_display_round_trips() {
        assert_eq!(RuntimeMode::Production.to_string(), "production");
        assert_eq!(RuntimeMode::Local.to_string().parse::<RuntimeMode>().unwrap(), RuntimeMode::Local);
    }

    #[test]
    fn test_server_config_socket_addr() {
        let config = ServerConfig { host: "127.0.0.1".to_string(), port: 8080 };
        let addr = config.socket_addr().unwrap();

        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_server_config_invalid_socket_addr() {
        let config = ServerConfig { host: "not a host".to_string(), port: 8080 };
        assert!(config.socket_addr().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let mut config = test_config();
        config.middleware.rate_limit.window_seconds = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("window_seconds"));
    }

    #[test]
    fn test_validate_rejects_bad_forwarded_header() {
        let mut config = test_config();
        config.middleware.rate_limit.trust_forwarded_headers = true;
        config.middleware.rate_limit.forwarded_header = "bad header".to_string();

        assert!(config.validate().is_err());

        config.middleware.rate_limit.trust_forwarded_headers = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rate_limit_settings_to_policy() {
        let policy = test_config().middleware.rate_limit.policy();
        assert_eq!(policy, RateLimitPolicy::default());
    }

    #[test]
    fn test_key_extractor_selection() {
        let request = axum::http::Request::builder()
            .header("x-real-ip", "203.0.113.50")
            .body(axum::body::Body::empty())
            .unwrap();
        let request = with_peer(request, "10.0.0.1:4000");

        let mut settings = test_config().middleware.rate_limit;
        assert_eq!(settings.key_extractor().client_key(&request), "10.0.0.1");

        settings.trust_forwarded_headers = true;
        settings.forwarded_header = "x-real-ip".to_string();
        assert_eq!(settings.key_extractor().client_key(&request), "203.0.113.50");

        assert_eq!(settings.key_extractor().client_key(&get("/")), "127.0.0.1");
    }

    #[test]
    fn test_settings_convert_into_policies() {
        let config = test_config();

        let cors = CorsConfig::from(&config.middleware.cors);
        assert!(cors.is_origin_allowed("https://my-example-url.com"));

        let hpp = HppPolicy::from(&config.middleware.hpp);
        assert_eq!(hpp, HppPolicy::default());
    }

    #[test]
    fn test_load_for_production_uses_defaults() {
        let config = AppConfig::load_for_mode(RuntimeMode::Production).unwrap();

        assert_eq!(config.mode, RuntimeMode::Production);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.middleware.rate_limit.max_requests, 6);
        assert_eq!(config.middleware.hpp.whitelist.len(), 5);
        assert_eq!(config.middleware.cors.allowed_origins.len(), 2);
    }

    #[test]
    fn test_app_config_serialization() {
        let config = test_config();

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config.server.host, deserialized.server.host);
        assert_eq!(config.middleware.hpp.whitelist, deserialized.middleware.hpp.whitelist);
    }
}
