use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_PROVIDER_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 15;
const DEFAULT_PENDING_PURCHASE_TTL_SECS: u64 = 86_400;

/// Payment provider configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Base URL of the payment provider's REST API
    #[serde(default = "default_provider_api_base")]
    pub api_base: String,

    /// Secret API key used for server-side calls
    #[validate(custom = "validate_provider_secret_key")]
    pub secret_key: String,

    /// Outbound request timeout in seconds
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: default_provider_api_base(),
            secret_key: String::new(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

/// Application configuration with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Payment provider settings
    #[validate]
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Default currency used when region detection fails (ISO 4217)
    #[serde(default = "default_currency_code")]
    #[validate(length(equal = 3))]
    pub default_currency: String,

    /// Webhook URL receiving completed-transaction summaries.
    /// Dispatch is disabled when unset.
    #[serde(default)]
    pub notification_webhook_url: Option<String>,

    /// How long a pending purchase survives before the /complete flow
    /// is considered abandoned
    #[serde(default = "default_pending_purchase_ttl_secs")]
    pub pending_purchase_ttl_secs: u64,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn pending_purchase_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.pending_purchase_ttl_secs)
    }
}

fn validate_provider_secret_key(key: &str) -> Result<(), ValidationError> {
    // Stripe-style key prefixes; restricted keys allowed
    const PREFIXES: [&str; 4] = ["sk_test_", "sk_live_", "rk_test_", "rk_live_"];
    if key.len() >= 20 && PREFIXES.iter().any(|p| key.starts_with(p)) {
        Ok(())
    } else {
        let mut err = ValidationError::new("secret_key");
        err.message =
            Some("Provider secret key must start with sk_test_, sk_live_, rk_test_ or rk_live_".into());
        Err(err)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_currency_code() -> String {
    "AUD".to_string()
}
fn default_provider_api_base() -> String {
    DEFAULT_PROVIDER_API_BASE.to_string()
}
fn default_provider_timeout_secs() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_SECS
}
fn default_pending_purchase_ttl_secs() -> u64 {
    DEFAULT_PENDING_PURCHASE_TTL_SECS
}

/// Load configuration from config/{default,<env>}.toml layered with
/// APP__-prefixed environment variables.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // NOTE: provider.secret_key has no default - it MUST be provided via
    // environment variable or config file.
    let config = Config::builder()
        .set_default("database_url", "sqlite://cradle.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("provider.secret_key").is_err() {
        error!("Payment provider secret key is not configured. Set APP__PROVIDER__SECRET_KEY.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "provider.secret_key is required but not configured. Set APP__PROVIDER__SECRET_KEY."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    Ok(app_config)
}

/// Initialize the tracing subscriber. RUST_LOG overrides the configured level.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("cradle_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::try_new(filter_directive)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}
