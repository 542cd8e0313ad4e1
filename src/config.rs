//! Configuration management for Lexgate.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use tracing::info;

use crate::error::{LexgateError, Result};
use crate::ratelimit::{LimitSpec, Preset, SweepConfig};

/// Prefix of environment variables overriding file configuration.
pub const ENV_PREFIX: &str = "LEXGATE";

/// Main configuration for the Lexgate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LexgateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Subscription expiry configuration
    #[serde(default)]
    pub subscriptions: SubscriptionsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8080))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Expired record cleanup
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Upper bound on stored window records, unbounded when unset
    #[serde(default)]
    pub max_records: Option<usize>,

    /// Limit on the rate limit check endpoint
    #[serde(default = "default_check_limit")]
    pub check: LimitSpec,

    /// Limit on the subscription expiry endpoint
    #[serde(default = "default_expire_limit")]
    pub expire: LimitSpec,

    /// Limit on the payment webhook endpoint
    #[serde(default = "default_webhook_limit")]
    pub webhook: LimitSpec,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            sweep: SweepConfig::default(),
            max_records: None,
            check: default_check_limit(),
            expire: default_expire_limit(),
            webhook: default_webhook_limit(),
        }
    }
}

fn default_check_limit() -> LimitSpec {
    LimitSpec::Preset(Preset::Moderate)
}

fn default_expire_limit() -> LimitSpec {
    LimitSpec::Preset(Preset::Strict)
}

fn default_webhook_limit() -> LimitSpec {
    LimitSpec::Preset(Preset::Permissive)
}

/// Subscription expiry configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionsConfig {
    /// Shared secret required from the scheduler, open when unset
    #[serde(default)]
    pub cron_secret: Option<String>,

    /// Shared secret required from the payment provider, open when unset
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// YAML list of subscribers for the in-memory store
    #[serde(default)]
    pub users_file: Option<String>,
}

impl LexgateConfig {
    /// Load configuration from an optional YAML file, then `LEXGATE__*`
    /// environment variables (e.g. `LEXGATE__SERVER__BIND_ADDR`).
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!(path, "Loading configuration file");
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        let config: LexgateConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: LexgateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| LexgateError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every limit and the sweep policy.
    pub fn validate(&self) -> Result<()> {
        self.rate_limiting.check.resolve()?;
        self.rate_limiting.expire.resolve()?;
        self.rate_limiting.webhook.resolve()?;
        self.rate_limiting.sweep.policy()?;
        if self.rate_limiting.max_records == Some(0) {
            return Err(LexgateError::Config(
                "max_records must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}
