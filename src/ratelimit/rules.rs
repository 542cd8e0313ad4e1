//! Rate limit rules: the per-endpoint limit configuration and named presets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{LexgateError, Result};

/// Rejection text used when a limit does not set its own.
pub const DEFAULT_MESSAGE: &str = "Too many requests, please try again later.";

/// Limit applied by one rate limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitConfig {
    /// Requests admitted per window
    pub max_requests: u64,
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Human-readable rejection text
    #[serde(default = "default_message")]
    pub message: String,
}

fn default_message() -> String {
    DEFAULT_MESSAGE.to_string()
}

impl LimitConfig {
    /// Create a limit with the default rejection message.
    pub fn new(max_requests: u64, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
            message: default_message(),
        }
    }

    /// Replace the rejection message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Reject limits that would admit everything or nothing.
    pub fn validate(&self) -> Result<()> {
        if self.max_requests == 0 {
            return Err(LexgateError::Config(
                "max_requests must be a positive integer".to_string(),
            ));
        }
        if self.window_ms == 0 {
            return Err(LexgateError::Config(
                "window_ms must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Named limits shared across endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Sensitive operations: 10 requests per minute
    Strict,
    /// Regular operations: 100 requests per minute
    Moderate,
    /// Read-heavy operations: 300 requests per minute
    Permissive,
    /// Authentication attempts: 5 requests per 15 minutes
    Auth,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::Strict,
        Preset::Moderate,
        Preset::Permissive,
        Preset::Auth,
    ];

    /// The limit this preset stands for.
    pub fn config(self) -> LimitConfig {
        match self {
            Preset::Strict => LimitConfig::new(10, 60_000)
                .with_message("Too many requests. Please wait before trying again."),
            Preset::Moderate => {
                LimitConfig::new(100, 60_000).with_message("Rate limit exceeded. Please slow down.")
            }
            Preset::Permissive => LimitConfig::new(300, 60_000)
                .with_message("Too many requests. Please try again in a moment."),
            Preset::Auth => LimitConfig::new(5, 15 * 60_000)
                .with_message("Too many authentication attempts. Please try again later."),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Preset::Strict => "strict",
            Preset::Moderate => "moderate",
            Preset::Permissive => "permissive",
            Preset::Auth => "auth",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = LexgateError;

    fn from_str(s: &str) -> Result<Self> {
        Preset::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| LexgateError::Config(format!("unknown rate limit preset: {}", s)))
    }
}

impl From<Preset> for LimitConfig {
    fn from(preset: Preset) -> Self {
        preset.config()
    }
}

/// A limit as written in configuration: a preset name or an explicit limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LimitSpec {
    Preset(Preset),
    Custom(LimitConfig),
}

impl LimitSpec {
    /// Resolve to a validated limit.
    pub fn resolve(&self) -> Result<LimitConfig> {
        let config = match self {
            LimitSpec::Preset(preset) => preset.config(),
            LimitSpec::Custom(config) => config.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

impl From<Preset> for LimitSpec {
    fn from(preset: Preset) -> Self {
        LimitSpec::Preset(preset)
    }
}
