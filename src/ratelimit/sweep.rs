//! Removal of expired window records.
//!
//! Stale records are harmless for correctness since [`WindowStore::hit`]
//! replaces them on access, so sweeping only bounds memory.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::clock::Clock;
use super::store::WindowStore;
use crate::error::{LexgateError, Result};

/// How expired records get removed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SweepPolicy {
    /// A background task sweeps the whole store on a fixed interval
    Periodic { interval: Duration },
    /// Each check sweeps the whole store with the given probability
    Probabilistic { probability: f64 },
    /// Never sweep; records are only replaced on access
    Disabled,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        SweepPolicy::Periodic {
            interval: Duration::from_secs(60),
        }
    }
}

impl SweepPolicy {
    pub fn validate(&self) -> Result<()> {
        match *self {
            SweepPolicy::Periodic { interval } if interval.is_zero() => Err(
                LexgateError::Config("sweep interval must be positive".to_string()),
            ),
            SweepPolicy::Probabilistic { probability }
                if !(0.0..=1.0).contains(&probability) =>
            {
                Err(LexgateError::Config(format!(
                    "sweep probability must be within [0, 1], got {}",
                    probability
                )))
            }
            _ => Ok(()),
        }
    }

    /// Roll for a per-check sweep. Always false outside probabilistic mode.
    pub fn should_sweep_on_check(&self) -> bool {
        match *self {
            SweepPolicy::Probabilistic { probability } => {
                rand::thread_rng().gen_bool(probability)
            }
            _ => false,
        }
    }
}

/// Sweep mode as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepMode {
    Periodic,
    Probabilistic,
    Disabled,
}

/// Sweep settings as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Which sweep strategy to run
    #[serde(default = "default_mode")]
    pub mode: SweepMode,

    /// Interval between periodic sweeps in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Per-check sweep probability in probabilistic mode
    #[serde(default = "default_probability")]
    pub probability: f64,
}

fn default_mode() -> SweepMode {
    SweepMode::Periodic
}

fn default_interval_secs() -> u64 {
    60
}

fn default_probability() -> f64 {
    0.01
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            interval_secs: default_interval_secs(),
            probability: default_probability(),
        }
    }
}

impl SweepConfig {
    /// Build and validate the runtime policy.
    pub fn policy(&self) -> Result<SweepPolicy> {
        let policy = match self.mode {
            SweepMode::Periodic => SweepPolicy::Periodic {
                interval: Duration::from_secs(self.interval_secs),
            },
            SweepMode::Probabilistic => SweepPolicy::Probabilistic {
                probability: self.probability,
            },
            SweepMode::Disabled => SweepPolicy::Disabled,
        };
        policy.validate()?;
        Ok(policy)
    }
}

/// Spawn a task sweeping `store` every `interval`.
///
/// The task runs until the returned handle is aborted or the runtime shuts
/// down.
pub fn spawn_sweeper(
    store: WindowStore,
    clock: Arc<dyn Clock>,
    interval: Duration,
) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs_f64(), "Starting window sweeper");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = store.sweep(clock.now_millis());
            debug!(removed, records = store.len(), "Sweeper tick completed");
        }
    })
}
