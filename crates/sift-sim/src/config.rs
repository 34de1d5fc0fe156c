//! Simulation configuration.
//!
//! [`SimConfig`] is a plain serde struct. Every field has a default, so a
//! config file only needs to name the values it overrides:
//!
//! ```
//! use sift_sim::config::SimConfig;
//!
//! let config = SimConfig::from_json_str(r#"{ "entity_count": 16, "seed": 7 }"#).unwrap();
//! assert_eq!(config.entity_count, 16);
//! assert_eq!(config.ticks, SimConfig::default().ticks);
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::tick::TickConfig;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while loading or validating a [`SimConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config text is not valid JSON for [`SimConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field holds a value the simulation cannot run with.
    #[error("invalid config field '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ---------------------------------------------------------------------------
// SimConfig
// ---------------------------------------------------------------------------

/// Parameters for the particle motion simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of particles spawned at startup.
    pub entity_count: usize,
    /// Seed for the particle RNG.
    pub seed: u64,
    /// Ticks to run.
    pub ticks: u64,
    /// Seconds per tick.
    pub fixed_dt: f64,
    /// Emit a position log pass every this many ticks. `0` disables it.
    pub log_every: u64,
    /// Particles start inside `[0, arena_size)` on both axes.
    pub arena_size: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            entity_count: 1_000,
            seed: 42,
            ticks: 600,
            fixed_dt: 1.0 / 60.0,
            log_every: 60,
            arena_size: 100.0,
        }
    }
}

impl SimConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a JSON config string.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values can drive a simulation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fixed_dt > 0.0 && self.fixed_dt.is_finite()) {
            return Err(ConfigError::Invalid {
                field: "fixed_dt",
                reason: format!("must be positive and finite, got {}", self.fixed_dt),
            });
        }
        if !(self.arena_size > 0.0 && self.arena_size.is_finite()) {
            return Err(ConfigError::Invalid {
                field: "arena_size",
                reason: format!("must be positive and finite, got {}", self.arena_size),
            });
        }
        Ok(())
    }

    pub fn tick_config(&self) -> TickConfig {
        TickConfig {
            fixed_dt: self.fixed_dt,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
