use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level middleware configuration (`strata.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrataConfig {
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

/// Routing section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Widest discrete range `[begin, end]` the router will enumerate
    /// value-by-value; wider ranges broadcast to every shard node.
    #[serde(default = "default_range_enumeration_cap")]
    pub range_enumeration_cap: u64,
}

/// Planner section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Cache plan decisions by predicate-mask fingerprint.
    #[serde(default = "default_true")]
    pub plan_cache_enabled: bool,
    /// Cached fingerprints per table before the cache resets.
    #[serde(default = "default_plan_cache_capacity")]
    pub plan_cache_capacity: usize,
}

/// Executor section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Upper bound on concurrently running workers per statement.
    /// Worker sets larger than this execute in waves.
    #[serde(default = "default_max_parallel_workers")]
    pub max_parallel_workers: usize,
    /// Per-statement deadline in milliseconds (0 = no deadline).
    #[serde(default)]
    pub statement_timeout_ms: u64,
    /// Rows buffered per destination node before a bulk insert flushes.
    #[serde(default = "default_batch_flush_rows")]
    pub batch_flush_rows: usize,
}

fn default_range_enumeration_cap() -> u64 {
    200
}

fn default_true() -> bool {
    true
}

fn default_plan_cache_capacity() -> usize {
    1024
}

fn default_max_parallel_workers() -> usize {
    16
}

fn default_batch_flush_rows() -> usize {
    200
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            range_enumeration_cap: default_range_enumeration_cap(),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            plan_cache_enabled: true,
            plan_cache_capacity: default_plan_cache_capacity(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel_workers: default_max_parallel_workers(),
            statement_timeout_ms: 0,
            batch_flush_rows: default_batch_flush_rows(),
        }
    }
}

impl StrataConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: StrataConfig =
            toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executor.max_parallel_workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "executor.max_parallel_workers",
                reason: "must be at least 1".into(),
            });
        }
        if self.executor.batch_flush_rows == 0 {
            return Err(ConfigError::InvalidValue {
                field: "executor.batch_flush_rows",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
