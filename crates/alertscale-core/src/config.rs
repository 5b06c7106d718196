//! alertscale.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Activity causes reported by a delegated provider when capacity changed.
pub const DEFAULT_DELEGATED_CAUSES: &[&str] =
    &["changing the desired capacity", "Executing scheduled action"];

/// Event types logged by a self-managed provider when capacity changed.
pub const DEFAULT_SELF_MANAGED_CAUSES: &[&str] = &["Scale", "Update"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalerConfig {
    pub retry: RetryConfig,
    pub cooldown: CooldownConfig,
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_delay: String,
    pub budget: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_delay: "60s".to_string(),
            budget: "5m".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    pub default_cooldown: String,
    pub event_lookback: String,
    pub delegated_causes: Vec<String>,
    pub self_managed_causes: Vec<String>,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            default_cooldown: "600s".to_string(),
            event_lookback: "1h".to_string(),
            delegated_causes: to_strings(DEFAULT_DELEGATED_CAUSES),
            self_managed_causes: to_strings(DEFAULT_SELF_MANAGED_CAUSES),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub policy_workers: usize,
    pub group_workers: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            policy_workers: 1,
            group_workers: 1,
        }
    }
}

/// Backoff limits for throttled provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Longest single sleep between attempts.
    pub max_delay: Duration,
    /// Total wall-clock budget, measured from the first attempt.
    pub budget: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_delay: Duration::from_secs(60),
            budget: Duration::from_secs(5 * 60),
        }
    }
}

/// Runtime cooldown parameters for the group adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownSettings {
    pub default_cooldown: Duration,
    /// How far back self-managed event logs are read.
    pub event_lookback: Duration,
    pub delegated_causes: Vec<String>,
    pub self_managed_causes: Vec<String>,
}

impl Default for CooldownSettings {
    fn default() -> Self {
        Self {
            default_cooldown: Duration::from_secs(600),
            event_lookback: Duration::from_secs(60 * 60),
            delegated_causes: to_strings(DEFAULT_DELEGATED_CAUSES),
            self_managed_causes: to_strings(DEFAULT_SELF_MANAGED_CAUSES),
        }
    }
}

/// Concurrency limits for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerLimits {
    pub policy_workers: usize,
    pub group_workers: usize,
}

impl Default for WorkerLimits {
    fn default() -> Self {
        Self {
            policy_workers: 1,
            group_workers: 1,
        }
    }
}

impl ScalerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: ScalerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every field without building the runtime settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry_policy()?;
        self.cooldown_settings()?;
        self.worker_limits()?;
        Ok(())
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        let max_delay = parse_duration("retry.max_delay", &self.retry.max_delay)?;
        let budget = parse_duration("retry.budget", &self.retry.budget)?;
        if max_delay.is_zero() {
            return Err(ConfigError::Invalid(
                "retry.max_delay must be greater than zero".to_string(),
            ));
        }
        Ok(RetryPolicy { max_delay, budget })
    }

    pub fn cooldown_settings(&self) -> Result<CooldownSettings, ConfigError> {
        let cfg = &self.cooldown;
        if cfg.delegated_causes.iter().any(|c| c.is_empty())
            || cfg.self_managed_causes.iter().any(|c| c.is_empty())
        {
            // An empty phrase would match every activity.
            return Err(ConfigError::Invalid(
                "cooldown cause phrases must not be empty".to_string(),
            ));
        }
        Ok(CooldownSettings {
            default_cooldown: parse_duration("cooldown.default_cooldown", &cfg.default_cooldown)?,
            event_lookback: parse_duration("cooldown.event_lookback", &cfg.event_lookback)?,
            delegated_causes: cfg.delegated_causes.clone(),
            self_managed_causes: cfg.self_managed_causes.clone(),
        })
    }

    pub fn worker_limits(&self) -> Result<WorkerLimits, ConfigError> {
        let exec = &self.execution;
        if exec.policy_workers == 0 || exec.group_workers == 0 {
            return Err(ConfigError::Invalid(
                "execution worker counts must be at least 1".to_string(),
            ));
        }
        Ok(WorkerLimits {
            policy_workers: exec.policy_workers,
            group_workers: exec.group_workers,
        })
    }
}

/// Parse a duration string like "30s", "5m", "1h", or "600" (seconds).
pub fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let s = value.trim();
    let (digits, multiplier) = if let Some(secs) = s.strip_suffix('s') {
        (secs, 1)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 60 * 60)
    } else {
        (s, 1)
    };

    let invalid = || ConfigError::InvalidDuration {
        field,
        value: value.to_string(),
    };

    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
