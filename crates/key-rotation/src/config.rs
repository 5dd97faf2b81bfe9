use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Default rotation interval: 7 days.
pub const DEFAULT_ROTATION_INTERVAL_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Default overlap window during which a retiring key still validates: 1 day.
pub const DEFAULT_OVERLAP_SECONDS: i64 = 24 * 60 * 60;

/// Default validation grace on top of the overlap, tolerating clock skew
/// between issuer and validator instances: 5 minutes.
pub const DEFAULT_VALIDATION_GRACE_SECONDS: i64 = 300;

/// Default bound on retained keys (active + standby + retiring).
pub const DEFAULT_MAX_RETAINED_KEYS: usize = 5;

/// Default cap on how long the rotation scheduler sleeps between
/// deadline re-evaluations.
pub const DEFAULT_MAX_POLL_INTERVAL_SECONDS: u64 = 60;

/// Upper bound on the duration knobs: 10 years. Keeps deadline arithmetic
/// (`expires_at + validation_grace`) far away from `DateTime` overflow.
pub const MAX_DURATION_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

/// Process-lifetime configuration for the rotation subsystem.
#[derive(Debug, Clone)]
pub struct RotationConfig {
    /// Seconds between scheduled rotations, measured from the active key's
    /// activation time.
    pub rotation_interval_seconds: i64,
    /// Seconds a retiring key remains eligible for validation after being
    /// superseded.
    pub overlap_seconds: i64,
    /// Extra eligibility seconds added on top of the overlap for clock skew.
    pub validation_grace_seconds: i64,
    /// Hard bound on keys kept in the store; the sweep force-expires the
    /// oldest non-active keys beyond this.
    pub max_retained_keys: usize,
    /// Generate the next standby key immediately after each promotion so a
    /// future rotation never blocks on key generation.
    pub pregenerate_standby: bool,
    /// Cap on scheduler sleep duration, so configuration changes and clock
    /// adjustments are picked up within a bounded delay.
    pub max_poll_interval_seconds: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            rotation_interval_seconds: DEFAULT_ROTATION_INTERVAL_SECONDS,
            overlap_seconds: DEFAULT_OVERLAP_SECONDS,
            validation_grace_seconds: DEFAULT_VALIDATION_GRACE_SECONDS,
            max_retained_keys: DEFAULT_MAX_RETAINED_KEYS,
            pregenerate_standby: true,
            max_poll_interval_seconds: DEFAULT_MAX_POLL_INTERVAL_SECONDS,
        }
    }
}

impl RotationConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let rotation_interval_seconds = parse_var(
            vars,
            "KR_ROTATION_INTERVAL_SECONDS",
            defaults.rotation_interval_seconds,
        )?;
        let overlap_seconds = parse_var(vars, "KR_OVERLAP_SECONDS", defaults.overlap_seconds)?;
        let validation_grace_seconds = parse_var(
            vars,
            "KR_VALIDATION_GRACE_SECONDS",
            defaults.validation_grace_seconds,
        )?;
        let max_retained_keys =
            parse_var(vars, "KR_MAX_RETAINED_KEYS", defaults.max_retained_keys)?;
        let max_poll_interval_seconds = parse_var(
            vars,
            "KR_MAX_POLL_INTERVAL_SECONDS",
            defaults.max_poll_interval_seconds,
        )?;

        let pregenerate_standby = match vars.get("KR_PREGENERATE_STANDBY") {
            None => defaults.pregenerate_standby,
            Some(v) => match v.as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                other => {
                    return Err(ConfigError::InvalidValue {
                        var: "KR_PREGENERATE_STANDBY".to_string(),
                        reason: format!("expected true/false, got '{}'", other),
                    })
                }
            },
        };

        let config = Self {
            rotation_interval_seconds,
            overlap_seconds,
            validation_grace_seconds,
            max_retained_keys,
            pregenerate_standby,
            max_poll_interval_seconds,
        };
        config.validate()?;
        Ok(config)
    }

    /// Sanity-check the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rotation_interval_seconds <= 0 {
            return Err(ConfigError::Invalid(
                "rotation interval must be positive".to_string(),
            ));
        }
        if self.overlap_seconds <= 0 {
            return Err(ConfigError::Invalid(
                "overlap duration must be positive".to_string(),
            ));
        }
        if self.validation_grace_seconds < 0 {
            return Err(ConfigError::Invalid(
                "validation grace must not be negative".to_string(),
            ));
        }
        if self.rotation_interval_seconds > MAX_DURATION_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "rotation interval must not exceed {} seconds",
                MAX_DURATION_SECONDS
            )));
        }
        if self.overlap_seconds > MAX_DURATION_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "overlap duration must not exceed {} seconds",
                MAX_DURATION_SECONDS
            )));
        }
        if self.validation_grace_seconds > MAX_DURATION_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "validation grace must not exceed {} seconds",
                MAX_DURATION_SECONDS
            )));
        }
        if self.overlap_seconds > self.rotation_interval_seconds {
            return Err(ConfigError::Invalid(
                "overlap duration must not exceed the rotation interval".to_string(),
            ));
        }
        // Active + retiring must both fit under the retention bound.
        if self.max_retained_keys < 2 {
            return Err(ConfigError::Invalid(
                "max retained keys must be at least 2".to_string(),
            ));
        }
        if self.max_poll_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "max poll interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Rotation interval as a chrono duration.
    #[must_use]
    pub fn rotation_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.rotation_interval_seconds)
    }

    /// Overlap window as a chrono duration.
    #[must_use]
    pub fn overlap(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.overlap_seconds)
    }

    /// Validation grace as a chrono duration.
    #[must_use]
    pub fn validation_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.validation_grace_seconds)
    }
}

fn parse_var<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match vars.get(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
            var: name.to_string(),
            reason: format!("{}", e),
        }),
    }
}
