use serde::Deserialize;
use web_time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_VISIBLE_CLASS: &str = "ca-visible";

/// Tuning knobs for a [`Runtime`](crate::Runtime).
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeConfig {
    /// Time between digest ticks. Shorter means lower latency and more work.
    pub tick_interval: Duration,
    /// Class toggled by visibility bindings.
    pub visible_class: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            visible_class: DEFAULT_VISIBLE_CLASS.to_owned(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    tick_interval_ms: u64,
    visible_class: String,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
            visible_class: DEFAULT_VISIBLE_CLASS.to_owned(),
        }
    }
}

impl RuntimeConfig {
    /// Parses `{"tick_interval_ms": 50, "visible_class": "ca-visible"}`;
    /// missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(text)?;
        if raw.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(Self {
            tick_interval: Duration::from_millis(raw.tick_interval_ms),
            visible_class: raw.visible_class,
        })
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn visible_class(mut self, class: impl Into<String>) -> Self {
        self.visible_class = class.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.tick_interval, Duration::from_millis(50));
        assert_eq!(cfg.visible_class, "ca-visible");
    }

    #[test]
    fn test_from_json_partial() {
        let cfg = RuntimeConfig::from_json(r#"{"tick_interval_ms": 200}"#).unwrap();
        assert_eq!(cfg.tick_interval, Duration::from_millis(200));
        assert_eq!(cfg.visible_class, "ca-visible");
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        assert!(matches!(
            RuntimeConfig::from_json(r#"{"tick_interval_ms": 0}"#),
            Err(ConfigError::ZeroInterval)
        ));
        assert!(matches!(
            RuntimeConfig::from_json(r#"{"tick": 5}"#),
            Err(ConfigError::Json(_))
        ));
    }
}
