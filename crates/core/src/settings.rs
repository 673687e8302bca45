use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default rest-countdown tick.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("tick interval must be > 0 ms")]
    InvalidTickInterval,
    #[error("max rest must be > 0 seconds when set")]
    InvalidMaxRest,
}

/// What to do with a set value that is not a non-negative integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputPolicy {
    /// Treat non-numeric, negative or oversized input as 0.
    #[default]
    Coerce,
    /// Refuse the value and leave the cursor where it is.
    Reject,
}

/// Validated engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    input_policy: InputPolicy,
    tick_interval: Duration,
    max_rest_secs: Option<u32>,
}

/// Unvalidated settings, e.g. as read from a host config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettingsDraft {
    pub input_policy: InputPolicy,
    pub tick_interval_ms: Option<u64>,
    pub max_rest_secs: Option<u32>,
}

impl EngineSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns `SettingsError` for a zero tick interval or a zero rest cap.
    pub fn validate(self) -> Result<EngineSettings, SettingsError> {
        let tick_interval_ms = self.tick_interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS);
        if tick_interval_ms == 0 {
            return Err(SettingsError::InvalidTickInterval);
        }
        if self.max_rest_secs == Some(0) {
            return Err(SettingsError::InvalidMaxRest);
        }

        Ok(EngineSettings {
            input_policy: self.input_policy,
            tick_interval: Duration::from_millis(tick_interval_ms),
            max_rest_secs: self.max_rest_secs,
        })
    }
}

impl EngineSettings {
    #[must_use]
    pub fn input_policy(&self) -> InputPolicy {
        self.input_policy
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    #[must_use]
    pub fn max_rest_secs(&self) -> Option<u32> {
        self.max_rest_secs
    }

    /// Rest duration after applying the optional cap.
    #[must_use]
    pub fn effective_rest(&self, rest_secs: u32) -> u32 {
        match self.max_rest_secs {
            Some(cap) => rest_secs.min(cap),
            None => rest_secs,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            input_policy: InputPolicy::Coerce,
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            max_rest_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_draft_matches_defaults() {
        let settings = EngineSettingsDraft::new().validate().unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(settings.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn rejects_zero_values() {
        let draft = EngineSettingsDraft {
            tick_interval_ms: Some(0),
            ..EngineSettingsDraft::default()
        };
        assert_eq!(draft.validate().unwrap_err(), SettingsError::InvalidTickInterval);

        let draft = EngineSettingsDraft {
            max_rest_secs: Some(0),
            ..EngineSettingsDraft::default()
        };
        assert_eq!(draft.validate().unwrap_err(), SettingsError::InvalidMaxRest);
    }

    #[test]
    fn deserializes_partial_json() {
        let draft: EngineSettingsDraft =
            serde_json::from_str(r#"{ "input_policy": "reject", "max_rest_secs": 90 }"#).unwrap();
        let settings = draft.validate().unwrap();
        assert_eq!(settings.input_policy(), InputPolicy::Reject);
        assert_eq!(settings.effective_rest(120), 90);
        assert_eq!(settings.effective_rest(45), 45);
    }
}
