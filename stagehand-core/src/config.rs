//! Runtime configuration
//!
//! Everything here has a sensible default, so a partial (or empty) JSON
//! document is valid:
//!
//! ```
//! use stagehand_core::{Channel, StagehandConfig};
//!
//! let config = StagehandConfig::from_json(r#"{
//!     "disabled_channels": ["appearance"],
//!     "fire_log": { "enabled": true, "exclude": ["population"] }
//! }"#).unwrap();
//!
//! assert_eq!(config.disabled_channels, vec![Channel::Appearance]);
//! assert!(config.fire_log.enabled);
//! assert_eq!(config.fire_log.capacity, 100);
//! assert_eq!(config.stage_step.shift, 5);
//! ```

use crate::channel::Channel;
use crate::debug::FireLogConfig;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Top-level configuration applied by [`Bus::with_config`](crate::Bus::with_config)
/// and [`SessionContext::with_config`](crate::SessionContext::with_config)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagehandConfig {
    /// In-memory fire log
    pub fire_log: FireLogConfig,
    /// Channels whose fires are logged but never delivered
    pub disabled_channels: Vec<Channel>,
    /// Staging click multipliers
    pub stage_step: StageStepConfig,
}

impl StagehandConfig {
    /// Parse a JSON document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Amount staged per click, by held modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageStepConfig {
    /// Ctrl-click towards a capacity-limited target
    pub ctrl_capped: u32,
    /// Ctrl-click towards an unlimited target
    pub ctrl_uncapped: u32,
    /// Shift-click
    pub shift: u32,
}

impl Default for StageStepConfig {
    fn default() -> Self {
        Self {
            ctrl_capped: 5,
            ctrl_uncapped: 1000,
            shift: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = StagehandConfig::from_json("{}").unwrap();
        assert_eq!(config, StagehandConfig::default());
        assert!(!config.fire_log.enabled);
        assert!(config.disabled_channels.is_empty());
    }

    #[test]
    fn test_partial_stage_step() {
        let config = StagehandConfig::from_json(r#"{ "stage_step": { "shift": 10 } }"#).unwrap();
        assert_eq!(config.stage_step.shift, 10);
        assert_eq!(config.stage_step.ctrl_capped, 5);
        assert_eq!(config.stage_step.ctrl_uncapped, 1000);
    }

    #[test]
    fn test_unknown_channel_is_error() {
        let err = StagehandConfig::from_json(r#"{ "disabled_channels": ["nope"] }"#);
        assert!(matches!(err, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = StagehandConfig {
            disabled_channels: vec![Channel::Training, Channel::SlotMutated],
            fire_log: FireLogConfig::from_patterns(Some("slot*"), None),
            ..Default::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(StagehandConfig::from_json(&json).unwrap(), config);
    }
}
