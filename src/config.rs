//! System configuration parameters
//!
//! All tunable parameters for the shutter controller.  The defaults describe
//! the deployed installation; any field can be overridden from a JSON file
//! passed on the command line.  Configuration is read once at start-up.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub broker: BrokerConfig,
    /// Outdoor brightness sensor.
    #[serde(deserialize_with = "brightness_overlay")]
    pub brightness: SignalConfig,
    /// Outdoor temperature sensor.
    #[serde(deserialize_with = "temperature_overlay")]
    pub temperature: SignalConfig,
    pub shutter: ShutterConfig,
    pub heat_rule: HeatRuleConfig,
    pub dawn_rule: DawnRuleConfig,
    /// Upper bound (milliseconds) a worker waits for a fresh value.
    pub fresh_wait_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub keep_alive_secs: u64,
    pub client_id: String,
}

/// One monitored signal: topic, display name and staleness window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    pub topic: String,
    pub name: String,
    pub timeout_secs: u64,
}

impl SignalConfig {
    pub fn brightness() -> Self {
        Self {
            topic: "Sensor/WZTuF/EG/WZ//H".into(),
            name: "Aussen-Hellig".into(),
            timeout_secs: 100,
        }
    }

    pub fn temperature() -> Self {
        Self {
            topic: "Sensor/WZTuF/EG/WZ//T".into(),
            name: "Aussen-Temp".into(),
            timeout_secs: 100,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// A sensor section as written in the file.  The two sensors have
/// different defaults, so absent fields are filled from the matching one.
#[derive(Deserialize)]
struct SignalOverlay {
    topic: Option<String>,
    name: Option<String>,
    timeout_secs: Option<u64>,
}

impl SignalOverlay {
    fn over(self, base: SignalConfig) -> SignalConfig {
        SignalConfig {
            topic: self.topic.unwrap_or(base.topic),
            name: self.name.unwrap_or(base.name),
            timeout_secs: self.timeout_secs.unwrap_or(base.timeout_secs),
        }
    }
}

fn brightness_overlay<'de, D: Deserializer<'de>>(d: D) -> Result<SignalConfig, D::Error> {
    Ok(SignalOverlay::deserialize(d)?.over(SignalConfig::brightness()))
}

fn temperature_overlay<'de, D: Deserializer<'de>>(d: D) -> Result<SignalConfig, D::Error> {
    Ok(SignalOverlay::deserialize(d)?.over(SignalConfig::temperature()))
}

/// A Shelly 2.5 in roller mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutterConfig {
    pub name: String,
    /// Base topic, e.g. `shellies/shellyswitch25-745815`.
    pub base_topic: String,
    /// Network address used for the HTTP refresh side channel.
    pub address: String,
    /// Staleness window for every status input of the device.
    pub status_timeout_secs: u64,
    /// Position (0-100) at or above which the shutter counts as open.
    pub open_threshold: u8,
    pub refresh: RefreshConfig,
}

/// Parameters of the "push your status now" side channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Publish period requested from the device while refreshing.
    pub update_period_secs: u32,
    /// Pause between the two halves of the sequence.
    pub settle_secs: u64,
    /// Attempts made to reset the publish period back to "never".
    pub reset_attempts: u8,
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatRuleConfig {
    pub enabled: bool,
    /// Temperature (Celsius) above which shading is considered.
    pub temperature_threshold_c: f32,
    /// Minimum brightness that counts as direct sunlight.
    pub min_brightness: u32,
    /// First local hour of the active window (inclusive).
    pub start_hour: u8,
    /// Local hour at which the window closes (exclusive).
    pub end_hour: u8,
    pub cooldown_secs: u64,
    /// Target position (percent open) to move to.
    pub target_position: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DawnRuleConfig {
    pub enabled: bool,
    /// Brightness band (exclusive bounds) that counts as dawn.
    pub min_brightness: u32,
    pub max_brightness: u32,
    pub start_hour: u8,
    pub end_hour: u8,
    pub cooldown_secs: u64,
    pub target_position: u8,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            brightness: SignalConfig::brightness(),
            temperature: SignalConfig::temperature(),
            shutter: ShutterConfig::default(),
            heat_rule: HeatRuleConfig::default(),
            dawn_rule: DawnRuleConfig::default(),
            fresh_wait_ms: 5_000,
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "diskstation.fritz.box".into(),
            port: 1883,
            keep_alive_secs: 60,
            client_id: "shadectl".into(),
        }
    }
}

impl Default for ShutterConfig {
    fn default() -> Self {
        Self {
            name: "SZ".into(),
            base_topic: "shellies/shellyswitch25-745815".into(),
            address: "192.168.2.49".into(),
            status_timeout_secs: 3600, // values stay usable for an hour
            open_threshold: 96,
            refresh: RefreshConfig::default(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            update_period_secs: 2,
            settle_secs: 2,
            reset_attempts: 3,
            http_timeout_secs: 5,
        }
    }
}

impl Default for HeatRuleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            temperature_threshold_c: 27.0,
            min_brightness: 3000,
            start_hour: 11, // west side: no sun before late morning
            end_hour: 20,
            cooldown_secs: 3600,
            target_position: 40,
        }
    }
}

impl Default for DawnRuleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_brightness: 50,
            max_brightness: 500,
            start_hour: 4,
            end_hour: 6,
            cooldown_secs: 3600,
            target_position: 0,
        }
    }
}

impl SystemConfig {
    /// Parse a JSON document.  Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn fresh_wait(&self) -> Duration {
        Duration::from_millis(self.fresh_wait_ms)
    }

    /// Reject values that would make the controller misbehave.
    /// Ranges are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.host.is_empty() {
            return Err(ConfigError::Validation("broker.host"));
        }
        validate_signal(&self.brightness, "brightness")?;
        validate_signal(&self.temperature, "temperature")?;
        if self.brightness.topic == self.temperature.topic {
            return Err(ConfigError::Validation("temperature.topic"));
        }

        let s = &self.shutter;
        if s.base_topic.is_empty() || s.base_topic.ends_with('/') {
            return Err(ConfigError::Validation("shutter.base_topic"));
        }
        if s.status_timeout_secs == 0 {
            return Err(ConfigError::Validation("shutter.status_timeout_secs"));
        }
        if s.open_threshold == 0 || s.open_threshold > 100 {
            return Err(ConfigError::Validation("shutter.open_threshold"));
        }

        let h = &self.heat_rule;
        if h.start_hour > 23 || h.end_hour > 23 {
            return Err(ConfigError::Validation("heat_rule.hours"));
        }
        if h.target_position > 100 {
            return Err(ConfigError::Validation("heat_rule.target_position"));
        }

        let d = &self.dawn_rule;
        if d.start_hour > 23 || d.end_hour > 23 {
            return Err(ConfigError::Validation("dawn_rule.hours"));
        }
        if d.min_brightness >= d.max_brightness {
            return Err(ConfigError::Validation("dawn_rule.brightness"));
        }
        if d.target_position > 100 {
            return Err(ConfigError::Validation("dawn_rule.target_position"));
        }
        Ok(())
    }
}

fn validate_signal(signal: &SignalConfig, field: &'static str) -> Result<(), ConfigError> {
    if signal.topic.is_empty() || signal.timeout_secs == 0 {
        return Err(ConfigError::Validation(field));
    }
    Ok(())
}
