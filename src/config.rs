use crate::error::{Result, WarnError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const WARN_DISTANCE_METERS: u32 = 500;
pub const DELTA_TIME_BETWEEN_NOTIFICATIONS_SECS: f64 = 10.0;
pub const DELAY_RESET_WARNING_MS: u64 = 60_000;
pub const COUNTER_MOVE_FURTHER_AWAY: u32 = 3;
pub const INTERVAL_MAIN_DRIVER_MS: u64 = 1_000;
pub const GPS_UPDATE_FREQUENCY_MS: u64 = 800;
/// Cap for area listings
pub const MAX_CTRLS_IN_AREA: usize = 500;

/// Runtime options for the warning pipeline.
///
/// Loaded from JSON; every key is optional and also accepted under its
/// historic constant name (e.g. `WARN_DISTANCE_METERS`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    #[serde(alias = "WARN_DISTANCE_METERS")]
    pub warn_distance_m: u32,
    #[serde(alias = "delta_time_between_notifications")]
    pub notification_interval_secs: f64,
    #[serde(alias = "DELAY_RESET_WARNING")]
    pub reset_warning_delay_ms: u64,
    #[serde(alias = "COUNTER_MOVE_FURTHER_AWAY")]
    pub move_further_away_count: u32,
    #[serde(alias = "INTERVAL_MAIN_DRIVER")]
    pub main_driver_interval_ms: u64,
    #[serde(alias = "GPS_UPDATE_FREQUENCY")]
    pub gps_update_interval_ms: u64,
    #[serde(alias = "PLAY_NOTIFICATION")]
    pub play_notification: bool,
    #[serde(alias = "PLAY_TTS")]
    pub play_tts: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            warn_distance_m: WARN_DISTANCE_METERS,
            notification_interval_secs: DELTA_TIME_BETWEEN_NOTIFICATIONS_SECS,
            reset_warning_delay_ms: DELAY_RESET_WARNING_MS,
            move_further_away_count: COUNTER_MOVE_FURTHER_AWAY,
            main_driver_interval_ms: INTERVAL_MAIN_DRIVER_MS,
            gps_update_interval_ms: GPS_UPDATE_FREQUENCY_MS,
            play_notification: true,
            play_tts: true,
        }
    }
}

impl AlertConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            WarnError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| WarnError::Config(format!("Failed to parse config: {}", e)))?;
        // serde would otherwise fill the fields positionally from an array
        if !value.is_object() {
            return Err(WarnError::Config(
                "config must be a JSON object".to_string(),
            ));
        }
        let config: AlertConfig = serde_json::from_value(value)
            .map_err(|e| WarnError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.warn_distance_m == 0 {
            return Err(WarnError::Config("warn_distance_m must be > 0".to_string()));
        }
        if !(self.notification_interval_secs.is_finite() && self.notification_interval_secs >= 0.0) {
            return Err(WarnError::Config(format!(
                "notification_interval_secs must be >= 0, got {}",
                self.notification_interval_secs
            )));
        }
        if self.move_further_away_count == 0 {
            return Err(WarnError::Config("move_further_away_count must be > 0".to_string()));
        }
        if self.main_driver_interval_ms == 0 || self.gps_update_interval_ms == 0 {
            return Err(WarnError::Config("intervals must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn reset_warning_delay_secs(&self) -> f64 {
        self.reset_warning_delay_ms as f64 / 1000.0
    }

    pub fn main_driver_interval(&self) -> Duration {
        Duration::from_millis(self.main_driver_interval_ms)
    }

    pub fn gps_update_interval(&self) -> Duration {
        Duration::from_millis(self.gps_update_interval_ms)
    }
}
