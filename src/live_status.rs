use crate::alert::{AlertEvent, AlertLevel, ResetReason};
use crate::types::ProximityResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Snapshot of the running pipeline, written to disk as JSON
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LiveStatus {
    pub updated_at: String,
    pub uptime_seconds: u64,
    pub fixes_received: u64,
    pub invalid_fixes: u64,
    pub results_in_range: u64,
    /// Speed of the last valid fix
    pub gps_speed_kmh: u32,
    // Alert state
    pub level: AlertLevel,
    pub closest_ctrl_id: Option<i64>,
    pub closest_description: Option<String>,
    pub distance_m: Option<u32>,
    // Emitted events
    pub notifications: u64,
    pub voice_cues: u64,
    pub display_updates: u64,
    pub display_clears: u64,
    // Resets
    pub timeout_resets: u64,
    pub moved_away_resets: u64,
    pub sink_closed: bool,
}

impl LiveStatus {
    pub fn new() -> Self {
        Self {
            updated_at: current_timestamp(),
            uptime_seconds: 0,
            fixes_received: 0,
            invalid_fixes: 0,
            results_in_range: 0,
            gps_speed_kmh: 0,
            level: AlertLevel::Neutral,
            closest_ctrl_id: None,
            closest_description: None,
            distance_m: None,
            notifications: 0,
            voice_cues: 0,
            display_updates: 0,
            display_clears: 0,
            timeout_resets: 0,
            moved_away_resets: 0,
            sink_closed: false,
        }
    }

    pub fn record_result(&mut self, result: &ProximityResult) {
        match result.closest.as_ref() {
            Some(ctrl) => {
                self.results_in_range += 1;
                self.closest_ctrl_id = Some(ctrl.id);
                self.closest_description = Some(ctrl.description.clone());
                self.distance_m = Some(result.distance_m);
            }
            None => {
                self.closest_ctrl_id = None;
                self.closest_description = None;
                self.distance_m = None;
            }
        }
    }

    pub fn record_events(&mut self, events: &[AlertEvent]) {
        for event in events {
            match event {
                AlertEvent::PlayNotification => self.notifications += 1,
                AlertEvent::Speak { .. } => self.voice_cues += 1,
                AlertEvent::SetDisplay(_) => self.display_updates += 1,
                AlertEvent::ClearDisplay => self.display_clears += 1,
            }
        }
    }

    pub fn record_reset(&mut self, reason: ResetReason) {
        match reason {
            ResetReason::Timeout => self.timeout_resets += 1,
            ResetReason::MovedAway => self.moved_away_resets += 1,
        }
    }

    pub fn touch(&mut self, level: AlertLevel, uptime_seconds: u64) {
        self.level = level;
        self.uptime_seconds = uptime_seconds;
        self.updated_at = current_timestamp();
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl Default for LiveStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// RFC 3339 wall-clock time, for display only
pub fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
