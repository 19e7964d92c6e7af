use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fixed geographic point the driver is warned about
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    /// km/h, 0 = no associated limit
    pub speed_limit: u32,
    pub description: String,
}

impl ControlPoint {
    pub fn new(id: i64, latitude: f64, longitude: f64, speed_limit: u32, description: &str) -> Self {
        Self {
            id,
            latitude,
            longitude,
            speed_limit,
            description: description.to_string(),
        }
    }

    /// Short "max N km/h" label, None when the point carries no limit
    pub fn speed_label(&self) -> Option<String> {
        if self.speed_limit == 0 {
            return None;
        }
        Some(format!("max {} km/h", self.speed_limit))
    }
}

/// Position fix pushed by the location provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, alias = "speed")]
    pub speed_mps: f64,
    #[serde(default, alias = "accuracy")]
    pub accuracy_m: f64,
    #[serde(default)]
    pub timestamp: f64,
}

impl PositionFix {
    pub fn new(latitude: f64, longitude: f64, speed_mps: f64, timestamp: f64) -> Self {
        Self {
            latitude,
            longitude,
            speed_mps,
            accuracy_m: 0.0,
            timestamp,
        }
    }

    /// Coordinates usable for a proximity query.
    ///
    /// An exact (0, 0) fix is what the platform hands out when the extras were
    /// missing, so it counts as "no update" as well.
    pub fn is_valid(&self) -> bool {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return false;
        }
        if self.latitude.abs() > 90.0 || self.longitude.abs() > 180.0 {
            return false;
        }
        !(self.latitude == 0.0 && self.longitude == 0.0)
    }

    /// Speed in m/s with NaN and negative readings clamped to 0
    pub fn sanitized_speed_mps(&self) -> f64 {
        if self.speed_mps.is_finite() && self.speed_mps > 0.0 {
            self.speed_mps
        } else {
            0.0
        }
    }

    /// Truncated km/h
    pub fn speed_kmh(&self) -> u32 {
        (self.sanitized_speed_mps() * 3.6) as u32
    }
}

/// Closest in-range control point for one fix
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProximityResult {
    pub closest: Option<Arc<ControlPoint>>,
    /// Only meaningful when `closest` is set
    pub distance_m: u32,
}

impl ProximityResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn found(point: Arc<ControlPoint>, distance_m: u32) -> Self {
        Self {
            closest: Some(point),
            distance_m,
        }
    }

    pub fn is_in_range(&self) -> bool {
        self.closest.is_some()
    }
}
