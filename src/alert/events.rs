use serde::{Deserialize, Serialize};

/// Visual warning state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    #[default]
    Neutral,
    Warning,
}

/// Spoken warning tier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceCue {
    In500Meters,
    In200Meters,
    AtYourPosition,
}

impl VoiceCue {
    pub fn message(&self) -> &'static str {
        match self {
            VoiceCue::In500Meters => "Warning in 500 meters.",
            VoiceCue::In200Meters => "Warning in 200 meters.",
            VoiceCue::AtYourPosition => "Warning at your position.",
        }
    }
}

/// Open distance interval (lower, upper) that triggers one voice cue
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceBand {
    pub lower_m: u32,
    pub upper_m: u32,
    pub cue: VoiceCue,
}

impl DistanceBand {
    pub fn contains(&self, distance_m: u32) -> bool {
        distance_m > self.lower_m && distance_m < self.upper_m
    }
}

pub const BANDS: [DistanceBand; 3] = [
    DistanceBand {
        lower_m: 450,
        upper_m: 550,
        cue: VoiceCue::In500Meters,
    },
    DistanceBand {
        lower_m: 150,
        upper_m: 250,
        cue: VoiceCue::In200Meters,
    },
    DistanceBand {
        lower_m: 40,
        upper_m: 100,
        cue: VoiceCue::AtYourPosition,
    },
];

/// Index into `BANDS` for a distance, if any
pub fn band_index(distance_m: u32) -> Option<usize> {
    BANDS.iter().position(|band| band.contains(distance_m))
}

/// What the display shows while a control point is tracked
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisplayUpdate {
    pub ctrl_id: i64,
    pub description: String,
    /// Control point speed limit, 0 = none
    pub speed_kmh: u32,
    pub distance_m: u32,
    pub level: AlertLevel,
}

/// Discrete event for the alert sink
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AlertEvent {
    PlayNotification,
    Speak { cue: VoiceCue, message: String },
    SetDisplay(DisplayUpdate),
    ClearDisplay,
}

impl AlertEvent {
    pub fn speak(cue: VoiceCue) -> Self {
        AlertEvent::Speak {
            cue,
            message: cue.message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands_are_open_intervals() {
        assert_eq!(band_index(600), None);
        assert_eq!(band_index(550), None);
        assert_eq!(band_index(549), Some(0));
        assert_eq!(band_index(451), Some(0));
        assert_eq!(band_index(450), None);
        assert_eq!(band_index(300), None);
        assert_eq!(band_index(200), Some(1));
        assert_eq!(band_index(100), None);
        assert_eq!(band_index(99), Some(2));
        assert_eq!(band_index(40), None);
        assert_eq!(band_index(10), None);
    }

    #[test]
    fn test_level_defaults_to_neutral() {
        assert_eq!(AlertLevel::default(), AlertLevel::Neutral);
        assert_eq!(serde_json::to_string(&AlertLevel::Warning).unwrap(), r#""WARNING""#);
    }

    #[test]
    fn test_event_json_shape() {
        let event = AlertEvent::speak(VoiceCue::In200Meters);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.starts_with(r#"{"event":"speak""#), "got {}", json);
        assert!(json.contains(r#""message":"Warning in 200 meters.""#));
        let back: AlertEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);

        let json = serde_json::to_string(&AlertEvent::ClearDisplay).unwrap();
        assert_eq!(json, r#"{"event":"clear_display"}"#);
    }
}
