use super::events::{band_index, AlertEvent, AlertLevel, DisplayUpdate, BANDS};
use crate::config::AlertConfig;
use crate::types::ProximityResult;

/// Stand-in for "no distance seen yet"
pub const UNSET_DISTANCE: u32 = u32::MAX;

/// Mutable warning state, owned by exactly one `AlertStateMachine`
#[derive(Clone, Debug, PartialEq)]
pub struct AlertState {
    last_alerted_distance: u32,
    consecutive_increase_count: u32,
    last_warning_received_at: Option<f64>,
    band_last_fired: [Option<f64>; BANDS.len()],
    last_notification_at: Option<f64>,
    active_level: AlertLevel,
    tracked_ctrl: Option<i64>,
}

impl AlertState {
    fn new() -> Self {
        Self {
            last_alerted_distance: UNSET_DISTANCE,
            consecutive_increase_count: 0,
            last_warning_received_at: None,
            band_last_fired: [None; BANDS.len()],
            last_notification_at: None,
            active_level: AlertLevel::Neutral,
            tracked_ctrl: None,
        }
    }

    pub fn last_alerted_distance(&self) -> u32 {
        self.last_alerted_distance
    }

    pub fn consecutive_increase_count(&self) -> u32 {
        self.consecutive_increase_count
    }

    pub fn last_warning_received_at(&self) -> Option<f64> {
        self.last_warning_received_at
    }

    pub fn band_last_fired(&self, band: usize) -> Option<f64> {
        self.band_last_fired.get(band).copied().flatten()
    }

    pub fn last_notification_at(&self) -> Option<f64> {
        self.last_notification_at
    }

    pub fn active_level(&self) -> AlertLevel {
        self.active_level
    }

    /// Control point the distances are currently compared against
    pub fn tracked_ctrl(&self) -> Option<i64> {
        self.tracked_ctrl
    }
}

/// Why the machine dropped back to NEUTRAL
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetReason {
    MovedAway,
    Timeout,
}

/// Turns proximity results into sink events
///
/// # Transitions
/// - In-range result: WARNING, display update, throttled sound and voice cues
/// - N consecutive growing distances: NEUTRAL, counter back to 0
/// - Closest point changes: distance baseline starts over
/// - Timer tick with no result for the reset window: NEUTRAL
///
/// # Throttling
/// Every cue has its own last-fired stamp; a cue repeats only after
/// `notification_interval_secs`. Voice cues also require a shrinking distance.
/// Stamps are committed before the event leaves, so a failing sink cannot
/// make a cue fire twice.
///
/// All timestamps are seconds on one monotonic clock supplied by the caller.
pub struct AlertStateMachine {
    config: AlertConfig,
    state: AlertState,
    last_reset: Option<ResetReason>,
}

impl AlertStateMachine {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            config,
            state: AlertState::new(),
            last_reset: None,
        }
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    pub fn level(&self) -> AlertLevel {
        self.state.active_level
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Reason of the most recent forced reset, cleared on read
    pub fn take_reset(&mut self) -> Option<ResetReason> {
        self.last_reset.take()
    }

    /// Feed one proximity result
    pub fn on_result(&mut self, result: &ProximityResult, now: f64) -> Vec<AlertEvent> {
        let mut events = Vec::new();
        let ctrl = match result.closest.as_ref() {
            Some(ctrl) => ctrl,
            None => return events,
        };
        let distance = result.distance_m;

        self.state.last_warning_received_at = Some(now);

        // Distances of different points are not comparable
        if self.state.tracked_ctrl != Some(ctrl.id) {
            if let Some(previous) = self.state.tracked_ctrl {
                log::debug!("Closest control point changed {} -> {}", previous, ctrl.id);
            }
            self.state.tracked_ctrl = Some(ctrl.id);
            self.state.last_alerted_distance = UNSET_DISTANCE;
            self.state.consecutive_increase_count = 0;
        }

        if distance > self.state.last_alerted_distance {
            self.state.consecutive_increase_count += 1;
        } else {
            self.state.consecutive_increase_count = 0;
        }

        if self.state.consecutive_increase_count >= self.config.move_further_away_count {
            log::info!(
                "Moving away from control point {} ({} m), resetting warning",
                ctrl.id,
                distance
            );
            self.reset_to_neutral(ResetReason::MovedAway, &mut events);
            self.state.last_alerted_distance = distance;
            return events;
        }

        let previous = self.state.last_alerted_distance;
        if self.state.active_level != AlertLevel::Warning {
            log::info!(
                "Warning: control point {} '{}' in {} m",
                ctrl.id,
                ctrl.description,
                distance
            );
        }
        self.state.active_level = AlertLevel::Warning;

        events.push(AlertEvent::SetDisplay(DisplayUpdate {
            ctrl_id: ctrl.id,
            description: ctrl.description.clone(),
            speed_kmh: ctrl.speed_limit,
            distance_m: distance,
            level: AlertLevel::Warning,
        }));

        if self.config.play_notification {
            if self.elapsed_since(self.state.last_notification_at, now) {
                self.state.last_notification_at = Some(now);
                events.push(AlertEvent::PlayNotification);
            } else {
                log::debug!("Skipping notification, played recently");
            }
        }

        if self.config.play_tts && previous > distance {
            if let Some(band) = band_index(distance) {
                if self.elapsed_since(self.state.band_last_fired[band], now) {
                    self.state.band_last_fired[band] = Some(now);
                    let cue = BANDS[band].cue;
                    log::info!("Voice cue {:?} at {} m", cue, distance);
                    events.push(AlertEvent::speak(cue));
                }
            }
        }

        self.state.last_alerted_distance = distance;
        events
    }

    /// Periodic timer tick; drops a stale or abandoned warning.
    ///
    /// Resets when no result arrived for the reset window, or when the
    /// increase counter is at the threshold. `on_result` already resets and
    /// zeroes the counter the moment it reaches the threshold, so in practice
    /// only the timeout fires here.
    pub fn on_tick(&mut self, now: f64) -> Vec<AlertEvent> {
        let mut events = Vec::new();
        if self.state.active_level != AlertLevel::Warning {
            return events;
        }

        let stale = self
            .state
            .last_warning_received_at
            .map_or(true, |at| now - at > self.config.reset_warning_delay_secs());
        let moved_away =
            self.state.consecutive_increase_count >= self.config.move_further_away_count;

        if stale || moved_away {
            let reason = if moved_away {
                ResetReason::MovedAway
            } else {
                ResetReason::Timeout
            };
            log::info!("Resetting warning ({:?})", reason);
            self.reset_to_neutral(reason, &mut events);
            self.state.last_alerted_distance = UNSET_DISTANCE;
            self.state.tracked_ctrl = None;
        }
        events
    }

    fn reset_to_neutral(&mut self, reason: ResetReason, events: &mut Vec<AlertEvent>) {
        if self.state.active_level == AlertLevel::Warning {
            events.push(AlertEvent::ClearDisplay);
        }
        self.state.active_level = AlertLevel::Neutral;
        self.state.consecutive_increase_count = 0;
        self.last_reset = Some(reason);
    }

    fn elapsed_since(&self, last: Option<f64>, now: f64) -> bool {
        last.map_or(true, |at| now - at >= self.config.notification_interval_secs)
    }
}
