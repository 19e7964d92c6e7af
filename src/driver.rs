use crate::alert::{AlertEvent, AlertStateMachine};
use crate::ctrl_store::CtrlQuery;
use crate::live_status::LiveStatus;
use crate::proximity::ProximityEvaluator;
use crate::types::PositionFix;
use crossbeam::channel::Sender;
use std::path::PathBuf;
use tokio::sync::mpsc::Receiver;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

/// Minimum gap between two status file writes
const STATUS_SAVE_INTERVAL: Duration = Duration::from_secs(2);

/// Single owner of the alert state machine.
///
/// # Architecture
/// ```text
/// location source --mpsc--> Driver --crossbeam--> dispatcher thread --> AlertSink
///                             ^
///                        interval tick
/// ```
/// Fixes and timer ticks are serialized through one `select!` loop, so the
/// state machine never needs a lock. The control point store is shared
/// read-only through the evaluator's `Arc`.
///
/// # Usage
/// ```no_run
/// # use ctrl_warner_rs::{alert::*, config::AlertConfig, ctrl_store::CtrlTree};
/// # use ctrl_warner_rs::{driver::Driver, proximity::ProximityEvaluator};
/// # use std::sync::Arc;
/// # async fn demo() {
/// let config = AlertConfig::default();
/// let evaluator = ProximityEvaluator::new(Arc::new(CtrlTree::new()), config.warn_distance_m);
/// let (event_tx, event_rx) = crossbeam::channel::unbounded();
/// let dispatcher = spawn_dispatcher(event_rx, LogSink);
/// let (fix_tx, fix_rx) = tokio::sync::mpsc::channel(32);
///
/// let tick = config.main_driver_interval();
/// let driver = Driver::new(evaluator, AlertStateMachine::new(config), event_tx, tick);
/// drop(fix_tx);
/// let _status = driver.run(fix_rx).await;
/// dispatcher.join().ok();
/// # }
/// ```
pub struct Driver<Q: ?Sized> {
    evaluator: ProximityEvaluator<Q>,
    machine: AlertStateMachine,
    events: Sender<AlertEvent>,
    tick_interval: Duration,
    status_path: Option<PathBuf>,
    status: LiveStatus,
    sink_open: bool,
}

impl<Q: CtrlQuery + ?Sized> Driver<Q> {
    pub fn new(
        evaluator: ProximityEvaluator<Q>,
        machine: AlertStateMachine,
        events: Sender<AlertEvent>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            evaluator,
            machine,
            events,
            tick_interval,
            status_path: None,
            status: LiveStatus::new(),
            sink_open: true,
        }
    }

    /// Periodically write the live status to `path`
    pub fn with_status_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.status_path = Some(path.into());
        self
    }

    /// Process fixes and ticks until the fix channel closes
    pub async fn run(mut self, mut fixes: Receiver<PositionFix>) -> LiveStatus {
        let started = Instant::now();
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_save: Option<Instant> = None;

        log::info!(
            "Driver started (warn distance {} m, tick {:?})",
            self.evaluator.warn_distance_m(),
            self.tick_interval
        );

        loop {
            tokio::select! {
                maybe_fix = fixes.recv() => match maybe_fix {
                    Some(fix) => {
                        let now = started.elapsed().as_secs_f64();
                        self.handle_fix(&fix, now);
                    }
                    None => {
                        log::info!("Location source closed, stopping driver");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    let now = started.elapsed().as_secs_f64();
                    self.handle_tick(now);
                }
            }

            self.status
                .touch(self.machine.level(), started.elapsed().as_secs());
            let due = last_save.map_or(true, |at| at.elapsed() >= STATUS_SAVE_INTERVAL);
            if due && self.save_status() {
                last_save = Some(Instant::now());
            }
        }

        self.status
            .touch(self.machine.level(), started.elapsed().as_secs());
        self.save_status();
        log::info!(
            "Driver stopped after {} fixes ({} in range, {} voice cues)",
            self.status.fixes_received,
            self.status.results_in_range,
            self.status.voice_cues
        );
        self.status
    }

    fn handle_fix(&mut self, fix: &PositionFix, now: f64) {
        self.status.fixes_received += 1;
        if fix.is_valid() {
            self.status.gps_speed_kmh = fix.speed_kmh();
        } else {
            self.status.invalid_fixes += 1;
        }

        let result = self.evaluator.evaluate(fix);
        self.status.record_result(&result);
        let events = self.machine.on_result(&result, now);
        self.emit(events);
    }

    fn handle_tick(&mut self, now: f64) {
        let events = self.machine.on_tick(now);
        self.emit(events);
    }

    fn emit(&mut self, events: Vec<AlertEvent>) {
        if let Some(reason) = self.machine.take_reset() {
            self.status.record_reset(reason);
        }
        self.status.record_events(&events);

        if !self.sink_open {
            return;
        }
        for event in events {
            if self.events.send(event).is_err() {
                log::warn!("Alert dispatcher is gone, events are no longer delivered");
                self.sink_open = false;
                self.status.sink_closed = true;
                break;
            }
        }
    }

    /// Returns true when a file was written
    fn save_status(&self) -> bool {
        let path = match self.status_path.as_ref() {
            Some(path) => path,
            None => return false,
        };
        match self.status.save(path) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to write status to {}: {}", path.display(), e);
                false
            }
        }
    }
}
