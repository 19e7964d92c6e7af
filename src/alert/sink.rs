use super::events::{AlertEvent, DisplayUpdate};
use crate::error::{Result, WarnError};
use crossbeam::channel::Receiver;
use std::io::Write;
use std::thread::{self, JoinHandle};

/// UI / audio layer receiving alert events
pub trait AlertSink: Send {
    fn play_notification(&mut self) -> Result<()>;
    fn speak(&mut self, message: &str) -> Result<()>;
    fn set_display(&mut self, display: &DisplayUpdate) -> Result<()>;
    fn clear_display(&mut self) -> Result<()>;

    /// Whole-event entry point; routes to the calls above unless overridden
    fn handle(&mut self, event: &AlertEvent) -> Result<()> {
        match event {
            AlertEvent::PlayNotification => self.play_notification(),
            AlertEvent::Speak { message, .. } => self.speak(message),
            AlertEvent::SetDisplay(display) => self.set_display(display),
            AlertEvent::ClearDisplay => self.clear_display(),
        }
    }
}

/// Hand one event to the sink
pub fn dispatch<S: AlertSink + ?Sized>(sink: &mut S, event: &AlertEvent) -> Result<()> {
    sink.handle(event)
}

/// Counters returned when the dispatcher thread ends
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub failed: u64,
}

/// Drain the event channel into `sink` on a dedicated thread.
///
/// Sink failures are logged and counted only; the thread exits once every
/// sender is dropped.
pub fn spawn_dispatcher<S>(rx: Receiver<AlertEvent>, mut sink: S) -> JoinHandle<DispatchStats>
where
    S: AlertSink + 'static,
{
    thread::spawn(move || {
        let mut stats = DispatchStats::default();
        for event in rx.iter() {
            match dispatch(&mut sink, &event) {
                Ok(()) => stats.delivered += 1,
                Err(e) => {
                    stats.failed += 1;
                    log::warn!("Alert sink rejected {:?}: {}", event, e);
                }
            }
        }
        log::debug!(
            "Alert dispatcher finished: {} delivered, {} failed",
            stats.delivered,
            stats.failed
        );
        stats
    })
}

/// Writes every event through the `log` facade
#[derive(Debug, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn play_notification(&mut self) -> Result<()> {
        log::info!("[sink] *ding*");
        Ok(())
    }

    fn speak(&mut self, message: &str) -> Result<()> {
        log::info!("[sink] say: {}", message);
        Ok(())
    }

    fn set_display(&mut self, display: &DisplayUpdate) -> Result<()> {
        let speed = if display.speed_kmh == 0 {
            "-".to_string()
        } else {
            format!("{} km/h", display.speed_kmh)
        };
        log::info!(
            "[sink] {:?} | {} | {} | {} m",
            display.level,
            display.description,
            speed,
            display.distance_m
        );
        Ok(())
    }

    fn clear_display(&mut self) -> Result<()> {
        log::info!("[sink] display cleared");
        Ok(())
    }
}

/// One JSON object per event and line.
///
/// Events routed through `dispatch` are written as full `AlertEvent`s. A bare
/// `speak` call has no cue to report, so that line carries only the message.
pub struct JsonLinesSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line<T: serde::Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let line = serde_json::to_string(value)
            .map_err(|e| WarnError::Sink(format!("Failed to encode event: {}", e)))?;
        writeln!(self.out, "{}", line)
            .and_then(|_| self.out.flush())
            .map_err(|e| WarnError::Sink(format!("Failed to write event: {}", e)))
    }
}

impl<W: Write + Send> AlertSink for JsonLinesSink<W> {
    fn play_notification(&mut self) -> Result<()> {
        self.write_line(&AlertEvent::PlayNotification)
    }

    fn speak(&mut self, message: &str) -> Result<()> {
        self.write_line(&serde_json::json!({ "event": "speak", "message": message }))
    }

    fn set_display(&mut self, display: &DisplayUpdate) -> Result<()> {
        self.write_line(&AlertEvent::SetDisplay(display.clone()))
    }

    fn clear_display(&mut self) -> Result<()> {
        self.write_line(&AlertEvent::ClearDisplay)
    }

    fn handle(&mut self, event: &AlertEvent) -> Result<()> {
        self.write_line(event)
    }
}

/// Keeps every call, optionally failing speech; for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub calls: std::sync::Arc<std::sync::Mutex<Vec<AlertEvent>>>,
    pub fail_speech: bool,
}

#[cfg(test)]
impl AlertSink for RecordingSink {
    fn play_notification(&mut self) -> Result<()> {
        self.calls.lock().unwrap().push(AlertEvent::PlayNotification);
        Ok(())
    }

    fn speak(&mut self, message: &str) -> Result<()> {
        if self.fail_speech {
            return Err(WarnError::Sink("speech engine not ready".to_string()));
        }
        self.calls.lock().unwrap().push(AlertEvent::Speak {
            cue: super::events::VoiceCue::AtYourPosition,
            message: message.to_string(),
        });
        Ok(())
    }

    fn set_display(&mut self, display: &DisplayUpdate) -> Result<()> {
        self.calls.lock().unwrap().push(AlertEvent::SetDisplay(display.clone()));
        Ok(())
    }

    fn clear_display(&mut self) -> Result<()> {
        self.calls.lock().unwrap().push(AlertEvent::ClearDisplay);
        Ok(())
    }
}
