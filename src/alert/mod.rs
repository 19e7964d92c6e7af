//! Warning logic: proximity results in, sink events out

pub mod events;
pub mod sink;
pub mod state_machine;

pub use events::{band_index, AlertEvent, AlertLevel, DisplayUpdate, DistanceBand, VoiceCue, BANDS};
pub use sink::{dispatch, spawn_dispatcher, AlertSink, DispatchStats, JsonLinesSink, LogSink};
pub use state_machine::{AlertState, AlertStateMachine, ResetReason, UNSET_DISTANCE};
