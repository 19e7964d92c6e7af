//! Speed-control proximity warnings.
//!
//! Position fixes go through a bounding-box prefilter on an R-Tree of control
//! points, the closest point is picked by haversine distance, and an alert
//! state machine turns the result into display, sound and voice events.

pub mod alert;
pub mod config;
pub mod ctrl_store;
pub mod driver;
pub mod error;
pub mod live_status;
pub mod location;
pub mod proximity;
pub mod types;
