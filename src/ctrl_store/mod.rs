pub mod ctrl_tree;
pub mod dataset;
pub mod search_area;

pub use ctrl_tree::{CtrlTree, SpatialCtrl};
pub use dataset::{load_dataset, parse_dataset, CtrlRow};
pub use search_area::SearchArea;

use crate::error::Result;
use crate::types::ControlPoint;
use std::sync::Arc;

/// Read-only bounding-box access to the control point dataset
pub trait CtrlQuery {
    /// Every point strictly inside the search box around (lat, lng).
    ///
    /// Superset of the true circle, unordered. Errors only for a malformed
    /// query or an unavailable backing store.
    fn query_in_area(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
    ) -> Result<Vec<Arc<ControlPoint>>>;

    /// Some point inside the search box.
    ///
    /// Not ranked by distance: with several matches any one of them may come
    /// back. Use `ProximityEvaluator` when the closest point matters.
    fn query_nearest(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
    ) -> Result<Option<Arc<ControlPoint>>> {
        Ok(self
            .query_in_area(latitude, longitude, radius_m)?
            .into_iter()
            .next())
    }
}
