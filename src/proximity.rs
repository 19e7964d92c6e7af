use crate::ctrl_store::CtrlQuery;
use crate::types::{ControlPoint, PositionFix, ProximityResult};
use geo::{HaversineDistance, Point};
use std::sync::Arc;

/// Great-circle distance in meters (geo crate haversine, mean earth radius)
pub fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    // geo uses Point(x = lng, y = lat)
    let a = Point::new(lng1, lat1);
    let b = Point::new(lng2, lat2);
    a.haversine_distance(&b)
}

/// Whole meters, truncated
pub fn distance_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> u32 {
    haversine_m(lat1, lng1, lat2, lng2) as u32
}

/// Picks the closest control point for each position fix
///
/// # Two phases
/// 1. Bounding-box prefilter through the store (cheap, superset)
/// 2. Exact haversine distance for the few candidates left
///
/// Candidates farther away than the warn distance (box corners) are dropped,
/// so a returned point is always really in range.
///
/// # Usage
/// ```no_run
/// use ctrl_warner_rs::ctrl_store::CtrlTree;
/// use ctrl_warner_rs::proximity::ProximityEvaluator;
/// use ctrl_warner_rs::types::PositionFix;
/// use std::sync::Arc;
///
/// let store = Arc::new(CtrlTree::new());
/// let evaluator = ProximityEvaluator::new(store, 500);
/// let result = evaluator.evaluate(&PositionFix::new(48.0, 11.0, 20.0, 0.0));
/// if let Some(ctrl) = result.closest {
///     println!("{} in {} m", ctrl.description, result.distance_m);
/// }
/// ```
pub struct ProximityEvaluator<Q: ?Sized> {
    store: Arc<Q>,
    warn_distance_m: u32,
}

impl<Q: CtrlQuery + ?Sized> ProximityEvaluator<Q> {
    pub fn new(store: Arc<Q>, warn_distance_m: u32) -> Self {
        ProximityEvaluator {
            store,
            warn_distance_m,
        }
    }

    pub fn warn_distance_m(&self) -> u32 {
        self.warn_distance_m
    }

    pub fn store(&self) -> &Arc<Q> {
        &self.store
    }

    /// Closest in-range control point for one fix.
    ///
    /// Never fails: invalid fixes and store errors yield an empty result.
    pub fn evaluate(&self, fix: &PositionFix) -> ProximityResult {
        if !fix.is_valid() {
            log::debug!(
                "Ignoring invalid fix ({}, {})",
                fix.latitude,
                fix.longitude
            );
            return ProximityResult::none();
        }

        let candidates = match self.store.query_in_area(
            fix.latitude,
            fix.longitude,
            self.warn_distance_m as f64,
        ) {
            Ok(candidates) => candidates,
            Err(e) => {
                log::warn!("Control point query failed, no warnings this fix: {}", e);
                return ProximityResult::none();
            }
        };

        let mut best: Option<(Arc<ControlPoint>, u32)> = None;
        for ctrl in candidates {
            let dist = distance_meters(fix.latitude, fix.longitude, ctrl.latitude, ctrl.longitude);
            if dist > self.warn_distance_m {
                continue;
            }
            // Strict: first encountered wins a tie
            if best.as_ref().map_or(true, |(_, d)| dist < *d) {
                best = Some((ctrl, dist));
            }
        }

        match best {
            Some((ctrl, dist)) => ProximityResult::found(ctrl, dist),
            None => ProximityResult::none(),
        }
    }

    /// All points within `radius_m`, nearest first, at most `limit`
    pub fn ranked(&self, fix: &PositionFix, radius_m: u32, limit: usize) -> Vec<(Arc<ControlPoint>, u32)> {
        if !fix.is_valid() {
            return Vec::new();
        }

        let candidates = match self.store.query_in_area(fix.latitude, fix.longitude, radius_m as f64) {
            Ok(candidates) => candidates,
            Err(e) => {
                log::warn!("Control point query failed: {}", e);
                return Vec::new();
            }
        };

        let mut ranked: Vec<(Arc<ControlPoint>, u32)> = candidates
            .into_iter()
            .map(|ctrl| {
                let dist = distance_meters(fix.latitude, fix.longitude, ctrl.latitude, ctrl.longitude);
                (ctrl, dist)
            })
            .filter(|(_, dist)| *dist <= radius_m)
            .collect();

        ranked.sort_by_key(|(_, dist)| *dist);
        ranked.truncate(limit);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctrl_store::{CtrlTree, SearchArea};
    use crate::error::{Result, WarnError};
    use approx::assert_relative_eq;

    struct UnavailableStore;

    impl CtrlQuery for UnavailableStore {
        fn query_in_area(&self, _: f64, _: f64, _: f64) -> Result<Vec<Arc<ControlPoint>>> {
            Err(WarnError::StoreUnavailable("database not loaded".to_string()))
        }
    }

    fn evaluator(points: Vec<ControlPoint>) -> ProximityEvaluator<CtrlTree> {
        ProximityEvaluator::new(Arc::new(CtrlTree::from_points(points)), 500)
    }

    #[test]
    fn test_distance_metric() {
        // 0.001 deg latitude ≈ 111m
        let d = haversine_m(48.0, 11.0, 48.001, 11.0);
        assert_relative_eq!(d, 111.2, epsilon = 0.5);

        assert_eq!(distance_meters(48.0, 11.0, 48.0, 11.0), 0);
        assert_eq!(distance_meters(48.0, 11.0, 48.001, 11.0), d as u32);
    }

    #[test]
    fn test_no_candidates() {
        let eval = evaluator(vec![ControlPoint::new(1, 49.0, 11.0, 80, "far")]);
        let result = eval.evaluate(&PositionFix::new(48.0, 11.0, 20.0, 0.0));
        assert!(!result.is_in_range());
    }

    #[test]
    fn test_picks_geodesic_closest_not_box_order() {
        let area = SearchArea::around(48.0, 11.0, 500.0);
        // Near the box corner: inside the box, but ~630m away
        let corner = ControlPoint::new(1, 48.004, 11.006, 80, "corner");
        // Due east, ~484m away
        let center = ControlPoint::new(2, 48.0, 11.0065, 60, "center line");
        assert!(area.contains(corner.latitude, corner.longitude));
        assert!(area.contains(center.latitude, center.longitude));

        let eval = evaluator(vec![corner, center]);
        let result = eval.evaluate(&PositionFix::new(48.0, 11.0, 20.0, 0.0));

        let closest = result.closest.expect("center point is in range");
        assert_eq!(closest.id, 2);
        assert!(result.distance_m > 470 && result.distance_m < 500, "got {}", result.distance_m);
    }

    #[test]
    fn test_box_only_match_is_not_in_range() {
        let eval = evaluator(vec![ControlPoint::new(1, 48.004, 11.006, 80, "corner")]);
        let result = eval.evaluate(&PositionFix::new(48.0, 11.0, 20.0, 0.0));
        assert!(result.closest.is_none());
    }

    #[test]
    fn test_distance_is_truncated() {
        let eval = evaluator(vec![ControlPoint::new(1, 48.002, 11.0, 80, "north")]);
        let result = eval.evaluate(&PositionFix::new(48.0, 11.0, 20.0, 0.0));
        let exact = haversine_m(48.0, 11.0, 48.002, 11.0);
        assert_eq!(result.distance_m, exact.floor() as u32);
    }

    #[test]
    fn test_tie_keeps_first_encountered() {
        // Same spot twice: whichever the store yields first wins
        let eval = evaluator(vec![
            ControlPoint::new(1, 48.001, 11.0, 80, "a"),
            ControlPoint::new(2, 48.001, 11.0, 80, "b"),
        ]);
        let fix = PositionFix::new(48.0, 11.0, 20.0, 0.0);
        let first = eval.store().query_in_area(48.0, 11.0, 500.0).unwrap()[0].id;
        assert_eq!(eval.evaluate(&fix).closest.unwrap().id, first);
    }

    #[test]
    fn test_invalid_fix_short_circuits() {
        let eval = evaluator(vec![ControlPoint::new(1, 48.0, 11.0, 80, "here")]);
        assert!(eval.evaluate(&PositionFix::new(f64::NAN, 11.0, 0.0, 0.0)).closest.is_none());
        assert!(eval.evaluate(&PositionFix::new(0.0, 0.0, 0.0, 0.0)).closest.is_none());
    }

    #[test]
    fn test_unavailable_store_degrades() {
        let eval = ProximityEvaluator::new(Arc::new(UnavailableStore), 500);
        let result = eval.evaluate(&PositionFix::new(48.0, 11.0, 20.0, 0.0));
        assert!(result.closest.is_none());
        assert!(eval.ranked(&PositionFix::new(48.0, 11.0, 20.0, 0.0), 1500, 10).is_empty());
    }

    #[test]
    fn test_ranked_sorted_and_capped() {
        let eval = evaluator(vec![
            ControlPoint::new(1, 48.009, 11.0, 80, "1km"),
            ControlPoint::new(2, 48.001, 11.0, 80, "111m"),
            ControlPoint::new(3, 48.004, 11.0, 80, "445m"),
            ControlPoint::new(4, 48.05, 11.0, 80, "5.5km"),
        ]);
        let fix = PositionFix::new(48.0, 11.0, 0.0, 0.0);

        let ranked = eval.ranked(&fix, 1500, 500);
        let ids: Vec<i64> = ranked.iter().map(|(c, _)| c.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert!(ranked.windows(2).all(|w| w[0].1 <= w[1].1));

        let capped = eval.ranked(&fix, 1500, 2);
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0].0.id, 2);
    }
}
