use super::{CtrlQuery, SearchArea};
use crate::error::{Result, WarnError};
use crate::types::ControlPoint;
use rstar::{RTree, RTreeObject, AABB};
use std::collections::HashMap;
use std::sync::Arc;

/// Control point wrapped for R-Tree indexing (point envelope at [lng, lat])
#[derive(Clone, Debug)]
pub struct SpatialCtrl {
    pub ctrl: Arc<ControlPoint>,
}

impl RTreeObject for SpatialCtrl {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.ctrl.longitude, self.ctrl.latitude])
    }
}

/// R-Tree spatial index over the control point dataset
///
/// # Architecture
/// - Indexes control points by position, keyed `[lng, lat]`
/// - Bounding-box queries in O(log n) instead of a full scan per fix
/// - Read-only once shared behind an `Arc`; any number of readers, no locks
///
/// # Usage
/// ```no_run
/// use ctrl_warner_rs::ctrl_store::{CtrlQuery, CtrlTree};
/// use ctrl_warner_rs::types::ControlPoint;
///
/// let tree = CtrlTree::from_points(vec![ControlPoint::new(1, 48.0, 11.0, 80, "B13")]);
///
/// // Candidates inside the 500m search box
/// let candidates = tree.query_in_area(48.001, 11.0, 500.0).unwrap();
/// ```
pub struct CtrlTree {
    tree: RTree<SpatialCtrl>,
    by_id: HashMap<i64, Arc<ControlPoint>>,
}

impl CtrlTree {
    /// Create empty tree
    pub fn new() -> Self {
        CtrlTree {
            tree: RTree::new(),
            by_id: HashMap::new(),
        }
    }

    /// Bulk-load a dataset. Later rows with an already seen id are dropped.
    pub fn from_points(points: Vec<ControlPoint>) -> Self {
        let mut by_id = HashMap::with_capacity(points.len());
        let mut spatial = Vec::with_capacity(points.len());

        for point in points {
            if by_id.contains_key(&point.id) {
                log::warn!("Skipping duplicate control point id {}", point.id);
                continue;
            }
            let ctrl = Arc::new(point);
            by_id.insert(ctrl.id, ctrl.clone());
            spatial.push(SpatialCtrl { ctrl });
        }

        CtrlTree {
            tree: RTree::bulk_load(spatial),
            by_id,
        }
    }

    /// Add a single control point. Returns false if the id already exists.
    pub fn insert(&mut self, point: ControlPoint) -> bool {
        if self.by_id.contains_key(&point.id) {
            log::warn!("Control point id {} already indexed", point.id);
            return false;
        }
        let ctrl = Arc::new(point);
        self.by_id.insert(ctrl.id, ctrl.clone());
        self.tree.insert(SpatialCtrl { ctrl });
        true
    }

    /// Lookup by id
    pub fn get(&self, id: i64) -> Option<Arc<ControlPoint>> {
        self.by_id.get(&id).cloned()
    }

    /// Total control points in tree
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ControlPoint>> {
        self.tree.iter().map(|spatial| &spatial.ctrl)
    }
}

impl Default for CtrlTree {
    fn default() -> Self {
        Self::new()
    }
}

impl CtrlQuery for CtrlTree {
    fn query_in_area(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
    ) -> Result<Vec<Arc<ControlPoint>>> {
        validate_query(latitude, longitude, radius_m)?;

        let area = SearchArea::around(latitude, longitude, radius_m);
        let (lower, upper) = area.corners();
        let envelope = AABB::from_corners(lower, upper);

        // R-Tree containment is inclusive; the box test is not
        Ok(self
            .tree
            .locate_in_envelope(&envelope)
            .filter(|spatial| area.contains(spatial.ctrl.latitude, spatial.ctrl.longitude))
            .map(|spatial| spatial.ctrl.clone())
            .collect())
    }
}

fn validate_query(latitude: f64, longitude: f64, radius_m: f64) -> Result<()> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(WarnError::InvalidQuery(format!(
            "non-finite position ({}, {})",
            latitude, longitude
        )));
    }
    if !(radius_m.is_finite() && radius_m > 0.0) {
        return Err(WarnError::InvalidQuery(format!(
            "radius must be > 0, got {}",
            radius_m
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ~111m north of 48.0 per 0.001 deg
    fn munich_points() -> Vec<ControlPoint> {
        vec![
            ControlPoint::new(1, 48.0000, 11.0000, 80, "center"),
            ControlPoint::new(2, 48.0020, 11.0000, 50, "220m north"),
            ControlPoint::new(3, 48.0100, 11.0000, 100, "1.1km north"),
            ControlPoint::new(4, 48.0000, 11.0300, 0, "2.2km east"),
        ]
    }

    fn ids(points: &[Arc<ControlPoint>]) -> Vec<i64> {
        let mut ids: Vec<i64> = points.iter().map(|p| p.id).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_build_tree_from_points() {
        let tree = CtrlTree::from_points(munich_points());
        assert_eq!(tree.len(), 4);
        assert!(!tree.is_empty());
        assert_eq!(tree.get(3).unwrap().description, "1.1km north");
        assert!(tree.get(99).is_none());
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let mut points = munich_points();
        points.push(ControlPoint::new(1, 10.0, 10.0, 30, "duplicate"));

        let tree = CtrlTree::from_points(points);
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.get(1).unwrap().description, "center");
    }

    #[test]
    fn test_query_in_area_basic() {
        let tree = CtrlTree::from_points(munich_points());

        let found = tree.query_in_area(48.0, 11.0, 500.0).unwrap();
        assert_eq!(ids(&found), vec![1, 2]);

        let found = tree.query_in_area(48.0, 11.0, 1500.0).unwrap();
        assert_eq!(ids(&found), vec![1, 2, 3]);

        let found = tree.query_in_area(48.0, 11.0, 5000.0).unwrap();
        assert_eq!(ids(&found), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_results_always_inside_box() {
        let mut points = Vec::new();
        for i in 0..40 {
            for j in 0..40 {
                let id = i * 40 + j;
                points.push(ControlPoint::new(
                    id,
                    47.99 + i as f64 * 0.0005,
                    10.985 + j as f64 * 0.00075,
                    0,
                    "grid",
                ));
            }
        }
        let tree = CtrlTree::from_points(points);

        for &(lat, lng, radius) in &[(48.0, 11.0, 500.0), (48.003, 11.004, 250.0), (47.995, 10.99, 900.0)] {
            let area = SearchArea::around(lat, lng, radius);
            let found = tree.query_in_area(lat, lng, radius).unwrap();
            assert!(!found.is_empty());
            for p in &found {
                assert!(area.contains(p.latitude, p.longitude), "point {} outside box", p.id);
            }
            let expected = tree.iter().filter(|p| area.contains(p.latitude, p.longitude)).count();
            assert_eq!(found.len(), expected);
        }
    }

    #[test]
    fn test_box_is_superset_near_corners() {
        // Inside the box corner but ~700m away from the center
        let area = SearchArea::around(48.0, 11.0, 500.0);
        let corner_lat = area.max_lat - 0.00001;
        let corner_lng = area.max_lng - 0.00001;
        let tree = CtrlTree::from_points(vec![ControlPoint::new(9, corner_lat, corner_lng, 0, "corner")]);

        let found = tree.query_in_area(48.0, 11.0, 500.0).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_point_on_box_edge_excluded() {
        let area = SearchArea::around(48.0, 11.0, 500.0);
        let tree = CtrlTree::from_points(vec![ControlPoint::new(5, area.max_lat, 11.0, 0, "edge")]);
        assert!(tree.query_in_area(48.0, 11.0, 500.0).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_queries() {
        let tree = CtrlTree::from_points(munich_points());
        assert!(matches!(tree.query_in_area(48.0, 11.0, 0.0), Err(WarnError::InvalidQuery(_))));
        assert!(matches!(tree.query_in_area(48.0, 11.0, -5.0), Err(WarnError::InvalidQuery(_))));
        assert!(matches!(tree.query_in_area(f64::NAN, 11.0, 500.0), Err(WarnError::InvalidQuery(_))));
    }

    #[test]
    fn test_empty_tree() {
        let tree = CtrlTree::new();
        assert_eq!(tree.len(), 0);
        assert!(tree.query_in_area(48.0, 11.0, 500.0).unwrap().is_empty());
        assert!(tree.query_nearest(48.0, 11.0, 500.0).unwrap().is_none());
    }

    #[test]
    fn test_query_nearest_returns_some_box_match() {
        let tree = CtrlTree::from_points(munich_points());
        let any = tree.query_nearest(48.0, 11.0, 500.0).unwrap().unwrap();
        assert!(any.id == 1 || any.id == 2);
    }

    #[test]
    fn test_insert() {
        let mut tree = CtrlTree::new();
        assert!(tree.insert(ControlPoint::new(7, 48.0, 11.0, 30, "school")));
        assert!(!tree.insert(ControlPoint::new(7, 49.0, 12.0, 30, "again")));
        assert_eq!(tree.len(), 1);

        let found = tree.query_in_area(48.0005, 11.0, 100.0).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 7);
    }
}
