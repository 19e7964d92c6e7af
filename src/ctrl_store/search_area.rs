/// km per degree of latitude
pub const KM_PER_DEG_LAT: f64 = 110.574235;
/// km per degree of longitude at the equator, scaled by cos(lat)
pub const KM_PER_DEG_LNG_EQUATOR: f64 = 110.572833;

/// Axis-aligned search box around a position
///
/// # Algorithm
/// 1. Δlat = radius_km / 110.574235
/// 2. Δlng = radius_km / (110.572833 × cos(lat))
/// 3. Box = [lat ± Δlat] × [lng ± Δlng]
///
/// The box is a cheap prefilter. Near its corners it holds points that are
/// farther away than the radius; exact ranking happens in the evaluator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchArea {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl SearchArea {
    pub fn around(latitude: f64, longitude: f64, radius_m: f64) -> Self {
        let radius_km = radius_m / 1000.0;
        let deg_lng_km = KM_PER_DEG_LNG_EQUATOR * latitude.to_radians().cos();

        let delta_lat = radius_km / KM_PER_DEG_LAT;
        let delta_lng = radius_km / deg_lng_km;

        SearchArea {
            min_lat: latitude - delta_lat,
            min_lng: longitude - delta_lng,
            max_lat: latitude + delta_lat,
            max_lng: longitude + delta_lng,
        }
    }

    /// Exclusive bounds on both axes
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude > self.min_lat
            && latitude < self.max_lat
            && longitude > self.min_lng
            && longitude < self.max_lng
    }

    /// Corners in rstar order: ([min_lng, min_lat], [max_lng, max_lat])
    pub fn corners(&self) -> ([f64; 2], [f64; 2]) {
        ([self.min_lng, self.min_lat], [self.max_lng, self.max_lat])
    }
}
