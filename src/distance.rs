/// Mean Earth radius in kilometers (IUGG).
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Great-circle distance in kilometers between two latitude/longitude points (degrees),
/// using the haversine formula.
///
/// This is used when the observation provider does not report a station's distance to the
/// subbasin centroid. It treats the Earth as a sphere, so it can differ from an ellipsoidal
/// geodesic by up to ~0.5%, well below the station spacing that matters for weighting.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}
