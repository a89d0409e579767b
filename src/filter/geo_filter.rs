use crate::core::types::GeoPoint;
use crate::index::geo::{contains_point, normalize_ccw};

/// Extra tolerance radius added to a point-radius filter so that
/// coarse, cell-bucketed candidate generation never drops a point that
/// is genuinely inside the requested radius once checked exactly.
/// Array-valued geopoint fields default to 10km; scalar geopoint fields
/// default to 0, since a single point's exact distance is already cheap
/// to check without over-including neighbors (spec.md §5.3, resolving
/// an Open Question against `original_source/test/geo_filtering_test.cpp`).
pub fn exact_filter_radius_km(is_array_field: bool) -> f64 {
    if is_array_field {
        10.0
    } else {
        0.0
    }
}

const EARTH_RADIUS_KM: f64 = 6371.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

pub fn within_radius(
    point: &GeoPoint,
    center: &GeoPoint,
    radius_km: f64,
    is_array_field: bool,
    exact_filter_radius_override_km: Option<f64>,
) -> bool {
    let tolerance = exact_filter_radius_override_km.unwrap_or_else(|| exact_filter_radius_km(is_array_field));
    haversine_km(point, center) <= radius_km + tolerance
}

pub fn within_polygon(point: &GeoPoint, polygon: &crate::core::types::GeoPolygon) -> bool {
    let normalized = normalize_ccw(polygon);
    contains_point(&normalized, point)
}
