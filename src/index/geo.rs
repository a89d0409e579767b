use std::collections::HashMap;

use crate::core::types::{DocId, GeoPoint, GeoPolygon};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Side length, in degrees, of one coverage cell. Chosen so a typical
/// city-scale radius query touches a handful of cells rather than a
/// city-scale fraction of the whole index.
const CELL_SIZE_DEGREES: f64 = 0.1;

fn cell_of(point: &GeoPoint) -> (i64, i64) {
    ((point.lat / CELL_SIZE_DEGREES).floor() as i64, (point.lng / CELL_SIZE_DEGREES).floor() as i64)
}

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Coverage-cell index over point-valued geo fields (spec.md §5.3):
/// points are bucketed into fixed-size lat/lng cells, and a radius query
/// only haversine-checks points in cells that could possibly fall
/// within range.
#[derive(Default, Clone)]
pub struct GeoPointIndex {
    cells: HashMap<(i64, i64), Vec<(DocId, GeoPoint)>>,
}

impl GeoPointIndex {
    pub fn new() -> Self {
        GeoPointIndex { cells: HashMap::new() }
    }

    pub fn insert(&mut self, doc_id: DocId, point: GeoPoint) {
        self.cells.entry(cell_of(&point)).or_default().push((doc_id, point));
    }

    pub fn remove(&mut self, doc_id: DocId, point: GeoPoint) {
        if let Some(bucket) = self.cells.get_mut(&cell_of(&point)) {
            bucket.retain(|(id, _)| *id != doc_id);
        }
    }

    /// All doc ids whose indexed point lies within `radius_km` of
    /// `center`, exact to haversine distance (the cell grid only bounds
    /// the candidate set, never the final membership test).
    pub fn within_radius(&self, center: &GeoPoint, radius_km: f64) -> Vec<DocId> {
        let cell_span = (radius_km / (CELL_SIZE_DEGREES * 111.0)).ceil() as i64 + 1;
        let (cy, cx) = cell_of(center);
        let mut out = Vec::new();

        for dy in -cell_span..=cell_span {
            for dx in -cell_span..=cell_span {
                if let Some(bucket) = self.cells.get(&(cy + dy, cx + dx)) {
                    for (doc_id, point) in bucket {
                        if haversine_km(center, point) <= radius_km {
                            out.push(*doc_id);
                        }
                    }
                }
            }
        }

        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Coverage-cell index over polygon-valued geo fields (spec.md §5.3): a
/// polygon's bounding box is bucketed into the same cell grid as
/// `GeoPointIndex`, so a point-in-polygon filter (used by the combined
/// union predicate's scalar side) only tests polygons whose bounding box
/// could plausibly contain the query point.
#[derive(Default, Clone)]
pub struct GeoPolygonIndex {
    cells: HashMap<(i64, i64), Vec<DocId>>,
    polygons: HashMap<DocId, GeoPolygon>,
}

impl GeoPolygonIndex {
    pub fn new() -> Self {
        GeoPolygonIndex::default()
    }

    pub fn insert(&mut self, doc_id: DocId, polygon: GeoPolygon) {
        let normalized = normalize_ccw(&polygon);
        for cell in Self::covering_cells(&normalized) {
            self.cells.entry(cell).or_default().push(doc_id);
        }
        self.polygons.insert(doc_id, normalized);
    }

    pub fn remove(&mut self, doc_id: DocId) {
        if let Some(polygon) = self.polygons.remove(&doc_id) {
            for cell in Self::covering_cells(&polygon) {
                if let Some(bucket) = self.cells.get_mut(&cell) {
                    bucket.retain(|id| *id != doc_id);
                }
            }
        }
    }

    /// All doc ids whose stored polygon contains `point`, exact to
    /// ray-casting containment (the cell grid only bounds the candidate set).
    pub fn containing(&self, point: &GeoPoint) -> Vec<DocId> {
        let mut candidates: Vec<DocId> = self.cells.get(&cell_of(point)).cloned().unwrap_or_default();
        candidates.sort_unstable();
        candidates.dedup();
        candidates
            .into_iter()
            .filter(|id| self.polygons.get(id).map_or(false, |polygon| contains_point(polygon, point)))
            .collect()
    }

    fn covering_cells(polygon: &GeoPolygon) -> Vec<(i64, i64)> {
        let min_lat = polygon.vertices.iter().map(|v| v.lat).fold(f64::INFINITY, f64::min);
        let max_lat = polygon.vertices.iter().map(|v| v.lat).fold(f64::NEG_INFINITY, f64::max);
        let min_lng = polygon.vertices.iter().map(|v| v.lng).fold(f64::INFINITY, f64::min);
        let max_lng = polygon.vertices.iter().map(|v| v.lng).fold(f64::NEG_INFINITY, f64::max);

        let (min_cy, min_cx) = cell_of(&GeoPoint::new(min_lat, min_lng));
        let (max_cy, max_cx) = cell_of(&GeoPoint::new(max_lat, max_lng));

        let mut cells = Vec::with_capacity(((max_cy - min_cy + 1) * (max_cx - min_cx + 1)).max(1) as usize);
        for cy in min_cy..=max_cy {
            for cx in min_cx..=max_cx {
                cells.push((cy, cx));
            }
        }
        cells
    }
}

/// Ensure a polygon's vertex loop winds counter-clockwise, matching the
/// orientation every containment check below assumes. Uses the planar
/// shoelace sign as an approximation of spherical signed area, valid for
/// polygons that do not enclose a pole or cross the antimeridian.
pub fn normalize_ccw(polygon: &GeoPolygon) -> GeoPolygon {
    let signed_area = shoelace_signed_area(&polygon.vertices);
    if signed_area < 0.0 {
        let mut vertices = polygon.vertices.clone();
        vertices.reverse();
        GeoPolygon { vertices }
    } else {
        polygon.clone()
    }
}

fn shoelace_signed_area(vertices: &[GeoPoint]) -> f64 {
    let mut area = 0.0;
    for i in 0..vertices.len() {
        let a = vertices[i];
        let b = vertices[(i + 1) % vertices.len()];
        area += a.lng * b.lat - b.lng * a.lat;
    }
    area / 2.0
}

/// Point-in-polygon test via ray casting against the CCW-normalized
/// vertex loop (spec.md §5.3). Treats lat/lng as planar coordinates;
/// callers are expected to have rejected polygons spanning a pole or
/// the antimeridian at schema-validation time.
pub fn contains_point(polygon: &GeoPolygon, point: &GeoPoint) -> bool {
    let vertices = &polygon.vertices;
    let mut inside = false;
    let mut j = vertices.len() - 1;

    for i in 0..vertices.len() {
        let vi = vertices[i];
        let vj = vertices[j];
        let crosses = (vi.lat > point.lat) != (vj.lat > point.lat);
        if crosses {
            let x_intersect = (vj.lng - vi.lng) * (point.lat - vi.lat) / (vj.lat - vi.lat) + vi.lng;
            if point.lng < x_intersect {
                inside = !inside;
            }
        }
        j = i;
    }

    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> GeoPolygon {
        GeoPolygon {
            vertices: vec![
                GeoPoint::new(0.0, 0.0),
                GeoPoint::new(0.0, 10.0),
                GeoPoint::new(10.0, 10.0),
                GeoPoint::new(10.0, 0.0),
            ],
        }
    }

    #[test]
    fn within_radius_finds_nearby_points_only() {
        let mut index = GeoPointIndex::new();
        index.insert(DocId::new(1), GeoPoint::new(40.7128, -74.0060)); // NYC
        index.insert(DocId::new(2), GeoPoint::new(34.0522, -118.2437)); // LA

        let hits = index.within_radius(&GeoPoint::new(40.7128, -74.0060), 50.0);
        assert_eq!(hits, vec![DocId::new(1)]);
    }

    #[test]
    fn normalize_ccw_reverses_clockwise_loops() {
        let mut cw = square();
        cw.vertices.reverse();
        assert!(shoelace_signed_area(&cw.vertices) < 0.0);

        let normalized = normalize_ccw(&cw);
        assert!(shoelace_signed_area(&normalized.vertices) > 0.0);
    }

    #[test]
    fn contains_point_detects_interior_and_exterior() {
        let poly = normalize_ccw(&square());
        assert!(contains_point(&poly, &GeoPoint::new(5.0, 5.0)));
        assert!(!contains_point(&poly, &GeoPoint::new(20.0, 20.0)));
    }

    #[test]
    fn polygon_index_finds_containing_polygon_and_forgets_removed_ones() {
        let mut index = GeoPolygonIndex::new();
        index.insert(DocId::new(1), square());

        assert_eq!(index.containing(&GeoPoint::new(5.0, 5.0)), vec![DocId::new(1)]);
        assert!(index.containing(&GeoPoint::new(50.0, 50.0)).is_empty());

        index.remove(DocId::new(1));
        assert!(index.containing(&GeoPoint::new(5.0, 5.0)).is_empty());
    }
}
