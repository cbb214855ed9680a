use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{DomainError, DomainResult};

const ON_EDGE_EPSILON: f64 = 1e-12;

/// Region-of-interest membership test.
///
/// Two stages: a cheap axis-aligned bounding-box check derived from the
/// polygon, then an exact point-in-polygon test only for points that pass
/// the box. Points exactly on the polygon boundary are inside (closed
/// region).
pub struct RegionFilter {
    vertices: Vec<(f64, f64)>,
    lat_min: f64,
    lat_max: f64,
    lon_min: f64,
    lon_max: f64,
    polygon_tests: AtomicU64,
}

impl RegionFilter {
    /// Build a filter from `(lat, lon)` polygon vertices. The polygon is
    /// implicitly closed from the last vertex back to the first.
    pub fn new(vertices: Vec<(f64, f64)>) -> DomainResult<Self> {
        if vertices.len() < 3 {
            return Err(DomainError::InvalidRegion(format!(
                "polygon needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        for (lat, lon) in &vertices {
            if !lat.is_finite() || !lon.is_finite() {
                return Err(DomainError::InvalidRegion(
                    "polygon vertex is not finite".to_string(),
                ));
            }
        }

        let lat_min = vertices.iter().map(|v| v.0).fold(f64::INFINITY, f64::min);
        let lat_max = vertices
            .iter()
            .map(|v| v.0)
            .fold(f64::NEG_INFINITY, f64::max);
        let lon_min = vertices.iter().map(|v| v.1).fold(f64::INFINITY, f64::min);
        let lon_max = vertices
            .iter()
            .map(|v| v.1)
            .fold(f64::NEG_INFINITY, f64::max);

        Ok(Self {
            vertices,
            lat_min,
            lat_max,
            lon_min,
            lon_max,
            polygon_tests: AtomicU64::new(0),
        })
    }

    /// Parse a polygon from its configuration form: `lat,lon;lat,lon;...`
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let mut vertices = Vec::new();
        for pair in raw.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (lat, lon) = pair
                .split_once(',')
                .ok_or_else(|| DomainError::InvalidRegion(format!("bad vertex: {pair}")))?;
            let lat: f64 = lat
                .trim()
                .parse()
                .map_err(|_| DomainError::InvalidRegion(format!("bad latitude: {lat}")))?;
            let lon: f64 = lon
                .trim()
                .parse()
                .map_err(|_| DomainError::InvalidRegion(format!("bad longitude: {lon}")))?;
            vertices.push((lat, lon));
        }
        Self::new(vertices)
    }

    /// True when the coordinate lies inside the region (boundary included).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        if lat < self.lat_min || lat > self.lat_max || lon < self.lon_min || lon > self.lon_max {
            return false;
        }
        self.polygon_tests.fetch_add(1, Ordering::Relaxed);
        self.point_in_polygon(lat, lon)
    }

    /// Bounding box of the polygon, as `(lat_min, lon_min, lat_max, lon_max)`.
    /// The feed subscription envelope is derived from this.
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        (self.lat_min, self.lon_min, self.lat_max, self.lon_max)
    }

    /// Number of times the exact polygon stage ran. Instrumentation hook for
    /// verifying the bounding-box fast path.
    pub fn polygon_tests(&self) -> u64 {
        self.polygon_tests.load(Ordering::Relaxed)
    }

    // Even-odd ray casting over the (lon, lat) plane, with an explicit
    // on-segment check so boundary points count as inside.
    fn point_in_polygon(&self, lat: f64, lon: f64) -> bool {
        let n = self.vertices.len();
        let mut inside = false;

        for i in 0..n {
            let (lat_i, lon_i) = self.vertices[i];
            let (lat_j, lon_j) = self.vertices[(i + 1) % n];

            if on_segment(lat, lon, lat_i, lon_i, lat_j, lon_j) {
                return true;
            }

            let crosses = (lat_i > lat) != (lat_j > lat);
            if crosses {
                let intersect_lon = lon_i + (lat - lat_i) / (lat_j - lat_i) * (lon_j - lon_i);
                if lon < intersect_lon {
                    inside = !inside;
                }
            }
        }

        inside
    }
}

fn on_segment(lat: f64, lon: f64, lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> bool {
    let cross = (lat_b - lat_a) * (lon - lon_a) - (lon_b - lon_a) * (lat - lat_a);
    if cross.abs() > ON_EDGE_EPSILON {
        return false;
    }
    let within_lat = lat >= lat_a.min(lat_b) - ON_EDGE_EPSILON && lat <= lat_a.max(lat_b) + ON_EDGE_EPSILON;
    let within_lon = lon >= lon_a.min(lon_b) - ON_EDGE_EPSILON && lon <= lon_a.max(lon_b) + ON_EDGE_EPSILON;
    within_lat && within_lon
}

/// North Sea region outline used when no polygon is configured. A coarse
/// trace of the monitored area between the Channel and the Norwegian coast.
pub const DEFAULT_REGION_POLYGON: &str = "50.0,-5.0;51.0,2.0;53.5,4.5;55.0,8.0;56.5,9.0;\
     58.0,10.5;61.5,13.0;61.5,4.0;59.0,-3.0;56.0,-5.0";

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> RegionFilter {
        // Unit square: lat 0..10, lon 0..10
        RegionFilter::new(vec![(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)]).unwrap()
    }

    #[test]
    fn strictly_inside_is_contained() {
        let filter = square();
        assert!(filter.contains(5.0, 5.0));
        assert!(filter.contains(0.1, 9.9));
    }

    #[test]
    fn outside_bbox_skips_polygon_stage() {
        let filter = square();
        assert!(!filter.contains(-1.0, 5.0));
        assert!(!filter.contains(5.0, 11.0));
        assert_eq!(filter.polygon_tests(), 0);

        assert!(filter.contains(5.0, 5.0));
        assert_eq!(filter.polygon_tests(), 1);
    }

    #[test]
    fn boundary_points_are_included() {
        let filter = square();
        assert!(filter.contains(0.0, 5.0)); // edge
        assert!(filter.contains(10.0, 10.0)); // vertex
        assert!(filter.contains(0.0, 0.0)); // vertex
        // Idempotent under repeated evaluation.
        assert!(filter.contains(0.0, 5.0));
        assert!(filter.contains(0.0, 5.0));
    }

    #[test]
    fn concave_polygon_excludes_notch() {
        // A "C" shape: the notch at lat ~5, lon > 5 is outside.
        let filter = RegionFilter::new(vec![
            (0.0, 0.0),
            (0.0, 10.0),
            (4.0, 10.0),
            (4.0, 4.0),
            (6.0, 4.0),
            (6.0, 10.0),
            (10.0, 10.0),
            (10.0, 0.0),
        ])
        .unwrap();
        assert!(filter.contains(2.0, 2.0));
        assert!(!filter.contains(5.0, 8.0));
    }

    #[test]
    fn parses_config_polygon() {
        let filter = RegionFilter::parse("0,0; 0,10; 10,10; 10,0").unwrap();
        assert!(filter.contains(5.0, 5.0));
        assert_eq!(filter.bounding_box(), (0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn default_polygon_parses_and_covers_the_north_sea() {
        let filter = RegionFilter::parse(DEFAULT_REGION_POLYGON).unwrap();
        // Off the Dutch coast.
        assert!(filter.contains(54.0, 4.0));
        // Mediterranean, far outside.
        assert!(!filter.contains(40.0, 5.0));
    }

    #[test]
    fn rejects_degenerate_polygons() {
        assert!(RegionFilter::new(vec![(0.0, 0.0), (1.0, 1.0)]).is_err());
        assert!(RegionFilter::parse("a,b;1,2;3,4").is_err());
    }
}
