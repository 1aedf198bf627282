//! Region/feature intersection with bounding-box pre-filtering.
//!
//! One [`IntersectionTester`] is built per stroke, so the region's bounding
//! box and boundary are prepared once and reused for every feature of the
//! batch. Each test first rejects on bounding boxes and only then runs the
//! exact predicate for the feature's geometry type:
//!
//! - points: point-in-polygon, boundary counts as inside
//! - lines: segment intersection against the region boundary
//! - polygons: boundary crossing, feature inside region, or region inside feature
//! - anything else: generic boundary intersection

use crate::error::GeometryError;
use crate::feature::Feature;
use crate::region::ClosedRegion;
use geo::{Contains, CoordsIter, Geometry, Intersects, LineString, Polygon, Rect};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Inclusive overlap test between two boxes. Touching edges overlap.
pub fn bounds_overlap(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x && b.min().x <= a.max().x && a.min().y <= b.max().y && b.min().y <= a.max().y
}

/// Decides which features intersect one closed region.
#[derive(Debug, Clone)]
pub struct IntersectionTester {
    region: ClosedRegion,
    region_bounds: Rect<f64>,
    degenerate: bool,
    lines_match_when_contained: bool,
}

impl IntersectionTester {
    pub fn new(region: ClosedRegion) -> Self {
        let region_bounds = region.bounds();
        let degenerate = region.is_degenerate();
        Self {
            region,
            region_bounds,
            degenerate,
            lines_match_when_contained: false,
        }
    }

    /// Also match lines lying entirely inside the region without crossing its boundary.
    pub fn with_contained_lines(mut self, enabled: bool) -> Self {
        self.lines_match_when_contained = enabled;
        self
    }

    pub fn region(&self) -> &ClosedRegion {
        &self.region
    }

    /// Whether `feature` intersects the region. Failures count as no match.
    pub fn test(&self, feature: &Feature) -> bool {
        if self.degenerate {
            return false;
        }
        let Some(bounds) = feature.bounds() else {
            log::debug!("Skipping feature {} without bounds", feature.key());
            return false;
        };
        if !bounds_overlap(&self.region_bounds, &bounds) {
            return false;
        }
        match self.try_exact(feature.geometry()) {
            Ok(hit) => hit,
            Err(e) => {
                log::debug!("Treating {} {} as non-matching: {}", feature.kind(), feature.key(), e);
                false
            }
        }
    }

    /// Exact predicate, with validation and library failures reported as errors.
    pub fn try_exact(&self, geometry: &Geometry<f64>) -> Result<bool, GeometryError> {
        validate_geometry(geometry)?;
        guard_predicate(|| self.exact(geometry))
    }

    fn exact(&self, geometry: &Geometry<f64>) -> bool {
        let boundary = self.region.boundary();
        match geometry {
            Geometry::Point(point) => point.intersects(self.region.polygon()),
            Geometry::LineString(line) => self.line_matches(line),
            Geometry::MultiLineString(lines) => lines.0.iter().any(|line| self.line_matches(line)),
            Geometry::Polygon(polygon) => self.polygon_matches(polygon),
            Geometry::MultiPolygon(polygons) => polygons.0.iter().any(|polygon| self.polygon_matches(polygon)),
            other => other.intersects(boundary),
        }
    }

    fn line_matches(&self, line: &LineString<f64>) -> bool {
        line.intersects(self.region.boundary())
            || (self.lines_match_when_contained && self.region.polygon().contains(line))
    }

    fn polygon_matches(&self, polygon: &Polygon<f64>) -> bool {
        let boundary = self.region.boundary();
        let rings_cross = polygon.exterior().intersects(boundary)
            || polygon.interiors().iter().any(|ring| ring.intersects(boundary));
        rings_cross || self.region.polygon().contains(polygon) || polygon.contains(self.region.polygon())
    }
}

/// Run a geometry predicate, turning a panic inside it into [`GeometryError::Library`].
fn guard_predicate<F>(predicate: F) -> Result<bool, GeometryError>
where
    F: FnOnce() -> bool,
{
    catch_unwind(AssertUnwindSafe(predicate)).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        GeometryError::Library(message)
    })
}

/// Structural checks run before any exact predicate.
pub fn validate_geometry(geometry: &Geometry<f64>) -> Result<(), GeometryError> {
    if let Some(bad) = geometry.coords_iter().find(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(GeometryError::NonFinite { x: bad.x, y: bad.y });
    }
    match geometry {
        Geometry::LineString(line) => validate_line(line),
        Geometry::MultiLineString(lines) => {
            if lines.0.is_empty() {
                return Err(GeometryError::Empty);
            }
            lines.0.iter().try_for_each(validate_line)
        }
        Geometry::Polygon(polygon) => validate_polygon(polygon),
        Geometry::MultiPolygon(polygons) => {
            if polygons.0.is_empty() {
                return Err(GeometryError::Empty);
            }
            polygons.0.iter().try_for_each(validate_polygon)
        }
        other => {
            if other.coords_count() == 0 {
                Err(GeometryError::Empty)
            } else {
                Ok(())
            }
        }
    }
}

fn validate_line(line: &LineString<f64>) -> Result<(), GeometryError> {
    if line.0.len() < 2 {
        return Err(GeometryError::ShortLine(line.0.len()));
    }
    Ok(())
}

fn validate_ring(ring: &LineString<f64>) -> Result<(), GeometryError> {
    if ring.0.is_empty() {
        return Err(GeometryError::Empty);
    }
    if ring.0.len() < 4 {
        return Err(GeometryError::ShortRing(ring.0.len()));
    }
    if !ring.is_closed() {
        return Err(GeometryError::UnclosedRing);
    }
    Ok(())
}

fn validate_polygon(polygon: &Polygon<f64>) -> Result<(), GeometryError> {
    validate_ring(polygon.exterior())?;
    polygon.interiors().iter().try_for_each(validate_ring)
}
