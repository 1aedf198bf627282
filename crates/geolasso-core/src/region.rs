//! Freehand strokes and the closed regions they produce.

use geo::{Coord, LineString, Polygon, Rect};

/// Minimum number of captured points for a stroke to form a usable region.
pub const MIN_REGION_POINTS: usize = 2;

/// Off-line distance, relative to the stroke's span, below which points count as collinear.
const COLLINEAR_TOLERANCE: f64 = 1e-9;

/// A freehand stroke in geographic coordinates (append-only while drawing).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    points: Vec<Coord<f64>>,
}

impl Path {
    /// Create a new empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from existing points.
    pub fn from_points(points: Vec<Coord<f64>>) -> Self {
        Self { points }
    }

    /// Add a point to the path.
    pub fn add_point(&mut self, point: Coord<f64>) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Coord<f64>] {
        &self.points
    }

    /// Bounding box of the captured points.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        let first = *self.points.first()?;
        let (mut min, mut max) = (first, first);
        for point in &self.points[1..] {
            min.x = min.x.min(point.x);
            min.y = min.y.min(point.y);
            max.x = max.x.max(point.x);
            max.y = max.y.max(point.y);
        }
        Some(Rect::new(min, max))
    }

    /// Open polyline through the captured points (the preview line).
    pub fn to_line_string(&self) -> LineString<f64> {
        LineString::from(self.points.clone())
    }

    /// Close the stroke into a region. Returns `None` below [`MIN_REGION_POINTS`].
    pub fn close(self) -> Option<ClosedRegion> {
        ClosedRegion::from_points(self.points)
    }
}

/// The polygon formed by closing a freehand stroke.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedRegion {
    polygon: Polygon<f64>,
    bounds: Rect<f64>,
    collinear: bool,
}

impl ClosedRegion {
    /// Close `points` into a ring (first point repeated as last).
    pub fn from_points(mut points: Vec<Coord<f64>>) -> Option<Self> {
        if points.len() < MIN_REGION_POINTS {
            return None;
        }
        let bounds = Path::from_points(points.clone()).bounds()?;
        let collinear = is_collinear(&points);
        let first = points[0];
        if points.last() != Some(&first) {
            points.push(first);
        }
        Some(Self {
            polygon: Polygon::new(LineString::from(points), Vec::new()),
            bounds,
            collinear,
        })
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// The closed ring.
    pub fn boundary(&self) -> &LineString<f64> {
        self.polygon.exterior()
    }

    pub fn bounds(&self) -> Rect<f64> {
        self.bounds
    }

    /// Whether the region encloses no area: flat bounds, fewer than three
    /// distinct points, or every point on one line. Such a region matches nothing.
    pub fn is_degenerate(&self) -> bool {
        self.collinear || !(self.bounds.width() > 0.0 && self.bounds.height() > 0.0)
    }
}

/// True when every point lies on the line through the first point and the
/// point farthest from it. Coincident points are trivially collinear.
fn is_collinear(points: &[Coord<f64>]) -> bool {
    let Some(&origin) = points.first() else {
        return true;
    };
    let Some(far) = points.iter().copied().max_by(|a, b| {
        let da = (*a - origin).x.hypot((*a - origin).y);
        let db = (*b - origin).x.hypot((*b - origin).y);
        da.total_cmp(&db)
    }) else {
        return true;
    };
    let axis = far - origin;
    let span = axis.x.hypot(axis.y);
    if span == 0.0 {
        return true;
    }
    points.iter().all(|point| {
        let offset = *point - origin;
        let distance = (axis.x * offset.y - axis.y * offset.x).abs() / span;
        distance <= COLLINEAR_TOLERANCE * span
    })
}
