//! Inverse mask and highlight overlay derived from the selection.
//!
//! [`MaskGeometry`] and [`HighlightOverlay`] are geographic models rebuilt
//! whenever the selection changes. [`MaskRenderer`] turns them into
//! screen-space paths and pushes them to an [`OverlaySurface`] owned by the
//! host. When only the view moves, the screen paths are re-projected from the
//! cached models at most once per refresh interval.

use crate::config::SelectionConfig;
use crate::draw::DrawPreview;
use crate::selection::SelectionSet;
use crate::viewport::Projection;
use geo::{Coord, Geometry, LineString, Polygon, Rect};
use kurbo::{BezPath, Circle};
use peniko::{Color, Fill};
use std::time::Duration;

// Use web-time on WASM, std::time otherwise
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// Darkening layer covering everything except the selected polygons.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskGeometry {
    polygon: Polygon<f64>,
}

impl MaskGeometry {
    /// Outer ring from `extent`, one hole per selected polygon part.
    ///
    /// Only exterior rings become holes; interior rings of selected polygons
    /// are not punched back in. Points and lines leave no hole.
    pub fn build(extent: Rect<f64>, selection: &SelectionSet) -> Self {
        let mut holes = Vec::new();
        for feature in selection.iter() {
            collect_exteriors(feature.geometry(), &mut holes);
        }
        Self {
            polygon: Polygon::new(extent.to_polygon().exterior().clone(), holes),
        }
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    pub fn outer(&self) -> &LineString<f64> {
        self.polygon.exterior()
    }

    pub fn holes(&self) -> &[LineString<f64>] {
        self.polygon.interiors()
    }

    pub fn hole_count(&self) -> usize {
        self.polygon.interiors().len()
    }
}

fn collect_exteriors(geometry: &Geometry<f64>, holes: &mut Vec<LineString<f64>>) {
    match geometry {
        Geometry::Polygon(polygon) => holes.push(polygon.exterior().clone()),
        Geometry::MultiPolygon(multi) => holes.extend(multi.iter().map(|p| p.exterior().clone())),
        Geometry::GeometryCollection(collection) => {
            for member in collection.iter() {
                collect_exteriors(member, holes);
            }
        }
        _ => {}
    }
}

/// One outline drawn above the mask.
#[derive(Debug, Clone, PartialEq)]
pub enum Outline {
    /// Closed polygon ring.
    Ring(LineString<f64>),
    /// Open line.
    Line(LineString<f64>),
    /// Marker around a point.
    Marker(Coord<f64>),
}

/// Outlines of every selected feature, whatever its geometry type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HighlightOverlay {
    outlines: Vec<Outline>,
}

impl HighlightOverlay {
    pub fn build(selection: &SelectionSet) -> Self {
        let mut outlines = Vec::new();
        for feature in selection.iter() {
            collect_outlines(feature.geometry(), &mut outlines);
        }
        Self { outlines }
    }

    pub fn outlines(&self) -> &[Outline] {
        &self.outlines
    }

    pub fn is_empty(&self) -> bool {
        self.outlines.is_empty()
    }
}

fn push_polygon(polygon: &Polygon<f64>, outlines: &mut Vec<Outline>) {
    outlines.push(Outline::Ring(polygon.exterior().clone()));
    outlines.extend(polygon.interiors().iter().cloned().map(Outline::Ring));
}

fn collect_outlines(geometry: &Geometry<f64>, outlines: &mut Vec<Outline>) {
    match geometry {
        Geometry::Point(point) => outlines.push(Outline::Marker(point.0)),
        Geometry::MultiPoint(points) => outlines.extend(points.iter().map(|p| Outline::Marker(p.0))),
        Geometry::Line(line) => outlines.push(Outline::Line(LineString::from(vec![line.start, line.end]))),
        Geometry::LineString(line) => outlines.push(Outline::Line(line.clone())),
        Geometry::MultiLineString(lines) => outlines.extend(lines.iter().cloned().map(Outline::Line)),
        Geometry::Polygon(polygon) => push_polygon(polygon, outlines),
        Geometry::MultiPolygon(multi) => {
            for polygon in multi.iter() {
                push_polygon(polygon, outlines);
            }
        }
        Geometry::Rect(rect) => push_polygon(&rect.to_polygon(), outlines),
        Geometry::Triangle(triangle) => push_polygon(&triangle.to_polygon(), outlines),
        Geometry::GeometryCollection(collection) => {
            for member in collection.iter() {
                collect_outlines(member, outlines);
            }
        }
    }
}

/// Visual parameters for the overlay layers.
#[derive(Debug, Clone, Copy)]
pub struct OverlayStyle {
    pub mask_color: Color,
    pub highlight_color: Color,
    pub preview_color: Color,
    pub outline_width: f64,
    pub point_marker_radius: f64,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self::from_config(&SelectionConfig::default())
    }
}

impl OverlayStyle {
    pub fn from_config(config: &SelectionConfig) -> Self {
        Self {
            mask_color: config.mask_color.into(),
            highlight_color: config.highlight_color.into(),
            preview_color: config.preview_color.into(),
            outline_width: config.outline_width,
            point_marker_radius: config.point_marker_radius,
        }
    }
}

/// Mask in screen space, filled with the even-odd rule so holes stay clear.
#[derive(Debug, Clone)]
pub struct ScreenMask {
    pub path: BezPath,
    pub fill: Fill,
    pub color: Color,
    pub hole_count: usize,
}

/// Highlight outlines in screen space.
#[derive(Debug, Clone)]
pub struct ScreenOverlay {
    pub path: BezPath,
    pub markers: Vec<Circle>,
    pub color: Color,
    pub width: f64,
}

/// Everything the surface draws for the current selection, bottom to top.
#[derive(Debug, Clone)]
pub struct SelectionScene {
    pub mask: ScreenMask,
    pub overlay: ScreenOverlay,
}

/// Stroke preview in screen space.
#[derive(Debug, Clone)]
pub struct ScreenPreview {
    pub line: BezPath,
    pub fill: Option<BezPath>,
    pub color: Color,
    pub width: f64,
}

impl ScreenPreview {
    pub fn project(preview: &DrawPreview, projection: &dyn Projection, style: &OverlayStyle) -> Self {
        Self {
            line: project_line(&preview.line, projection, false),
            fill: preview
                .fill
                .as_ref()
                .map(|polygon| project_line(polygon.exterior(), projection, true)),
            color: style.preview_color,
            width: style.outline_width,
        }
    }
}

/// Host-side drawing target for the selection layers.
pub trait OverlaySurface {
    /// Replace the mask and highlight layers.
    fn show_selection(&mut self, scene: &SelectionScene);

    /// Remove the mask and highlight layers.
    fn clear_selection(&mut self);

    /// Replace the stroke preview layer.
    fn show_preview(&mut self, preview: &ScreenPreview);

    /// Remove the stroke preview layer.
    fn clear_preview(&mut self);
}

/// Project a geographic line to a screen path.
pub fn project_line(line: &LineString<f64>, projection: &dyn Projection, closed: bool) -> BezPath {
    let mut path = BezPath::new();
    let mut coords = line.coords();
    if let Some(first) = coords.next() {
        path.move_to(projection.geo_to_screen(*first));
        for coord in coords {
            path.line_to(projection.geo_to_screen(*coord));
        }
        if closed {
            path.close_path();
        }
    }
    path
}

/// Change to push to the surface on a frame.
#[derive(Debug, Clone)]
pub enum SceneUpdate {
    Show(SelectionScene),
    Clear,
}

/// Keeps the mask and overlay models and their screen rendition in sync.
#[derive(Debug, Clone)]
pub struct MaskRenderer {
    extent: Rect<f64>,
    style: OverlayStyle,
    refresh: Duration,
    mask: Option<MaskGeometry>,
    overlay: HighlightOverlay,
    model_dirty: bool,
    view_dirty: bool,
    view_revision: Option<u64>,
    last_render: Option<Instant>,
    shown: bool,
}

impl MaskRenderer {
    pub fn new(config: &SelectionConfig) -> Self {
        Self {
            extent: config.mask_extent_rect(),
            style: OverlayStyle::from_config(config),
            refresh: config.mask_refresh(),
            mask: None,
            overlay: HighlightOverlay::default(),
            model_dirty: false,
            view_dirty: false,
            view_revision: None,
            last_render: None,
            shown: false,
        }
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    /// Re-derive both models from the selection. An empty selection has no mask.
    pub fn rebuild(&mut self, selection: &SelectionSet) {
        if selection.is_empty() {
            self.mask = None;
            self.overlay = HighlightOverlay::default();
        } else {
            self.mask = Some(MaskGeometry::build(self.extent, selection));
            self.overlay = HighlightOverlay::build(selection);
        }
        self.model_dirty = true;
    }

    pub fn mask(&self) -> Option<&MaskGeometry> {
        self.mask.as_ref()
    }

    pub fn overlay(&self) -> &HighlightOverlay {
        &self.overlay
    }

    /// Whether the surface currently shows selection layers.
    pub fn is_shown(&self) -> bool {
        self.shown
    }

    /// Per-frame refresh. Model changes render at once; view changes are throttled.
    pub fn frame(&mut self, now: Instant, projection: &dyn Projection) -> Option<SceneUpdate> {
        let revision = projection.revision();
        if self.view_revision != Some(revision) {
            self.view_revision = Some(revision);
            self.view_dirty = self.mask.is_some();
        }

        if self.model_dirty {
            self.model_dirty = false;
            self.view_dirty = false;
            return match self.render(projection) {
                Some(scene) => {
                    self.last_render = Some(now);
                    self.shown = true;
                    Some(SceneUpdate::Show(scene))
                }
                None if self.shown => {
                    self.shown = false;
                    Some(SceneUpdate::Clear)
                }
                None => None,
            };
        }

        let due = self
            .last_render
            .is_none_or(|last| now.saturating_duration_since(last) >= self.refresh);
        if self.view_dirty && due {
            self.view_dirty = false;
            let scene = self.render(projection)?;
            log::trace!("Re-projected mask after view change");
            self.last_render = Some(now);
            self.shown = true;
            return Some(SceneUpdate::Show(scene));
        }
        None
    }

    /// Screen rendition of the current models, `None` when nothing is selected.
    pub fn render(&self, projection: &dyn Projection) -> Option<SelectionScene> {
        let mask = self.mask.as_ref()?;

        let mut mask_path = project_line(mask.outer(), projection, true);
        for hole in mask.holes() {
            mask_path.extend(project_line(hole, projection, true));
        }

        let mut outline_path = BezPath::new();
        let mut markers = Vec::new();
        for outline in self.overlay.outlines() {
            match outline {
                Outline::Ring(ring) => outline_path.extend(project_line(ring, projection, true)),
                Outline::Line(line) => outline_path.extend(project_line(line, projection, false)),
                Outline::Marker(coord) => {
                    markers.push(Circle::new(projection.geo_to_screen(*coord), self.style.point_marker_radius))
                }
            }
        }

        Some(SelectionScene {
            mask: ScreenMask {
                path: mask_path,
                fill: Fill::EvenOdd,
                color: self.style.mask_color,
                hole_count: mask.hole_count(),
            },
            overlay: ScreenOverlay {
                path: outline_path,
                markers,
                color: self.style.highlight_color,
                width: self.style.outline_width,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{Feature, attributes};
    use crate::viewport::Viewport;
    use geo::{line_string, point, polygon};
    use kurbo::{PathEl, Vec2};

    fn square(id: &str, x: f64) -> Feature {
        Feature::with_id(
            id,
            polygon![(x: x, y: 0.0), (x: x + 1.0, y: 0.0), (x: x + 1.0, y: 1.0), (x: x, y: 1.0), (x: x, y: 0.0)],
            attributes([("v", 1i64)]),
        )
    }

    fn selected(features: Vec<Feature>) -> SelectionSet {
        let mut set = SelectionSet::new();
        set.replace(features, Some("layer"));
        set
    }

    fn extent() -> Rect<f64> {
        SelectionConfig::default().mask_extent_rect()
    }

    #[test]
    fn test_one_hole_per_polygon() {
        let feature = square("a", 0.0);
        let mask = MaskGeometry::build(extent(), &selected(vec![feature.clone()]));
        assert_eq!(mask.hole_count(), 1);
        let Geometry::Polygon(source) = feature.geometry() else {
            panic!("expected polygon");
        };
        assert_eq!(&mask.holes()[0], source.exterior());
    }

    #[test]
    fn test_points_and_lines_leave_no_hole() {
        let point = Feature::with_id("p", point!(x: 1.0, y: 1.0), attributes([("v", 1i64)]));
        let line = Feature::with_id("l", line_string![(x: 0.0, y: 0.0), (x: 2.0, y: 2.0)], attributes([("v", 2i64)]));
        let mask = MaskGeometry::build(extent(), &selected(vec![point, line]));
        assert_eq!(mask.hole_count(), 0);
    }

    #[test]
    fn test_multipolygon_and_donut() {
        let donut = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0), (x: 0.0, y: 0.0)],
            interiors: [[(x: 4.0, y: 4.0), (x: 6.0, y: 4.0), (x: 6.0, y: 6.0), (x: 4.0, y: 6.0), (x: 4.0, y: 4.0)]],
        );
        let multi = geo::MultiPolygon::new(vec![
            polygon![(x: 20.0, y: 0.0), (x: 21.0, y: 0.0), (x: 21.0, y: 1.0), (x: 20.0, y: 0.0)],
            polygon![(x: 30.0, y: 0.0), (x: 31.0, y: 0.0), (x: 31.0, y: 1.0), (x: 30.0, y: 0.0)],
        ]);
        let set = selected(vec![
            Feature::with_id("donut", donut, attributes([("v", 1i64)])),
            Feature::with_id("multi", multi, attributes([("v", 2i64)])),
        ]);

        // Donut hole is not re-punched: three exteriors, three holes.
        assert_eq!(MaskGeometry::build(extent(), &set).hole_count(), 3);
        // Outline keeps the donut's inner ring.
        assert_eq!(HighlightOverlay::build(&set).outlines().len(), 4);
    }

    #[test]
    fn test_overlay_covers_every_geometry_type() {
        let set = selected(vec![
            square("a", 0.0),
            Feature::with_id("p", point!(x: 1.0, y: 1.0), attributes([("v", 1i64)])),
            Feature::with_id("l", line_string![(x: 0.0, y: 0.0), (x: 2.0, y: 2.0)], attributes([("v", 2i64)])),
        ]);
        let overlay = HighlightOverlay::build(&set);
        assert_eq!(overlay.outlines().len(), 3);
        assert!(overlay.outlines().iter().any(|o| matches!(o, Outline::Marker(_))));
        assert!(overlay.outlines().iter().any(|o| matches!(o, Outline::Line(_))));
    }

    #[test]
    fn test_render_and_clear() {
        let config = SelectionConfig::default();
        let viewport = Viewport::default();
        let mut renderer = MaskRenderer::new(&config);
        let now = Instant::now();
        assert!(renderer.frame(now, &viewport).is_none());

        renderer.rebuild(&selected(vec![square("a", 0.0)]));
        let Some(SceneUpdate::Show(scene)) = renderer.frame(now, &viewport) else {
            panic!("expected scene");
        };
        assert_eq!(scene.mask.hole_count, 1);
        assert_eq!(scene.mask.fill, Fill::EvenOdd);
        let closes = scene.mask.path.elements().iter().filter(|el| matches!(el, PathEl::ClosePath)).count();
        assert_eq!(closes, 2);
        assert!(renderer.is_shown());

        renderer.rebuild(&SelectionSet::new());
        assert!(matches!(renderer.frame(now, &viewport), Some(SceneUpdate::Clear)));
        assert!(!renderer.is_shown());
        assert!(renderer.mask().is_none());
        assert!(renderer.overlay().is_empty());
        assert!(renderer.frame(now, &viewport).is_none());
    }

    #[test]
    fn test_view_changes_are_throttled() {
        let config = SelectionConfig::default();
        let mut viewport = Viewport::default();
        let mut renderer = MaskRenderer::new(&config);
        let start = Instant::now();

        renderer.rebuild(&selected(vec![square("a", 0.0)]));
        assert!(renderer.frame(start, &viewport).is_some());

        viewport.pan(Vec2::new(10.0, 0.0));
        // Within the refresh interval: deferred.
        assert!(renderer.frame(start + Duration::from_millis(5), &viewport).is_none());
        viewport.pan(Vec2::new(10.0, 0.0));
        assert!(renderer.frame(start + Duration::from_millis(10), &viewport).is_none());
        // Interval elapsed: one re-projection covering both pans.
        assert!(matches!(
            renderer.frame(start + Duration::from_millis(16), &viewport),
            Some(SceneUpdate::Show(_))
        ));
        assert!(renderer.frame(start + Duration::from_millis(40), &viewport).is_none());
    }

    #[test]
    fn test_view_changes_ignored_without_selection() {
        let config = SelectionConfig::default();
        let mut viewport = Viewport::default();
        let mut renderer = MaskRenderer::new(&config);
        let start = Instant::now();
        renderer.frame(start, &viewport);
        viewport.zoom_at(kurbo::Point::new(10.0, 10.0), 2.0);
        assert!(renderer.frame(start + Duration::from_secs(1), &viewport).is_none());
    }

    #[test]
    fn test_projected_hole_matches_screen_position() {
        let viewport = Viewport::default();
        let mut renderer = MaskRenderer::new(&SelectionConfig::default());
        renderer.rebuild(&selected(vec![square("a", 0.0)]));
        let scene = renderer.render(&viewport).unwrap();
        let origin = viewport.geo_to_screen(Coord { x: 0.0, y: 0.0 });
        assert!(scene.mask.path.elements().iter().any(|el| match el {
            PathEl::MoveTo(p) => (p.x - origin.x).abs() < 1e-9 && (p.y - origin.y).abs() < 1e-9,
            _ => false,
        }));
    }
}
