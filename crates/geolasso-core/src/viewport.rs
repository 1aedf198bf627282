//! Map viewport: Web-Mercator projection with pan and zoom.

use geo::{Coord, Rect};
use kurbo::{Affine, Point, Size, Vec2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Tile size in pixels at zoom level 0.
pub const TILE_SIZE: f64 = 256.0;

/// Latitude limit of the Web-Mercator projection.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Geographic ↔ screen projection supplied by the host map view.
pub trait Projection {
    /// Project a lon/lat coordinate to screen pixels.
    fn geo_to_screen(&self, coord: Coord<f64>) -> Point;

    /// Unproject a screen position to lon/lat.
    fn screen_to_geo(&self, point: Point) -> Coord<f64>;

    /// Geographic extent currently visible.
    fn view_bounds(&self) -> Rect<f64>;

    /// Counter that changes whenever the projection changes (pan, zoom, resize).
    fn revision(&self) -> u64 {
        0
    }
}

/// Lon/lat to normalized Mercator coordinates (0..1 on both axes, y down).
pub fn mercator(coord: Coord<f64>) -> Point {
    let lat = coord.y.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (coord.x + 180.0) / 360.0;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0;
    Point::new(x, y)
}

/// Normalized Mercator coordinates back to lon/lat.
pub fn inverse_mercator(point: Point) -> Coord<f64> {
    let lon = point.x * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * point.y)).sinh().atan().to_degrees();
    Coord { x: lon, y: lat }
}

/// Viewport manages the view transform for the map.
///
/// It handles panning and zooming, converting between screen pixels and
/// geographic coordinates. Every change bumps [`Viewport::revision`] so
/// derived screen geometry knows when to refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    /// Geographic center of the view.
    pub center: Coord<f64>,
    /// Zoom level (world width is `TILE_SIZE * 2^zoom` pixels).
    pub zoom: f64,
    /// Screen size in pixels.
    pub size: Size,
    pub min_zoom: f64,
    pub max_zoom: f64,
    #[serde(skip)]
    revision: u64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center: Coord { x: 0.0, y: 0.0 },
            zoom: 2.0,
            size: Size::new(1024.0, 768.0),
            min_zoom: 0.0,
            max_zoom: 22.0,
            revision: 0,
        }
    }
}

impl Viewport {
    pub fn new(center: Coord<f64>, zoom: f64, size: Size) -> Self {
        Self {
            center,
            zoom,
            size,
            ..Self::default()
        }
    }

    /// Counter bumped on every pan, zoom, resize or reset.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// World width in pixels at the current zoom.
    pub fn world_size(&self) -> f64 {
        TILE_SIZE * 2f64.powf(self.zoom)
    }

    /// Normalized Mercator → screen transform.
    pub fn transform(&self) -> Affine {
        let center = mercator(self.center);
        Affine::translate(Vec2::new(self.size.width / 2.0, self.size.height / 2.0))
            * Affine::scale(self.world_size())
            * Affine::translate(Vec2::new(-center.x, -center.y))
    }

    /// Screen → normalized Mercator transform.
    pub fn inverse_transform(&self) -> Affine {
        self.transform().inverse()
    }

    /// Pan by a delta in screen pixels (content moves with the pointer).
    pub fn pan(&mut self, delta: Vec2) {
        let center = mercator(self.center);
        let world = self.world_size();
        let moved = Point::new(center.x - delta.x / world, center.y - delta.y / world);
        self.center = inverse_mercator(moved);
        self.revision += 1;
    }

    /// Zoom by `factor` (2.0 = one level in), keeping `screen_point` fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        if factor <= 0.0 {
            return;
        }
        let new_zoom = (self.zoom + factor.log2()).clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }

        let anchor = self.inverse_transform() * screen_point;
        self.zoom = new_zoom;

        // Adjust the center so the anchor stays under the pointer.
        let offset = self.inverse_transform() * screen_point;
        let center = mercator(self.center);
        self.center = inverse_mercator(Point::new(
            center.x + (anchor.x - offset.x),
            center.y + (anchor.y - offset.y),
        ));
        self.revision += 1;
    }

    pub fn resize(&mut self, size: Size) {
        self.size = size;
        self.revision += 1;
    }

    /// Reset to the default center and zoom.
    pub fn reset(&mut self) {
        let defaults = Self::default();
        self.center = defaults.center;
        self.zoom = defaults.zoom;
        self.revision += 1;
    }

    /// Fit the view to show `bounds` with `padding` pixels on each side.
    pub fn fit_to_bounds(&mut self, bounds: Rect<f64>, padding: f64) {
        let min = mercator(Coord { x: bounds.min().x, y: bounds.max().y });
        let max = mercator(Coord { x: bounds.max().x, y: bounds.min().y });
        let width = (max.x - min.x).abs();
        let height = (max.y - min.y).abs();
        if width <= 0.0 || height <= 0.0 {
            self.center = bounds.center();
            self.revision += 1;
            return;
        }

        let available_w = (self.size.width - padding * 2.0).max(1.0);
        let available_h = (self.size.height - padding * 2.0).max(1.0);
        let scale = (available_w / width).min(available_h / height);
        self.zoom = (scale / TILE_SIZE).log2().clamp(self.min_zoom, self.max_zoom);
        self.center = inverse_mercator(min.midpoint(max));
        self.revision += 1;
    }
}

impl Projection for Viewport {
    fn geo_to_screen(&self, coord: Coord<f64>) -> Point {
        self.transform() * mercator(coord)
    }

    fn screen_to_geo(&self, point: Point) -> Coord<f64> {
        inverse_mercator(self.inverse_transform() * point)
    }

    fn view_bounds(&self) -> Rect<f64> {
        let top_left = self.screen_to_geo(Point::ZERO);
        let bottom_right = self.screen_to_geo(Point::new(self.size.width, self.size.height));
        Rect::new(top_left, bottom_right)
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}
