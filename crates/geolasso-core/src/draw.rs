//! Two-click freehand draw controller.
//!
//! The first primary click starts a stroke, pointer moves extend it and the
//! second primary click closes it into a region. Pointer positions arrive in
//! screen pixels and are unprojected to lon/lat as they are captured.

use crate::input::{ModifierBindings, ModifierState, PointerEvent};
use crate::region::{ClosedRegion, Path};
use crate::viewport::Projection;
use geo::{LineString, Polygon};
use std::time::Duration;

// Use web-time on WASM, std::time otherwise
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// State of the draw controller.
#[derive(Debug, Clone, Default)]
pub enum DrawState {
    /// Waiting for the first click.
    #[default]
    Idle,
    /// Capturing a stroke.
    Drawing {
        /// Every sampled point, in lon/lat.
        path: Path,
    },
}

/// Live preview of the stroke being drawn, in lon/lat.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawPreview {
    pub line: LineString<f64>,
    /// Fill of the closed stroke, once there are enough points to enclose an area.
    pub fill: Option<Polygon<f64>>,
}

impl DrawPreview {
    fn from_path(path: &Path, closed: bool) -> Self {
        let mut line = path.to_line_string();
        if closed {
            line.close();
        }
        let fill = (path.len() >= 3).then(|| Polygon::new(path.to_line_string(), Vec::new()));
        Self { line, fill }
    }
}

/// Change to push to the preview layer on a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewUpdate {
    Show(DrawPreview),
    Clear,
}

/// A completed stroke ready for intersection testing.
#[derive(Debug, Clone)]
pub struct FinishedStroke {
    pub region: ClosedRegion,
    /// Modifier snapshot taken from the finishing click.
    pub modifiers: ModifierState,
}

/// Result of feeding one pointer event to the controller.
#[derive(Debug, Clone)]
pub enum DrawOutcome {
    /// Event had no effect.
    Ignored,
    /// First click: a stroke started.
    Started,
    /// Pointer move appended a point.
    Extended,
    /// Second click closed a usable region.
    Finished(FinishedStroke),
    /// Second click closed a stroke too short to test.
    Discarded,
}

/// Which normal map interactions the host must suppress right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionGuards {
    pub popups_suppressed: bool,
    pub drag_suppressed: bool,
}

/// Freehand selection stroke state machine.
#[derive(Debug, Clone)]
pub struct DrawController {
    active: bool,
    /// Another exclusive pointer mode (for example a programmatic pan) holds the pointer.
    pointer_held: bool,
    state: DrawState,
    bindings: ModifierBindings,
    linger: Duration,
    preview: Option<DrawPreview>,
    preview_dirty: bool,
    preview_shown: bool,
    linger_until: Option<Instant>,
}

impl Default for DrawController {
    fn default() -> Self {
        Self::new(ModifierBindings::default(), Duration::from_millis(400))
    }
}

impl DrawController {
    pub fn new(bindings: ModifierBindings, linger: Duration) -> Self {
        Self {
            active: false,
            pointer_held: false,
            state: DrawState::Idle,
            bindings,
            linger,
            preview: None,
            preview_dirty: false,
            preview_shown: false,
            linger_until: None,
        }
    }

    /// Enter selection mode.
    pub fn activate(&mut self) {
        self.active = true;
    }

    /// Leave selection mode, discarding any stroke in progress.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.reset_stroke();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, DrawState::Drawing { .. })
    }

    pub fn state(&self) -> &DrawState {
        &self.state
    }

    /// Popups and map dragging are suppressed for as long as selection mode is on.
    pub fn guards(&self) -> InteractionGuards {
        InteractionGuards {
            popups_suppressed: self.active,
            drag_suppressed: self.active,
        }
    }

    /// Mark the pointer as held (or released) by another exclusive mode.
    pub fn set_pointer_held(&mut self, held: bool) {
        self.pointer_held = held;
    }

    /// Abandon the stroke in progress without testing it.
    pub fn cancel_stroke(&mut self) -> bool {
        let was_drawing = self.is_drawing();
        if was_drawing {
            self.reset_stroke();
        }
        was_drawing
    }

    fn reset_stroke(&mut self) {
        self.state = DrawState::Idle;
        self.preview = None;
        self.preview_dirty = false;
        self.linger_until = None;
    }

    /// Feed one pointer event.
    pub fn handle_event(&mut self, event: &PointerEvent, projection: &dyn Projection, now: Instant) -> DrawOutcome {
        match event {
            PointerEvent::Down {
                position,
                button,
                modifiers,
            } if button.is_primary() => {
                let coord = projection.screen_to_geo(*position);
                match std::mem::take(&mut self.state) {
                    DrawState::Idle => {
                        if !self.active || self.pointer_held {
                            return DrawOutcome::Ignored;
                        }
                        let mut path = Path::new();
                        path.add_point(coord);
                        self.preview = Some(DrawPreview::from_path(&path, false));
                        self.preview_dirty = true;
                        self.linger_until = None;
                        self.state = DrawState::Drawing { path };
                        DrawOutcome::Started
                    }
                    DrawState::Drawing { mut path } => {
                        path.add_point(coord);
                        let modifiers = self.bindings.resolve(*modifiers);
                        self.preview = Some(DrawPreview::from_path(&path, true));
                        self.preview_dirty = true;
                        self.linger_until = Some(now + self.linger);

                        let points = path.len();
                        match path.close() {
                            Some(region) => {
                                log::debug!("Stroke finished with {} points", points);
                                DrawOutcome::Finished(FinishedStroke { region, modifiers })
                            }
                            None => DrawOutcome::Discarded,
                        }
                    }
                }
            }
            PointerEvent::Move { position } => match &mut self.state {
                DrawState::Drawing { path } => {
                    path.add_point(projection.screen_to_geo(*position));
                    self.preview_dirty = true;
                    DrawOutcome::Extended
                }
                DrawState::Idle => DrawOutcome::Ignored,
            },
            _ => DrawOutcome::Ignored,
        }
    }

    /// Per-frame preview refresh. Returns at most one update per call.
    pub fn frame(&mut self, now: Instant) -> Option<PreviewUpdate> {
        if self.preview_dirty {
            self.preview_dirty = false;
            if let DrawState::Drawing { path } = &self.state {
                self.preview = Some(DrawPreview::from_path(path, false));
            }
            if let Some(preview) = &self.preview {
                self.preview_shown = true;
                return Some(PreviewUpdate::Show(preview.clone()));
            }
        }

        if self.linger_until.is_some_and(|until| now >= until) {
            self.linger_until = None;
            self.preview = None;
        }

        if self.preview.is_none() && self.preview_shown {
            self.preview_shown = false;
            return Some(PreviewUpdate::Clear);
        }
        None
    }

    /// Preview as currently known to the controller.
    pub fn preview(&self) -> Option<&DrawPreview> {
        self.preview.as_ref()
    }

    /// Number of points captured by the stroke in progress.
    pub fn captured_points(&self) -> usize {
        match &self.state {
            DrawState::Drawing { path } => path.len(),
            DrawState::Idle => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Modifiers, MouseButton};
    use geo::{Coord, Rect};
    use kurbo::Point;

    /// Screen pixels are lon/lat directly.
    struct Identity;

    impl Projection for Identity {
        fn geo_to_screen(&self, coord: Coord<f64>) -> Point {
            Point::new(coord.x, coord.y)
        }

        fn screen_to_geo(&self, point: Point) -> Coord<f64> {
            Coord { x: point.x, y: point.y }
        }

        fn view_bounds(&self) -> Rect<f64> {
            Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 100.0, y: 100.0 })
        }
    }

    fn down(x: f64, y: f64, modifiers: Modifiers) -> PointerEvent {
        PointerEvent::Down {
            position: Point::new(x, y),
            button: MouseButton::Left,
            modifiers,
        }
    }

    fn moved(x: f64, y: f64) -> PointerEvent {
        PointerEvent::Move {
            position: Point::new(x, y),
        }
    }

    fn active() -> DrawController {
        let mut controller = DrawController::default();
        controller.activate();
        controller
    }

    #[test]
    fn test_two_click_cycle() {
        let mut controller = active();
        let now = Instant::now();

        assert!(matches!(controller.handle_event(&down(0.0, 0.0, Modifiers::NONE), &Identity, now), DrawOutcome::Started));
        assert!(controller.is_drawing());
        assert!(matches!(controller.handle_event(&moved(10.0, 0.0), &Identity, now), DrawOutcome::Extended));
        assert!(matches!(controller.handle_event(&moved(10.0, 10.0), &Identity, now), DrawOutcome::Extended));

        let outcome = controller.handle_event(&down(0.0, 10.0, Modifiers::shift()), &Identity, now);
        let DrawOutcome::Finished(stroke) = outcome else {
            panic!("expected a finished stroke");
        };
        assert!(!controller.is_drawing());
        assert_eq!(stroke.modifiers, ModifierState::ADD);
        // Four captured points plus the closing point.
        assert_eq!(stroke.region.boundary().0.len(), 5);
    }

    #[test]
    fn test_ignored_when_inactive_or_pointer_held() {
        let mut controller = DrawController::default();
        let now = Instant::now();
        assert!(matches!(controller.handle_event(&down(0.0, 0.0, Modifiers::NONE), &Identity, now), DrawOutcome::Ignored));

        controller.activate();
        controller.set_pointer_held(true);
        assert!(matches!(controller.handle_event(&down(0.0, 0.0, Modifiers::NONE), &Identity, now), DrawOutcome::Ignored));

        controller.set_pointer_held(false);
        assert!(matches!(controller.handle_event(&down(0.0, 0.0, Modifiers::NONE), &Identity, now), DrawOutcome::Started));
    }

    #[test]
    fn test_moves_ignored_when_idle() {
        let mut controller = active();
        assert!(matches!(controller.handle_event(&moved(1.0, 1.0), &Identity, Instant::now()), DrawOutcome::Ignored));
        assert_eq!(controller.captured_points(), 0);
    }

    #[test]
    fn test_secondary_button_ignored() {
        let mut controller = active();
        let event = PointerEvent::Down {
            position: Point::new(1.0, 1.0),
            button: MouseButton::Right,
            modifiers: Modifiers::NONE,
        };
        assert!(matches!(controller.handle_event(&event, &Identity, Instant::now()), DrawOutcome::Ignored));
        assert!(!controller.is_drawing());
    }

    #[test]
    fn test_path_records_every_sample_while_preview_coalesces() {
        let mut controller = active();
        let now = Instant::now();
        controller.handle_event(&down(0.0, 0.0, Modifiers::NONE), &Identity, now);
        assert!(matches!(controller.frame(now), Some(PreviewUpdate::Show(_))));

        for i in 1..=50 {
            controller.handle_event(&moved(i as f64, (i % 7) as f64), &Identity, now);
        }
        assert_eq!(controller.captured_points(), 51);

        // Fifty moves, one preview update.
        let Some(PreviewUpdate::Show(preview)) = controller.frame(now) else {
            panic!("expected preview");
        };
        assert_eq!(preview.line.0.len(), 51);
        assert!(preview.fill.is_some());
        assert!(controller.frame(now).is_none());
    }

    #[test]
    fn test_preview_lingers_after_finish() {
        let mut controller = DrawController::new(ModifierBindings::default(), Duration::from_millis(300));
        controller.activate();
        let start = Instant::now();
        controller.handle_event(&down(0.0, 0.0, Modifiers::NONE), &Identity, start);
        controller.handle_event(&moved(5.0, 0.0), &Identity, start);
        controller.frame(start);
        controller.handle_event(&down(5.0, 5.0, Modifiers::NONE), &Identity, start);

        // Final closed stroke is shown, then kept until the linger expires.
        assert!(matches!(controller.frame(start), Some(PreviewUpdate::Show(_))));
        assert!(controller.frame(start + Duration::from_millis(100)).is_none());
        assert_eq!(controller.frame(start + Duration::from_millis(300)), Some(PreviewUpdate::Clear));
        assert!(controller.frame(start + Duration::from_millis(400)).is_none());
    }

    #[test]
    fn test_minimal_stroke_forms_region() {
        let mut controller = active();
        let now = Instant::now();
        controller.handle_event(&down(0.0, 0.0, Modifiers::NONE), &Identity, now);
        // The finishing click itself adds the second point, so a region is formed.
        assert!(matches!(controller.handle_event(&down(5.0, 5.0, Modifiers::NONE), &Identity, now), DrawOutcome::Finished(_)));
    }

    #[test]
    fn test_deactivate_mid_stroke_restores_interactions() {
        let mut controller = active();
        let now = Instant::now();
        assert_eq!(
            controller.guards(),
            InteractionGuards {
                popups_suppressed: true,
                drag_suppressed: true
            }
        );

        controller.handle_event(&down(0.0, 0.0, Modifiers::NONE), &Identity, now);
        controller.handle_event(&moved(3.0, 3.0), &Identity, now);
        controller.frame(now);

        controller.deactivate();
        assert!(!controller.is_drawing());
        assert_eq!(controller.guards(), InteractionGuards::default());
        assert_eq!(controller.frame(now), Some(PreviewUpdate::Clear));
    }

    #[test]
    fn test_cancel_stroke() {
        let mut controller = active();
        let now = Instant::now();
        assert!(!controller.cancel_stroke());
        controller.handle_event(&down(0.0, 0.0, Modifiers::NONE), &Identity, now);
        assert!(controller.cancel_stroke());
        assert!(controller.is_active());
        assert!(controller.preview().is_none());
    }
}
