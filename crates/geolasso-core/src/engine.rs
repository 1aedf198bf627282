//! Selection engine: owns the selection and everything derived from it.
//!
//! The engine is a plain owned value. Hosts feed it pointer events and
//! frame ticks, and receive overlay updates through [`OverlaySurface`] and
//! change notifications through [`SelectionEngine::poll_events`]. The
//! asynchronous half of a stroke (batch testing) lives in
//! [`crate::driver::SelectionDriver`].

use crate::config::SelectionConfig;
use crate::draw::{DrawController, DrawOutcome, InteractionGuards, PreviewUpdate};
use crate::error::{SelectionError, SelectionResult};
use crate::feature::Feature;
use crate::input::{ModifierState, PointerEvent};
use crate::intersect::IntersectionTester;
use crate::layer::{LayerId, LayerRegistry};
use crate::mask::{HighlightOverlay, MaskGeometry, MaskRenderer, OverlaySurface, SceneUpdate, ScreenPreview};
use crate::selection::{SelectionDelta, SelectionSet};
use crate::stats::{LiveStats, StatOp, StatResult, compute};
use crate::viewport::Projection;
use std::fmt;
use uuid::Uuid;

// Use web-time on WASM, std::time otherwise
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// User-facing message routed through the host's notification sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    NoActiveLayer,
    EmptyLayer(LayerId),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NoActiveLayer => write!(f, "No active layer selected"),
            Notice::EmptyLayer(id) => write!(f, "Layer '{}' has no features to select", id),
        }
    }
}

/// Notification sink (toasts, status bar, ...).
pub trait Notifier {
    fn notify(&mut self, notice: &Notice);
}

/// Notifier that only writes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, notice: &Notice) {
        log::warn!("{}", notice);
    }
}

impl Notifier for Vec<Notice> {
    fn notify(&mut self, notice: &Notice) {
        self.push(notice.clone());
    }
}

/// Event emitted to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEvent {
    Activated,
    Deactivated,
    /// The selection changed; fired after mask and statistics are up to date.
    Changed(SelectionDelta),
}

/// A finished stroke waiting for batch testing.
#[derive(Debug, Clone)]
pub struct StrokeQuery {
    pub id: Uuid,
    pub tester: IntersectionTester,
    pub modifiers: ModifierState,
    /// Active layer when the stroke finished.
    pub layer: Option<LayerId>,
    /// Snapshot of the active layer's features.
    pub features: Vec<Feature>,
}

/// Owns the selection set and keeps mask, overlay and statistics in step with it.
#[derive(Debug)]
pub struct SelectionEngine {
    config: SelectionConfig,
    selection: SelectionSet,
    draw: DrawController,
    renderer: MaskRenderer,
    stats: LiveStats,
    latest_stroke: Option<Uuid>,
    preview_revision: Option<u64>,
    events: Vec<SelectionEvent>,
}

impl Default for SelectionEngine {
    fn default() -> Self {
        Self::new(SelectionConfig::default())
    }
}

impl SelectionEngine {
    pub fn new(config: SelectionConfig) -> Self {
        Self {
            draw: DrawController::new(config.modifier_bindings, config.preview_linger()),
            renderer: MaskRenderer::new(&config),
            config,
            selection: SelectionSet::new(),
            stats: LiveStats::new(),
            latest_stroke: None,
            preview_revision: None,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Enter selection mode.
    ///
    /// Refused with a warning when no layer is active or the active layer is empty.
    pub fn activate_selection(
        &mut self,
        registry: &dyn LayerRegistry,
        notifier: &mut dyn Notifier,
    ) -> SelectionResult<()> {
        let Some(layer) = registry.active_layer_id() else {
            notifier.notify(&Notice::NoActiveLayer);
            return Err(SelectionError::NoActiveLayer);
        };
        if registry.active_layer_features().is_empty() {
            notifier.notify(&Notice::EmptyLayer(layer.clone()));
            return Err(SelectionError::EmptyLayer(layer));
        }

        if !self.draw.is_active() {
            self.draw.activate();
            self.events.push(SelectionEvent::Activated);
            log::info!("Selection mode activated on layer '{}'", layer);
        }
        Ok(())
    }

    /// Leave selection mode. Any stroke in progress or still being tested is dropped.
    pub fn deactivate_selection(&mut self) {
        if !self.draw.is_active() {
            return;
        }
        self.draw.deactivate();
        self.latest_stroke = None;
        self.events.push(SelectionEvent::Deactivated);
        log::info!("Selection mode deactivated");
    }

    pub fn is_active(&self) -> bool {
        self.draw.is_active()
    }

    pub fn is_drawing(&self) -> bool {
        self.draw.is_drawing()
    }

    /// Map interactions the host must currently suppress.
    pub fn guards(&self) -> InteractionGuards {
        self.draw.guards()
    }

    pub fn draw(&self) -> &DrawController {
        &self.draw
    }

    /// Mark the pointer as held by another exclusive interaction mode.
    pub fn set_pointer_held(&mut self, held: bool) {
        self.draw.set_pointer_held(held);
    }

    /// Feed a pointer event. Returns a query when the event finished a stroke.
    pub fn handle_pointer(
        &mut self,
        event: &PointerEvent,
        registry: &dyn LayerRegistry,
        projection: &dyn Projection,
        now: Instant,
    ) -> Option<StrokeQuery> {
        match self.draw.handle_event(event, projection, now) {
            DrawOutcome::Finished(stroke) if stroke.region.is_degenerate() => {
                log::debug!("Stroke encloses no area, nothing to test");
                None
            }
            DrawOutcome::Finished(stroke) => {
                let id = Uuid::new_v4();
                self.latest_stroke = Some(id);
                let tester =
                    IntersectionTester::new(stroke.region).with_contained_lines(self.config.lines_match_when_contained);
                let features = registry.active_layer_features();
                log::debug!("Stroke {} queued against {} features", id, features.len());
                Some(StrokeQuery {
                    id,
                    tester,
                    modifiers: stroke.modifiers,
                    layer: registry.active_layer_id(),
                    features,
                })
            }
            DrawOutcome::Discarded => {
                log::debug!("Stroke too short, nothing to test");
                None
            }
            DrawOutcome::Started | DrawOutcome::Extended | DrawOutcome::Ignored => None,
        }
    }

    /// Abandon the stroke in progress.
    pub fn cancel_stroke(&mut self) -> bool {
        self.draw.cancel_stroke()
    }

    /// Whether `id` is the most recent stroke still waiting for results.
    pub fn is_latest(&self, id: Uuid) -> bool {
        self.latest_stroke == Some(id)
    }

    /// Apply a stroke's complete matched list.
    ///
    /// Results of superseded strokes are dropped. On success the mask, overlay
    /// and statistics are refreshed before the change event is queued.
    pub fn apply_matches(
        &mut self,
        id: Uuid,
        matched: Vec<Feature>,
        modifiers: ModifierState,
        layer: Option<&str>,
    ) -> Option<SelectionDelta> {
        if !self.is_latest(id) {
            log::debug!("Dropping results of superseded stroke {}", id);
            return None;
        }
        self.latest_stroke = None;

        let matched_count = matched.len();
        let delta = self.selection.apply(matched, modifiers, layer);
        log::info!(
            "Stroke matched {} features: {:?} (+{} -{}) -> {} selected",
            matched_count,
            delta.kind,
            delta.added,
            delta.removed,
            delta.size
        );
        self.commit(delta);
        Some(delta)
    }

    fn commit(&mut self, delta: SelectionDelta) {
        self.renderer.rebuild(&self.selection);
        self.stats.refresh(&self.selection);
        self.events.push(SelectionEvent::Changed(delta));
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Empty the selection; mask and overlay are removed on the next frame.
    pub fn clear_selection(&mut self) -> SelectionDelta {
        let delta = self.selection.clear();
        self.commit(delta);
        delta
    }

    /// React to the host switching layers.
    ///
    /// A selection taken from another layer is cleared and pending strokes
    /// are dropped, since their features belong to the old layer.
    pub fn on_active_layer_changed(&mut self, layer: Option<&str>) -> Option<SelectionDelta> {
        self.latest_stroke = None;
        let stale = !self.selection.is_empty() && layer.is_none_or(|id| !self.selection.is_from_layer(id));
        stale.then(|| self.clear_selection())
    }

    /// One-off statistic over the current selection.
    pub fn selection_stats(&self, field: &str, op: StatOp) -> StatResult {
        compute(&self.selection, field, op)
    }

    /// Choose the live statistic, recomputed on every selection change.
    pub fn set_stat_choice(&mut self, field: impl Into<String>, op: StatOp) {
        self.stats.set_choice(field, op, &self.selection);
    }

    pub fn stat_result(&self) -> Option<&StatResult> {
        self.stats.result()
    }

    pub fn mask(&self) -> Option<&MaskGeometry> {
        self.renderer.mask()
    }

    pub fn overlay(&self) -> &HighlightOverlay {
        self.renderer.overlay()
    }

    /// Drain queued events.
    pub fn poll_events(&mut self) -> Vec<SelectionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Per-frame visual refresh: stroke preview, then mask and overlay.
    pub fn frame(&mut self, now: Instant, projection: &dyn Projection, surface: &mut dyn OverlaySurface) {
        let style = *self.renderer.style();
        let revision = projection.revision();
        match self.draw.frame(now) {
            Some(PreviewUpdate::Show(preview)) => {
                surface.show_preview(&ScreenPreview::project(&preview, projection, &style));
                self.preview_revision = Some(revision);
            }
            Some(PreviewUpdate::Clear) => {
                surface.clear_preview();
                self.preview_revision = None;
            }
            None => {
                // Keep a visible preview attached to the map while it moves.
                let moved = self.preview_revision.is_some_and(|shown| shown != revision);
                if let Some(preview) = self.draw.preview().filter(|_| moved) {
                    surface.show_preview(&ScreenPreview::project(preview, projection, &style));
                    self.preview_revision = Some(revision);
                }
            }
        }

        match self.renderer.frame(now, projection) {
            Some(SceneUpdate::Show(scene)) => surface.show_selection(&scene),
            Some(SceneUpdate::Clear) => surface.clear_selection(),
            None => {}
        }
    }
}
