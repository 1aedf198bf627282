//! Headless host: replays a script against a layer, frame by frame.

use crate::script::{ScriptResult, Step, modifiers_from_keys};
use geolasso_core::{
    Layer, LayerRegistry, LayerStore, MouseButton, Notice, OverlaySurface, PointerEvent, Projection, ScreenPreview,
    SelectionConfig, SelectionDriver, SelectionEvent, SelectionScene, StatOp, StatResult, Viewport,
};
use geo::Coord;
use kurbo::{Point, Size, Vec2};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Host-side settings of a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub width: f64,
    pub height: f64,
    /// Simulated time between animation frames.
    pub frame_interval: Duration,
    /// Padding around the layer when fitting the view, in pixels.
    pub fit_padding: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
            frame_interval: Duration::from_millis(16),
            fit_padding: 40.0,
        }
    }
}

/// Overlay surface that keeps a summary of what is on screen.
#[derive(Debug, Default)]
pub struct ConsoleSurface {
    pub mask_holes: Option<usize>,
    pub outline_markers: usize,
    pub preview_visible: bool,
    pub selection_updates: usize,
    pub preview_updates: usize,
}

impl OverlaySurface for ConsoleSurface {
    fn show_selection(&mut self, scene: &SelectionScene) {
        log::debug!(
            "Mask with {} holes, {} point markers",
            scene.mask.hole_count,
            scene.overlay.markers.len()
        );
        self.mask_holes = Some(scene.mask.hole_count);
        self.outline_markers = scene.overlay.markers.len();
        self.selection_updates += 1;
    }

    fn clear_selection(&mut self) {
        log::debug!("Mask cleared");
        self.mask_holes = None;
        self.outline_markers = 0;
        self.selection_updates += 1;
    }

    fn show_preview(&mut self, preview: &ScreenPreview) {
        log::trace!("Preview with {} path elements", preview.line.elements().len());
        self.preview_visible = true;
        self.preview_updates += 1;
    }

    fn clear_preview(&mut self) {
        self.preview_visible = false;
        self.preview_updates += 1;
    }
}

/// Outcome of a replayed session.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub layer: String,
    pub selected: Vec<String>,
    pub source_layer: Option<String>,
    pub statistic: Option<StatResult>,
    pub notices: Vec<String>,
    pub changes: usize,
    pub frames: u64,
    pub mask_holes: Option<usize>,
}

/// One replay of a script against a layer.
pub struct Session {
    store: LayerStore,
    layer_id: String,
    viewport: Viewport,
    driver: SelectionDriver,
    surface: ConsoleSurface,
    notices: Vec<Notice>,
    changes: usize,
    now: Instant,
    config: SessionConfig,
}

impl Session {
    pub fn new(layer: Layer, selection_config: SelectionConfig, config: SessionConfig) -> Self {
        let mut viewport = Viewport::new(Coord { x: 0.0, y: 0.0 }, 2.0, Size::new(config.width, config.height));
        if let Some(bounds) = layer.bounds() {
            viewport.fit_to_bounds(bounds, config.fit_padding);
        }

        let layer_id = layer.id.clone();
        let mut store = LayerStore::new();
        store.add_layer(layer);

        Self {
            store,
            layer_id,
            viewport,
            driver: SelectionDriver::new(selection_config),
            surface: ConsoleSurface::default(),
            notices: Vec::new(),
            changes: 0,
            now: Instant::now(),
            config,
        }
    }

    pub fn driver(&self) -> &SelectionDriver {
        &self.driver
    }

    pub fn surface(&self) -> &ConsoleSurface {
        &self.surface
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Choose the live statistic reported at the end.
    pub fn set_stat_choice(&mut self, field: &str, op: StatOp) {
        self.driver.engine_mut().set_stat_choice(field, op);
    }

    /// Replay every step in order.
    pub fn run(&mut self, steps: &[Step]) -> ScriptResult<()> {
        for (index, step) in steps.iter().enumerate() {
            log::debug!("Step {}: {:?}", index, step);
            self.step(step)?;
        }
        Ok(())
    }

    pub fn step(&mut self, step: &Step) -> ScriptResult<()> {
        match step {
            Step::Activate => {
                // Refusal is reported through the notices, not as a script failure.
                if let Err(e) = self.driver.activate(&self.store, &mut self.notices) {
                    log::warn!("Activation refused: {}", e);
                }
            }
            Step::Deactivate => self.driver.deactivate(),
            Step::Down { lon, lat, modifiers } => {
                let event = PointerEvent::Down {
                    position: self.screen(*lon, *lat),
                    button: MouseButton::Left,
                    modifiers: modifiers_from_keys(modifiers),
                };
                self.pointer(&event);
            }
            Step::Move { lon, lat } => {
                let event = PointerEvent::Move {
                    position: self.screen(*lon, *lat),
                };
                self.pointer(&event);
            }
            Step::Frame => self.frame(),
            Step::Frames { count } => {
                for _ in 0..*count {
                    self.frame();
                }
            }
            Step::Settle => {
                self.now = self
                    .driver
                    .settle(self.now, self.config.frame_interval, &self.viewport, &mut self.surface);
            }
            Step::Wait { ms } => self.now += Duration::from_millis(*ms),
            Step::Pan { dx, dy } => self.viewport.pan(Vec2::new(*dx, *dy)),
            Step::Zoom { factor, lon, lat } => {
                let anchor = match (lon, lat) {
                    (Some(lon), Some(lat)) => self.screen(*lon, *lat),
                    _ => Point::new(self.viewport.size.width / 2.0, self.viewport.size.height / 2.0),
                };
                self.viewport.zoom_at(anchor, *factor);
            }
            Step::Fit => {
                if let Some(bounds) = self.store.active_layer().and_then(Layer::bounds) {
                    self.viewport.fit_to_bounds(bounds, self.config.fit_padding);
                }
            }
            Step::Clear => {
                self.driver.engine_mut().clear_selection();
            }
            Step::Cancel => {
                self.driver.engine_mut().cancel_stroke();
            }
            Step::Stat { field, operation } => {
                let op: StatOp = operation.parse()?;
                self.driver.engine_mut().set_stat_choice(field.clone(), op);
            }
        }
        self.drain_events();
        Ok(())
    }

    fn screen(&self, lon: f64, lat: f64) -> Point {
        self.viewport.geo_to_screen(Coord { x: lon, y: lat })
    }

    fn pointer(&mut self, event: &PointerEvent) {
        self.driver.pointer(event, &self.store, &self.viewport, self.now);
    }

    fn frame(&mut self) {
        self.now += self.config.frame_interval;
        self.driver.frame(self.now, &self.viewport, &mut self.surface);
    }

    fn drain_events(&mut self) {
        for event in self.driver.engine_mut().poll_events() {
            match event {
                SelectionEvent::Changed(delta) => {
                    log::info!("Selection {:?}: {} selected", delta.kind, delta.size);
                    self.changes += 1;
                }
                SelectionEvent::Activated => log::info!("Selection mode on"),
                SelectionEvent::Deactivated => log::info!("Selection mode off"),
            }
        }
    }

    /// Summarize the session so far.
    pub fn report(&self) -> Report {
        let engine = self.driver.engine();
        Report {
            layer: self.store.active_layer_id().unwrap_or_else(|| self.layer_id.clone()),
            selected: engine.selection().keys().map(|key| key.to_string()).collect(),
            source_layer: engine.selection().source_layer().map(str::to_string),
            statistic: engine.stat_result().cloned(),
            notices: self.notices.iter().map(Notice::to_string).collect(),
            changes: self.changes,
            frames: self.driver.clock().frame(),
            mask_holes: self.surface.mask_holes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_script;

    const PARCELS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "id": "p1", "properties": {"value": 10},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
            {"type": "Feature", "id": "p2", "properties": {"value": 20},
             "geometry": {"type": "Polygon", "coordinates": [[[2,0],[3,0],[3,1],[2,1],[2,0]]]}},
            {"type": "Feature", "id": "p3", "properties": {"value": 30},
             "geometry": {"type": "Polygon", "coordinates": [[[4,0],[5,0],[5,1],[4,1],[4,0]]]}}
        ]
    }"#;

    fn session(config: SelectionConfig) -> Session {
        let layer = Layer::from_geojson("parcels", PARCELS).unwrap();
        Session::new(layer, config, SessionConfig::default())
    }

    fn lasso(x0: f64, x1: f64, modifiers: &str) -> String {
        format!(
            r#"{{"op": "down", "lon": {x0}, "lat": -0.5}},
               {{"op": "move", "lon": {x1}, "lat": -0.5}},
               {{"op": "move", "lon": {x1}, "lat": 1.5}},
               {{"op": "down", "lon": {x0}, "lat": 1.5, "modifiers": [{modifiers}]}},
               {{"op": "settle"}}"#
        )
    }

    #[test]
    fn test_replay_replace_then_add() {
        let script = format!(
            r#"[{{"op": "activate"}}, {{"op": "stat", "field": "value", "operation": "sum"}}, {}, {}]"#,
            lasso(-0.5, 3.5, ""),
            lasso(3.5, 5.5, r#""shift""#)
        );
        let steps = parse_script(&script).unwrap();
        let mut session = session(SelectionConfig::default());
        session.run(&steps).unwrap();

        let report = session.report();
        assert_eq!(report.selected, vec!["id:p1", "id:p2", "id:p3"]);
        assert_eq!(report.statistic.and_then(|s| s.value.as_number()), Some(60.0));
        assert_eq!(report.changes, 2);
        assert_eq!(report.mask_holes, Some(3));
        assert_eq!(report.source_layer.as_deref(), Some("parcels"));
    }

    #[test]
    fn test_chunked_replay_matches() {
        let config = SelectionConfig {
            chunk_size: 1,
            ..SelectionConfig::default()
        };
        let steps = parse_script(&format!(r#"[{{"op": "activate"}}, {}]"#, lasso(-0.5, 1.5, ""))).unwrap();
        let mut session = session(config);
        let start = session.now;
        session.run(&steps).unwrap();
        assert_eq!(session.report().selected, vec!["id:p1"]);
        assert_eq!(session.report().frames, 2);
        assert_eq!(session.now - start, SessionConfig::default().frame_interval * 2);
        assert_eq!(session.driver().in_flight(), 0);
    }

    #[test]
    fn test_pan_keeps_selection_mask() {
        let steps = parse_script(&format!(
            r#"[{{"op": "activate"}}, {}, {{"op": "pan", "dx": 50, "dy": 0}}, {{"op": "frames", "count": 2}}, {{"op": "clear"}}, {{"op": "frame"}}]"#,
            lasso(-0.5, 1.5, "")
        ))
        .unwrap();
        let mut session = session(SelectionConfig::default());
        session.run(&steps[..6]).unwrap();
        assert_eq!(session.surface().mask_holes, Some(1));
        let updates = session.surface().selection_updates;

        session.run(&steps[6..8]).unwrap();
        assert!(session.surface().selection_updates > updates);
        assert_eq!(session.surface().mask_holes, Some(1));

        session.run(&steps[8..]).unwrap();
        assert_eq!(session.surface().mask_holes, None);
        assert!(session.report().selected.is_empty());
    }

    #[test]
    fn test_draw_ignored_before_activation() {
        let steps = parse_script(&format!("[{}]", lasso(-0.5, 3.5, ""))).unwrap();
        let mut session = session(SelectionConfig::default());
        session.run(&steps).unwrap();
        assert!(session.report().selected.is_empty());
        assert_eq!(session.report().changes, 0);
    }

    #[test]
    fn test_activation_refused_on_empty_layer() {
        let mut session = Session::new(Layer::new("empty", Vec::new()), SelectionConfig::default(), SessionConfig::default());
        session.step(&Step::Activate).unwrap();
        assert!(!session.driver().engine().is_active());
        assert_eq!(session.report().notices, vec!["Layer 'empty' has no features to select"]);
    }

    #[test]
    fn test_invalid_statistic_fails() {
        let mut session = session(SelectionConfig::default());
        let step = Step::Stat {
            field: "value".to_string(),
            operation: "median".to_string(),
        };
        assert!(session.step(&step).is_err());
    }
}
