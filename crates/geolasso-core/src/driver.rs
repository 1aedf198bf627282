//! Single-threaded host loop around [`SelectionEngine`].
//!
//! Finished strokes are tested by tasks on a local executor. Each task runs
//! one chunk, parks on the [`FrameClock`] and resumes when the host calls
//! [`SelectionDriver::frame`]. Complete results come back over a channel and
//! are applied on the host side, where stale strokes are discarded.

use crate::config::SelectionConfig;
use crate::engine::{Notifier, SelectionEngine, StrokeQuery};
use crate::error::SelectionResult;
use crate::feature::Feature;
use crate::input::{ModifierState, PointerEvent};
use crate::layer::{LayerId, LayerRegistry};
use crate::mask::OverlaySurface;
use crate::scheduler::{BatchScheduler, FrameClock};
use crate::selection::SelectionDelta;
use crate::viewport::Projection;
use futures::channel::mpsc;
use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;
use std::time::Duration;
use uuid::Uuid;

// Use web-time on WASM, std::time otherwise
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// Complete result of one batch run.
struct StrokeOutcome {
    id: Uuid,
    matched: Vec<Feature>,
    modifiers: ModifierState,
    layer: Option<LayerId>,
}

/// Owns the engine, the executor and the frame clock.
pub struct SelectionDriver {
    engine: SelectionEngine,
    pool: LocalPool,
    clock: FrameClock,
    scheduler: BatchScheduler,
    results_tx: mpsc::UnboundedSender<StrokeOutcome>,
    results_rx: mpsc::UnboundedReceiver<StrokeOutcome>,
    in_flight: usize,
}

impl Default for SelectionDriver {
    fn default() -> Self {
        Self::new(SelectionConfig::default())
    }
}

impl SelectionDriver {
    pub fn new(config: SelectionConfig) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded();
        Self {
            scheduler: BatchScheduler::new(config.chunk_size),
            engine: SelectionEngine::new(config),
            pool: LocalPool::new(),
            clock: FrameClock::new(),
            results_tx,
            results_rx,
            in_flight: 0,
        }
    }

    pub fn engine(&self) -> &SelectionEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SelectionEngine {
        &mut self.engine
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Batch runs started and not yet collected.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn activate(&mut self, registry: &dyn LayerRegistry, notifier: &mut dyn Notifier) -> SelectionResult<()> {
        self.engine.activate_selection(registry, notifier)
    }

    pub fn deactivate(&mut self) {
        self.engine.deactivate_selection();
    }

    /// Feed a pointer event. A finishing click starts a batch run and tests its
    /// first chunk immediately; a run that fits in one chunk is applied at once.
    pub fn pointer(
        &mut self,
        event: &PointerEvent,
        registry: &dyn LayerRegistry,
        projection: &dyn Projection,
        now: Instant,
    ) -> Vec<SelectionDelta> {
        match self.engine.handle_pointer(event, registry, projection, now) {
            Some(query) => {
                self.spawn(query);
                self.pool.run_until_stalled();
                self.collect()
            }
            None => Vec::new(),
        }
    }

    fn spawn(&mut self, query: StrokeQuery) {
        let StrokeQuery {
            id,
            tester,
            modifiers,
            layer,
            features,
        } = query;
        let scheduler = self.scheduler;
        let clock = self.clock.clone();
        let results = self.results_tx.clone();

        let task = async move {
            let matched = scheduler.schedule(features, clock, |feature| tester.test(feature)).await;
            let outcome = StrokeOutcome {
                id,
                matched,
                modifiers,
                layer,
            };
            if results.unbounded_send(outcome).is_err() {
                log::debug!("Driver dropped before stroke {} completed", id);
            }
        };

        match self.pool.spawner().spawn_local(task) {
            Ok(()) => self.in_flight += 1,
            Err(e) => log::error!("Failed to start batch run for stroke {}: {}", id, e),
        }
    }

    /// Apply every completed run. Returns the deltas that changed the selection.
    fn collect(&mut self) -> Vec<SelectionDelta> {
        let mut deltas = Vec::new();
        while let Ok(Some(outcome)) = self.results_rx.try_next() {
            self.in_flight = self.in_flight.saturating_sub(1);
            if let Some(delta) =
                self.engine
                    .apply_matches(outcome.id, outcome.matched, outcome.modifiers, outcome.layer.as_deref())
            {
                deltas.push(delta);
            }
        }
        deltas
    }

    /// Advance one animation frame.
    ///
    /// Parked batch runs test their next chunk, completed runs are applied and
    /// the preview, mask and overlay are pushed to `surface`.
    pub fn frame(
        &mut self,
        now: Instant,
        projection: &dyn Projection,
        surface: &mut dyn OverlaySurface,
    ) -> Vec<SelectionDelta> {
        self.clock.tick();
        self.pool.run_until_stalled();
        let deltas = self.collect();
        self.engine.frame(now, projection, surface);
        deltas
    }

    /// Run frames `frame_interval` apart until no batch run is pending.
    ///
    /// Returns the time of the last frame.
    pub fn settle(
        &mut self,
        mut now: Instant,
        frame_interval: Duration,
        projection: &dyn Projection,
        surface: &mut dyn OverlaySurface,
    ) -> Instant {
        self.engine.frame(now, projection, surface);
        while self.in_flight > 0 {
            now += frame_interval;
            self.frame(now, projection, surface);
        }
        now
    }
}
