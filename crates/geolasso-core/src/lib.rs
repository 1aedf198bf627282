//! GeoLasso Core Library
//!
//! Freehand region selection over map vector layers: stroke capture,
//! frame-yielding intersection testing, selection algebra, the inverse mask
//! overlay and attribute statistics. Rendering and layer storage stay with
//! the host behind the [`Projection`], [`LayerRegistry`], [`Notifier`] and
//! [`OverlaySurface`] traits.

pub mod config;
pub mod draw;
pub mod driver;
pub mod engine;
pub mod error;
pub mod feature;
pub mod input;
pub mod intersect;
pub mod layer;
pub mod mask;
pub mod region;
pub mod scheduler;
pub mod selection;
pub mod stats;
pub mod viewport;

pub use config::{SelectionConfig, SerializableColor};
pub use draw::{DrawController, DrawOutcome, DrawPreview, InteractionGuards, PreviewUpdate};
pub use driver::SelectionDriver;
pub use engine::{LogNotifier, Notice, Notifier, SelectionEngine, SelectionEvent, StrokeQuery};
pub use error::{GeometryError, LayerError, SelectionError, SelectionResult};
pub use feature::{AttrValue, Attributes, Feature, FeatureKey};
pub use input::{ModifierBindings, ModifierKey, ModifierState, Modifiers, MouseButton, PointerEvent, SelectionMode};
pub use intersect::IntersectionTester;
pub use layer::{Layer, LayerId, LayerRegistry, LayerStore};
pub use mask::{HighlightOverlay, MaskGeometry, MaskRenderer, OverlaySurface, ScreenPreview, SelectionScene};
pub use region::{ClosedRegion, Path};
pub use scheduler::{BatchScheduler, DEFAULT_CHUNK_SIZE, FrameClock};
pub use selection::{ChangeKind, SelectionDelta, SelectionSet};
pub use stats::{LiveStats, StatOp, StatResult, StatValue, compute};
pub use viewport::{Projection, Viewport};
