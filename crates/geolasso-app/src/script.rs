//! Scripted interaction sessions.
//!
//! A script is a JSON array of steps replayed against one layer, for example:
//!
//! ```json
//! [
//!   {"op": "activate"},
//!   {"op": "down", "lon": -0.5, "lat": -0.5},
//!   {"op": "move", "lon": 3.5, "lat": -0.5},
//!   {"op": "move", "lon": 3.5, "lat": 1.5},
//!   {"op": "down", "lon": -0.5, "lat": 1.5, "modifiers": ["shift"]},
//!   {"op": "settle"}
//! ]
//! ```

use geolasso_core::stats::ParseStatOpError;
use geolasso_core::{LayerError, ModifierKey, Modifiers, SelectionError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or running a session.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Invalid script: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Layer(#[from] LayerError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Stat(#[from] ParseStatOpError),
}

pub type ScriptResult<T> = Result<T, ScriptError>;

/// One scripted action. Positions are lon/lat and are projected through the
/// session viewport before reaching the selection engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Activate,
    Deactivate,
    /// Primary button press.
    Down {
        lon: f64,
        lat: f64,
        #[serde(default)]
        modifiers: Vec<ModifierKey>,
    },
    Move {
        lon: f64,
        lat: f64,
    },
    /// Advance one animation frame.
    Frame,
    Frames {
        count: u32,
    },
    /// Run frames until every pending batch run has been applied.
    Settle,
    /// Let wall-clock time pass without a frame.
    Wait {
        ms: u64,
    },
    /// Pan by a screen-pixel delta.
    Pan {
        dx: f64,
        dy: f64,
    },
    /// Zoom by `factor` around a lon/lat anchor (the view center when omitted).
    Zoom {
        factor: f64,
        #[serde(default)]
        lon: Option<f64>,
        #[serde(default)]
        lat: Option<f64>,
    },
    /// Fit the view to the active layer.
    Fit,
    Clear,
    /// Abandon the stroke in progress.
    Cancel,
    /// Choose the live statistic.
    Stat {
        field: String,
        operation: String,
    },
}

/// Build a modifier snapshot from the keys listed in a step.
pub fn modifiers_from_keys(keys: &[ModifierKey]) -> Modifiers {
    let mut modifiers = Modifiers::NONE;
    for key in keys {
        match key {
            ModifierKey::Shift => modifiers.shift = true,
            ModifierKey::Ctrl => modifiers.ctrl = true,
            ModifierKey::Alt => modifiers.alt = true,
            ModifierKey::Meta => modifiers.meta = true,
        }
    }
    modifiers
}

/// Parse a script document.
pub fn parse_script(json: &str) -> ScriptResult<Vec<Step>> {
    Ok(serde_json::from_str(json)?)
}

/// Read and parse a script file.
pub fn load_script(path: &Path) -> ScriptResult<Vec<Step>> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| ScriptError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    parse_script(&json)
}
