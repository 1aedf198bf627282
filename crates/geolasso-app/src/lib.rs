//! GeoLasso Application
//!
//! Headless host for the selection engine: loads a GeoJSON layer, replays a
//! scripted interaction against it and reports the resulting selection.

mod cli;
mod script;
mod session;
mod shortcuts;

pub use cli::{Args, StatChoice, default_config_path, load_config};
pub use script::{ScriptError, ScriptResult, Step, load_script, parse_script};
pub use session::{ConsoleSurface, Report, Session, SessionConfig};
pub use shortcuts::{Shortcut, ShortcutRegistry};
