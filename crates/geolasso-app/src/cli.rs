//! Command-line arguments and configuration lookup.

use crate::script::ScriptResult;
use crate::shortcuts::ShortcutRegistry;
use clap::{CommandFactory, FromArgMatches, Parser};
use geolasso_core::{ModifierBindings, SelectionConfig, StatOp};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Live statistic requested on the command line as `<field>:<op>`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatChoice {
    pub field: String,
    pub op: StatOp,
}

fn parse_stat_choice(value: &str) -> Result<StatChoice, String> {
    let (field, op) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("expected <field>:<op>, got '{}'", value))?;
    if field.is_empty() {
        return Err("field name is empty".to_string());
    }
    let op = op.parse::<StatOp>().map_err(|e| e.to_string())?;
    Ok(StatChoice {
        field: field.to_string(),
        op,
    })
}

/// Replay a freehand selection script against a GeoJSON layer.
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(name = "geolasso", version, about)]
pub struct Args {
    /// GeoJSON FeatureCollection to select from
    #[arg(value_name = "LAYER")]
    pub layer: PathBuf,

    /// JSON list of interaction steps
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Selection configuration (defaults to <config dir>/geolasso/config.json)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Statistic applied before the script runs (sum, average, mode, min, max)
    #[arg(long, value_name = "FIELD:OP", value_parser = parse_stat_choice)]
    pub stat: Option<StatChoice>,

    /// Print the report as JSON
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub json: bool,
}

impl Args {
    /// Command definition with the gesture reference for `bindings` appended to the help.
    pub fn command_with_gestures(bindings: &ModifierBindings) -> clap::Command {
        Self::command().after_help(ShortcutRegistry::help_text(bindings))
    }

    /// Parse `args` (program name first). Help and version requests come back
    /// as a [`clap::Error`] whose `exit()` prints them.
    pub fn try_parse_with_gestures<I, T>(args: I, bindings: &ModifierBindings) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command_with_gestures(bindings).try_get_matches_from(args)?;
        Self::from_arg_matches(&matches)
    }
}

/// `<config dir>/geolasso/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("geolasso").join("config.json"))
}

/// Load the explicit configuration file, else the default one if present, else defaults.
pub fn load_config(explicit: Option<&Path>) -> ScriptResult<SelectionConfig> {
    if let Some(path) = explicit {
        return Ok(SelectionConfig::load(path)?);
    }
    match default_config_path().filter(|path| path.exists()) {
        Some(path) => {
            log::info!("Using configuration {}", path.display());
            Ok(SelectionConfig::load(&path)?)
        }
        None => Ok(SelectionConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ScriptError;
    use clap::error::ErrorKind;
    use geolasso_core::ModifierKey;
    use std::io::Write;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        let argv = std::iter::once("geolasso").chain(args.iter().copied());
        Args::try_parse_with_gestures(argv, &ModifierBindings::default())
    }

    #[test]
    fn test_parse_full() {
        let args = parse(&["layer.geojson", "--stat", "area:avg", "script.json", "--config", "c.json", "--json"]).unwrap();
        assert_eq!(args.layer, PathBuf::from("layer.geojson"));
        assert_eq!(args.script, PathBuf::from("script.json"));
        assert_eq!(args.config, Some(PathBuf::from("c.json")));
        assert_eq!(
            args.stat,
            Some(StatChoice {
                field: "area".to_string(),
                op: StatOp::Average,
            })
        );
        assert!(args.json);
    }

    #[test]
    fn test_parse_defaults() {
        let args = parse(&["layer.geojson", "script.json"]).unwrap();
        assert_eq!(args.config, None);
        assert_eq!(args.stat, None);
        assert!(!args.json);
    }

    #[test]
    fn test_stat_field_may_contain_colons() {
        let choice = parse_stat_choice("ns:area:max").unwrap();
        assert_eq!(choice.field, "ns:area");
        assert_eq!(choice.op, StatOp::Max);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse(&["only-one"]).unwrap_err().kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(parse(&["a", "b", "--stat", "area"]).unwrap_err().kind(), ErrorKind::ValueValidation);
        assert_eq!(parse(&["a", "b", "--stat", "area:median"]).unwrap_err().kind(), ErrorKind::ValueValidation);
        assert_eq!(parse(&["a", "b", "--stat", ":sum"]).unwrap_err().kind(), ErrorKind::ValueValidation);
        assert_eq!(parse(&["a", "b", "--verbose"]).unwrap_err().kind(), ErrorKind::UnknownArgument);
        assert_eq!(parse(&["a", "b", "c"]).unwrap_err().kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_help_lists_gestures_for_bindings() {
        let err = parse(&["--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);

        let bindings = ModifierBindings {
            add: ModifierKey::Ctrl,
            remove: ModifierKey::Meta,
        };
        let help = Args::command_with_gestures(&bindings).render_long_help().to_string();
        assert!(help.contains("--stat <FIELD:OP>"));
        assert!(help.contains("Selection gestures:"));
        assert!(help.contains("Ctrl+Click to finish"));
    }

    #[test]
    fn test_command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_explicit_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"chunk_size": 7}}"#).unwrap();
        assert_eq!(load_config(Some(file.path())).unwrap().chunk_size, 7);
        assert!(matches!(
            load_config(Some(Path::new("/nonexistent/config.json"))),
            Err(ScriptError::Selection(_))
        ));
    }
}
