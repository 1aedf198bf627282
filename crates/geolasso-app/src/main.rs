//! Command-line entry point: replay a selection script against a layer.

use geolasso_app::{Args, Report, ScriptError, Session, SessionConfig, load_config, load_script};
use geolasso_core::Layer;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    // The help text lists gestures for the default configuration's bindings.
    let bindings = load_config(None).map(|c| c.modifier_bindings).unwrap_or_default();
    let args = match Args::try_parse_with_gestures(std::env::args_os(), &bindings) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), ScriptError> {
    let config = load_config(args.config.as_deref())?;
    let layer_json = std::fs::read_to_string(&args.layer)
        .map_err(|e| ScriptError::Io(format!("Failed to read {}: {}", args.layer.display(), e)))?;
    let layer_id = args
        .layer
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "layer".to_string());
    let layer = Layer::from_geojson(layer_id, &layer_json)?;
    let steps = load_script(&args.script)?;

    log::info!("Replaying {} steps against '{}' ({} features)", steps.len(), layer.id, layer.len());
    let mut session = Session::new(layer, config, SessionConfig::default());
    if let Some(stat) = &args.stat {
        session.set_stat_choice(&stat.field, stat.op);
    }
    session.run(&steps)?;

    let report = session.report();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &Report) {
    for notice in &report.notices {
        println!("warning: {}", notice);
    }
    println!("layer: {}", report.layer);
    println!("selected: {} feature(s)", report.selected.len());
    for key in &report.selected {
        println!("  {}", key);
    }
    if let Some(stat) = &report.statistic {
        println!("{} [{} value(s)]", stat, stat.sample_count);
    }
    match report.mask_holes {
        Some(holes) => println!("mask: {} hole(s)", holes),
        None => println!("mask: hidden"),
    }
    println!("changes: {}, frames: {}", report.changes, report.frames);
}
