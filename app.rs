use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};

use arcbreaker::{convert_file, read_config, Config, CounterClockwisePolicy, DegenerateArcPolicy};

const GCODE_EXTENSIONS: &[&str] = &["gcode", "ngc", "nc", "tap", "gc", "g"];

const USAGE: &str = "\
Usage: arcbreaker <input> [output] [options]
       arcbreaker --config <file.json> [options]

Options:
  --tolerance <length>        step length along arcs (default 0.05)
  --precision <decimals>      decimals of emitted coordinates (default 3)
  --degenerate <fail|point>   handling of zero radius arcs (default fail)
  --expand-ccw                also break G3 arcs into lines
  --to-mm                     convert an inch program to millimeters first
  --drop-dwell                remove G4/G04 dwell lines";

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return;
    }

    let config = match parse_args(&args) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{}", message);
            eprintln!("{}", USAGE);
            process::exit(2);
        }
    };

    if let Err(e) = setup_logging(&config.input) {
        eprintln!("Unable to set up the log file: {}", e);
    }

    // Check that file looks like a g-code file
    let extension = config.input
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !GCODE_EXTENSIONS.contains(&extension.as_str()) {
        println!("{} does not look like a g-code file, converting anyway", config.input.display());
        warn!("Unexpected extension for {}", config.input.display());
    }

    let size = fs::metadata(&config.input).map(|m| m.len()).unwrap_or(0);
    let progress = ProgressBar::new(size);
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {bytes}/{total_bytes} {msg}") {
        progress.set_style(style.progress_chars("=> "));
    }

    info!("Tolerance {} with {} decimals", config.tolerance, config.precision);

    match convert_file(&config, &progress) {
        Ok(stats) => {
            progress.finish_and_clear();
            println!("Written to {}", config.output_path().display());
            stats.display();
            stats.log("Conversion");
        }
        Err(e) => {
            progress.abandon();
            error!("Conversion of {} failed: {}", config.input.display(), e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

// Builds the configuration from a config file and/or command line flags
fn parse_args(args: &[String]) -> Result<Config, String> {
    let mut config_path: Option<PathBuf> = None;
    let mut positional: Vec<PathBuf> = Vec::new();
    let mut overrides: Vec<(&str, Option<&str>)> = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().ok_or("--config needs a file")?;
                config_path = Some(PathBuf::from(path));
            }
            "--tolerance" | "--precision" | "--degenerate" => {
                let value = iter.next().ok_or_else(|| format!("{} needs a value", arg))?;
                overrides.push((arg.as_str(), Some(value.as_str())));
            }
            "--expand-ccw" | "--to-mm" | "--drop-dwell" => overrides.push((arg.as_str(), None)),
            flag if flag.starts_with("--") => return Err(format!("Unknown option {}", flag)),
            path => positional.push(PathBuf::from(path)),
        }
    }

    let mut config = match &config_path {
        Some(path) => read_config(path).map_err(|e| format!("{}: {}", path.display(), e))?,
        None => Config::default(),
    };

    let mut positional = positional.into_iter();
    if let Some(input) = positional.next() {
        config.input = input;
    }
    if let Some(output) = positional.next() {
        config.output = Some(output);
    }
    if positional.next().is_some() {
        return Err("Too many paths given".to_string());
    }
    if config.input.as_os_str().is_empty() {
        return Err("No input file given".to_string());
    }

    for (flag, value) in overrides {
        let value = value.unwrap_or_default();
        match flag {
            "--tolerance" => {
                config.tolerance = value.parse().map_err(|_| format!("Invalid tolerance {}", value))?;
            }
            "--precision" => {
                config.precision = value.parse().map_err(|_| format!("Invalid precision {}", value))?;
            }
            "--degenerate" => {
                config.degenerate_arc = match value {
                    "fail" => DegenerateArcPolicy::Fail,
                    "point" => DegenerateArcPolicy::Point,
                    other => return Err(format!("Unknown degenerate arc policy {}", other)),
                };
            }
            "--expand-ccw" => config.counter_clockwise = CounterClockwisePolicy::Expand,
            "--to-mm" => config.to_millimeters = true,
            "--drop-dwell" => config.drop_dwell = true,
            _ => (),
        }
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

// Set log file but remove it if it already exists
fn setup_logging(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut log_file_path = input.as_os_str().to_owned();
    log_file_path.push(".log");
    let log_file_path = PathBuf::from(log_file_path);

    if log_file_path.exists() {
        fs::remove_file(&log_file_path)?;
    }

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        .chain(fern::log_file(log_file_path)?)
        .apply()?;

    Ok(())
}
