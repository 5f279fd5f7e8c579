use std::{fs::File, io::BufReader, path::{Path, PathBuf}};
use serde::Deserialize;

use crate::arc::{ArcSegmenter, CounterClockwisePolicy, DegenerateArcPolicy, DEFAULT_PRECISION, DEFAULT_TOLERANCE};
use crate::error::{Error, Result};
use crate::passes::{DwellFilter, InchToMillimeter, LinePass};

pub const DEFAULT_HEADER: &str = "(Processed with ArcBreaker)";

// Beyond this the formatted output only carries float noise
const MAX_PRECISION: usize = 10;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub tolerance: f64,
    pub precision: usize,
    pub header: String,
    pub degenerate_arc: DegenerateArcPolicy,
    pub counter_clockwise: CounterClockwisePolicy,
    pub to_millimeters: bool,
    pub drop_dwell: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input: PathBuf::new(),
            output: None,
            tolerance: DEFAULT_TOLERANCE,
            precision: DEFAULT_PRECISION,
            header: DEFAULT_HEADER.to_string(),
            degenerate_arc: DegenerateArcPolicy::default(),
            counter_clockwise: CounterClockwisePolicy::default(),
            to_millimeters: false,
            drop_dwell: false,
        }
    }
}

impl Config {
    pub fn for_input(input: impl Into<PathBuf>) -> Self {
        Config {
            input: input.into(),
            ..Config::default()
        }
    }

    // Checks the conversion settings, not the paths
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(Error::Config(format!(
                "tolerance must be a positive number, got {}",
                self.tolerance
            )));
        }
        if self.precision > MAX_PRECISION {
            return Err(Error::Config(format!(
                "precision must be at most {} decimals, got {}",
                MAX_PRECISION, self.precision
            )));
        }
        if self.header.contains('\n') {
            return Err(Error::Config("header must be a single line".to_string()));
        }
        Ok(())
    }

    /// Output path, defaulting to `<stem>_arcbreaker.<ext>` beside the input.
    pub fn output_path(&self) -> PathBuf {
        if let Some(output) = &self.output {
            return output.clone();
        }

        let stem = self.input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match self.input.extension() {
            Some(ext) => format!("{}_arcbreaker.{}", stem, ext.to_string_lossy()),
            None => format!("{}_arcbreaker", stem),
        };
        self.input.with_file_name(name)
    }

    pub fn segmenter(&self) -> ArcSegmenter {
        ArcSegmenter::new(self.tolerance)
            .with_precision(self.precision)
            .with_degenerate_policy(self.degenerate_arc)
            .with_counter_clockwise(self.counter_clockwise)
    }

    // Passes in the order they run
    pub fn passes(&self) -> Vec<Box<dyn LinePass>> {
        let mut passes: Vec<Box<dyn LinePass>> = Vec::new();
        if self.drop_dwell {
            passes.push(Box::new(DwellFilter));
        }
        if self.to_millimeters {
            passes.push(Box::new(InchToMillimeter));
        }
        passes
    }
}

pub fn read_config(path: &Path) -> Result<Config> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut config: Config = serde_json::from_reader(reader)?;

    // Check that input is set and exists
    if config.input.as_os_str().is_empty() {
        return Err(Error::Config(format!("input not set in {}", path.display())));
    }

    // Relative paths are taken from the configuration file's directory
    if let Some(base) = path.parent() {
        if config.input.is_relative() {
            config.input = base.join(&config.input);
        }
        if let Some(output) = config.output.as_mut().filter(|o| o.is_relative()) {
            *output = base.join(&*output);
        }
    }

    if !config.input.exists() {
        return Err(Error::Config(format!("input {} does not exist", config.input.display())));
    }

    config.validate()?;
    Ok(config)
}
