//! Streaming conversion of a whole program.
//!
//! Lines are folded left to right with the tool position as accumulator.
//! Output goes to a temporary file that only replaces the destination once
//! every line converted.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use indicatif::ProgressBar;
use log::{debug, info, warn};
use num_format::{Locale, ToFormattedString};
use tempfile::NamedTempFile;

use crate::arc::ArcSegmenter;
use crate::config::Config;
use crate::error::{Error, LineError, Result};
use crate::gcode::{Block, PositionTracker, ToolPosition, UnitsMode};
use crate::passes::{LinePass, PassOutcome};

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionStats {
    pub lines_read: usize,
    pub lines_dropped: usize,
    pub arcs_expanded: usize,
    pub arcs_passed_through: usize,
    pub segments_emitted: usize,
    pub arc_length: f64,
    pub units_mode: UnitsMode,
}

impl Default for ConversionStats {
    fn default() -> Self {
        ConversionStats {
            lines_read: 0,
            lines_dropped: 0,
            arcs_expanded: 0,
            arcs_passed_through: 0,
            segments_emitted: 0,
            arc_length: 0.0,
            units_mode: UnitsMode::NotSet,
        }
    }
}

impl ConversionStats {
    pub fn display(&self) {
        println!("Lines read: {}", self.lines_read.to_formatted_string(&Locale::en));
        println!("Lines dropped: {}", self.lines_dropped.to_formatted_string(&Locale::en));
        println!("Arcs expanded: {}", self.arcs_expanded.to_formatted_string(&Locale::en));
        println!("Arcs passed through: {}", self.arcs_passed_through.to_formatted_string(&Locale::en));
        println!("Segments emitted: {}", self.segments_emitted.to_formatted_string(&Locale::en));
        println!("Arc length: {:.3} {}", self.arc_length, self.units_mode.text());
    }

    pub fn log(&self, info: &str) {
        info!("{}, lines read: {}", info, self.lines_read.to_formatted_string(&Locale::en));
        info!("{}, arcs expanded: {}", info, self.arcs_expanded.to_formatted_string(&Locale::en));
        info!("{}, segments emitted: {}", info, self.segments_emitted.to_formatted_string(&Locale::en));
        info!("{}, arc length: {:.3} {}", info, self.arc_length, self.units_mode.text());
    }
}

/// Line-by-line converter carrying the tool position between lines.
pub struct ArcBreaker {
    segmenter: ArcSegmenter,
    passes: Vec<Box<dyn LinePass>>,
    tracker: PositionTracker,
    header: String,
    line_number: usize,
    stats: ConversionStats,
}

impl ArcBreaker {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(ArcBreaker {
            segmenter: config.segmenter(),
            passes: config.passes(),
            tracker: PositionTracker::new(),
            header: config.header.clone(),
            line_number: 0,
            stats: ConversionStats::default(),
        })
    }

    pub fn position(&self) -> ToolPosition {
        self.tracker.current()
    }

    pub fn stats(&self) -> &ConversionStats {
        &self.stats
    }

    pub fn write_header<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if self.header.is_empty() {
            return Ok(());
        }
        writeln!(out, "{}", self.header)
    }

    /// Converts one raw line, line ending included, into `out`.
    pub fn process_line<W: Write>(&mut self, raw: &str, out: &mut W) -> Result<()> {
        self.line_number += 1;
        self.stats.lines_read += 1;
        let line_number = self.line_number;
        let at = |source: LineError| Error::at_line(line_number, source);

        let mut line = Cow::Borrowed(raw);
        for pass in &self.passes {
            match pass.apply(&line).map_err(at)? {
                PassOutcome::Keep => (),
                PassOutcome::Rewrite(rewritten) => line = Cow::Owned(rewritten),
                PassOutcome::Drop => {
                    debug!("Line {} dropped by {}", line_number, pass.name());
                    self.stats.lines_dropped += 1;
                    return Ok(());
                },
            }
        }

        let block = Block::parse(&line).map_err(at)?;

        match self.segmenter.parse(&block, self.tracker.current()).map_err(at)? {
            Some(arc) => {
                let drift = arc.radius_drift();
                if drift > self.segmenter.tolerance() {
                    warn!("Arc at line {} ends {:.4} off its circle", line_number, drift);
                }

                let segments = self.segmenter.expand(&arc).map_err(at)?;
                let count = segments.segment_count();
                let written = self.segmenter.write_segments(segments, out)?;
                debug!("Arc at line {} broken into {} segments", line_number, count);

                self.stats.arcs_expanded += 1;
                self.stats.segments_emitted += written;
                self.stats.arc_length += arc.arc_length();
            },
            None => {
                if block.is_g(3) {
                    warn!("Counter-clockwise arc at line {} passed through unchanged", line_number);
                    self.stats.arcs_passed_through += 1;
                }
                out.write_all(line.as_bytes())?;
            },
        }

        // Literal endpoint of the line, never a computed segment
        self.tracker.advance(&block);
        Ok(())
    }

    pub fn run<R: BufRead, W: Write>(self, reader: R, writer: W) -> Result<ConversionStats> {
        self.run_with_progress(reader, writer, &ProgressBar::hidden())
    }

    /// Converts every line of `reader`, advancing `progress` by bytes read.
    pub fn run_with_progress<R: BufRead, W: Write>(
        mut self,
        mut reader: R,
        mut writer: W,
        progress: &ProgressBar,
    ) -> Result<ConversionStats> {
        self.write_header(&mut writer)?;

        let mut raw = String::new();
        loop {
            raw.clear();
            let read = reader.read_line(&mut raw)?;
            if read == 0 {
                break;
            }
            self.process_line(&raw, &mut writer)?;
            progress.inc(read as u64);
        }
        writer.flush()?;

        self.stats.units_mode = self.tracker.units_mode();
        Ok(self.stats)
    }
}

/// Converts program text held in memory.
pub fn convert_str(config: &Config, input: &str) -> Result<String> {
    let mut output = Vec::new();
    ArcBreaker::new(config)?.run(input.as_bytes(), &mut output)?;
    String::from_utf8(output)
        .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// Converts `config.input` into `config.output_path()`.
///
/// Nothing is written to the destination unless the whole program converted.
pub fn convert_file(config: &Config, progress: &ProgressBar) -> Result<ConversionStats> {
    let breaker = ArcBreaker::new(config)?;
    let output_path = config.output_path();
    if output_path == config.input {
        return Err(Error::Config(format!(
            "output {} would overwrite the input",
            output_path.display()
        )));
    }

    let input = File::open(&config.input)?;
    info!("Converting {} into {}", config.input.display(), output_path.display());

    let directory = output_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut staged = NamedTempFile::new_in(directory)?;

    let stats = breaker.run_with_progress(
        BufReader::new(input),
        BufWriter::new(staged.as_file_mut()),
        progress,
    )?;

    staged.persist(&output_path).map_err(|e| e.error)?;
    info!("Wrote {}", output_path.display());
    Ok(stats)
}
