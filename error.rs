//! Error types for arc breaking.
//!
//! Every error aborts the whole run: a partially converted motion program
//! is not safe to send to a machine.

use std::io;
use thiserror::Error;

/// Problems found while handling a single line.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LineError {
    /// An arc line is missing one of its required words.
    #[error("malformed arc: missing {field} word")]
    MalformedArc { field: char },

    /// A word's numeric text could not be parsed.
    #[error("malformed number for {letter} word: '{text}'")]
    MalformedNumber { letter: char, text: String },

    /// The arc has a zero radius.
    #[error("degenerate arc: center coincides with start point")]
    DegenerateArc,

    /// The arc is too large to be broken into a bounded number of moves.
    #[error("oversized arc: length {length} cannot be segmented")]
    OversizedArc { length: f64 },
}

/// Errors returned by a conversion run.
#[derive(Error, Debug)]
pub enum Error {
    /// A line of the input program could not be converted.
    #[error("line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: LineError,
    },

    /// Settings are invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O error while reading the program or writing the result.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The configuration file is not valid JSON.
    #[error("Configuration parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Attach a 1-based line number to a line error.
    pub fn at_line(line: usize, source: LineError) -> Self {
        Error::Line { line, source }
    }
}

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, Error>;
