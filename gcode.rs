use std::ops::Range;
use log::{debug, warn};
use crate::error::LineError;

// Words whose numbers must parse; other letters with odd text are ignored
const NUMERIC_FIELDS: &[char] = &['G', 'X', 'Y', 'Z', 'I', 'J', 'F'];

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum CoordinatesMode {
    Absolute,
    Relative,
    NotSet
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum UnitsMode {
    Millimeters,
    Inches,
    NotSet
}

impl UnitsMode {
    pub fn text(&self) -> &'static str {
        match self {
            UnitsMode::Millimeters => "mm",
            UnitsMode::Inches => "in",
            UnitsMode::NotSet => "units",
        }
    }
}

/// One letter/number pair of a G-code line.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub letter: char,
    pub value: f64,
    /// Byte range of the numeric text inside the source line.
    pub span: Range<usize>,
}

/// Tokenized view of a single line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    words: Vec<Word>,
}

impl Block {
    /// Scans a line once and collects its words.
    ///
    /// Words may be separated by whitespace or packed (`G1X1Y2`). A `;` ends
    /// the line and `( ... )` comments are skipped. A word is an upper-case
    /// letter that does not continue another letter run and is followed by
    /// number text; everything else is free text (`M117 Fixing next`).
    ///
    /// Bad number text for a field this tool reads fails lines that lead
    /// with a G command; on other lines it is left alone as free text.
    pub fn parse(line: &str) -> Result<Block, LineError> {
        let bytes = line.as_bytes();
        let mut words = Vec::new();
        let mut malformed = None;
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b';' => break,
                b'(' => match line[i..].find(')') {
                    Some(close) => i += close + 1,
                    None => break,
                },
                c if c.is_ascii_uppercase() && (i == 0 || !bytes[i - 1].is_ascii_alphabetic()) => {
                    let letter = c as char;
                    let start = i + 1;
                    let mut end = start;
                    while end < bytes.len() && matches!(bytes[end], b'0'..=b'9' | b'.' | b'+' | b'-') {
                        end += 1;
                    }
                    if end == start {
                        i += 1;
                        continue;
                    }

                    let text = &line[start..end];
                    match text.parse::<f64>() {
                        Ok(value) if value.is_finite() => {
                            words.push(Word { letter, value, span: start..end });
                        },
                        _ if NUMERIC_FIELDS.contains(&letter) => {
                            malformed.get_or_insert(LineError::MalformedNumber {
                                letter,
                                text: text.to_string(),
                            });
                        },
                        _ => (),
                    }
                    i = end;
                },
                _ => i += 1,
            }
        }

        let block = Block { words };
        match malformed {
            Some(err) if block.command().is_some() => Err(err),
            _ => Ok(block),
        }
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    // First occurrence wins
    pub fn get(&self, letter: char) -> Option<f64> {
        self.words.iter().find(|w| w.letter == letter).map(|w| w.value)
    }

    /// Value of a word that an arc cannot do without.
    pub fn require(&self, letter: char) -> Result<f64, LineError> {
        self.get(letter)
            .ok_or(LineError::MalformedArc { field: letter })
    }

    /// The leading G word, skipping an optional `N` line number.
    pub fn command(&self) -> Option<&Word> {
        self.words
            .iter()
            .find(|w| w.letter != 'N')
            .filter(|w| w.letter == 'G')
    }

    /// True when the leading command is `G<code>` (`G2`, `G02`, ...).
    pub fn is_g(&self, code: u32) -> bool {
        self.command().is_some_and(|w| w.value == code as f64)
    }

    pub fn has_g(&self, code: u32) -> bool {
        self.words.iter().any(|w| w.letter == 'G' && w.value == code as f64)
    }
}

/// Commanded machine position before the current line.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ToolPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl ToolPosition {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Holds the tool position across lines, plus the modal state we report on.
#[derive(Debug)]
pub struct PositionTracker {
    position: ToolPosition,
    units_mode: UnitsMode,
    position_mode: CoordinatesMode,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::starting_at(ToolPosition::default())
    }

    pub fn starting_at(position: ToolPosition) -> Self {
        PositionTracker {
            position,
            units_mode: UnitsMode::NotSet,
            position_mode: CoordinatesMode::NotSet,
        }
    }

    /// Position as known before the present line is applied.
    pub fn current(&self) -> ToolPosition {
        self.position
    }

    pub fn units_mode(&self) -> UnitsMode {
        self.units_mode
    }

    pub fn position_mode(&self) -> CoordinatesMode {
        self.position_mode
    }

    /// Applies a processed line: every X/Y/Z word overwrites its axis.
    ///
    /// Must be called once per line, after all output for it was written.
    pub fn advance(&mut self, block: &Block) {
        if let Some(x) = block.get('X') {
            self.position.x = x;
        }
        if let Some(y) = block.get('Y') {
            self.position.y = y;
        }
        if let Some(z) = block.get('Z') {
            self.position.z = z;
        }

        if block.has_g(20) {
            self.set_units(UnitsMode::Inches);
        }
        if block.has_g(21) {
            self.set_units(UnitsMode::Millimeters);
        }
        if block.has_g(90) {
            self.position_mode = CoordinatesMode::Absolute;
        }
        if block.has_g(91) {
            if self.position_mode != CoordinatesMode::Relative {
                warn!("Incremental positioning (G91) selected, coordinates are still tracked as absolute values");
            }
            self.position_mode = CoordinatesMode::Relative;
        }
    }

    fn set_units(&mut self, mode: UnitsMode) {
        if self.units_mode != UnitsMode::NotSet && self.units_mode != mode {
            warn!("Units mode changed from {} to {}", self.units_mode.text(), mode.text());
        } else {
            debug!("Units mode set to {}", mode.text());
        }
        self.units_mode = mode;
    }
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self::new()
    }
}
