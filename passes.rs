//! Line passes that run before arc breaking.
//!
//! Each pass sees the raw line and may keep it, rewrite it or drop it.

use crate::error::LineError;
use crate::gcode::Block;

const MM_PER_INCH: f64 = 25.4;

// Words rescaled on motion lines
const SCALED_FIELDS: &[char] = &['X', 'Y', 'Z', 'I', 'J', 'F'];

// Units banner that CAM tools such as pcb2gcode write into a comment
const INCH_BANNER: &str = "Units == INCHES.";
const MM_BANNER: &str = "Units == MM.";

/// Result of running one pass over a line.
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    Keep,
    Rewrite(String),
    Drop,
}

/// A textual transformation applied to every line.
pub trait LinePass {
    fn name(&self) -> &str;

    fn apply(&self, line: &str) -> Result<PassOutcome, LineError>;
}

/// Removes dwell (`G4`/`G04`) lines, which some controllers choke on.
#[derive(Debug, Default)]
pub struct DwellFilter;

impl LinePass for DwellFilter {
    fn name(&self) -> &str {
        "dwell_filter"
    }

    fn apply(&self, line: &str) -> Result<PassOutcome, LineError> {
        let block = Block::parse(line)?;
        if block.is_g(4) {
            Ok(PassOutcome::Drop)
        } else {
            Ok(PassOutcome::Keep)
        }
    }
}

/// Rewrites an inch program into millimeters.
///
/// Coordinates, center offsets and feed rates of G0..G3 lines are scaled,
/// and `G20` becomes `G21` wherever it appears. A `Units == INCHES.` banner
/// is rewritten to `Units == MM.`. Everything else on the line is left as it
/// was.
#[derive(Debug, Default)]
pub struct InchToMillimeter;

impl InchToMillimeter {
    fn is_motion(block: &Block) -> bool {
        (0..=3).any(|code| block.is_g(code))
    }
}

impl LinePass for InchToMillimeter {
    fn name(&self) -> &str {
        "inch_to_millimeter"
    }

    fn apply(&self, line: &str) -> Result<PassOutcome, LineError> {
        let block = Block::parse(line)?;
        let motion = Self::is_motion(&block);

        let mut rewritten = String::with_capacity(line.len() + 16);
        let mut cursor = 0;
        let mut changed = false;

        for word in block.words() {
            let replacement = if motion && SCALED_FIELDS.contains(&word.letter) {
                format!("{:.4}", word.value * MM_PER_INCH)
            } else if word.letter == 'G' && word.value == 20.0 {
                "21".to_string()
            } else {
                continue;
            };

            rewritten.push_str(&line[cursor..word.span.start]);
            rewritten.push_str(&replacement);
            cursor = word.span.end;
            changed = true;
        }

        rewritten.push_str(&line[cursor..]);
        if rewritten.contains(INCH_BANNER) {
            rewritten = rewritten.replace(INCH_BANNER, MM_BANNER);
            changed = true;
        }

        if !changed {
            return Ok(PassOutcome::Keep);
        }
        Ok(PassOutcome::Rewrite(rewritten))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dwell_filter() {
        let filter = DwellFilter;
        assert_eq!(filter.apply("G04 P0\n").unwrap(), PassOutcome::Drop);
        assert_eq!(filter.apply("G4 P0.5").unwrap(), PassOutcome::Drop);
        assert_eq!(filter.apply("G1 X4").unwrap(), PassOutcome::Keep);
        assert_eq!(filter.apply("(G04 in a comment)").unwrap(), PassOutcome::Keep);
    }

    #[test]
    fn test_inch_to_millimeter_motion_line() {
        let pass = InchToMillimeter;
        assert_eq!(
            pass.apply("G1 X1 F10\n").unwrap(),
            PassOutcome::Rewrite("G1 X25.4000 F254.0000\n".to_string())
        );
        assert_eq!(
            pass.apply("G02 X0.5 Y-1 I0.25 J0 ; arc").unwrap(),
            PassOutcome::Rewrite("G02 X12.7000 Y-25.4000 I6.3500 J0.0000 ; arc".to_string())
        );
    }

    #[test]
    fn test_inch_to_millimeter_units_word() {
        let pass = InchToMillimeter;
        assert_eq!(
            pass.apply("G20 G90").unwrap(),
            PassOutcome::Rewrite("G21 G90".to_string())
        );
        assert_eq!(pass.apply("M3 S10000").unwrap(), PassOutcome::Keep);
        assert_eq!(pass.apply("(X1 comment)").unwrap(), PassOutcome::Keep);
    }

    #[test]
    fn test_inch_to_millimeter_units_banner() {
        let pass = InchToMillimeter;
        assert_eq!(
            pass.apply("( Units == INCHES. )\n").unwrap(),
            PassOutcome::Rewrite("( Units == MM. )\n".to_string())
        );
        assert_eq!(
            pass.apply("G20 (Units == INCHES.)").unwrap(),
            PassOutcome::Rewrite("G21 (Units == MM.)".to_string())
        );
        assert_eq!(pass.apply("(Units == MM.)").unwrap(), PassOutcome::Keep);
    }

    #[test]
    fn test_inch_to_millimeter_reports_bad_numbers() {
        let pass = InchToMillimeter;
        assert_eq!(
            pass.apply("G1 X1..2"),
            Err(LineError::MalformedNumber { letter: 'X', text: "1..2".to_string() })
        );
    }
}
