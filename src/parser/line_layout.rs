//! Positional parser for the model's usual reply layout:
//!
//! ```text
//! This is a <Name>, also known as **<Common name>**
//! **<Scientific name>**
//! <description line>
//! ...
//! Country: <country>
//! Medicinal qualities: <qualities>
//! ```
//!
//! Fields are taken by line position. A reply in any other shape still
//! parses, but into partial or misplaced fields; `check_layout` reports
//! when that is likely.

use super::{LayoutError, PlantRecord, ResponseParser};
use regex::Regex;
use std::sync::OnceLock;

const NAME_LEAD: &str = "This is a ";
const COMMON_NAME_MARKER: &str = "also known as";
const COUNTRY_PREFIX: &str = "Country: ";
const MEDICINAL_PREFIX: &str = "Medicinal qualities: ";
const EMPHASIS: &str = "**";

/// Smallest reply that has a line for every field.
const MIN_LINES: usize = 4;

fn emphasis_run() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\*\*(.*?)\*\*").expect("emphasis pattern is valid"))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LineLayoutParser;

impl LineLayoutParser {
    pub fn new() -> Self {
        Self
    }
}

impl ResponseParser for LineLayoutParser {
    fn parse(&self, text: &str) -> PlantRecord {
        let lines: Vec<&str> = text.split('\n').collect();
        let len = lines.len();
        let first = lines[0];

        let name = first
            .replacen(NAME_LEAD, "", 1)
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();

        let common_name = first
            .split(COMMON_NAME_MARKER)
            .nth(1)
            .map(strip_enclosing_emphasis)
            .unwrap_or_default();

        let scientific_name = lines
            .get(1)
            .and_then(|line| emphasis_run().captures(line))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        let description = if len > MIN_LINES - 1 {
            lines[2..len - 2].join(" ").replace(EMPHASIS, "")
        } else {
            String::new()
        };

        let country = if len >= 2 {
            lines[len - 2].replacen(COUNTRY_PREFIX, "", 1).trim().to_string()
        } else {
            String::new()
        };

        let medicinal_qualities = lines[len - 1]
            .replacen(MEDICINAL_PREFIX, "", 1)
            .trim()
            .to_string();

        PlantRecord {
            name,
            common_name: non_empty(common_name),
            scientific_name: non_empty(scientific_name),
            description,
            country: non_empty(country),
            medicinal_qualities: non_empty(medicinal_qualities),
        }
    }

    /// Check whether `text` has the layout the positional rules assume.
    fn check_layout(&self, text: &str) -> Result<(), LayoutError> {
        let lines: Vec<&str> = text.split('\n').collect();
        if lines.len() < MIN_LINES {
            return Err(LayoutError::TooFewLines {
                found: lines.len(),
                expected: MIN_LINES,
            });
        }
        if !lines[lines.len() - 2].contains(COUNTRY_PREFIX) {
            return Err(LayoutError::MissingPrefix {
                line: lines.len() - 2,
                prefix: COUNTRY_PREFIX.trim_end(),
            });
        }
        if !lines[lines.len() - 1].contains(MEDICINAL_PREFIX) {
            return Err(LayoutError::MissingPrefix {
                line: lines.len() - 1,
                prefix: MEDICINAL_PREFIX.trim_end(),
            });
        }
        Ok(())
    }
}

/// `  **Garden Rose**  ` → `Garden Rose`. Inner markers are left alone.
fn strip_enclosing_emphasis(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = trimmed.strip_prefix(EMPHASIS).unwrap_or(trimmed);
    let inner = inner.strip_suffix(EMPHASIS).unwrap_or(inner);
    inner.trim().to_string()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> PlantRecord {
        LineLayoutParser.parse(text)
    }

    #[test]
    fn name_without_comma_takes_whole_line() {
        let record = parse("This is a Monstera deliciosa\n**Monstera**\nd\nCountry: Mexico\nMedicinal qualities: None");
        assert_eq!(record.name, "Monstera deliciosa");
        assert_eq!(record.common_name, None);
    }

    #[test]
    fn only_first_lead_phrase_is_removed() {
        let record = parse("This is a This is a test, x");
        assert_eq!(record.name, "This is a test");
    }

    #[test]
    fn common_name_stops_at_repeated_marker() {
        let record = parse("This is a Fern, also known as **Bracken**, also known as Brake");
        assert_eq!(record.common_name.as_deref(), Some("Bracken**,"));
    }

    #[test]
    fn common_name_without_emphasis() {
        let record = parse("This is a Daisy, also known as Bellis");
        assert_eq!(record.common_name.as_deref(), Some("Bellis"));
    }

    #[test]
    fn scientific_name_is_first_emphasis_run() {
        let record = parse("x\nScientific name: **Aloe vera** (**Aloe barbadensis**)");
        assert_eq!(record.scientific_name.as_deref(), Some("Aloe vera"));
    }

    #[test]
    fn scientific_name_missing_emphasis() {
        let record = parse("x\nAloe vera");
        assert_eq!(record.scientific_name, None);
    }

    #[test]
    fn description_strips_all_emphasis() {
        let record = parse("a\nb\n**Bold** start.\nplain **mid** end\nCountry: X\nMedicinal qualities: Y");
        assert_eq!(record.description, "Bold start. plain mid end");
    }

    #[test]
    fn single_line_has_no_country() {
        let record = parse("This is a Cactus");
        assert_eq!(record.name, "Cactus");
        assert_eq!(record.country, None);
        assert_eq!(record.medicinal_qualities.as_deref(), Some("This is a Cactus"));
        assert_eq!(record.description, "");
    }

    #[test]
    fn three_lines_have_empty_description() {
        let record = parse("This is a Mint,\n**Mentha**\nMedicinal qualities: Digestive aid");
        assert_eq!(record.description, "");
        assert_eq!(record.country.as_deref(), Some("**Mentha**"));
        assert_eq!(record.medicinal_qualities.as_deref(), Some("Digestive aid"));
    }

    #[test]
    fn layout_check_reports_short_reply() {
        let err = LineLayoutParser.check_layout("one\ntwo").unwrap_err();
        assert_eq!(
            err,
            LayoutError::TooFewLines {
                found: 2,
                expected: 4
            }
        );
    }

    #[test]
    fn layout_check_reports_missing_country() {
        let err = LineLayoutParser
            .check_layout("a\nb\nc\nFound in: Peru\nMedicinal qualities: none")
            .unwrap_err();
        assert_eq!(
            err,
            LayoutError::MissingPrefix {
                line: 3,
                prefix: "Country:"
            }
        );
    }

    #[test]
    fn trailing_newline_shifts_fields() {
        // The final empty line becomes "medicinal qualities"; known limitation.
        let text = "This is a Rose,\n**Rosa**\nd\nCountry: France\nMedicinal qualities: None\n";
        let record = parse(text);
        assert_eq!(record.medicinal_qualities, None);
        assert_eq!(record.country.as_deref(), Some("Medicinal qualities: None"));
        assert!(LineLayoutParser.check_layout(text).is_err());
    }
}
