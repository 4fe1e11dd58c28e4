//! Response parsing: free text in, `PlantRecord` out.
//!
//! Callers depend only on `ResponseParser`, so the positional parser can be
//! replaced by one that reads structured output without touching them.

mod line_layout;

pub use line_layout::LineLayoutParser;

use serde::Serialize;

/// Structured plant info derived from one identification reply.
///
/// `name` and `description` are always present (possibly empty); the rest
/// are `None` when the reply did not provide them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantRecord {
    pub name: String,
    pub common_name: Option<String>,
    pub scientific_name: Option<String>,
    pub description: String,
    pub country: Option<String>,
    pub medicinal_qualities: Option<String>,
}

pub trait ResponseParser: Send + Sync {
    /// Never fails: text in an unexpected shape yields a partial record.
    fn parse(&self, text: &str) -> PlantRecord;

    /// Whether `text` looks like the layout `parse` expects. Parsers that
    /// read structured output can keep the default.
    fn check_layout(&self, _text: &str) -> Result<(), LayoutError> {
        Ok(())
    }
}

/// Why a reply does not match the expected layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("reply has {found} lines, expected at least {expected}")]
    TooFewLines { found: usize, expected: usize },

    #[error("line {line} does not carry the `{prefix}` prefix")]
    MissingPrefix { line: usize, prefix: &'static str },
}

/// Parse with the default positional parser.
pub fn parse(text: &str) -> PlantRecord {
    LineLayoutParser::new().parse(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_parsers_default_to_accepting_layout() {
        struct Fixed;
        impl ResponseParser for Fixed {
            fn parse(&self, _text: &str) -> PlantRecord {
                PlantRecord::default()
            }
        }
        assert!(Fixed.check_layout("anything").is_ok());
    }
}
