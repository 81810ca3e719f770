/// Format detection and the per-format chart backends.
///
/// ```text
///   bytes (already decompressed)
///        │
///        ▼
///   detect_format ── Ace | Acd1 | Lispmds | Unknown
///        │
///        ▼
///   ┌─────────────────────────────┐
///   │ JsonBackend (ACE_KEYS)       │
///   │ JsonBackend (ACD1_KEYS)      │──► Chart::from_backend
///   │ LispmdsBackend               │
///   └─────────────────────────────┘
/// ```
pub mod json;
pub mod keys;
pub mod lispmds;

use serde_json::Value as JsonValue;

use crate::error::{ChartError, Result};
use crate::model::titers::Titers;
use crate::model::{Antigen, Chart, ColumnBases, Info, Projection, Serum};

pub use json::JsonBackend;
pub use lispmds::LispmdsBackend;

// ---------------------------------------------------------------------------
// ChartBackend – the adapter contract
// ---------------------------------------------------------------------------

/// One legacy format's binding of its value tree onto the canonical model.
/// Backends are pure read-only projections; [`Chart::from_backend`]
/// materializes and validates the pieces in one step.
pub trait ChartBackend {
    fn info(&self) -> Result<Info>;
    fn antigens(&self) -> Result<Vec<Antigen>>;
    fn sera(&self) -> Result<Vec<Serum>>;
    fn titers(&self) -> Result<Titers>;
    fn forced_column_bases(&self) -> Result<Option<ColumnBases>>;
    fn projections(&self) -> Result<Vec<Projection>>;
    fn plot_spec(&self) -> Result<Option<JsonValue>>;
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ace,
    Acd1,
    Lispmds,
    Unknown,
}

/// Cheap, order-independent format sniffing.
///
/// LISPMDS is recognized by its `(MAKE-MASTER-MDS-WINDOW` prefix rather than
/// by the ACD1 `data = {` substring some older tooling reused, so the three
/// tests are mutually exclusive and callers need no try-order.
pub fn detect_format(text: &str) -> Format {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') && text.contains("acmacs-ace-v1") {
        Format::Ace
    } else if skip_lisp_comments(text).starts_with(&format!("({}", crate::tree::lispmds::WINDOW_FORM)) {
        Format::Lispmds
    } else if text.len() >= 100 && text.contains(crate::tree::acd1::DATA_MARKER) {
        Format::Acd1
    } else {
        Format::Unknown
    }
}

/// LISPMDS saves may open with `;` comment lines before the window form.
fn skip_lisp_comments(text: &str) -> &str {
    let mut rest = text.trim_start();
    while let Some(comment) = rest.strip_prefix(';') {
        rest = match comment.find('\n') {
            Some(pos) => comment[pos + 1..].trim_start(),
            None => "",
        };
    }
    rest
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse legacy chart text in the given format into the canonical model.
/// Fails with a structured error; never returns a partial chart.
pub fn parse(text: &str, format: Format) -> Result<Chart> {
    match format {
        Format::Ace => {
            log::debug!("parsing ACE chart ({} bytes)", text.len());
            let (backend, warnings) = JsonBackend::ace(text)?;
            Chart::from_backend(&backend, warnings)
        }
        Format::Acd1 => {
            log::debug!("parsing ACD1 chart ({} bytes)", text.len());
            let (backend, warnings) = JsonBackend::acd1(text)?;
            Chart::from_backend(&backend, warnings)
        }
        Format::Lispmds => {
            log::debug!("parsing LISPMDS chart ({} bytes)", text.len());
            let backend = LispmdsBackend::new(text)?;
            Chart::from_backend(&backend, Vec::new())
        }
        Format::Unknown => Err(ChartError::Parse(format!(
            "unrecognized chart format; leading bytes: {:?}",
            text.chars().take(40).collect::<String>()
        ))),
    }
}

/// Detect the format, then parse.
pub fn parse_auto(text: &str) -> Result<Chart> {
    parse(text, detect_format(text))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_ace_by_marker() {
        let text = r#"{"  version": "acmacs-ace-v1", "c": {}}"#;
        assert_eq!(detect_format(text), Format::Ace);
    }

    #[test]
    fn detects_lispmds_by_window_prefix() {
        assert_eq!(
            detect_format("(MAKE-MASTER-MDS-WINDOW :HI-IN NIL)"),
            Format::Lispmds
        );
    }

    #[test]
    fn detects_acd1_by_marker_and_size() {
        let text = format!("# comment\ndata = {{'chart': {{}}}}{}", " ".repeat(100));
        assert_eq!(detect_format(&text), Format::Acd1);
        // too short to be a real table
        assert_eq!(detect_format("data = {}"), Format::Unknown);
    }

    #[test]
    fn unknown_bytes_fail_with_a_snippet() {
        assert_eq!(detect_format("hello"), Format::Unknown);
        let err = parse_auto("hello").unwrap_err();
        assert!(err.to_string().contains("hello"), "{err}");
    }
}
