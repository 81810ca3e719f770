use serde_json::Value as JsonValue;

use crate::error::{ChartError, Result};

/// Marker preceding the Python dict literal in an ACD1 file.
pub const DATA_MARKER: &str = "data = {";

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Extract the Python dict literal following `data = {` and rewrite it into
/// a standard JSON tree.
///
/// The rewrite is a single left-to-right pass (see [`python_to_json`]); if
/// the rewritten text still fails to parse as JSON, the error surfaces the
/// offending line of the *rewritten* text for diagnosis, and no further
/// guessing is attempted.
pub fn parse(text: &str, warnings: &mut Vec<String>) -> Result<JsonValue> {
    let start = text
        .find(DATA_MARKER)
        .ok_or_else(|| ChartError::Parse("ACD1: no `data = {` marker found".into()))?;
    let python = &text[start + DATA_MARKER.len() - 1..];
    let json_text = python_to_json(python, warnings)?;
    serde_json::from_str(&json_text).map_err(|err| {
        ChartError::Parse(format!(
            "ACD1: rewritten text is not valid JSON: {err}; offending line: {:?}",
            json_text.lines().nth(err.line().saturating_sub(1)).unwrap_or("")
        ))
    })
}

// ---------------------------------------------------------------------------
// Python-literal → JSON rewrite
// ---------------------------------------------------------------------------

/// Rewrite a Python dict literal into JSON text, left to right:
/// * `'…'` strings become `"…"`, embedded `"` escaped;
/// * `True` / `False` / `None` become `true` / `false` / `null`;
/// * a bare decimal dict key (preceded by `{`/`,`, followed by `:`) is quoted;
/// * the two-element list `[nan, nan]` collapses to `[]`;
/// * a trailing comma before `}` / `]` is blanked.
///
/// A lone backslash not starting a recognised escape survives as a literal
/// backslash in the decoded string, with a warning (legacy data defect, not
/// fatal).
pub fn python_to_json(src: &str, warnings: &mut Vec<String>) -> Result<String> {
    let bytes = src.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => i = copy_string(bytes, i + 1, b'\'', &mut out, warnings),
            b'"' => i = copy_string(bytes, i + 1, b'"', &mut out, warnings),
            b'[' => {
                // Collapse the legacy `[nan, nan]` placeholder.
                if let Some(end) = match_nan_pair(bytes, i) {
                    out.extend_from_slice(b"[]");
                    i = end;
                } else {
                    out.push(b'[');
                    i += 1;
                }
            }
            b',' => {
                // JSON forbids trailing commas; blank them.
                let mut j = i + 1;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if matches!(bytes.get(j), Some(b'}') | Some(b']')) {
                    out.push(b' ');
                } else {
                    out.push(b',');
                }
                i += 1;
            }
            c if c.is_ascii_alphabetic() => {
                let word = read_while(bytes, i, |b| b.is_ascii_alphanumeric() || b == b'_');
                match &src[i..word] {
                    "True" => out.extend_from_slice(b"true"),
                    "False" => out.extend_from_slice(b"false"),
                    "None" => out.extend_from_slice(b"null"),
                    other => out.extend_from_slice(other.as_bytes()),
                }
                i = word;
            }
            c if c.is_ascii_digit() && dict_key_position(&out) => {
                let end = read_while(bytes, i, |b| b.is_ascii_digit() || b == b'.');
                let mut j = end;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if bytes.get(j) == Some(&b':') {
                    // numeric-looking dict key – JSON keys must be strings
                    out.push(b'"');
                    out.extend_from_slice(&bytes[i..end]);
                    out.push(b'"');
                } else {
                    out.extend_from_slice(&bytes[i..end]);
                }
                i = end;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    String::from_utf8(out)
        .map_err(|err| ChartError::Parse(format!("ACD1 rewrite produced invalid UTF-8: {err}")))
}

/// Copy a quoted string body starting at `start` (after the opening quote),
/// emitting a JSON double-quoted string. Returns the index after the closing
/// quote.
fn copy_string(
    bytes: &[u8],
    start: usize,
    quote: u8,
    out: &mut Vec<u8>,
    warnings: &mut Vec<String>,
) -> usize {
    out.push(b'"');
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            c if c == quote => {
                out.push(b'"');
                return i + 1;
            }
            b'"' => {
                out.extend_from_slice(b"\\\"");
                i += 1;
            }
            b'\\' => match bytes.get(i + 1) {
                Some(b'\\') => {
                    out.extend_from_slice(b"\\\\");
                    i += 2;
                }
                Some(b'\'') => {
                    // python escape for the quote itself; plain in JSON
                    out.push(b'\'');
                    i += 2;
                }
                Some(b'"') => {
                    out.extend_from_slice(b"\\\"");
                    i += 2;
                }
                Some(c @ (b'n' | b't' | b'r' | b'u' | b'/')) => {
                    out.push(b'\\');
                    out.push(*c);
                    i += 2;
                }
                _ => {
                    // legacy data defect, not fatal; keep the literal
                    // backslash in the decoded string
                    let msg = format!("ACD1: stray backslash at offset {i}");
                    log::warn!("{msg}");
                    warnings.push(msg);
                    out.extend_from_slice(b"\\\\");
                    i += 1;
                }
            },
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    // unterminated string: the JSON parse will report it with context
    i
}

/// If `bytes[open..]` is exactly `[nan, nan]` (whitespace-flexible), return
/// the index just past the closing bracket.
fn match_nan_pair(bytes: &[u8], open: usize) -> Option<usize> {
    let mut i = open + 1;
    let mut expect = |tok: &[u8], i: &mut usize| -> bool {
        while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
            *i += 1;
        }
        if bytes[*i..].starts_with(tok) {
            *i += tok.len();
            true
        } else {
            false
        }
    };
    if expect(b"nan", &mut i)
        && expect(b",", &mut i)
        && expect(b"nan", &mut i)
        && expect(b"]", &mut i)
    {
        Some(i)
    } else {
        None
    }
}

fn read_while(bytes: &[u8], mut i: usize, pred: impl Fn(u8) -> bool) -> usize {
    while i < bytes.len() && pred(bytes[i]) {
        i += 1;
    }
    i
}

/// True when the last significant output byte opens a dict entry, i.e. a
/// following bare decimal token may be a dict key.
fn dict_key_position(out: &[u8]) -> bool {
    matches!(
        out.iter().rev().find(|b| !b.is_ascii_whitespace()),
        Some(b'{') | Some(b',')
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rewrite(src: &str) -> String {
        python_to_json(src, &mut Vec::new()).unwrap()
    }

    #[test]
    fn quotes_booleans_and_none() {
        assert_eq!(
            rewrite("{'version': 4, 'foo': True, 'n': None}"),
            r#"{"version": 4, "foo": true, "n": null}"#
        );
    }

    #[test]
    fn parses_from_marker() {
        let tree = parse("data = {'version': 4, 'foo': True, 'n': None}", &mut Vec::new()).unwrap();
        assert_eq!(tree["version"], serde_json::json!(4));
        assert_eq!(tree["foo"], serde_json::json!(true));
        assert_eq!(tree["n"], serde_json::Value::Null);
    }

    #[test]
    fn embedded_double_quote_is_escaped() {
        assert_eq!(rewrite(r#"{'a': 'x "y" z'}"#), r#"{"a": "x \"y\" z"}"#);
    }

    #[test]
    fn numeric_dict_keys_are_quoted() {
        assert_eq!(
            rewrite("{0: 'a', 12: 'b', 'v': [1, 2]}"),
            r#"{"0": "a", "12": "b", "v": [1, 2]}"#
        );
    }

    #[test]
    fn numeric_values_stay_bare() {
        assert_eq!(rewrite("{'v': 4, 'w': 2.5}"), r#"{"v": 4, "w": 2.5}"#);
    }

    #[test]
    fn nan_pair_collapses() {
        assert_eq!(rewrite("{'c': [nan, nan]}"), r#"{"c": []}"#);
        assert_eq!(rewrite("{'c': [[nan, nan], [1, 2]]}"), r#"{"c": [[], [1, 2]]}"#);
    }

    #[test]
    fn trailing_commas_are_blanked() {
        // each blanked comma leaves one space behind
        assert_eq!(rewrite("{'a': [1, 2,], }"), r#"{"a": [1, 2 ]  }"#);
    }

    #[test]
    fn stray_backslash_warns_but_passes() {
        let mut warnings = Vec::new();
        let _ = python_to_json(r"{'a': 'x \ y'}", &mut warnings).unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn rewritten_text_surfaces_in_error() {
        let err = parse("data = {'a': wat}", &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("wat"), "{err}");
    }
}
