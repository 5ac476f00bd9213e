//! Dictionary text grammar
//!
//! One entry per line:
//!
//! ```text
//! U+4E00<TAB>kCangjie<TAB>M
//! ```
//!
//! Empty lines and lines starting with `#` are skipped. Any other line that
//! does not match aborts the whole parse; there is no best-effort mode.

use std::sync::OnceLock;

use regex::Regex;

use super::entry::{DictionaryEntry, InputMethod};
use crate::error::{DictError, Result};

static LINE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn line_pattern() -> &'static Regex {
    LINE_PATTERN.get_or_init(|| {
        // Static pattern, covered by the tests below
        Regex::new(r"^U\+([0-9A-Fa-f]+)\t([A-Za-z0-9_]+)\t(.*)$").expect("valid line pattern")
    })
}

/// Parse a whole dictionary text into entries, in source order.
pub fn parse_text(text: &str) -> Result<Vec<DictionaryEntry>> {
    let mut entries = Vec::new();
    for (idx, line) in text.split('\n').enumerate() {
        if let Some(entry) = parse_line(line, idx + 1)? {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Parse one line. `line_no` is 1-based and only used for error reporting.
///
/// Returns `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str, line_no: usize) -> Result<Option<DictionaryEntry>> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let caps = line_pattern()
        .captures(line)
        .ok_or_else(|| DictError::syntax(line_no, format!("malformed line: {:?}", truncate(line, 40))))?;

    let code = u32::from_str_radix(&caps[1], 16)
        .map_err(|_| DictError::syntax(line_no, format!("code point out of range: U+{}", &caps[1])))?;
    let im: InputMethod = caps[2].parse().map_err(|e: String| DictError::syntax(line_no, e))?;

    Ok(Some(DictionaryEntry {
        code,
        im,
        value: serde_json::Value::String(caps[3].to_string()),
    }))
}

/// Render an entry back into a source line (without the newline).
///
/// String payloads are written verbatim; any other payload as JSON.
pub fn format_line(entry: &DictionaryEntry) -> String {
    let value = match &entry.value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    format!("U+{:04X}\t{}\t{}", entry.code, entry.im.name(), value)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}
