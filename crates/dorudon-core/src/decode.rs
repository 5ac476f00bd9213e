//! Text decoding capability
//!
//! Reads a file and decodes it with a WHATWG encoding label, the same way a
//! browser `FileReader` would. Failures carry DOM-style names.

use std::io::ErrorKind;
use std::path::Path;

use encoding_rs::Encoding;

use crate::error::{DictError, Result};

/// Encoding the historical dictionary format is always requested in.
///
/// Under WHATWG label rules this resolves to windows-1252.
pub const DICTIONARY_ENCODING: &str = "ascii";

/// Decode raw bytes with the encoding named by `label`.
pub fn decode_bytes_as_text(bytes: &[u8], label: &str) -> Result<String> {
    let encoding = resolve_label(label)?;
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::warn!(
            encoding = used.name(),
            "Input contained malformed sequences; replaced with U+FFFD"
        );
    }
    Ok(text.into_owned())
}

/// Read `path` and decode it with the encoding named by `label`.
pub async fn decode_file_as_text(path: &Path, label: &str) -> Result<String> {
    resolve_label(label)?;
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        let name = match e.kind() {
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::PermissionDenied => "SecurityError",
            _ => "NotReadableError",
        };
        DictError::Decode {
            name: name.to_string(),
            message: format!("cannot read {}: {}", path.display(), e),
        }
    })?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Read dictionary source");
    decode_bytes_as_text(&bytes, label)
}

fn resolve_label(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| DictError::Decode {
        name: "EncodingError".to_string(),
        message: format!("unknown encoding label: {}", label),
    })
}
