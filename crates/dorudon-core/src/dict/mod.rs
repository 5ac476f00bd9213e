//! Dictionary module - entry types and the source text grammar
//!
//! - Input methods: fixed enumeration with stable persisted ids
//! - Entries: `(code, im)`-keyed records with an opaque value
//! - Parser: strict line grammar for the dictionary source file

mod entry;
mod parser;

pub use entry::{DictionaryEntry, InputMethod};
pub use parser::{format_line, parse_line, parse_text};
