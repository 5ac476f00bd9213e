//! Test Data Factory
//!
//! Provides dictionary source text for tests:
//! - A small realistic excerpt in the Unihan dictionary-like format
//! - Synthetic sources of arbitrary size for progress and stress tests
//! - Broken sources for parse and constraint failures

use dorudon_core::InputMethod;

/// Excerpt shaped like `Unihan_DictionaryLikeData.txt`
pub const UNIHAN_EXCERPT: &str = "\
# Unihan_DictionaryLikeData.txt
# Date: 2012-08-17 17:13:30 GMT [JHJ]
#
# Unicode Character Database
# For documentation, see http://www.unicode.org/reports/tr38/

U+3400\tkCangjie\tXX
U+3400\tkTotalStrokes\t5
U+4E00\tkCangjie\tM
U+4E00\tkCihaiT\t1.101
U+4E00\tkFenn\t1A
U+4E00\tkFourCornerCode\t1000.0
U+4E00\tkFrequency\t1
U+4E00\tkGradeLevel\t1
U+4E00\tkHDZRadBreak\t\u{4E00}[U+2F00]:10001.010
U+4E00\tkPhonetic\t1561
U+4E00\tkTotalStrokes\t1
U+4E01\tkCangjie\tMN
U+4E01\tkTotalStrokes\t2
U+4E03\tkCheungBauer\t001/01;;
U+4E03\tkHKGlyph\t0002
";

/// Factory for creating test data
///
/// # Example
///
/// ```rust,ignore
/// let text = TestDataFactory::synthetic_source(1_000);
/// db.populate(&text).await;
/// ```
pub struct TestDataFactory;

impl TestDataFactory {
    /// Entries in [`UNIHAN_EXCERPT`]
    pub const EXCERPT_ENTRIES: usize = 15;

    /// `count` unique entries cycling through every input method
    pub fn synthetic_source(count: u32) -> String {
        let mut text = String::from("# synthetic dictionary\n");
        for i in 0..count {
            let im = InputMethod::ALL[(i % 11) as usize];
            text.push_str(&format!("U+{:X}\t{}\tv{}\n", 0x4E00 + i / 11, im.name(), i));
        }
        text
    }

    /// Only blank and comment lines
    pub fn comments_only() -> String {
        "# header\n\n#\tU+4E00\tkCangjie\tM\n\n".to_string()
    }

    /// Well-formed lines with one line missing its `U+` prefix at `bad_line` (1-based)
    pub fn source_with_bad_line(total: u32, bad_line: u32) -> String {
        let mut text = String::new();
        for i in 1..=total {
            if i == bad_line {
                text.push_str(&format!("{:X}\tkCangjie\tBAD\n", 0x4E00 + i));
            } else {
                text.push_str(&format!("U+{:X}\tkCangjie\tA\n", 0x4E00 + i));
            }
        }
        text
    }

    /// Well-formed lines where the last one repeats the first `(code, im)` pair
    pub fn source_with_duplicate(total: u32) -> String {
        let mut text = String::new();
        for i in 0..total {
            text.push_str(&format!("U+{:X}\tkTotalStrokes\t{}\n", 0x4E00 + i, i));
        }
        text.push_str("U+4E00\tkTotalStrokes\t99\n");
        text
    }
}
