//! Dictionary entry and input method types

use serde::{Deserialize, Serialize};

// ============================================================================
// INPUT METHODS
// ============================================================================

/// One of the fixed input methods a dictionary entry belongs to.
///
/// Ids are stable and persisted; never renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum InputMethod {
    #[serde(rename = "kCangjie")]
    Cangjie = 0,
    #[serde(rename = "kCheungBauer")]
    CheungBauer = 1,
    #[serde(rename = "kCihaiT")]
    CihaiT = 2,
    #[serde(rename = "kFenn")]
    Fenn = 3,
    #[serde(rename = "kFourCornerCode")]
    FourCornerCode = 4,
    #[serde(rename = "kFrequency")]
    Frequency = 5,
    #[serde(rename = "kGradeLevel")]
    GradeLevel = 6,
    #[serde(rename = "kHDZRadBreak")]
    HdzRadBreak = 7,
    #[serde(rename = "kHKGlyph")]
    HkGlyph = 8,
    #[serde(rename = "kPhonetic")]
    Phonetic = 9,
    #[serde(rename = "kTotalStrokes")]
    TotalStrokes = 10,
}

impl InputMethod {
    /// Every input method, in id order.
    pub const ALL: [InputMethod; 11] = [
        InputMethod::Cangjie,
        InputMethod::CheungBauer,
        InputMethod::CihaiT,
        InputMethod::Fenn,
        InputMethod::FourCornerCode,
        InputMethod::Frequency,
        InputMethod::GradeLevel,
        InputMethod::HdzRadBreak,
        InputMethod::HkGlyph,
        InputMethod::Phonetic,
        InputMethod::TotalStrokes,
    ];

    /// Persisted numeric id (0-10)
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Symbolic name as it appears in dictionary source text
    pub fn name(self) -> &'static str {
        match self {
            InputMethod::Cangjie => "kCangjie",
            InputMethod::CheungBauer => "kCheungBauer",
            InputMethod::CihaiT => "kCihaiT",
            InputMethod::Fenn => "kFenn",
            InputMethod::FourCornerCode => "kFourCornerCode",
            InputMethod::Frequency => "kFrequency",
            InputMethod::GradeLevel => "kGradeLevel",
            InputMethod::HdzRadBreak => "kHDZRadBreak",
            InputMethod::HkGlyph => "kHKGlyph",
            InputMethod::Phonetic => "kPhonetic",
            InputMethod::TotalStrokes => "kTotalStrokes",
        }
    }

    /// Resolve a persisted id
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }
}

impl std::fmt::Display for InputMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for InputMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|im| im.name() == s)
            .ok_or_else(|| format!("Unknown input method: {}", s))
    }
}

// ============================================================================
// ENTRIES
// ============================================================================

/// One dictionary record, identified by `(code, im)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    /// Character codepoint
    pub code: u32,
    /// Input method the value belongs to
    pub im: InputMethod,
    /// Opaque payload
    pub value: serde_json::Value,
}

impl DictionaryEntry {
    pub fn new(code: u32, im: InputMethod, value: impl Into<serde_json::Value>) -> Self {
        Self {
            code,
            im,
            value: value.into(),
        }
    }

    /// Composite identity of this entry
    pub fn key(&self) -> (u32, InputMethod) {
        (self.code, self.im)
    }

    /// The character for `code`, when it is a valid scalar value
    pub fn character(&self) -> Option<char> {
        char::from_u32(self.code)
    }
}
