//! Digit alphabets for the packed text
//!
//! An alphabet is an ordered set of distinct printable symbols; its length is
//! the numeric base of the packed digit string. Symbols that would need
//! escaping inside a string literal (quotes, backtick, backslash), control
//! characters and whitespace are never allowed.

use crate::{PackError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Characters rejected in any alphabet.
pub const FORBIDDEN_SYMBOLS: [char; 4] = ['"', '\'', '`', '\\'];

/// Largest supported base; digit values must fit in a `u16`-sized table.
pub const MAX_BASE: usize = 1 << 16;

/// First code point of the CJK preset.
const CJK_START: u32 = 0x4E00;
const CJK_LEN: u32 = 8192;

/// An ordered set of digit symbols.
#[derive(Debug, Clone)]
pub struct Alphabet {
    name: String,
    symbols: Vec<char>,
    index: HashMap<char, u32>,
}

impl PartialEq for Alphabet {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.symbols == other.symbols
    }
}

impl Alphabet {
    /// Build and validate an alphabet.
    pub fn new(name: impl Into<String>, symbols: impl IntoIterator<Item = char>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(PackError::invalid_alphabet(
                name,
                "name must be non-empty and contain no whitespace",
            ));
        }

        let symbols: Vec<char> = symbols.into_iter().collect();
        if symbols.len() < 2 {
            return Err(PackError::invalid_alphabet(
                name,
                format!("needs at least 2 symbols, got {}", symbols.len()),
            ));
        }
        if symbols.len() > MAX_BASE {
            return Err(PackError::invalid_alphabet(
                name,
                format!("base {} exceeds {}", symbols.len(), MAX_BASE),
            ));
        }

        let mut index = HashMap::with_capacity(symbols.len());
        for (digit, &c) in symbols.iter().enumerate() {
            if !is_allowed(c) {
                return Err(PackError::invalid_alphabet(
                    name,
                    format!("disallowed symbol {:?} at position {}", c, digit),
                ));
            }
            if index.insert(c, digit as u32).is_some() {
                return Err(PackError::invalid_alphabet(
                    name,
                    format!("duplicate symbol {:?}", c),
                ));
            }
        }

        Ok(Self {
            name,
            symbols,
            index,
        })
    }

    /// Look up a built-in preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        let symbols: Vec<char> = match name {
            "hex" => ('0'..='9').chain('a'..='f').collect(),
            "base64" => ('A'..='Z')
                .chain('a'..='z')
                .chain('0'..='9')
                .chain(['-', '_'])
                .collect(),
            "ascii90" => ('!'..='~').filter(|c| is_allowed(*c)).collect(),
            "cjk8192" => (CJK_START..CJK_START + CJK_LEN)
                .filter_map(char::from_u32)
                .collect(),
            _ => return None,
        };
        Self::new(name, symbols).ok()
    }

    /// Names of the built-in presets, smallest base first.
    pub fn preset_names() -> &'static [&'static str] {
        &["hex", "base64", "ascii90", "cjk8192"]
    }

    /// All built-in presets, smallest base first.
    pub fn presets() -> Vec<Self> {
        Self::preset_names()
            .iter()
            .filter_map(|n| Self::preset(n))
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of symbols
    pub fn base(&self) -> u32 {
        self.symbols.len() as u32
    }

    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    /// Symbol for a digit value.
    pub fn symbol(&self, digit: u32) -> Option<char> {
        self.symbols.get(digit as usize).copied()
    }

    /// Digit value for a symbol.
    pub fn digit(&self, symbol: char) -> Option<u32> {
        self.index.get(&symbol).copied()
    }

    /// Symbol for digit 0, used for left padding.
    pub fn zero(&self) -> char {
        self.symbols[0]
    }

    /// Information per symbol in bits
    pub fn bits_per_symbol(&self) -> f64 {
        (self.base() as f64).log2()
    }
}

/// Whether a character may appear in an alphabet.
pub fn is_allowed(c: char) -> bool {
    !(FORBIDDEN_SYMBOLS.contains(&c) || c.is_control() || c.is_whitespace())
}

/// How an alphabet is named in configuration: a preset or explicit symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlphabetSpec {
    /// Built-in preset by name
    Preset(String),
    /// Explicit symbol list
    Custom { name: String, symbols: String },
}

impl AlphabetSpec {
    /// Resolve to a validated alphabet.
    pub fn resolve(&self) -> Result<Alphabet> {
        match self {
            AlphabetSpec::Preset(name) => Alphabet::preset(name)
                .ok_or_else(|| PackError::invalid_alphabet(name.as_str(), "unknown preset")),
            AlphabetSpec::Custom { name, symbols } => Alphabet::new(name.as_str(), symbols.chars()),
        }
    }

    /// The configured name.
    pub fn name(&self) -> &str {
        match self {
            AlphabetSpec::Preset(name) => name,
            AlphabetSpec::Custom { name, .. } => name,
        }
    }
}

impl From<&str> for AlphabetSpec {
    fn from(name: &str) -> Self {
        AlphabetSpec::Preset(name.to_string())
    }
}
