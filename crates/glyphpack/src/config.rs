//! Run configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::alphabet::{Alphabet, AlphabetSpec};
use crate::quantizer::MAX_BIT_WIDTH;
use crate::{PackError, Result};

/// Options for one conversion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackConfig {
    /// Maximum allowed per-element reconstruction error
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Upper bound of the bit-width search
    #[serde(default = "default_bit_width_ceiling")]
    pub bit_width_ceiling: u32,

    /// Candidate symbol sets, tried in order
    #[serde(default = "default_alphabet_candidates")]
    pub alphabet_candidates: Vec<AlphabetSpec>,

    /// Independent scheme per array (true) or one shared scheme (false)
    #[serde(default = "default_per_array_scheme")]
    pub per_array_scheme: bool,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            bit_width_ceiling: default_bit_width_ceiling(),
            alphabet_candidates: default_alphabet_candidates(),
            per_array_scheme: default_per_array_scheme(),
        }
    }
}

impl PackConfig {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_bit_width_ceiling(mut self, ceiling: u32) -> Self {
        self.bit_width_ceiling = ceiling;
        self
    }

    pub fn with_alphabets<S: Into<AlphabetSpec>>(
        mut self,
        alphabets: impl IntoIterator<Item = S>,
    ) -> Self {
        self.alphabet_candidates = alphabets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_per_array_scheme(mut self, per_array: bool) -> Self {
        self.per_array_scheme = per_array;
        self
    }

    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check scalar options.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(PackError::InvalidConfig(format!(
                "tolerance must be a positive finite number, got {}",
                self.tolerance
            )));
        }
        if self.bit_width_ceiling == 0 || self.bit_width_ceiling > MAX_BIT_WIDTH {
            return Err(PackError::InvalidConfig(format!(
                "bit_width_ceiling must be in 1..={}, got {}",
                MAX_BIT_WIDTH, self.bit_width_ceiling
            )));
        }
        if self.alphabet_candidates.is_empty() {
            return Err(PackError::InvalidConfig(
                "at least one alphabet candidate is required".into(),
            ));
        }
        Ok(())
    }

    /// Resolve every candidate alphabet, failing on the first invalid one.
    pub fn resolve_alphabets(&self) -> Result<Vec<Alphabet>> {
        let alphabets = self
            .alphabet_candidates
            .iter()
            .map(AlphabetSpec::resolve)
            .collect::<Result<Vec<_>>>()?;

        // Names identify the alphabet in the payload header
        for (i, a) in alphabets.iter().enumerate() {
            if alphabets[..i].iter().any(|b| b.name() == a.name()) {
                return Err(PackError::invalid_alphabet(
                    a.name(),
                    "listed more than once",
                ));
            }
        }
        Ok(alphabets)
    }

    /// Alphabets a decoder should know: the configured candidates, then any
    /// preset they do not shadow.
    pub fn decoder_alphabets(&self) -> Result<Vec<Alphabet>> {
        let mut alphabets = self.resolve_alphabets()?;
        for preset in Alphabet::presets() {
            if !alphabets.iter().any(|a| a.name() == preset.name()) {
                alphabets.push(preset);
            }
        }
        Ok(alphabets)
    }
}

fn default_tolerance() -> f64 {
    0.01
}

fn default_bit_width_ceiling() -> u32 {
    16
}

fn default_alphabet_candidates() -> Vec<AlphabetSpec> {
    Alphabet::preset_names()
        .iter()
        .map(|&n| AlphabetSpec::from(n))
        .collect()
}

fn default_per_array_scheme() -> bool {
    true
}
