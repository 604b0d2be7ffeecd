//! Bit-width and alphabet search
//!
//! The objective is the length of the final payload in characters, subject
//! to every array reconstructing within the configured tolerance.
//!
//! # Search
//!
//! ```text
//!  per array (or once, shared)          per alphabet (widths fixed)
//!  ┌───────────────────────────┐        ┌──────────────────────────────┐
//!  │ binary search on the step │        │ metadata chars               │
//!  │ (max-min)/(2^b-1) <= tol  │  ───>  │  + digit_count(bits, base)   │
//!  │ then confirm the measured │        │ shortest wins; ties: lowest  │
//!  │ error, stepping up if not │        │ error, then smallest base    │
//!  └───────────────────────────┘        └──────────────────────────────┘
//! ```
//!
//! The step is strictly decreasing in the width, so the binary search finds
//! the first width whose step fits. The measured error is at most half a
//! step, plus `f32` rounding of the parameters. Narrower widths are still
//! taken when they reproduce the array exactly, such as two-valued arrays at
//! 1 bit. When no step fits under the ceiling, any width that measures within
//! the tolerance is accepted before the search gives up.
//!
//! Independent evaluations run on the rayon pool. Results are collected in
//! input order and combined afterwards, so the outcome does not depend on
//! scheduling.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::alphabet::Alphabet;
use crate::config::PackConfig;
use crate::emitter::PayloadMetadata;
use crate::packer::digit_count;
use crate::quantizer::{
    combined_range, quantization_step, quantize_array, quantize_values, quantize_with,
    QuantizationScheme, QuantizedArray,
};
use crate::tensor::{NamedArray, TensorCollection};
use crate::{PackError, Result};

/// Whether schemes are chosen per array or shared by the whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemePolicy {
    /// Independent bit width, scale and zero point per array
    PerArray,
    /// One scheme over the union of all values
    Shared,
}

impl SchemePolicy {
    pub fn from_per_array(per_array: bool) -> Self {
        if per_array {
            SchemePolicy::PerArray
        } else {
            SchemePolicy::Shared
        }
    }
}

impl fmt::Display for SchemePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemePolicy::PerArray => write!(f, "per-array"),
            SchemePolicy::Shared => write!(f, "shared"),
        }
    }
}

impl FromStr for SchemePolicy {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "per-array" => Ok(SchemePolicy::PerArray),
            "shared" => Ok(SchemePolicy::Shared),
            _ => Err(()),
        }
    }
}

/// Length of the payload under one candidate alphabet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphabetTrial {
    pub alphabet: String,
    pub base: u32,
    /// Characters in the metadata block, separators included
    pub metadata_chars: usize,
    /// Digits in the packed text
    pub packed_chars: usize,
    /// Maximum reconstruction error over all arrays
    pub max_error: f64,
}

impl AlphabetTrial {
    /// Total payload length in characters
    pub fn payload_chars(&self) -> usize {
        self.metadata_chars + self.packed_chars
    }

    /// Shortest first, then lowest error, then smallest base.
    fn rank(&self, other: &Self) -> Ordering {
        self.payload_chars()
            .cmp(&other.payload_chars())
            .then_with(|| self.max_error.total_cmp(&other.max_error))
            .then_with(|| self.base.cmp(&other.base))
    }
}

/// Winning configuration of a search
#[derive(Debug, Clone)]
pub struct OptimizedEncoding {
    pub policy: SchemePolicy,
    /// Quantized arrays in payload order
    pub arrays: Vec<QuantizedArray>,
    /// Chosen alphabet
    pub alphabet: Alphabet,
    /// Every candidate evaluated, in configuration order
    pub trials: Vec<AlphabetTrial>,
    pub tolerance: f64,
}

impl OptimizedEncoding {
    /// Bits in the packed integer
    pub fn total_bits(&self) -> u64 {
        self.arrays.iter().map(QuantizedArray::bit_length).sum()
    }

    /// Worst reconstruction error over all arrays
    pub fn max_error(&self) -> f64 {
        self.arrays.iter().map(|a| a.max_error).fold(0.0, f64::max)
    }

    /// Trial for the chosen alphabet
    pub fn chosen_trial(&self) -> Option<&AlphabetTrial> {
        self.trials
            .iter()
            .find(|t| t.alphabet == self.alphabet.name())
    }
}

/// Searches quantization widths and alphabets for the shortest payload
#[derive(Debug, Clone)]
pub struct SchemeOptimizer {
    config: PackConfig,
    alphabets: Vec<Alphabet>,
}

impl SchemeOptimizer {
    /// Validate the configuration and resolve its alphabets.
    pub fn new(config: PackConfig) -> Result<Self> {
        config.validate()?;
        let alphabets = config.resolve_alphabets()?;
        Ok(Self { config, alphabets })
    }

    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    /// Resolved candidate alphabets
    pub fn alphabets(&self) -> &[Alphabet] {
        &self.alphabets
    }

    pub fn policy(&self) -> SchemePolicy {
        SchemePolicy::from_per_array(self.config.per_array_scheme)
    }

    /// Run the full search.
    pub fn optimize(&self, collection: &TensorCollection) -> Result<OptimizedEncoding> {
        if collection.is_empty() {
            return Err(PackError::EmptyInput);
        }

        let policy = self.policy();
        let arrays = match policy {
            SchemePolicy::PerArray => self.quantize_per_array(collection)?,
            SchemePolicy::Shared => self.quantize_shared(collection)?,
        };

        let trials = self.evaluate_alphabets(policy, &arrays);
        let (best, _) = trials
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.rank(b))
            .ok_or_else(|| PackError::InvalidConfig("no alphabet candidates".into()))?;
        let alphabet = self.alphabets[best].clone();

        let encoding = OptimizedEncoding {
            policy,
            arrays,
            alphabet,
            trials,
            tolerance: self.config.tolerance,
        };
        info!(
            "Chose alphabet '{}' (base {}): {} chars for {} bits, max error {:.3e}",
            encoding.alphabet.name(),
            encoding.alphabet.base(),
            encoding.trials[best].payload_chars(),
            encoding.total_bits(),
            encoding.max_error()
        );
        Ok(encoding)
    }

    /// Smallest admissible width for one array.
    pub fn minimal_width(&self, array: &NamedArray) -> Result<QuantizedArray> {
        let range = array.range();
        let width = self.smallest_width(range, |width| quantize_array(array, width).max_error);

        match width {
            Some(width) => {
                let quantized = quantize_array(array, width);
                debug!(
                    "{}: {} bits, scale {:e}, error {:.3e}",
                    array.name(),
                    width,
                    quantized.scheme.scale,
                    quantized.max_error
                );
                Ok(quantized)
            }
            None => {
                let (_, best_error) =
                    self.best_width(|width| quantize_array(array, width).max_error);
                Err(PackError::ToleranceUnsatisfiable {
                    name: array.name().to_string(),
                    ceiling: self.config.bit_width_ceiling,
                    tolerance: self.config.tolerance,
                    best_error,
                })
            }
        }
    }

    fn quantize_per_array(&self, collection: &TensorCollection) -> Result<Vec<QuantizedArray>> {
        let arrays: Vec<&NamedArray> = collection.iter().collect();
        // Collect every outcome first so the reported failure is the first in order.
        let outcomes: Vec<Result<QuantizedArray>> = arrays
            .par_iter()
            .map(|array| self.minimal_width(array))
            .collect();
        let quantized = outcomes.into_iter().collect::<Result<Vec<_>>>()?;

        info!(
            "Per-array widths: {}",
            quantized
                .iter()
                .map(|q| format!("{}={}", q.name, q.scheme.bit_width))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(quantized)
    }

    fn quantize_shared(&self, collection: &TensorCollection) -> Result<Vec<QuantizedArray>> {
        let range = combined_range(collection.iter());
        // (worst error, index of the array that has it)
        let worst = |width: u32| -> (f64, usize) {
            let scheme = QuantizationScheme::fit(range, width);
            collection
                .iter()
                .enumerate()
                .map(|(i, a)| (quantize_values(a.values(), &scheme).1, i))
                .fold((0.0, 0), |best, cur| if cur.0 > best.0 { cur } else { best })
        };

        let Some(width) = self.smallest_width(range, |width| worst(width).0) else {
            let (best, _) = self.best_width(|width| worst(width).0);
            let (best_error, index) = worst(best);
            let name = collection
                .iter()
                .nth(index)
                .map(|a| a.name())
                .unwrap_or_default();
            return Err(PackError::ToleranceUnsatisfiable {
                name: name.to_string(),
                ceiling: self.config.bit_width_ceiling,
                tolerance: self.config.tolerance,
                best_error,
            });
        };

        let scheme = QuantizationScheme::fit(range, width);
        info!(
            "Shared scheme: {} bits, scale {:e}, zero point {}",
            width, scheme.scale, scheme.zero_point
        );
        let arrays: Vec<&NamedArray> = collection.iter().collect();
        Ok(arrays
            .par_iter()
            .map(|array| quantize_with(array, scheme))
            .collect())
    }

    /// Smallest admissible width in `1..=ceiling`.
    ///
    /// Below the first width whose step meets the tolerance only exact
    /// widths (measured error 0) are taken. From there the first width whose
    /// measured error also meets the tolerance wins. If none does, any width
    /// within tolerance is accepted.
    fn smallest_width<F>(&self, range: Option<(f32, f32)>, measure: F) -> Option<u32>
    where
        F: Fn(u32) -> f64,
    {
        let tolerance = self.config.tolerance;
        let ceiling = self.config.bit_width_ceiling;

        let stepped = (quantization_step(range, ceiling) <= tolerance).then(|| {
            let (mut lo, mut hi) = (1, ceiling);
            while lo < hi {
                let mid = lo + (hi - lo) / 2;
                if quantization_step(range, mid) <= tolerance {
                    hi = mid;
                } else {
                    lo = mid + 1;
                }
            }
            lo
        });

        // Two-valued and other grid-aligned arrays land exactly on codes
        let below = stepped.unwrap_or(ceiling + 1);
        if let Some(width) = (1..below).find(|&width| measure(width) == 0.0) {
            return Some(width);
        }

        // f32 rounding of scale/zero point can push a borderline width over.
        if let Some(lo) = stepped {
            if let Some(width) = (lo..=ceiling).find(|&width| measure(width) <= tolerance) {
                return Some(width);
            }
        }
        (1..=ceiling).find(|&width| measure(width) <= tolerance)
    }

    /// Width with the lowest measured error, for failure reports.
    fn best_width<F>(&self, measure: F) -> (u32, f64)
    where
        F: Fn(u32) -> f64,
    {
        (1..=self.config.bit_width_ceiling)
            .map(|width| (width, measure(width)))
            .fold((1, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
    }

    fn evaluate_alphabets(
        &self,
        policy: SchemePolicy,
        arrays: &[QuantizedArray],
    ) -> Vec<AlphabetTrial> {
        let bits: u64 = arrays.iter().map(QuantizedArray::bit_length).sum();
        let max_error = arrays.iter().map(|a| a.max_error).fold(0.0, f64::max);

        let trials: Vec<AlphabetTrial> = self
            .alphabets
            .par_iter()
            .map(|alphabet| {
                let metadata = PayloadMetadata::from_arrays(alphabet, policy, arrays);
                AlphabetTrial {
                    alphabet: alphabet.name().to_string(),
                    base: alphabet.base(),
                    metadata_chars: metadata.render().chars().count(),
                    packed_chars: digit_count(bits, alphabet.base()),
                    max_error,
                }
            })
            .collect();

        for trial in &trials {
            debug!(
                "Alphabet '{}' (base {}): {} + {} chars",
                trial.alphabet,
                trial.base,
                trial.metadata_chars,
                trial.packed_chars
            );
        }
        trials
    }
}
