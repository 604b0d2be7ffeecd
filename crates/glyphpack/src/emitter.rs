//! Payload assembly and the operator report
//!
//! ## Payload Layout (version 1)
//!
//! ```text
//! GP1 <alphabet> <base> <policy> <array-count>
//! * <bits> <scale> <zero_point>                    (shared policy only)
//! <name> <d0>x<d1>x... [<bits> <scale> <zero_point>] (per array, in order)
//! <packed digits>                                  (always the last line)
//! ```
//!
//! Lines are separated by `\n`, which no alphabet may contain. Rank-0 shapes
//! are written as `-`. Floats are printed in whichever of plain or exponent
//! notation is shorter; both round-trip an `f32` exactly.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::alphabet::Alphabet;
use crate::optimizer::{AlphabetTrial, OptimizedEncoding, SchemePolicy};
use crate::packer::{digit_lower_bound, pack, SegmentLayout};
use crate::quantizer::{QuantizationScheme, QuantizedArray};
use crate::Result;

/// Format tag on the first metadata line.
pub const FORMAT_TAG: &str = "GP1";

/// Marker for the shared scheme line.
pub const SHARED_MARKER: &str = "*";

/// Per-array metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayMetadata {
    pub name: String,
    pub shape: Vec<usize>,
    pub scheme: QuantizationScheme,
}

impl ArrayMetadata {
    /// Element count implied by the shape
    pub fn numel(&self) -> usize {
        self.shape.iter().fold(1, |n, &d| n.saturating_mul(d))
    }
}

/// Everything a decoder needs besides the digits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadMetadata {
    pub alphabet: String,
    pub base: u32,
    pub policy: SchemePolicy,
    /// Arrays in packing order
    pub arrays: Vec<ArrayMetadata>,
}

impl PayloadMetadata {
    pub fn from_arrays(
        alphabet: &Alphabet,
        policy: SchemePolicy,
        arrays: &[QuantizedArray],
    ) -> Self {
        Self {
            alphabet: alphabet.name().to_string(),
            base: alphabet.base(),
            policy,
            arrays: arrays
                .iter()
                .map(|a| ArrayMetadata {
                    name: a.name.clone(),
                    shape: a.shape.clone(),
                    scheme: a.scheme,
                })
                .collect(),
        }
    }

    /// Packing layout in order
    pub fn layout(&self) -> Vec<SegmentLayout> {
        self.arrays
            .iter()
            .map(|a| SegmentLayout::new(a.numel(), a.scheme.bit_width))
            .collect()
    }

    /// Render the metadata block, each line terminated by `\n`.
    pub fn render(&self) -> String {
        let mut out = format!(
            "{} {} {} {} {}\n",
            FORMAT_TAG,
            self.alphabet,
            self.base,
            self.policy,
            self.arrays.len()
        );

        match self.policy {
            SchemePolicy::Shared => {
                if let Some(first) = self.arrays.first() {
                    out.push_str(SHARED_MARKER);
                    out.push(' ');
                    out.push_str(&format_scheme(&first.scheme));
                    out.push('\n');
                }
                for a in &self.arrays {
                    out.push_str(&format!("{} {}\n", a.name, format_shape(&a.shape)));
                }
            }
            SchemePolicy::PerArray => {
                for a in &self.arrays {
                    out.push_str(&format!(
                        "{} {} {}\n",
                        a.name,
                        format_shape(&a.shape),
                        format_scheme(&a.scheme)
                    ));
                }
            }
        }
        out
    }
}

/// `<bits> <scale> <zero_point>`
fn format_scheme(scheme: &QuantizationScheme) -> String {
    format!(
        "{} {} {}",
        scheme.bit_width,
        format_float(scheme.scale),
        format_float(scheme.zero_point)
    )
}

/// Shortest of plain and exponent notation, both exact for `f32`.
pub fn format_float(value: f32) -> String {
    let plain = value.to_string();
    let exponent = format!("{:e}", value);
    if exponent.len() < plain.len() {
        exponent
    } else {
        plain
    }
}

/// `2x3`, or `-` for rank 0.
pub fn format_shape(shape: &[usize]) -> String {
    if shape.is_empty() {
        return "-".to_string();
    }
    shape
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join("x")
}

/// Final deliverable: metadata block plus packed digits
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedPayload {
    pub metadata: PayloadMetadata,
    pub packed_text: String,
    report: EncodingReport,
}

impl EncodedPayload {
    /// Payload for an empty collection: no text at all.
    pub fn empty() -> Self {
        Self {
            metadata: PayloadMetadata {
                alphabet: String::new(),
                base: 0,
                policy: SchemePolicy::PerArray,
                arrays: Vec::new(),
            },
            packed_text: String::new(),
            report: EncodingReport::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.arrays.is_empty()
    }

    /// Full payload text
    pub fn text(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let mut text = self.metadata.render();
        text.push_str(&self.packed_text);
        text
    }

    /// Payload length in characters
    pub fn char_len(&self) -> usize {
        self.text().chars().count()
    }

    pub fn report(&self) -> &EncodingReport {
        &self.report
    }
}

impl fmt::Display for EncodedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Pack the winning configuration into a payload.
pub fn emit(encoding: &OptimizedEncoding) -> Result<EncodedPayload> {
    let metadata =
        PayloadMetadata::from_arrays(&encoding.alphabet, encoding.policy, &encoding.arrays);
    let packed_text = pack(
        encoding
            .arrays
            .iter()
            .map(|a| (a.codes.as_slice(), a.scheme.bit_width)),
        &encoding.alphabet,
    )?;

    let metadata_chars = metadata.render().chars().count();
    let packed_chars = packed_text.chars().count();
    let total_bits = encoding.total_bits();
    let report = EncodingReport {
        alphabet: encoding.alphabet.name().to_string(),
        base: encoding.alphabet.base(),
        policy: Some(encoding.policy),
        tolerance: encoding.tolerance,
        total_bits,
        metadata_chars,
        packed_chars,
        lower_bound_chars: digit_lower_bound(total_bits, encoding.alphabet.base()),
        utf8_bytes: metadata.render().len() + packed_text.len(),
        arrays: encoding
            .arrays
            .iter()
            .map(|a| ArrayReport {
                name: a.name.clone(),
                shape: a.shape.clone(),
                bit_width: a.scheme.bit_width,
                scale: a.scheme.scale,
                zero_point: a.scheme.zero_point,
                max_error: a.max_error,
            })
            .collect(),
        trials: encoding.trials.clone(),
    };

    Ok(EncodedPayload {
        metadata,
        packed_text,
        report,
    })
}

/// Per-array line of the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayReport {
    pub name: String,
    pub shape: Vec<usize>,
    pub bit_width: u32,
    pub scale: f32,
    pub zero_point: f32,
    pub max_error: f64,
}

/// Human-readable summary of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncodingReport {
    pub alphabet: String,
    pub base: u32,
    pub policy: Option<SchemePolicy>,
    pub tolerance: f64,
    pub total_bits: u64,
    pub metadata_chars: usize,
    pub packed_chars: usize,
    /// `ceil(total_bits / log2(base))`
    pub lower_bound_chars: usize,
    pub utf8_bytes: usize,
    pub arrays: Vec<ArrayReport>,
    pub trials: Vec<AlphabetTrial>,
}

impl EncodingReport {
    pub fn total_chars(&self) -> usize {
        self.metadata_chars + self.packed_chars
    }

    pub fn max_error(&self) -> f64 {
        self.arrays.iter().map(|a| a.max_error).fold(0.0, f64::max)
    }
}

impl fmt::Display for EncodingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.arrays.is_empty() {
            return writeln!(f, "Nothing encoded (no arrays)");
        }

        writeln!(f, "Payload")?;
        writeln!(f, "  Alphabet:   {} (base {})", self.alphabet, self.base)?;
        if let Some(policy) = self.policy {
            writeln!(f, "  Policy:     {}", policy)?;
        }
        writeln!(
            f,
            "  Length:     {} chars ({} metadata + {} packed), {} bytes UTF-8",
            self.total_chars(),
            self.metadata_chars,
            self.packed_chars,
            self.utf8_bytes
        )?;
        writeln!(
            f,
            "  Packed:     {} bits, lower bound {} chars",
            self.total_bits, self.lower_bound_chars
        )?;
        writeln!(
            f,
            "  Max error:  {:.3e} (tolerance {:.3e})",
            self.max_error(),
            self.tolerance
        )?;

        writeln!(f, "Arrays")?;
        writeln!(
            f,
            "  {:<24} {:>12} {:>4} {:>14} {:>14} {:>11}",
            "name", "shape", "bits", "scale", "zero_point", "max_error"
        )?;
        for a in &self.arrays {
            writeln!(
                f,
                "  {:<24} {:>12} {:>4} {:>14} {:>14} {:>11.3e}",
                a.name,
                format_shape(&a.shape),
                a.bit_width,
                format_float(a.scale),
                format_float(a.zero_point),
                a.max_error
            )?;
        }

        if self.trials.len() > 1 {
            writeln!(f, "Alphabet trials")?;
            for t in &self.trials {
                let mark = if t.alphabet == self.alphabet { "*" } else { " " };
                writeln!(
                    f,
                    " {}{:<12} base {:>5}: {} chars",
                    mark,
                    t.alphabet,
                    t.base,
                    t.payload_chars()
                )?;
            }
        }
        Ok(())
    }
}
