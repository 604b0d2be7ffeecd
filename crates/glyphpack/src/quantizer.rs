//! Affine min/max quantization with exact error accounting
//!
//! Each array (or the whole collection, under a shared scheme) is mapped to
//! unsigned codes in `[0, 2^bits - 1]`:
//!
//! ```text
//! zero_point = min(values)
//! scale      = (max - min) / (2^bits - 1)
//! code       = clamp(round((v - zero_point) / scale), 0, 2^bits - 1)
//! v'         = code * scale + zero_point
//! ```
//!
//! `scale` and `zero_point` are rounded to `f32` before any code is computed,
//! so the error reported here is exactly what a decoder reading the printed
//! metadata will reproduce.

use crate::tensor::{value_range, NamedArray};
use serde::{Deserialize, Serialize};

/// Widest code the packer accepts.
pub const MAX_BIT_WIDTH: u32 = 32;

/// Affine quantization parameters for one array or a shared group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantizationScheme {
    /// Bits per code
    pub bit_width: u32,
    /// Step between adjacent codes
    pub scale: f32,
    /// Value of code 0
    pub zero_point: f32,
}

impl QuantizationScheme {
    /// Fit a scheme to a value range.
    ///
    /// A degenerate (`min == max`) or missing range forces `scale = 1` so no
    /// division by zero can happen; every code is then 0.
    pub fn fit(range: Option<(f32, f32)>, bit_width: u32) -> Self {
        let bit_width = bit_width.clamp(1, MAX_BIT_WIDTH);
        let Some((min, max)) = range else {
            return Self {
                bit_width,
                scale: 1.0,
                zero_point: 0.0,
            };
        };

        let span = max as f64 - min as f64;
        let scale = if span > 0.0 {
            ((span / max_code_for(bit_width) as f64) as f32).clamp(f32::MIN_POSITIVE, f32::MAX)
        } else {
            1.0
        };

        Self {
            bit_width,
            scale,
            zero_point: min,
        }
    }

    /// Largest representable code
    pub fn max_code(&self) -> u32 {
        max_code_for(self.bit_width)
    }

    /// Map a value to its code.
    pub fn quantize(&self, value: f32) -> u32 {
        let q = ((value as f64 - self.zero_point as f64) / self.scale as f64).round();
        q.clamp(0.0, self.max_code() as f64) as u32
    }

    /// Map a code back to a value.
    pub fn reconstruct(&self, code: u32) -> f32 {
        (code as f64 * self.scale as f64 + self.zero_point as f64) as f32
    }
}

/// `2^bits - 1`, computed without overflow at 32 bits.
pub fn max_code_for(bit_width: u32) -> u32 {
    ((1u64 << bit_width.min(MAX_BIT_WIDTH)) - 1) as u32
}

/// Distance between adjacent codes for a value range, 0 when degenerate.
///
/// Strictly decreasing in `bit_width` for a non-degenerate range, and an
/// upper bound of twice the rounding error, which makes it the monotone
/// quantity the optimizer searches over.
pub fn quantization_step(range: Option<(f32, f32)>, bit_width: u32) -> f64 {
    match range {
        Some((min, max)) if max > min => {
            (max as f64 - min as f64) / max_code_for(bit_width.clamp(1, MAX_BIT_WIDTH)) as f64
        }
        _ => 0.0,
    }
}

/// An array after quantization
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedArray {
    pub name: String,
    pub shape: Vec<usize>,
    pub scheme: QuantizationScheme,
    pub codes: Vec<u32>,
    /// Max absolute deviation between source and reconstruction
    pub max_error: f64,
}

impl QuantizedArray {
    /// Bits this array occupies in the packed integer
    pub fn bit_length(&self) -> u64 {
        self.codes.len() as u64 * self.scheme.bit_width as u64
    }

    /// Reconstruct the values.
    pub fn dequantize(&self) -> Vec<f32> {
        self.codes
            .iter()
            .map(|&c| self.scheme.reconstruct(c))
            .collect()
    }
}

/// Quantize an array with its own min/max range.
pub fn quantize_array(array: &NamedArray, bit_width: u32) -> QuantizedArray {
    let scheme = QuantizationScheme::fit(array.range(), bit_width);
    quantize_with(array, scheme)
}

/// Quantize an array with a fixed scheme (shared-scheme runs).
pub fn quantize_with(array: &NamedArray, scheme: QuantizationScheme) -> QuantizedArray {
    let (codes, max_error) = quantize_values(array.values(), &scheme);
    QuantizedArray {
        name: array.name().to_string(),
        shape: array.shape().to_vec(),
        scheme,
        codes,
        max_error,
    }
}

/// Codes plus the maximum absolute reconstruction error.
pub fn quantize_values(values: &[f32], scheme: &QuantizationScheme) -> (Vec<u32>, f64) {
    let mut max_error = 0.0f64;
    let codes = values
        .iter()
        .map(|&v| {
            let code = scheme.quantize(v);
            let error = (scheme.reconstruct(code) as f64 - v as f64).abs();
            max_error = max_error.max(error);
            code
        })
        .collect();
    (codes, max_error)
}

/// Range over several arrays, for shared schemes.
pub fn combined_range<'a>(arrays: impl IntoIterator<Item = &'a NamedArray>) -> Option<(f32, f32)> {
    arrays
        .into_iter()
        .filter_map(|a| value_range(a.values()))
        .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)))
}
