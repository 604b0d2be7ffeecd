//! Positional base packing of fixed-width codes
//!
//! All codes of a run are concatenated, most significant code first and each
//! code MSB-first, into one unsigned integer of exactly `total_bits` bits.
//! That integer is then written in base `alphabet.base()`, most significant
//! digit first, left-padded to the minimum digit count `d` with
//! `base^d >= 2^total_bits`. No separators are needed: the decoder recovers
//! code boundaries from the declared widths and element counts.
//!
//! ```text
//!  codes:   [5 (3 bits)] [1 (3 bits)] [2 (2 bits)]
//!  bits:     101          001          10          = 0b10100110 = 166
//!  base 16:  "a6"
//! ```

use num_bigint::BigUint;

use crate::alphabet::Alphabet;
use crate::quantizer::max_code_for;
use crate::{PackError, Result};

/// Element count and code width of one packed segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    pub count: usize,
    pub bit_width: u32,
}

impl SegmentLayout {
    pub fn new(count: usize, bit_width: u32) -> Self {
        Self { count, bit_width }
    }

    pub fn bit_length(&self) -> u64 {
        (self.count as u64).saturating_mul(self.bit_width as u64)
    }
}

/// Total packed bit length of a layout, saturating on absurd layouts.
pub fn total_bits(layout: &[SegmentLayout]) -> u64 {
    layout
        .iter()
        .map(SegmentLayout::bit_length)
        .fold(0, u64::saturating_add)
}

/// Minimum digit count `d` with `base^d >= 2^total_bits`.
pub fn digit_count(total_bits: u64, base: u32) -> usize {
    if total_bits == 0 {
        return 0;
    }
    if base.is_power_of_two() {
        let k = base.trailing_zeros() as u64;
        return total_bits.div_ceil(k) as usize;
    }

    // Start just below the float estimate and step up with exact arithmetic.
    let estimate = (total_bits as f64 / (base as f64).log2()).floor() as u32;
    let mut digits = estimate.saturating_sub(1);
    let radix = BigUint::from(base);
    let mut power = radix.pow(digits);
    // x >= 2^L  <=>  bits(x) >= L + 1
    while power.bits() <= total_bits {
        power *= &radix;
        digits += 1;
    }
    digits as usize
}

/// Information-theoretic floor on the digit count, `ceil(total_bits / log2(base))`.
pub fn digit_lower_bound(total_bits: u64, base: u32) -> usize {
    (total_bits as f64 / (base as f64).log2()).ceil() as usize
}

/// Pack code segments into a digit string over `alphabet`.
pub fn pack<'a>(
    segments: impl IntoIterator<Item = (&'a [u32], u32)>,
    alphabet: &Alphabet,
) -> Result<String> {
    let segments: Vec<(&[u32], u32)> = segments.into_iter().collect();
    let bits: u64 = segments
        .iter()
        .map(|(codes, width)| codes.len() as u64 * *width as u64)
        .sum();

    let mut value = BigUint::default();
    let mut cursor = bits;
    for (codes, width) in segments {
        let max = max_code_for(width);
        for &code in codes {
            if code > max {
                return Err(PackError::CodeOutOfRange {
                    code,
                    bit_width: width,
                });
            }
            cursor -= width as u64;
            write_code(&mut value, cursor, width, code);
        }
    }

    let digits = to_digits(&value, alphabet.base(), digit_count(bits, alphabet.base()));
    Ok(digits
        .into_iter()
        .map(|d| alphabet.symbol(d).unwrap_or_else(|| alphabet.zero()))
        .collect())
}

/// Split a digit string back into per-segment codes.
pub fn unpack(text: &str, layout: &[SegmentLayout], alphabet: &Alphabet) -> Result<Vec<Vec<u32>>> {
    let bits = total_bits(layout);
    let base = alphabet.base();
    let actual = text.chars().count();

    // The float bound is off by at most one digit; reject anything further
    // before exact arithmetic sized by the declared layout.
    let floor = digit_lower_bound(bits, base);
    if actual < floor.saturating_sub(1) || actual > floor.saturating_add(1) {
        return Err(PackError::CorruptPayload(format!(
            "layout declares {} bits, {} digits in base {} cannot hold them",
            bits, actual, base
        )));
    }
    let expected = digit_count(bits, base);
    if actual != expected {
        return Err(PackError::CorruptPayload(format!(
            "expected {} digits for {} bits in base {}, got {}",
            expected, bits, base, actual
        )));
    }

    let digits = text
        .chars()
        .enumerate()
        .map(|(position, symbol)| {
            alphabet.digit(symbol).ok_or_else(|| {
                PackError::CorruptPayload(format!(
                    "symbol {:?} at position {} is not in alphabet '{}'",
                    symbol,
                    position,
                    alphabet.name()
                ))
            })
        })
        .collect::<Result<Vec<u32>>>()?;

    let value = from_digits(&digits, base);
    if value.bits() > bits {
        return Err(PackError::CorruptPayload(format!(
            "packed value needs {} bits, layout declares {}",
            value.bits(),
            bits
        )));
    }

    let mut cursor = bits;
    let segments: Vec<Vec<u32>> = layout
        .iter()
        .map(|segment| {
            (0..segment.count)
                .map(|_| {
                    cursor -= segment.bit_width as u64;
                    read_code(&value, cursor, segment.bit_width)
                })
                .collect::<Vec<u32>>()
        })
        .collect();
    Ok(segments)
}

/// Set the `width` bits of `code` at bit offset `lo`.
fn write_code(value: &mut BigUint, lo: u64, width: u32, code: u32) {
    for b in 0..width {
        if (code >> b) & 1 == 1 {
            value.set_bit(lo + b as u64, true);
        }
    }
}

fn read_code(value: &BigUint, lo: u64, width: u32) -> u32 {
    (0..width).fold(0, |code, b| code | ((value.bit(lo + b as u64) as u32) << b))
}

/// Largest power of `base` that fits a `u64`, with its exponent.
fn chunk_radix(base: u32) -> (u64, usize) {
    let mut chunk = base as u64;
    let mut per = 1;
    while let Some(next) = chunk.checked_mul(base as u64) {
        chunk = next;
        per += 1;
    }
    (chunk, per)
}

/// Exactly `count` base-`base` digits of `value`, most significant first.
fn to_digits(value: &BigUint, base: u32, count: usize) -> Vec<u32> {
    // Least significant first until the final reverse
    let mut digits: Vec<u32> = if base <= 256 {
        value.to_radix_le(base).into_iter().map(u32::from).collect()
    } else {
        let (chunk, per) = chunk_radix(base);
        let divisor = BigUint::from(chunk);
        let mut rest = value.clone();
        let mut out = Vec::with_capacity(count + per);
        while rest.bits() > 0 {
            let mut low = (&rest % &divisor).iter_u64_digits().next().unwrap_or(0);
            rest /= &divisor;
            for _ in 0..per {
                out.push((low % base as u64) as u32);
                low /= base as u64;
            }
        }
        out
    };
    // value < base^count, so only zero digits are cut or added
    digits.resize(count, 0);
    digits.reverse();
    digits
}

/// Inverse of [`to_digits`]; every digit must already be below `base`.
fn from_digits(digits: &[u32], base: u32) -> BigUint {
    if base <= 256 {
        let bytes: Vec<u8> = digits.iter().map(|&d| d as u8).collect();
        return BigUint::from_radix_be(&bytes, base).unwrap_or_default();
    }

    let (_, per) = chunk_radix(base);
    digits.chunks(per).fold(BigUint::default(), |value, group| {
        let low = group
            .iter()
            .fold(0u64, |acc, &d| acc * base as u64 + d as u64);
        value * BigUint::from(base).pow(group.len() as u32) + low
    })
}
