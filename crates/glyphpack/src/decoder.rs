//! Reference decoder for the payload layout
//!
//! This is the executable definition of what an embedded decoder must do:
//! parse the metadata block, rebuild the packed integer from the digits,
//! split it into fixed-width codes and apply each inverse affine map.

use std::str::FromStr;

use crate::alphabet::Alphabet;
use crate::emitter::{ArrayMetadata, PayloadMetadata, FORMAT_TAG, SHARED_MARKER};
use crate::optimizer::SchemePolicy;
use crate::packer::unpack;
use crate::quantizer::{QuantizationScheme, MAX_BIT_WIDTH};
use crate::tensor::{checked_numel, validate_name, NamedArray, TensorCollection};
use crate::{PackError, Result};

/// One array recovered from a payload
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedArray {
    pub name: String,
    pub shape: Vec<usize>,
    pub scheme: QuantizationScheme,
    pub codes: Vec<u32>,
    pub values: Vec<f32>,
}

impl DecodedArray {
    pub fn into_named(self) -> Result<NamedArray> {
        NamedArray::new(self.name, self.shape, self.values)
    }
}

/// Split a payload into its metadata and packed digits.
pub fn parse_payload(text: &str) -> Result<(PayloadMetadata, &str)> {
    let mut lines = text.split('\n');
    let header = lines
        .next()
        .ok_or_else(|| PackError::malformed(1, "missing header"))?;

    let fields: Vec<&str> = header.split(' ').collect();
    let [tag, alphabet, base, policy, count] = fields[..] else {
        return Err(PackError::malformed(1, "header needs 5 fields"));
    };
    if tag != FORMAT_TAG {
        return Err(PackError::malformed(
            1,
            format!("expected format tag {}, got {:?}", FORMAT_TAG, tag),
        ));
    }
    let base: u32 = parse_field(base, 1, "base")?;
    let policy = SchemePolicy::from_str(policy)
        .map_err(|_| PackError::malformed(1, format!("unknown policy {:?}", policy)))?;
    let count: usize = parse_field(count, 1, "array count")?;

    let mut line_no = 1;
    let mut next_line = |what: &str| {
        line_no += 1;
        lines
            .next()
            .map(|l| (line_no, l))
            .ok_or_else(|| PackError::malformed(line_no, format!("missing {}", what)))
    };

    let shared = match policy {
        SchemePolicy::Shared if count > 0 => {
            let (n, line) = next_line("shared scheme line")?;
            let fields: Vec<&str> = line.split(' ').collect();
            match fields[..] {
                [marker, bits, scale, zero] if marker == SHARED_MARKER => {
                    Some(parse_scheme(bits, scale, zero, n)?)
                }
                _ => return Err(PackError::malformed(n, "expected shared scheme line")),
            }
        }
        _ => None,
    };

    // The count is untrusted; grow as lines are actually read
    let mut arrays = Vec::new();
    for _ in 0..count {
        let (n, line) = next_line("array line")?;
        let fields: Vec<&str> = line.split(' ').collect();
        let (name, shape, scheme) = match (shared, &fields[..]) {
            (Some(scheme), [name, shape]) => (*name, *shape, scheme),
            (None, [name, shape, bits, scale, zero]) => {
                (*name, *shape, parse_scheme(bits, scale, zero, n)?)
            }
            _ => return Err(PackError::malformed(n, "wrong number of fields")),
        };
        validate_name(name).map_err(|_| PackError::malformed(n, "invalid array name"))?;
        arrays.push(ArrayMetadata {
            name: name.to_string(),
            shape: parse_shape(shape, n)?,
            scheme,
        });
    }

    let (n, packed) = next_line("packed digits")?;
    if lines.next().is_some() {
        return Err(PackError::malformed(n + 1, "trailing lines after packed digits"));
    }

    Ok((
        PayloadMetadata {
            alphabet: alphabet.to_string(),
            base,
            policy,
            arrays,
        },
        packed,
    ))
}

/// Decode a payload, resolving its alphabet among `alphabets`.
///
/// An empty payload decodes to no arrays.
pub fn decode(text: &str, alphabets: &[Alphabet]) -> Result<Vec<DecodedArray>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let (metadata, packed) = parse_payload(text)?;
    let alphabet = alphabets
        .iter()
        .find(|a| a.name() == metadata.alphabet)
        .ok_or_else(|| PackError::UnknownAlphabet(metadata.alphabet.clone()))?;
    if alphabet.base() != metadata.base {
        return Err(PackError::malformed(
            1,
            format!(
                "alphabet '{}' has base {}, header says {}",
                alphabet.name(),
                alphabet.base(),
                metadata.base
            ),
        ));
    }

    let segments = unpack(packed, &metadata.layout(), alphabet)?;
    Ok(metadata
        .arrays
        .into_iter()
        .zip(segments)
        .map(|(meta, codes)| {
            let values = codes.iter().map(|&c| meta.scheme.reconstruct(c)).collect();
            DecodedArray {
                name: meta.name,
                shape: meta.shape,
                scheme: meta.scheme,
                codes,
                values,
            }
        })
        .collect())
}

/// Decode with the built-in preset alphabets.
pub fn decode_with_presets(text: &str) -> Result<Vec<DecodedArray>> {
    decode(text, &Alphabet::presets())
}

/// Rebuild a tensor collection from decoded arrays.
pub fn into_collection(decoded: Vec<DecodedArray>) -> Result<TensorCollection> {
    let mut collection = TensorCollection::new();
    for array in decoded {
        collection.insert(array.into_named()?)?;
    }
    Ok(collection)
}

/// Check decoded arrays against their sources; returns the worst error.
pub fn verify(source: &TensorCollection, decoded: &[DecodedArray], tolerance: f64) -> Result<f64> {
    if source.len() != decoded.len() {
        return Err(PackError::VerificationFailed {
            name: "*".into(),
            reason: format!(
                "expected {} arrays, decoded {}",
                source.len(),
                decoded.len()
            ),
        });
    }

    let mut worst = 0.0f64;
    for (original, decoded) in source.iter().zip(decoded) {
        let fail = |reason: String| PackError::VerificationFailed {
            name: original.name().to_string(),
            reason,
        };
        if original.name() != decoded.name {
            return Err(fail(format!("decoded name '{}' out of order", decoded.name)));
        }
        if original.shape() != decoded.shape.as_slice() {
            return Err(fail(format!(
                "shape {:?} decoded as {:?}",
                original.shape(),
                decoded.shape
            )));
        }
        for (i, (&o, &d)) in original.values().iter().zip(&decoded.values).enumerate() {
            let error = (o as f64 - d as f64).abs();
            if error > tolerance {
                return Err(fail(format!(
                    "element {} off by {:.3e} (tolerance {:.3e})",
                    i, error, tolerance
                )));
            }
            worst = worst.max(error);
        }
    }
    Ok(worst)
}

fn parse_field<T: FromStr>(field: &str, line: usize, what: &str) -> Result<T> {
    field
        .parse()
        .map_err(|_| PackError::malformed(line, format!("invalid {} {:?}", what, field)))
}

fn parse_scheme(bits: &str, scale: &str, zero: &str, line: usize) -> Result<QuantizationScheme> {
    let bit_width: u32 = parse_field(bits, line, "bit width")?;
    if bit_width == 0 || bit_width > MAX_BIT_WIDTH {
        return Err(PackError::malformed(
            line,
            format!("bit width {} outside 1..={}", bit_width, MAX_BIT_WIDTH),
        ));
    }
    let scale: f32 = parse_field(scale, line, "scale")?;
    let zero_point: f32 = parse_field(zero, line, "zero point")?;
    if !(scale.is_finite() && scale > 0.0) || !zero_point.is_finite() {
        return Err(PackError::malformed(line, "scale/zero point out of range"));
    }
    Ok(QuantizationScheme {
        bit_width,
        scale,
        zero_point,
    })
}

fn parse_shape(field: &str, line: usize) -> Result<Vec<usize>> {
    if field == "-" {
        return Ok(Vec::new());
    }
    let shape = field
        .split('x')
        .map(|d| parse_field(d, line, "dimension"))
        .collect::<Result<Vec<usize>>>()?;
    if checked_numel(&shape).is_none() {
        return Err(PackError::malformed(
            line,
            format!("shape {} overflows the element count", field),
        ));
    }
    Ok(shape)
}
