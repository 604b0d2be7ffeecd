//! Property-based tests for quantization and packing.
//!
//! These tests check properties that must hold for any input:
//! - Every decoded element is within tolerance of its source
//! - Encoding is deterministic
//! - The quantization step shrinks strictly with bit width
//! - The chosen width is minimal
//! - Packing round-trips codes of any width and has the exact minimal length
//!
//! Run with: cargo test --test proptest_packing

use proptest::prelude::*;

use glyphpack::packer::{digit_count, digit_lower_bound, pack, unpack, SegmentLayout};
use glyphpack::quantizer::{max_code_for, quantization_step, quantize_array};
use glyphpack::{
    decode_with_presets, encode, Alphabet, NamedArray, PackConfig, PackError, SchemeOptimizer,
    TensorCollection,
};

/// Strategy for weight-like values.
fn weights_strategy() -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-2.0f32..2.0f32, 1..64)
}

/// Strategy for tolerances the default ceiling can always satisfy on [-2, 2].
fn tolerance_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.5), Just(0.1), Just(0.01), Just(0.003), Just(0.001)]
}

/// Strategy for a preset alphabet name.
fn preset_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("hex"), Just("base64"), Just("ascii90"), Just("cjk8192")]
}

/// Strategy for one packed segment: a width and codes that fit it.
fn segment_strategy() -> impl Strategy<Value = (u32, Vec<u32>)> {
    (1u32..=32).prop_flat_map(|width| {
        (
            Just(width),
            prop::collection::vec(any::<u32>().prop_map(move |c| c & max_code_for(width)), 0..12),
        )
    })
}

fn collection_of(values: Vec<Vec<f32>>) -> TensorCollection {
    let mut collection = TensorCollection::new();
    for (i, v) in values.into_iter().enumerate() {
        collection
            .insert(NamedArray::vector(format!("layer{}", i), v).unwrap())
            .unwrap();
    }
    collection
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 50,
        max_shrink_iters: 100,
        ..ProptestConfig::default()
    })]

    /// Property: every reconstructed element is within tolerance.
    #[test]
    fn prop_roundtrip_within_tolerance(
        arrays in prop::collection::vec(weights_strategy(), 1..4),
        tolerance in tolerance_strategy(),
        per_array in any::<bool>(),
        preset in preset_strategy(),
    ) {
        let collection = collection_of(arrays);
        let config = PackConfig::default()
            .with_tolerance(tolerance)
            .with_per_array_scheme(per_array)
            .with_alphabets([preset]);

        let payload = encode(&collection, &config).unwrap();
        let decoded = decode_with_presets(&payload.text()).unwrap();

        prop_assert_eq!(decoded.len(), collection.len());
        for (source, out) in collection.iter().zip(&decoded) {
            prop_assert_eq!(source.name(), out.name.as_str());
            for (i, (&a, &b)) in source.values().iter().zip(&out.values).enumerate() {
                let error = (a as f64 - b as f64).abs();
                prop_assert!(
                    error <= tolerance,
                    "{}[{}]: {} decoded as {}, error {} > {}",
                    source.name(), i, a, b, error, tolerance
                );
            }
        }
    }

    /// Property: the same input and config give byte-identical payloads.
    #[test]
    fn prop_encoding_is_deterministic(
        arrays in prop::collection::vec(weights_strategy(), 1..4),
        tolerance in tolerance_strategy(),
    ) {
        let collection = collection_of(arrays);
        let config = PackConfig::default().with_tolerance(tolerance);

        let first = encode(&collection, &config).unwrap();
        let second = encode(&collection, &config).unwrap();
        prop_assert_eq!(first.text(), second.text());
    }

    /// Property: more bits never give a coarser step, and the step bounds the error.
    #[test]
    fn prop_step_monotone_and_bounds_error(
        values in weights_strategy(),
        width in 1u32..16,
    ) {
        let array = NamedArray::vector("w", values).unwrap();
        let range = array.range();

        let coarse = quantization_step(range, width);
        let fine = quantization_step(range, width + 1);
        prop_assert!(fine <= coarse);
        if coarse > 0.0 {
            prop_assert!(fine < coarse);
        }

        let quantized = quantize_array(&array, width);
        // f32 rounding of scale and zero point adds a little slack
        prop_assert!(quantized.max_error <= coarse / 2.0 + 1e-6);
    }

    /// Property: one bit fewer than the chosen width is not admissible.
    #[test]
    fn prop_chosen_width_is_minimal(
        values in weights_strategy(),
        tolerance in tolerance_strategy(),
    ) {
        let array = NamedArray::vector("w", values).unwrap();
        let optimizer = SchemeOptimizer::new(PackConfig::default().with_tolerance(tolerance)).unwrap();
        let chosen = optimizer.minimal_width(&array).unwrap();

        prop_assert!(chosen.max_error <= tolerance);
        let width = chosen.scheme.bit_width;
        if width > 1 {
            let narrower = quantize_array(&array, width - 1);
            prop_assert!(
                quantization_step(array.range(), width - 1) > tolerance
                    || narrower.max_error > tolerance
            );
        }
    }

    /// Property: packing then unpacking recovers every code.
    #[test]
    fn prop_pack_unpack_roundtrip(
        segments in prop::collection::vec(segment_strategy(), 1..5),
        preset in preset_strategy(),
    ) {
        let alphabet = Alphabet::preset(preset).unwrap();
        let text = pack(segments.iter().map(|(w, c)| (c.as_slice(), *w)), &alphabet).unwrap();

        let layout: Vec<SegmentLayout> = segments
            .iter()
            .map(|(w, c)| SegmentLayout::new(c.len(), *w))
            .collect();
        let recovered = unpack(&text, &layout, &alphabet).unwrap();

        for ((_, codes), back) in segments.iter().zip(&recovered) {
            prop_assert_eq!(codes, back);
        }
    }

    /// Property: packed length is the exact minimal digit count, never below the entropy floor.
    #[test]
    fn prop_packed_length_is_minimal(
        segments in prop::collection::vec(segment_strategy(), 1..5),
        base in prop_oneof![Just(2u32), Just(3u32), Just(10u32), Just(16u32), Just(90u32), Just(8192u32)],
    ) {
        let symbols: Vec<char> = match base {
            2 => "01".chars().collect(),
            3 => "abc".chars().collect(),
            10 => "0123456789".chars().collect(),
            _ => Alphabet::presets()
                .into_iter()
                .find(|a| a.base() == base)
                .unwrap()
                .symbols()
                .to_vec(),
        };
        let alphabet = Alphabet::new("trial", symbols).unwrap();
        let bits: u64 = segments.iter().map(|(w, c)| *w as u64 * c.len() as u64).sum();

        let text = pack(segments.iter().map(|(w, c)| (c.as_slice(), *w)), &alphabet).unwrap();
        let length = text.chars().count();

        prop_assert_eq!(length, digit_count(bits, base));
        prop_assert!(length >= digit_lower_bound(bits, base));
        // One digit of slack at most over the floor
        prop_assert!(length <= digit_lower_bound(bits, base) + 1);
    }

    /// Property: a code one past the largest value of its width is rejected.
    #[test]
    fn prop_code_wider_than_width_rejected(width in 1u32..32) {
        let alphabet = Alphabet::preset("hex").unwrap();
        let code = max_code_for(width) + 1;
        let err = pack([(&[code][..], width)], &alphabet).unwrap_err();
        let is_out_of_range = matches!(err, PackError::CodeOutOfRange { .. });
        prop_assert!(is_out_of_range);
    }
}
