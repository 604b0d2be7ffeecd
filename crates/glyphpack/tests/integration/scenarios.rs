//! Small hand-checked scenarios through the public API.

use glyphpack::prelude::*;
use glyphpack::{decode, Alphabet, AlphabetSpec, SchemePolicy};

fn single(name: &str, values: Vec<f32>) -> TensorCollection {
    TensorCollection::new()
        .with(NamedArray::vector(name, values).unwrap())
        .unwrap()
}

#[test]
fn test_three_points_need_seven_bits() {
    let weights = single("w", vec![0.0, 0.5, 1.0]);
    let payload = encode(&weights, &PackConfig::default()).unwrap();

    let report = payload.report();
    assert_eq!(report.arrays[0].bit_width, 7);
    assert!(report.max_error() <= 0.01);

    let decoded = decode_with_presets(&payload.text()).unwrap();
    for (&source, &out) in [0.0f32, 0.5, 1.0].iter().zip(&decoded[0].values) {
        assert!((source - out).abs() <= 0.01, "{} decoded as {}", source, out);
    }
    // Endpoints map to codes 0 and 127 exactly
    assert_eq!(decoded[0].values[0], 0.0);
    assert_eq!(decoded[0].codes[0], 0);
    assert_eq!(decoded[0].codes[2], 127);
}

#[test]
fn test_unsatisfiable_tolerance_names_array() {
    let weights = TensorCollection::new()
        .with(NamedArray::vector("small", vec![0.0, 0.1]).unwrap())
        .unwrap()
        .with(NamedArray::vector("huge", vec![-5e5, 1.0, 5e5]).unwrap())
        .unwrap();
    let config = PackConfig::default()
        .with_tolerance(1e-3)
        .with_bit_width_ceiling(8);

    match encode(&weights, &config).unwrap_err() {
        PackError::ToleranceUnsatisfiable {
            name,
            ceiling,
            best_error,
            ..
        } => {
            assert_eq!(name, "huge");
            assert_eq!(ceiling, 8);
            assert!(best_error > 1e-3);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_constant_array_decodes_exactly() {
    let weights = single("bias", vec![0.25; 10]);
    let payload = encode(&weights, &PackConfig::default()).unwrap();
    assert_eq!(payload.report().arrays[0].bit_width, 1);

    let decoded = decode_with_presets(&payload.text()).unwrap();
    assert_eq!(decoded[0].values, vec![0.25; 10]);
}

#[test]
fn test_binarized_weights_pack_at_one_bit() {
    let signs: Vec<f32> = (0..64).map(|i| if i % 3 == 0 { -0.5 } else { 0.5 }).collect();
    let weights = single("sign", signs.clone());
    let payload = encode(&weights, &PackConfig::default().with_alphabets(["hex"])).unwrap();

    assert_eq!(payload.report().arrays[0].bit_width, 1);
    // 64 bits in base 16
    assert_eq!(payload.packed_text.chars().count(), 16);
    let decoded = decode_with_presets(&payload.text()).unwrap();
    assert_eq!(decoded[0].values, signs);
}

#[test]
fn test_empty_collection_is_empty_payload() {
    let payload = encode(&TensorCollection::new(), &PackConfig::default()).unwrap();
    assert_eq!(payload.text(), "");
    assert!(decode_with_presets("").unwrap().is_empty());
}

#[test]
fn test_bad_alphabet_fails_before_search() {
    // Would be unsatisfiable too; the alphabet error must win
    let weights = single("w", vec![-1e6, 1e6]);
    let config = PackConfig::default()
        .with_tolerance(1e-9)
        .with_alphabets([AlphabetSpec::Custom {
            name: "quotes".into(),
            symbols: "ab\"c".into(),
        }]);

    assert!(matches!(
        encode(&weights, &config),
        Err(PackError::InvalidAlphabet { .. })
    ));
}

#[test]
fn test_shape_mismatch_rejected() {
    assert!(matches!(
        NamedArray::new("w", vec![2, 2], vec![1.0; 3]),
        Err(PackError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_rank_zero_array() {
    let weights = TensorCollection::new()
        .with(NamedArray::new("scale", vec![], vec![3.5]).unwrap())
        .unwrap();
    let payload = encode(&weights, &PackConfig::default()).unwrap();
    assert!(payload.text().contains("\nscale - "));

    let decoded = decode_with_presets(&payload.text()).unwrap();
    assert!(decoded[0].shape.is_empty());
    assert_eq!(decoded[0].values, vec![3.5]);
}

#[test]
fn test_custom_alphabet_needs_matching_decoder() {
    let weights = single("w", vec![0.0, 0.3, 0.7, 1.0]);
    let custom = AlphabetSpec::Custom {
        name: "vowels".into(),
        symbols: "aeiou".into(),
    };
    let config = PackConfig::default().with_alphabets([custom.clone()]);
    let payload = encode(&weights, &config).unwrap();
    assert!(payload.text().starts_with("GP1 vowels 5 per-array 1\n"));

    assert!(matches!(
        decode_with_presets(&payload.text()),
        Err(PackError::UnknownAlphabet(_))
    ));

    let alphabets: Vec<Alphabet> = vec![custom.resolve().unwrap()];
    let decoded = decode(&payload.text(), &alphabets).unwrap();
    assert_eq!(decoded.len(), 1);
}

#[test]
fn test_header_names_policy() {
    let weights = single("w", vec![0.0, 1.0]);
    let shared = encode(&weights, &PackConfig::default().with_per_array_scheme(false)).unwrap();
    assert_eq!(shared.metadata.policy, SchemePolicy::Shared);
    assert!(shared.text().lines().nth(1).unwrap().starts_with("* "));
}
