//! End-to-end runs over realistic weight collections.
//!
//! Generates a small MLP with Gaussian weights, encodes it under each
//! alphabet and policy, and checks the decoded weights against the source.

use glyphpack::prelude::*;
use glyphpack::{into_collection, verify, Alphabet, TensorManifest};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Synthetic 8 -> 16 -> 4 MLP, deterministic per seed.
fn generate_mlp(seed: u64) -> TensorCollection {
    let mut rng = StdRng::seed_from_u64(seed);
    let weights = Normal::new(0.0, 0.3).unwrap();
    let biases = Normal::new(0.0, 0.05).unwrap();

    let mut sample = |dist: &Normal<f64>, n: usize| -> Vec<f32> {
        (0..n).map(|_| dist.sample(&mut rng) as f32).collect()
    };

    let mut collection = TensorCollection::new();
    for (name, shape, dist) in [
        ("fc1.weight", vec![16, 8], &weights),
        ("fc1.bias", vec![16], &biases),
        ("fc2.weight", vec![4, 16], &weights),
        ("fc2.bias", vec![4], &biases),
    ] {
        let n = shape.iter().product();
        collection
            .insert(NamedArray::new(name, shape, sample(dist, n)).unwrap())
            .unwrap();
    }
    collection
}

#[test]
fn test_mlp_roundtrip_each_alphabet() {
    let mlp = generate_mlp(42);
    let tolerance = 0.005;

    for name in Alphabet::preset_names() {
        let config = PackConfig::default()
            .with_tolerance(tolerance)
            .with_alphabets([*name]);
        let payload = encode(&mlp, &config).unwrap();
        assert_eq!(payload.report().alphabet, *name);

        let decoded = decode_with_presets(&payload.text()).unwrap();
        let worst = verify(&mlp, &decoded, tolerance).unwrap();
        assert!(worst <= tolerance, "{}: worst error {}", name, worst);
        assert!((worst - payload.report().max_error()).abs() < 1e-12);
    }
}

#[test]
fn test_densest_alphabet_wins_on_large_payload() {
    let mlp = generate_mlp(42);
    let payload = encode(&mlp, &PackConfig::default()).unwrap();
    let report = payload.report();

    assert_eq!(report.alphabet, "cjk8192");
    assert_eq!(report.trials.len(), 4);
    for trial in &report.trials {
        assert!(report.total_chars() <= trial.payload_chars());
    }
}

#[test]
fn test_report_matches_payload() {
    let mlp = generate_mlp(7);
    let payload = encode(&mlp, &PackConfig::default().with_alphabets(["base64"])).unwrap();
    let report = payload.report();

    assert_eq!(payload.char_len(), report.total_chars());
    assert_eq!(payload.text().len(), report.utf8_bytes);
    assert!(report.packed_chars >= report.lower_bound_chars);
    assert_eq!(
        report.total_bits,
        report
            .arrays
            .iter()
            .map(|a| a.bit_width as u64 * a.shape.iter().product::<usize>() as u64)
            .sum::<u64>()
    );
    assert!(report.to_string().contains("fc1.weight"));
}

#[test]
fn test_encoding_is_deterministic() {
    let config = PackConfig::default().with_tolerance(0.002);
    let first = encode(&generate_mlp(3), &config).unwrap();
    let second = encode(&generate_mlp(3), &config).unwrap();
    assert_eq!(first.text(), second.text());
}

#[test]
fn test_shared_versus_per_array() {
    let mlp = generate_mlp(11);
    let tolerance = 0.01;
    let per_array = encode_verified(&mlp, &PackConfig::default().with_tolerance(tolerance)).unwrap();
    let shared = encode_verified(
        &mlp,
        &PackConfig::default()
            .with_tolerance(tolerance)
            .with_per_array_scheme(false),
    )
    .unwrap();

    // One width for everything under the shared policy
    let widths: Vec<u32> = shared.report().arrays.iter().map(|a| a.bit_width).collect();
    assert!(widths.windows(2).all(|w| w[0] == w[1]));

    // Narrow bias ranges need fewer bits on their own
    let per_array_bits = per_array.report().total_bits;
    assert!(per_array_bits <= shared.report().total_bits);
}

#[test]
fn test_manifest_roundtrip() {
    let json = r#"{
        "arrays": [
            {"name": "embed", "shape": [2, 3], "values": [0.1, -0.2, 0.3, -0.4, 0.5, -0.6]},
            {"name": "head", "values": [1.0, 2.0, 3.0]}
        ]
    }"#;
    let source = TensorCollection::from_json(json).unwrap();
    assert_eq!(source.get("head").unwrap().shape(), &[3]);

    let payload = encode(&source, &PackConfig::default()).unwrap();
    let restored = into_collection(decode_with_presets(&payload.text()).unwrap()).unwrap();

    let manifest: TensorManifest =
        serde_json::from_str(&serde_json::to_string(&restored.to_manifest()).unwrap()).unwrap();
    let names: Vec<&str> = manifest.arrays.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["embed", "head"]);
    assert_eq!(manifest.arrays[0].shape, Some(vec![2, 3]));
    for (a, b) in source.get("head").unwrap().values().iter().zip(&manifest.arrays[1].values) {
        assert!((a - b).abs() <= 0.01);
    }
}

#[test]
fn test_config_from_json_drives_run() {
    let config = PackConfig::from_json(
        r#"{
            "tolerance": 0.02,
            "bit_width_ceiling": 12,
            "alphabet_candidates": ["hex", {"name": "digits", "symbols": "0123456789"}],
            "per_array_scheme": false
        }"#,
    )
    .unwrap();
    let payload = encode_verified(&generate_mlp(5), &config).unwrap();
    let report = payload.report();

    assert!(report.alphabet == "hex" || report.alphabet == "digits");
    assert_eq!(report.trials.len(), 2);
    assert!(payload.text().contains(" shared "));
}
