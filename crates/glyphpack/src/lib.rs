//! # Glyphpack
//!
//! Quantize the weights of a small neural network and pack them into the
//! shortest text that still reconstructs every value within a tolerance, for
//! embedding in a size-constrained program submission.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ TensorCollection │ → │ SchemeOptimizer  │ → │ packer           │ → │ emitter      │
//! │ named f32 arrays │   │ widths, alphabet │   │ base-N digits    │   │ payload text │
//! └──────────────────┘   └────────┬─────────┘   └──────────────────┘   └──────────────┘
//!                                 │ trial schemes
//!                        ┌────────┴─────────┐
//!                        │ quantizer        │
//!                        │ min/max affine   │
//!                        └──────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use glyphpack::{decode_with_presets, encode, NamedArray, PackConfig, TensorCollection};
//!
//! let weights = TensorCollection::new()
//!     .with(NamedArray::new("fc1.weight", vec![16, 8], values)?)?;
//! let config = PackConfig::default().with_tolerance(0.005);
//!
//! let payload = encode(&weights, &config)?;
//! println!("{}", payload.report());
//!
//! let decoded = decode_with_presets(&payload.text())?;
//! ```

pub mod alphabet;
pub mod config;
pub mod decoder;
pub mod emitter;
pub mod error;
pub mod optimizer;
pub mod packer;
pub mod quantizer;
pub mod tensor;

pub use alphabet::{Alphabet, AlphabetSpec};
pub use config::PackConfig;
pub use decoder::{decode, decode_with_presets, into_collection, verify, DecodedArray};
pub use emitter::{emit, EncodedPayload, EncodingReport, PayloadMetadata};
pub use error::{PackError, Result};
pub use optimizer::{AlphabetTrial, OptimizedEncoding, SchemeOptimizer, SchemePolicy};
pub use quantizer::{QuantizationScheme, QuantizedArray};
pub use tensor::{NamedArray, TensorCollection, TensorManifest};

use tracing::warn;

/// Search, pack and emit in one call.
///
/// An empty collection yields an empty payload rather than an error.
pub fn encode(collection: &TensorCollection, config: &PackConfig) -> Result<EncodedPayload> {
    let optimizer = SchemeOptimizer::new(config.clone())?;
    match optimizer.optimize(collection) {
        Ok(encoding) => emit(&encoding),
        Err(PackError::EmptyInput) => {
            warn!("No arrays supplied, emitting an empty payload");
            Ok(EncodedPayload::empty())
        }
        Err(e) => Err(e),
    }
}

/// [`encode`], then decode the payload and check it against the source.
pub fn encode_verified(
    collection: &TensorCollection,
    config: &PackConfig,
) -> Result<EncodedPayload> {
    let payload = encode(collection, config)?;
    let alphabets = config.resolve_alphabets()?;
    let decoded = decode(&payload.text(), &alphabets)?;
    verify(collection, &decoded, config.tolerance)?;
    Ok(payload)
}

/// Prelude for common imports
pub mod prelude {
    pub use super::{
        decode_with_presets, encode, encode_verified, NamedArray, PackConfig, PackError, Result,
        TensorCollection,
    };
}
