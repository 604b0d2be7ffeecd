//! Error types for quantization and packing

use thiserror::Error;

/// Errors that can occur while encoding or decoding a weight payload
#[derive(Debug, Error)]
pub enum PackError {
    /// No arrays were supplied
    #[error("No arrays to encode")]
    EmptyInput,

    /// No bit width up to the ceiling meets the tolerance
    #[error(
        "Tolerance unsatisfiable for '{name}': best error {best_error:.3e} with up to {ceiling} bits exceeds {tolerance:.3e}"
    )]
    ToleranceUnsatisfiable {
        name: String,
        ceiling: u32,
        tolerance: f64,
        best_error: f64,
    },

    /// Alphabet has duplicate, disallowed or too few symbols
    #[error("Invalid alphabet '{name}': {reason}")]
    InvalidAlphabet { name: String, reason: String },

    /// Declared shape does not match the number of values
    #[error("Shape mismatch for '{name}': shape {shape:?} holds {expected} elements, got {actual}")]
    ShapeMismatch {
        name: String,
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    /// NaN or infinity in the input
    #[error("Non-finite value in '{name}' at index {index}")]
    NonFiniteValue { name: String, index: usize },

    /// Name cannot be written into the metadata block
    #[error("Invalid array name {0:?}: must be non-empty and contain no whitespace")]
    InvalidArrayName(String),

    /// Same name inserted twice
    #[error("Duplicate array '{0}'")]
    DuplicateArray(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// Payload names an alphabet the decoder does not know
    #[error("Unknown alphabet '{0}'")]
    UnknownAlphabet(String),

    /// Metadata block could not be parsed
    #[error("Malformed payload at line {line}: {reason}")]
    MalformedPayload { line: usize, reason: String },

    /// Digit string does not fit the declared layout
    #[error("Corrupt payload: {0}")]
    CorruptPayload(String),

    /// Code does not fit its declared width
    #[error("Code {code} does not fit in {bit_width} bits")]
    CodeOutOfRange { code: u32, bit_width: u32 },

    /// Decoded values do not match the source arrays
    #[error("Verification failed for '{name}': {reason}")]
    VerificationFailed { name: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PackError {
    /// Create a malformed payload error.
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        PackError::MalformedPayload {
            line,
            reason: reason.into(),
        }
    }

    /// Create an invalid alphabet error.
    pub fn invalid_alphabet(name: impl Into<String>, reason: impl Into<String>) -> Self {
        PackError::InvalidAlphabet {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether the run must abort (everything except empty input).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PackError::EmptyInput)
    }
}

/// Result type for packing operations
pub type Result<T> = std::result::Result<T, PackError>;
