// src/error.rs
use thiserror::Error;

use crate::abi::ParamKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Mismatch between types and values length: {types} types, {values} values")]
    ArityMismatch { types: usize, values: usize },

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Value at position {index} is {found}, expected {expected}")]
    TypeMismatch {
        index: usize,
        expected: ParamKind,
        found: ParamKind,
    },

    #[error("Invalid hex value: {0}")]
    InvalidHex(String),

    #[error("Invalid {field} length: expected {expected}, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Value does not fit in 256 bits: {0}")]
    Overflow(String),

    #[error("Array lengths differ: {left} destinations, {right} payloads")]
    ArrayLengthMismatch { left: usize, right: usize },
}

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Data to sign must be 32 bytes long, got {0}")]
    InvalidHashLength(usize),

    #[error("Signature must be 65 bytes long, got {0}")]
    InvalidSignatureLength(usize),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Relay transport error: {0}")]
    Transport(String),

    #[error("Relay error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid relay response: {0}")]
    Parse(String),

    #[error("Can not serialize request: {0}")]
    Serialize(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

impl RelayError {
    /// Whether the relay itself answered with a JSON-RPC error object.
    pub fn is_rpc(&self) -> bool {
        matches!(self, RelayError::Rpc { .. })
    }
}
