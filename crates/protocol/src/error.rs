//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering all possible failure modes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    // Serialization errors
    /// Failed to serialize data.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Failed to deserialize data.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    // Cryptographic errors
    /// Encryption operation failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// The blob could not be decrypted.
    ///
    /// Malformed layout, bad hex/base64, and wrong passphrase all land here;
    /// callers only ever learn that the blob cannot be decrypted.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Passphrase was empty.
    #[error("passphrase must not be empty")]
    EmptyPassphrase,

    // Password hash errors
    /// Stored password hash could not be parsed.
    #[error("invalid password hash: {0}")]
    InvalidPasswordHash(String),

    /// Stored password hash uses a method this build cannot verify.
    #[error("unsupported password hash method: {method}")]
    UnsupportedHashMethod {
        /// The method prefix found in the stored hash.
        method: String,
    },
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

// Conversions from underlying crate errors

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_eof() || err.is_syntax() {
            ProtocolError::Deserialization(err.to_string())
        } else {
            ProtocolError::Serialization(err.to_string())
        }
    }
}

impl From<hex::FromHexError> for ProtocolError {
    fn from(err: hex::FromHexError) -> Self {
        ProtocolError::Decryption(format!("invalid hex: {err}"))
    }
}

impl From<base64::DecodeError> for ProtocolError {
    fn from(err: base64::DecodeError) -> Self {
        ProtocolError::Decryption(format!("invalid base64: {err}"))
    }
}
