//! # volumegate Protocol Library
//!
//! Shared types and cryptographic primitives for the volumegate file
//! manager.
//!
//! ## Overview
//!
//! - **Message Definitions**: request payloads and response bodies for every
//!   gateway operation
//! - **Blob Encryption**: passphrase-based AES-256-CBC in the
//!   `hex(salt):hex(iv):base64(ciphertext)` text layout used for `.enc` files
//! - **Password Hashes**: salted PBKDF2 hashes for login and passphrase checks
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::crypto::{decrypt, encrypt, Passphrase};
//!
//! let passphrase = Passphrase::new("correct horse").unwrap();
//! let blob = encrypt(b"hello", &passphrase);
//!
//! let stored = blob.encode();
//! let parsed = stored.parse().unwrap();
//! assert_eq!(decrypt(&parsed, &passphrase).unwrap(), b"hello");
//! ```
//!
//! ## Modules
//!
//! - [`crypto`]: Blob encryption and key derivation
//! - [`messages`]: Request and response payloads
//! - [`password`]: Password hash generation and verification
//! - [`error`]: Error types

pub mod crypto;
pub mod error;
pub mod messages;
pub mod password;

pub use crypto::{
    decrypt, decrypt_bytes, derive_key, encrypt, EncryptedBlob, Passphrase, ENCRYPTED_SUFFIX,
    IV_LENGTH, KEY_LENGTH, PBKDF2_ITERATIONS, SALT_LENGTH,
};
pub use error::{ProtocolError, Result};
pub use messages::{Request, StatusCode};
pub use password::{check_password_hash, generate_password_hash};
