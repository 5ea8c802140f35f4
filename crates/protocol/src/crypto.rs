//! At-rest file encryption for volumegate volumes.
//!
//! Encrypted files are stored as a single ASCII line:
//!
//! ```text
//! hex(salt) ":" hex(iv) ":" base64(ciphertext)
//! ```
//!
//! The key is derived from the user's passphrase with PBKDF2-HMAC-SHA256 over
//! the stored salt, and the ciphertext is AES-256-CBC with PKCS#7 padding.
//! The parameters are fixed so that files written by earlier clients keep
//! decrypting byte-for-byte.

use std::fmt;
use std::str::FromStr;

use aes::Aes256;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::error::{ProtocolError, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Length of the random salt stored in front of every blob.
pub const SALT_LENGTH: usize = 16;

/// Length of the CBC initialization vector.
pub const IV_LENGTH: usize = 16;

/// Length of the derived AES-256 key.
pub const KEY_LENGTH: usize = 32;

/// PBKDF2 iteration count.
///
/// Weak by current standards, but existing `.enc` files were written with
/// exactly this value. Changing it requires a versioned blob format.
pub const PBKDF2_ITERATIONS: u32 = 1000;

/// Filename suffix marking an encrypted file.
pub const ENCRYPTED_SUFFIX: &str = ".enc";

const AES_BLOCK_SIZE: usize = 16;
const BLOB_SEPARATOR: char = ':';

/// A user-supplied encryption passphrase.
///
/// The passphrase is never persisted and never printed; `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Passphrase(String);

impl Passphrase {
    /// Wraps a passphrase, rejecting the empty string.
    pub fn new(passphrase: impl Into<String>) -> Result<Self> {
        let passphrase = passphrase.into();
        if passphrase.is_empty() {
            return Err(ProtocolError::EmptyPassphrase);
        }
        Ok(Self(passphrase))
    }

    /// Returns the raw passphrase.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}

/// The parsed form of an encrypted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    salt: [u8; SALT_LENGTH],
    iv: [u8; IV_LENGTH],
    ciphertext: Vec<u8>,
}

impl EncryptedBlob {
    /// Parses a blob from raw file bytes.
    ///
    /// Surrounding ASCII whitespace (a trailing newline added by an editor,
    /// for instance) is ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| ProtocolError::Decryption("blob is not valid UTF-8".to_string()))?;
        text.parse()
    }

    /// Returns the stored salt.
    pub fn salt(&self) -> &[u8; SALT_LENGTH] {
        &self.salt
    }

    /// Returns the stored IV.
    pub fn iv(&self) -> &[u8; IV_LENGTH] {
        &self.iv
    }

    /// Returns the raw ciphertext.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Serializes the blob into its on-disk `hex:hex:base64` form.
    pub fn encode(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            hex::encode(self.salt),
            hex::encode(self.iv),
            BASE64.encode(&self.ciphertext),
            sep = BLOB_SEPARATOR
        )
    }
}

impl FromStr for EncryptedBlob {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split(BLOB_SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(ProtocolError::Decryption(format!(
                "expected 3 ':'-separated parts, found {}",
                parts.len()
            )));
        }

        let salt = decode_fixed::<SALT_LENGTH>(parts[0], "salt")?;
        let iv = decode_fixed::<IV_LENGTH>(parts[1], "iv")?;
        let ciphertext = BASE64.decode(parts[2])?;

        Ok(Self {
            salt,
            iv,
            ciphertext,
        })
    }
}

impl fmt::Display for EncryptedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn decode_fixed<const N: usize>(hex_str: &str, what: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(hex_str)?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        ProtocolError::Decryption(format!(
            "{what} must be {N} bytes, got {}",
            bytes.len()
        ))
    })
}

/// Derives the AES-256 key for a passphrase and salt.
pub fn derive_key(passphrase: &Passphrase, salt: &[u8]) -> [u8; KEY_LENGTH] {
    derive_key_with_iterations(passphrase.expose().as_bytes(), salt, PBKDF2_ITERATIONS)
}

fn derive_key_with_iterations(password: &[u8], salt: &[u8], iterations: u32) -> [u8; KEY_LENGTH] {
    let mut key = [0u8; KEY_LENGTH];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut key);
    key
}

/// Encrypts `plaintext` under a fresh random salt and IV.
pub fn encrypt(plaintext: &[u8], passphrase: &Passphrase) -> EncryptedBlob {
    let mut salt = [0u8; SALT_LENGTH];
    let mut iv = [0u8; IV_LENGTH];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);
    encrypt_with(plaintext, passphrase, salt, iv)
}

/// Encrypts with caller-chosen salt and IV. Only useful for fixed test vectors.
pub fn encrypt_with(
    plaintext: &[u8],
    passphrase: &Passphrase,
    salt: [u8; SALT_LENGTH],
    iv: [u8; IV_LENGTH],
) -> EncryptedBlob {
    let key = derive_key(passphrase, &salt);
    let ciphertext =
        Aes256CbcEnc::new(&key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    EncryptedBlob {
        salt,
        iv,
        ciphertext,
    }
}

/// Decrypts a parsed blob.
///
/// A wrong passphrase is detected through the PKCS#7 padding check.
pub fn decrypt(blob: &EncryptedBlob, passphrase: &Passphrase) -> Result<Vec<u8>> {
    if blob.ciphertext.is_empty() || blob.ciphertext.len() % AES_BLOCK_SIZE != 0 {
        return Err(ProtocolError::Decryption(format!(
            "ciphertext length {} is not a positive multiple of {AES_BLOCK_SIZE}",
            blob.ciphertext.len()
        )));
    }

    let key = derive_key(passphrase, &blob.salt);
    Aes256CbcDec::new(&key.into(), &blob.iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&blob.ciphertext)
        .map_err(|_| {
            ProtocolError::Decryption(
                "bad padding (wrong passphrase or corrupted data)".to_string(),
            )
        })
}

/// Parses and decrypts raw encrypted-file bytes in one step.
pub fn decrypt_bytes(encoded: &[u8], passphrase: &Passphrase) -> Result<Vec<u8>> {
    let blob = EncryptedBlob::from_bytes(encoded)?;
    decrypt(&blob, passphrase)
}
