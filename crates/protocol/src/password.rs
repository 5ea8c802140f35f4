//! Salted password hashes for login and passphrase confirmation.
//!
//! Hashes are stored in the `method$salt$hash` layout used by werkzeug, so a
//! credentials file written by the earlier web frontend keeps verifying:
//!
//! ```text
//! pbkdf2:sha256:600000$Xq3k9f0aL2mN7pQr$5f1d...e2
//! ```
//!
//! The login password and the encryption passphrase are each hashed on their
//! own; a hash is only ever used to confirm what the user typed.

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

use crate::error::{ProtocolError, Result};

/// Default PBKDF2 iteration count for newly generated hashes.
pub const DEFAULT_HASH_ITERATIONS: u32 = 600_000;

/// Length of the random alphanumeric salt.
pub const HASH_SALT_LENGTH: usize = 16;

const METHOD_PREFIX: &str = "pbkdf2";

/// Digest used inside PBKDF2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashDigest {
    Sha256,
    Sha512,
}

impl HashDigest {
    fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "sha256" => Some(Self::Sha256),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    fn derive(self, password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
        match self {
            Self::Sha256 => {
                let mut out = [0u8; 32];
                pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
                out.to_vec()
            }
            Self::Sha512 => {
                let mut out = [0u8; 64];
                pbkdf2::pbkdf2_hmac::<Sha512>(password, salt, iterations, &mut out);
                out.to_vec()
            }
        }
    }
}

/// Hashes `password` with the default parameters.
pub fn generate_password_hash(password: &str) -> String {
    generate_password_hash_with(password, HashDigest::Sha256, DEFAULT_HASH_ITERATIONS)
}

/// Hashes `password` with an explicit digest and iteration count.
pub fn generate_password_hash_with(password: &str, digest: HashDigest, iterations: u32) -> String {
    let salt: String = OsRng
        .sample_iter(&Alphanumeric)
        .take(HASH_SALT_LENGTH)
        .map(char::from)
        .collect();
    let hash = digest.derive(password.as_bytes(), salt.as_bytes(), iterations);

    format!(
        "{METHOD_PREFIX}:{}:{iterations}${salt}${}",
        digest.name(),
        hex::encode(hash)
    )
}

/// Checks `password` against a stored hash.
///
/// Returns `Ok(false)` on mismatch and an error only if the stored hash
/// itself is unusable.
pub fn check_password_hash(stored: &str, password: &str) -> Result<bool> {
    let mut parts = stored.splitn(3, '$');
    let (method, salt, expected) = match (parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(s), Some(h)) => (m, s, h),
        _ => {
            return Err(ProtocolError::InvalidPasswordHash(
                "expected method$salt$hash".to_string(),
            ))
        }
    };

    let (digest, iterations) = parse_method(method)?;
    let actual = hex::encode(digest.derive(password.as_bytes(), salt.as_bytes(), iterations));

    Ok(actual.as_bytes().ct_eq(expected.as_bytes()).into())
}

fn parse_method(method: &str) -> Result<(HashDigest, u32)> {
    let fields: Vec<&str> = method.split(':').collect();
    if fields[0] != METHOD_PREFIX {
        return Err(ProtocolError::UnsupportedHashMethod {
            method: fields[0].to_string(),
        });
    }

    let digest_name = fields.get(1).copied().unwrap_or("sha256");
    let digest = HashDigest::parse(digest_name).ok_or_else(|| {
        ProtocolError::UnsupportedHashMethod {
            method: format!("{METHOD_PREFIX}:{digest_name}"),
        }
    })?;

    let iterations = match fields.get(2) {
        Some(raw) => raw.parse::<u32>().map_err(|_| {
            ProtocolError::InvalidPasswordHash(format!("bad iteration count: {raw}"))
        })?,
        None => DEFAULT_HASH_ITERATIONS,
    };
    if iterations == 0 {
        return Err(ProtocolError::InvalidPasswordHash(
            "iteration count must be positive".to_string(),
        ));
    }

    Ok((digest, iterations))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low iteration counts keep the tests fast; verification reads the count
    // back from the stored string.
    fn quick_hash(password: &str) -> String {
        generate_password_hash_with(password, HashDigest::Sha256, 10)
    }

    #[test]
    fn test_hash_layout() {
        let hash = quick_hash("secret");
        let parts: Vec<&str> = hash.split('$').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "pbkdf2:sha256:10");
        assert_eq!(parts[1].len(), HASH_SALT_LENGTH);
        assert!(parts[1].chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(parts[2].len(), 64);
    }

    #[test]
    fn test_verify_correct_and_wrong_password() {
        let hash = quick_hash("secret");
        assert!(check_password_hash(&hash, "secret").unwrap());
        assert!(!check_password_hash(&hash, "Secret").unwrap());
        assert!(!check_password_hash(&hash, "").unwrap());
    }

    #[test]
    fn test_salts_differ_between_hashes() {
        assert_ne!(quick_hash("same"), quick_hash("same"));
    }

    #[test]
    fn test_sha512_hashes_verify() {
        let hash = generate_password_hash_with("pw", HashDigest::Sha512, 5);
        assert!(hash.starts_with("pbkdf2:sha512:5$"));
        assert!(check_password_hash(&hash, "pw").unwrap());
    }

    #[test]
    fn test_known_hash_verifies() {
        // pbkdf2-hmac-sha256("password", "salt", 1)
        let stored =
            "pbkdf2:sha256:1$salt$120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b";
        assert!(check_password_hash(stored, "password").unwrap());
    }

    #[test]
    fn test_malformed_hash_is_error() {
        assert!(matches!(
            check_password_hash("no-dollars-here", "x"),
            Err(ProtocolError::InvalidPasswordHash(_))
        ));
        assert!(matches!(
            check_password_hash("pbkdf2:sha256:abc$salt$00", "x"),
            Err(ProtocolError::InvalidPasswordHash(_))
        ));
    }

    #[test]
    fn test_unsupported_method_is_error() {
        assert!(matches!(
            check_password_hash("scrypt:32768:8:1$salt$00", "x"),
            Err(ProtocolError::UnsupportedHashMethod { .. })
        ));
        assert!(matches!(
            check_password_hash("pbkdf2:md5:10$salt$00", "x"),
            Err(ProtocolError::UnsupportedHashMethod { .. })
        ));
    }
}
