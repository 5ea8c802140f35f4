//! Single-user credential store.
//!
//! The record lives as JSON at `<data_dir>/credentials.json`:
//!
//! ```json
//! {
//!   "username": "admin",
//!   "password": "pbkdf2:sha256:600000$...$...",
//!   "secret_key": "9f2c...",
//!   "passphrase_hash": "pbkdf2:sha256:600000$...$..."
//! }
//! ```
//!
//! Only hashes are stored. The encryption passphrase is checked against its
//! own hash and is never written anywhere.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use protocol::password::{
    check_password_hash, generate_password_hash_with, HashDigest, DEFAULT_HASH_ITERATIONS,
};
use protocol::{Passphrase, ProtocolError};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Random bytes behind the per-install secret key.
pub const SECRET_KEY_BYTES: usize = 24;

/// Errors raised by the credential store.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// `create` was called while a record already exists.
    #[error("Credentials already exist at {0}")]
    AlreadyExists(PathBuf),

    /// No record has been written yet.
    #[error("No credentials found at {0}; run setup first")]
    NotConfigured(PathBuf),

    #[error("Username cannot be empty.")]
    EmptyUsername,

    #[error("Password cannot be empty.")]
    EmptyPassword,

    /// Username or password did not match.
    #[error("Invalid username or password.")]
    InvalidLogin,

    #[error("Current password is incorrect.")]
    WrongPassword,

    /// The install was set up without an encryption passphrase.
    #[error("No encryption passphrase was configured.")]
    NoPassphrase,

    #[error("Incorrect passphrase.")]
    WrongPassphrase,

    #[error("Stored hash is unusable: {0}")]
    Hash(#[from] ProtocolError),

    #[error("Malformed credentials file: {0}")]
    Format(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Anything that can act on the volume.
///
/// Only the id is exposed; it names downloaded archives.
pub trait Principal {
    fn principal_id(&self) -> &str;
}

impl Principal for str {
    fn principal_id(&self) -> &str {
        self
    }
}

impl Principal for String {
    fn principal_id(&self) -> &str {
        self
    }
}

/// The logged-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    username: String,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl Principal for User {
    fn principal_id(&self) -> &str {
        &self.username
    }
}

/// Persisted credential record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialRecord {
    pub username: String,
    /// Login password hash.
    pub password: String,
    pub secret_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase_hash: Option<String>,
}

impl CredentialRecord {
    pub fn has_passphrase(&self) -> bool {
        self.passphrase_hash.is_some()
    }
}

/// File-backed store for the single credential record.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    hash_iterations: u32,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            hash_iterations: DEFAULT_HASH_ITERATIONS,
        }
    }

    /// Override the PBKDF2 iteration count for new hashes.
    ///
    /// Existing hashes keep verifying with the count embedded in them.
    pub fn with_hash_iterations(mut self, iterations: u32) -> Self {
        self.hash_iterations = iterations.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<CredentialRecord, CredentialError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CredentialError::NotConfigured(self.path.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write the first record. Fails if one already exists.
    pub fn create(
        &self,
        username: &str,
        password: &str,
        passphrase: Option<&Passphrase>,
    ) -> Result<CredentialRecord, CredentialError> {
        if self.exists() {
            return Err(CredentialError::AlreadyExists(self.path.clone()));
        }
        let username = username.trim();
        if username.is_empty() {
            return Err(CredentialError::EmptyUsername);
        }
        if password.is_empty() {
            return Err(CredentialError::EmptyPassword);
        }

        let mut secret = [0u8; SECRET_KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut secret);

        let record = CredentialRecord {
            username: username.to_string(),
            password: self.hash(password),
            secret_key: hex::encode(secret),
            passphrase_hash: passphrase.map(|p| self.hash(p.expose())),
        };
        self.save(&record)?;

        tracing::info!(
            username = %record.username,
            encrypted = record.has_passphrase(),
            "Credentials created"
        );
        Ok(record)
    }

    /// Check a login attempt and return the user on success.
    pub fn verify_login(&self, username: &str, password: &str) -> Result<User, CredentialError> {
        let record = self.load()?;
        if record.username != username || !check_password_hash(&record.password, password)? {
            tracing::warn!(username, "Failed login attempt");
            return Err(CredentialError::InvalidLogin);
        }
        Ok(User::new(record.username))
    }

    /// Confirm the encryption passphrase typed at startup.
    pub fn verify_passphrase(&self, passphrase: &Passphrase) -> Result<(), CredentialError> {
        let record = self.load()?;
        let hash = record
            .passphrase_hash
            .as_deref()
            .ok_or(CredentialError::NoPassphrase)?;
        if !check_password_hash(hash, passphrase.expose())? {
            return Err(CredentialError::WrongPassphrase);
        }
        Ok(())
    }

    pub fn change_password(&self, current: &str, new: &str) -> Result<(), CredentialError> {
        if new.is_empty() {
            return Err(CredentialError::EmptyPassword);
        }
        let mut record = self.load()?;
        if !check_password_hash(&record.password, current)? {
            return Err(CredentialError::WrongPassword);
        }

        record.password = self.hash(new);
        self.save(&record)?;

        tracing::info!(username = %record.username, "Password changed");
        Ok(())
    }

    fn hash(&self, secret: &str) -> String {
        generate_password_hash_with(secret, HashDigest::Sha256, self.hash_iterations)
    }

    fn save(&self, record: &CredentialRecord) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(record)?;
        let temp_path = self.path.with_extension("json.tmp");
        if let Err(e) = write_private(&temp_path, contents.as_bytes()) {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                tracing::debug!(error = %cleanup, "Failed to remove temp file after write error");
            }
            return Err(e.into());
        }
        fs::rename(&temp_path, &self.path)?;

        tracing::debug!(path = %self.path.display(), "Saved credentials");
        Ok(())
    }
}

fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> CredentialStore {
        CredentialStore::new(temp.path().join("data/credentials.json")).with_hash_iterations(10)
    }

    #[test]
    fn test_create_and_load() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        assert!(!store.exists());

        let created = store.create("admin", "hunter2", None).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(created, loaded);
        assert_eq!(loaded.username, "admin");
        assert_ne!(loaded.password, "hunter2");
        assert!(loaded.password.starts_with("pbkdf2:sha256:10$"));
        assert_eq!(loaded.secret_key.len(), SECRET_KEY_BYTES * 2);
        assert!(!loaded.has_passphrase());
    }

    #[test]
    fn test_create_refuses_overwrite() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.create("admin", "pw", None).unwrap();

        assert!(matches!(
            store.create("other", "pw", None),
            Err(CredentialError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_create_rejects_blank_fields() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        assert!(matches!(
            store.create("  ", "pw", None),
            Err(CredentialError::EmptyUsername)
        ));
        assert!(matches!(
            store.create("admin", "", None),
            Err(CredentialError::EmptyPassword)
        ));
        assert!(!store.exists());
    }

    #[test]
    fn test_failed_write_leaves_no_record() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        // A directory in the temp file's place makes the write fail.
        fs::create_dir_all(temp.path().join("data/credentials.json.tmp")).unwrap();

        assert!(matches!(
            store.create("admin", "pw", None),
            Err(CredentialError::Io(_))
        ));
        assert!(!store.exists());
        assert!(temp.path().join("data/credentials.json.tmp").is_dir());
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            store(&temp).load(),
            Err(CredentialError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_verify_login() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.create("admin", "hunter2", None).unwrap();

        let user = store.verify_login("admin", "hunter2").unwrap();
        assert_eq!(user.principal_id(), "admin");

        assert!(matches!(
            store.verify_login("admin", "wrong"),
            Err(CredentialError::InvalidLogin)
        ));
        assert!(matches!(
            store.verify_login("root", "hunter2"),
            Err(CredentialError::InvalidLogin)
        ));
    }

    #[test]
    fn test_passphrase_hash_is_separate_from_password() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let passphrase = Passphrase::new("same-secret").unwrap();
        let record = store.create("admin", "same-secret", Some(&passphrase)).unwrap();

        let passphrase_hash = record.passphrase_hash.unwrap();
        assert_ne!(passphrase_hash, record.password);

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("same-secret"));

        store.verify_passphrase(&passphrase).unwrap();
        assert!(matches!(
            store.verify_passphrase(&Passphrase::new("other").unwrap()),
            Err(CredentialError::WrongPassphrase)
        ));
    }

    #[test]
    fn test_verify_passphrase_without_one_configured() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.create("admin", "pw", None).unwrap();

        assert!(matches!(
            store.verify_passphrase(&Passphrase::new("x").unwrap()),
            Err(CredentialError::NoPassphrase)
        ));
    }

    #[test]
    fn test_change_password() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let before = store.create("admin", "old", None).unwrap();

        assert!(matches!(
            store.change_password("nope", "new"),
            Err(CredentialError::WrongPassword)
        ));

        store.change_password("old", "new").unwrap();
        let after = store.load().unwrap();

        assert_eq!(after.secret_key, before.secret_key);
        assert!(store.verify_login("admin", "new").is_ok());
        assert!(store.verify_login("admin", "old").is_err());
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_reads_default_iteration_hashes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("credentials.json");
        let record = CredentialRecord {
            username: "admin".to_string(),
            password: generate_password_hash_with("pw", HashDigest::Sha256, 50),
            secret_key: "00".repeat(SECRET_KEY_BYTES),
            passphrase_hash: None,
        };
        fs::write(&path, serde_json::to_string(&record).unwrap()).unwrap();

        let store = CredentialStore::new(&path);
        assert!(store.verify_login("admin", "pw").is_ok());
    }

    #[test]
    #[cfg(unix)]
    fn test_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.create("admin", "pw", None).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
