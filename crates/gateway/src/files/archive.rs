//! On-demand ZIP assembly for downloads.
//!
//! Archives are built fully in memory before anything is returned. Entry
//! names are always relative to the volume root, whatever was selected, so
//! the layout mirrors the volume. Entry order follows the directory walk.
//!
//! Files carrying the encrypted suffix are decrypted on the way in when a
//! passphrase is available and stored under their de-suffixed name. A member
//! that cannot be read or decrypted is logged and left out; it never aborts
//! the archive.

use std::collections::HashSet;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use protocol::crypto::{decrypt_bytes, Passphrase};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::error::{FileError, FileResult};
use super::resolver::{PathResolver, ResolvedPath};

/// MIME type for raw single-file downloads.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// MIME type for ZIP downloads.
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

/// What a download turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
    /// A single file, served as-is (or decrypted).
    File,
    /// A ZIP of one selected directory.
    Directory,
    /// A ZIP of several selected items.
    Selection,
    /// A ZIP of the whole volume.
    Volume,
}

/// A finished download.
#[derive(Debug, Clone)]
pub struct Download {
    kind: DownloadKind,
    name: String,
    bytes: Vec<u8>,
}

impl Download {
    pub fn kind(&self) -> DownloadKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Attachment filename shown to the principal.
    pub fn attachment_name(&self, principal_id: &str) -> String {
        match self.kind {
            DownloadKind::File => self.name.clone(),
            DownloadKind::Directory => format!("{principal_id}-{}.zip", self.name),
            DownloadKind::Selection => format!("{principal_id}-selected.zip"),
            DownloadKind::Volume => format!("{principal_id}-all.zip"),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self.kind {
            DownloadKind::File => OCTET_STREAM,
            _ => ZIP_CONTENT_TYPE,
        }
    }
}

/// Builds downloads from resolved paths.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    resolver: PathResolver,
    encrypted_suffix: String,
    passphrase: Option<Passphrase>,
}

impl ArchiveBuilder {
    /// Create a builder. Without a passphrase, encrypted files are archived
    /// verbatim under their stored names.
    pub fn new(resolver: PathResolver, encrypted_suffix: impl Into<String>) -> Self {
        Self {
            resolver,
            encrypted_suffix: encrypted_suffix.into(),
            passphrase: None,
        }
    }

    /// Set the passphrase used to decrypt encrypted members.
    pub fn with_passphrase(mut self, passphrase: Option<Passphrase>) -> Self {
        self.passphrase = passphrase;
        self
    }

    /// ZIP of the whole volume, with an entry for every directory so empty
    /// ones survive extraction.
    pub fn build_whole_volume(&self) -> FileResult<Download> {
        let mut zip = ZipAssembler::new();
        self.add_tree(&mut zip, self.resolver.root(), true)?;

        tracing::info!(entries = zip.len(), "Built volume archive");
        Ok(Download {
            kind: DownloadKind::Volume,
            name: String::new(),
            bytes: zip.finish()?,
        })
    }

    /// Download for a selection, special-cased by cardinality.
    ///
    /// - nothing selected: `NoSelection`
    /// - one file: its bytes, decrypted if encrypted
    /// - one directory: a ZIP of its files
    /// - several items: one ZIP of every selected file and every file below
    ///   each selected directory
    pub fn build_selection(&self, selected: &[ResolvedPath]) -> FileResult<Download> {
        match selected {
            [] => Err(FileError::NoSelection),
            [single] if single.is_file() => self.single_file(single),
            [single] if single.is_dir() => {
                let mut zip = ZipAssembler::new();
                self.add_tree(&mut zip, single.path(), false)?;

                let name = single
                    .file_name()
                    .or_else(|| {
                        self.resolver
                            .root()
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                    })
                    .unwrap_or_else(|| "volume".to_string());

                tracing::info!(
                    dir = single.relative(),
                    entries = zip.len(),
                    "Built directory archive"
                );
                Ok(Download {
                    kind: DownloadKind::Directory,
                    name,
                    bytes: zip.finish()?,
                })
            }
            [single] => Err(FileError::InvalidPayload(format!(
                "Selected path is neither a file nor a directory: {}",
                single.relative()
            ))),
            many => {
                let mut zip = ZipAssembler::new();
                for item in many {
                    if item.is_file() {
                        self.add_member(&mut zip, item.path(), item.relative())?;
                    } else if item.is_dir() {
                        self.add_tree(&mut zip, item.path(), false)?;
                    } else {
                        tracing::warn!(
                            path = item.relative(),
                            "Skipping selected item that is neither file nor directory"
                        );
                    }
                }

                tracing::info!(items = many.len(), entries = zip.len(), "Built selection archive");
                Ok(Download {
                    kind: DownloadKind::Selection,
                    name: String::new(),
                    bytes: zip.finish()?,
                })
            }
        }
    }

    fn single_file(&self, file: &ResolvedPath) -> FileResult<Download> {
        let bytes = fs::read(file.path())?;
        let name = file.file_name().unwrap_or_default();

        let (name, bytes) = match self.decryptable_name(&name) {
            Some((plain_name, passphrase)) => {
                let plain = decrypt_bytes(&bytes, passphrase).map_err(|source| {
                    FileError::Decryption {
                        path: file.relative().to_string(),
                        source,
                    }
                })?;
                (plain_name.to_string(), plain)
            }
            None => (name, bytes),
        };

        Ok(Download {
            kind: DownloadKind::File,
            name,
            bytes,
        })
    }

    /// Walk `dir`, adding every file (and, if asked, every directory).
    ///
    /// Symlinks are only archived when they point at a file inside the
    /// volume.
    fn add_tree(
        &self,
        zip: &mut ZipAssembler,
        dir: &Path,
        with_directories: bool,
    ) -> FileResult<()> {
        for entry in WalkDir::new(dir).min_depth(1) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable entry while archiving");
                    continue;
                }
            };
            let Some(relative) = self.resolver.relative_of(entry.path()) else {
                continue;
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                if with_directories {
                    zip.add_directory(&relative)?;
                }
            } else if file_type.is_file() {
                self.add_member(zip, entry.path(), &relative)?;
            } else if file_type.is_symlink() {
                let target_inside = fs::canonicalize(entry.path())
                    .ok()
                    .filter(|target| target.is_file())
                    .and_then(|target| self.resolver.relative_of(&target));
                match target_inside {
                    Some(_) => self.add_member(zip, entry.path(), &relative)?,
                    None => tracing::warn!(path = %relative, "Skipping symlink leaving the volume"),
                }
            }
        }
        Ok(())
    }

    /// Add one file. Read and decryption failures skip the member; only ZIP
    /// write failures propagate.
    fn add_member(&self, zip: &mut ZipAssembler, path: &Path, relative: &str) -> FileResult<()> {
        match self.load_member(path, relative) {
            Ok((name, bytes)) => {
                zip.add_file(name, &bytes)?;
            }
            Err(e) => {
                tracing::warn!(path = relative, error = %e, "Skipping archive member");
            }
        }
        Ok(())
    }

    fn load_member(&self, path: &Path, relative: &str) -> FileResult<(String, Vec<u8>)> {
        let bytes = fs::read(path)?;

        match self.decryptable_name(relative) {
            Some((plain_name, passphrase)) => {
                let plain = decrypt_bytes(&bytes, passphrase).map_err(|source| {
                    FileError::Decryption {
                        path: relative.to_string(),
                        source,
                    }
                })?;
                Ok((plain_name.to_string(), plain))
            }
            None => Ok((relative.to_string(), bytes)),
        }
    }

    /// If `name` is an encrypted file and a passphrase is set, the name
    /// without the suffix.
    fn decryptable_name<'a>(&'a self, name: &'a str) -> Option<(&'a str, &'a Passphrase)> {
        let passphrase = self.passphrase.as_ref()?;
        let stripped = name.strip_suffix(self.encrypted_suffix.as_str())?;
        if stripped.is_empty() || stripped.ends_with('/') {
            return None;
        }
        Some((stripped, passphrase))
    }
}

/// In-memory ZIP writer that drops duplicate entry names.
struct ZipAssembler {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    seen: HashSet<String>,
    options: SimpleFileOptions,
}

impl ZipAssembler {
    fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            seen: HashSet::new(),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        }
    }

    fn len(&self) -> usize {
        self.seen.len()
    }

    fn add_directory(&mut self, relative: &str) -> FileResult<()> {
        let name = format!("{relative}/");
        if self.seen.insert(name.clone()) {
            self.writer.add_directory(name, self.options)?;
        }
        Ok(())
    }

    fn add_file(&mut self, name: String, bytes: &[u8]) -> FileResult<()> {
        if !self.seen.insert(name.clone()) {
            tracing::debug!(name = %name, "Skipping duplicate archive entry");
            return Ok(());
        }

        let options = self
            .options
            .large_file(bytes.len() as u64 >= u64::from(u32::MAX));
        self.writer.start_file(name.as_str(), options)?;
        self.writer.write_all(bytes)?;
        tracing::debug!(name = %name, size = bytes.len(), "Added to archive");
        Ok(())
    }

    fn finish(self) -> FileResult<Vec<u8>> {
        Ok(self.writer.finish()?.into_inner())
    }
}
