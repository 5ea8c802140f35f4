//! Move, delete, create and upload operations.
//!
//! Batch operations (move and delete) never stop at a failing item; every
//! item ends up in either the success or the failure list of a
//! [`TransferOutcome`]. Create and upload surface their first error.
//!
//! There is no locking. Two overlapping calls race at the OS level.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};

use protocol::messages::UploadedFile;

use super::error::{FileError, FileResult};
use super::resolver::{
    join_relative, sanitize_filename, sanitize_relative_segments, PathResolver, ResolvedPath,
};

/// Overall shape of a batch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every item succeeded.
    Complete,
    /// Some items failed.
    Partial,
    /// Every item failed.
    Failed,
}

/// A single failed item.
#[derive(Debug)]
pub struct ItemFailure {
    path: String,
    error: FileError,
}

impl ItemFailure {
    /// The path as the client supplied it.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn error(&self) -> &FileError {
        &self.error
    }
}

/// Per-item results of a batch operation.
#[derive(Debug, Default)]
pub struct TransferOutcome {
    succeeded: Vec<String>,
    failed: Vec<ItemFailure>,
}

impl TransferOutcome {
    pub fn succeeded(&self) -> &[String] {
        &self.succeeded
    }

    pub fn failed(&self) -> &[ItemFailure] {
        &self.failed
    }

    pub fn status(&self) -> BatchStatus {
        if self.failed.is_empty() {
            BatchStatus::Complete
        } else if self.succeeded.is_empty() {
            BatchStatus::Failed
        } else {
            BatchStatus::Partial
        }
    }

    fn record(&mut self, path: &str, result: FileResult<()>) {
        match result {
            Ok(()) => self.succeeded.push(path.to_string()),
            Err(error) => self.failed.push(ItemFailure {
                path: path.to_string(),
                error,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum NewEntry {
    Folder,
    File,
}

impl NewEntry {
    fn label(self) -> &'static str {
        match self {
            Self::Folder => "Folder",
            Self::File => "File",
        }
    }
}

/// Executes mutations on the volume.
#[derive(Debug, Clone)]
pub struct TransferCoordinator {
    resolver: PathResolver,
    max_upload_size: u64,
}

impl TransferCoordinator {
    /// Create a coordinator with no upload size cap.
    pub fn new(resolver: PathResolver) -> Self {
        Self {
            resolver,
            max_upload_size: u64::MAX,
        }
    }

    /// Set the maximum total upload payload in bytes.
    pub fn with_max_upload_size(mut self, limit: u64) -> Self {
        self.max_upload_size = limit;
        self
    }

    /// Move each source into `destination` (empty means the volume root).
    ///
    /// The destination must be an existing directory. Every source is
    /// resolved before anything moves, so a path escaping the volume rejects
    /// the whole call. Other problems fail only their own item.
    pub fn move_items(&self, sources: &[String], destination: &str) -> FileResult<TransferOutcome> {
        if sources.is_empty() {
            return Err(FileError::InvalidPayload("No source paths provided.".to_string()));
        }

        let dest = self.existing_dir(destination)?;

        let resolved = self.resolve_batch(sources)?;
        let mut outcome = TransferOutcome::default();

        for (source, result) in sources.iter().zip(resolved) {
            let result = result.and_then(|src| self.move_one(source, &src, &dest));
            if let Err(e) = &result {
                tracing::warn!(source = %source, destination, error = %e, "Move failed");
            }
            outcome.record(source, result);
        }

        tracing::info!(
            moved = outcome.succeeded().len(),
            failed = outcome.failed().len(),
            destination,
            "Moved items"
        );
        Ok(outcome)
    }

    fn move_one(&self, source: &str, src: &ResolvedPath, dest: &ResolvedPath) -> FileResult<()> {
        if !src.exists() {
            return Err(FileError::NotFound(source.to_string()));
        }
        let name = src
            .path()
            .file_name()
            .filter(|_| !src.is_root())
            .ok_or_else(|| FileError::InvalidPath(source.to_string()))?;

        let target = dest.path().join(name);
        if target == src.path() {
            return Err(FileError::AlreadyExists(source.to_string()));
        }
        if target.starts_with(src.path()) {
            return Err(FileError::SelfMove(source.to_string()));
        }
        if fs::symlink_metadata(&target).is_ok() {
            return Err(FileError::AlreadyExists(source.to_string()));
        }

        fs::rename(src.path(), &target)?;
        tracing::debug!(source, target = %target.display(), "Moved item");
        Ok(())
    }

    /// Delete each path. Directories are removed recursively; a symlink is
    /// removed itself, never its target.
    ///
    /// Like [`move_items`](Self::move_items), an escaping path rejects the
    /// whole call before anything is removed.
    pub fn delete(&self, paths: &[String]) -> FileResult<TransferOutcome> {
        if paths.is_empty() {
            return Err(FileError::InvalidPayload(
                "No paths provided for deletion.".to_string(),
            ));
        }

        let resolved = self.resolve_batch(paths)?;
        let mut outcome = TransferOutcome::default();

        for (path, result) in paths.iter().zip(resolved) {
            let result = result.and_then(|target| delete_one(path, &target));
            match &result {
                Ok(()) => tracing::info!(path = %path, "Deleted item"),
                Err(e) => tracing::warn!(path = %path, error = %e, "Delete failed"),
            }
            outcome.record(path, result);
        }

        Ok(outcome)
    }

    /// Create an empty directory named `name` inside `parent`.
    pub fn create_folder(&self, parent: &str, name: &str) -> FileResult<ResolvedPath> {
        let target = self.new_entry_target(parent, name, NewEntry::Folder)?;

        fs::create_dir(target.path()).map_err(|e| already_exists_or(e, &target))?;
        tracing::info!(path = target.relative(), "Created folder");
        Ok(target)
    }

    /// Create an empty file named `name` inside `parent`.
    pub fn create_file(&self, parent: &str, name: &str) -> FileResult<ResolvedPath> {
        let target = self.new_entry_target(parent, name, NewEntry::File)?;

        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(target.path())
            .map_err(|e| already_exists_or(e, &target))?;
        tracing::info!(path = target.relative(), "Created file");
        Ok(target)
    }

    fn new_entry_target(
        &self,
        parent: &str,
        name: &str,
        kind: NewEntry,
    ) -> FileResult<ResolvedPath> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FileError::InvalidPayload(format!(
                "{} name cannot be empty.",
                kind.label()
            )));
        }
        let clean = sanitize_filename(name);
        if clean.is_empty() {
            return Err(FileError::InvalidPath(name.to_string()));
        }

        let dir = self.existing_dir(parent.trim())?;
        let target = self.resolver.join(&dir, &clean)?;
        if target.exists() {
            return Err(FileError::AlreadyExists(target.relative().to_string()));
        }
        Ok(target)
    }

    /// Write uploaded files below `target_dir`, creating intermediate
    /// directories from each supplied relative name.
    ///
    /// Files with an empty name are skipped. The first name collision stops
    /// the whole batch; files written before it stay on disk. Returns the
    /// relative paths written.
    pub fn upload(&self, target_dir: &str, files: &[UploadedFile]) -> FileResult<Vec<String>> {
        let dir = self.existing_dir(target_dir.trim())?;

        if files.is_empty() {
            return Err(FileError::InvalidPayload("No files uploaded.".to_string()));
        }
        let size: u64 = files.iter().map(|f| f.content.len() as u64).sum();
        if size > self.max_upload_size {
            return Err(FileError::PayloadTooLarge {
                size,
                limit: self.max_upload_size,
            });
        }

        let mut written = Vec::with_capacity(files.len());
        for file in files {
            if file.filename.is_empty() {
                tracing::warn!("Skipping upload with an empty filename");
                continue;
            }

            let relative = sanitize_relative_segments(&file.filename)?;
            let target = self.resolver.resolve(&join_relative(dir.relative(), &relative))?;
            if let Some(parent) = target.path().parent() {
                fs::create_dir_all(parent)?;
            }

            // Intermediate directories exist now; check containment again.
            let target = self.resolver.resolve(target.relative())?;
            if target.exists() {
                tracing::warn!(path = target.relative(), "Upload target exists, aborting batch");
                return Err(FileError::AlreadyExists(target.relative().to_string()));
            }

            let mut out = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(target.path())
                .map_err(|e| already_exists_or(e, &target))?;
            out.write_all(&file.content)?;

            tracing::info!(path = target.relative(), size = file.content.len(), "Uploaded file");
            written.push(target.relative().to_string());
        }

        Ok(written)
    }

    fn existing_dir(&self, candidate: &str) -> FileResult<ResolvedPath> {
        let dir = self.resolver.resolve(candidate)?;
        if !dir.is_dir() {
            return Err(FileError::NotADirectory(candidate.to_string()));
        }
        Ok(dir)
    }

    /// Resolve every path up front. A path escape anywhere aborts; other
    /// resolution errors stay attached to their item.
    ///
    /// The final component is not followed, so a symlink operand names the
    /// link rather than its target.
    fn resolve_batch(&self, paths: &[String]) -> FileResult<Vec<FileResult<ResolvedPath>>> {
        let resolved: Vec<_> = paths.iter().map(|p| self.resolver.resolve_entry(p)).collect();
        if let Some(Err(FileError::PathEscape(p))) = resolved
            .iter()
            .find(|r| matches!(r, Err(FileError::PathEscape(_))))
        {
            return Err(FileError::PathEscape(p.clone()));
        }
        Ok(resolved)
    }
}

fn delete_one(path: &str, target: &ResolvedPath) -> FileResult<()> {
    if target.is_root() {
        return Err(FileError::InvalidPath(
            "the volume root cannot be deleted".to_string(),
        ));
    }
    let metadata = fs::symlink_metadata(target.path())
        .map_err(|_| FileError::NotFound(path.to_string()))?;

    if metadata.is_dir() {
        fs::remove_dir_all(target.path())?;
    } else {
        fs::remove_file(target.path())?;
    }
    Ok(())
}

fn already_exists_or(err: io::Error, target: &ResolvedPath) -> FileError {
    if err.kind() == io::ErrorKind::AlreadyExists {
        FileError::AlreadyExists(target.relative().to_string())
    } else {
        FileError::Io(err)
    }
}
