//! Sandboxed file operations on the volume.
//!
//! This module provides:
//! - Path resolution that keeps every operation inside the volume root
//! - Directory listing and recursive search
//! - Batch move and delete with per-item results
//! - Folder, file and upload creation
//! - Text read and atomic overwrite for the editor
//! - Zip and single-file downloads, with optional `.enc` decryption
//!
//! # Security
//!
//! Every client-supplied path goes through [`PathResolver`]. Paths are
//! canonicalized and must stay under the root; anything else is rejected
//! with [`FileError::PathEscape`] before the filesystem is touched.

pub mod archive;
pub mod editor;
pub mod error;
pub mod index;
pub mod resolver;
pub mod transfer;

pub use archive::{ArchiveBuilder, Download, DownloadKind};
pub use editor::TextEditor;
pub use error::{FileError, FileErrorKind, FileResult};
pub use index::DirectoryIndex;
pub use resolver::{sanitize_filename, sanitize_relative_segments, PathResolver, ResolvedPath};
pub use transfer::{BatchStatus, ItemFailure, TransferCoordinator, TransferOutcome};
