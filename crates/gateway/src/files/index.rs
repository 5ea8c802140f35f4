//! Directory listing and recursive search.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use protocol::messages::{BreadcrumbSegment, DirectoryListing, FileEntry};
use walkdir::WalkDir;

use super::error::{FileError, FileResult};
use super::resolver::{join_relative, PathResolver, ResolvedPath};

/// Display name of the synthetic first breadcrumb segment.
pub const ROOT_SEGMENT: &str = "Root";

/// Lists and searches the volume.
///
/// Entries are computed fresh on every call; nothing is cached. Symlinks are
/// classified by what they point at. Dangling links and links whose target
/// lies outside the volume are left out.
#[derive(Debug, Clone)]
pub struct DirectoryIndex {
    resolver: PathResolver,
}

impl DirectoryIndex {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// List the immediate children of a directory.
    ///
    /// Directory names are sorted in byte order, files by case-insensitive
    /// name.
    pub fn list(&self, dir: &ResolvedPath) -> FileResult<DirectoryListing> {
        if !dir.exists() {
            return Err(FileError::NotFound(dir.relative().to_string()));
        }
        if !dir.is_dir() {
            return Err(FileError::NotADirectory(dir.relative().to_string()));
        }

        let mut directories = Vec::new();
        let mut files = Vec::new();

        for entry_result in fs::read_dir(dir.path())? {
            let entry = match entry_result {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(dir = dir.relative(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(metadata) = self.entry_metadata(&entry.path(), &name) else {
                continue;
            };

            if metadata.is_dir() {
                directories.push(name);
            } else if metadata.is_file() {
                let path = join_relative(dir.relative(), &name);
                files.push(file_entry(name, path, &metadata));
            }
        }

        directories.sort();
        files.sort_by_key(|f| f.name.to_lowercase());

        Ok(DirectoryListing {
            directories,
            files,
            breadcrumb: breadcrumb(dir.relative()),
        })
    }

    /// Case-insensitive substring search over every name in the volume.
    ///
    /// Directories are reported by relative path. Results follow walk order.
    /// Entries that cannot be read are logged and skipped; the walk carries
    /// on with the rest of the tree.
    pub fn search(&self, query: &str) -> FileResult<DirectoryListing> {
        if query.is_empty() {
            return Err(FileError::InvalidQuery("Query cannot be empty.".to_string()));
        }

        let needle = query.to_lowercase();
        let mut directories = Vec::new();
        let mut files = Vec::new();

        for entry in WalkDir::new(self.resolver.root()).min_depth(1) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable entry during search");
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.to_lowercase().contains(&needle) {
                continue;
            }

            let Some(relative) = self.resolver.relative_of(entry.path()) else {
                continue;
            };
            let Some(metadata) = self.entry_metadata(entry.path(), &relative) else {
                continue;
            };

            if metadata.is_dir() {
                directories.push(relative);
            } else if metadata.is_file() {
                files.push(file_entry(name, relative, &metadata));
            }
        }

        tracing::debug!(
            query,
            directories = directories.len(),
            files = files.len(),
            "Search finished"
        );

        Ok(DirectoryListing {
            directories,
            files,
            breadcrumb: vec![
                BreadcrumbSegment::new(ROOT_SEGMENT, ""),
                BreadcrumbSegment::new(format!("Search Results for '{needle}'"), ""),
            ],
        })
    }

    /// Metadata of the entry's target, or `None` when it should stay hidden.
    fn entry_metadata(&self, path: &Path, label: &str) -> Option<fs::Metadata> {
        let is_link = fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        if is_link {
            let inside = fs::canonicalize(path)
                .ok()
                .and_then(|target| self.resolver.relative_of(&target));
            if inside.is_none() {
                tracing::debug!(entry = label, "Hiding symlink leaving the volume");
                return None;
            }
        }

        match fs::metadata(path) {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::debug!(entry = label, error = %e, "Skipping entry without metadata");
                None
            }
        }
    }
}

/// Build the breadcrumb trail for a `/`-separated relative path.
pub fn breadcrumb(relative: &str) -> Vec<BreadcrumbSegment> {
    let mut trail = vec![BreadcrumbSegment::new(ROOT_SEGMENT, "")];
    let mut current = String::new();

    for part in relative.split('/').filter(|p| !p.is_empty()) {
        current = join_relative(&current, part);
        trail.push(BreadcrumbSegment::new(part, current.clone()));
    }

    trail
}

fn file_entry(name: String, path: String, metadata: &fs::Metadata) -> FileEntry {
    let last_modified = metadata
        .modified()
        .unwrap_or(SystemTime::UNIX_EPOCH)
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    FileEntry {
        name,
        size: metadata.len(),
        last_modified,
        path,
    }
}
