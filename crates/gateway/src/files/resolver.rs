//! Path resolution against the volume root.
//!
//! Every client-supplied path passes through [`PathResolver`] before any
//! filesystem access. Two tiers of validation apply:
//!
//! - [`PathResolver::resolve`] joins a relative path onto the root,
//!   canonicalizes it and checks containment component-wise.
//! - [`sanitize_relative_segments`] cleans multi-segment names supplied by
//!   uploads before they are ever joined, so traversal cannot be smuggled
//!   through intermediate directory creation.
//!
//! Containment is checked once per call. A concurrent actor swapping a
//! directory for a symlink between the check and the use is not detected.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::error::{FileError, FileResult};

/// A path proven to lie inside the volume root.
///
/// Only [`PathResolver`] constructs these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    absolute: PathBuf,
    relative: String,
}

impl ResolvedPath {
    /// Canonical absolute path on the host.
    pub fn path(&self) -> &Path {
        &self.absolute
    }

    /// `/`-separated path relative to the root; empty for the root itself.
    pub fn relative(&self) -> &str {
        &self.relative
    }

    /// Whether this is the volume root.
    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }

    /// Final component name, or `None` for the root.
    pub fn file_name(&self) -> Option<String> {
        if self.is_root() {
            return None;
        }
        self.absolute
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }

    pub fn exists(&self) -> bool {
        fs::symlink_metadata(&self.absolute).is_ok()
    }

    pub fn is_file(&self) -> bool {
        self.absolute.is_file()
    }

    pub fn is_dir(&self) -> bool {
        self.absolute.is_dir()
    }
}

/// Validates client paths against a canonical volume root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Create a resolver for `root`, which must be an existing directory.
    pub fn new(root: impl AsRef<Path>) -> FileResult<Self> {
        let root = root.as_ref();
        let canonical = fs::canonicalize(root).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                FileError::NotFound(root.display().to_string())
            } else {
                FileError::Io(e)
            }
        })?;

        if !canonical.is_dir() {
            return Err(FileError::NotADirectory(root.display().to_string()));
        }

        Ok(Self { root: canonical })
    }

    /// The canonical volume root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The root as a [`ResolvedPath`].
    pub fn root_path(&self) -> ResolvedPath {
        ResolvedPath {
            absolute: self.root.clone(),
            relative: String::new(),
        }
    }

    /// Resolve a volume-relative candidate.
    ///
    /// The empty string resolves to the root. Candidates that are absolute
    /// or contain a `..` component are rejected before touching the
    /// filesystem. Paths that do not exist yet resolve through their deepest
    /// existing ancestor, so creation targets can be checked too.
    pub fn resolve(&self, candidate: &str) -> FileResult<ResolvedPath> {
        let candidate_path = self.checked(candidate)?;

        let joined = self.root.join(candidate_path);
        let canonical = canonicalize_lenient(&joined).map_err(|e| match e.kind() {
            io::ErrorKind::NotADirectory => FileError::NotFound(candidate.to_string()),
            io::ErrorKind::InvalidInput => FileError::InvalidPath(candidate.to_string()),
            _ => FileError::Io(e),
        })?;

        match self.relative_of(&canonical) {
            Some(relative) => Ok(ResolvedPath {
                absolute: canonical,
                relative,
            }),
            None => Err(self.escape(candidate)),
        }
    }

    /// Resolve a candidate without following its final component.
    ///
    /// The parent is canonicalized and checked like [`resolve`](Self::resolve);
    /// the last name is appended as is. A symlink therefore resolves to the
    /// link itself, which is what removing or renaming an entry must act on.
    pub fn resolve_entry(&self, candidate: &str) -> FileResult<ResolvedPath> {
        let candidate_path = self.checked(candidate)?;
        let name = match candidate_path.components().next_back() {
            Some(Component::Normal(name)) => name,
            _ => return self.resolve(candidate),
        };
        let parent = candidate_path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        let dir = self.resolve(&parent)?;
        let name = name.to_string_lossy();
        Ok(ResolvedPath {
            absolute: dir.path().join(name.as_ref()),
            relative: join_relative(dir.relative(), &name),
        })
    }

    /// Resolve a candidate that must already exist.
    pub fn resolve_existing(&self, candidate: &str) -> FileResult<ResolvedPath> {
        let resolved = self.resolve(candidate)?;
        if !resolved.exists() {
            return Err(FileError::NotFound(candidate.to_string()));
        }
        Ok(resolved)
    }

    /// Resolve `name` inside an already resolved directory.
    pub fn join(&self, dir: &ResolvedPath, name: &str) -> FileResult<ResolvedPath> {
        self.resolve(&join_relative(dir.relative(), name))
    }

    /// Express a host path as a `/`-separated path relative to the root.
    ///
    /// Returns `None` when the path is not inside the root.
    pub fn relative_of(&self, path: &Path) -> Option<String> {
        let stripped = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = stripped
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    /// Reject absolute candidates and any `..` component up front.
    fn checked<'a>(&self, candidate: &'a str) -> FileResult<&'a Path> {
        let candidate_path = Path::new(candidate);
        let escapes = candidate_path.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            return Err(self.escape(candidate));
        }
        Ok(candidate_path)
    }

    fn escape(&self, candidate: &str) -> FileError {
        tracing::warn!(candidate, "Rejected path outside the volume root");
        FileError::PathEscape(candidate.to_string())
    }
}

/// Canonicalize a path that may not exist yet.
///
/// The deepest existing ancestor is canonicalized and the missing trailing
/// components are appended unchanged.
fn canonicalize_lenient(path: &Path) -> io::Result<PathBuf> {
    let mut missing: Vec<OsString> = Vec::new();
    let mut current = path;

    loop {
        match fs::canonicalize(current) {
            Ok(mut base) => {
                base.extend(missing.iter().rev());
                return Ok(base);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                match (current.parent(), current.file_name()) {
                    (Some(parent), Some(name)) => {
                        missing.push(name.to_os_string());
                        current = parent;
                    }
                    _ => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Join two `/`-separated relative paths, treating empty as the root.
pub fn join_relative(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Reduce a single name to a safe filename.
///
/// Non-ASCII characters are dropped, whitespace runs become `_`, anything
/// outside `[A-Za-z0-9_.-]` is removed and leading or trailing `.`/`_` are
/// stripped. The result may be empty.
pub fn sanitize_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_ascii_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Sanitize a multi-segment relative name, such as an uploaded file's path.
///
/// Empty and `.` segments are dropped. Fails with `InvalidPath` if the
/// candidate is absolute, contains `..`, has a segment that sanitizes to
/// nothing, or ends up empty.
pub fn sanitize_relative_segments(candidate: &str) -> FileResult<String> {
    let invalid = || FileError::InvalidPath(candidate.to_string());

    if candidate.starts_with(['/', '\\']) || Path::new(candidate).has_root() {
        return Err(invalid());
    }

    let mut segments = Vec::new();
    for segment in candidate.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return Err(invalid()),
            _ => {}
        }
        let clean = sanitize_filename(segment);
        if clean.is_empty() {
            return Err(invalid());
        }
        segments.push(clean);
    }

    if segments.is_empty() {
        return Err(invalid());
    }
    Ok(segments.join("/"))
}
