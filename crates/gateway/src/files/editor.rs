//! Plain-text read and write for the in-browser editor.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use super::error::{FileError, FileResult};
use super::resolver::{PathResolver, ResolvedPath};

/// Reads and overwrites UTF-8 text files.
#[derive(Debug, Clone)]
pub struct TextEditor {
    resolver: PathResolver,
}

impl TextEditor {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// Read a file as UTF-8 text.
    pub fn read_text(&self, path: &str) -> FileResult<String> {
        let file = self.existing_file(path)?;
        let bytes = fs::read(file.path())?;

        String::from_utf8(bytes).map_err(|_| {
            tracing::warn!(path = file.relative(), "File is not valid UTF-8");
            FileError::InvalidPayload("File encoding not supported.".to_string())
        })
    }

    /// Replace the content of an existing file.
    ///
    /// The new content goes to a sibling temp file that is renamed over the
    /// original, so readers never see a half-written file.
    pub fn write_text(&self, path: &str, content: &str) -> FileResult<()> {
        let file = self.existing_file(path.trim())?;
        let target = file.path();
        let permissions = fs::metadata(target)?.permissions();

        let file_name = file.file_name().unwrap_or_default();
        let temp_path = target.with_file_name(format!(
            ".{file_name}.{:08x}.tmp",
            rand::random::<u32>()
        ));

        let write_result = write_then_rename(&temp_path, target, content, permissions);

        if let Err(e) = write_result {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                tracing::debug!(error = %cleanup, "Failed to remove temp file after write error");
            }
            return Err(FileError::Io(e));
        }

        tracing::info!(path = file.relative(), size = content.len(), "File saved");
        Ok(())
    }

    fn existing_file(&self, path: &str) -> FileResult<ResolvedPath> {
        if path.is_empty() {
            return Err(FileError::InvalidPayload("No file path provided.".to_string()));
        }
        let file = self.resolver.resolve(path)?;
        if !file.is_file() {
            return Err(FileError::NotAFile(path.to_string()));
        }
        Ok(file)
    }
}

fn write_then_rename(
    temp_path: &Path,
    target: &Path,
    content: &str,
    permissions: fs::Permissions,
) -> io::Result<()> {
    let mut out = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)?;
    out.write_all(content.as_bytes())?;
    out.sync_all()?;
    fs::set_permissions(temp_path, permissions)?;
    fs::rename(temp_path, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TextEditor) {
        let temp_dir = TempDir::new().unwrap();
        let resolver = PathResolver::new(temp_dir.path()).unwrap();
        (temp_dir, TextEditor::new(resolver))
    }

    #[test]
    fn test_read_text() {
        let (temp, editor) = setup();
        fs::write(temp.path().join("note.md"), "h\u{e9}llo").unwrap();

        assert_eq!(editor.read_text("note.md").unwrap(), "h\u{e9}llo");
    }

    #[test]
    fn test_read_binary_is_rejected() {
        let (temp, editor) = setup();
        fs::write(temp.path().join("blob.bin"), [0xff, 0xfe, 0x00]).unwrap();

        let err = editor.read_text("blob.bin").unwrap_err();
        assert_eq!(err.to_string(), "File encoding not supported.");
    }

    #[test]
    fn test_read_requires_file() {
        let (temp, editor) = setup();
        fs::create_dir(temp.path().join("dir")).unwrap();

        assert!(matches!(editor.read_text("dir"), Err(FileError::NotAFile(_))));
        assert!(matches!(editor.read_text("missing"), Err(FileError::NotAFile(_))));
        assert!(matches!(editor.read_text(""), Err(FileError::InvalidPayload(_))));
    }

    #[test]
    fn test_write_text_overwrites() {
        let (temp, editor) = setup();
        fs::write(temp.path().join("note.md"), "old content that is longer").unwrap();

        editor.write_text("note.md", "new").unwrap();

        assert_eq!(fs::read_to_string(temp.path().join("note.md")).unwrap(), "new");
        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_write_text_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (temp, editor) = setup();
        let path = temp.path().join("script.sh");
        fs::write(&path, "echo hi").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o750)).unwrap();

        editor.write_text("script.sh", "echo bye").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o750);
    }

    #[test]
    fn test_write_requires_existing_file() {
        let (_temp, editor) = setup();
        assert!(matches!(
            editor.write_text("new.txt", "x"),
            Err(FileError::NotAFile(_))
        ));
        assert!(matches!(
            editor.write_text("../outside.txt", "x"),
            Err(FileError::PathEscape(_))
        ));
    }
}
