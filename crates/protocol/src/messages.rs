//! Request and response payloads for volumegate.
//!
//! Requests arrive already decoded from JSON (or a multipart form, for
//! uploads) by whatever transport fronts the gateway. Field names match the
//! JSON the browser client sends, so missing fields fall back to empty values
//! the same way the web frontend always treated them.

use serde::{Deserialize, Serialize};

/// Top-level request enum, one variant per gateway operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "payload", rename_all = "snake_case")]
pub enum Request {
    /// List a directory.
    List(ListRequest),
    /// Recursive substring search over the whole volume.
    Search(SearchRequest),
    /// Read a text file.
    GetFileContent(FileContentRequest),
    /// Overwrite a text file.
    SaveFileContent(SaveFileContent),
    /// Create an empty directory.
    CreateFolder(CreateFolder),
    /// Create an empty file.
    CreateFile(CreateFile),
    /// Move one or more items into a directory.
    MoveItems(MoveItems),
    /// Delete one or more items.
    Delete(DeleteItems),
    /// Upload files into a directory.
    Upload(UploadRequest),
    /// Download the whole volume as a ZIP archive.
    DownloadAll,
    /// Download a selection of files and directories.
    DownloadSelected(DownloadSelected),
}

impl Request {
    /// Short operation name, used in log lines.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::List(_) => "list",
            Self::Search(_) => "search",
            Self::GetFileContent(_) => "get_file_content",
            Self::SaveFileContent(_) => "save_file_content",
            Self::CreateFolder(_) => "create_folder",
            Self::CreateFile(_) => "create_file",
            Self::MoveItems(_) => "move_items",
            Self::Delete(_) => "delete",
            Self::Upload(_) => "upload",
            Self::DownloadAll => "download_all",
            Self::DownloadSelected(_) => "download_selected",
        }
    }
}

/// A single path or a list of paths.
///
/// The delete endpoint historically accepted both shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathList {
    One(String),
    Many(Vec<String>),
}

impl Default for PathList {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl PathList {
    /// Flattens into a list. A lone empty string counts as "no paths".
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(path) if path.is_empty() => Vec::new(),
            Self::One(path) => vec![path],
            Self::Many(paths) => paths,
        }
    }
}

impl From<Vec<String>> for PathList {
    fn from(paths: Vec<String>) -> Self {
        Self::Many(paths)
    }
}

/// Directory listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {
    /// Directory relative to the volume root; empty means the root.
    #[serde(default)]
    pub path: String,
}

/// Search request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Case-insensitive substring to look for.
    #[serde(default)]
    pub query: String,
}

/// Request for the text content of a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContentRequest {
    #[serde(default)]
    pub path: String,
}

/// Request to overwrite a text file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveFileContent {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub content: String,
}

/// Request to create a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFolder {
    /// Parent directory.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub folder_name: String,
}

/// Request to create an empty file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFile {
    /// Parent directory.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub file_name: String,
}

/// Request to move items into a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveItems {
    #[serde(default)]
    pub source_paths: PathList,
    /// Target directory; empty means the volume root.
    #[serde(default)]
    pub destination_path: String,
}

/// Request to delete items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteItems {
    #[serde(default)]
    pub path: PathList,
}

/// One file from a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Client-supplied name; may contain relative directories for folder uploads.
    pub filename: String,
    pub content: Vec<u8>,
}

/// Upload request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    /// Target directory.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub files: Vec<UploadedFile>,
}

impl UploadRequest {
    /// Total payload size in bytes.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.content.len() as u64).sum()
    }
}

/// Request to download a selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadSelected {
    #[serde(default)]
    pub selected_paths: Vec<String>,
}

/// A file in a listing or search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modified timestamp (Unix epoch seconds).
    #[serde(rename = "lastModified")]
    pub last_modified: u64,
    /// Path relative to the volume root, always `/`-separated.
    pub path: String,
}

/// One step of a breadcrumb trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreadcrumbSegment {
    /// Display name.
    pub name: String,
    /// Cumulative path relative to the volume root.
    pub path: String,
}

impl BreadcrumbSegment {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Response body for `list` and `search`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryListing {
    /// Directory names for `list`, relative paths for `search`.
    pub directories: Vec<String>,
    pub files: Vec<FileEntry>,
    pub breadcrumb: Vec<BreadcrumbSegment>,
}

/// Response body for `get_file_content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub content: String,
}

/// Plain acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A per-item failure inside a batch response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    /// The path as the client supplied it.
    pub path: String,
    pub error: String,
}

/// Response body for `move_items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveResponse {
    pub message: String,
    pub moved: Vec<String>,
    pub errors: Vec<ItemError>,
}

/// Response body for `delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
    pub deleted: Vec<String>,
    pub errors: Vec<ItemError>,
}

/// Error body returned with any non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
        }
    }
}

/// Outcome status, mirroring the HTTP codes the frontend expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    Ok,
    /// Some items in a batch failed.
    MultiStatus,
    BadRequest,
    Forbidden,
    NotFound,
    PayloadTooLarge,
    InternalError,
}

impl StatusCode {
    /// The numeric HTTP status.
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::MultiStatus => 207,
            Self::BadRequest => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::PayloadTooLarge => 413,
            Self::InternalError => 500,
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Ok | Self::MultiStatus)
    }
}
