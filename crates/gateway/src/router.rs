//! Request router for dispatching decoded requests to the file components.
//!
//! This module provides the `FileRouter` struct that receives a validated
//! [`Request`] on behalf of a [`Principal`] and routes it to the directory
//! index, text editor, transfer coordinator or archive builder. Every outcome
//! becomes a [`RouterResponse`]: a status plus a JSON body or a file
//! attachment, ready for a transport to put on the wire.

use std::sync::Arc;

use protocol::messages::{
    CreateFile, CreateFolder, DeleteItems, DeleteResponse, DownloadSelected, ErrorResponse,
    FileContent, FileContentRequest, ItemError, ListRequest, MessageResponse, MoveItems,
    MoveResponse, SaveFileContent, SearchRequest, UploadRequest,
};
use protocol::{Request, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::context::GatewayContext;
use crate::credentials::Principal;
use crate::files::{Download, FileError, FileErrorKind, TransferOutcome};

/// Body of a router response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Attachment(Attachment),
}

/// A file sent back as a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Value for the `Content-Disposition` header.
    pub fn content_disposition(&self) -> String {
        let escaped = self.filename.replace('\\', "\\\\").replace('"', "\\\"");
        format!("attachment; filename=\"{escaped}\"")
    }
}

/// Status and body produced for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterResponse {
    pub status: StatusCode,
    pub body: ResponseBody,
}

impl RouterResponse {
    fn json<T: Serialize>(status: StatusCode, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => Self {
                status,
                body: ResponseBody::Json(value),
            },
            Err(e) => {
                error!(error = %e, "Failed to serialize response body");
                Self {
                    status: StatusCode::InternalError,
                    body: ResponseBody::Json(serde_json::json!({
                        "error": "Internal Server Error"
                    })),
                }
            }
        }
    }

    fn ok<T: Serialize>(body: &T) -> Self {
        Self::json(StatusCode::Ok, body)
    }

    fn message(text: &str) -> Self {
        Self::ok(&MessageResponse::new(text))
    }

    fn error(status: StatusCode, body: ErrorResponse) -> Self {
        Self::json(status, &body)
    }

    fn attachment(download: Download, principal_id: &str) -> Self {
        let filename = download.attachment_name(principal_id);
        let content_type = download.content_type();
        Self {
            status: StatusCode::Ok,
            body: ResponseBody::Attachment(Attachment {
                filename,
                content_type,
                bytes: download.into_bytes(),
            }),
        }
    }

    /// The JSON body, if this is not an attachment.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Attachment(_) => None,
        }
    }

    /// The attachment, if this is a download.
    pub fn attachment_body(&self) -> Option<&Attachment> {
        match &self.body {
            ResponseBody::Attachment(attachment) => Some(attachment),
            ResponseBody::Json(_) => None,
        }
    }
}

/// Status code for an error surfaced by a single-item operation.
pub fn status_for(err: &FileError) -> StatusCode {
    match err.kind() {
        FileErrorKind::PathEscape => StatusCode::Forbidden,
        FileErrorKind::NotFound => StatusCode::NotFound,
        FileErrorKind::PayloadTooLarge => StatusCode::PayloadTooLarge,
        FileErrorKind::Io => StatusCode::InternalError,
        _ => StatusCode::BadRequest,
    }
}

/// Client-safe text for an error. Internal failures get `fallback`.
fn client_message(err: &FileError, fallback: &str) -> String {
    match err {
        FileError::PathEscape(_) => "Forbidden".to_string(),
        FileError::NotFound(_) => "The specified path does not exist.".to_string(),
        FileError::AlreadyExists(path) => format!("\"{path}\" already exists."),
        FileError::InvalidPath(_) => "Invalid file path.".to_string(),
        FileError::InvalidQuery(msg) | FileError::InvalidPayload(msg) => msg.clone(),
        FileError::NotAFile(_) => "The specified path is not a file.".to_string(),
        FileError::NotADirectory(_) => "Target directory does not exist.".to_string(),
        FileError::NoSelection => "No files or directories selected for download.".to_string(),
        FileError::SelfMove(_) => {
            "Cannot move a directory into itself or its subdirectory.".to_string()
        }
        FileError::PayloadTooLarge { .. } => "File Too Large".to_string(),
        FileError::Decryption { .. } => "The selected file could not be decrypted.".to_string(),
        FileError::Archive(_) | FileError::Io(_) => fallback.to_string(),
    }
}

/// Batch verbs used in per-item and summary messages.
#[derive(Debug, Clone, Copy)]
enum Batch {
    Move,
    Delete,
}

impl Batch {
    fn summary(self, partial: bool) -> &'static str {
        match (self, partial) {
            (Self::Move, false) => "All items moved successfully.",
            (Self::Move, true) => "Some items were not moved.",
            (Self::Delete, false) => "All items deleted successfully.",
            (Self::Delete, true) => "Some items were not deleted.",
        }
    }

    fn item_error(self, err: &FileError) -> String {
        match err.kind() {
            FileErrorKind::NotFound => "Item does not exist.".to_string(),
            FileErrorKind::AlreadyExists => "Destination already exists.".to_string(),
            FileErrorKind::Io => match self {
                Self::Move => "Failed to move item.".to_string(),
                Self::Delete => "Failed to delete item.".to_string(),
            },
            FileErrorKind::InvalidPath if matches!(self, Self::Delete) => {
                "The volume root cannot be deleted.".to_string()
            }
            _ => client_message(err, "Failed to process item."),
        }
    }
}

/// Routes decoded requests to the file components.
#[derive(Debug, Clone)]
pub struct FileRouter {
    context: Arc<GatewayContext>,
}

impl FileRouter {
    pub fn new(context: Arc<GatewayContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &GatewayContext {
        &self.context
    }

    /// Handle one request for `principal`.
    ///
    /// Never panics and never returns host paths; internal failures are
    /// logged in full and reported generically.
    pub fn handle<P: Principal + ?Sized>(&self, principal: &P, request: Request) -> RouterResponse {
        let operation = request.operation();
        let principal_id = principal.principal_id();
        debug!(principal = principal_id, operation, "Routing request");

        let response = match request {
            Request::List(req) => self.handle_list(req),
            Request::Search(req) => self.handle_search(req),
            Request::GetFileContent(req) => self.handle_get_file_content(req),
            Request::SaveFileContent(req) => self.handle_save_file_content(req),
            Request::CreateFolder(req) => self.handle_create_folder(req),
            Request::CreateFile(req) => self.handle_create_file(req),
            Request::MoveItems(req) => self.handle_move_items(req),
            Request::Delete(req) => self.handle_delete(req),
            Request::Upload(req) => self.handle_upload(req),
            Request::DownloadAll => self.handle_download_all(principal_id),
            Request::DownloadSelected(req) => self.handle_download_selected(principal_id, req),
        };

        debug!(operation, status = response.status.as_u16(), "Request finished");
        response
    }

    /// Convert an error from a single-item operation into a response.
    fn fail(&self, operation: &str, err: FileError, fallback: &str) -> RouterResponse {
        let status = status_for(&err);
        match status {
            StatusCode::Forbidden => {
                warn!(operation, error = %err, "Rejected path outside the volume");
            }
            StatusCode::InternalError => {
                error!(operation, error = %err, "Operation failed");
            }
            _ => debug!(operation, error = %err, "Request rejected"),
        }
        RouterResponse::error(status, ErrorResponse::new(client_message(&err, fallback)))
    }

    fn batch(&self, kind: Batch, outcome: TransferOutcome) -> RouterResponse {
        let partial = !outcome.failed().is_empty();
        let errors: Vec<ItemError> = outcome
            .failed()
            .iter()
            .map(|failure| {
                if failure.error().kind() == FileErrorKind::Io {
                    error!(path = failure.path(), error = %failure.error(), "Batch item failed");
                }
                ItemError {
                    path: failure.path().to_string(),
                    error: kind.item_error(failure.error()),
                }
            })
            .collect();

        let status = if partial {
            StatusCode::MultiStatus
        } else {
            StatusCode::Ok
        };
        let message = kind.summary(partial).to_string();
        let succeeded = outcome.succeeded().to_vec();

        match kind {
            Batch::Move => RouterResponse::json(
                status,
                &MoveResponse {
                    message,
                    moved: succeeded,
                    errors,
                },
            ),
            Batch::Delete => RouterResponse::json(
                status,
                &DeleteResponse {
                    message,
                    deleted: succeeded,
                    errors,
                },
            ),
        }
    }

    // =========================================================================
    // Read Handlers
    // =========================================================================

    fn handle_list(&self, req: ListRequest) -> RouterResponse {
        let listing = self
            .context
            .resolver()
            .resolve(req.path.trim())
            .and_then(|dir| self.context.index().list(&dir));

        match listing {
            Ok(listing) => RouterResponse::ok(&listing),
            Err(FileError::NotFound(_)) => RouterResponse::error(
                StatusCode::NotFound,
                ErrorResponse::new("Directory not found"),
            ),
            Err(e) => self.fail("list", e, "An error occurred while listing the directory."),
        }
    }

    fn handle_search(&self, req: SearchRequest) -> RouterResponse {
        let query = req.query.trim();
        if query.is_empty() {
            return RouterResponse::error(
                StatusCode::BadRequest,
                ErrorResponse::new("No search query provided."),
            );
        }

        match self.context.index().search(query) {
            Ok(results) => RouterResponse::ok(&results),
            Err(e) => self.fail("search", e, "An error occurred during the search."),
        }
    }

    fn handle_get_file_content(&self, req: FileContentRequest) -> RouterResponse {
        match self.context.editor().read_text(req.path.trim()) {
            Ok(content) => RouterResponse::ok(&FileContent { content }),
            Err(e) => self.fail(
                "get_file_content",
                e,
                "An error occurred while fetching file content.",
            ),
        }
    }

    // =========================================================================
    // Write Handlers
    // =========================================================================

    fn handle_save_file_content(&self, req: SaveFileContent) -> RouterResponse {
        match self.context.editor().write_text(&req.path, &req.content) {
            Ok(()) => RouterResponse::message("File saved successfully."),
            Err(e) => self.fail(
                "save_file_content",
                e,
                "An error occurred while saving file content.",
            ),
        }
    }

    fn handle_create_folder(&self, req: CreateFolder) -> RouterResponse {
        match self
            .context
            .transfers()
            .create_folder(&req.path, &req.folder_name)
        {
            Ok(_) => RouterResponse::message("Folder created successfully."),
            Err(e) => self.fail(
                "create_folder",
                e,
                "An error occurred while creating the folder.",
            ),
        }
    }

    fn handle_create_file(&self, req: CreateFile) -> RouterResponse {
        match self.context.transfers().create_file(&req.path, &req.file_name) {
            Ok(_) => RouterResponse::message("File created successfully."),
            Err(e) => self.fail("create_file", e, "An error occurred while creating the file."),
        }
    }

    fn handle_move_items(&self, req: MoveItems) -> RouterResponse {
        let sources = req.source_paths.into_vec();
        match self
            .context
            .transfers()
            .move_items(&sources, req.destination_path.trim())
        {
            Ok(outcome) => {
                info!(
                    status = ?outcome.status(),
                    moved = outcome.succeeded().len(),
                    failed = outcome.failed().len(),
                    "Move finished"
                );
                self.batch(Batch::Move, outcome)
            }
            Err(e) => self.fail("move_items", e, "An error occurred while moving items."),
        }
    }

    fn handle_delete(&self, req: DeleteItems) -> RouterResponse {
        let paths = req.path.into_vec();
        match self.context.transfers().delete(&paths) {
            Ok(outcome) => {
                info!(
                    status = ?outcome.status(),
                    deleted = outcome.succeeded().len(),
                    failed = outcome.failed().len(),
                    "Delete finished"
                );
                self.batch(Batch::Delete, outcome)
            }
            Err(e) => self.fail("delete", e, "An error occurred while deleting items."),
        }
    }

    fn handle_upload(&self, req: UploadRequest) -> RouterResponse {
        match self.context.transfers().upload(&req.path, &req.files) {
            Ok(written) => {
                info!(files = written.len(), bytes = req.total_size(), "Upload finished");
                RouterResponse::message("Files uploaded successfully.")
            }
            Err(e) => self.fail("upload", e, "An error occurred while uploading files."),
        }
    }

    // =========================================================================
    // Download Handlers
    // =========================================================================

    fn handle_download_all(&self, principal_id: &str) -> RouterResponse {
        match self.context.archives().build_whole_volume() {
            Ok(download) => RouterResponse::attachment(download, principal_id),
            Err(e) => self.fail("download_all", e, "An error occurred while creating ZIP."),
        }
    }

    fn handle_download_selected(
        &self,
        principal_id: &str,
        req: DownloadSelected,
    ) -> RouterResponse {
        let selected: Result<Vec<_>, _> = req
            .selected_paths
            .iter()
            .map(|p| self.context.resolver().resolve(p))
            .collect();

        let download = selected.and_then(|items| self.context.archives().build_selection(&items));
        match download {
            Ok(download) => RouterResponse::attachment(download, principal_id),
            Err(e) => self.fail(
                "download_selected",
                e,
                "An error occurred while creating ZIP.",
            ),
        }
    }
}
