//! End-to-end integration tests for volumegate.
//!
//! These tests verify complete flows work correctly:
//! - Context startup from configuration
//! - Browsing, search and editing through the router
//! - Batch move and delete with partial failures
//! - Uploads and downloads, including encrypted files
//! - Credential setup and verification

use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;

use gateway::config::Config;
use gateway::protocol::messages::{
    CreateFile, CreateFolder, DeleteItems, DownloadSelected, FileContentRequest, ListRequest,
    MoveItems, SaveFileContent, SearchRequest, UploadRequest, UploadedFile,
};
use gateway::protocol::{encrypt, Passphrase, Request, StatusCode};
use gateway::{CredentialStore, FileRouter, GatewayContext, User};
use serde_json::Value;
use tempfile::TempDir;

/// Create a test configuration with a temporary directory.
fn create_test_config() -> (Config, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.volume.root = temp_dir.path().join("volume");
    config.gateway.data_dir = temp_dir.path().join("data");
    (config, temp_dir)
}

fn create_router(config: Config, passphrase: Option<Passphrase>) -> FileRouter {
    let context = GatewayContext::new(config, passphrase).unwrap();
    FileRouter::new(Arc::new(context))
}

fn volume(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("volume")
}

fn json(router: &FileRouter, request: Request) -> (StatusCode, Value) {
    let response = router.handle("admin", request);
    let body = response.json_body().cloned().unwrap();
    (response.status, body)
}

fn zip_entries(bytes: &[u8]) -> HashMap<String, Vec<u8>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut entries = HashMap::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut content = Vec::new();
        file.read_to_end(&mut content).unwrap();
        entries.insert(file.name().to_string(), content);
    }
    entries
}

// =============================================================================
// Browsing Tests
// =============================================================================

#[test]
fn test_list_root_after_startup() {
    let (config, temp_dir) = create_test_config();
    let router = create_router(config, None);
    fs::write(volume(&temp_dir).join("b.txt"), "b").unwrap();
    fs::write(volume(&temp_dir).join("A.txt"), "a").unwrap();
    fs::create_dir(volume(&temp_dir).join("z")).unwrap();

    let (status, body) = json(&router, Request::List(ListRequest::default()));

    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["directories"], serde_json::json!(["z"]));
    assert_eq!(body["files"][0]["name"], "A.txt");
    assert_eq!(body["files"][1]["name"], "b.txt");
    assert!(body["files"][0]["lastModified"].is_u64());
    assert_eq!(body["breadcrumb"][0]["name"], "Root");
}

#[test]
fn test_traversal_is_forbidden_everywhere() {
    let (config, temp_dir) = create_test_config();
    let router = create_router(config, None);
    fs::write(temp_dir.path().join("secret.txt"), "secret").unwrap();

    let requests = vec![
        Request::List(ListRequest {
            path: "..".to_string(),
        }),
        Request::GetFileContent(FileContentRequest {
            path: "../secret.txt".to_string(),
        }),
        Request::Delete(DeleteItems {
            path: vec!["../secret.txt".to_string()].into(),
        }),
        Request::DownloadSelected(DownloadSelected {
            selected_paths: vec!["../secret.txt".to_string()],
        }),
    ];

    for request in requests {
        let operation = request.operation();
        let response = router.handle("admin", request);
        assert_eq!(response.status, StatusCode::Forbidden, "{operation}");
    }
    assert!(temp_dir.path().join("secret.txt").exists());
}

#[test]
fn test_search_reports_nested_match_once() {
    let (config, temp_dir) = create_test_config();
    let router = create_router(config, None);
    fs::create_dir_all(volume(&temp_dir).join("reports/2023")).unwrap();
    fs::write(volume(&temp_dir).join("reports/2023/Report.pdf"), "pdf").unwrap();

    let (status, body) = json(
        &router,
        Request::Search(SearchRequest {
            query: "report".to_string(),
        }),
    );

    assert_eq!(status, StatusCode::Ok);
    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["path"], "reports/2023/Report.pdf");
    assert_eq!(body["breadcrumb"][1]["name"], "Search Results for 'report'");
}

// =============================================================================
// Editing Tests
// =============================================================================

#[test]
fn test_create_edit_and_read_file() {
    let (config, temp_dir) = create_test_config();
    let router = create_router(config, None);

    let (status, body) = json(
        &router,
        Request::CreateFolder(CreateFolder {
            path: String::new(),
            folder_name: "notes".to_string(),
        }),
    );
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["message"], "Folder created successfully.");

    let (status, body) = json(
        &router,
        Request::CreateFile(CreateFile {
            path: "notes".to_string(),
            file_name: "todo.md".to_string(),
        }),
    );
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["message"], "File created successfully.");
    assert_eq!(fs::read(volume(&temp_dir).join("notes/todo.md")).unwrap().len(), 0);

    let (status, body) = json(
        &router,
        Request::SaveFileContent(SaveFileContent {
            path: "notes/todo.md".to_string(),
            content: "- buy milk\n".to_string(),
        }),
    );
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["message"], "File saved successfully.");

    let (status, body) = json(
        &router,
        Request::GetFileContent(FileContentRequest {
            path: "notes/todo.md".to_string(),
        }),
    );
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["content"], "- buy milk\n");
}

#[test]
fn test_create_existing_folder_is_400() {
    let (config, temp_dir) = create_test_config();
    let router = create_router(config, None);
    fs::create_dir_all(volume(&temp_dir).join("taken")).unwrap();

    let (status, _) = json(
        &router,
        Request::CreateFolder(CreateFolder {
            path: String::new(),
            folder_name: "taken".to_string(),
        }),
    );
    assert_eq!(status, StatusCode::BadRequest);

    let (status, body) = json(
        &router,
        Request::CreateFolder(CreateFolder {
            path: String::new(),
            folder_name: "   ".to_string(),
        }),
    );
    assert_eq!(status, StatusCode::BadRequest);
    assert_eq!(body["error"], "Folder name cannot be empty.");
}

#[test]
fn test_reading_binary_file_is_400() {
    let (config, temp_dir) = create_test_config();
    let router = create_router(config, None);
    fs::write(volume(&temp_dir).join("image.bin"), [0xff, 0xd8, 0xff]).unwrap();

    let (status, body) = json(
        &router,
        Request::GetFileContent(FileContentRequest {
            path: "image.bin".to_string(),
        }),
    );
    assert_eq!(status, StatusCode::BadRequest);
    assert_eq!(body["error"], "File encoding not supported.");
}

// =============================================================================
// Batch Tests
// =============================================================================

#[test]
fn test_move_into_own_parent_fails_per_item() {
    let (config, temp_dir) = create_test_config();
    let router = create_router(config, None);
    fs::create_dir_all(volume(&temp_dir).join("a")).unwrap();
    fs::write(volume(&temp_dir).join("a/b.txt"), "b").unwrap();
    fs::write(volume(&temp_dir).join("c.txt"), "c").unwrap();

    let (status, body) = json(
        &router,
        Request::MoveItems(MoveItems {
            source_paths: vec!["a/b.txt".to_string(), "c.txt".to_string()].into(),
            destination_path: "a".to_string(),
        }),
    );

    assert_eq!(status, StatusCode::MultiStatus);
    assert_eq!(body["message"], "Some items were not moved.");
    assert_eq!(body["moved"], serde_json::json!(["c.txt"]));
    assert_eq!(body["errors"][0]["path"], "a/b.txt");
    assert_eq!(body["errors"][0]["error"], "Destination already exists.");
    assert!(volume(&temp_dir).join("a/b.txt").exists());
    assert!(volume(&temp_dir).join("a/c.txt").exists());
}

#[test]
fn test_move_all_succeed() {
    let (config, temp_dir) = create_test_config();
    let router = create_router(config, None);
    fs::create_dir_all(volume(&temp_dir).join("archive")).unwrap();
    fs::write(volume(&temp_dir).join("x.txt"), "x").unwrap();

    let (status, body) = json(
        &router,
        Request::MoveItems(MoveItems {
            source_paths: vec!["x.txt".to_string()].into(),
            destination_path: "archive".to_string(),
        }),
    );

    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["message"], "All items moved successfully.");
    assert!(volume(&temp_dir).join("archive/x.txt").exists());
}

#[test]
fn test_move_to_missing_destination_is_400() {
    let (config, temp_dir) = create_test_config();
    let router = create_router(config, None);
    fs::write(volume(&temp_dir).join("x.txt"), "x").unwrap();

    let (status, body) = json(
        &router,
        Request::MoveItems(MoveItems {
            source_paths: vec!["x.txt".to_string()].into(),
            destination_path: "nowhere".to_string(),
        }),
    );

    assert_eq!(status, StatusCode::BadRequest);
    assert_eq!(body["error"], "Target directory does not exist.");
}

#[test]
fn test_delete_directory_recursively() {
    let (config, temp_dir) = create_test_config();
    let router = create_router(config, None);
    fs::create_dir_all(volume(&temp_dir).join("old/deep")).unwrap();
    fs::write(volume(&temp_dir).join("old/deep/f.txt"), "f").unwrap();

    let (status, body) = json(
        &router,
        Request::Delete(DeleteItems {
            path: vec!["old".to_string()].into(),
        }),
    );

    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["deleted"], serde_json::json!(["old"]));
    assert!(!volume(&temp_dir).join("old").exists());
}

#[test]
fn test_delete_empty_request_is_400() {
    let (config, _temp_dir) = create_test_config();
    let router = create_router(config, None);

    let (status, body) = json(&router, Request::Delete(DeleteItems::default()));
    assert_eq!(status, StatusCode::BadRequest);
    assert_eq!(body["error"], "No paths provided for deletion.");
}

// =============================================================================
// Upload Tests
// =============================================================================

#[test]
fn test_upload_folder_structure() {
    let (config, temp_dir) = create_test_config();
    let router = create_router(config, None);

    let (status, body) = json(
        &router,
        Request::Upload(UploadRequest {
            path: String::new(),
            files: vec![
                UploadedFile {
                    filename: "photos/2024/a.jpg".to_string(),
                    content: b"jpeg".to_vec(),
                },
                UploadedFile {
                    filename: String::new(),
                    content: b"ignored".to_vec(),
                },
            ],
        }),
    );

    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["message"], "Files uploaded successfully.");
    assert_eq!(
        fs::read(volume(&temp_dir).join("photos/2024/a.jpg")).unwrap(),
        b"jpeg"
    );
}

#[test]
fn test_upload_over_limit_is_413() {
    let (mut config, temp_dir) = create_test_config();
    config.volume.max_content_length = 4;
    let router = create_router(config, None);

    let (status, _) = json(
        &router,
        Request::Upload(UploadRequest {
            path: String::new(),
            files: vec![UploadedFile {
                filename: "big.bin".to_string(),
                content: vec![0u8; 5],
            }],
        }),
    );

    assert_eq!(status, StatusCode::PayloadTooLarge);
    assert!(!volume(&temp_dir).join("big.bin").exists());
}

#[test]
fn test_upload_conflict_is_400() {
    let (config, temp_dir) = create_test_config();
    let router = create_router(config, None);
    fs::write(volume(&temp_dir).join("dup.txt"), "old").unwrap();

    let (status, _) = json(
        &router,
        Request::Upload(UploadRequest {
            path: String::new(),
            files: vec![UploadedFile {
                filename: "dup.txt".to_string(),
                content: b"new".to_vec(),
            }],
        }),
    );

    assert_eq!(status, StatusCode::BadRequest);
    assert_eq!(fs::read_to_string(volume(&temp_dir).join("dup.txt")).unwrap(), "old");
}

// =============================================================================
// Download Tests
// =============================================================================

#[test]
fn test_download_single_plain_file() {
    let (config, temp_dir) = create_test_config();
    let router = create_router(config, None);
    fs::write(volume(&temp_dir).join("plain.txt"), "raw bytes").unwrap();

    let response = router.handle(
        "admin",
        Request::DownloadSelected(DownloadSelected {
            selected_paths: vec!["plain.txt".to_string()],
        }),
    );

    assert_eq!(response.status, StatusCode::Ok);
    let attachment = response.attachment_body().unwrap();
    assert_eq!(attachment.filename, "plain.txt");
    assert_eq!(attachment.bytes, b"raw bytes");
    assert_eq!(
        attachment.content_disposition(),
        "attachment; filename=\"plain.txt\""
    );
}

#[test]
fn test_download_directory_has_volume_relative_names() {
    let (config, temp_dir) = create_test_config();
    let router = create_router(config, None);
    fs::create_dir_all(volume(&temp_dir).join("docs/sub")).unwrap();
    fs::write(volume(&temp_dir).join("docs/a.txt"), "a").unwrap();
    fs::write(volume(&temp_dir).join("docs/sub/b.txt"), "b").unwrap();
    fs::write(volume(&temp_dir).join("outside.txt"), "o").unwrap();

    let user = User::new("alice");
    let response = router.handle(
        &user,
        Request::DownloadSelected(DownloadSelected {
            selected_paths: vec!["docs".to_string()],
        }),
    );

    let attachment = response.attachment_body().unwrap();
    assert_eq!(attachment.filename, "alice-docs.zip");

    let entries = zip_entries(&attachment.bytes);
    let mut names: Vec<&str> = entries.keys().map(String::as_str).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["docs/a.txt", "docs/sub/b.txt"]);
}

#[test]
fn test_encrypted_volume_round_trip() {
    let (config, temp_dir) = create_test_config();
    let passphrase = Passphrase::new("correct horse").unwrap();
    let router = create_router(config, Some(passphrase.clone()));

    let blob = encrypt(b"top secret", &passphrase).encode();
    fs::write(volume(&temp_dir).join("secret.txt.enc"), blob).unwrap();
    fs::write(volume(&temp_dir).join("plain.txt"), "plain").unwrap();
    fs::write(volume(&temp_dir).join("broken.txt.enc"), "not-an-encrypted-blob").unwrap();

    let response = router.handle("admin", Request::DownloadAll);
    let attachment = response.attachment_body().unwrap();
    assert_eq!(attachment.filename, "admin-all.zip");

    let entries = zip_entries(&attachment.bytes);
    assert_eq!(entries["secret.txt"], b"top secret");
    assert_eq!(entries["plain.txt"], b"plain");
    assert!(!entries.contains_key("secret.txt.enc"));
    assert!(!entries.contains_key("broken.txt"));

    let response = router.handle(
        "admin",
        Request::DownloadSelected(DownloadSelected {
            selected_paths: vec!["secret.txt.enc".to_string()],
        }),
    );
    let attachment = response.attachment_body().unwrap();
    assert_eq!(attachment.filename, "secret.txt");
    assert_eq!(attachment.bytes, b"top secret");
}

#[test]
fn test_wrong_passphrase_single_download_is_400() {
    let (config, temp_dir) = create_test_config();
    let router = create_router(config, Some(Passphrase::new("wrong").unwrap()));

    let blob = encrypt(b"data", &Passphrase::new("right").unwrap()).encode();
    fs::write(volume(&temp_dir).join("x.enc"), blob).unwrap();

    let response = router.handle(
        "admin",
        Request::DownloadSelected(DownloadSelected {
            selected_paths: vec!["x.enc".to_string()],
        }),
    );
    assert_eq!(response.status, StatusCode::BadRequest);
}

// =============================================================================
// Credential Tests
// =============================================================================

#[test]
fn test_setup_then_login() {
    let (config, _temp_dir) = create_test_config();
    let store = CredentialStore::new(config.credentials_path()).with_hash_iterations(10);
    let passphrase = Passphrase::new("vault").unwrap();

    store.create("admin", "hunter2", Some(&passphrase)).unwrap();

    let user = store.verify_login("admin", "hunter2").unwrap();
    assert_eq!(user.username(), "admin");
    assert!(store.verify_passphrase(&passphrase).is_ok());
    assert!(store.verify_passphrase(&Passphrase::new("hunter2").unwrap()).is_err());

    let router = create_router(config, Some(passphrase));
    let response = router.handle(&user, Request::DownloadAll);
    assert_eq!(
        response.attachment_body().unwrap().filename,
        "admin-all.zip"
    );
}
