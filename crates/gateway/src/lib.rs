//! # volumegate Gateway Library
//!
//! This crate provides the file manager core for volumegate: a sandboxed,
//! single-user view onto one directory tree (the volume).
//!
//! ## Overview
//!
//! - **Path Sandbox**: every client path is resolved against the volume root
//!   and rejected if it would leave it
//! - **Browsing**: directory listings, breadcrumbs and recursive search
//! - **Mutations**: create, move, delete and upload with per-item results
//! - **Editor**: UTF-8 read and atomic overwrite of text files
//! - **Downloads**: single files and ZIP archives, decrypting `.enc` files
//!   when a passphrase is configured
//! - **Credentials**: the hashed login record and passphrase check
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          FileRouter                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                       GatewayContext                            │
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────┐   │
//! │  │  Directory   │  │    Text      │  │      Transfer        │   │
//! │  │    Index     │  │   Editor     │  │    Coordinator       │   │
//! │  └──────────────┘  └──────────────┘  └──────────────────────┘   │
//! │                                                                 │
//! │  ┌──────────────────────┐  ┌─────────────────────────────────┐  │
//! │  │   Archive Builder    │──│  protocol::crypto (.enc files)  │  │
//! │  └──────────────────────┘  └─────────────────────────────────┘  │
//! │                                                                 │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                      PathResolver                         │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use gateway::protocol::messages::ListRequest;
//! use gateway::protocol::Request;
//! use gateway::{Config, FileRouter, GatewayContext};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let router = FileRouter::new(Arc::new(GatewayContext::new(config, None)?));
//!
//!     let response = router.handle("admin", Request::List(ListRequest::default()));
//!     println!("{}", response.status.as_u16());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`context`]: Startup context holding every component
//! - [`credentials`]: Login record and passphrase verification
//! - [`files`]: Sandboxed file operations
//! - [`router`]: Request dispatch and status mapping

pub mod config;
pub mod context;
pub mod credentials;
pub mod files;
pub mod router;

// Re-export protocol for convenience
pub use protocol;

pub use config::Config;
pub use context::GatewayContext;
pub use credentials::{CredentialError, CredentialRecord, CredentialStore, Principal, User};

pub use files::{
    ArchiveBuilder, BatchStatus, DirectoryIndex, Download, DownloadKind, FileError,
    FileErrorKind, FileResult, PathResolver, ResolvedPath, TextEditor, TransferCoordinator,
    TransferOutcome,
};

pub use router::{Attachment, FileRouter, ResponseBody, RouterResponse};
