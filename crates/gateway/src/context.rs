//! Startup context shared by every request.

use std::fs;

use anyhow::{Context, Result};
use protocol::Passphrase;

use crate::config::Config;
use crate::files::{ArchiveBuilder, DirectoryIndex, PathResolver, TextEditor, TransferCoordinator};

/// Every file component, built once from a validated [`Config`].
#[derive(Debug, Clone)]
pub struct GatewayContext {
    config: Config,
    resolver: PathResolver,
    index: DirectoryIndex,
    archives: ArchiveBuilder,
    transfers: TransferCoordinator,
    editor: TextEditor,
}

impl GatewayContext {
    /// Build the context, creating the volume root if it is missing.
    ///
    /// Without a passphrase, encrypted files are served as stored.
    pub fn new(config: Config, passphrase: Option<Passphrase>) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let root = &config.volume.root;
        if !root.exists() {
            fs::create_dir_all(root)
                .with_context(|| format!("Failed to create volume root: {}", root.display()))?;
            tracing::info!(root = %root.display(), "Created volume root");
        }

        let resolver = PathResolver::new(root)
            .with_context(|| format!("Volume root is unusable: {}", root.display()))?;

        let encrypted = passphrase.is_some();
        let context = Self {
            index: DirectoryIndex::new(resolver.clone()),
            archives: ArchiveBuilder::new(resolver.clone(), config.volume.encrypted_suffix.clone())
                .with_passphrase(passphrase),
            transfers: TransferCoordinator::new(resolver.clone())
                .with_max_upload_size(config.volume.max_content_length),
            editor: TextEditor::new(resolver.clone()),
            resolver,
            config,
        };

        tracing::info!(
            root = %context.resolver.root().display(),
            encrypted,
            "Gateway context ready"
        );
        Ok(context)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn index(&self) -> &DirectoryIndex {
        &self.index
    }

    pub fn archives(&self) -> &ArchiveBuilder {
        &self.archives
    }

    pub fn transfers(&self) -> &TransferCoordinator {
        &self.transfers
    }

    pub fn editor(&self) -> &TextEditor {
        &self.editor
    }
}
