//! volumegate
//!
//! Command-line front end for the sandboxed volume file manager.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gateway::config::Config;
use gateway::protocol::messages::{
    CreateFile, CreateFolder, DeleteItems, DownloadSelected, FileContentRequest, ListRequest,
    MoveItems, SaveFileContent, SearchRequest, UploadRequest, UploadedFile,
};
use gateway::protocol::{decrypt_bytes, encrypt, Passphrase, Request};
use gateway::{CredentialStore, FileRouter, GatewayContext, ResponseBody, RouterResponse};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Principal used when no credentials have been set up.
const FALLBACK_PRINCIPAL: &str = "volumegate";

/// volumegate - sandboxed file manager for a single volume.
#[derive(Parser, Debug)]
#[command(name = "volumegate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Encryption passphrase for `.enc` files
    #[arg(long, global = true, env = "VOLUMEGATE_PASSPHRASE", hide_env_values = true)]
    pub passphrase: Option<String>,

    /// Name downloads after this user instead of the configured one
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create the credentials record
    Setup {
        /// Login username
        #[arg(long)]
        username: String,

        /// Login password
        #[arg(long, env = "VOLUMEGATE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// List a directory
    List {
        /// Directory relative to the volume root
        #[arg(default_value = "")]
        path: String,
    },

    /// Search every name in the volume
    Search {
        /// Case-insensitive substring
        query: String,
    },

    /// Print a text file
    Cat {
        path: String,
    },

    /// Overwrite a text file
    Write {
        path: String,

        /// New content; read from stdin when omitted
        #[arg(long)]
        content: Option<String>,
    },

    /// Create a directory
    Mkdir {
        /// Parent directory
        parent: String,
        name: String,
    },

    /// Create an empty file
    Touch {
        /// Parent directory
        parent: String,
        name: String,
    },

    /// Move items into a directory
    Mv {
        #[arg(required = true)]
        sources: Vec<String>,

        /// Destination directory (default: volume root)
        #[arg(long, short, default_value = "")]
        to: String,
    },

    /// Delete items
    Rm {
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Upload local files into a directory
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Target directory (default: volume root)
        #[arg(long, short, default_value = "")]
        to: String,
    },

    /// Download the whole volume as a ZIP archive
    DownloadAll {
        /// Output file (default: the attachment name)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Download selected files and directories
    Download {
        #[arg(required = true)]
        paths: Vec<String>,

        /// Output file (default: the attachment name)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Encrypt a local file into the `.enc` format
    Encrypt {
        input: PathBuf,

        /// Output file (default: input with the encrypted suffix)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Decrypt a local `.enc` file
    Decrypt {
        input: PathBuf,

        /// Output file (default: input without the encrypted suffix)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    config.apply_env_overrides();
    config.validate()?;

    let _guard = init_tracing(&config, cli.verbose)?;
    tracing::debug!(root = %config.volume.root.display(), "Configuration loaded");

    let passphrase = cli
        .passphrase
        .as_deref()
        .map(Passphrase::new)
        .transpose()
        .context("Invalid passphrase")?;
    let store = CredentialStore::new(config.credentials_path());

    match cli.command {
        Commands::Setup { username, password } => {
            let record = store.create(&username, &password, passphrase.as_ref())?;
            println!("Credentials created for {}", record.username);
            println!("  File:       {}", store.path().display());
            println!(
                "  Encryption: {}",
                if record.has_passphrase() { "enabled" } else { "disabled" }
            );
            Ok(())
        }
        Commands::Encrypt { input, output } => {
            let passphrase = passphrase.context("--passphrase is required to encrypt")?;
            let plain = fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let output = output.unwrap_or_else(|| {
                let mut name = input.clone().into_os_string();
                name.push(&config.volume.encrypted_suffix);
                PathBuf::from(name)
            });
            fs::write(&output, encrypt(&plain, &passphrase).encode())
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Encrypted {} -> {}", input.display(), output.display());
            Ok(())
        }
        Commands::Decrypt { input, output } => {
            let passphrase = passphrase.context("--passphrase is required to decrypt")?;
            let stored = fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let plain = decrypt_bytes(&stored, &passphrase)
                .with_context(|| format!("Failed to decrypt {}", input.display()))?;
            let output = match output {
                Some(path) => path,
                None => strip_suffix(&input, &config.volume.encrypted_suffix)?,
            };
            fs::write(&output, plain)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Decrypted {} -> {}", input.display(), output.display());
            Ok(())
        }
        command => {
            if let Some(p) = &passphrase {
                if store.exists() {
                    store
                        .verify_passphrase(p)
                        .context("Passphrase does not match the configured one")?;
                }
            }

            let principal = match cli.user {
                Some(user) => user,
                None if store.exists() => store.load()?.username,
                None => FALLBACK_PRINCIPAL.to_string(),
            };

            let (request, output) = build_request(command)?;
            let context = GatewayContext::new(config, passphrase)?;
            let router = FileRouter::new(Arc::new(context));

            let response = router.handle(&principal, request);
            emit(response, output)
        }
    }
}

/// Install the stderr subscriber, plus a file layer when `log_file` is set.
///
/// The returned guard flushes the file writer on drop.
fn init_tracing(config: &Config, verbose: bool) -> Result<Option<WorkerGuard>> {
    let level = if verbose {
        "debug"
    } else {
        config.gateway.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match &config.gateway.log_file {
        Some(path) => {
            let dir = path.parent().filter(|d| !d.as_os_str().is_empty());
            let dir = dir.unwrap_or_else(|| Path::new("."));
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let file_name = path
                .file_name()
                .context("log_file must name a file")?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to initialize tracing")?;

    Ok(guard)
}

/// Turn a file command into a request, plus where an attachment should go.
fn build_request(command: Commands) -> Result<(Request, Option<PathBuf>)> {
    let request = match command {
        Commands::List { path } => Request::List(ListRequest { path }),
        Commands::Search { query } => Request::Search(SearchRequest { query }),
        Commands::Cat { path } => Request::GetFileContent(FileContentRequest { path }),
        Commands::Write { path, content } => {
            let content = match content {
                Some(c) => c,
                None => {
                    let mut buf = String::new();
                    io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read content from stdin")?;
                    buf
                }
            };
            Request::SaveFileContent(SaveFileContent { path, content })
        }
        Commands::Mkdir { parent, name } => Request::CreateFolder(CreateFolder {
            path: parent,
            folder_name: name,
        }),
        Commands::Touch { parent, name } => Request::CreateFile(CreateFile {
            path: parent,
            file_name: name,
        }),
        Commands::Mv { sources, to } => Request::MoveItems(MoveItems {
            source_paths: sources.into(),
            destination_path: to,
        }),
        Commands::Rm { paths } => Request::Delete(DeleteItems { path: paths.into() }),
        Commands::Upload { files, to } => {
            let files = files
                .iter()
                .map(|local| read_upload(local))
                .collect::<Result<Vec<_>>>()?;
            Request::Upload(UploadRequest { path: to, files })
        }
        Commands::DownloadAll { output } => return Ok((Request::DownloadAll, output)),
        Commands::Download { paths, output } => {
            return Ok((
                Request::DownloadSelected(DownloadSelected {
                    selected_paths: paths,
                }),
                output,
            ))
        }
        Commands::Setup { .. } | Commands::Encrypt { .. } | Commands::Decrypt { .. } => {
            bail!("command does not operate on the volume")
        }
    };
    Ok((request, None))
}

fn read_upload(local: &Path) -> Result<UploadedFile> {
    let filename = local
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("Not a file name: {}", local.display()))?;
    let content =
        fs::read(local).with_context(|| format!("Failed to read {}", local.display()))?;
    Ok(UploadedFile { filename, content })
}

/// Print a JSON body or save an attachment. Non-2xx becomes an error.
fn emit(response: RouterResponse, output: Option<PathBuf>) -> Result<()> {
    let status = response.status;
    match response.body {
        ResponseBody::Json(body) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        ResponseBody::Attachment(attachment) => {
            let path = output.unwrap_or_else(|| PathBuf::from(&attachment.filename));
            fs::write(&path, &attachment.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "Saved {} ({} bytes, {})",
                path.display(),
                attachment.bytes.len(),
                attachment.content_type
            );
        }
    }

    if !status.is_success() {
        bail!("request failed with status {}", status.as_u16());
    }
    Ok(())
}

fn strip_suffix(input: &Path, suffix: &str) -> Result<PathBuf> {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(suffix) {
        Some(plain) if !plain.is_empty() => Ok(input.with_file_name(plain)),
        _ => bail!(
            "{} does not end in {suffix}; pass --output",
            input.display()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_list_defaults_to_root() {
        let cli = Cli::try_parse_from(["volumegate", "list"]).unwrap();
        match cli.command {
            Commands::List { path } => assert_eq!(path, ""),
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_mv_with_destination() {
        let cli =
            Cli::try_parse_from(["volumegate", "mv", "a.txt", "b.txt", "--to", "docs"]).unwrap();
        match cli.command {
            Commands::Mv { sources, to } => {
                assert_eq!(sources, vec!["a.txt", "b.txt"]);
                assert_eq!(to, "docs");
            }
            _ => panic!("Expected Mv command"),
        }
    }

    #[test]
    fn test_rm_requires_paths() {
        assert!(Cli::try_parse_from(["volumegate", "rm"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "volumegate",
            "download-all",
            "--user",
            "alice",
            "-o",
            "out.zip",
            "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.user.as_deref(), Some("alice"));
        match cli.command {
            Commands::DownloadAll { output } => {
                assert_eq!(output, Some(PathBuf::from("out.zip")));
            }
            _ => panic!("Expected DownloadAll command"),
        }
    }

    #[test]
    fn test_build_request_delete() {
        let (request, output) = build_request(Commands::Rm {
            paths: vec!["a".to_string()],
        })
        .unwrap();
        assert_eq!(request.operation(), "delete");
        assert!(output.is_none());
    }

    #[test]
    fn test_build_request_download_keeps_output() {
        let (request, output) = build_request(Commands::Download {
            paths: vec!["a".to_string()],
            output: Some(PathBuf::from("x.zip")),
        })
        .unwrap();
        assert_eq!(request.operation(), "download_selected");
        assert_eq!(output, Some(PathBuf::from("x.zip")));
    }

    #[test]
    fn test_strip_suffix() {
        assert_eq!(
            strip_suffix(Path::new("dir/notes.txt.enc"), ".enc").unwrap(),
            PathBuf::from("dir/notes.txt")
        );
        assert!(strip_suffix(Path::new("notes.txt"), ".enc").is_err());
        assert!(strip_suffix(Path::new(".enc"), ".enc").is_err());
    }
}
