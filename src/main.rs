//! # rax-cloud CLI
//!
//! Command-line front end for the RAX cloud store. Each command is sent
//! through the same request handlers the web layer uses, so replies and
//! status codes match.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use log::info;
use tokio::fs::File;
use tokio::io::{self, AsyncWrite, AsyncWriteExt};

use rax_cloud_store::protocol::{Reply, ReplyBody, Request, browse, handle_request};
use rax_cloud_store::utils::setup_logging;
use rax_cloud_store::{FileStore, StoreConfig};

/// RAX cloud store
#[derive(Parser)]
#[command(name = "rax-cloud")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to cloud.toml when present)
    #[arg(short, long)]
    config: Option<String>,

    /// Storage root, overriding the configured one
    #[arg(long)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a directory (or the directory holding a file)
    Ls {
        #[arg(default_value = "")]
        path: String,
    },

    /// Show metadata of an entry
    Stat { path: String },

    /// Upload a local file
    Put {
        #[arg(value_name = "LOCAL")]
        local: PathBuf,
        path: String,
        /// Replace an existing file
        #[arg(long)]
        overwrite: bool,
    },

    /// Download a file; `-` writes to stdout
    Get {
        path: String,
        #[arg(value_name = "LOCAL", default_value = "-")]
        output: PathBuf,
        /// Inclusive byte range, e.g. `0-99`
        #[arg(long)]
        range: Option<String>,
    },

    /// Download a directory as a zip archive
    Zip {
        path: String,
        #[arg(value_name = "LOCAL")]
        output: PathBuf,
        /// Comma separated files to include
        #[arg(long)]
        files: Option<String>,
        /// Comma separated folders to include
        #[arg(long)]
        folders: Option<String>,
    },

    /// Write the thumbnail of an image or video
    Thumb {
        path: String,
        #[arg(value_name = "LOCAL")]
        output: PathBuf,
    },

    /// Rename or move an entry
    Mv {
        path: String,
        new_path: String,
        /// Replace an existing target
        #[arg(long)]
        overwrite: bool,
    },

    /// Delete a file or directory
    Rm { path: String },

    /// Create a directory
    Mkdir { path: String },

    /// Show capacity of the storage filesystem
    Usage,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => StoreConfig::load_from(path),
        None => StoreConfig::load(),
    }
    .context("failed to load configuration")?;
    if let Some(root) = &cli.root {
        config.storage_root = root.to_string_lossy().into_owned();
    }

    setup_logging(&config.log_level);

    let store = FileStore::new(config);
    store.verify_root().await;

    match cli.command {
        Commands::Ls { path } => cmd_ls(&store, &path).await,
        Commands::Stat { path } => cmd_stat(&store, &path).await,
        Commands::Put {
            local,
            path,
            overwrite,
        } => {
            let file = File::open(&local)
                .await
                .with_context(|| format!("failed to open {}", local.display()))?;
            let request = Request::Post {
                path,
                overwrite,
                is_folder: false,
                body: Box::new(file),
            };
            send(&store, request, None).await
        }
        Commands::Get {
            path,
            output,
            range,
        } => {
            let request = Request::Get {
                path,
                range: range.map(|r| format!("bytes={r}")),
                thumbnail: false,
                files: None,
                folders: None,
            };
            send(&store, request, Some(&output)).await
        }
        Commands::Zip {
            path,
            output,
            files,
            folders,
        } => {
            let request = Request::Get {
                path,
                range: None,
                thumbnail: false,
                files,
                folders,
            };
            send(&store, request, Some(&output)).await
        }
        Commands::Thumb { path, output } => {
            let request = Request::Get {
                path,
                range: None,
                thumbnail: true,
                files: None,
                folders: None,
            };
            send(&store, request, Some(&output)).await
        }
        Commands::Mv {
            path,
            new_path,
            overwrite,
        } => {
            let request = Request::Put {
                path,
                new_path: Some(new_path),
                overwrite,
            };
            send(&store, request, None).await
        }
        Commands::Rm { path } => send(&store, Request::Delete { path }, None).await,
        Commands::Mkdir { path } => {
            let request = Request::Post {
                path,
                overwrite: false,
                is_folder: true,
                body: Box::new(io::empty()),
            };
            send(&store, request, None).await
        }
        Commands::Usage => cmd_usage(&store),
    }
}

async fn cmd_ls(store: &FileStore, path: &str) -> Result<()> {
    let listing = browse(store, path).await?;

    for folder in &listing.folders {
        println!("{folder}/");
    }
    for file in &listing.files {
        println!("{file}");
    }
    Ok(())
}

async fn cmd_stat(store: &FileStore, path: &str) -> Result<()> {
    let listing = browse(store, path).await?;
    let entry = &listing.entry;

    println!("Name:     {}", entry.name);
    println!("Path:     {}", entry.path.display());
    println!("Kind:     {:?}", entry.kind);
    println!("Size:     {} bytes", entry.size);
    if let Some(created) = entry.created {
        println!("Created:  {created:?}");
    }
    if let Some(modified) = entry.modified {
        println!("Modified: {modified:?}");
    }
    Ok(())
}

fn cmd_usage(store: &FileStore) -> Result<()> {
    let Some(usage) = store.storage_usage() else {
        bail!("storage usage is not available for {}", store.root().display());
    };

    println!("Total: {} bytes", usage.total_bytes);
    println!("Used:  {} bytes ({:.1}%)", usage.used_bytes, usage.used_percent);
    println!("Free:  {} bytes", usage.free_bytes);
    Ok(())
}

/// Run a request and print or save its reply
async fn send(store: &FileStore, request: Request, output: Option<&Path>) -> Result<()> {
    let reply = handle_request(store, request).await;
    if !reply.is_success() {
        bail!(
            "{} {}",
            reply.status,
            reply.message().unwrap_or("request failed")
        );
    }

    if let Some(range) = reply.header("Content-Range") {
        info!("{} {range}", reply.status);
    }
    write_reply(reply, output).await
}

async fn write_reply(reply: Reply, output: Option<&Path>) -> Result<()> {
    let mut sink: Box<dyn AsyncWrite + Unpin> = match output {
        None => {
            if let ReplyBody::Text(message) = &reply.body {
                println!("{message}");
            }
            return Ok(());
        }
        Some(path) if path == Path::new("-") => Box::new(io::stdout()),
        Some(path) => Box::new(
            File::create(path)
                .await
                .with_context(|| format!("failed to create {}", path.display()))?,
        ),
    };

    let mut written = 0u64;
    match reply.body {
        ReplyBody::Text(message) => {
            sink.write_all(message.as_bytes()).await?;
            written += message.len() as u64;
        }
        ReplyBody::Bytes(data) => {
            sink.write_all(&data).await?;
            written += data.len() as u64;
        }
        ReplyBody::Stream(mut stream) => {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.context("transfer aborted")?;
                sink.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
        }
    }
    sink.flush().await?;

    info!("Wrote {written} bytes");
    Ok(())
}
