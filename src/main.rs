use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use fhost::{
    ClientConfig, ClientError, HostService, HttpHostService, UploadOptions, UploadSource, Uploader,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the hosting service (overrides FHOST_URL)
    #[arg(long)]
    url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file and print its public URL
    Upload {
        /// Path of the file to upload
        path: PathBuf,
    },
    /// List stored files
    List {
        /// Page to fetch (pages start at 1)
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        page: u64,
    },
    /// Delete a stored file by id
    Delete {
        /// Id of the stored file
        id: String,
    },
    /// Save the auth token, or report whether one is configured
    Token {
        /// Token value; omit to check the current state
        value: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fhost=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ClientConfig::from_env();
    if let Some(url) = args.url {
        config.base_url = url.trim_end_matches('/').to_string();
    }

    match args.command {
        Command::Upload { path } => upload(&config, &path).await,
        Command::List { page } => list(&config, page).await,
        Command::Delete { id } => delete(&config, &id).await,
        Command::Token { value } => token(&config, value.as_deref()),
    }
}

async fn upload(config: &ClientConfig, path: &Path) -> anyhow::Result<()> {
    let api = Arc::new(HttpHostService::new(&config.base_url)?);
    let uploader = Uploader::new(api, UploadOptions::from(config));
    let source = UploadSource::from_path(path).await?;

    info!(
        "🚀 Uploading {} ({} bytes) to {}",
        source.name(),
        source.size(),
        config.base_url
    );

    let receipt = uploader
        .upload(&source, config.token.as_deref(), |percent| {
            eprint!("\r{percent:>3}%");
            let _ = std::io::stderr().flush();
        })
        .await?;
    eprintln!();

    if receipt.existed {
        println!("Already hosted: {}", config.file_url(&receipt.id));
    } else {
        println!("{}", config.file_url(&receipt.id));
    }
    Ok(())
}

async fn list(config: &ClientConfig, page: u64) -> anyhow::Result<()> {
    let api = HttpHostService::new(&config.base_url)?;
    let token = config.token.as_deref().ok_or(ClientError::MissingToken)?;

    let listing = api.list_files(token, page).await?;
    for file in &listing.files {
        println!("{:<14} {:>12}  {}", file.id, file.bytes, file.filename);
    }
    println!(
        "{} file(s) total, page {} of {}",
        listing.total,
        page,
        listing.page_count().max(1)
    );
    Ok(())
}

async fn delete(config: &ClientConfig, id: &str) -> anyhow::Result<()> {
    let api = HttpHostService::new(&config.base_url)?;
    let token = config.token.as_deref().ok_or(ClientError::MissingToken)?;

    api.delete_file(token, id).await?;
    println!("Deleted {id}");
    Ok(())
}

fn token(config: &ClientConfig, value: Option<&str>) -> anyhow::Result<()> {
    match value {
        Some(value) => {
            config.save_token(value)?;
            println!("Token saved to {}", config.token_file.display());
        }
        None => {
            if config.token.is_some() {
                println!("A token is configured.");
            } else {
                println!("No token configured. Run `fhost token <value>` or set FHOST_TOKEN.");
            }
        }
    }
    Ok(())
}
