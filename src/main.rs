use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use file_keeper::models::MIME_UNKNOWN;
use file_keeper::{
    FileEntity, FormatInfo, FormatterChoice, StorageConfig, StorageRegistry, UploadOptions,
    UploadSource,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "file-keeper", about = "Store files on a configured disk", version)]
struct Cli {
    /// Disk to use (default: STORAGE_DISK)
    #[arg(long, global = true)]
    disk: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store files and print their entities as JSON
    Store {
        files: Vec<PathBuf>,
        /// Formatter override for this run ("default" or "entity")
        #[arg(long)]
        formatter: Option<String>,
        #[arg(long, requires = "entity_id")]
        entity_type: Option<String>,
        #[arg(long, requires = "entity_type")]
        entity_id: Option<String>,
    },
    /// Check whether a key exists
    Exists { path: String },
    /// Delete a stored key
    Delete { path: String },
    /// Move a stored key
    Rename { from: String, to: String },
}

fn entity_at(path: String) -> FileEntity {
    FileEntity::new(path, "", 0, MIME_UNKNOWN, "")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "file_keeper=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let registry = StorageRegistry::new(StorageConfig::from_env());
    let coordinator = match &cli.disk {
        Some(name) => registry.disk(name).await?,
        None => registry.default_disk().await?,
    };
    info!("🗄️  Using {:?}", coordinator);

    match cli.command {
        Command::Store {
            files,
            formatter,
            entity_type,
            entity_id,
        } => {
            let mut options = UploadOptions::new();
            if let Some(name) = formatter {
                options = options.with_formatter(FormatterChoice::named(name));
            }
            if let (Some(entity_type), Some(entity_id)) = (entity_type, entity_id) {
                options = options.with_info(FormatInfo::for_entity(entity_type, entity_id));
            }

            let entities = coordinator
                .upload_many(files.into_iter().map(UploadSource::Path), &options)
                .await?;
            println!("{}", serde_json::to_string_pretty(&entities)?);
        }
        Command::Exists { path } => {
            let exists = coordinator.exists(&entity_at(path)).await;
            println!("{}", exists);
        }
        Command::Delete { path } => {
            let deleted = coordinator.delete(&entity_at(path)).await;
            println!("{}", deleted);
        }
        Command::Rename { from, to } => {
            let mut entity = entity_at(from);
            let renamed = coordinator.rename(&mut entity, &to).await;
            println!("{}", renamed);
        }
    }

    Ok(())
}
