//! festhub CLI
//!
//! Local execution entry point over the file-backed blob store. Pass
//! `--s3` (feature `s3`) to operate against S3 instead.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use festhub::{
    config::Config,
    error::Result,
    services::{DepartmentCache, DepartmentService, RegistrationMirror, RegistrationService},
    storage::{BlobStore, LocalBlobStore, LocalKvStore, required_buckets},
};

/// festhub - festival event and registration data tool
#[derive(Parser, Debug)]
#[command(name = "festhub", version, about = "Festival event and registration data tool")]
struct Cli {
    /// Path to the data directory (config, local blobs, key-value store)
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Use the S3 backend instead of the local directory store
    #[cfg(feature = "s3")]
    #[arg(long)]
    s3: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show a department's data (resolved through the fallback chain)
    Show {
        /// Department code, e.g. "cse"
        code: String,
    },

    /// Search events by name across departments
    Search {
        query: String,

        /// Restrict the search to one department code
        #[arg(long)]
        department: Option<String>,
    },

    /// Export a department document as pretty-printed JSON
    Export {
        code: String,

        /// Output file (default: {code}_data.json in the current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Import a department document from a JSON file
    Import {
        code: String,
        file: PathBuf,
    },

    /// Import a registration CSV and print the computed statistics
    ImportCsv { file: PathBuf },

    /// Show the current registration count and per-department breakdown
    Stats,

    /// Show the upload-history ledger
    History,

    /// List stored registration CSV files
    ListFiles,

    /// Delete all stored registration data
    DeleteRegistrations,

    /// Create any missing storage buckets
    EnsureBuckets,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

async fn make_store(cli: &Cli) -> Result<Arc<dyn BlobStore>> {
    #[cfg(feature = "s3")]
    if cli.s3 {
        return Ok(Arc::new(festhub::storage::S3BlobStore::from_env().await?));
    }

    Ok(Arc::new(LocalBlobStore::new(cli.data_dir.join("blobs"))))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.data_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);

    let store = make_store(&cli).await?;
    let kv = LocalKvStore::new(cli.data_dir.join("kv"));
    let cache = Arc::new(DepartmentCache::new(config.cache_ttl_ms));
    let departments = DepartmentService::new(Arc::clone(&store), kv.clone(), cache, &config);
    let registrations = RegistrationService::new(
        Arc::clone(&store),
        kv,
        Arc::new(RegistrationMirror::new()),
        &config,
    );

    match cli.command {
        Command::Show { code } => {
            let data = departments.get_department_data(&code).await;
            println!("{}", serde_json::to_string_pretty(&data)?);
        }

        Command::Search { query, department } => {
            let hits = departments
                .search_events(&query, department.as_deref())
                .await;
            if hits.is_empty() {
                log::info!("No events matched \"{}\"", query);
            }
            for hit in hits {
                println!(
                    "[{}] {} — {} on {}",
                    hit.department_code, hit.event.event_name, hit.event.venue, hit.event.date
                );
            }
        }

        Command::Export { code, out } => {
            let (file_name, json) = departments.export_json(&code).await?;
            let path = out.unwrap_or_else(|| PathBuf::from(&file_name));
            std::fs::write(&path, json)?;
            log::info!("Exported {} to {}", code, path.display());
        }

        Command::Import { code, file } => {
            let bytes = std::fs::read(&file)?;
            let outcome = departments.import_json(&code, &bytes).await?;
            log::info!("Imported {}: {:?}", code, outcome);
        }

        Command::ImportCsv { file } => {
            let text = std::fs::read_to_string(&file)?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload.csv".to_string());

            let stats = registrations.import_csv(&name, &text).await?;
            println!("Total registrations: {}", stats.total);
            for entry in &stats.department_breakdown {
                println!("  {:<12} {:>6}  {:>3}%", entry.department, entry.count, entry.percent);
            }
        }

        Command::Stats => {
            let data = registrations.registration_data().await;
            println!("Total registrations: {}", data.count);
            println!("Stored CSV files: {}", data.files.len());
        }

        Command::History => {
            let items = registrations.upload_history().await;
            if items.is_empty() {
                println!("No uploads recorded.");
            }
            for item in items {
                println!("{}  {:<30} {}", item.date, item.name, item.size);
            }
        }

        Command::ListFiles => {
            let data = registrations.registration_data().await;
            for file in data.files {
                println!("{}  {:>8} B  {}", file.created_at, file.size, file.name);
            }
        }

        Command::DeleteRegistrations => {
            if registrations.delete_all_registration_data().await {
                log::info!("All registration data deleted.");
            } else {
                log::error!("Could not delete all registration data.");
                std::process::exit(1);
            }
        }

        Command::EnsureBuckets => {
            store.ensure_buckets(&required_buckets(&config.buckets)).await;
            log::info!("Buckets checked.");
        }
    }

    Ok(())
}
