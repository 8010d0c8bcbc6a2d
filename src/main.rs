use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use listings_api::api::{self, AppState};
use listings_api::config::{Config, DEFAULT_CONFIG_PATH};
use listings_api::db::DatabaseManager;
use listings_api::import::{ImportOptions, ImportSummary, Importer};
use listings_api::logging;

#[derive(Parser)]
#[command(name = "listings_api")]
#[command(about = "Real-estate listings API and CSV importer")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Import listings from a CSV file
    Import {
        /// CSV file with a header row
        file: PathBuf,
        /// Rows per committed batch; 0 imports the whole file in one transaction
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Create the database schema
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    let database = DatabaseManager::new(&config.database.path);

    match cli.command {
        Commands::Serve { port } => {
            database.run_migrations()?;
            let conn = database.get_connection()?;
            let port = port.unwrap_or(config.server.port);

            println!("🚀 Starting listings API on {}:{}", config.server.host, port);
            api::start_server(AppState::new(conn), &config.server.host, port).await?;
        }
        Commands::Import { file, batch_size } => {
            database.run_migrations()?;
            let mut conn = database.get_connection()?;
            let options = ImportOptions {
                batch_size: batch_size.unwrap_or(config.import.batch_size),
            };

            println!("📥 Importing listings from {}...", file.display());
            match Importer::new(options).import_file(&mut conn, &file) {
                Ok(summary) => print_summary(&summary),
                Err(e) => {
                    error!("Import failed: {}", e);
                    println!("❌ Import failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Migrate => {
            database.run_migrations()?;
            info!("Schema ready at {}", database.path().display());
            println!("✅ Database schema is up to date ({})", database.path().display());
        }
    }

    Ok(())
}

fn print_summary(summary: &ImportSummary) {
    println!("\n📊 Import Results:");
    println!("   Rows seen: {}", summary.rows_seen);
    println!("   Created: {}", summary.created);
    println!("   Updated: {}", summary.updated);
    println!("   Unchanged: {}", summary.skipped);
    println!("   Failed: {}", summary.failed);
    println!("   Malformed fields: {}", summary.malformed_fields);
    println!(
        "   New locations / buildings / owners / features: {} / {} / {} / {}",
        summary.dimensions_created.locations,
        summary.dimensions_created.buildings,
        summary.dimensions_created.owners,
        summary.dimensions_created.features
    );

    if !summary.failures.is_empty() {
        println!("\n⚠️  Rejected rows:");
        for failure in &summary.failures {
            match &failure.url {
                Some(url) => println!("   - line {} ({}): {}", failure.line, url, failure.reason),
                None => println!("   - line {}: {}", failure.line, failure.reason),
            }
        }
    }
}
