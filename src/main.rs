//! # File Reader CLI (`file-reader`)
//!
//! ## Usage
//!
//! ```bash
//! file-reader [--config ./config/file-reader.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `file-reader serve` | Start the HTTP service and the diff janitor |
//! | `file-reader convert-pdf <pdf> [dir]` | Convert a PDF into a markdown file |
//! | `file-reader query-db` | Fetch the latest source row from Oracle |
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use file_reader::{config, dbquery, pdf, server};

/// Read, manage, and diff local text files over HTTP.
#[derive(Parser)]
#[command(name = "file-reader", version, about)]
struct Cli {
    /// Path to a TOML configuration file.
    ///
    /// When omitted, built-in defaults are used (bind `0.0.0.0:5000`,
    /// directories `files`, `doc` and `diff` under the working directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Also runs the janitor that deletes diff artifacts older than
    /// `[janitor].max_age_secs`.
    Serve {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Convert a PDF file to markdown.
    ///
    /// Writes `<name>.md` into OUTPUT_DIR, or into `./converted` when no
    /// directory is given or it is not writable.
    ConvertPdf {
        /// The PDF to convert.
        input: PathBuf,
        /// Directory for the generated markdown file.
        output_dir: Option<PathBuf>,
    },

    /// Run the Oracle source-history query.
    ///
    /// Requires ORACLE_USERNAME, ORACLE_PASSWORD, ORACLE_HOST, ORACLE_PORT and
    /// ORACLE_SERVICE_NAME (a `.env` file is honoured).
    QueryDb,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind } => {
            let mut cfg = match &cli.config {
                Some(path) => config::load_config(path)?,
                None => config::Config::default(),
            };
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            server::run_server(&cfg).await?;
        }
        Commands::ConvertPdf { input, output_dir } => {
            if let Err(e) = pdf::convert_pdf_to_markdown(&input, output_dir.as_deref()) {
                tracing::error!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::QueryDb => {
            if let Err(e) = tokio::task::spawn_blocking(dbquery::run_query).await? {
                tracing::error!("{:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
