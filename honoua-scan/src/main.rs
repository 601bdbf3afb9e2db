//! honoua-scan - barcode scanning and CO₂ cart tracking
//!
//! Zero-config startup: config file and data folder resolve through
//! CLI flag, environment, TOML, then platform defaults.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use honoua_common::config::{load_config, DataFolderInitializer, DataFolderResolver};
use honoua_common::db::{self, init_database};
use honoua_common::evolution::PeriodType;
use honoua_scan::{check_codes, App, HonouaClient};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "honoua-scan", version, about = "Scan products and track the CO₂ of your shopping")]
struct Cli {
    /// Config file (default: ~/.config/honoua/config.toml, or HONOUA_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Folder holding the local database (or HONOUA_DATA_FOLDER)
    #[arg(long, global = true)]
    data_folder: Option<PathBuf>,

    /// API base URL, overrides the config file
    #[arg(long, global = true, env = "HONOUA_API_BASE")]
    api_base: Option<String>,

    /// Never contact the API
    #[arg(long, global = true)]
    offline: bool,

    /// Machine-readable output
    #[arg(long, global = true)]
    json: bool,

    /// Latitude used for transport distances
    #[arg(long, global = true, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude used for transport distances
    #[arg(long, global = true, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate barcodes (exit code 1 if any is invalid)
    Check {
        #[arg(required = true)]
        codes: Vec<String>,
    },
    /// Replay decoder output ("<millis> <text>" per line) into the cart
    Scan {
        /// Decoder log (stdin when omitted)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Accept repeat scans of products already in the cart
        #[arg(long)]
        yes: bool,
    },
    /// Show the CO₂ record of one product
    Lookup { ean: String },
    /// Inspect or change the cart
    Cart {
        #[command(subcommand)]
        action: Option<CartAction>,
    },
    /// Annual CO₂ budget
    Budget,
    /// CO₂ evolution per period
    Evolution {
        #[arg(long, default_value = "month")]
        period: PeriodType,
    },
    /// Personal CO₂ challenges
    Challenges,
    /// Show or set the household size (1-12)
    Household { size: Option<f64> },
}

#[derive(Subcommand)]
enum CartAction {
    Show,
    Remove { ean: String },
    Clear,
    /// Record the cart in history and empty it
    Validate,
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let loaded = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&loaded.config.logging.level);
    debug!("Starting honoua-scan v{}", env!("CARGO_PKG_VERSION"));
    loaded.log_source();

    let config = loaded.config;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Command::Check { codes } = &cli.command {
        let all_valid = check_codes(codes, cli.json, &mut out)?;
        return Ok(if all_valid { ExitCode::SUCCESS } else { ExitCode::FAILURE });
    }

    let data_folder = DataFolderResolver::new()
        .with_cli_arg(cli.data_folder.clone())
        .with_config(&config)
        .resolve();
    let initializer = DataFolderInitializer::new(data_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create data folder")?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let client = if cli.offline {
        None
    } else {
        let base = cli.api_base.as_deref().unwrap_or_else(|| config.api_base());
        let user_id = db::user_id(&pool).await?;
        Some(HonouaClient::new(base)?.with_user_id(user_id))
    };

    let app = App {
        pool,
        client,
        config,
        location: cli.lat.zip(cli.lon),
        json: cli.json,
    };

    let ok = match cli.command {
        Command::Check { .. } => true,
        Command::Scan { input, yes } => {
            match input {
                Some(path) => {
                    let file = File::open(&path)
                        .with_context(|| format!("Failed to open {}", path.display()))?;
                    app.scan(BufReader::new(file), yes, &mut out).await?;
                }
                None => {
                    let stdin = io::stdin();
                    app.scan(stdin.lock(), yes, &mut out).await?;
                }
            }
            true
        }
        Command::Lookup { ean } => app.lookup(&ean, &mut out).await?,
        Command::Cart { action } => match action.unwrap_or(CartAction::Show) {
            CartAction::Show => {
                app.cart_show(&mut out).await?;
                true
            }
            CartAction::Remove { ean } => app.cart_remove(&ean, &mut out).await?,
            CartAction::Clear => {
                app.cart_clear(&mut out).await?;
                true
            }
            CartAction::Validate => app.cart_validate(&mut out).await?,
        },
        Command::Budget => {
            app.budget(&mut out).await?;
            true
        }
        Command::Evolution { period } => {
            app.evolution(period, &mut out).await?;
            true
        }
        Command::Challenges => {
            app.challenges(&mut out).await?;
            true
        }
        Command::Household { size } => {
            app.household(size, &mut out).await?;
            true
        }
    };

    out.flush()?;
    app.pool.close().await;

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
