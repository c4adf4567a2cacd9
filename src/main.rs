// ==========================================
// Completed-trip import engine - CLI entry
// ==========================================
// import / query / alias / config over a SQLite database
// ==========================================

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use nemt_trip_import::config::config_keys;
use nemt_trip_import::{
    logging, ActualImportService, ConfigManager, ImportFilter, PartitionContext, TripFilter,
};
use serde::Serialize;
use std::path::PathBuf;

/// Completed-trip CSV import engine
#[derive(Parser, Debug)]
#[command(name = "nemt-trip-import", version)]
#[command(about = "Import completed-trip CSV exports and query committed trips")]
struct Cli {
    /// SQLite database path
    #[arg(long, global = true, env = "NEMT_IMPORT_DB")]
    db: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import one or more CSV files (concurrently)
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        partition: PartitionArgs,
    },

    /// Committed trips on a service date
    Trips {
        #[arg(long)]
        date: NaiveDate,

        /// Only trips of this driver (any registered spelling)
        #[arg(long)]
        driver: Option<String>,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Per-driver totals on a service date
    Summary {
        #[arg(long)]
        date: NaiveDate,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Committed import batches, newest first
    Imports {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Audit detail of one batch
    Batch { batch_id: String },

    /// Register a driver alias
    Alias { canonical: String, alias: String },

    /// List the spellings of a driver
    Aliases { canonical: String },

    /// Read or write import configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print every stored value
    Show,
    /// Store a value (e.g. import.default_opco_id)
    Set { key: String, value: String },
}

#[derive(clap::Args, Debug)]
struct PartitionArgs {
    /// Operating company
    #[arg(long)]
    opco: Option<String>,

    /// Broker (funding source)
    #[arg(long)]
    broker: Option<String>,

    /// Broker account; derived as BROKER_OPCO when omitted
    #[arg(long)]
    account: Option<String>,
}

impl PartitionArgs {
    fn to_partition(&self) -> Option<PartitionContext> {
        if self.opco.is_none() && self.broker.is_none() && self.account.is_none() {
            return None;
        }
        Some(PartitionContext::new(
            self.opco.clone().unwrap_or_default(),
            self.broker.clone().unwrap_or_default(),
            self.account.clone().unwrap_or_default(),
        ))
    }
}

#[derive(clap::Args, Debug)]
struct FilterArgs {
    #[arg(long)]
    opco: Option<String>,

    #[arg(long)]
    account: Option<String>,
}

impl FilterArgs {
    fn trip_filter(&self) -> TripFilter {
        TripFilter {
            opco_id: self.opco.clone(),
            broker_account_id: self.account.clone(),
        }
    }

    fn import_filter(&self) -> ImportFilter {
        ImportFilter {
            opco_id: self.opco.clone(),
            broker_account_id: self.account.clone(),
        }
    }
}

/// Default database location under the user data directory
fn default_db_path() -> PathBuf {
    match dirs::data_dir() {
        Some(data_dir) => {
            let dir = data_dir.join(nemt_trip_import::APP_NAME);
            std::fs::create_dir_all(&dir).ok();
            dir.join("trips.db")
        }
        None => PathBuf::from("./trips.db"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.log_json {
        logging::init_json();
    } else {
        logging::init();
    }

    let db_path = cli.db.clone().unwrap_or_else(default_db_path);
    let db_path = db_path
        .to_str()
        .context("database path is not valid UTF-8")?
        .to_string();
    tracing::info!(version = nemt_trip_import::VERSION, db = %db_path, "nemt-trip-import");

    match cli.command {
        Command::Config { action } => run_config(&db_path, action),
        command => run_service(&db_path, command).await,
    }
}

fn run_config(db_path: &str, action: ConfigAction) -> Result<()> {
    let config = ConfigManager::new(db_path)
        .map_err(|e| anyhow::anyhow!("cannot open config store: {}", e))?;
    match action {
        ConfigAction::Show => {
            let snapshot = config
                .get_config_snapshot()
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("{}", snapshot);
        }
        ConfigAction::Set { key, value } => {
            if !key.starts_with("import.") {
                bail!(
                    "unknown config key '{}' (expected e.g. {})",
                    key,
                    config_keys::DEFAULT_OPCO_ID
                );
            }
            config
                .set_config_value(&key, &value)
                .map_err(|e| anyhow::anyhow!("{}", e))?;
        }
    }
    Ok(())
}

async fn run_service(db_path: &str, command: Command) -> Result<()> {
    let service = ActualImportService::open_sqlite_with_stored_config(db_path)
        .context("cannot open trip database")?;

    match command {
        Command::Import { files, partition } => {
            let results = service.batch_import(files, partition.to_partition()).await;

            let mut failed = 0;
            for result in &results {
                match result {
                    Ok(import) => {
                        if !import.success {
                            failed += 1;
                        }
                        print_json(import)?;
                    }
                    Err(message) => {
                        failed += 1;
                        eprintln!("{}", message);
                    }
                }
            }
            if failed > 0 {
                bail!("{} of {} imports did not commit", failed, results.len());
            }
        }
        Command::Trips {
            date,
            driver,
            filter,
        } => {
            let trips = match driver {
                Some(driver) => {
                    let trip_filter = filter.trip_filter();
                    service
                        .get_actual_trips_by_driver_and_date(&driver, date)
                        .await?
                        .into_iter()
                        .filter(|t| trip_filter.matches(t))
                        .collect()
                }
                None => service.get_actual_trips_by_date(date, &filter.trip_filter()).await?,
            };
            print_json(&trips)?;
        }
        Command::Summary { date, filter } => {
            print_json(
                &service
                    .get_driver_summary_by_date(date, &filter.trip_filter())
                    .await?,
            )?;
        }
        Command::Imports { filter } => {
            print_json(&service.get_imports(&filter.import_filter()).await?)?;
        }
        Command::Batch { batch_id } => match service.get_import(&batch_id).await? {
            Some(batch) => print_json(&batch)?,
            None => bail!("no committed batch {}", batch_id),
        },
        Command::Alias { canonical, alias } => {
            let resolved = service.add_driver_alias(&canonical, &alias)?;
            println!("{} -> {}", alias, resolved);
        }
        Command::Aliases { canonical } => {
            print_json(&service.get_driver_aliases(&canonical)?)?;
        }
        Command::Config { action } => run_config(db_path, action)?,
    }

    Ok(())
}
