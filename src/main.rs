use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use pickscout::config::AppConfig;
use pickscout::pairwise_api::PairwiseClient;
use pickscout::picklist_export::write_picklist_xlsx;
use pickscout::scout_store::ScoutStore;
use pickscout::service::ScoutService;
use pickscout::tba::TbaClient;
use pickscout::ttl_cache::SystemClock;

const DEFAULT_FORMULA: &str = "#epa";

#[derive(Debug, Parser)]
#[command(name = "pickscout", version, about = "FRC scouting analytics and pick lists")]
struct Cli {
    /// SQLite scouting database.
    #[arg(long, global = true, env = "PICKSCOUT_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(flatten)]
    Query(QueryCommand),
    #[command(flatten)]
    Admin(AdminCommand),
}

/// Commands served through the match data and factorization services.
#[derive(Debug, Subcommand)]
enum QueryCommand {
    /// Pairwise variability analysis for every configured category.
    Analysis { event: String },
    /// Offense, defense and foul EPA from qualification results.
    Epa { event: String },
    /// Rank teams with a custom formula, e.g. "#epa + 10 * #teleop_climb_rate".
    Picklist {
        event: String,
        #[arg(default_value = DEFAULT_FORMULA)]
        formula: String,
        /// Also write the ranked list to an .xlsx workbook.
        #[arg(long)]
        xlsx: Option<PathBuf>,
    },
    /// Events of a season.
    Events { year: i32 },
}

/// Commands that only touch the local scouting database.
#[derive(Debug, Subcommand)]
enum AdminCommand {
    /// Delete all scouting rows for one event.
    ClearEvent { event: String },
    /// Delete every scouting row.
    ClearAll,
    /// Events that have scouting data.
    ScoutedEvents,
}

fn main() -> Result<()> {
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();
    if let Some(db) = cli.db {
        config.db_path = Some(db);
    }
    let db_path = config
        .db_path
        .clone()
        .context("unable to resolve sqlite path")?;
    let store = ScoutStore::open(&db_path)?;

    match cli.command {
        Command::Admin(command) => run_admin(&store, command),
        Command::Query(command) => {
            let matches = TbaClient::new(config.tba_base_url.clone(), config.tba_auth_key.clone());
            let factorizer = PairwiseClient::new(config.pairwise_url.clone());
            let service =
                ScoutService::new(config, matches, factorizer, store, Arc::new(SystemClock));
            run_query(&service, command)
        }
    }
}

fn run_admin(store: &ScoutStore, command: AdminCommand) -> Result<()> {
    match command {
        AdminCommand::ClearEvent { event } => {
            let removed = store.clear_event(&event)?;
            tracing::info!(event = %event, removed, "cleared event");
            print_json(&serde_json::json!({ "event_key": event, "removed": removed }))
        }
        AdminCommand::ClearAll => {
            let removed = store.clear_all()?;
            print_json(&serde_json::json!({ "removed": removed }))
        }
        AdminCommand::ScoutedEvents => print_json(&store.scouted_events()?),
    }
}

fn run_query(
    service: &ScoutService<TbaClient, PairwiseClient, ScoutStore>,
    command: QueryCommand,
) -> Result<()> {
    match command {
        QueryCommand::Analysis { event } => print_json(&service.run_analysis(&event)?),
        QueryCommand::Epa { event } => print_json(&service.epa_report(&event)?),
        QueryCommand::Picklist {
            event,
            formula,
            xlsx,
        } => {
            let report = service.run_picklist(&event, &formula)?;
            if let Some(path) = xlsx {
                write_picklist_xlsx(&path, &report.picklist)?;
                tracing::info!(path = %path.display(), "pick list exported");
            }
            print_json(&report)
        }
        QueryCommand::Events { year } => print_json(&service.events(year)?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{out}");
    Ok(())
}
