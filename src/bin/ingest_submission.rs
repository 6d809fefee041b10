use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use pickscout::config::default_db_path;
use pickscout::scout_store::{ScoutStore, ScoutSubmission};

/// Store one scouting submission (JSON) in the local database.
#[derive(Debug, Parser)]
struct Args {
    /// Submission file; reads stdin when omitted or "-".
    input: Option<PathBuf>,

    #[arg(long, env = "PICKSCOUT_DB")]
    db: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let raw = match args.input.as_deref() {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path)
            .with_context(|| format!("read submission {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read submission from stdin")?;
            buf
        }
    };
    let submission: ScoutSubmission =
        serde_json::from_str(&raw).context("invalid submission json")?;

    let db_path = args
        .db
        .or_else(default_db_path)
        .context("unable to resolve sqlite path")?;
    let mut store = ScoutStore::open(&db_path)?;
    let summary = store.save_submission(&submission)?;

    println!("Submission stored");
    println!("DB: {}", db_path.display());
    println!("Event: {} match {}", submission.event_key, submission.match_num);
    println!("Teams: {}", summary.teams_saved);
    println!("Comparisons: {}", summary.comparisons_saved);
    Ok(())
}
