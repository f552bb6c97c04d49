pub mod analysis;
pub mod assembler;
pub mod cache;
pub mod chat;
pub mod coerce;
pub mod columns;
pub mod commands;
pub mod config;
pub mod db;
pub mod export;
pub mod llm;
pub mod logging;
pub mod models;
pub mod risk;
pub mod sheets;
pub mod stats;
pub mod trends;
pub mod zscores;

#[cfg(test)]
mod test_utils;

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

use analysis::DEFAULT_PERIOD_DAYS;
use commands::data::{athlete_status, export_data, load_data, team_overview};
use commands::insights::{ask_question, get_insights, get_risk, InsightRequest};
use commands::{AppState, DataSource};
use config::AppConfig;
use sheets::SheetConfig;

#[derive(Parser, Debug)]
#[command(name = "squad-wellness", version, about = "Squad wellness survey pipeline")]
struct Cli {
  /// Read responses from a local CSV file instead of the configured sheet
  #[arg(long, global = true)]
  csv: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Load the source and print a summary of the table
  Load,
  /// Write the enriched table to a CSV file
  Export {
    #[arg(long, short)]
    out: PathBuf,
  },
  /// Generate a narrative for one athlete, a pair, or the team
  Insights {
    #[arg(long)]
    athlete: Option<String>,
    /// Second athlete to compare against
    #[arg(long, requires = "athlete")]
    compare: Option<String>,
    #[arg(long, conflicts_with = "athlete")]
    team: bool,
    #[arg(long, default_value_t = DEFAULT_PERIOD_DAYS)]
    days: i64,
    #[arg(long)]
    focus: Vec<String>,
  },
  /// Latest values with trends for an athlete, or team readiness by date
  Status {
    #[arg(long)]
    athlete: Option<String>,
  },
  /// Rule-based performance risk for an athlete
  Risk {
    #[arg(long)]
    athlete: String,
  },
  /// Ask a free-form question about an athlete or the team
  Ask {
    #[arg(long)]
    athlete: Option<String>,
    question: String,
  },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
  let json = serde_json::to_string_pretty(value).map_err(|e| format!("Failed to serialize output: {}", e))?;
  println!("{}", json);
  Ok(())
}

async fn execute(cli: Cli) -> Result<(), String> {
  let config = AppConfig::from_env().map_err(|e| e.to_string())?;

  let source = match cli.csv {
    Some(path) => DataSource::Csv(path),
    None => DataSource::Sheet(SheetConfig::from_env().map_err(|e| e.to_string())?),
  };

  let db = match db::initialize_db(&config.db_path).await {
    Ok(pool) => Some(pool),
    Err(e) => {
      tracing::warn!(error = %e, "snapshot database unavailable, continuing without fallback");
      None
    }
  };

  let mut state = AppState::new(config, source, db);
  let summary = load_data(&mut state).await?;

  match cli.command {
    Command::Load => print_json(&summary)?,
    Command::Export { out } => {
      let rows = export_data(&state, &out)?;
      println!("Exported {} rows to {}", rows, out.display());
    }
    Command::Insights {
      athlete,
      compare,
      team,
      days,
      focus,
    } => {
      let request = match (athlete, compare) {
        (Some(first), Some(second)) => InsightRequest::comparison(first, second, days),
        (Some(athlete), None) if !team => InsightRequest::individual(athlete, days),
        _ => InsightRequest::team(days),
      };
      let text = get_insights(&mut state, &request.with_focus(focus)).await?;
      println!("{}", text);
    }
    Command::Status { athlete: Some(athlete) } => match athlete_status(&state, &athlete)? {
      Some(status) => print_json(&status)?,
      None => return Err(format!("No data for athlete '{}'", athlete)),
    },
    Command::Status { athlete: None } => print_json(&team_overview(&state)?)?,
    Command::Risk { athlete } => match get_risk(&state, &athlete)? {
      Some(assessment) => print_json(&assessment)?,
      None => return Err(format!("No data for athlete '{}'", athlete)),
    },
    Command::Ask { athlete, question } => {
      let answer = ask_question(&mut state, athlete.as_deref(), &question).await?;
      println!("{}", answer);
    }
  }

  Ok(())
}

pub fn run() -> ExitCode {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();
  logging::init_logging();

  let cli = Cli::parse();

  let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
    Ok(runtime) => runtime,
    Err(e) => {
      eprintln!("Failed to start runtime: {}", e);
      return ExitCode::FAILURE;
    }
  };

  match runtime.block_on(execute(cli)) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      eprintln!("{}", e);
      ExitCode::FAILURE
    }
  }
}
