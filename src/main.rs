//! ClientCore command line.
//!
//! Opens the configured store and runs one command against it: seeding,
//! the dashboard, the proposal board, a raw collection dump or a single
//! request through the REST dispatcher.
//!
//! Logging goes to stderr via env_logger (`RUST_LOG`, default `info`);
//! command output goes to stdout as JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

use clientcore_lib::api::{self, ApiRequest, Method};
use clientcore_lib::entity::EntityKind;
use clientcore_lib::seed;
use clientcore_lib::services::{dashboard, proposals};
use clientcore_lib::state::{load_config, load_config_from, AppState};
use clientcore_lib::store::Collection;

#[derive(Parser)]
#[command(name = "clientcore", version, about = "Clients, proposals, projects and tasks in one local store")]
struct Cli {
    /// Config file (defaults to ~/.clientcore/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory, overriding the config's dataDir
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default records into empty collections
    Seed,
    /// Headline stats and recent activity
    Dashboard,
    /// Proposals grouped by pipeline column
    Board {
        /// Only proposals matching this text
        #[arg(long)]
        search: Option<String>,
    },
    /// Dump a stored collection as-is
    List {
        /// Short name (`clients`) or storage key (`clientcore_clients`)
        collection: String,
    },
    /// Send one request through the REST dispatcher
    Request {
        /// GET, POST, PUT, PATCH or DELETE
        method: String,
        /// Route, e.g. /clients or /proposals/kanban?search=acme
        path: String,
        /// Query parameter as key=value; repeatable
        #[arg(long = "query", value_name = "KEY=VALUE")]
        query: Vec<String>,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            log::error!("{}", e);
            ExitCode::from(2)
        }
    }
}

fn open_state(cli: &Cli) -> Result<AppState, String> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.to_string_lossy().into_owned());
    }
    AppState::from_config(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize output: {}", e))?;
    println!("{}", text);
    Ok(())
}

/// Returns `Ok(false)` when a request was answered with an error status.
fn run(cli: Cli) -> Result<bool, String> {
    let state = open_state(&cli)?;
    let storage = &state.storage;

    match cli.command {
        Command::Seed => {
            let report = seed::seed_defaults(storage).map_err(|e| format!("Seeding failed: {}", e))?;
            print_json(&report)?;
        }
        Command::Dashboard => {
            print_json(&dashboard::load_dashboard(
                storage,
                state.config.recent_activity_limit,
            ))?;
        }
        Command::Board { search } => {
            let board = proposals::board(storage, search.as_deref());
            print_json(&board)?;
            for summary in board.summaries() {
                log::info!(
                    "{}: {} proposal(s), {:.2} total",
                    summary.title,
                    summary.count,
                    summary.total_value
                );
            }
        }
        Command::List { collection } => {
            let collection = Collection::parse(&collection)
                .ok_or_else(|| format!("Unknown collection: {}", collection))?;
            let is_records = EntityKind::ALL
                .into_iter()
                .any(|kind| kind.collection() == collection);
            if is_records {
                print_json(&storage.load::<Value>(collection))?;
            } else {
                match storage.load_raw(collection) {
                    Some(raw) => println!("{}", raw),
                    None => log::info!("{} is empty", collection),
                }
            }
        }
        Command::Request {
            method,
            path,
            query,
            body,
        } => {
            let method: Method = method.parse()?;
            let mut request = ApiRequest::new(method, &path);
            for pair in &query {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("Query parameter must be key=value: {}", pair))?;
                request = request.with_query(key, value);
            }
            if let Some(body) = body {
                let body: Value =
                    serde_json::from_str(&body).map_err(|e| format!("Invalid JSON body: {}", e))?;
                request = request.with_body(body);
            }

            let response = api::dispatch(&state, &request);
            log::info!("{} {} -> {}", method, path, response.status);
            print_json(&response.body)?;
            return Ok(response.is_success());
        }
    }
    Ok(true)
}
