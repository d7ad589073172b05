mod cli;
mod client;
mod config;
mod executor;
mod model;
mod probes;
mod registry;
mod scheduler;
mod server;
mod store;

use std::path::Path;
use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use config::Config;
use dotenv::dotenv;
use executor::CheckExecutor;
use log::{debug, error, info};
use scheduler::CheckScheduler;
use server::{AppState, Server};
use store::MemoryStore;
use tokio::signal;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let config = Config::new();
    debug!("Config: {:?}", config);

    // Parse the CLI arguments.
    let args = cli::Cli::parse();
    debug!("Parsed args: {:?}", args);

    match args.command {
        Some(cli::Commands::Server { command }) => match command {
            Some(cli::ServerCommands::Start) => run_server(&config).await,
            Some(cli::ServerCommands::Status) => report_status(&config).await,
            None => {}
        },
        None => {}
    }
}

/// Wires the store, executor, scheduler and REST server together, then runs
/// until a SIGINT arrives.
async fn run_server(config: &Config) {
    let store = Arc::new(MemoryStore::new());
    if let Some(path) = &config.definitions_file {
        match store.load_seed(Path::new(path)) {
            Ok(count) => info!("Loaded {} check definitions from {}.", count, path),
            Err(e) => {
                error!("Failed to load check definitions from {}: {}", path, e);
                exit(1);
            }
        }
    }

    let executor = match CheckExecutor::new(store.clone(), config.scheduler.pool_size) {
        Ok(executor) => Arc::new(executor),
        Err(e) => {
            error!("Failed to initialize the check executor: {}", e);
            exit(1);
        }
    };
    let scheduler = Arc::new(CheckScheduler::new(store.clone(), executor));
    scheduler.load_and_schedule_enabled().await;

    let state = AppState {
        store,
        scheduler: Arc::clone(&scheduler),
    };
    let mut server = Server::new();
    if server.start(&config.server, state).await.is_err() {
        exit(1);
    }

    // Keep running until a Ctrl+C / SIGINT signal is received.
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for the shutdown signal: {}", e);
    }
    info!("Received SIGINT, shutting down.");
    scheduler.shutdown();
    server.stop().await;
}

async fn report_status(config: &Config) {
    match client::fetch_info(&config.server).await {
        Ok(info) if info.name == env!("CARGO_PKG_NAME") => {
            println!(
                "running (version {}, {} targets, {} checks scheduled)",
                info.version, info.targets, info.scheduled_checks
            );
        }
        _ => println!("not running"),
    }
}
