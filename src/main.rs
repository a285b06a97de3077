use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rowtrip::config::{self, Config};
use rowtrip::core::db::Database;

fn load(path: Option<PathBuf>) -> Result<Config, config::ConfigError> {
    match path {
        Some(path) => config::load_config(path),
        None => match Config::default_path() {
            Some(default) if default.exists() => config::load_config(default),
            _ => Ok(Config::default()),
        },
    }
}

fn main() -> ExitCode {
    // Parse CLI arguments
    let args: Vec<String> = std::env::args().collect();
    let config = match load(args.get(1).map(PathBuf::from)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize the logging system; RUST_LOG overrides the configured filter
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    info!("Starting rowtrip...");

    let database = match Database::open(&config.database) {
        Ok(database) => database,
        Err(e) => {
            error!("open failed: {}", e);
            eprintln!("Failed to open database {}: {}", config.database.path, e);
            return ExitCode::FAILURE;
        }
    };

    let outcome = database.ping().and_then(|_| database.close());
    match outcome {
        Ok(()) => {
            println!("ok: {}", config.database.path);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Database check failed ({}): {}", e.kind(), e);
            ExitCode::FAILURE
        }
    }
}
