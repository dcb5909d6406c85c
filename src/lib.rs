pub mod api;
pub mod cli;
mod commands;
pub mod config;
pub mod db;
pub mod error;
mod logging;
pub mod session;
pub mod triage;
mod validation;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use api::ApiClient;
use config::AppConfig;
use db::DbPool;
use error::AppError;
use session::{Session, SqliteTokenStore};

/// Everything a command needs, built once per invocation.
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub api: Arc<ApiClient>,
    pub session: Session,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        let db = db::init_db(&config.data_dir)?;
        let store = Arc::new(SqliteTokenStore::new(db.clone()));
        let api = Arc::new(ApiClient::new(&config)?.with_token_store(store)?);
        let session = Session::new(api.clone());
        Ok(Self {
            config,
            db,
            api,
            session,
        })
    }
}

fn load_config(args: &cli::CliArgs) -> Result<AppConfig, AppError> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(url) = &args.api_url {
        config.api_base_url = url.clone();
        config.validate()?;
    }
    Ok(config)
}

pub fn run() -> ExitCode {
    let args = cli::CliArgs::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("carebridge: {e}");
            return ExitCode::from(2);
        }
    };

    let _log_guard = logging::init(Some(&config.log_dir()));
    logging::install_crash_hook(&config.data_dir);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        api = %config.api_base_url,
        "Starting CareBridge"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("carebridge: failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async move {
        let mut state = AppState::new(config)?;
        commands::dispatch(&mut state, args.command).await
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(kind = e.kind(), error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
