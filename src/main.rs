#![cfg(not(tarpaulin_include))]

use codestreak::admin::AdminService;
use codestreak::app::{self, AppState};
use codestreak::daily::DailyQuestionService;
use codestreak::progress::ProgressService;
use codestreak::store::JsonStore;
use std::env;
use std::sync::Arc;

/// Main entry point for the challenge platform service.
///
/// Opens the file-backed store, wires the engines together, provisions a
/// first administrator from the environment when none exists, and serves
/// the API.
///
/// # Configuration
/// * `CODESTREAK_DATA_DIR` - Database directory (default `database`)
/// * `CODESTREAK_ADDR` - Bind address (default `127.0.0.1:3000`)
/// * `CODESTREAK_ADMIN_EMAIL` / `CODESTREAK_ADMIN_PASSWORD` - Seed admin
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let data_dir = env::var("CODESTREAK_DATA_DIR").unwrap_or_else(|_| "database".to_string());
    let addr = env::var("CODESTREAK_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());

    let store = JsonStore::open(&data_dir)?;
    log::info!("opened database directory {data_dir}");

    let state = Arc::new(AppState {
        daily: DailyQuestionService::new(store.clone(), store.clone()),
        progress: ProgressService::new(store.clone()),
        admin: AdminService::new(store.clone(), store.clone(), store.clone()),
        questions: store,
    });

    state.admin.seed_from_env()?;

    app::run(state, &addr).await
}
