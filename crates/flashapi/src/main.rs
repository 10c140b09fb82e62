use anyhow::Result;
use dotenvy::dotenv;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use flashapi::cli::{Cli, Commands};
use flashapi::{run_server, AppState};
use flashcore::core::{init_logger, log_configuration};
use flashcore::{Config, MemoryStore, StateStore, Verifier};

/// Entry point
///
/// Parses CLI arguments and dispatches to the selected subcommand.
///
/// # Errors
/// Returns an error if configuration is malformed, the logger cannot be set up
/// or the server fails to bind.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present
    let _ = dotenv();

    let config = Config::from_env()?;
    init_logger(config.log_level, config.log_file_path.as_deref())?;

    match cli.command {
        Some(Commands::Serve { port, memory_store }) => serve(config, port, memory_store).await,
        Some(Commands::Verify { init_data, max_age }) => run_verify(&config, &init_data, max_age),
        Some(Commands::Sign {
            user_id,
            username,
            first_name,
            auth_date,
        }) => run_sign(&config, user_id, username, first_name, auth_date),
        None => {
            log::info!("No command specified, starting server");
            serve(config, None, false).await
        }
    }
}

async fn serve(config: Config, port: Option<u16>, memory_store: bool) -> Result<()> {
    log_configuration(&config);

    let store: Option<Arc<dyn StateStore>> = if memory_store {
        log::warn!("Using in-memory store; state is lost on restart");
        Some(Arc::new(MemoryStore::new()))
    } else {
        None
    };

    let state = AppState::from_config(&config, store)?;
    run_server(port.unwrap_or(config.port), state, &config.allowed_origin).await
}

fn run_verify(config: &Config, init_data: &str, max_age: Option<u64>) -> Result<()> {
    let verifier = Verifier::new(config.bot_token()?, max_age.unwrap_or(config.max_auth_age_secs));
    log::debug!("Verifying initData with a {}s window", verifier.max_age_secs());

    match verifier.verify(init_data) {
        Ok(identity) => {
            println!("{}", serde_json::to_string_pretty(&identity)?);
            Ok(())
        }
        Err(failure) => anyhow::bail!("initData rejected: {} ({})", failure.tag(), failure),
    }
}

fn run_sign(
    config: &Config,
    user_id: i64,
    username: Option<String>,
    first_name: Option<String>,
    auth_date: Option<i64>,
) -> Result<()> {
    let verifier = Verifier::new(config.bot_token()?, config.max_auth_age_secs);

    let mut user = Map::new();
    user.insert("id".to_string(), json!(user_id));
    if let Some(username) = username {
        user.insert("username".to_string(), Value::String(username));
    }
    if let Some(first_name) = first_name {
        user.insert("first_name".to_string(), Value::String(first_name));
    }
    let user = Value::Object(user).to_string();
    let auth_date = auth_date.unwrap_or_else(|| chrono::Utc::now().timestamp()).to_string();

    println!("{}", verifier.sign(&[("auth_date", &auth_date), ("user", &user)]));
    Ok(())
}
