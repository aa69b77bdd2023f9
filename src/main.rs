//! scb_rental - operator CLI for the loan engine
//!
//! Drives the loan engine against the PostgreSQL store configured in
//! `config/<env>.yaml`:
//!
//! ```text
//! scb_rental [-e ENV] migrate
//! scb_rental [-e ENV] open    <rider-document> <dock-id>
//! scb_rental [-e ENV] close   <rider-document> <dock-id>
//! scb_rental [-e ENV] history <rider-document>
//! scb_rental [-e ENV] active  <rider-document>
//! scb_rental [-e ENV] loan    <loan-id>
//! ```
//!
//! Results are printed to stdout as JSON, engine errors to stderr as JSON.

use std::sync::Arc;

use anyhow::{Context, bail};
use serde_json::json;

use scb_rental::config::AppConfig;
use scb_rental::core_types::DockId;
use scb_rental::db::Database;
use scb_rental::loan::{
    LoanEngine, LoanError, LogNotifier, NotificationWorker, SimulatedCardGateway,
    notification_channel,
};

const USAGE: &str = "usage: scb_rental [--env ENV] \
    <migrate | open DOC DOCK | close DOC DOCK | history DOC | active DOC | loan LOAN_ID>";

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Command line minus the program name and the `--env` option
fn positional_args() -> Vec<String> {
    let mut out = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--env" || arg == "-e" {
            args.next();
            continue;
        }
        out.push(arg);
    }
    out
}

fn parse_dock(arg: Option<&String>) -> anyhow::Result<DockId> {
    let raw = arg.context(USAGE)?;
    raw.parse()
        .with_context(|| format!("invalid dock id: {}", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env)?;
    let _log_guard = scb_rental::logging::init_logging(&app_config)?;

    tracing::info!(
        git_hash = env!("GIT_HASH"),
        "Starting scb_rental in {} mode",
        env
    );

    let args = positional_args();
    let Some(command) = args.first().map(String::as_str) else {
        bail!(USAGE);
    };

    let postgres_url = app_config
        .postgres_url
        .as_deref()
        .context("postgres_url is not configured")?;
    let db = Database::connect(postgres_url, app_config.postgres_pool_size)
        .await
        .context("Failed to connect to PostgreSQL")?;
    db.health_check().await?;
    let store = db.resource_store();

    if command == "migrate" {
        store.ensure_schema().await?;
        println!("{}", json!({ "migrated": true }));
        return Ok(());
    }

    let (tx, rx) = notification_channel(app_config.notifications.queue_size);
    let worker = tokio::spawn(NotificationWorker::new(rx, Arc::new(LogNotifier)).run());

    let engine = LoanEngine::new(
        Arc::new(store),
        app_config.loans.fee_policy(),
        Arc::new(SimulatedCardGateway),
        tx,
        app_config.loans.engine_settings(),
    );

    let result: Result<serde_json::Value, LoanError> = match (command, args.get(1)) {
        ("open", Some(rider)) => {
            let dock_id = parse_dock(args.get(2))?;
            engine
                .open_loan(rider, dock_id)
                .await
                .map(|loan| json!(loan))
        }
        ("close", Some(rider)) => {
            let dock_id = parse_dock(args.get(2))?;
            engine
                .close_loan(rider, dock_id)
                .await
                .map(|closed| json!(closed))
        }
        ("history", Some(rider)) => engine.loan_history(rider).await.map(|loans| json!(loans)),
        ("active", Some(rider)) => engine.active_loan(rider).await.map(|loan| json!(loan)),
        ("loan", Some(loan_id)) => engine.get_loan(loan_id).await.map(|loan| json!(loan)),
        _ => bail!(USAGE),
    };

    // Last sender goes with the engine, the worker drains and exits
    drop(engine);
    worker.await.context("notification worker panicked")?;

    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            eprintln!(
                "{}",
                json!({ "code": e.code(), "status": e.http_status(), "message": e.to_string() })
            );
            bail!("{} failed: {}", command, e.code())
        }
    }
}
