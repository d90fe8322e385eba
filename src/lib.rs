pub mod app;
pub mod cli;
pub mod commands;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod output;
pub mod shell;
pub mod state;

use clap::Parser;

use cli::{Cli, Command};
use error::AppError;
use state::Session;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .try_init();
}

async fn one_shot(
    session: &Session,
    descriptor: models::ConnectionDescriptor,
    flow: &cli::Flow,
    json: bool,
) -> Result<(), AppError> {
    commands::connect(session, descriptor).await?;
    app::execute(session, flow, json).await?;
    Ok(())
}

/// Parse the command line, connect and run the requested flow.
pub async fn run() -> Result<(), AppError> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let descriptor = cli.connection.descriptor()?;
    let session = Session::new(cli.settings());
    log::debug!("target {}", descriptor.display_target());

    let result = match &cli.command {
        Command::Shell => shell::run(&session, descriptor, cli.json).await,
        Command::Flow(flow) => one_shot(&session, descriptor, flow, cli.json).await,
    };

    session.close_all().await;
    result
}
