use bill_filters::args::{Args, Command};
use bill_filters::{commands, Config, Mode, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, trace};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().bills_home().path();

    // When BILLS_IN_TEST_MODE is set and non-empty the bills come from built-in sample data
    // instead of the server.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init(init_args) => {
            commands::init(home, init_args.server_url(), init_args.username())
                .await?
                .print()
        }

        Command::Summary(filter_args) => {
            let config = Config::load(home).await?;
            commands::summary(config, mode, filter_args.clone())
                .await?
                .print()
        }

        Command::List(filter_args) => {
            let config = Config::load(home).await?;
            commands::list(config, mode, filter_args.clone())
                .await?
                .print()
        }

        Command::Options(filter_args) => {
            let config = Config::load(home).await?;
            commands::options(config, mode, filter_args.clone())
                .await?
                .print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
