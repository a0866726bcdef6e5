use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use clap::error::ErrorKind;
use plaincache::Server;
use plaincache::config::{Cli, Config, usage};
use tracing::{error, info};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

fn program_name() -> String {
    std::env::args_os()
        .next()
        .as_deref()
        .and_then(|arg0| Path::new(arg0).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let server = Server::bind(config)
        .await
        .context("failed to start server")?;
    info!("Server listening on: {}", server.local_addr());

    Arc::new(server)
        .run_until_ctrl_c()
        .await
        .context("server stopped with an error")?;
    info!("Server stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            if e.kind() != ErrorKind::MissingRequiredArgument {
                println!("{}", e);
            }
            print!("{}", usage(&program_name()));
            return ExitCode::FAILURE;
        }
    };

    init_tracing();
    info!("Starting plaincache - in-memory key/value store over HTTP");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match Config::from_cli(&cli).await {
        Ok(config) => config,
        Err(e) => {
            println!("error resolving address: {}\n", e);
            print!("{}", usage(&program_name()));
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = serve(config).await {
        error!("{:#}", e);
        println!("{:#}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
