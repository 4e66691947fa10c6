use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cvt_gateway::api;
use cvt_gateway::cli::{Cli, Command, ConfigCommand};
use cvt_gateway::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, config_path) = cvt_gateway::cli::load_config(cli.config.as_ref())?;
            tracing::info!(config = %config_path.display(), "starting cvtailor");
            run_server(Arc::new(config)).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            if !cvt_gateway::cli::validate(cli.config.as_ref()) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _) = cvt_gateway::cli::load_config(cli.config.as_ref())?;
            cvt_gateway::cli::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("cvtailor {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

async fn run_server(config: Arc<cvt_domain::config::Config>) -> anyhow::Result<()> {
    let state = AppState::build(config.clone()).context("building app state")?;

    let app = api::router().with_state(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
