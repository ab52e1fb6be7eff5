use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ar_domain::config::Config;
use ar_gateway::bootstrap::{self, Bootstrap};
use ar_gateway::cli::{load_config, Cli, Command, ConfigCommand};
use ar_gateway::{api, cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    match args.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, path) = load_config(args.config.as_deref())?;
            if let Some(path) = &path {
                tracing::info!(path = %path.display(), "config loaded");
            }
            run_server(config).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, _) = load_config(args.config.as_deref())?;
            if !cli::config::validate(&config) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _) = load_config(args.config.as_deref())?;
            cli::config::show(&config);
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    let state = Bootstrap::new(config)
        .build()
        .context("building application state")?;
    bootstrap::start_background(&state);

    let addr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "agentrelay gateway listening");

    let app = api::router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    // Shutdown: stop timers, flush sessions to disk.
    state.drain_timer.stop();
    state
        .sessions
        .stop()
        .await
        .context("saving sessions on shutdown")?;
    tracing::info!("sessions saved, shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler failed");
    }
}
