//! BigDaddyG bridge binary
//!
//! Serves the HTTP API by default; `config`, `scan`, `pull` and `rm` are
//! one-shot subcommands.

use bigdaddyg_bridge::{
    bridge::Bridge,
    cli::{Cli, Command, generate_config_template},
    config::Config,
    handlers::{self, AppState},
    telemetry,
};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Config { output } => write_template(output.as_deref()),
        Command::Serve => serve(&cli.config).await,
        Command::Scan => scan(&cli.config).await,
        Command::Pull { model } => lifecycle(&cli.config, &model, true).await,
        Command::Rm { model } => lifecycle(&cli.config, &model, false).await,
    }
}

fn write_template(output: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let template = generate_config_template();
    match output {
        Some(path) => {
            std::fs::write(path, template)?;
            eprintln!("Configuration template written to {}", path);
        }
        None => print!("{}", template),
    }
    Ok(())
}

fn load_config(path: &str) -> Result<Config, Box<dyn std::error::Error>> {
    let config = Config::load_or_default(path)?;
    telemetry::init(&config.observability.log_level);
    Ok(config)
}

async fn serve(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([127, 0, 0, 1])),
        config.server.port,
    ));

    let bridge = Arc::new(Bridge::initialize(config).await?);
    let status = bridge.check_backends().await;
    tracing::info!(
        orchestra = status.orchestra,
        ollama = status.ollama,
        models = bridge.catalog().len(),
        "Backend connectivity at startup"
    );

    let app = handlers::app(AppState::new(bridge));

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn scan(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let bridge = Bridge::initialize(config).await?;
    println!("{}", serde_json::to_string_pretty(&bridge.catalog().list())?);
    Ok(())
}

async fn lifecycle(
    config_path: &str,
    model: &str,
    pull: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let lifecycle = bigdaddyg_bridge::backends::ModelLifecycle::from_config(&config.backends);

    let outcome = if pull {
        lifecycle.pull(model).await
    } else {
        lifecycle.remove(model).await
    };

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if outcome.success {
        Ok(())
    } else {
        Err(outcome.error.into())
    }
}
