//! Linked-brushing exploration server
//!
//! Loads a dataset, starts the rendering engine on it and serves the session
//! over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lb_core::events::PlotsDirtied;
use lb_core::Session;
use lb_data::CsvSource;
use lb_render::RasterEngine;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;
mod http;
mod rpc;

use config::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "linkbrush")]
#[command(about = "Linked-brushing data exploration server", long_about = None)]
#[command(version)]
struct Args {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dataset file, overrides the config
    #[arg(short, long)]
    dataset: Option<PathBuf>,

    /// Listen address, overrides the config
    #[arg(short, long)]
    bind: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn resolve_config(args: &Args) -> Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(dataset) = &args.dataset {
        config.dataset.path = dataset.clone();
    }
    if let Some(bind) = &args.bind {
        config.bind = bind.clone();
    }
    if config.dataset.path.as_os_str().is_empty() {
        anyhow::bail!("no dataset given: pass --dataset or set dataset.path in the config file");
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = resolve_config(&args)?;
    info!(dataset = %config.dataset.path.display(), "Starting linkbrush");

    let path = config.dataset.path.clone();
    let loader = CsvSource::new(config.dataset.clone());
    let (session, _engine) = Session::init(config.session.clone(), &loader, &path, RasterEngine::new)
        .await
        .context("session startup failed")?;

    session
        .events()
        .subscribe(|dirtied: &PlotsDirtied| debug!(plots = ?dirtied.plots, "Plots dirtied"));

    let session = Arc::new(session);
    let app = http::router(session.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    let local_addr = listener.local_addr()?;
    info!(
        fields = session.list_fields().len(),
        "Serving RPC on http://{local_addr}/rpc"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from(["linkbrush", "--dataset", "simdata.csv", "--bind", "0.0.0.0:9000"]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.dataset.path, PathBuf::from("simdata.csv"));
        assert_eq!(config.bind, "0.0.0.0:9000");
    }

    #[test]
    fn test_dataset_is_required() {
        let args = Args::parse_from(["linkbrush"]);
        assert!(resolve_config(&args).is_err());
    }
}
