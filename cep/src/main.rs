mod cli;
mod config;

use std::{process, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use race::{HttpFetcher, Racer};
use tracing_subscriber::EnvFilter;

use crate::{cli::Cli, config::Config};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        tracing::debug!(?err, "lookup failed");
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let timeout = match cli.timeout {
        Some(timeout) => timeout,
        None => config.timeout()?,
    };

    let fetcher = HttpFetcher::new(config.http_options()).context("failed to build HTTP client")?;
    let racer = Racer::new(Arc::new(fetcher), config.templates());

    let resp = racer.race(&cli.cep, timeout).await?;
    println!("{}", serde_json::to_string_pretty(&resp)?);

    Ok(())
}
