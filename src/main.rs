use clap::Parser;
use std::path::PathBuf;

use wicket::{Config, init_tracing, run};

/// Wicket - session-backed username/password authentication service
#[derive(Parser)]
#[command(name = "wicket")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a config file (defaults to the standard search locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen port from the config
    #[arg(short, long)]
    port: Option<u16>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let worker_threads = config.general.worker_threads;

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();

    if worker_threads > 0 {
        builder.worker_threads(worker_threads);
    }

    let runtime = builder.build()?;
    runtime.block_on(async {
        init_tracing(&config);
        run(config).await
    })
}
