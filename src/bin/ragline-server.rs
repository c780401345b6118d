//! ragline-server - HTTP entry point for the RAG service.
//!
//! Usage:
//!   ragline-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>   Path to configuration file (default: config.toml)
//!   --help, -h        Print this help message

use ragline::api;
use ragline::config::RaglineConfig;
use ragline::services::Services;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

struct Args {
    config_path: PathBuf,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config.toml"),
        }
    }
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut raw = std::env::args().skip(1);

    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--config" => {
                if let Some(path) = raw.next() {
                    args.config_path = PathBuf::from(path);
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {arg}");
                print_help();
                std::process::exit(1);
            }
        }
    }

    args
}

fn print_help() {
    println!("ragline-server - HTTP entry point for the RAG service");
    println!();
    println!("USAGE:");
    println!("    ragline-server [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --config <PATH>   Path to configuration file (default: config.toml)");
    println!("    --help, -h        Print this help message");
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config_found = args.config_path.exists();
    let config = if config_found {
        RaglineConfig::from_file(&args.config_path)?
    } else {
        RaglineConfig::default()
    };

    ragline::telemetry::init(&config.telemetry);

    info!("ragline-server v{}", ragline::VERSION);
    if !config_found {
        info!(path = %args.config_path.display(), "config file not found, using default configuration");
    }

    let bind_addr = config.server.bind_addr.clone();
    let services = Arc::new(Services::new(config).await?);
    let router = api::create_router(services);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(%bind_addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("ragline-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args();

    if let Err(e) = run(args).await {
        error!(error = %e, "server exited with an error");
        return Err(e);
    }

    Ok(())
}
