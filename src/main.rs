//! Aerospike backup service.
//!
//! # Architecture Overview
//!
//! ```text
//!   --config (path, URL, or storage pointer with --remote)
//!        │
//!        ▼
//!   ┌──────────┐    ┌────────────┐    ┌───────────┐    ┌──────────────┐
//!   │ storage  │───▶│   config   │───▶│  holder   │───▶│  http API    │◀── clients
//!   │ accessor │    │ decode →   │    │ (ArcSwap) │    │ (admission   │
//!   │          │◀───│ validate → │◀───│           │◀───│  guarded     │
//!   └──────────┘    │ convert    │    └───────────┘    │  mutations)  │
//!     write-back    └────────────┘          ▲          └──────────────┘
//!                                           │
//!                        watcher / SIGHUP ──┘  reload
//! ```

use std::process::ExitCode;

use backup_service::lifecycle::{self, StartupOptions};
use clap::Parser;

#[derive(Parser)]
#[command(name = "backup-service")]
#[command(version, about = "Aerospike backup service", long_about = None)]
struct Cli {
    /// Address to listen on [default: 0.0.0.0, or service.http.address]
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on [default: 8080, or service.http.port]
    #[arg(long)]
    port: Option<u16>,

    /// Configuration file path or URL
    #[arg(short, long, default_value = "conf/config.yml")]
    config: String,

    /// Treat --config as a storage pointer to the real configuration
    #[arg(short, long)]
    remote: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let options = StartupOptions {
        config: cli.config,
        remote: cli.remote,
        host: cli.host,
        port: cli.port,
    };

    match lifecycle::run(options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "backup-service failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
