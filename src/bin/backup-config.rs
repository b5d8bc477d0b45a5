use std::process::ExitCode;

use backup_service::config::codec::Format;
use backup_service::config::loader;
use backup_service::config::ConfigError;
use backup_service::storage::BootstrapOptions;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "backup-config")]
#[command(about = "Offline checks for backup-service configuration documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a configuration
    Validate {
        #[arg(short, long)]
        config: String,

        /// Treat --config as a storage pointer
        #[arg(short, long)]
        remote: bool,
    },
    /// Print the configuration with defaults filled in
    Show {
        #[arg(short, long)]
        config: String,

        #[arg(short, long)]
        remote: bool,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => Format::Json,
            OutputFormat::Yaml => Format::Yaml,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let options = BootstrapOptions::default();

    let result = match cli.command {
        Commands::Validate { config, remote } => validate(&config, remote, &options).await,
        Commands::Show { config, remote, format } => show(&config, remote, format.into(), &options).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error ({}): {}", e.stage(), e);
            ExitCode::FAILURE
        }
    }
}

async fn validate(location: &str, remote: bool, options: &BootstrapOptions) -> Result<(), ConfigError> {
    let (config, accessor) = loader::load(location, remote, options).await?;
    println!("{} is valid", accessor.location());
    println!("  clusters:        {}", config.aerospike_clusters.len());
    println!("  storage:         {}", config.storage.len());
    println!("  backup policies: {}", config.backup_policies.len());
    println!("  backup routines: {}", config.backup_routines.len());
    println!("  secret agents:   {}", config.secret_agents.len());
    Ok(())
}

async fn show(location: &str, remote: bool, format: Format, options: &BootstrapOptions) -> Result<(), ConfigError> {
    let (config, accessor) = loader::load(location, remote, options).await?;
    let document = backup_service::config::convert::Converter::new(options.retry)
        .to_dto(&config)
        .map_err(|source| ConfigError::Convert {
            location: accessor.location(),
            source,
        })?;
    let bytes = format.encode(&document).map_err(|source| ConfigError::Encode {
        location: accessor.location(),
        source,
    })?;
    println!("{}", String::from_utf8_lossy(&bytes).trim_end());
    Ok(())
}
