use std::{fs, path::PathBuf};

use clap::{Parser, Subcommand};
use cinevault::{
    config::{default_config_path, CineConfig},
    server::CineServer,
    LogFormat,
};
use tokio::runtime::Runtime;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "CineVault movie review service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the REST server
    Serve {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Write a default configuration file
    Init {
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
    /// Validate configuration without starting the server
    Check {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve { config } => {
            let cfg = CineConfig::load(config)?;
            init_tracing(cfg.telemetry.log_format);
            if let Err(err) = cfg.validate() {
                error!(%err, "refusing to start");
                return Err(err.into());
            }
            info!(bind_addr = %cfg.rest.bind_addr, "CineVault starting");
            let rt = Runtime::new()?;
            rt.block_on(async move {
                let server = CineServer::new(cfg)?;
                server.run().await
            })?;
            info!("CineVault shutdown complete");
        }
        Command::Init { path } => {
            init_tracing(LogFormat::Compact);
            let path = path.unwrap_or_else(default_config_path);
            if path.exists() {
                println!("Configuration already exists at {}", path.display());
            } else {
                let cfg = CineConfig::template();
                if let Some(dir) = path.parent() {
                    fs::create_dir_all(dir)?;
                }
                let serialized = serde_yaml::to_string(&cfg)?;
                fs::write(&path, serialized)?;
                println!("Initialized configuration at {}", path.display());
            }
        }
        Command::Check { config } => {
            init_tracing(LogFormat::Compact);
            let cfg = CineConfig::load(config)?;
            cfg.validate()?;
            println!("Configuration OK");
        }
    }
    Ok(())
}
