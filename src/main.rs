use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use llm_manager::LlmManager;
use model_manager::CatalogResolver;
use settings::ConfigManager;

/// LLM Manager - on-demand inference endpoint lifecycle
#[derive(Parser, Debug)]
#[command(name = "llm-manager", version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve newline-delimited JSON requests on stdin (default mode)
    ///
    /// Each line is `{"action": "create"|"status"|"delete"|"query", "body": {...}}`
    /// and gets exactly one JSON response line on stdout. The idle reaper
    /// runs in the background until EOF or Ctrl-C.
    Run,
    /// Run one idle reaper sweep and print its report
    Reap,
    /// Print the model catalog
    Catalog,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = Arc::new(
        ConfigManager::load(cli.config.as_deref()).context("failed to load configuration")?,
    );
    let _guard = logging::init_logging(&config_manager.settings().logging)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config_manager).await,
        Commands::Reap => {
            let manager = LlmManager::new(config_manager).await?;
            let report = manager.reap_once().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Catalog => {
            for descriptor in CatalogResolver::new().descriptors() {
                println!(
                    "{:<14} {:<34} {}",
                    descriptor.short_name, descriptor.backing_artifact_id, descriptor.hardware_class
                );
            }
            Ok(())
        }
        Commands::Config => {
            print!("{}", config_manager.to_toml()?);
            Ok(())
        }
    }
}

async fn run(config_manager: Arc<ConfigManager>) -> Result<()> {
    let manager = LlmManager::new(config_manager).await?;
    manager.start()?;

    info!("LLM manager ready, reading requests from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read request")?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        };

        let Some(line) = line else {
            info!("End of input");
            break;
        };

        if line.trim().is_empty() {
            continue;
        }

        let response = manager.handle_line(&line).await;
        let mut rendered = serde_json::to_vec(&response)?;
        rendered.push(b'\n');
        stdout.write_all(&rendered).await?;
        stdout.flush().await?;
    }

    if let Err(e) = manager.stop().await {
        warn!("Shutdown incomplete: {:#}", e);
    }

    Ok(())
}
