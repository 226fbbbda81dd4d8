use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod engine;

use commands::{ConfigCommand, ItemCommand, OutfitCommand, SyncCommand};
use config::Config;
use engine::Engine;

#[derive(Parser)]
#[command(name = "closet")]
#[command(version)]
#[command(about = "An offline-first wardrobe manager", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log sync activity to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage wardrobe items
    Item(ItemCommand),

    /// Manage outfits
    Outfit(OutfitCommand),

    /// Sync queued changes with the server
    Sync(SyncCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "closet=debug,closet_core=debug"
    } else {
        "closet=warn,closet_core=warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Item(cmd)) => {
            let engine = Engine::start(&config).await?;
            cmd.run(&engine, &config).await?;
        }
        Some(Commands::Outfit(cmd)) => {
            let engine = Engine::start(&config).await?;
            cmd.run(&engine, &config).await?;
        }
        Some(Commands::Sync(cmd)) => {
            let engine = Engine::start(&config).await?;
            cmd.run(&engine, &config).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
