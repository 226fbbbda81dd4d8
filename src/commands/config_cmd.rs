use clap::{Args, Subcommand};

use super::OutputFormat;
use crate::config::Config;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!("data_dir: {}", config.data_dir.value.display());
                        println!("  source: {}", config.data_dir.source);
                        println!();

                        println!("api_url: {}", config.api_url.value);
                        println!("  source: {}", config.api_url.source);
                        println!(
                            "api_key: {}",
                            if config.api_key.is_some() { "(set)" } else { "(not set)" }
                        );
                        println!();

                        println!("owner_id: {}", config.owner_id.value);
                        println!("  source: {}", config.owner_id.source);
                        println!();

                        let sync = &config.sync;
                        println!("sync:");
                        println!("  auto_sync: {}", sync.auto_sync);
                        println!("  sync_interval_ms: {}", sync.sync_interval_ms);
                        println!("  max_queue_size: {}", sync.max_queue_size);
                        println!("  max_retries: {}", sync.max_retries);
                        println!("  attempts_per_cycle: {}", sync.attempts_per_cycle);
                        println!("  retry_delay_ms: {}", sync.retry_delay_ms);
                        println!(
                            "  conflict_strategy: {}",
                            serde_json::to_value(sync.conflict_strategy)?
                                .as_str()
                                .unwrap_or_default()
                        );
                    }
                }
                Ok(())
            }
        }
    }
}
