use clap::{Args, Subcommand};
use std::path::PathBuf;

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

    /// Write a config file with the default values
    Init {
        /// Where to write it (defaults to the platform config directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

impl ConfigCommand {
    pub fn run(
        &self,
        config: &Config,
        config_path: Option<PathBuf>,
    ) -> Result<(), Box<dyn std::error::Error>> {
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
                                config_path
                                    .unwrap_or_else(Config::default_config_path)
                                    .display()
                            );
                        }
                        println!();

                        println!("database_path: {}", config.database_path.value.display());
                        println!("  source: {}", config.database_path.source);
                        println!();

                        println!("sort_by: {}", config.sort_by.value);
                        println!("  source: {}", config.sort_by.source);
                        println!();

                        println!("hide_completed: {}", config.hide_completed.value);
                        println!("  source: {}", config.hide_completed.source);
                        println!();

                        println!("settle_timeout_secs: {}", config.settle_timeout_secs.value);
                        println!("  source: {}", config.settle_timeout_secs.source);
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init { path } => {
                let target = path
                    .clone()
                    .or(config_path)
                    .unwrap_or_else(Config::default_config_path);
                Config::write_default(&target)?;
                println!("Wrote {}", target.display());
                Ok(())
            }
        }
    }
}
