use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::CommanderConfig;

#[derive(Args, Debug, Clone)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the JSON schema of the config file
    Schema,
}

impl ConfigCommand {
    pub fn execute(&self, config: &CommanderConfig) -> Result<()> {
        match self.action {
            ConfigAction::Show => println!("{}", serde_json::to_string_pretty(config)?),
            ConfigAction::Schema => println!("{}", CommanderConfig::schema_json()?),
        }
        Ok(())
    }
}
