use anyhow::Result;
use clap::Args;

use crate::cli::confirm;
use crate::config::CommanderConfig;
use crate::init::{delete_project_files, init_commander, is_initialized};

#[derive(Args, Debug, Clone)]
pub struct InitCommand {
    /// Delete an existing commander directory and start over
    #[arg(long)]
    pub force: bool,

    /// Do not ask before deleting an existing directory
    #[arg(short, long)]
    pub yes: bool,
}

impl InitCommand {
    pub fn execute(&self, config: &CommanderConfig) -> Result<()> {
        println!("Welcome to commander!");
        let directory = &config.commander_directory;

        if is_initialized(config) {
            if !self.force {
                println!("commander is already initialized in {}", directory.display());
                return Ok(());
            }
            let question = format!(
                "this deletes {} including every stored device, continue?",
                directory.display()
            );
            if !self.yes && !confirm(&question)? {
                println!("aborted");
                return Ok(());
            }
            delete_project_files(directory)?;
            println!("deleted {}", directory.display());
        }

        let report = init_commander(config)?;
        for path in &report.created {
            println!("created {}", path.display());
        }
        println!("commander is initialized in {}", directory.display());
        Ok(())
    }
}
