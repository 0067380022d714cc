/// CLI interface and commands.

/// Configuration commands.
pub mod config;

/// Device inventory, ping and deploy commands.
pub mod device;

/// Project initialization.
pub mod init;

use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use log::LevelFilter;

use crate::config::CommanderConfig;

#[derive(Parser)]
#[command(name = "commander", version)]
#[command(about = "Deploy commands to many network devices at once over SSH")]
pub struct Cli {
    /// Config file (default: ~/.commander/.commanderconfig)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Shorthand for --log-level debug
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Level filter for the logger; `--verbose` wins over `--log-level`.
    pub fn log_filter(&self) -> LevelFilter {
        if self.verbose {
            return LevelFilter::Debug;
        }
        LevelFilter::from_str(&self.log_level).unwrap_or(LevelFilter::Warn)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the commander directory, config file and device store
    Init(init::InitCommand),
    /// Print the commander version
    Version,
    /// Manage devices and deploy commands to them
    Device(device::DeviceCommand),
    /// Show the configuration or its JSON schema
    Config(config::ConfigCommand),
}

impl Commands {
    pub async fn execute(self, config: CommanderConfig) -> Result<()> {
        match self {
            Commands::Init(cmd) => cmd.execute(&config),
            Commands::Version => {
                println!("Commander version: {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
            Commands::Device(cmd) => cmd.execute(&config).await,
            Commands::Config(cmd) => cmd.execute(&config),
        }
    }
}

/// Asks a yes/no question on stdin. Anything but `y`/`yes` is a no.
pub fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N]: ");
    io::stdout().flush()?;

    let mut answer = String::new();
    if io::stdin().read_line(&mut answer)? == 0 {
        bail!("no answer on stdin, pass --yes to skip the confirmation");
    }
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

/// Prints a numbered list under a heading.
pub fn print_list<T: std::fmt::Display>(items: &[T], title: &str) {
    println!("\n{} ({})", title, items.len());
    println!("{}", "─".repeat(50));
    for (i, item) in items.iter().enumerate() {
        println!("{:3} - {}", i + 1, item);
    }
    println!("{}", "─".repeat(50));
}
