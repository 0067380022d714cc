//! Creation and removal of the commander directory.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::config::CommanderConfig;
use crate::error::CommanderError;
use crate::store::JsonStore;

/// Files created by [`init_commander`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InitReport {
    pub created: Vec<PathBuf>,
}

impl InitReport {
    pub fn already_initialized(&self) -> bool {
        self.created.is_empty()
    }
}

/// True when the directory, a readable config file and the store all exist.
pub fn is_initialized(config: &CommanderConfig) -> bool {
    if !config.commander_directory.is_dir() {
        debug!(
            "commander is not initialized in {}",
            config.commander_directory.display()
        );
        return false;
    }
    let store_file = config.store_file();
    if !store_file.is_file() {
        debug!("no device store at {}", store_file.display());
        return false;
    }
    let config_path = config.config_path();
    let parses = fs::read_to_string(&config_path)
        .ok()
        .and_then(|contents| serde_json::from_str::<serde_json::Value>(&contents).ok())
        .is_some();
    if !parses {
        debug!("no valid config file at {}", config_path.display());
    }
    parses
}

/// Creates whatever is missing of the commander directory, config file and
/// device store. Existing files are left untouched.
pub fn init_commander(config: &CommanderConfig) -> Result<InitReport, CommanderError> {
    let mut report = InitReport::default();
    if is_initialized(config) {
        debug!("commander is already initialized");
        return Ok(report);
    }

    let directory = &config.commander_directory;
    if directory.exists() && !directory.is_dir() {
        return Err(CommanderError::Configuration(format!(
            "{} is a file and not a folder",
            directory.display()
        )));
    }
    if !directory.exists() {
        fs::create_dir_all(directory)?;
        info!("created directory {}", directory.display());
        report.created.push(directory.clone());
    }

    let config_path = config.config_path();
    if !config_path.is_file() {
        config.save(&config_path)?;
        info!("created config file {}", config_path.display());
        report.created.push(config_path);
    }

    let store_file = config.store_file();
    if !store_file.is_file() {
        JsonStore::create(&store_file)?;
        info!("created device store {}", store_file.display());
        report.created.push(store_file);
    }
    Ok(report)
}

/// Deletes the commander directory and everything in it.
pub fn delete_project_files(directory: &Path) -> Result<(), CommanderError> {
    if !directory.is_dir() {
        return Err(CommanderError::Configuration(format!(
            "directory {} doesn't exist",
            directory.display()
        )));
    }
    info!("deleting directory {}", directory.display());
    fs::remove_dir_all(directory)?;
    Ok(())
}
