//! User configuration stored in `~/.commander/.commanderconfig`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};

use crate::dispatch::{DEFAULT_MAX_WORKERS, DispatchOptions};
use crate::error::CommanderError;
use crate::session::{ConnectionSecurityOptions, SecurityLevel};

/// Name of the directory created in the home directory.
pub const COMMANDER_DIR_NAME: &str = ".commander";
/// Name of the configuration file inside the commander directory.
pub const CONFIG_FILE_NAME: &str = ".commanderconfig";
/// Name of the device store file inside the commander directory.
pub const STORE_FILE_NAME: &str = "devices.json";

pub const DEFAULT_DEVICE_TYPE: &str = "cisco_ios";
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 60;

/// Settings read from the configuration file.
///
/// Every field has a default, so a partial file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CommanderConfig {
    /// Directory holding the config file and the device store.
    pub commander_directory: PathBuf,
    /// Device store file; `devices.json` in the commander directory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
    /// Maximum number of devices worked on at the same time.
    pub max_workers: usize,
    /// Device type used when `device add` is not given one.
    pub default_device_type: String,
    /// Parameters merged into every new device unless it sets them itself.
    pub optional_parameters: BTreeMap<String, String>,
    /// Optional limit for one whole device session, in seconds.
    pub session_timeout_secs: Option<u64>,
    /// Time to wait for a command to return to a prompt, in seconds.
    pub command_timeout_secs: u64,
    /// SSH algorithm profile used unless a device sets `security`.
    pub security: SecurityLevel,
}

impl Default for CommanderConfig {
    fn default() -> Self {
        Self::with_directory(default_commander_directory())
    }
}

/// `~/.commander`, or `./.commander` when there is no home directory.
pub fn default_commander_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(COMMANDER_DIR_NAME)
}

impl CommanderConfig {
    /// Default configuration rooted at `directory`.
    pub fn with_directory(directory: impl Into<PathBuf>) -> Self {
        let commander_directory = directory.into();
        Self {
            commander_directory,
            store_path: None,
            max_workers: DEFAULT_MAX_WORKERS,
            default_device_type: DEFAULT_DEVICE_TYPE.to_string(),
            optional_parameters: BTreeMap::new(),
            session_timeout_secs: None,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            security: SecurityLevel::default(),
        }
    }

    /// The device store file, following `commander_directory` unless set explicitly.
    pub fn store_file(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| self.commander_directory.join(STORE_FILE_NAME))
    }

    pub fn config_path(&self) -> PathBuf {
        self.commander_directory.join(CONFIG_FILE_NAME)
    }

    /// Loads the config file at `path`. A missing or empty file yields defaults.
    pub fn load(path: &Path) -> Result<Self, CommanderError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("no config file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_str(&contents).map_err(|err| {
            CommanderError::Configuration(format!("invalid config file {}: {err}", path.display()))
        })?;
        config.validate()?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Loads from `path`, or from the default location when `None`.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, CommanderError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::load(&Self::default().config_path()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), CommanderError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CommanderError> {
        if self.max_workers == 0 {
            return Err(CommanderError::Configuration(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.command_timeout_secs == 0 {
            return Err(CommanderError::Configuration(
                "command_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            max_workers: self.max_workers,
            session_timeout: self.session_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn security_options(&self) -> ConnectionSecurityOptions {
        ConnectionSecurityOptions::for_level(self.security)
    }

    /// JSON Schema of the config file.
    pub fn schema_json() -> Result<String, CommanderError> {
        Ok(serde_json::to_string_pretty(&schema_for!(CommanderConfig))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CommanderConfig::with_directory("/tmp/cmdr");
        assert_eq!(config.max_workers, 60);
        assert_eq!(config.default_device_type, "cisco_ios");
        assert_eq!(config.command_timeout_secs, 60);
        assert_eq!(config.store_file(), PathBuf::from("/tmp/cmdr/devices.json"));
        assert_eq!(
            config.config_path(),
            PathBuf::from("/tmp/cmdr/.commanderconfig")
        );
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{"max_workers": 5, "security": "legacy_compatible"}"#).unwrap();

        let config = CommanderConfig::load(&path).unwrap();
        assert_eq!(config.max_workers, 5);
        assert_eq!(config.security, SecurityLevel::LegacyCompatible);
        assert_eq!(config.default_device_type, "cisco_ios");
        assert_eq!(config.dispatch_options().max_workers, 5);
    }

    #[test]
    fn store_follows_the_commander_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{"commander_directory": "/srv/cmdr"}"#).unwrap();
        let config = CommanderConfig::load(&path).unwrap();
        assert_eq!(config.store_file(), PathBuf::from("/srv/cmdr/devices.json"));

        fs::write(
            &path,
            r#"{"commander_directory": "/srv/cmdr", "store_path": "/vault/devices.json"}"#,
        )
        .unwrap();
        let config = CommanderConfig::load(&path).unwrap();
        assert_eq!(config.store_file(), PathBuf::from("/vault/devices.json"));
    }

    #[test]
    fn missing_and_empty_files_use_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        assert_eq!(
            CommanderConfig::load(&path).unwrap().max_workers,
            DEFAULT_MAX_WORKERS
        );
        fs::write(&path, "  \n").unwrap();
        assert_eq!(
            CommanderConfig::load(&path).unwrap().max_workers,
            DEFAULT_MAX_WORKERS
        );
    }

    #[test]
    fn zero_workers_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{"max_workers": 0}"#).unwrap();
        assert!(matches!(
            CommanderConfig::load(&path),
            Err(CommanderError::Configuration(_))
        ));
    }

    #[test]
    fn save_and_load_keep_every_field() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = CommanderConfig::with_directory(tmp.path());
        config.session_timeout_secs = Some(300);
        config
            .optional_parameters
            .insert("port".to_string(), "2222".to_string());
        config.save(&config.config_path()).unwrap();

        assert_eq!(CommanderConfig::load(&config.config_path()).unwrap(), config);
    }

    #[test]
    fn schema_lists_config_fields() {
        let schema = CommanderConfig::schema_json().unwrap();
        assert!(schema.contains("max_workers"));
        assert!(schema.contains("session_timeout_secs"));
    }
}
