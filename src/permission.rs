//! Permission levels and the mode-transition planner.
//!
//! A device session is always in one of three modes: user, enable
//! (privileged) or configuration. Before any user command is sent, the
//! session is moved to the requested [`PermissionLevel`] with the smallest
//! sequence of [`ModeOp`]s. Planning is a pure function of the two mode flags
//! the session reports, so it can be tested without a device.

use std::fmt;
use std::str::FromStr;

use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{CommanderError, DeviceError};
use crate::session::DeviceSession;

/// The privilege tier commands are executed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    User,
    Enable,
    #[serde(alias = "configure_terminal")]
    Configure,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::User => "user",
            PermissionLevel::Enable => "enable",
            PermissionLevel::Configure => "configure",
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionLevel {
    type Err = CommanderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "user" => Ok(PermissionLevel::User),
            "enable" => Ok(PermissionLevel::Enable),
            "configure" | "configure_terminal" | "config" => Ok(PermissionLevel::Configure),
            _ => Err(CommanderError::Configuration(format!(
                "unknown permission level '{s}', expected one of: user, enable, configure"
            ))),
        }
    }
}

/// One mode-change operation sent to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeOp {
    EnterEnable,
    ExitEnable,
    EnterConfig,
    ExitConfig,
}

/// Plans the mode changes needed to reach `target`.
///
/// `in_enable` is expected to be true while in configuration mode as well,
/// because configuration mode is only reachable through enable mode. Leaving
/// configuration mode for user level exits both modes.
pub fn plan_transition(in_config: bool, in_enable: bool, target: PermissionLevel) -> Vec<ModeOp> {
    match target {
        PermissionLevel::User => {
            if in_config {
                vec![ModeOp::ExitConfig, ModeOp::ExitEnable]
            } else if in_enable {
                vec![ModeOp::ExitEnable]
            } else {
                Vec::new()
            }
        }
        PermissionLevel::Enable => {
            if in_config {
                vec![ModeOp::ExitConfig]
            } else if !in_enable {
                vec![ModeOp::EnterEnable]
            } else {
                Vec::new()
            }
        }
        PermissionLevel::Configure => {
            if in_config {
                Vec::new()
            } else if in_enable {
                vec![ModeOp::EnterConfig]
            } else {
                vec![ModeOp::EnterEnable, ModeOp::EnterConfig]
            }
        }
    }
}

/// Moves a live session to `target` and returns the operations it applied.
pub async fn apply_transition(
    session: &mut dyn DeviceSession,
    target: PermissionLevel,
) -> Result<Vec<ModeOp>, DeviceError> {
    let in_config = session.check_config_mode().await?;
    let in_enable = session.check_enable_mode().await?;
    let plan = plan_transition(in_config, in_enable, target);
    debug!(
        "mode plan to {}: config={} enable={} ops={:?}",
        target, in_config, in_enable, plan
    );

    for op in &plan {
        match op {
            ModeOp::EnterEnable => session.enable().await?,
            ModeOp::ExitEnable => session.exit_enable_mode().await?,
            ModeOp::EnterConfig => session.config_mode().await?,
            ModeOp::ExitConfig => session.exit_config_mode().await?,
        }
    }
    Ok(plan)
}
