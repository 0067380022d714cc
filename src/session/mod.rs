//! Device sessions and the transports that open them.
//!
//! The executor talks to devices only through two traits: a [`Transport`]
//! opens one [`DeviceSession`] per device, and the session exposes the small
//! set of operations the permission planner and the executor need. The SSH
//! implementation lives in [`SshTransport`]/[`SshSession`]; tests plug in
//! scripted transports.
//!
//! # Main Components
//!
//! - [`Transport`] - Opens sessions from [`ConnectionParams`]
//! - [`DeviceSession`] - Mode checks, mode changes and command execution
//! - [`SshTransport`] - SSH transport with template-driven prompt detection
//! - [`ConnectionSecurityOptions`] - SSH algorithm and host-key policy

use async_ssh2_tokio::client::{AuthMethod, Client};
use async_ssh2_tokio::{Config, ServerCheckMethod};
use async_trait::async_trait;
use log::{debug, trace};
use russh::{ChannelMsg, Preferred};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::device::{ConnectionParams, SECURITY_PARAM};
use crate::error::{CommanderError, DeviceError};
use crate::handler::IGNORE_START_LINE;
use crate::templates::{self, DeviceTemplate, ENABLE_PASSWORD_KEY, ModeCommands};

pub use security::{ConnectionSecurityOptions, SecurityLevel};
pub use ssh::{Output, SshSession, SshTransport};

/// Default time to wait for a command to return to a prompt.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Opens sessions to devices.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connects and authenticates, returning a session sitting at a prompt.
    async fn open_session(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn DeviceSession>, DeviceError>;
}

/// One live, exclusively owned connection to a device.
///
/// Mode checks report what the device prompt currently says. Configuration
/// mode counts as enable mode too.
#[async_trait]
pub trait DeviceSession: Send {
    /// Returns the prompt the device currently shows.
    async fn find_prompt(&mut self) -> Result<String, DeviceError>;

    async fn check_config_mode(&mut self) -> Result<bool, DeviceError>;

    async fn check_enable_mode(&mut self) -> Result<bool, DeviceError>;

    /// Enters enable (privileged) mode.
    async fn enable(&mut self) -> Result<(), DeviceError>;

    /// Drops from enable mode back to user mode.
    async fn exit_enable_mode(&mut self) -> Result<(), DeviceError>;

    /// Enters configuration mode from enable mode.
    async fn config_mode(&mut self) -> Result<(), DeviceError>;

    /// Leaves configuration mode, landing in enable mode.
    async fn exit_config_mode(&mut self) -> Result<(), DeviceError>;

    /// Runs one command and returns its output without echo or trailing prompt.
    async fn send_command(&mut self, command: &str) -> Result<String, DeviceError>;

    /// Runs a list of configuration commands as one batch and returns the
    /// full transcript.
    async fn send_config_set(&mut self, commands: &[String]) -> Result<String, DeviceError>;

    /// Releases the connection. Safe to call more than once.
    async fn close(&mut self) -> Result<(), DeviceError>;
}

mod algorithms;
mod security;
mod ssh;
