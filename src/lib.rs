//! # commander - deploy commands to many network devices at once
//!
//! `commander` keeps network device credentials in a local store and pushes
//! command lists to many devices concurrently over SSH. Each device gets its
//! own session: the session is moved to the requested permission level
//! (user, enable or configuration mode), the commands are run, and the output
//! or the classified failure is reported per device. One device failing never
//! stops the rest of the batch.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use commander::device::Device;
//! use commander::dispatch::{DispatchOptions, Dispatcher};
//! use commander::permission::PermissionLevel;
//! use commander::session::SshTransport;
//! use commander::sink::ResultSink;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let devices = vec![
//!         Device::new("core1", "admin", "secret", "192.168.1.1", "cisco_ios")
//!             .with_parameter("secret", "enable-secret"),
//!     ];
//!
//!     let dispatcher = Dispatcher::new(Arc::new(SshTransport::default()), DispatchOptions::default());
//!     let mut results = dispatcher.deploy(
//!         vec!["show version".to_string()],
//!         devices,
//!         PermissionLevel::Enable,
//!     )?;
//!
//!     let mut sink = ResultSink::new(None);
//!     while let Some(result) = results.next().await {
//!         sink.handle(result);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Main Components
//!
//! - [`permission`] - Permission levels and the mode-transition planner
//! - [`executor::execute_commands`] - One device session from connect to disconnect
//! - [`dispatch::Dispatcher`] - Bounded concurrent fan-out over many devices
//! - [`sink::ResultSink`] - Prints or saves each device result as it arrives
//! - [`session`] - Transport traits and the SSH implementation
//! - [`store`] - Device inventory with tags

pub mod cli;
pub mod commands;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod handler;
pub mod init;
pub mod permission;
pub mod session;
pub mod sink;
pub mod store;
pub mod templates;
