//! Scripted in-memory transport shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use commander::device::{ConnectionParams, Device};
use commander::error::DeviceError;
use commander::session::{DeviceSession, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    User,
    Enable,
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Authentication,
    Timeout,
    Other,
    Panic,
}

impl Failure {
    fn raise(self, host: &str) -> DeviceError {
        match self {
            Failure::Authentication => DeviceError::Authentication(format!("{host} rejected login")),
            Failure::Timeout => DeviceError::Timeout(format!("{host} did not answer")),
            Failure::Other => DeviceError::Other(format!("{host} misbehaved")),
            Failure::Panic => panic!("scripted panic on {host}"),
        }
    }
}

/// How one device (keyed by host) behaves.
#[derive(Debug, Clone, Copy)]
pub struct Script {
    pub mode: Mode,
    pub open_delay: Duration,
    pub open_failure: Option<Failure>,
    pub command_delay: Duration,
    pub command_failure: Option<Failure>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            mode: Mode::User,
            open_delay: Duration::ZERO,
            open_failure: None,
            command_delay: Duration::ZERO,
            command_failure: None,
        }
    }
}

impl Script {
    pub fn in_mode(mode: Mode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn failing(failure: Failure) -> Self {
        Self {
            open_failure: Some(failure),
            ..Self::default()
        }
    }

    pub fn hanging(command_delay: Duration) -> Self {
        Self {
            command_delay,
            ..Self::default()
        }
    }

    pub fn panicking_command() -> Self {
        Self {
            command_failure: Some(Failure::Panic),
            ..Self::default()
        }
    }

    pub fn slow(open_delay: Duration) -> Self {
        Self {
            open_delay,
            ..Self::default()
        }
    }
}

/// One call observed by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open,
    FindPrompt,
    Enable,
    ExitEnable,
    ConfigMode,
    ExitConfigMode,
    SendCommand(String),
    SendConfigSet(Vec<String>),
    Close,
}

impl Call {
    pub fn is_mode_change(&self) -> bool {
        matches!(
            self,
            Call::Enable | Call::ExitEnable | Call::ConfigMode | Call::ExitConfigMode
        )
    }
}

#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<(String, Call)>>,
    params: Mutex<Vec<ConnectionParams>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    dropped: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl Shared {
    fn record(&self, host: &str, call: Call) {
        self.calls
            .lock()
            .expect("calls lock")
            .push((host.to_string(), call));
    }
}

#[derive(Clone, Default)]
pub struct MockTransport {
    scripts: Arc<HashMap<String, Script>>,
    shared: Arc<Shared>,
}

impl MockTransport {
    pub fn new<I, S>(scripts: I) -> Self
    where
        I: IntoIterator<Item = (S, Script)>,
        S: Into<String>,
    {
        Self {
            scripts: Arc::new(
                scripts
                    .into_iter()
                    .map(|(host, script)| (host.into(), script))
                    .collect(),
            ),
            shared: Arc::default(),
        }
    }

    /// Calls made against one host, in order.
    pub fn calls(&self, host: &str) -> Vec<Call> {
        self.shared
            .calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|(h, _)| h == host)
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub fn mode_changes(&self, host: &str) -> Vec<Call> {
        self.calls(host)
            .into_iter()
            .filter(Call::is_mode_change)
            .collect()
    }

    pub fn params(&self) -> Vec<ConnectionParams> {
        self.shared.params.lock().expect("params lock").clone()
    }

    pub fn opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Sessions released, with or without `close`.
    pub fn dropped(&self) -> usize {
        self.shared.dropped.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.shared.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open_session(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn DeviceSession>, DeviceError> {
        let host = params.host.clone();
        let script = self.scripts.get(&host).copied().unwrap_or_default();
        self.shared.record(&host, Call::Open);
        self.shared.params.lock().expect("params lock").push(params.clone());
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        let active = self.shared.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_active.fetch_max(active, Ordering::SeqCst);

        tokio::time::sleep(script.open_delay).await;
        if let Some(failure) = script.open_failure {
            self.shared.active.fetch_sub(1, Ordering::SeqCst);
            return Err(failure.raise(&host));
        }

        Ok(Box::new(MockSession {
            host,
            mode: script.mode,
            script,
            shared: Arc::clone(&self.shared),
            closed: false,
        }))
    }
}

struct MockSession {
    host: String,
    mode: Mode,
    script: Script,
    shared: Arc<Shared>,
    closed: bool,
}

impl MockSession {
    async fn run(&mut self) -> Result<(), DeviceError> {
        tokio::time::sleep(self.script.command_delay).await;
        match self.script.command_failure {
            Some(failure) => Err(failure.raise(&self.host)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DeviceSession for MockSession {
    async fn find_prompt(&mut self) -> Result<String, DeviceError> {
        self.shared.record(&self.host, Call::FindPrompt);
        Ok(match self.mode {
            Mode::User => format!("{}>", self.host),
            Mode::Enable => format!("{}#", self.host),
            Mode::Config => format!("{}(config)#", self.host),
        })
    }

    async fn check_config_mode(&mut self) -> Result<bool, DeviceError> {
        Ok(self.mode == Mode::Config)
    }

    async fn check_enable_mode(&mut self) -> Result<bool, DeviceError> {
        Ok(self.mode != Mode::User)
    }

    async fn enable(&mut self) -> Result<(), DeviceError> {
        self.shared.record(&self.host, Call::Enable);
        self.mode = Mode::Enable;
        Ok(())
    }

    async fn exit_enable_mode(&mut self) -> Result<(), DeviceError> {
        self.shared.record(&self.host, Call::ExitEnable);
        self.mode = Mode::User;
        Ok(())
    }

    async fn config_mode(&mut self) -> Result<(), DeviceError> {
        self.shared.record(&self.host, Call::ConfigMode);
        if self.mode == Mode::User {
            return Err(DeviceError::Protocol("% Invalid input".to_string()));
        }
        self.mode = Mode::Config;
        Ok(())
    }

    async fn exit_config_mode(&mut self) -> Result<(), DeviceError> {
        self.shared.record(&self.host, Call::ExitConfigMode);
        self.mode = Mode::Enable;
        Ok(())
    }

    async fn send_command(&mut self, command: &str) -> Result<String, DeviceError> {
        self.shared
            .record(&self.host, Call::SendCommand(command.to_string()));
        self.run().await?;
        Ok(format!("output of {command}"))
    }

    async fn send_config_set(&mut self, commands: &[String]) -> Result<String, DeviceError> {
        self.shared
            .record(&self.host, Call::SendConfigSet(commands.to_vec()));
        self.run().await?;
        Ok(commands
            .iter()
            .map(|command| format!("{}(config)#{command}\n", self.host))
            .collect())
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.shared.record(&self.host, Call::Close);
        self.shared.closed.fetch_add(1, Ordering::SeqCst);
        self.shared.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        if !self.closed {
            self.shared.active.fetch_sub(1, Ordering::SeqCst);
        }
        self.shared.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

/// A device whose host equals its name.
pub fn device(name: &str) -> Device {
    Device::new(name, "admin", "pw", name, "cisco_ios")
}

pub fn commands(commands: &[&str]) -> Vec<String> {
    commands.iter().map(|c| c.to_string()).collect()
}
