//! Fan-out of one command batch across many devices.
//!
//! [`Dispatcher::deploy`] queues every device on a job channel and starts a
//! bounded pool of workers that pull devices off it. Each device runs in its
//! own task so a failure (or a panic) only ever produces an error result for
//! that device. Results are streamed back in completion order through
//! [`DeviceResults`].

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::{Mutex, mpsc};

use crate::device::{Device, dedup_devices};
use crate::error::{CommanderError, DeviceError};
use crate::executor::{ExecOptions, execute_commands};
use crate::permission::PermissionLevel;
use crate::session::Transport;

/// Default upper bound on concurrent device sessions.
pub const DEFAULT_MAX_WORKERS: usize = 60;

/// Batch-wide settings.
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    /// Maximum number of devices worked on at the same time.
    pub max_workers: usize,
    /// Optional limit for each device session as a whole.
    pub session_timeout: Option<Duration>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            session_timeout: None,
        }
    }
}

/// Outcome of the batch for one device.
#[derive(Debug)]
pub struct DeviceResult {
    pub device: Device,
    pub outcome: Result<String, DeviceError>,
}

impl DeviceResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Captured output, empty for a failed device.
    pub fn output(&self) -> &str {
        self.outcome.as_deref().unwrap_or_default()
    }

    pub fn error(&self) -> Option<&DeviceError> {
        self.outcome.as_ref().err()
    }
}

/// Results of a running batch, in the order devices finish.
///
/// Yields exactly one result per device and then `None`. Dropping it early
/// stops workers from starting devices that are still queued.
pub struct DeviceResults {
    receiver: mpsc::Receiver<DeviceResult>,
    total: usize,
    received: usize,
}

impl DeviceResults {
    /// Waits for the next device to finish.
    pub async fn next(&mut self) -> Option<DeviceResult> {
        if self.received == self.total {
            return None;
        }
        let result = self.receiver.recv().await?;
        self.received += 1;
        Some(result)
    }

    /// Number of devices in the batch.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of results not yet yielded.
    pub fn remaining(&self) -> usize {
        self.total - self.received
    }

    /// Waits for the whole batch.
    pub async fn collect(mut self) -> Vec<DeviceResult> {
        let mut results = Vec::with_capacity(self.remaining());
        while let Some(result) = self.next().await {
            results.push(result);
        }
        results
    }
}

/// Runs command batches through a transport.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, options: DispatchOptions) -> Self {
        Self { transport, options }
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Starts the batch and returns its results as they complete.
    ///
    /// Devices with a repeated name are run once. Must be called from within
    /// a Tokio runtime.
    pub fn deploy(
        &self,
        commands: Vec<String>,
        devices: Vec<Device>,
        level: PermissionLevel,
    ) -> Result<DeviceResults, CommanderError> {
        if devices.is_empty() {
            return Err(CommanderError::Configuration(
                "no devices selected".to_string(),
            ));
        }
        let devices = dedup_devices(devices);
        let total = devices.len();
        let workers = self.options.max_workers.clamp(1, total);
        info!(
            "Deploying {} command(s) at {} level to {} device(s) with {} worker(s)",
            commands.len(),
            level,
            total,
            workers
        );

        let (job_sender, job_receiver) = mpsc::channel(total);
        for device in devices {
            // Capacity equals the device count, so queueing never fails.
            let _ = job_sender.try_send(device);
        }
        drop(job_sender);

        let (result_sender, result_receiver) = mpsc::channel(total);
        let jobs = Arc::new(Mutex::new(job_receiver));
        let commands: Arc<[String]> = commands.into();
        let exec = ExecOptions {
            session_timeout: self.options.session_timeout,
        };

        for id in 0..workers {
            let worker = Worker {
                id,
                transport: Arc::clone(&self.transport),
                commands: Arc::clone(&commands),
                level,
                exec,
            };
            tokio::spawn(worker.run(Arc::clone(&jobs), result_sender.clone()));
        }

        Ok(DeviceResults {
            receiver: result_receiver,
            total,
            received: 0,
        })
    }
}

struct Worker {
    id: usize,
    transport: Arc<dyn Transport>,
    commands: Arc<[String]>,
    level: PermissionLevel,
    exec: ExecOptions,
}

impl Worker {
    async fn run(
        self,
        jobs: Arc<Mutex<mpsc::Receiver<Device>>>,
        results: mpsc::Sender<DeviceResult>,
    ) {
        loop {
            if results.is_closed() {
                debug!("worker {}: results dropped, stopping", self.id);
                break;
            }
            let device = match jobs.lock().await.recv().await {
                Some(device) => device,
                None => break,
            };

            debug!("worker {}: starting {}", self.id, device.name);
            let outcome = self.run_device(device.clone()).await;
            debug!(
                "worker {}: finished {} ({})",
                self.id,
                device.name,
                if outcome.is_ok() { "ok" } else { "failed" }
            );

            if results.send(DeviceResult { device, outcome }).await.is_err() {
                break;
            }
        }
    }

    /// Runs one device in its own task so a panic stays with that device.
    async fn run_device(&self, device: Device) -> Result<String, DeviceError> {
        let transport = Arc::clone(&self.transport);
        let commands = Arc::clone(&self.commands);
        let level = self.level;
        let exec = self.exec;
        let name = device.name.clone();

        tokio::spawn(async move {
            execute_commands(transport.as_ref(), &device, &commands, level, exec).await
        })
        .await
        .unwrap_or_else(|err| {
            Err(DeviceError::Other(format!(
                "worker for {name} panicked: {err}"
            )))
        })
    }
}
