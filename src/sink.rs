//! Reports device results as they arrive.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::device::{Device, validate_device_name};
use crate::dispatch::DeviceResult;
use crate::error::{CommanderError, DeviceError, DeviceErrorKind};

/// What the sink did with one result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    /// Output printed to stdout.
    Printed,
    /// Output written to this file.
    Written(PathBuf),
    /// The failure line reported on stderr.
    Failed(String),
}

/// Succeeded/failed counts for a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub succeeded: usize,
    pub failed: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Prints device output or saves it as `<output_dir>/<device name>.txt`.
#[derive(Debug, Default)]
pub struct ResultSink {
    output_dir: Option<PathBuf>,
    summary: Summary,
}

impl ResultSink {
    pub fn new(output_dir: Option<PathBuf>) -> Self {
        Self {
            output_dir,
            summary: Summary::default(),
        }
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// Makes sure the output directory exists. Call before dispatching.
    pub fn prepare(&self) -> Result<(), CommanderError> {
        let Some(dir) = &self.output_dir else {
            return Ok(());
        };
        if dir.exists() && !dir.is_dir() {
            return Err(CommanderError::Configuration(format!(
                "{} exists and is not a directory",
                dir.display()
            )));
        }
        fs::create_dir_all(dir)?;
        Ok(())
    }

    /// Reports one device result. Never fails: a file that cannot be written
    /// is reported like a device failure.
    pub fn handle(&mut self, result: DeviceResult) -> SinkOutcome {
        let DeviceResult { device, outcome } = result;
        let output = match outcome {
            Ok(output) => output,
            Err(err) => return self.fail(failure_message(&device, &err)),
        };

        println!("connected successfully to {device}");
        let outcome = match &self.output_dir {
            None => {
                println!("{output}");
                SinkOutcome::Printed
            }
            Some(dir) => match write_output(dir, &device, &output) {
                Ok(path) => {
                    debug!("{} output written to {}", device.name, path.display());
                    SinkOutcome::Written(path)
                }
                Err(err) => {
                    let err = DeviceError::Other(format!(
                        "failed to write output to {}: {err}",
                        dir.display()
                    ));
                    return self.fail(failure_message(&device, &err));
                }
            },
        };
        self.summary.succeeded += 1;
        outcome
    }

    pub fn summary(&self) -> Summary {
        self.summary
    }

    fn fail(&mut self, message: String) -> SinkOutcome {
        eprintln!("{message}");
        self.summary.failed += 1;
        SinkOutcome::Failed(message)
    }
}

/// The line reported for a failed device.
pub fn failure_message(device: &Device, err: &DeviceError) -> String {
    match err.kind() {
        DeviceErrorKind::Authentication => format!("wasn't able to authenticate to {device}"),
        DeviceErrorKind::Connection => format!("wasn't able to connect to {device}"),
        DeviceErrorKind::Unclassified => {
            format!("device {device} encountered an exception: {err}")
        }
    }
}

/// Path of the output file for a device.
///
/// Names that would resolve outside `dir` are refused.
pub fn output_path(dir: &Path, device: &Device) -> io::Result<PathBuf> {
    validate_device_name(&device.name).map_err(|reason| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("device name {:?} can't be a file name: {reason}", device.name),
        )
    })?;
    Ok(dir.join(format!("{}.txt", device.name)))
}

fn write_output(dir: &Path, device: &Device, output: &str) -> io::Result<PathBuf> {
    let path = output_path(dir, device)?;
    fs::write(&path, output)?;
    Ok(path)
}
