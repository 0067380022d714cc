//! Runs one command list on one device.

use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use crate::device::Device;
use crate::error::DeviceError;
use crate::permission::{PermissionLevel, apply_transition};
use crate::session::{DeviceSession, Transport};

/// Per-session knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOptions {
    /// Upper bound for connect, mode changes and all commands together.
    pub session_timeout: Option<Duration>,
}

/// Connects to `device`, moves it to `level`, runs `commands` and disconnects.
///
/// At user and enable level every command is preceded by the prompt it was
/// typed at. At configure level the prompt is captured once and the commands
/// are sent as a single configuration batch. The session is closed on every
/// path before this returns.
pub async fn execute_commands(
    transport: &dyn Transport,
    device: &Device,
    commands: &[String],
    level: PermissionLevel,
    options: ExecOptions,
) -> Result<String, DeviceError> {
    let deadline = options.session_timeout.map(|limit| (Instant::now() + limit, limit));
    let params = device.connection_params();

    debug!("{} opening session", device.name);
    let mut session = within(deadline, device, transport.open_session(&params)).await?;

    let result = within(deadline, device, run_commands(session.as_mut(), commands, level)).await;

    if let Err(err) = session.close().await {
        warn!("{} failed to close session: {}", device.name, err);
    }
    debug!("{} session released", device.name);
    result
}

/// Runs `fut` until the session deadline, if there is one.
async fn within<T, F>(
    deadline: Option<(Instant, Duration)>,
    device: &Device,
    fut: F,
) -> Result<T, DeviceError>
where
    F: Future<Output = Result<T, DeviceError>>,
{
    match deadline {
        Some((at, limit)) => tokio::time::timeout_at(at, fut).await.map_err(|_| {
            DeviceError::Timeout(format!(
                "session to {} exceeded {}s",
                device.name,
                limit.as_secs_f64()
            ))
        })?,
        None => fut.await,
    }
}

async fn run_commands(
    session: &mut dyn DeviceSession,
    commands: &[String],
    level: PermissionLevel,
) -> Result<String, DeviceError> {
    apply_transition(session, level).await?;

    let mut output = String::new();
    match level {
        PermissionLevel::User | PermissionLevel::Enable => {
            for command in commands {
                let prompt = session.find_prompt().await?;
                let result = session.send_command(command).await?;
                output.push_str(&prompt);
                output.push_str(command);
                output.push('\n');
                output.push_str(&result);
                output.push('\n');
            }
        }
        PermissionLevel::Configure => {
            output.push_str(&session.find_prompt().await?);
            output.push_str(&session.send_config_set(commands).await?);
        }
    }
    Ok(output)
}
