use super::*;

use tokio::task::JoinHandle;

use crate::handler::DeviceHandler;

/// Opens interactive SSH shells to devices.
///
/// The device-type tag of each device selects its template; an optional
/// `security` parameter on the device overrides the transport's default
/// security profile.
#[derive(Debug, Clone)]
pub struct SshTransport {
    security: ConnectionSecurityOptions,
    command_timeout: Duration,
}

impl Default for SshTransport {
    fn default() -> Self {
        Self::new(ConnectionSecurityOptions::default(), DEFAULT_COMMAND_TIMEOUT)
    }
}

impl SshTransport {
    pub fn new(security: ConnectionSecurityOptions, command_timeout: Duration) -> Self {
        Self {
            security,
            command_timeout,
        }
    }

    fn security_for(
        &self,
        params: &ConnectionParams,
    ) -> Result<ConnectionSecurityOptions, DeviceError> {
        match params.parameters.get(SECURITY_PARAM) {
            Some(level) => SecurityLevel::from_str(level)
                .map(ConnectionSecurityOptions::for_level)
                .map_err(|err| DeviceError::Other(err.to_string())),
            None => Ok(self.security.clone()),
        }
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn open_session(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn DeviceSession>, DeviceError> {
        if templates::is_telnet(&params.device_type) {
            return Err(DeviceError::Other(format!(
                "telnet transport is not supported for {}, use the ssh device type",
                params.device_type
            )));
        }
        let template = templates::by_device_type(&params.device_type)?;
        let security = self.security_for(params)?;
        let session = SshSession::connect(params, template, security, self.command_timeout).await?;
        Ok(Box::new(session))
    }
}

/// The output result of a command execution.
pub struct Output {
    /// False if the device printed an error line.
    pub success: bool,
    /// Output without the echoed command and the trailing prompt.
    pub content: String,
    /// Everything received, including echo and prompt.
    pub all: String,
}

/// An interactive SSH shell on one device, tracked by the template's state machine.
pub struct SshSession {
    client: Client,
    sender: Sender<String>,
    recv: Receiver<String>,
    handler: DeviceHandler,
    modes: ModeCommands,
    prompt: String,
    device_addr: String,
    command_timeout: Duration,
    /// Owns the shell channel.
    _io_task: AbortOnDrop,
    closed: bool,
}

impl SshSession {
    /// Connects, opens a shell and waits for the first prompt.
    pub async fn connect(
        params: &ConnectionParams,
        template: DeviceTemplate,
        security_options: ConnectionSecurityOptions,
        command_timeout: Duration,
    ) -> Result<SshSession, DeviceError> {
        let device_addr = params.device_addr();
        let DeviceTemplate {
            mut handler, modes, ..
        } = template;

        let config = Config {
            preferred: security_options.preferred(),
            inactivity_timeout: Some(command_timeout),
            ..Default::default()
        };

        let client = Client::connect_with_config(
            (params.host.clone(), params.port()),
            &params.username,
            AuthMethod::with_password(&params.password),
            security_options.server_check.clone(),
            config,
        )
        .await?;
        debug!("{} TCP connection successful", device_addr);

        let mut channel = client.get_channel().await?;
        channel
            .request_pty(false, "xterm", 800, 600, 0, 0, &[])
            .await?;
        channel.request_shell(false).await?;
        debug!("{} Shell request successful", device_addr);

        let (sender_to_shell, mut receiver_from_user) = mpsc::channel::<String>(256);
        let (sender_to_user, mut receiver_from_shell) = mpsc::channel::<String>(256);

        let io_task_device_addr = device_addr.clone();
        let io_task = AbortOnDrop(tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(data) = receiver_from_user.recv() => {
                        if let Err(e) = channel.data(data.as_bytes()).await {
                            debug!("{} Failed to send data to shell: {:?}", io_task_device_addr, e);
                            break;
                        }
                    },
                    Some(msg) = channel.wait() => {
                        match msg {
                            ChannelMsg::Data { ref data } => {
                                let chunk = String::from_utf8_lossy(data).into_owned();
                                if sender_to_user.send(chunk).await.is_err() {
                                    debug!("{} Shell output receiver dropped. Closing task.", io_task_device_addr);
                                    break;
                                }
                            }
                            ChannelMsg::ExitStatus { exit_status } => {
                                debug!("{} Shell exited with status code: {}", io_task_device_addr, exit_status);
                                let _ = channel.eof().await;
                                break;
                            }
                            ChannelMsg::Eof => {
                                debug!("{} Shell sent EOF.", io_task_device_addr);
                                break;
                            }
                            _ => {}
                        }
                    }
                    else => break,
                }
            }
            debug!("{} SSH I/O task ended.", io_task_device_addr);
        }));

        if let Some(secret) = params.secret() {
            handler
                .params
                .insert(ENABLE_PASSWORD_KEY.to_string(), format!("{secret}\n"));
        }

        let mut buffer = String::new();
        let mut initial_output = String::new();

        // Wait for the first prompt, answering any interactive questions on the way.
        let init_result: Result<Result<String, DeviceError>, _> =
            tokio::time::timeout(command_timeout, async {
                loop {
                    let Some(data) = receiver_from_shell.recv().await else {
                        return Err(DeviceError::Protocol(
                            "channel disconnected while waiting for prompt".to_string(),
                        ));
                    };
                    trace!("{:?}", data);
                    buffer.push_str(&data);
                    initial_output.push_str(&data);

                    while let Some(newline_pos) = buffer.find('\n') {
                        let line = buffer.drain(..=newline_pos).collect::<String>();
                        handler.read(line.trim_end());
                    }

                    if !buffer.is_empty() {
                        if handler.is_prompt(&buffer) {
                            handler.read(&buffer);
                            return Ok(buffer.clone());
                        }
                        if let Some((input, _)) = handler.input_for(&buffer) {
                            handler.read(&buffer);
                            sender_to_shell.send(input).await?;
                        }
                    }
                }
            })
            .await;

        let prompt = match init_result {
            Ok(Ok(prompt)) => prompt,
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                return Err(DeviceError::Timeout(if initial_output.is_empty() {
                    format!("{device_addr} waiting for initial prompt")
                } else {
                    format!("{device_addr} no prompt recognised in: {initial_output}")
                }));
            }
        };
        debug!(
            "{} session ready in state {} at prompt {:?}",
            device_addr,
            handler.current_state(),
            prompt
        );

        Ok(Self {
            client,
            sender: sender_to_shell,
            recv: receiver_from_shell,
            handler,
            modes,
            prompt,
            device_addr,
            command_timeout,
            _io_task: io_task,
            closed: false,
        })
    }

    /// Current state of the template state machine (`login`, `enable`, `config`, ...).
    pub fn current_state(&self) -> &str {
        self.handler.current_state()
    }

    /// Executes a command and waits for the full output by matching the prompt.
    pub async fn write(&mut self, command: &str) -> Result<Output, DeviceError> {
        self.write_with_timeout(command, self.command_timeout).await
    }

    /// Executes a command with a custom timeout.
    pub async fn write_with_timeout(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<Output, DeviceError> {
        let handler = &mut self.handler;
        let recv = &mut self.recv;
        let sender = &self.sender;
        let prompt = &mut self.prompt;

        // 1. Clear any residual data in the receiver
        while recv.try_recv().is_ok() {}

        // 2. Send command to remote shell
        sender.send(format!("{command}\n")).await?;

        // 3. Receive data until a prompt line shows up
        let mut clean_output = String::new();
        let mut line_buffer = String::new();
        let mut line = String::new();

        let result: Result<Result<bool, DeviceError>, _> = tokio::time::timeout(timeout, async {
            let mut is_error = false;
            loop {
                let Some(data) = recv.recv().await else {
                    return Err(DeviceError::Protocol(
                        "channel disconnected while waiting for prompt".to_string(),
                    ));
                };
                line_buffer.push_str(&data);

                while let Some(newline_pos) = line_buffer.find('\n') {
                    line.clear();
                    line.extend(line_buffer.drain(..=newline_pos));
                    let trim_start = IGNORE_START_LINE.replace(&line, "");
                    handler.read(trim_start.trim_end());
                    if handler.error() {
                        is_error = true;
                    }
                    clean_output.push_str(&trim_start);
                }

                // The prompt normally arrives without a trailing newline.
                if !line_buffer.is_empty() {
                    if handler.is_prompt(&line_buffer) {
                        handler.read(&line_buffer);
                        clean_output.push_str(&line_buffer);
                        *prompt = std::mem::take(&mut line_buffer);
                        return Ok(!is_error);
                    }
                    if let Some((input, is_record)) = handler.input_for(&line_buffer) {
                        handler.read(&line_buffer);
                        if !is_record {
                            line_buffer.clear();
                        }
                        trace!("Input required: '{:?}'", input);
                        sender.send(input).await?;
                    }
                }
            }
        })
        .await;

        let success = match result {
            Err(_) => {
                return Err(DeviceError::Protocol(format!(
                    "command '{command}' timed out, partial output: {clean_output}"
                )));
            }
            Ok(Err(err)) => return Err(err),
            Ok(Ok(success)) => success,
        };

        let all = clean_output;
        let mut content = all.as_str();

        // Remove the echoed command from the beginning of the output
        if !command.is_empty() && content.starts_with(command) {
            content = content
                .strip_prefix(command)
                .unwrap_or(content)
                .trim_start_matches(['\n', '\r']);
        }

        // Remove the trailing prompt
        let content = match content.rfind('\n') {
            Some(pos) => content[..pos].trim_end_matches('\r'),
            None => "",
        };

        Ok(Output {
            success,
            content: content.to_string(),
            all,
        })
    }

    /// Sends a mode-change command and checks the device landed in `expected`.
    async fn change_mode(&mut self, command: &str, expected: &str) -> Result<(), DeviceError> {
        debug!("{} mode command: {}", self.device_addr, command);
        let output = self.write(command).await?;
        if !self.handler.in_state(expected) {
            return Err(DeviceError::Protocol(format!(
                "'{}' did not reach {} mode (state {}, prompt {:?}): {}",
                command,
                expected,
                self.handler.current_state(),
                self.prompt.trim(),
                output.content.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceSession for SshSession {
    async fn find_prompt(&mut self) -> Result<String, DeviceError> {
        self.write("").await?;
        Ok(self.prompt.trim().to_string())
    }

    async fn check_config_mode(&mut self) -> Result<bool, DeviceError> {
        Ok(self.handler.in_state("config"))
    }

    async fn check_enable_mode(&mut self) -> Result<bool, DeviceError> {
        Ok(self.handler.in_state("enable") || self.handler.in_state("config"))
    }

    async fn enable(&mut self) -> Result<(), DeviceError> {
        match self.modes.enable {
            Some(command) => self.change_mode(command, "enable").await,
            None => Ok(()),
        }
    }

    async fn exit_enable_mode(&mut self) -> Result<(), DeviceError> {
        match self.modes.disable {
            Some(command) => self.change_mode(command, "login").await,
            None => Ok(()),
        }
    }

    async fn config_mode(&mut self) -> Result<(), DeviceError> {
        let command = self.modes.config;
        self.change_mode(command, "config").await
    }

    async fn exit_config_mode(&mut self) -> Result<(), DeviceError> {
        let command = self.modes.exit_config;
        self.change_mode(command, "enable").await
    }

    async fn send_command(&mut self, command: &str) -> Result<String, DeviceError> {
        let output = self.write(command).await?;
        if !output.success {
            debug!(
                "{} device reported an error for '{}'",
                self.device_addr, command
            );
        }
        Ok(output.content)
    }

    async fn send_config_set(&mut self, commands: &[String]) -> Result<String, DeviceError> {
        let mut transcript = String::new();
        for command in commands {
            let output = self.write(command).await?;
            if !output.success {
                debug!(
                    "{} device reported an error for '{}'",
                    self.device_addr, command
                );
            }
            transcript.push_str(&output.all);
        }
        Ok(transcript)
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        if self.closed {
            return Ok(());
        }
        debug!("{} closing SSH session", self.device_addr);

        // Try a graceful logout first; the device may already be gone.
        if !self.client.is_closed() {
            if let Err(e) = self.sender.send("exit\n".to_string()).await {
                debug!("Failed to send exit command: {:?}", e);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        self.recv.close();
        self.closed = true;

        // The device usually hangs up after `exit`; a failed disconnect is not an error.
        if let Err(e) = self.client.disconnect().await {
            debug!("{} disconnect: {:?}", self.device_addr, e);
        }
        debug!("{} SSH session closed", self.device_addr);
        Ok(())
    }
}

/// Aborts the shell I/O task when dropped, releasing the channel even if
/// `close` never ran.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if !self.closed {
            debug!("{} session dropped without close", self.device_addr);
        }
    }
}
