use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use crate::cli::{confirm, print_list};
use crate::commands::{read_commands, sanitize_commands};
use crate::config::CommanderConfig;
use crate::device::{Device, PORT_PARAM, SECRET_PARAM};
use crate::dispatch::{DeviceResults, Dispatcher};
use crate::permission::PermissionLevel;
use crate::session::SshTransport;
use crate::sink::{ResultSink, failure_message};
use crate::store::{DeviceStore, JsonStore, select_devices};
use crate::templates;

#[derive(Args, Debug, Clone)]
pub struct DeviceCommand {
    #[command(subcommand)]
    pub action: DeviceAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum DeviceAction {
    /// List stored devices
    List(ListArgs),
    /// Add a device to the store
    Add(AddArgs),
    /// Remove devices from the store
    Remove(RemoveArgs),
    /// Manage device tags
    #[command(subcommand)]
    Tag(TagAction),
    /// Try to connect to devices without running any command
    Ping(PingArgs),
    /// Deploy commands to devices
    Deploy(DeployArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Only list devices carrying all of these tags
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Unique device name
    #[arg(long)]
    pub name: String,
    /// Hostname or IP address
    #[arg(long)]
    pub host: String,
    /// Login user (prompted when missing)
    #[arg(short, long)]
    pub username: Option<String>,
    /// SSH port
    #[arg(long)]
    pub port: Option<u16>,
    /// Device type, e.g. cisco_ios (default from config)
    #[arg(long)]
    pub device_type: Option<String>,
    /// Login password (prompted when missing)
    #[arg(long)]
    pub password: Option<String>,
    /// Enable secret (prompted when missing, empty for none)
    #[arg(long)]
    pub enable_password: Option<String>,
    /// Extra transport parameter as KEY=VALUE
    #[arg(long = "param", value_parser = parse_key_val)]
    pub params: Vec<(String, String)>,
}

#[derive(Args, Debug, Clone)]
pub struct RemoveArgs {
    /// Names of the devices to remove
    #[arg(required = true, num_args = 1..)]
    pub names: Vec<String>,
    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TagAction {
    /// Tag devices
    Add {
        tag: String,
        #[arg(required = true, num_args = 1..)]
        names: Vec<String>,
    },
    /// Remove a tag from devices
    Remove {
        tag: String,
        #[arg(required = true, num_args = 1..)]
        names: Vec<String>,
    },
    /// List tags and the devices carrying them
    List,
}

/// Which stored devices a command works on.
#[derive(Args, Debug, Clone)]
pub struct DeviceSelection {
    /// Devices carrying all of these tags
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,
    /// Additional devices by name
    #[arg(short, long = "device")]
    pub devices: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PingArgs {
    #[command(flatten)]
    pub selection: DeviceSelection,
}

#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
    /// Commands to deploy; read from stdin when none are given
    pub commands: Vec<String>,
    /// Save each device's output to <DIR>/<device name>.txt
    #[arg(short, long, value_name = "DIR")]
    pub output_folder: Option<PathBuf>,
    #[command(flatten)]
    pub selection: DeviceSelection,
    /// Permission level the commands run at (user, enable, configure)
    #[arg(short, long, default_value = "user")]
    pub permission_level: PermissionLevel,
    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{s}'"))?;
    if key.trim().is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in '{s}'"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

impl DeviceCommand {
    pub async fn execute(&self, config: &CommanderConfig) -> Result<()> {
        match &self.action {
            DeviceAction::List(args) => list_devices(config, args),
            DeviceAction::Add(args) => add_device(config, args),
            DeviceAction::Remove(args) => remove_devices(config, args),
            DeviceAction::Tag(action) => tag(config, action),
            DeviceAction::Ping(args) => ping(config, args).await,
            DeviceAction::Deploy(args) => deploy(config, args).await,
        }
    }
}

fn open_store(config: &CommanderConfig) -> Result<JsonStore> {
    let store_file = config.store_file();
    JsonStore::open(&store_file).with_context(|| {
        format!(
            "failed to open device store {}, did you run `commander init`?",
            store_file.display()
        )
    })
}

fn list_devices(config: &CommanderConfig, args: &ListArgs) -> Result<()> {
    let store = open_store(config)?;
    let devices = store.list_devices(&args.tags);
    let lines = devices
        .iter()
        .map(|device| {
            let tags = store.device_tags(&device.name)?;
            let line = if tags.is_empty() {
                device.to_string()
            } else {
                let tags = tags.into_iter().collect::<Vec<_>>().join(", ");
                format!("{device} [{tags}]")
            };
            Ok::<_, anyhow::Error>(line)
        })
        .collect::<Result<Vec<_>>>()?;
    print_list(&lines, "devices");
    Ok(())
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Builds the new device from arguments, prompting for missing credentials.
fn build_device(config: &CommanderConfig, args: &AddArgs) -> Result<Device> {
    let device_type = args
        .device_type
        .clone()
        .unwrap_or_else(|| config.default_device_type.clone());
    if !templates::BUILTIN_DEVICE_TYPES.contains(&templates::base_device_type(&device_type)) {
        bail!(
            "unsupported device type '{}', expected one of: {}",
            device_type,
            templates::available_device_types().join(", ")
        );
    }

    let username = match &args.username {
        Some(username) => username.clone(),
        None => prompt_line("username: ")?,
    };
    let password = match &args.password {
        Some(password) => password.clone(),
        None => rpassword::prompt_password("device's password: ")
            .context("Failed to read password")?,
    };
    let secret = match &args.enable_password {
        Some(secret) => secret.clone(),
        None => rpassword::prompt_password("device's enable password (empty for none): ")
            .context("Failed to read enable password")?,
    };

    let mut parameters: BTreeMap<String, String> = config.optional_parameters.clone();
    parameters.extend(args.params.iter().cloned());
    if let Some(port) = args.port {
        parameters.insert(PORT_PARAM.to_string(), port.to_string());
    }
    if !secret.is_empty() {
        parameters.insert(SECRET_PARAM.to_string(), secret);
    }

    let mut device = Device::new(&args.name, username, password, &args.host, device_type);
    device.optional_parameters = parameters;
    Ok(device)
}

fn add_device(config: &CommanderConfig, args: &AddArgs) -> Result<()> {
    let mut store = open_store(config)?;
    if store.get_device(&args.name).is_ok() {
        bail!("device {} already exists", args.name);
    }
    let device = build_device(config, args)?;
    let shown = device.to_string();
    store.add_device(device)?;
    store.save()?;
    println!("added device {shown} to the store");
    Ok(())
}

fn remove_devices(config: &CommanderConfig, args: &RemoveArgs) -> Result<()> {
    let mut store = open_store(config)?;
    let devices = args
        .names
        .iter()
        .map(|name| store.get_device(name))
        .collect::<Result<Vec<_>, _>>()?;
    print_list(&devices, "devices");

    let question = format!("are you sure you want to delete {} devices?", devices.len());
    if !args.yes && !confirm(&question)? {
        println!("aborted");
        return Ok(());
    }
    for device in &devices {
        store.remove_device(&device.name)?;
    }
    store.save()?;
    println!("deleted {} devices", devices.len());
    Ok(())
}

fn tag(config: &CommanderConfig, action: &TagAction) -> Result<()> {
    let mut store = open_store(config)?;
    match action {
        TagAction::Add { tag, names } => {
            for name in names {
                store.tag_device(name, tag)?;
            }
            store.save()?;
            println!("tagged {} devices with {}", names.len(), tag);
        }
        TagAction::Remove { tag, names } => {
            for name in names {
                store.untag_device(name, tag)?;
            }
            store.save()?;
            println!("removed {} from {} devices", tag, names.len());
        }
        TagAction::List => {
            let lines = store
                .list_tags()
                .into_iter()
                .map(|(tag, names)| {
                    format!("{tag}: {}", names.into_iter().collect::<Vec<_>>().join(", "))
                })
                .collect::<Vec<_>>();
            print_list(&lines, "tags");
        }
    }
    Ok(())
}

/// Reads the selected devices and closes the store before any session opens.
fn load_selection(config: &CommanderConfig, selection: &DeviceSelection) -> Result<Vec<Device>> {
    let store = open_store(config)?;
    let devices = select_devices(&store, &selection.tags, &selection.devices)?;
    if devices.is_empty() {
        if selection.tags.is_empty() {
            bail!("you don't have any devices in the store");
        }
        bail!(
            "you don't have any devices in the store with all of these tags: {}",
            selection.tags.join(", ")
        );
    }
    Ok(devices)
}

fn dispatcher(config: &CommanderConfig) -> Dispatcher {
    let transport = SshTransport::new(config.security_options(), config.command_timeout());
    Dispatcher::new(Arc::new(transport), config.dispatch_options())
}

fn progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::with_template(
        "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message("connecting to devices...");
    pb
}

async fn ping(config: &CommanderConfig, args: &PingArgs) -> Result<()> {
    let devices = load_selection(config, &args.selection)?;
    print_list(&devices, "devices");

    let mut results = dispatcher(config).deploy(Vec::new(), devices, PermissionLevel::User)?;
    let pb = progress_bar(results.len());
    let mut failed = 0;
    while let Some(result) = results.next().await {
        pb.suspend(|| match result.error() {
            None => println!("connected successfully to {}", result.device),
            Some(err) => {
                failed += 1;
                eprintln!("{}", failure_message(&result.device, err));
            }
        });
        pb.inc(1);
    }
    pb.finish_and_clear();
    println!(
        "{} of {} devices reachable",
        results.len() - failed,
        results.len()
    );
    Ok(())
}

fn read_deploy_commands(args: &DeployArgs) -> Result<Vec<String>> {
    let commands = if args.commands.is_empty() {
        if io::stdin().is_terminal() {
            println!("please enter the commands you want to deploy (end with Ctrl-D):");
        }
        read_commands(io::stdin().lock()).context("Failed to read commands from stdin")?
    } else {
        sanitize_commands(&args.commands)
    };
    if commands.is_empty() {
        return Err(anyhow!("no commands entered, nothing to deploy"));
    }
    Ok(commands)
}

async fn deploy(config: &CommanderConfig, args: &DeployArgs) -> Result<()> {
    let mut sink = ResultSink::new(args.output_folder.clone());
    sink.prepare()?;

    let commands = read_deploy_commands(args)?;
    let devices = load_selection(config, &args.selection)?;
    print_list(&devices, "devices");
    print_list(&commands, "commands");

    let question = format!(
        "do you want to deploy {} commands on {} devices in {} mode?",
        commands.len(),
        devices.len(),
        args.permission_level
    );
    if !args.yes && !confirm(&question)? {
        println!("aborted");
        return Ok(());
    }

    info!(
        "deploying {} commands to {} devices",
        commands.len(),
        devices.len()
    );
    let results = dispatcher(config).deploy(commands, devices, args.permission_level)?;
    drain(results, &mut sink).await;

    let summary = sink.summary();
    println!(
        "{} succeeded, {} failed",
        summary.succeeded, summary.failed
    );
    Ok(())
}

async fn drain(mut results: DeviceResults, sink: &mut ResultSink) {
    let pb = progress_bar(results.len());
    while let Some(result) = results.next().await {
        pb.suspend(|| sink.handle(result));
        pb.inc(1);
    }
    pb.finish_and_clear();
}

#[cfg(test)]
mod tests {
    use super::parse_key_val;

    #[test]
    fn key_value_parameters_parse() {
        assert_eq!(
            parse_key_val("security=legacy").unwrap(),
            ("security".to_string(), "legacy".to_string())
        );
        assert_eq!(
            parse_key_val("banner=a=b").unwrap(),
            ("banner".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }
}
