//! Predefined device templates.
//!
//! A template couples a [`DeviceHandler`] (prompt, pager, error and
//! interactive-input patterns) with the commands that change privilege mode on
//! a given platform. The device-type tag stored with each device selects the
//! template; `_telnet` variants share the template of their SSH counterpart.

use crate::error::DeviceError;
use crate::handler::{DeviceHandler, Input, InputRule, Patterns};

/// Names accepted by [`by_device_type`] (without the `_telnet` suffix).
pub const BUILTIN_DEVICE_TYPES: &[&str] = &[
    "cisco_ios",
    "cisco_xe",
    "cisco_asa",
    "cisco_nxos",
    "arista_eos",
    "juniper",
    "juniper_junos",
    "huawei",
    "huawei_vrp",
    "generic",
];

/// Handler key used for the enable password interactive input.
pub const ENABLE_PASSWORD_KEY: &str = "EnablePassword";

/// Commands that move a device between modes.
///
/// Platforms without a separate privileged level have no `enable`/`disable`
/// command; for them the enable level is implied by any prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeCommands {
    pub enable: Option<&'static str>,
    pub disable: Option<&'static str>,
    pub config: &'static str,
    pub exit_config: &'static str,
}

/// Handler plus mode commands for one platform family.
pub struct DeviceTemplate {
    pub name: &'static str,
    pub handler: DeviceHandler,
    pub modes: ModeCommands,
}

/// Returns names of all built-in device types.
pub fn available_device_types() -> &'static [&'static str] {
    BUILTIN_DEVICE_TYPES
}

/// Strips the `_telnet` transport suffix from a device-type tag.
pub fn base_device_type(device_type: &str) -> &str {
    device_type.strip_suffix("_telnet").unwrap_or(device_type)
}

/// Returns true if the device-type tag asks for the telnet transport.
pub fn is_telnet(device_type: &str) -> bool {
    device_type.ends_with("_telnet")
}

/// Creates the template for a device-type tag (case-insensitive).
pub fn by_device_type(device_type: &str) -> Result<DeviceTemplate, DeviceError> {
    let normalized = device_type.to_ascii_lowercase();
    match base_device_type(&normalized) {
        "cisco_ios" | "cisco_xe" | "cisco_asa" | "generic" | "" => cisco_ios(),
        "cisco_nxos" => cisco_nxos(),
        "arista_eos" => arista_eos(),
        "juniper" | "juniper_junos" => juniper(),
        "huawei" | "huawei_vrp" => huawei(),
        _ => Err(DeviceError::Other(format!(
            "unsupported device type '{device_type}'"
        ))),
    }
}

fn cisco_like_modes() -> ModeCommands {
    ModeCommands {
        enable: Some("enable"),
        disable: Some("disable"),
        config: "configure terminal",
        exit_config: "end",
    }
}

fn enable_password_input() -> InputRule {
    InputRule {
        state: ENABLE_PASSWORD_KEY,
        input: Input::Param(ENABLE_PASSWORD_KEY.to_string()),
        keep_in_output: true,
        patterns: vec![r"^\x00*\r?(Enable )?Password:\s*$"],
    }
}

/// Returns the template for Cisco IOS/IOS-XE and IOS-like devices.
pub fn cisco_ios() -> Result<DeviceTemplate, DeviceError> {
    let handler = DeviceHandler::new(Patterns {
        prompts: vec![
            ("Config", vec![r"^\S+\(\S+\)#\s*$"]),
            ("Enable", vec![r"^[^\s#]+#\s*$"]),
            ("Login", vec![r"^[^\s<]+>\s*$"]),
        ],
        inputs: vec![enable_password_input()],
        pager: vec![r"\s*--More--\s*", r"\s*<--- More --->\s*"],
        errors: vec![
            r"% Invalid input detected at '\^' marker\.",
            r"% Invalid command at '\^' marker\.",
            r"% Incomplete command\.",
            r"% Ambiguous command:.*",
            r"^%.+",
            r"^Command authorization failed.*",
            r"^Command rejected:.*",
            r"Invalid password",
            r"Access denied.",
        ],
        ignored_errors: vec![],
    })?;
    Ok(DeviceTemplate {
        name: "cisco_ios",
        handler,
        modes: cisco_like_modes(),
    })
}

/// Returns the template for Cisco NX-OS devices.
pub fn cisco_nxos() -> Result<DeviceTemplate, DeviceError> {
    let handler = DeviceHandler::new(Patterns {
        prompts: vec![
            ("Config", vec![r"^\S+\(config\S*\)#\s*$"]),
            ("Enable", vec![r"^[^\s#]+#\s*$"]),
            ("Login", vec![r"^[^\s<]+>\s*$"]),
        ],
        inputs: vec![enable_password_input()],
        pager: vec![r"\s*--More--\s*"],
        errors: vec![
            r"% Invalid command at '\^' marker\.",
            r"% Incomplete command at '\^' marker\.",
            r"^% .+",
            r"^ERROR: .+",
        ],
        ignored_errors: vec![],
    })?;
    Ok(DeviceTemplate {
        name: "cisco_nxos",
        handler,
        modes: cisco_like_modes(),
    })
}

/// Returns the template for Arista EOS devices.
pub fn arista_eos() -> Result<DeviceTemplate, DeviceError> {
    let handler = DeviceHandler::new(Patterns {
        prompts: vec![
            ("Config", vec![r"^\S+\(config[^)]*\)#\s*$"]),
            ("Enable", vec![r"^[^\s#]+#\s*$"]),
            ("Login", vec![r"^[^\s<]+>\s*$"]),
        ],
        inputs: vec![enable_password_input()],
        pager: vec![r"\s*--More--\s*"],
        errors: vec![
            r"% Invalid input.*",
            r"% Incomplete command.*",
            r"% Ambiguous command.*",
            r"^% .+",
        ],
        ignored_errors: vec![],
    })?;
    Ok(DeviceTemplate {
        name: "arista_eos",
        handler,
        modes: cisco_like_modes(),
    })
}

/// Returns the template for Juniper JunOS devices.
///
/// JunOS has no enable level: the operational prompt already runs privileged
/// commands.
pub fn juniper() -> Result<DeviceTemplate, DeviceError> {
    let handler = DeviceHandler::new(Patterns {
        prompts: vec![
            ("Config", vec![r"^(\{\w+(:\S+)?\}\s*\[edit.*\]\s*)?\S+@\S+#\s*$"]),
            ("Enable", vec![r"^(\{\w+(:\S+)?\})?\S+@\S+>\s*$"]),
        ],
        inputs: vec![],
        pager: vec![r"^---\(more.*\)---"],
        errors: vec![
            r"^error: .+",
            r"^syntax error.*",
            r"^unknown command\.",
            r"^\s+\^$",
        ],
        ignored_errors: vec![r"^warning: .+"],
    })?;
    Ok(DeviceTemplate {
        name: "juniper",
        handler,
        modes: ModeCommands {
            enable: None,
            disable: None,
            config: "configure",
            exit_config: "exit configuration-mode",
        },
    })
}

/// Returns the template for Huawei VRP devices.
///
/// The user view `<name>` acts as the enable level; `system-view` is the
/// configuration level.
pub fn huawei() -> Result<DeviceTemplate, DeviceError> {
    let handler = DeviceHandler::new(Patterns {
        prompts: vec![
            ("Config", vec![r"^(HRP_M|HRP_S)?\[.+\]\s*$"]),
            ("Enable", vec![r"^(HRP_M|HRP_S)?<.+>\s*$"]),
        ],
        inputs: vec![InputRule {
            state: "Confirm",
            input: Input::Literal("y\n".to_string()),
            keep_in_output: true,
            patterns: vec![r".+\[Y/N\]:\s*$"],
        }],
        pager: vec![r"\s*---- More ----\s*"],
        errors: vec![
            r"^Error: .+",
            r"^\s+\^$",
            r"Unrecognized command found at '\^' position\.",
            r"Incomplete command found at '\^' position\.",
        ],
        ignored_errors: vec![],
    })?;
    Ok(DeviceTemplate {
        name: "huawei",
        handler,
        modes: ModeCommands {
            enable: None,
            disable: None,
            config: "system-view",
            exit_config: "return",
        },
    })
}

#[cfg(test)]
mod tests {
    use super::{available_device_types, base_device_type, by_device_type, is_telnet};

    #[test]
    fn every_builtin_device_type_builds() {
        for device_type in available_device_types() {
            by_device_type(device_type)
                .unwrap_or_else(|err| panic!("{device_type} should build: {err}"));
        }
    }

    #[test]
    fn telnet_variants_share_the_ssh_template() {
        assert_eq!(base_device_type("cisco_ios_telnet"), "cisco_ios");
        assert!(is_telnet("cisco_ios_telnet"));
        assert!(!is_telnet("cisco_ios"));
        let template = by_device_type("CISCO_IOS_TELNET").expect("template");
        assert_eq!(template.name, "cisco_ios");
    }

    #[test]
    fn unknown_device_type_is_rejected() {
        assert!(by_device_type("toaster_os").is_err());
    }

    #[test]
    fn cisco_prompts_map_to_modes() {
        let mut template = by_device_type("cisco_ios").expect("template");
        let handler = &mut template.handler;

        handler.read("router>");
        assert!(handler.in_state("login"));
        handler.read("router#");
        assert!(handler.in_state("enable"));
        handler.read("router(config-if)#");
        assert!(handler.in_state("config"));
    }

    #[test]
    fn cisco_invalid_input_is_an_error() {
        let mut template = by_device_type("cisco_ios").expect("template");
        template
            .handler
            .read("% Invalid input detected at '^' marker.");
        assert!(template.handler.error());
    }

    #[test]
    fn juniper_has_no_enable_level() {
        let mut template = by_device_type("juniper_junos").expect("template");
        assert_eq!(template.modes.enable, None);
        assert_eq!(template.modes.disable, None);

        template.handler.read("admin@mx1>");
        assert!(template.handler.in_state("enable"));
        template.handler.read("admin@mx1#");
        assert!(template.handler.in_state("config"));
    }

    #[test]
    fn huawei_views_map_to_modes() {
        let mut template = by_device_type("huawei").expect("template");
        template.handler.read("<HUAWEI>");
        assert!(template.handler.in_state("enable"));
        template.handler.read("[HUAWEI-GigabitEthernet0/0/1]");
        assert!(template.handler.in_state("config"));
    }
}
