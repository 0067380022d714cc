//! Device records and their transport-facing connection parameters.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default SSH port when a device has no `port` parameter.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Optional parameter holding the enable secret.
pub const SECRET_PARAM: &str = "secret";

/// Optional parameter holding the SSH port.
pub const PORT_PARAM: &str = "port";

/// Optional parameter selecting the SSH security profile (`secure`, `balanced`, `legacy`).
pub const SECURITY_PARAM: &str = "security";

/// A network device and the credentials used to reach it.
///
/// Devices are read-only for the duration of a batch. The name is the unique
/// key inside a batch.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct Device {
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub host: String,
    /// Vendor/OS family tag, e.g. `cisco_ios`. Selects the device template.
    pub device_type: String,
    /// Transport parameters such as `port` or `secret`.
    #[serde(default)]
    pub optional_parameters: BTreeMap<String, String>,
}

impl Device {
    pub fn new(
        name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        device_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            username: username.into(),
            password: password.into(),
            host: host.into(),
            device_type: device_type.into(),
            optional_parameters: BTreeMap::new(),
        }
    }

    /// Adds an optional transport parameter.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.optional_parameters.insert(key.into(), value.into());
        self
    }

    /// Renders `user@host[:port]`, suitable for an `ssh` command line.
    pub fn ssh_string(&self) -> String {
        let mut ssh_string = String::new();
        if !self.username.is_empty() {
            ssh_string.push_str(&self.username);
            ssh_string.push('@');
        }
        ssh_string.push_str(&self.host);
        if let Some(port) = self.optional_parameters.get(PORT_PARAM) {
            ssh_string.push(':');
            ssh_string.push_str(port);
        }
        ssh_string
    }

    /// Converts the record into the parameters a transport connects with.
    pub fn connection_params(&self) -> ConnectionParams {
        ConnectionParams {
            host: self.host.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            device_type: self.device_type.clone(),
            parameters: self.optional_parameters.clone(),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.name.is_empty() {
            f.write_str(&self.name)?;
        }
        if !self.device_type.is_empty() {
            write!(f, "({})", self.device_type)?;
        }
        if !self.name.is_empty() || !self.device_type.is_empty() {
            f.write_str(" -> ")?;
        }
        f.write_str(&self.ssh_string())
    }
}

/// Everything a transport needs to open a session to one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub username: String,
    pub password: String,
    pub device_type: String,
    pub parameters: BTreeMap<String, String>,
}

impl ConnectionParams {
    /// SSH port, falling back to 22 when `port` is absent or not a number.
    pub fn port(&self) -> u16 {
        self.parameters
            .get(PORT_PARAM)
            .and_then(|port| port.trim().parse().ok())
            .unwrap_or(DEFAULT_SSH_PORT)
    }

    /// Enable secret, if one was supplied.
    pub fn secret(&self) -> Option<&str> {
        self.parameters
            .get(SECRET_PARAM)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// `user@host:port`, used as the session identity in logs.
    pub fn device_addr(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port())
    }

    /// Rebuilds the device record these parameters were derived from.
    pub fn into_device(self, name: impl Into<String>) -> Device {
        Device {
            name: name.into(),
            username: self.username,
            password: self.password,
            host: self.host,
            device_type: self.device_type,
            optional_parameters: self.parameters,
        }
    }
}

/// Removes devices whose name was already seen, keeping the first occurrence.
pub fn dedup_devices<I>(devices: I) -> Vec<Device>
where
    I: IntoIterator<Item = Device>,
{
    let mut seen = BTreeSet::new();
    devices
        .into_iter()
        .filter(|device| seen.insert(device.name.clone()))
        .collect()
}

/// Checks that `name` is usable both as a store key and as an output file name.
///
/// Returns the reason when it is not.
pub fn validate_device_name(name: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("name is empty");
    }
    if name.contains(['/', '\\']) {
        return Err("name contains a path separator");
    }
    if name.contains("..") {
        return Err("name contains '..'");
    }
    if name.chars().any(char::is_control) {
        return Err("name contains control characters");
    }
    Ok(())
}

/// Collects the names of the given devices.
pub fn device_names<'a, I>(devices: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a Device>,
{
    devices.into_iter().map(|d| d.name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::{Device, dedup_devices, validate_device_name};

    fn router() -> Device {
        Device::new("r1", "admin", "pw", "10.0.0.1", "cisco_ios")
            .with_parameter("port", "2222")
            .with_parameter("secret", "en")
    }

    #[test]
    fn display_includes_name_type_and_ssh_string() {
        assert_eq!(router().to_string(), "r1(cisco_ios) -> admin@10.0.0.1:2222");
    }

    #[test]
    fn ssh_string_omits_missing_parts() {
        let device = Device::new("", "", "", "core.example", "");
        assert_eq!(device.ssh_string(), "core.example");
        assert_eq!(device.to_string(), "core.example");
    }

    #[test]
    fn connection_params_round_trip() {
        let device = router();
        let params = device.connection_params();

        assert_eq!(params.port(), 2222);
        assert_eq!(params.secret(), Some("en"));
        assert_eq!(params.device_addr(), "admin@10.0.0.1:2222");
        assert_eq!(params.into_device("r1"), device);
    }

    #[test]
    fn invalid_port_falls_back_to_default() {
        let params = Device::new("r1", "admin", "pw", "10.0.0.1", "cisco_ios")
            .with_parameter("port", "ssh")
            .connection_params();
        assert_eq!(params.port(), 22);
    }

    #[test]
    fn dedup_keeps_first_device_per_name() {
        let first = router();
        let second = Device::new("r1", "other", "pw", "10.0.0.9", "cisco_ios");
        let third = Device::new("r2", "admin", "pw", "10.0.0.2", "cisco_ios");

        let devices = dedup_devices(vec![first.clone(), second, third.clone()]);
        assert_eq!(devices, vec![first, third]);
    }

    #[test]
    fn names_that_could_leave_a_directory_are_invalid() {
        assert!(validate_device_name("core-sw1.dc1").is_ok());
        for name in ["", "  ", "../escaped", "a/b", "a\\b", "..", "r1\n"] {
            assert!(validate_device_name(name).is_err(), "{name:?} should be rejected");
        }
    }
}
