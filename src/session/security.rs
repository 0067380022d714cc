use super::*;

/// Security level used for SSH algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    /// Strict modern algorithms (default).
    #[default]
    Secure,
    /// Good security with broader compatibility.
    Balanced,
    /// Maximum compatibility with legacy devices.
    #[serde(alias = "legacy")]
    LegacyCompatible,
}

impl FromStr for SecurityLevel {
    type Err = CommanderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "secure" => Ok(SecurityLevel::Secure),
            "balanced" => Ok(SecurityLevel::Balanced),
            "legacy" | "legacy_compatible" => Ok(SecurityLevel::LegacyCompatible),
            _ => Err(CommanderError::Configuration(format!(
                "unknown security level '{s}', expected one of: secure, balanced, legacy"
            ))),
        }
    }
}

/// Connection security options for SSH establishment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSecurityOptions {
    /// SSH algorithm policy.
    pub level: SecurityLevel,
    /// Server host key verification method.
    pub server_check: ServerCheckMethod,
}

impl Default for ConnectionSecurityOptions {
    fn default() -> Self {
        Self::secure_default()
    }
}

impl ConnectionSecurityOptions {
    /// Secure-by-default profile (recommended).
    pub fn secure_default() -> Self {
        Self {
            level: SecurityLevel::Secure,
            server_check: ServerCheckMethod::DefaultKnownHostsFile,
        }
    }

    /// Balanced profile for mixed environments.
    pub fn balanced() -> Self {
        Self {
            level: SecurityLevel::Balanced,
            server_check: ServerCheckMethod::DefaultKnownHostsFile,
        }
    }

    /// Legacy compatibility profile for older devices.
    pub fn legacy_compatible() -> Self {
        Self {
            level: SecurityLevel::LegacyCompatible,
            server_check: ServerCheckMethod::NoCheck,
        }
    }

    /// Profile for a security level.
    pub fn for_level(level: SecurityLevel) -> Self {
        match level {
            SecurityLevel::Secure => Self::secure_default(),
            SecurityLevel::Balanced => Self::balanced(),
            SecurityLevel::LegacyCompatible => Self::legacy_compatible(),
        }
    }

    pub(super) fn preferred(&self) -> Preferred {
        Preferred {
            kex: Cow::Owned(algorithms::kex_order(self.level)),
            key: Cow::Owned(algorithms::host_key_types(self.level)),
            cipher: Cow::Owned(algorithms::ciphers(self.level)),
            mac: Cow::Owned(algorithms::macs(self.level)),
            compression: Cow::Borrowed(algorithms::COMPRESSION),
        }
    }
}
