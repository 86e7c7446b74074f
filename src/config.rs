use serde::Deserialize;

use crate::error::AclError;

/// Server settings consulted by the privilege code, named after the GUCs
/// they mirror.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AclSettings {
    /// Skip large-object privilege checks entirely (pre-9.0 behaviour).
    pub lo_compat_privileges: bool,
    /// The server runs under pg_upgrade; required before init-privs
    /// recording can be switched on outside of CREATE EXTENSION.
    pub binary_upgrade: bool,
}

impl AclSettings {
    pub fn from_json(text: &str) -> Result<Self, AclError> {
        serde_json::from_str(text).map_err(|err| {
            AclError::InvalidTextRepresentation(format!("invalid privilege settings: {err}"))
        })
    }

    /// Accepts the boolean spellings `SET` understands.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), AclError> {
        let parsed = parse_bool(value).ok_or_else(|| {
            AclError::InvalidTextRepresentation(format!(
                "parameter \"{name}\" requires a Boolean value"
            ))
        })?;
        match name.to_ascii_lowercase().as_str() {
            "lo_compat_privileges" => self.lo_compat_privileges = parsed,
            "binary_upgrade" => self.binary_upgrade = parsed,
            _ => {
                return Err(AclError::UndefinedObject(format!(
                    "unrecognized configuration parameter \"{name}\""
                )))
            }
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" | "t" | "y" => Some(true),
        "off" | "false" | "no" | "0" | "f" | "n" => Some(false),
        _ => None,
    }
}
