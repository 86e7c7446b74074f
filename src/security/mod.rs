//! Privilege rule engine: ACL algebra, role graph, restriction policy, mask
//! evaluation, default ACLs and extension initial privileges.

use crate::catalog::oid::{Oid, PG_CATALOG_NAMESPACE, PG_PUBLIC_NAMESPACE, POSTGRES_DATABASE};
use crate::config::AclSettings;

pub mod acl;
pub mod aclmask;
pub mod default_acl;
pub mod init_privs;
pub mod restrict;
pub mod roles;


pub use acl::{
    acldefault, merge_acl_with_grant, Acl, AclItem, AclMaskHow, AclMode, AclModes, AclRights,
    DropBehavior, RoleMembership,
};
pub use aclmask::{AclResult, PrivilegeEvaluator};
pub use roles::{CreateRoleOptions, GrantorResolver, RoleRegistry};

/// Whether ACL changes are being captured as initial privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingMode {
    #[default]
    Off,
    /// An extension script is running; the OID is the extension's.
    CreatingExtension(Oid),
    /// pg_upgrade is replaying an extension's privileges.
    BinaryUpgrade,
}

/// Per-session state every executor receives explicitly.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub current_user: Oid,
    pub database: Oid,
    pub temp_namespace: Option<Oid>,
    pub recording: RecordingMode,
    pub settings: AclSettings,
}

impl SessionContext {
    pub fn new(current_user: Oid) -> Self {
        Self {
            current_user,
            database: POSTGRES_DATABASE,
            temp_namespace: None,
            recording: RecordingMode::Off,
            settings: AclSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: AclSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Schemas searched for unqualified names.
    pub fn search_path(&self) -> Vec<Oid> {
        let mut path = Vec::with_capacity(3);
        path.extend(self.temp_namespace);
        path.push(PG_CATALOG_NAMESPACE);
        path.push(PG_PUBLIC_NAMESPACE);
        path
    }

    pub fn is_temp_namespace(&self, namespace: Oid) -> bool {
        self.temp_namespace == Some(namespace)
    }
}

pub const WARNING_PRIVILEGE_NOT_GRANTED: &str = "01007";
pub const WARNING_PRIVILEGE_NOT_REVOKED: &str = "01006";
pub const WARNING_INVALID_GRANT_OPERATION: &str = "0LP01";

/// A non-fatal message raised while a statement ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub sqlstate: &'static str,
    pub message: String,
}

/// Warnings collected across one statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notices {
    items: Vec<Notice>,
}

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, sqlstate: &'static str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(sqlstate, "{message}");
        self.items.push(Notice { sqlstate, message });
    }

    pub fn items(&self) -> &[Notice] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|n| n.message.as_str())
    }

    pub fn extend(&mut self, other: Notices) {
        self.items.extend(other.items);
    }
}

/// Folds an unquoted identifier to lower case; quoted ones keep their case.
pub fn normalize_identifier(input: &str) -> String {
    let trimmed = input.trim();
    match trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(quoted) => quoted.replace("\"\"", "\""),
        None => trimmed.to_ascii_lowercase(),
    }
}

/// Splits `schema.name` into normalized parts.
pub fn parse_qualified_name(input: &str) -> Vec<String> {
    input
        .split('.')
        .map(normalize_identifier)
        .filter(|part| !part.is_empty())
        .collect()
}
