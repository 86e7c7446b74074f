//! Statement executors. Each takes the catalog and the session explicitly
//! and runs as one all-or-nothing statement.

use crate::catalog::oid::Oid;
use crate::catalog::Catalog;
use crate::error::AclError;
use crate::security::{Notices, SessionContext};

pub mod default_privileges;
pub mod define;
pub mod extension;
pub mod grant;
pub mod owner;

pub use default_privileges::{
    exec_alter_default_privileges, AlterDefaultPrivilegesStmt, DefaultPrivilegesAction,
};
pub use grant::{
    exec_grant_stmt, AccessPriv, GrantEventHook, GrantStmt, GrantTargets, InternalGrant,
    ObjectName,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub command_tag: String,
    pub notices: Notices,
}

impl CommandResult {
    pub fn new(command_tag: &str, notices: Notices) -> Self {
        Self {
            command_tag: command_tag.to_string(),
            notices,
        }
    }
}

/// A role as written in a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleSpec {
    Public,
    CurrentUser,
    Name(String),
    Oid(Oid),
}

impl RoleSpec {
    pub fn name(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// Resolves a role reference. PUBLIC is not a role here; callers that
/// accept it handle it before calling.
pub fn resolve_role(
    catalog: &Catalog,
    session: &SessionContext,
    spec: &RoleSpec,
) -> Result<Oid, AclError> {
    match spec {
        RoleSpec::Public => Err(AclError::UndefinedObject(
            "role \"public\" does not exist".to_string(),
        )),
        RoleSpec::CurrentUser => Ok(session.current_user),
        RoleSpec::Name(name) => catalog.roles().lookup(name),
        RoleSpec::Oid(oid) => {
            if catalog.roles().role_exists(*oid) {
                Ok(*oid)
            } else {
                Err(AclError::UndefinedObject(format!(
                    "role with OID {oid} does not exist"
                )))
            }
        }
    }
}
