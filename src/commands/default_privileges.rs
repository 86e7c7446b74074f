//! ALTER DEFAULT PRIVILEGES.

use crate::catalog::oid::{Oid, ACL_ID_PUBLIC};
use crate::catalog::{Catalog, DefaultAclObjectType, ObjectType};
use crate::error::AclError;
use crate::security::acl::{
    privilege_to_string, string_to_privilege, whole_mask, AclModes, DropBehavior, ACL_NO_RIGHTS,
};
use crate::security::default_acl::{set_default_acl, DefaultAclRequest};
use crate::security::{Notices, SessionContext};

use super::grant::AccessPriv;
use super::{resolve_role, CommandResult, RoleSpec};

/// The GRANT or REVOKE inside ALTER DEFAULT PRIVILEGES. There are no
/// target objects: the kind alone says which future objects it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultPrivilegesAction {
    pub is_grant: bool,
    pub objtype: ObjectType,
    /// `None` for ALL PRIVILEGES.
    pub privileges: Option<Vec<AccessPriv>>,
    pub grantees: Vec<RoleSpec>,
    pub grant_option: bool,
    pub behavior: DropBehavior,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlterDefaultPrivilegesStmt {
    /// FOR ROLE list; empty means the current user.
    pub roles: Vec<RoleSpec>,
    /// IN SCHEMA list; empty means database-wide.
    pub schemas: Vec<String>,
    pub action: DefaultPrivilegesAction,
}

impl AlterDefaultPrivilegesStmt {
    pub fn grant(
        objtype: ObjectType,
        privileges: Option<Vec<AccessPriv>>,
        grantees: Vec<RoleSpec>,
    ) -> Self {
        Self {
            roles: Vec::new(),
            schemas: Vec::new(),
            action: DefaultPrivilegesAction {
                is_grant: true,
                objtype,
                privileges,
                grantees,
                grant_option: false,
                behavior: DropBehavior::Restrict,
            },
        }
    }

    pub fn revoke(
        objtype: ObjectType,
        privileges: Option<Vec<AccessPriv>>,
        grantees: Vec<RoleSpec>,
    ) -> Self {
        let mut stmt = Self::grant(objtype, privileges, grantees);
        stmt.action.is_grant = false;
        stmt
    }

    pub fn for_roles(mut self, roles: Vec<RoleSpec>) -> Self {
        self.roles = roles;
        self
    }

    pub fn in_schemas(mut self, schemas: &[&str]) -> Self {
        self.schemas = schemas.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_grant_option(mut self) -> Self {
        self.action.grant_option = true;
        self
    }

    pub fn cascade(mut self) -> Self {
        self.action.behavior = DropBehavior::Cascade;
        self
    }
}

pub fn exec_alter_default_privileges(
    catalog: &mut Catalog,
    session: &SessionContext,
    stmt: &AlterDefaultPrivilegesStmt,
) -> Result<CommandResult, AclError> {
    catalog.in_transaction(|catalog| {
        let action = &stmt.action;
        let objtype = DefaultAclObjectType::from_object_type(action.objtype).ok_or_else(|| {
            AclError::Internal(format!(
                "unrecognized GrantStmt.objtype: {:?}",
                action.objtype
            ))
        })?;
        if objtype == DefaultAclObjectType::Namespace && !stmt.schemas.is_empty() {
            return Err(AclError::invalid_grant(
                "cannot use IN SCHEMA clause when using GRANT/REVOKE ON SCHEMAS",
            ));
        }

        let grantees = action
            .grantees
            .iter()
            .map(|spec| match spec {
                RoleSpec::Public => Ok(ACL_ID_PUBLIC),
                other => resolve_role(catalog, session, other),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let (all_privs, privileges) = default_privileges_mask(objtype, action)?;

        let roles = if stmt.roles.is_empty() {
            vec![session.current_user]
        } else {
            let mut roles = Vec::with_capacity(stmt.roles.len());
            for spec in &stmt.roles {
                let role = resolve_role(catalog, session, spec)?;
                if !catalog.roles().can_set_role(session.current_user, role) {
                    return Err(AclError::InsufficientPrivilege(
                        "permission denied to change default privileges".to_string(),
                    ));
                }
                roles.push(role);
            }
            roles
        };
        let namespaces: Vec<Option<Oid>> = if stmt.schemas.is_empty() {
            vec![None]
        } else {
            stmt.schemas
                .iter()
                .map(|name| catalog.resolve_namespace(name).map(Some))
                .collect::<Result<_, _>>()?
        };

        for &role in &roles {
            for &namespace in &namespaces {
                let request = DefaultAclRequest {
                    role,
                    namespace,
                    objtype,
                    is_grant: action.is_grant,
                    grant_option: action.grant_option,
                    behavior: action.behavior,
                    grantees: grantees.clone(),
                    privileges,
                    all_privs,
                };
                set_default_acl(catalog, &request)?;
                catalog.command_counter_increment();
            }
        }
        Ok(CommandResult::new("ALTER DEFAULT PRIVILEGES", Notices::new()))
    })
}

fn default_privileges_mask(
    objtype: DefaultAclObjectType,
    action: &DefaultPrivilegesAction,
) -> Result<(bool, AclModes), AclError> {
    let Some(list) = &action.privileges else {
        return Ok((true, ACL_NO_RIGHTS));
    };
    let kind = objtype.object_type();
    let legal = whole_mask(kind);
    let mut privileges = ACL_NO_RIGHTS;
    for access in list {
        if !access.cols.is_empty() {
            return Err(AclError::invalid_grant(
                "default privileges cannot be set for columns",
            ));
        }
        let name = access.priv_name.as_deref().ok_or_else(|| {
            AclError::Internal("AccessPriv node must specify privilege".to_string())
        })?;
        let privs = string_to_privilege(name)?;
        if !(privs & !legal).is_empty() {
            return Err(AclError::invalid_grant(format!(
                "invalid privilege type {} for {}",
                privilege_to_string(privs),
                kind.grant_noun()
            )));
        }
        privileges |= privs;
    }
    Ok((false, privileges))
}
