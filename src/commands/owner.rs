//! Role lifecycle as seen by the privilege system: ALTER ... OWNER TO,
//! the privilege half of DROP OWNED, and DROP ROLE.

use std::collections::BTreeSet;

use crate::catalog::oid::{Oid, BOOTSTRAP_SUPERUSERID};
use crate::catalog::{
    Catalog, ObjectAddress, ObjectClass, ObjectType, RelKind, SharedDependencyType,
};
use crate::error::AclError;
use crate::security::acl::{Acl, DropBehavior, ACL_NO_RIGHTS};
use crate::security::aclmask::{
    aclcheck_error, default_object_type, AclResult, PrivilegeEvaluator,
};
use crate::security::default_acl::{
    remove_role_default_acls, set_default_acl, DefaultAclRequest,
};
use crate::security::{AclMode, Notices, RoleMembership, SessionContext};

use super::grant::{exec_grant_internal, InternalGrant};
use super::{resolve_role, CommandResult, RoleSpec};

fn object_type_of(catalog: &Catalog, addr: ObjectAddress) -> ObjectType {
    match (addr.class, catalog.relation(addr.object_id)) {
        (ObjectClass::Relation, Some(rel)) => rel.kind.object_type(),
        (class, _) => default_object_type(class),
    }
}

/// ALTER <kind> ... OWNER TO. The ACL is rewritten so that whatever the
/// old owner held or granted now belongs to the new one.
pub fn alter_owner(
    catalog: &mut Catalog,
    session: &SessionContext,
    addr: ObjectAddress,
    new_owner: &RoleSpec,
) -> Result<CommandResult, AclError> {
    if addr.sub_id != 0 || addr.class == ObjectClass::DefaultAcl {
        return Err(AclError::Internal(format!("cannot change owner of {addr:?}")));
    }
    catalog.in_transaction(|catalog| {
        let objtype = object_type_of(catalog, addr);
        let tag = format!("ALTER {}", objtype.noun().to_ascii_uppercase());
        let new_owner = resolve_role(catalog, session, new_owner)?;
        let old_owner = catalog.get_owner(addr.class, addr.object_id)?;
        if old_owner == new_owner {
            return Ok(CommandResult::new(&tag, Notices::new()));
        }

        let name = catalog.object_name(addr.class, addr.object_id)?;
        let user = session.current_user;
        if !catalog.roles().is_superuser(user) {
            let evaluator = PrivilegeEvaluator::new(catalog, session);
            if !evaluator.object_ownercheck(addr.class, addr.object_id, user)? {
                aclcheck_error(AclResult::NotOwner, objtype, &name)?;
            }
            if !catalog.roles().can_set_role(user, new_owner) {
                return Err(AclError::InsufficientPrivilege(format!(
                    "must be able to SET ROLE \"{}\"",
                    catalog.roles().display_name(new_owner)
                )));
            }
            if let Some(namespace) = catalog.namespace_of(addr.class, addr.object_id) {
                let result = evaluator.object_aclcheck(
                    ObjectClass::Namespace,
                    namespace,
                    user,
                    AclMode::Create.into(),
                )?;
                let nspname = catalog.object_name(ObjectClass::Namespace, namespace)?;
                aclcheck_error(result, ObjectType::Schema, &nspname)?;
            }
        }

        if let Some(old_acl) = catalog.get_acl(addr)? {
            let new_acl = old_acl.with_new_owner(old_owner, new_owner);
            catalog.shdepend_mut().update_acl_dependencies(
                addr,
                new_owner,
                &old_acl.members(),
                &new_acl.members(),
            );
            catalog.set_acl(addr, Some(new_acl))?;
        }
        if addr.class == ObjectClass::Relation {
            let columns: Vec<(i16, Acl)> = catalog
                .relation(addr.object_id)
                .map(|rel| {
                    rel.user_columns()
                        .filter_map(|col| col.acl.clone().map(|acl| (col.attnum, acl)))
                        .collect()
                })
                .unwrap_or_default();
            for (attnum, old_acl) in columns {
                let col = ObjectAddress::column(addr.object_id, attnum);
                let new_acl = old_acl.with_new_owner(old_owner, new_owner);
                catalog.shdepend_mut().update_acl_dependencies(
                    col,
                    new_owner,
                    &old_acl.members(),
                    &new_acl.members(),
                );
                catalog.set_acl(col, Some(new_acl))?;
            }
        }
        catalog.set_owner(addr.class, addr.object_id, new_owner)?;
        catalog.shdepend_mut().change_owner(addr, new_owner);
        tracing::debug!(?addr, old_owner, new_owner, "owner changed");
        catalog.command_counter_increment();
        Ok(CommandResult::new(&tag, Notices::new()))
    })
}

fn check_drop_owned(
    catalog: &Catalog,
    session: &SessionContext,
    role: Oid,
) -> Result<(), AclError> {
    if role == BOOTSTRAP_SUPERUSERID {
        return Err(AclError::DependentObjectsStillExist {
            message: format!(
                "cannot drop objects owned by {} because they are required by the database system",
                catalog.roles().display_name(role)
            ),
            detail: None,
            hint: None,
        });
    }
    if !catalog.roles().has_privs_of_role(session.current_user, role) {
        return Err(AclError::InsufficientPrivilege(
            "permission denied to drop objects".to_string(),
        ));
    }
    Ok(())
}

/// Revokes everything `role` was granted on one object, cascading to
/// whatever it granted onward.
fn remove_role_from_object_acl(
    catalog: &mut Catalog,
    session: &SessionContext,
    role: Oid,
    class: ObjectClass,
    object_id: Oid,
    notices: &mut Notices,
) -> Result<(), AclError> {
    if class == ObjectClass::DefaultAcl {
        let Some((key, _)) = catalog.default_acl_by_oid(object_id) else {
            return Err(AclError::Internal(format!(
                "could not find tuple for default ACL {object_id}"
            )));
        };
        let request = DefaultAclRequest {
            role: key.role,
            namespace: key.namespace,
            objtype: key.objtype,
            is_grant: false,
            grant_option: false,
            behavior: DropBehavior::Cascade,
            grantees: vec![role],
            privileges: ACL_NO_RIGHTS,
            all_privs: true,
        };
        return set_default_acl(catalog, &request);
    }

    let objtype = match class {
        ObjectClass::Relation => match catalog.relation(object_id).map(|rel| rel.kind) {
            Some(RelKind::Sequence) => ObjectType::Sequence,
            _ => ObjectType::Table,
        },
        other => default_object_type(other),
    };
    let istmt = InternalGrant {
        is_grant: false,
        objtype,
        objects: vec![object_id],
        all_privs: true,
        privileges: ACL_NO_RIGHTS,
        col_privs: Vec::new(),
        grantees: vec![role],
        grant_option: false,
        behavior: DropBehavior::Cascade,
    };
    exec_grant_internal(catalog, session, &istmt, notices)?;
    Ok(())
}

/// The privilege part of DROP OWNED BY: every ACL and default ACL that
/// mentions one of the roles is stripped of it, and default-ACL rows the
/// roles own are removed.
pub fn drop_owned_privileges(
    catalog: &mut Catalog,
    session: &SessionContext,
    roles: &[RoleSpec],
) -> Result<CommandResult, AclError> {
    catalog.in_transaction(|catalog| {
        let mut notices = Notices::new();
        let mut role_oids = Vec::with_capacity(roles.len());
        for spec in roles {
            let role = resolve_role(catalog, session, spec)?;
            check_drop_owned(catalog, session, role)?;
            role_oids.push(role);
        }

        for &role in &role_oids {
            // Column links collapse into one revoke on the whole relation,
            // which reaches the columns anyway.
            let targets: BTreeSet<(ObjectClass, Oid)> = catalog
                .shdepend()
                .dependents_of_role(role)
                .into_iter()
                .filter(|dep| dep.deptype == SharedDependencyType::Acl)
                .map(|dep| (dep.object.class, dep.object.object_id))
                .collect();
            for (class, object_id) in targets {
                remove_role_from_object_acl(catalog, session, role, class, object_id, &mut notices)?;
            }
            let removed = remove_role_default_acls(catalog, role);
            tracing::debug!(role, removed, "owned default ACLs removed");
        }
        Ok(CommandResult::new("DROP OWNED", notices))
    })
}

/// DROP ROLE. The role's default-ACL rows go with it; anything else that
/// still depends on the role blocks the drop.
pub fn drop_role(
    catalog: &mut Catalog,
    session: &SessionContext,
    name: &str,
    if_exists: bool,
) -> Result<CommandResult, AclError> {
    catalog.in_transaction(|catalog| {
        let mut notices = Notices::new();
        if !catalog.roles().is_superuser(session.current_user) {
            return Err(AclError::InsufficientPrivilege(
                "permission denied to drop role".to_string(),
            ));
        }
        let role = match catalog.roles().lookup(name) {
            Ok(role) => role,
            Err(_) if if_exists => {
                notices.warn("00000", format!("role \"{name}\" does not exist, skipping"));
                return Ok(CommandResult::new("DROP ROLE", notices));
            }
            Err(err) => return Err(err),
        };
        if role == session.current_user {
            return Err(AclError::ObjectInUse(
                "current user cannot be dropped".to_string(),
            ));
        }

        remove_role_default_acls(catalog, role);
        let remaining = catalog.shdepend().dependents_of_role(role);
        if !remaining.is_empty() {
            let detail = remaining
                .iter()
                .map(|dep| {
                    let object = catalog.describe_object(dep.object);
                    match dep.deptype {
                        SharedDependencyType::Owner => format!("owner of {object}"),
                        SharedDependencyType::Acl => format!("privileges for {object}"),
                    }
                })
                .collect::<Vec<_>>()
                .join("\n");
            return Err(AclError::DependentObjectsStillExist {
                message: format!(
                    "role \"{name}\" cannot be dropped because some objects depend on it"
                ),
                detail: Some(detail),
                hint: None,
            });
        }
        catalog.roles_mut().drop_role(role)?;
        tracing::debug!(role, name, "role dropped");
        Ok(CommandResult::new("DROP ROLE", notices))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::oid::PG_PUBLIC_NAMESPACE;
    use crate::catalog::DefaultAclObjectType;
    use crate::commands::{
        exec_alter_default_privileges, exec_grant_stmt, AccessPriv, AlterDefaultPrivilegesStmt,
        GrantStmt, GrantTargets,
    };
    use crate::security::roles::CreateRoleOptions;

    struct Fixture {
        catalog: Catalog,
        alice: Oid,
        bob: Oid,
        table: Oid,
    }

    fn fixture() -> Fixture {
        let mut catalog = Catalog::new_bootstrap();
        let alice = catalog
            .create_role("alice", CreateRoleOptions::default())
            .expect("alice");
        let bob = catalog
            .create_role("bob", CreateRoleOptions::default())
            .expect("bob");
        let table = catalog
            .insert_relation(PG_PUBLIC_NAMESPACE, "t", RelKind::Table, alice, &["a"])
            .expect("table");
        catalog
            .shdepend_mut()
            .record_owner(ObjectAddress::new(ObjectClass::Relation, table), alice);
        Fixture {
            catalog,
            alice,
            bob,
            table,
        }
    }

    fn grant_select(fx: &mut Fixture, to: &str, columns: bool) {
        let privileges = if columns {
            vec![AccessPriv::on_columns(Some("select"), &["a"])]
        } else {
            vec![AccessPriv::new("select")]
        };
        let stmt = GrantStmt::grant(
            ObjectType::Table,
            GrantTargets::Oids(vec![fx.table]),
            Some(privileges),
            vec![RoleSpec::name(to)],
        );
        exec_grant_stmt(&mut fx.catalog, &SessionContext::new(fx.alice), &stmt, None)
            .expect("grant");
    }

    #[test]
    fn owner_change_rewrites_acl() {
        let mut fx = fixture();
        grant_select(&mut fx, "bob", false);
        let session = SessionContext::new(BOOTSTRAP_SUPERUSERID);
        let addr = ObjectAddress::new(ObjectClass::Relation, fx.table);
        let result = alter_owner(&mut fx.catalog, &session, addr, &RoleSpec::name("bob"))
            .expect("alter owner");
        assert_eq!(result.command_tag, "ALTER TABLE");

        let acl = fx
            .catalog
            .relation(fx.table)
            .and_then(|rel| rel.acl.clone())
            .expect("acl");
        assert!(!acl.mentions_role(fx.alice));
        // bob's own grant folded into his owner entry.
        assert_eq!(acl.len(), 1);
        assert!(!fx.catalog.shdepend().has_dependents(fx.alice));
        let deps = fx.catalog.shdepend().dependents_of_role(fx.bob);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].deptype, SharedDependencyType::Owner);
    }

    #[test]
    fn owner_change_needs_ownership_and_membership() {
        let mut fx = fixture();
        let addr = ObjectAddress::new(ObjectClass::Relation, fx.table);
        let err = alter_owner(
            &mut fx.catalog,
            &SessionContext::new(fx.bob),
            addr,
            &RoleSpec::name("bob"),
        )
        .expect_err("not owner");
        assert_eq!(err.to_string(), "must be owner of table t");

        let err = alter_owner(
            &mut fx.catalog,
            &SessionContext::new(fx.alice),
            addr,
            &RoleSpec::name("bob"),
        )
        .expect_err("not a member of bob");
        assert_eq!(err.to_string(), "must be able to SET ROLE \"bob\"");
    }

    #[test]
    fn drop_owned_strips_table_and_column_grants() {
        let mut fx = fixture();
        grant_select(&mut fx, "bob", false);
        grant_select(&mut fx, "bob", true);
        let alter = AlterDefaultPrivilegesStmt::grant(
            ObjectType::Table,
            Some(vec![AccessPriv::new("select")]),
            vec![RoleSpec::name("bob")],
        );
        exec_alter_default_privileges(&mut fx.catalog, &SessionContext::new(fx.alice), &alter)
            .expect("default acl");
        assert!(fx.catalog.shdepend().has_dependents(fx.bob));

        let session = SessionContext::new(BOOTSTRAP_SUPERUSERID);
        drop_owned_privileges(&mut fx.catalog, &session, &[RoleSpec::name("bob")])
            .expect("drop owned");
        assert!(!fx.catalog.shdepend().has_dependents(fx.bob));
        let rel = fx.catalog.relation(fx.table).expect("table");
        assert!(!rel.acl.as_ref().is_some_and(|acl| acl.mentions_role(fx.bob)));
        assert!(rel.column(1).is_some_and(|col| col.acl.is_none()));
        // alice's default row went back to the built-in default.
        assert_eq!(fx.catalog.default_acls().count(), 0);

        drop_role(&mut fx.catalog, &session, "bob", false).expect("drop bob");
        assert!(fx.catalog.roles().lookup("bob").is_err());
    }

    #[test]
    fn drop_role_reports_dependencies() {
        let mut fx = fixture();
        grant_select(&mut fx, "bob", false);
        let session = SessionContext::new(BOOTSTRAP_SUPERUSERID);
        let err = drop_role(&mut fx.catalog, &session, "bob", false).expect_err("in use");
        assert_eq!(
            err.to_string(),
            "role \"bob\" cannot be dropped because some objects depend on it"
        );
        assert_eq!(err.detail(), Some("privileges for table t"));

        let err = drop_role(&mut fx.catalog, &SessionContext::new(fx.alice), "bob", false)
            .expect_err("not superuser");
        assert_eq!(err.to_string(), "permission denied to drop role");

        let result = drop_role(&mut fx.catalog, &session, "nobody", true).expect("if exists");
        assert_eq!(result.notices.len(), 1);
    }

    #[test]
    fn drop_role_takes_default_acls_along() {
        let mut fx = fixture();
        let alter = AlterDefaultPrivilegesStmt::grant(
            ObjectType::Sequence,
            None,
            vec![RoleSpec::Public],
        );
        exec_alter_default_privileges(&mut fx.catalog, &SessionContext::new(fx.bob), &alter)
            .expect("default acl");
        assert_eq!(fx.catalog.default_acls().count(), 1);
        let (key, _) = fx.catalog.default_acls().next().expect("row");
        assert_eq!(key.objtype, DefaultAclObjectType::Sequence);

        let session = SessionContext::new(BOOTSTRAP_SUPERUSERID);
        drop_role(&mut fx.catalog, &session, "bob", false).expect("drop bob");
        assert_eq!(fx.catalog.default_acls().count(), 0);
    }
}
