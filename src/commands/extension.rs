//! CREATE EXTENSION scoping and ALTER EXTENSION ADD/DROP membership, which
//! decide when initial privileges get recorded.

use crate::catalog::oid::{Oid, PG_PUBLIC_NAMESPACE};
use crate::catalog::{Catalog, InitPrivsType, ObjectAddress, ObjectClass};
use crate::error::AclError;
use crate::security::aclmask::{
    aclcheck_error, default_object_type, AclResult, PrivilegeEvaluator,
};
use crate::security::init_privs::{record_ext_obj_init_priv, remove_ext_obj_init_priv};
use crate::security::{Notices, RecordingMode, RoleMembership, SessionContext};

pub use crate::security::init_privs::binary_upgrade_set_record_init_privs;

use super::CommandResult;

/// CREATE EXTENSION. `script` stands in for the extension's install script:
/// everything it creates or grants is recorded as the extension's initial
/// state. The session's previous recording mode is restored afterwards,
/// whether the script succeeds or not.
pub fn create_extension<F>(
    catalog: &mut Catalog,
    session: &mut SessionContext,
    name: &str,
    schema: Option<&str>,
    if_not_exists: bool,
    script: F,
) -> Result<CommandResult, AclError>
where
    F: FnOnce(&mut Catalog, &SessionContext) -> Result<(), AclError>,
{
    let mut notices = Notices::new();
    if catalog.extension_oid(name).is_ok() {
        if if_not_exists {
            notices.warn("42710", format!("extension \"{name}\" already exists, skipping"));
            return Ok(CommandResult::new("CREATE EXTENSION", notices));
        }
        return Err(AclError::DuplicateObject(format!(
            "extension \"{name}\" already exists"
        )));
    }
    if !catalog.roles().is_superuser(session.current_user) {
        return Err(AclError::InsufficientPrivilege(format!(
            "permission denied to create extension \"{name}\""
        )));
    }

    let previous = session.recording;
    let result = catalog.in_transaction(|catalog| {
        let namespace = match schema {
            Some(schema) => catalog.resolve_namespace(schema)?,
            None => PG_PUBLIC_NAMESPACE,
        };
        let owner = session.current_user;
        let extension = catalog.insert_extension(name, owner, namespace)?;
        tracing::debug!(extension, name, "running extension script");
        session.recording = RecordingMode::CreatingExtension(extension);
        let outcome = script(catalog, session);
        session.recording = previous;
        outcome
    });
    session.recording = previous;
    result?;
    Ok(CommandResult::new("CREATE EXTENSION", notices))
}

fn check_extension_owner(
    catalog: &Catalog,
    session: &SessionContext,
    name: &str,
) -> Result<Oid, AclError> {
    let extension = catalog.extension_oid(name)?;
    let owner = catalog
        .extension(extension)
        .map(|ext| ext.owner)
        .ok_or_else(|| AclError::UndefinedObject(format!("extension \"{name}\" does not exist")))?;
    if !catalog.roles().has_privs_of_role(session.current_user, owner) {
        return Err(AclError::InsufficientPrivilege(format!(
            "must be owner of extension {name}"
        )));
    }
    Ok(extension)
}

fn check_object_owner(
    catalog: &Catalog,
    session: &SessionContext,
    addr: ObjectAddress,
) -> Result<(), AclError> {
    let evaluator = PrivilegeEvaluator::new(catalog, session);
    if evaluator.object_ownercheck(addr.class, addr.object_id, session.current_user)? {
        return Ok(());
    }
    let objtype = match catalog.relation(addr.object_id) {
        Some(rel) if addr.class == ObjectClass::Relation => rel.kind.object_type(),
        _ => default_object_type(addr.class),
    };
    aclcheck_error(
        AclResult::NotOwner,
        objtype,
        &catalog.object_name(addr.class, addr.object_id)?,
    )
}

/// ALTER EXTENSION ... ADD: the object joins the extension and its current
/// ACLs become its initial privileges.
pub fn alter_extension_add(
    catalog: &mut Catalog,
    session: &SessionContext,
    extension: &str,
    addr: ObjectAddress,
) -> Result<CommandResult, AclError> {
    catalog.in_transaction(|catalog| {
        let ext_oid = check_extension_owner(catalog, session, extension)?;
        check_object_owner(catalog, session, addr)?;
        if let Some(current) = catalog.extension_of(addr) {
            let current_name = catalog
                .extension(current)
                .map_or_else(|| current.to_string(), |ext| ext.name.clone());
            return Err(AclError::ObjectNotInPrerequisiteState(format!(
                "{} is already a member of extension \"{current_name}\"",
                catalog.describe_object(addr)
            )));
        }
        catalog.add_extension_member(addr, ext_oid);
        record_ext_obj_init_priv(catalog, addr, InitPrivsType::Extension)?;
        catalog.command_counter_increment();
        Ok(CommandResult::new("ALTER EXTENSION", Notices::new()))
    })
}

/// ALTER EXTENSION ... DROP: the object leaves the extension and its
/// initial-privilege rows are removed.
pub fn alter_extension_drop(
    catalog: &mut Catalog,
    session: &SessionContext,
    extension: &str,
    addr: ObjectAddress,
) -> Result<CommandResult, AclError> {
    catalog.in_transaction(|catalog| {
        let ext_oid = check_extension_owner(catalog, session, extension)?;
        check_object_owner(catalog, session, addr)?;
        if catalog.extension_of(addr) != Some(ext_oid) {
            return Err(AclError::ObjectNotInPrerequisiteState(format!(
                "{} is not a member of extension \"{extension}\"",
                catalog.describe_object(addr)
            )));
        }
        catalog.remove_extension_member(addr);
        remove_ext_obj_init_priv(catalog, addr)?;
        catalog.command_counter_increment();
        Ok(CommandResult::new("ALTER EXTENSION", Notices::new()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::oid::BOOTSTRAP_SUPERUSERID;
    use crate::catalog::{InitPrivKey, ObjectType, RelKind};
    use crate::commands::define::create_relation;
    use crate::commands::{exec_grant_stmt, AccessPriv, GrantStmt, GrantTargets, RoleSpec};

    fn table_key(rel: Oid) -> InitPrivKey {
        InitPrivKey {
            object_id: rel,
            class: ObjectClass::Relation,
            sub_id: 0,
        }
    }

    #[test]
    fn script_grants_become_initial_privileges() {
        let mut catalog = Catalog::new_bootstrap();
        let mut session = SessionContext::new(BOOTSTRAP_SUPERUSERID);
        let mut created = None;
        create_extension(&mut catalog, &mut session, "demo", None, false, |catalog, session| {
            let rel = create_relation(catalog, session, "ext_t", RelKind::Table, &["a"])?;
            let grant = GrantStmt::grant(
                ObjectType::Table,
                GrantTargets::Oids(vec![rel]),
                Some(vec![AccessPriv::new("select")]),
                vec![RoleSpec::Public],
            );
            exec_grant_stmt(catalog, session, &grant, None)?;
            created = Some(rel);
            Ok(())
        })
        .expect("create extension");
        assert_eq!(session.recording, RecordingMode::Off);

        let rel = created.expect("table created");
        let addr = ObjectAddress::new(ObjectClass::Relation, rel);
        let ext = catalog.extension_oid("demo").expect("extension row");
        assert_eq!(catalog.extension_of(addr), Some(ext));
        let entry = catalog.init_priv(&table_key(rel)).expect("init privs");
        assert_eq!(entry.privtype, InitPrivsType::Extension);
        assert_eq!(Some(&entry.acl), catalog.relation(rel).and_then(|r| r.acl.as_ref()));

        // Grants after the script are not recorded.
        let revoke = GrantStmt::revoke(
            ObjectType::Table,
            GrantTargets::Oids(vec![rel]),
            Some(vec![AccessPriv::new("select")]),
            vec![RoleSpec::Public],
        );
        exec_grant_stmt(&mut catalog, &session, &revoke, None).expect("revoke");
        let entry = catalog.init_priv(&table_key(rel)).expect("init privs kept");
        assert_ne!(Some(&entry.acl), catalog.relation(rel).and_then(|r| r.acl.as_ref()));
    }

    #[test]
    fn failed_script_restores_recording_mode() {
        let mut catalog = Catalog::new_bootstrap();
        let mut session = SessionContext::new(BOOTSTRAP_SUPERUSERID);
        let err = create_extension(&mut catalog, &mut session, "broken", None, false, |_, _| {
            Err(AclError::Internal("boom".to_string()))
        })
        .expect_err("script fails");
        assert!(err.is_internal());
        assert_eq!(session.recording, RecordingMode::Off);
        assert!(catalog.extension_oid("broken").is_err());

        create_extension(&mut catalog, &mut session, "ok", None, false, |_, _| Ok(()))
            .expect("create");
        let result = create_extension(&mut catalog, &mut session, "ok", None, true, |_, _| Ok(()))
            .expect("if not exists");
        assert_eq!(result.notices.len(), 1);
    }

    #[test]
    fn add_and_drop_membership() {
        let mut catalog = Catalog::new_bootstrap();
        let mut session = SessionContext::new(BOOTSTRAP_SUPERUSERID);
        create_extension(&mut catalog, &mut session, "demo", None, false, |_, _| Ok(()))
            .expect("create");
        let rel = create_relation(&mut catalog, &session, "t", RelKind::Table, &["a"])
            .expect("table");
        let grant = GrantStmt::grant(
            ObjectType::Table,
            GrantTargets::Oids(vec![rel]),
            Some(vec![AccessPriv::new("select")]),
            vec![RoleSpec::Public],
        );
        exec_grant_stmt(&mut catalog, &session, &grant, None).expect("grant");
        assert_eq!(catalog.init_privs().count(), 0);

        let addr = ObjectAddress::new(ObjectClass::Relation, rel);
        alter_extension_add(&mut catalog, &session, "demo", addr).expect("add");
        assert!(catalog.init_priv(&table_key(rel)).is_some());

        let err = alter_extension_add(&mut catalog, &session, "demo", addr).expect_err("twice");
        assert_eq!(err.to_string(), "table t is already a member of extension \"demo\"");

        alter_extension_drop(&mut catalog, &session, "demo", addr).expect("drop");
        assert_eq!(catalog.init_privs().count(), 0);
        let err = alter_extension_drop(&mut catalog, &session, "demo", addr).expect_err("twice");
        assert_eq!(err.to_string(), "table t is not a member of extension \"demo\"");
        assert_eq!(err.sqlstate(), "55000");
    }
}
