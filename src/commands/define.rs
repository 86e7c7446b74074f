//! CREATE commands, as far as privileges are concerned: the creation-time
//! permission checks, the default ACL a new object starts with, and the
//! owner and ACL dependency rows it needs.

use crate::catalog::oid::{Oid, BOOTSTRAP_SUPERUSERID, PG_PUBLIC_NAMESPACE};
use crate::catalog::{
    Catalog, FunctionKind, ObjectAddress, ObjectClass, ObjectType, RelKind, TypeKind,
};
use crate::error::AclError;
use crate::security::acl::{Acl, AclMode};
use crate::security::aclmask::{aclcheck_error, AclResult, PrivilegeEvaluator};
use crate::security::default_acl::{get_user_default_acl, record_dependency_on_new_acl};
use crate::security::init_privs::record_extension_init_priv;
use crate::security::roles::CreateRoleOptions;
use crate::security::{parse_qualified_name, RecordingMode, SessionContext};

use super::{resolve_role, RoleSpec};

/// Stores the initial ACL of a freshly inserted row and registers it with
/// the dependency and extension bookkeeping.
fn finish_create(
    catalog: &mut Catalog,
    session: &SessionContext,
    addr: ObjectAddress,
    owner: Oid,
    acl: Option<Acl>,
) -> Result<(), AclError> {
    catalog.set_acl(addr, acl.clone())?;
    catalog.shdepend_mut().record_owner(addr, owner);
    record_dependency_on_new_acl(catalog, addr, owner, acl.as_ref());
    if let RecordingMode::CreatingExtension(extension) = session.recording {
        catalog.add_extension_member(addr, extension);
    }
    if acl.is_some() {
        record_extension_init_priv(catalog, session, addr, acl.as_ref());
    }
    tracing::debug!(?addr, owner, has_acl = acl.is_some(), "object created");
    catalog.command_counter_increment();
    Ok(())
}

fn require_superuser(
    catalog: &Catalog,
    session: &SessionContext,
    message: String,
) -> Result<(), AclError> {
    if catalog.roles().is_superuser(session.current_user) {
        Ok(())
    } else {
        Err(AclError::InsufficientPrivilege(message))
    }
}

fn check_privilege(
    catalog: &Catalog,
    session: &SessionContext,
    objtype: ObjectType,
    object_id: Oid,
    mode: AclMode,
) -> Result<(), AclError> {
    let evaluator = PrivilegeEvaluator::new(catalog, session);
    let result =
        evaluator.object_aclcheck(objtype.class(), object_id, session.current_user, mode.into())?;
    aclcheck_error(result, objtype, &catalog.object_name(objtype.class(), object_id)?)
}

/// Schema a new object goes into: the named one, `pg_temp` for the
/// session's temporary schema, or `public`. Requires CREATE on it.
fn creation_namespace(
    catalog: &Catalog,
    session: &SessionContext,
    schema: Option<&str>,
) -> Result<Oid, AclError> {
    let namespace = match schema {
        Some("pg_temp") => session.temp_namespace.ok_or_else(|| {
            AclError::UndefinedSchema("no schema has been selected to create in".to_string())
        })?,
        Some(name) => catalog.resolve_namespace(name)?,
        None => PG_PUBLIC_NAMESPACE,
    };
    check_privilege(catalog, session, ObjectType::Schema, namespace, AclMode::Create)?;
    Ok(namespace)
}

/// Splits `schema.name` into its parts.
fn split_name(name: &str) -> Result<(Option<String>, String), AclError> {
    let mut parts = parse_qualified_name(name);
    match parts.len() {
        1 => Ok((None, parts.remove(0))),
        2 => {
            let object = parts.remove(1);
            Ok((Some(parts.remove(0)), object))
        }
        _ => Err(AclError::Syntax(format!(
            "improper qualified name (too many dotted names): {name}"
        ))),
    }
}

/// CREATE SCHEMA [AUTHORIZATION role].
pub fn create_schema(
    catalog: &mut Catalog,
    session: &SessionContext,
    name: &str,
    authorization: Option<&RoleSpec>,
) -> Result<Oid, AclError> {
    catalog.in_transaction(|catalog| {
        check_privilege(
            catalog,
            session,
            ObjectType::Database,
            session.database,
            AclMode::Create,
        )?;
        let owner = match authorization {
            Some(spec) => resolve_role(catalog, session, spec)?,
            None => session.current_user,
        };
        if !catalog.roles().can_set_role(session.current_user, owner) {
            return Err(AclError::InsufficientPrivilege(format!(
                "must be able to SET ROLE \"{}\"",
                catalog.roles().display_name(owner)
            )));
        }
        let oid = catalog.insert_namespace(name, owner)?;
        let acl = get_user_default_acl(catalog, ObjectType::Schema, owner, None)?;
        finish_create(
            catalog,
            session,
            ObjectAddress::new(ObjectClass::Namespace, oid),
            owner,
            acl,
        )?;
        Ok(oid)
    })
}

/// CREATE TABLE / VIEW / SEQUENCE / ... owned by the current user.
/// Indexes and composite types carry no ACL of their own.
pub fn create_relation(
    catalog: &mut Catalog,
    session: &SessionContext,
    name: &str,
    kind: RelKind,
    columns: &[&str],
) -> Result<Oid, AclError> {
    catalog.in_transaction(|catalog| {
        let (schema, relname) = split_name(name)?;
        let namespace = creation_namespace(catalog, session, schema.as_deref())?;
        let owner = session.current_user;
        let oid = catalog.insert_relation(namespace, &relname, kind, owner, columns)?;
        let acl = match kind {
            RelKind::Sequence => {
                get_user_default_acl(catalog, ObjectType::Sequence, owner, Some(namespace))?
            }
            kind if kind.is_grantable() => {
                get_user_default_acl(catalog, ObjectType::Table, owner, Some(namespace))?
            }
            _ => None,
        };
        finish_create(
            catalog,
            session,
            ObjectAddress::new(ObjectClass::Relation, oid),
            owner,
            acl,
        )?;
        Ok(oid)
    })
}

/// CREATE FUNCTION / PROCEDURE. Needs USAGE on the language and on every
/// argument type; untrusted languages are for superusers only.
pub fn create_function(
    catalog: &mut Catalog,
    session: &SessionContext,
    name: &str,
    kind: FunctionKind,
    arg_types: &[&str],
    language: &str,
) -> Result<Oid, AclError> {
    catalog.in_transaction(|catalog| {
        let (schema, funcname) = split_name(name)?;
        let namespace = creation_namespace(catalog, session, schema.as_deref())?;
        let owner = session.current_user;

        let lang_oid = catalog.language_oid(language)?;
        let trusted = catalog.language(lang_oid).is_some_and(|lang| lang.trusted);
        if trusted {
            check_privilege(catalog, session, ObjectType::Language, lang_oid, AclMode::Usage)?;
        } else if !catalog.roles().is_superuser(owner) {
            aclcheck_error(AclResult::NoPriv, ObjectType::Language, language)?;
        }

        let path = session.search_path();
        let mut arg_oids = Vec::with_capacity(arg_types.len());
        for arg in arg_types {
            let typ = catalog.resolve_type(&parse_qualified_name(arg), &path)?;
            let evaluator = PrivilegeEvaluator::new(catalog, session);
            let result =
                evaluator.object_aclcheck(ObjectClass::Type, typ, owner, AclMode::Usage.into())?;
            aclcheck_error(result, ObjectType::Type, arg)?;
            arg_oids.push(typ);
        }

        let oid = catalog.insert_function(namespace, &funcname, kind, arg_oids, lang_oid, owner)?;
        let acl = get_user_default_acl(catalog, ObjectType::Function, owner, Some(namespace))?;
        finish_create(
            catalog,
            session,
            ObjectAddress::new(ObjectClass::Function, oid),
            owner,
            acl,
        )?;
        Ok(oid)
    })
}

/// CREATE TYPE / DOMAIN. The implicit array type gets no ACL: its
/// privileges are always those of the element type.
pub fn create_type(
    catalog: &mut Catalog,
    session: &SessionContext,
    name: &str,
    kind: TypeKind,
) -> Result<Oid, AclError> {
    catalog.in_transaction(|catalog| {
        let (schema, typname) = split_name(name)?;
        let namespace = creation_namespace(catalog, session, schema.as_deref())?;
        let owner = session.current_user;
        let (oid, array) = catalog.insert_type(namespace, &typname, kind, owner)?;
        let acl = get_user_default_acl(catalog, ObjectType::Type, owner, Some(namespace))?;
        finish_create(
            catalog,
            session,
            ObjectAddress::new(ObjectClass::Type, oid),
            owner,
            acl,
        )?;
        if let Some(array) = array {
            finish_create(
                catalog,
                session,
                ObjectAddress::new(ObjectClass::Type, array),
                owner,
                None,
            )?;
        }
        Ok(oid)
    })
}

pub fn create_language(
    catalog: &mut Catalog,
    session: &SessionContext,
    name: &str,
    trusted: bool,
) -> Result<Oid, AclError> {
    catalog.in_transaction(|catalog| {
        require_superuser(
            catalog,
            session,
            format!("must be superuser to create procedural language \"{name}\""),
        )?;
        let owner = session.current_user;
        let oid = catalog.insert_language(name, trusted, owner)?;
        finish_create(
            catalog,
            session,
            ObjectAddress::new(ObjectClass::Language, oid),
            owner,
            None,
        )?;
        Ok(oid)
    })
}

pub fn create_database(
    catalog: &mut Catalog,
    session: &SessionContext,
    name: &str,
) -> Result<Oid, AclError> {
    catalog.in_transaction(|catalog| {
        require_superuser(catalog, session, "permission denied to create database".to_string())?;
        let owner = session.current_user;
        let oid = catalog.insert_database(name, owner)?;
        finish_create(
            catalog,
            session,
            ObjectAddress::new(ObjectClass::Database, oid),
            owner,
            None,
        )?;
        Ok(oid)
    })
}

pub fn create_tablespace(
    catalog: &mut Catalog,
    session: &SessionContext,
    name: &str,
) -> Result<Oid, AclError> {
    catalog.in_transaction(|catalog| {
        require_superuser(
            catalog,
            session,
            format!("permission denied to create tablespace \"{name}\""),
        )?;
        let owner = session.current_user;
        let oid = catalog.insert_tablespace(name, owner)?;
        finish_create(
            catalog,
            session,
            ObjectAddress::new(ObjectClass::Tablespace, oid),
            owner,
            None,
        )?;
        Ok(oid)
    })
}

pub fn create_foreign_data_wrapper(
    catalog: &mut Catalog,
    session: &SessionContext,
    name: &str,
) -> Result<Oid, AclError> {
    catalog.in_transaction(|catalog| {
        require_superuser(
            catalog,
            session,
            format!("permission denied to create foreign-data wrapper \"{name}\""),
        )?;
        let owner = session.current_user;
        let oid = catalog.insert_fdw(name, owner)?;
        finish_create(
            catalog,
            session,
            ObjectAddress::new(ObjectClass::ForeignDataWrapper, oid),
            owner,
            None,
        )?;
        Ok(oid)
    })
}

/// CREATE SERVER needs USAGE on its foreign-data wrapper.
pub fn create_foreign_server(
    catalog: &mut Catalog,
    session: &SessionContext,
    name: &str,
    fdw: &str,
) -> Result<Oid, AclError> {
    catalog.in_transaction(|catalog| {
        let fdw_oid = catalog.fdw_oid(fdw)?;
        check_privilege(
            catalog,
            session,
            ObjectType::ForeignDataWrapper,
            fdw_oid,
            AclMode::Usage,
        )?;
        let owner = session.current_user;
        let oid = catalog.insert_server(name, fdw_oid, owner)?;
        finish_create(
            catalog,
            session,
            ObjectAddress::new(ObjectClass::ForeignServer, oid),
            owner,
            None,
        )?;
        Ok(oid)
    })
}

/// `lo_create()`: anyone may create a large object.
pub fn create_large_object(
    catalog: &mut Catalog,
    session: &SessionContext,
) -> Result<Oid, AclError> {
    catalog.in_transaction(|catalog| {
        let owner = session.current_user;
        let oid = catalog.insert_large_object(owner);
        finish_create(
            catalog,
            session,
            ObjectAddress::new(ObjectClass::LargeObject, oid),
            owner,
            None,
        )?;
        Ok(oid)
    })
}

pub fn create_role(
    catalog: &mut Catalog,
    session: &SessionContext,
    name: &str,
    options: CreateRoleOptions,
) -> Result<Oid, AclError> {
    catalog.in_transaction(|catalog| {
        require_superuser(catalog, session, "permission denied to create role".to_string())?;
        let oid = catalog.create_role(name, options)?;
        tracing::debug!(role = oid, name, "role created");
        Ok(oid)
    })
}

/// Creates the session's temporary schema on first use. Needs TEMPORARY
/// on the current database.
pub fn init_temp_namespace(
    catalog: &mut Catalog,
    session: &mut SessionContext,
) -> Result<Oid, AclError> {
    if let Some(namespace) = session.temp_namespace {
        return Ok(namespace);
    }
    let evaluator = PrivilegeEvaluator::new(catalog, session);
    let result = evaluator.object_aclcheck(
        ObjectClass::Database,
        session.database,
        session.current_user,
        AclMode::CreateTemp.into(),
    )?;
    if result != AclResult::Ok {
        return Err(AclError::InsufficientPrivilege(format!(
            "permission denied to create temporary tables in database \"{}\"",
            catalog.object_name(ObjectClass::Database, session.database)?
        )));
    }
    let name = format!("pg_temp_{}", session.current_user);
    let namespace = catalog.in_transaction(|catalog| {
        catalog.insert_namespace(&name, BOOTSTRAP_SUPERUSERID)
    })?;
    session.temp_namespace = Some(namespace);
    Ok(namespace)
}
