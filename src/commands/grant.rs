//! GRANT and REVOKE on database objects.
//!
//! A statement is normalized into an [`InternalGrant`] (object OIDs, grantee
//! OIDs, a privilege mask) and then applied object by object. One loop serves
//! every kind; a small [`GrantHandler`] supplies the checks, owner and ACL
//! loading, and storage, and relations use it to cover column privileges.

use std::collections::BTreeMap;

use crate::catalog::oid::{Oid, ACL_ID_PUBLIC};
use crate::catalog::{
    missing_object, Catalog, FunctionKind, ObjectAddress, ObjectClass, ObjectType, RelKind,
    TypeKind,
};
use crate::error::AclError;
use crate::security::acl::{
    acldefault, merge_acl_with_grant, privilege_to_string, string_to_privilege, whole_mask, Acl,
    AclMode, AclModes, DropBehavior, ACL_ALL_RIGHTS_COLUMN, ACL_ALL_RIGHTS_RELATION,
    ACL_ALL_RIGHTS_SEQUENCE, ACL_NO_RIGHTS,
};
use crate::security::aclmask::{aclcheck_error, PrivilegeEvaluator};
use crate::security::init_privs::record_extension_init_priv;
use crate::security::restrict::{restrict_and_check_grant, RestrictTarget};
use crate::security::roles::GrantorResolver;
use crate::security::{
    parse_qualified_name, Notices, SessionContext, WARNING_INVALID_GRANT_OPERATION,
};

use super::{resolve_role, CommandResult, RoleSpec};

/// An object named in a GRANT, optionally with routine argument types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectName {
    pub parts: Vec<String>,
    pub args: Option<Vec<String>>,
}

impl ObjectName {
    pub fn new(name: &str) -> Self {
        Self {
            parts: parse_qualified_name(name),
            args: None,
        }
    }

    pub fn with_args(name: &str, args: &[&str]) -> Self {
        Self {
            parts: parse_qualified_name(name),
            args: Some(args.iter().map(|arg| arg.to_string()).collect()),
        }
    }

    fn display(&self) -> String {
        self.parts.join(".")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantTargets {
    Oids(Vec<Oid>),
    Names(Vec<ObjectName>),
    /// `ALL TABLES IN SCHEMA a, b` and friends.
    AllInSchema(Vec<String>),
}

impl GrantTargets {
    pub fn names(names: &[&str]) -> Self {
        Self::Names(names.iter().map(|name| ObjectName::new(name)).collect())
    }
}

/// One privilege of the privilege list. `priv_name: None` is ALL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPriv {
    pub priv_name: Option<String>,
    pub cols: Vec<String>,
}

impl AccessPriv {
    pub fn new(name: &str) -> Self {
        Self {
            priv_name: Some(name.to_string()),
            cols: Vec::new(),
        }
    }

    pub fn on_columns(name: Option<&str>, cols: &[&str]) -> Self {
        Self {
            priv_name: name.map(str::to_string),
            cols: cols.iter().map(|col| col.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantStmt {
    pub is_grant: bool,
    pub objtype: ObjectType,
    pub targets: GrantTargets,
    /// `None` for ALL PRIVILEGES.
    pub privileges: Option<Vec<AccessPriv>>,
    pub grantees: Vec<RoleSpec>,
    /// WITH GRANT OPTION, or GRANT OPTION FOR on REVOKE.
    pub grant_option: bool,
    pub behavior: DropBehavior,
    pub grantor: Option<RoleSpec>,
}

impl GrantStmt {
    pub fn grant(
        objtype: ObjectType,
        targets: GrantTargets,
        privileges: Option<Vec<AccessPriv>>,
        grantees: Vec<RoleSpec>,
    ) -> Self {
        Self {
            is_grant: true,
            objtype,
            targets,
            privileges,
            grantees,
            grant_option: false,
            behavior: DropBehavior::Restrict,
            grantor: None,
        }
    }

    pub fn revoke(
        objtype: ObjectType,
        targets: GrantTargets,
        privileges: Option<Vec<AccessPriv>>,
        grantees: Vec<RoleSpec>,
    ) -> Self {
        Self {
            is_grant: false,
            ..Self::grant(objtype, targets, privileges, grantees)
        }
    }

    pub fn with_grant_option(mut self) -> Self {
        self.grant_option = true;
        self
    }

    pub fn cascade(mut self) -> Self {
        self.behavior = DropBehavior::Cascade;
        self
    }

    pub fn granted_by(mut self, grantor: RoleSpec) -> Self {
        self.grantor = Some(grantor);
        self
    }
}

/// A GRANT/REVOKE with every name resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalGrant {
    pub is_grant: bool,
    pub objtype: ObjectType,
    pub objects: Vec<Oid>,
    pub all_privs: bool,
    pub privileges: AclModes,
    pub col_privs: Vec<AccessPriv>,
    pub grantees: Vec<Oid>,
    pub grant_option: bool,
    pub behavior: DropBehavior,
}

/// Receives every completed GRANT/REVOKE, for auditing. `privileges` holds
/// what was actually granted or revoked, after narrowing for grant options
/// and object kind.
pub trait GrantEventHook {
    fn collect_grant(&mut self, istmt: &InternalGrant);
}

impl<F: FnMut(&InternalGrant)> GrantEventHook for F {
    fn collect_grant(&mut self, istmt: &InternalGrant) {
        self(istmt)
    }
}

fn is_statement_objtype(objtype: ObjectType) -> bool {
    !matches!(
        objtype,
        ObjectType::View
            | ObjectType::MaterializedView
            | ObjectType::ForeignTable
            | ObjectType::Index
            | ObjectType::Column
    )
}

fn unrecognized_objtype(objtype: ObjectType) -> AclError {
    AclError::Internal(format!("unrecognized GrantStmt.objtype: {objtype:?}"))
}

pub fn exec_grant_stmt(
    catalog: &mut Catalog,
    session: &SessionContext,
    stmt: &GrantStmt,
    hook: Option<&mut dyn GrantEventHook>,
) -> Result<CommandResult, AclError> {
    if !is_statement_objtype(stmt.objtype) {
        return Err(unrecognized_objtype(stmt.objtype));
    }
    catalog.in_transaction(|catalog| {
        let mut notices = Notices::new();

        if let Some(grantor) = &stmt.grantor {
            let grantor = resolve_role(catalog, session, grantor)?;
            if grantor != session.current_user {
                return Err(AclError::FeatureNotSupported(
                    "grantor must be current user".to_string(),
                ));
            }
        }

        let objects = match &stmt.targets {
            GrantTargets::Oids(oids) => oids.clone(),
            GrantTargets::Names(names) => {
                object_names_to_oids(catalog, session, stmt.objtype, names)?
            }
            GrantTargets::AllInSchema(schemas) => {
                objects_in_schema_to_oids(catalog, session, stmt.objtype, schemas)?
            }
        };

        let grantees = stmt
            .grantees
            .iter()
            .map(|spec| match spec {
                RoleSpec::Public => Ok(ACL_ID_PUBLIC),
                other => resolve_role(catalog, session, other),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (all_privs, privileges, col_privs) = normalize_privileges(stmt)?;
        let mut istmt = InternalGrant {
            is_grant: stmt.is_grant,
            objtype: stmt.objtype,
            objects,
            all_privs,
            privileges,
            col_privs,
            grantees,
            grant_option: stmt.grant_option,
            behavior: stmt.behavior,
        };
        let applied = exec_grant_internal(catalog, session, &istmt, &mut notices)?;

        if istmt.objtype.supports_event_hooks() {
            if let Some(hook) = hook {
                istmt.privileges = applied;
                hook.collect_grant(&istmt);
            }
        }
        let tag = if stmt.is_grant { "GRANT" } else { "REVOKE" };
        Ok(CommandResult::new(tag, notices))
    })
}

/// Splits the privilege list into a relation-level mask and column lists,
/// rejecting anything the object kind does not support.
fn normalize_privileges(stmt: &GrantStmt) -> Result<(bool, AclModes, Vec<AccessPriv>), AclError> {
    let Some(list) = &stmt.privileges else {
        return Ok((true, ACL_NO_RIGHTS, Vec::new()));
    };
    // TABLE syntax covers sequences too; the per-relation loop sorts it out.
    let legal = match stmt.objtype {
        ObjectType::Table => ACL_ALL_RIGHTS_RELATION | ACL_ALL_RIGHTS_SEQUENCE,
        other => whole_mask(other),
    };
    let mut privileges = ACL_NO_RIGHTS;
    let mut col_privs = Vec::new();
    for access in list {
        if !access.cols.is_empty() {
            if stmt.objtype != ObjectType::Table {
                return Err(AclError::invalid_grant(
                    "column privileges are only valid for relations",
                ));
            }
            col_privs.push(access.clone());
            continue;
        }
        let name = access.priv_name.as_deref().ok_or_else(|| {
            AclError::Internal("AccessPriv node must specify privilege or columns".to_string())
        })?;
        let privs = string_to_privilege(name)?;
        if !(privs & !legal).is_empty() {
            return Err(AclError::invalid_grant(format!(
                "invalid privilege type {} for {}",
                privilege_to_string(privs),
                stmt.objtype.grant_noun()
            )));
        }
        privileges |= privs;
    }
    Ok((false, privileges, col_privs))
}

/// Applies an already-resolved GRANT/REVOKE. With `all_privs` set and an
/// empty mask, each object gets its kind's full privilege set.
///
/// Returns the union of the privileges actually granted or revoked, after
/// per-object narrowing.
pub fn exec_grant_internal(
    catalog: &mut Catalog,
    session: &SessionContext,
    istmt: &InternalGrant,
    notices: &mut Notices,
) -> Result<AclModes, AclError> {
    let handler = handler_for(istmt.objtype)?;
    exec_grant_objects(catalog, session, istmt, handler.as_ref(), notices)
}

/// An object as the grant loop sees it before its ACL changes.
struct GrantObject {
    /// Kind used for the hard-wired default ACL and in error messages.
    objtype: ObjectType,
    owner: Oid,
    name: String,
    stored: Option<Acl>,
}

impl GrantObject {
    fn load(catalog: &Catalog, objtype: ObjectType, object_id: Oid) -> Result<Self, AclError> {
        let class = objtype.class();
        Ok(Self {
            objtype,
            owner: catalog.get_owner(class, object_id)?,
            name: catalog.object_name(class, object_id)?,
            stored: catalog.get_acl(ObjectAddress::new(class, object_id))?,
        })
    }
}

/// Per-kind behaviour plugged into the shared grant loop.
trait GrantHandler {
    /// Kind-specific validity checks, run before the ACL is touched.
    fn check_object(
        &self,
        _catalog: &Catalog,
        _istmt: &InternalGrant,
        _object_id: Oid,
    ) -> Result<(), AclError> {
        Ok(())
    }

    fn load_owner_and_acl(
        &self,
        catalog: &Catalog,
        object_id: Oid,
    ) -> Result<GrantObject, AclError>;

    fn whole_mask(&self, object: &GrantObject) -> AclModes {
        whole_mask(object.objtype)
    }

    /// Object-level privileges to apply. Empty skips the object's own ACL.
    fn object_privileges(
        &self,
        istmt: &InternalGrant,
        object: &GrantObject,
        _notices: &mut Notices,
    ) -> Result<AclModes, AclError> {
        Ok(if istmt.all_privs && istmt.privileges.is_empty() {
            self.whole_mask(object)
        } else {
            istmt.privileges
        })
    }

    fn persist_acl(
        &self,
        catalog: &mut Catalog,
        session: &SessionContext,
        addr: ObjectAddress,
        object: &GrantObject,
        new_acl: Acl,
    ) -> Result<(), AclError> {
        let old_members = object.stored.as_ref().map(Acl::members).unwrap_or_default();
        store_acl(catalog, session, addr, object.owner, &old_members, Some(new_acl))
    }

    /// Runs once the object's own ACL is settled; returns what it applied.
    fn after_object(
        &self,
        _catalog: &mut Catalog,
        _session: &SessionContext,
        _istmt: &InternalGrant,
        _object_id: Oid,
        _object: &GrantObject,
        _privileges: AclModes,
        _notices: &mut Notices,
    ) -> Result<AclModes, AclError> {
        Ok(ACL_NO_RIGHTS)
    }
}

struct PlainHandler(ObjectType);

impl GrantHandler for PlainHandler {
    fn load_owner_and_acl(
        &self,
        catalog: &Catalog,
        object_id: Oid,
    ) -> Result<GrantObject, AclError> {
        GrantObject::load(catalog, self.0, object_id)
    }
}

struct FunctionHandler;

impl GrantHandler for FunctionHandler {
    fn load_owner_and_acl(
        &self,
        catalog: &Catalog,
        object_id: Oid,
    ) -> Result<GrantObject, AclError> {
        let func = catalog
            .function(object_id)
            .ok_or_else(|| missing_object(ObjectClass::Function, object_id))?;
        let objtype = match func.kind {
            FunctionKind::Procedure => ObjectType::Procedure,
            FunctionKind::Function | FunctionKind::Aggregate => ObjectType::Function,
        };
        GrantObject::load(catalog, objtype, object_id)
    }
}

struct LanguageHandler;

impl GrantHandler for LanguageHandler {
    fn check_object(
        &self,
        catalog: &Catalog,
        _istmt: &InternalGrant,
        object_id: Oid,
    ) -> Result<(), AclError> {
        let lang = catalog
            .language(object_id)
            .ok_or_else(|| missing_object(ObjectClass::Language, object_id))?;
        if !lang.trusted {
            return Err(AclError::WrongObjectType {
                message: format!("language \"{}\" is not trusted", lang.name),
                detail: Some(
                    "GRANT and REVOKE are not allowed on untrusted languages, because only \
                     superusers can use untrusted languages."
                        .to_string(),
                ),
                hint: None,
            });
        }
        Ok(())
    }

    fn load_owner_and_acl(
        &self,
        catalog: &Catalog,
        object_id: Oid,
    ) -> Result<GrantObject, AclError> {
        GrantObject::load(catalog, ObjectType::Language, object_id)
    }
}

struct TypeHandler;

impl GrantHandler for TypeHandler {
    fn check_object(
        &self,
        catalog: &Catalog,
        istmt: &InternalGrant,
        object_id: Oid,
    ) -> Result<(), AclError> {
        let typ = catalog
            .type_entry(object_id)
            .ok_or_else(|| missing_object(ObjectClass::Type, object_id))?;
        if typ.is_true_array() {
            return Err(AclError::InvalidGrantOperation {
                message: "cannot set privileges of array types".to_string(),
                hint: Some("Set the privileges of the element type instead.".to_string()),
            });
        }
        if istmt.objtype == ObjectType::Domain && typ.kind != TypeKind::Domain {
            return Err(AclError::wrong_object_type(format!(
                "\"{}\" is not a domain",
                typ.name
            )));
        }
        Ok(())
    }

    fn load_owner_and_acl(
        &self,
        catalog: &Catalog,
        object_id: Oid,
    ) -> Result<GrantObject, AclError> {
        let typ = catalog
            .type_entry(object_id)
            .ok_or_else(|| missing_object(ObjectClass::Type, object_id))?;
        let objtype = match typ.kind {
            TypeKind::Domain => ObjectType::Domain,
            _ => ObjectType::Type,
        };
        GrantObject::load(catalog, objtype, object_id)
    }
}

/// Tables and sequences, including their column privileges.
struct RelationHandler;

impl GrantHandler for RelationHandler {
    fn check_object(
        &self,
        catalog: &Catalog,
        istmt: &InternalGrant,
        object_id: Oid,
    ) -> Result<(), AclError> {
        let rel = catalog
            .relation(object_id)
            .ok_or_else(|| missing_object(ObjectClass::Relation, object_id))?;
        match rel.kind {
            RelKind::Index => Err(AclError::wrong_object_type(format!(
                "\"{}\" is an index",
                rel.name
            ))),
            RelKind::CompositeType => Err(AclError::wrong_object_type(format!(
                "\"{}\" is a composite type",
                rel.name
            ))),
            kind if istmt.objtype == ObjectType::Sequence && kind != RelKind::Sequence => Err(
                AclError::wrong_object_type(format!("\"{}\" is not a sequence", rel.name)),
            ),
            _ => Ok(()),
        }
    }

    fn load_owner_and_acl(
        &self,
        catalog: &Catalog,
        object_id: Oid,
    ) -> Result<GrantObject, AclError> {
        let rel = catalog
            .relation(object_id)
            .ok_or_else(|| missing_object(ObjectClass::Relation, object_id))?;
        let objtype = if rel.kind == RelKind::Sequence {
            ObjectType::Sequence
        } else {
            ObjectType::Table
        };
        Ok(GrantObject {
            objtype,
            owner: rel.owner,
            name: rel.name.clone(),
            stored: rel.acl.clone(),
        })
    }

    fn object_privileges(
        &self,
        istmt: &InternalGrant,
        object: &GrantObject,
        notices: &mut Notices,
    ) -> Result<AclModes, AclError> {
        let mut privileges = if istmt.all_privs && istmt.privileges.is_empty() {
            self.whole_mask(object)
        } else {
            istmt.privileges
        };
        if istmt.objtype == ObjectType::Table {
            if object.objtype == ObjectType::Sequence {
                if !(privileges & !ACL_ALL_RIGHTS_SEQUENCE).is_empty() {
                    notices.warn(
                        WARNING_INVALID_GRANT_OPERATION,
                        format!(
                            "sequence \"{}\" only supports USAGE, SELECT, and UPDATE privileges",
                            object.name
                        ),
                    );
                    privileges &= ACL_ALL_RIGHTS_SEQUENCE;
                }
            } else if !(privileges & !ACL_ALL_RIGHTS_RELATION).is_empty() {
                // Only USAGE can get here.
                return Err(AclError::invalid_grant(
                    "invalid privilege type USAGE for table",
                ));
            }
        }
        Ok(privileges)
    }

    fn after_object(
        &self,
        catalog: &mut Catalog,
        session: &SessionContext,
        istmt: &InternalGrant,
        relid: Oid,
        object: &GrantObject,
        privileges: AclModes,
        notices: &mut Notices,
    ) -> Result<AclModes, AclError> {
        let rel = catalog
            .relation(relid)
            .ok_or_else(|| missing_object(ObjectClass::Relation, relid))?;

        // Revoking a privilege that also exists per column revokes it from
        // every column as well.
        let mut col_privileges: BTreeMap<i16, AclModes> = BTreeMap::new();
        if !istmt.is_grant && privileges.intersects(ACL_ALL_RIGHTS_COLUMN) {
            for col in rel.live_columns() {
                *col_privileges.entry(col.attnum).or_default() |=
                    privileges & ACL_ALL_RIGHTS_COLUMN;
            }
        }

        for access in &istmt.col_privs {
            let mut privs = match &access.priv_name {
                None => ACL_ALL_RIGHTS_COLUMN,
                Some(name) => string_to_privilege(name)?,
            };
            if !(privs & !ACL_ALL_RIGHTS_COLUMN).is_empty() {
                return Err(AclError::invalid_grant(format!(
                    "invalid privilege type {} for column",
                    privilege_to_string(privs)
                )));
            }
            if object.objtype == ObjectType::Sequence && !(privs & !AclMode::Select).is_empty() {
                notices.warn(
                    WARNING_INVALID_GRANT_OPERATION,
                    format!(
                        "sequence \"{}\" only supports SELECT column privileges",
                        object.name
                    ),
                );
                privs &= AclMode::Select;
            }
            expand_col_privileges(catalog, relid, &access.cols, privs, &mut col_privileges)?;
        }

        let old_rel_acl = object
            .stored
            .clone()
            .unwrap_or_else(|| acldefault(object.objtype, object.owner));
        let mut applied = ACL_NO_RIGHTS;
        for (attnum, privs) in col_privileges {
            if privs.is_empty() {
                continue;
            }
            let target = ColumnGrant {
                relid,
                relname: &object.name,
                rel_objtype: object.objtype,
                attnum,
                owner: object.owner,
                privileges: privs,
                old_rel_acl: &old_rel_acl,
            };
            applied |= exec_grant_attribute(catalog, session, istmt, &target, notices)?;
        }
        Ok(applied)
    }
}

fn handler_for(objtype: ObjectType) -> Result<Box<dyn GrantHandler>, AclError> {
    Ok(match objtype {
        ObjectType::Table | ObjectType::Sequence => Box::new(RelationHandler),
        ObjectType::Function | ObjectType::Procedure | ObjectType::Routine => {
            Box::new(FunctionHandler)
        }
        ObjectType::Language => Box::new(LanguageHandler),
        ObjectType::Type | ObjectType::Domain => Box::new(TypeHandler),
        ObjectType::Database
        | ObjectType::ForeignDataWrapper
        | ObjectType::ForeignServer
        | ObjectType::LargeObject
        | ObjectType::Schema
        | ObjectType::Tablespace => Box::new(PlainHandler(objtype)),
        other => return Err(unrecognized_objtype(other)),
    })
}

/// Writes a new ACL and brings initial privileges and shared dependencies
/// in line with it.
fn store_acl(
    catalog: &mut Catalog,
    session: &SessionContext,
    addr: ObjectAddress,
    owner: Oid,
    old_members: &[Oid],
    new_acl: Option<Acl>,
) -> Result<(), AclError> {
    let new_members = new_acl.as_ref().map(Acl::members).unwrap_or_default();
    record_extension_init_priv(catalog, session, addr, new_acl.as_ref());
    catalog
        .shdepend_mut()
        .update_acl_dependencies(addr, owner, old_members, &new_members);
    tracing::debug!(?addr, acl = ?new_acl.as_ref().map(ToString::to_string), "ACL updated");
    catalog.set_acl(addr, new_acl)
}

fn exec_grant_objects(
    catalog: &mut Catalog,
    session: &SessionContext,
    istmt: &InternalGrant,
    handler: &dyn GrantHandler,
    notices: &mut Notices,
) -> Result<AclModes, AclError> {
    let mut applied = ACL_NO_RIGHTS;
    for &object_id in &istmt.objects {
        handler.check_object(catalog, istmt, object_id)?;
        let object = handler.load_owner_and_acl(catalog, object_id)?;
        let requested = handler.object_privileges(istmt, &object, notices)?;

        if !requested.is_empty() {
            let old_acl = object
                .stored
                .clone()
                .unwrap_or_else(|| acldefault(object.objtype, object.owner));
            let (grantor, avail_goptions) = catalog.roles().select_best_grantor(
                session.current_user,
                requested,
                &old_acl,
                object.owner,
            );
            let privileges = {
                let evaluator = PrivilegeEvaluator::new(catalog, session);
                restrict_and_check_grant(
                    &evaluator,
                    notices,
                    istmt.is_grant,
                    avail_goptions,
                    istmt.all_privs,
                    requested,
                    grantor,
                    &RestrictTarget::object(object.objtype, object_id, &object.name),
                )?
            };
            let new_acl = merge_acl_with_grant(
                old_acl,
                istmt.is_grant,
                istmt.grant_option,
                istmt.behavior,
                &istmt.grantees,
                privileges,
                grantor,
                object.owner,
                catalog.roles(),
            )?;
            let addr = ObjectAddress::new(object.objtype.class(), object_id);
            handler.persist_acl(catalog, session, addr, &object, new_acl)?;
            applied |= privileges;
        }

        applied |=
            handler.after_object(catalog, session, istmt, object_id, &object, requested, notices)?;

        // A later mention of the same object must see this change.
        catalog.command_counter_increment();
    }
    Ok(applied)
}

fn expand_col_privileges(
    catalog: &Catalog,
    relid: Oid,
    colnames: &[String],
    privileges: AclModes,
    col_privileges: &mut BTreeMap<i16, AclModes>,
) -> Result<(), AclError> {
    let rel = catalog
        .relation(relid)
        .ok_or_else(|| missing_object(ObjectClass::Relation, relid))?;
    for colname in colnames {
        let col = rel.column_by_name(colname).ok_or_else(|| {
            AclError::UndefinedColumn(format!(
                "column \"{colname}\" of relation \"{}\" does not exist",
                rel.name
            ))
        })?;
        *col_privileges.entry(col.attnum).or_default() |= privileges;
    }
    Ok(())
}

struct ColumnGrant<'a> {
    relid: Oid,
    relname: &'a str,
    rel_objtype: ObjectType,
    attnum: i16,
    owner: Oid,
    privileges: AclModes,
    /// The relation's ACL before this statement touched it.
    old_rel_acl: &'a Acl,
}

fn exec_grant_attribute(
    catalog: &mut Catalog,
    session: &SessionContext,
    istmt: &InternalGrant,
    target: &ColumnGrant<'_>,
    notices: &mut Notices,
) -> Result<AclModes, AclError> {
    let col = catalog
        .relation(target.relid)
        .and_then(|rel| rel.column(target.attnum))
        .ok_or_else(|| {
            AclError::Internal(format!(
                "cache lookup failed for attribute {} of relation {}",
                target.attnum, target.relid
            ))
        })?;
    let colname = col.name.clone();
    let stored = col.acl.clone();
    let old_members = stored.as_ref().map(Acl::members).unwrap_or_default();
    let old_acl = stored
        .clone()
        .unwrap_or_else(|| acldefault(ObjectType::Column, target.owner));

    // Table-level grant options let a role grant column privileges too,
    // so the grantor is picked against both ACLs. The concatenation is only
    // used here and never stored.
    let merged = Acl::concat(target.old_rel_acl, &old_acl);
    let (grantor, avail_goptions) = catalog.roles().select_best_grantor(
        session.current_user,
        target.privileges,
        &merged,
        target.owner,
    );
    let privileges = {
        let evaluator = PrivilegeEvaluator::new(catalog, session);
        restrict_and_check_grant(
            &evaluator,
            notices,
            istmt.is_grant,
            avail_goptions,
            target.privileges == ACL_ALL_RIGHTS_COLUMN,
            target.privileges,
            grantor,
            &RestrictTarget::column(
                target.rel_objtype,
                target.relid,
                target.relname,
                target.attnum,
                &colname,
            ),
        )?
    };

    let new_acl = merge_acl_with_grant(
        old_acl,
        istmt.is_grant,
        istmt.grant_option,
        istmt.behavior,
        &istmt.grantees,
        privileges,
        grantor,
        target.owner,
        catalog.roles(),
    )?;
    // Columns default to an empty ACL, so an empty result is stored as NULL.
    let new_acl = (!new_acl.is_empty()).then_some(new_acl);
    if new_acl.is_none() && stored.is_none() {
        return Ok(privileges);
    }
    store_acl(
        catalog,
        session,
        ObjectAddress::column(target.relid, target.attnum),
        target.owner,
        &old_members,
        new_acl,
    )?;
    Ok(privileges)
}

fn object_names_to_oids(
    catalog: &Catalog,
    session: &SessionContext,
    objtype: ObjectType,
    names: &[ObjectName],
) -> Result<Vec<Oid>, AclError> {
    let path = session.search_path();
    names
        .iter()
        .map(|name| match objtype {
            ObjectType::Table | ObjectType::Sequence => {
                catalog.resolve_relation(&name.parts, &path)
            }
            ObjectType::Domain | ObjectType::Type => catalog.resolve_type(&name.parts, &path),
            ObjectType::Function | ObjectType::Procedure | ObjectType::Routine => {
                lookup_routine(catalog, &path, objtype, name)
            }
            ObjectType::Database => catalog.database_oid(single_name(name)?),
            ObjectType::Language => catalog.language_oid(single_name(name)?),
            ObjectType::Schema => catalog.resolve_namespace(single_name(name)?),
            ObjectType::Tablespace => catalog.tablespace_oid(single_name(name)?),
            ObjectType::ForeignDataWrapper => catalog.fdw_oid(single_name(name)?),
            ObjectType::ForeignServer => catalog.server_oid(single_name(name)?),
            ObjectType::LargeObject => {
                let text = single_name(name)?;
                let oid = text.parse::<Oid>().map_err(|_| {
                    AclError::InvalidTextRepresentation(format!(
                        "invalid input syntax for type oid: \"{text}\""
                    ))
                })?;
                match catalog.large_object(oid) {
                    Some(_) => Ok(oid),
                    None => Err(AclError::UndefinedObject(format!(
                        "large object {oid} does not exist"
                    ))),
                }
            }
            other => Err(unrecognized_objtype(other)),
        })
        .collect()
}

fn single_name(name: &ObjectName) -> Result<&str, AclError> {
    match name.parts.as_slice() {
        [only] => Ok(only.as_str()),
        _ => Err(AclError::Syntax(format!(
            "improper qualified name (too many dotted names): {}",
            name.display()
        ))),
    }
}

fn routine_kind_matches(objtype: ObjectType, kind: FunctionKind) -> bool {
    match objtype {
        ObjectType::Procedure => kind == FunctionKind::Procedure,
        ObjectType::Function => kind != FunctionKind::Procedure,
        _ => true,
    }
}

fn lookup_routine(
    catalog: &Catalog,
    path: &[Oid],
    objtype: ObjectType,
    name: &ObjectName,
) -> Result<Oid, AclError> {
    let noun = objtype.noun();
    let candidates = catalog.lookup_functions(&name.parts, path)?;
    let Some(args) = &name.args else {
        let matching: Vec<Oid> = candidates
            .iter()
            .filter(|func| routine_kind_matches(objtype, func.kind))
            .map(|func| func.oid)
            .collect();
        return match matching.as_slice() {
            [] => Err(AclError::UndefinedFunction(format!(
                "could not find a {noun} named \"{}\"",
                name.display()
            ))),
            [only] => Ok(*only),
            _ => Err(AclError::AmbiguousFunction(format!(
                "{noun} name \"{}\" is not unique",
                name.display()
            ))),
        };
    };

    let arg_types = args
        .iter()
        .map(|arg| catalog.resolve_type(&parse_qualified_name(arg), path))
        .collect::<Result<Vec<_>, _>>()?;
    let func = candidates
        .into_iter()
        .find(|func| func.arg_types == arg_types)
        .ok_or_else(|| {
            AclError::UndefinedFunction(format!(
                "{noun} {}({}) does not exist",
                name.display(),
                args.join(", ")
            ))
        })?;
    if !routine_kind_matches(objtype, func.kind) {
        return Err(AclError::wrong_object_type(format!(
            "{} is not a {noun}",
            catalog.function_signature(func)
        )));
    }
    Ok(func.oid)
}

fn objects_in_schema_to_oids(
    catalog: &Catalog,
    session: &SessionContext,
    objtype: ObjectType,
    schemas: &[String],
) -> Result<Vec<Oid>, AclError> {
    let mut objects = Vec::new();
    for schema in schemas {
        let namespace = catalog.resolve_namespace(schema)?;
        let result = PrivilegeEvaluator::new(catalog, session).object_aclcheck(
            ObjectClass::Namespace,
            namespace,
            session.current_user,
            AclMode::Usage.into(),
        )?;
        aclcheck_error(result, ObjectType::Schema, schema)?;

        match objtype {
            ObjectType::Table => objects.extend(
                catalog
                    .relations_in_namespace(namespace)
                    .filter(|rel| {
                        matches!(
                            rel.kind,
                            RelKind::Table
                                | RelKind::View
                                | RelKind::MaterializedView
                                | RelKind::ForeignTable
                        )
                    })
                    .map(|rel| rel.oid),
            ),
            ObjectType::Sequence => objects.extend(
                catalog
                    .relations_in_namespace(namespace)
                    .filter(|rel| rel.kind == RelKind::Sequence)
                    .map(|rel| rel.oid),
            ),
            ObjectType::Function | ObjectType::Procedure | ObjectType::Routine => objects.extend(
                catalog
                    .functions_in_namespace(namespace)
                    .filter(|func| routine_kind_matches(objtype, func.kind))
                    .map(|func| func.oid),
            ),
            other => return Err(unrecognized_objtype(other)),
        }
    }
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::oid::{BOOTSTRAP_SUPERUSERID, C_LANGUAGE, PG_PUBLIC_NAMESPACE, SQL_LANGUAGE};
    use crate::security::acl::{AclItem, AclRights};
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
            .insert_relation(PG_PUBLIC_NAMESPACE, "t", RelKind::Table, alice, &["a", "b"])
            .expect("table");
        Fixture {
            catalog,
            alice,
            bob,
            table,
        }
    }

    fn privs(names: &[&str]) -> Option<Vec<AccessPriv>> {
        Some(names.iter().map(|name| AccessPriv::new(name)).collect())
    }

    fn run(catalog: &mut Catalog, user: Oid, stmt: &GrantStmt) -> Result<CommandResult, AclError> {
        let session = SessionContext::new(user);
        exec_grant_stmt(catalog, &session, stmt, None)
    }

    fn table_acl(fx: &Fixture) -> Acl {
        fx.catalog
            .relation(fx.table)
            .and_then(|rel| rel.acl.clone())
            .expect("table acl")
    }

    #[test]
    fn owner_grant_materializes_default() {
        let mut fx = fixture();
        let stmt = GrantStmt::grant(
            ObjectType::Table,
            GrantTargets::names(&["t"]),
            privs(&["select"]),
            vec![RoleSpec::name("bob")],
        );
        let result = run(&mut fx.catalog, fx.alice, &stmt).expect("grant");
        assert_eq!(result.command_tag, "GRANT");
        assert!(result.notices.is_empty());

        let acl = table_acl(&fx);
        assert_eq!(acl.len(), 2);
        assert!(acl.items().contains(&AclItem::new(
            fx.bob,
            fx.alice,
            AclRights::privileges(AclMode::Select.into())
        )));
        assert!(fx.catalog.shdepend().has_dependents(fx.bob));
    }

    #[test]
    fn invalid_privilege_names_kind() {
        let mut fx = fixture();
        let stmt = GrantStmt::grant(
            ObjectType::Schema,
            GrantTargets::names(&["public"]),
            privs(&["select"]),
            vec![RoleSpec::name("bob")],
        );
        let err = run(&mut fx.catalog, BOOTSTRAP_SUPERUSERID, &stmt).expect_err("bad privilege");
        assert_eq!(err.to_string(), "invalid privilege type SELECT for schema");

        let stmt = GrantStmt::grant(
            ObjectType::Table,
            GrantTargets::names(&["t"]),
            privs(&["execute"]),
            vec![RoleSpec::name("bob")],
        );
        let err = run(&mut fx.catalog, fx.alice, &stmt).expect_err("bad privilege");
        assert_eq!(err.to_string(), "invalid privilege type EXECUTE for relation");
    }

    #[test]
    fn usage_on_plain_table_is_rejected() {
        let mut fx = fixture();
        let stmt = GrantStmt::grant(
            ObjectType::Table,
            GrantTargets::names(&["t"]),
            privs(&["usage"]),
            vec![RoleSpec::name("bob")],
        );
        let err = run(&mut fx.catalog, fx.alice, &stmt).expect_err("usage on table");
        assert_eq!(err.to_string(), "invalid privilege type USAGE for table");
        assert_eq!(fx.catalog.relation(fx.table).and_then(|r| r.acl.clone()), None);
    }

    #[test]
    fn sequence_under_table_syntax_narrows_with_warning() {
        let mut fx = fixture();
        fx.catalog
            .insert_relation(PG_PUBLIC_NAMESPACE, "s", RelKind::Sequence, fx.alice, &[])
            .expect("sequence");
        let stmt = GrantStmt::grant(
            ObjectType::Table,
            GrantTargets::names(&["s"]),
            privs(&["select", "insert"]),
            vec![RoleSpec::name("bob")],
        );
        let result = run(&mut fx.catalog, fx.alice, &stmt).expect("grant");
        assert_eq!(
            result.notices.messages().collect::<Vec<_>>(),
            vec!["sequence \"s\" only supports USAGE, SELECT, and UPDATE privileges"]
        );

        let stmt = GrantStmt::grant(
            ObjectType::Sequence,
            GrantTargets::names(&["t"]),
            privs(&["select"]),
            vec![RoleSpec::name("bob")],
        );
        let err = run(&mut fx.catalog, fx.alice, &stmt).expect_err("not a sequence");
        assert_eq!(err.to_string(), "\"t\" is not a sequence");
    }

    #[test]
    fn column_grants_and_checks() {
        let mut fx = fixture();
        let stmt = GrantStmt::grant(
            ObjectType::Table,
            GrantTargets::names(&["t"]),
            Some(vec![AccessPriv::on_columns(Some("update"), &["a"])]),
            vec![RoleSpec::name("bob")],
        );
        run(&mut fx.catalog, fx.alice, &stmt).expect("column grant");
        let rel = fx.catalog.relation(fx.table).expect("table");
        assert!(rel.acl.is_none(), "table ACL untouched");
        assert!(rel.column(1).and_then(|c| c.acl.as_ref()).is_some());
        assert!(rel.column(2).and_then(|c| c.acl.as_ref()).is_none());

        let stmt = GrantStmt::grant(
            ObjectType::Table,
            GrantTargets::names(&["t"]),
            Some(vec![AccessPriv::on_columns(Some("delete"), &["a"])]),
            vec![RoleSpec::name("bob")],
        );
        let err = run(&mut fx.catalog, fx.alice, &stmt).expect_err("delete on column");
        assert_eq!(err.to_string(), "invalid privilege type DELETE for column");

        let stmt = GrantStmt::grant(
            ObjectType::Table,
            GrantTargets::names(&["t"]),
            Some(vec![AccessPriv::on_columns(Some("select"), &["nope"])]),
            vec![RoleSpec::name("bob")],
        );
        let err = run(&mut fx.catalog, fx.alice, &stmt).expect_err("unknown column");
        assert_eq!(err.to_string(), "column \"nope\" of relation \"t\" does not exist");

        let stmt = GrantStmt::grant(
            ObjectType::Schema,
            GrantTargets::names(&["public"]),
            Some(vec![AccessPriv::on_columns(Some("usage"), &["a"])]),
            vec![RoleSpec::name("bob")],
        );
        let err = run(&mut fx.catalog, BOOTSTRAP_SUPERUSERID, &stmt).expect_err("columns on schema");
        assert_eq!(err.to_string(), "column privileges are only valid for relations");
    }

    #[test]
    fn untrusted_language_is_refused() {
        let mut fx = fixture();
        let stmt = GrantStmt::grant(
            ObjectType::Language,
            GrantTargets::Oids(vec![C_LANGUAGE]),
            privs(&["usage"]),
            vec![RoleSpec::Public],
        );
        let err = run(&mut fx.catalog, BOOTSTRAP_SUPERUSERID, &stmt).expect_err("untrusted");
        assert_eq!(err.to_string(), "language \"c\" is not trusted");
        assert!(err.detail().is_some());

        let stmt = GrantStmt::revoke(
            ObjectType::Language,
            GrantTargets::Oids(vec![SQL_LANGUAGE]),
            privs(&["usage"]),
            vec![RoleSpec::Public],
        );
        run(&mut fx.catalog, BOOTSTRAP_SUPERUSERID, &stmt).expect("trusted language");
    }

    #[test]
    fn grantor_must_be_current_user() {
        let mut fx = fixture();
        let stmt = GrantStmt::grant(
            ObjectType::Table,
            GrantTargets::names(&["t"]),
            privs(&["select"]),
            vec![RoleSpec::name("bob")],
        )
        .granted_by(RoleSpec::name("bob"));
        let err = run(&mut fx.catalog, fx.alice, &stmt).expect_err("other grantor");
        assert_eq!(err.to_string(), "grantor must be current user");
    }

    #[test]
    fn event_hook_sees_filled_privileges() {
        let mut fx = fixture();
        let stmt = GrantStmt::grant(
            ObjectType::Table,
            GrantTargets::names(&["t"]),
            None,
            vec![RoleSpec::name("bob")],
        );
        let session = SessionContext::new(fx.alice);
        let mut seen = Vec::new();
        let mut hook = |istmt: &InternalGrant| seen.push(istmt.clone());
        exec_grant_stmt(&mut fx.catalog, &session, &stmt, Some(&mut hook)).expect("grant all");
        assert_eq!(seen.len(), 1);
        assert!(seen[0].all_privs);
        assert_eq!(seen[0].privileges, ACL_ALL_RIGHTS_RELATION);
        assert_eq!(seen[0].objects, vec![fx.table]);
    }

    #[test]
    fn event_hook_sees_only_what_was_granted() {
        let mut fx = fixture();
        let carol = fx
            .catalog
            .create_role("carol", CreateRoleOptions::default())
            .expect("carol");
        let stmt = GrantStmt::grant(
            ObjectType::Table,
            GrantTargets::names(&["t"]),
            privs(&["select"]),
            vec![RoleSpec::name("bob")],
        )
        .with_grant_option();
        run(&mut fx.catalog, fx.alice, &stmt).expect("grant option");

        let stmt = GrantStmt::grant(
            ObjectType::Table,
            GrantTargets::names(&["t"]),
            None,
            vec![RoleSpec::name("carol")],
        );
        let session = SessionContext::new(fx.bob);
        let mut seen = Vec::new();
        let mut hook = |istmt: &InternalGrant| seen.push(istmt.clone());
        let result = exec_grant_stmt(&mut fx.catalog, &session, &stmt, Some(&mut hook))
            .expect("partial grant");
        assert_eq!(result.notices.len(), 1);
        assert_eq!(seen.len(), 1);
        assert!(seen[0].all_privs);
        assert_eq!(seen[0].privileges, AclModes::from(AclMode::Select));
        assert_eq!(seen[0].grantees, vec![carol]);
    }

    #[test]
    fn ambiguous_function_name() {
        let mut fx = fixture();
        for args in [vec![], vec![crate::catalog::oid::INT4_TYPE]] {
            fx.catalog
                .insert_function(
                    PG_PUBLIC_NAMESPACE,
                    "f",
                    FunctionKind::Function,
                    args,
                    SQL_LANGUAGE,
                    fx.alice,
                )
                .expect("function");
        }
        let stmt = GrantStmt::grant(
            ObjectType::Function,
            GrantTargets::names(&["f"]),
            privs(&["execute"]),
            vec![RoleSpec::name("bob")],
        );
        let err = run(&mut fx.catalog, fx.alice, &stmt).expect_err("ambiguous");
        assert_eq!(err.to_string(), "function name \"f\" is not unique");

        let stmt = GrantStmt::grant(
            ObjectType::Procedure,
            GrantTargets::Names(vec![ObjectName::with_args("f", &["int4"])]),
            privs(&["execute"]),
            vec![RoleSpec::name("bob")],
        );
        let err = run(&mut fx.catalog, fx.alice, &stmt).expect_err("not a procedure");
        assert_eq!(err.to_string(), "f(int4) is not a procedure");
    }

    #[test]
    fn all_tables_in_schema_needs_usage() {
        let mut fx = fixture();
        let schema = fx
            .catalog
            .insert_namespace("private", fx.alice)
            .expect("schema");
        fx.catalog
            .insert_relation(schema, "p", RelKind::Table, fx.bob, &[])
            .expect("table");
        let stmt = GrantStmt::grant(
            ObjectType::Table,
            GrantTargets::AllInSchema(vec!["private".to_string()]),
            privs(&["select"]),
            vec![RoleSpec::Public],
        );
        let err = run(&mut fx.catalog, fx.bob, &stmt).expect_err("no usage");
        assert_eq!(err.to_string(), "permission denied for schema private");

        let result = run(&mut fx.catalog, fx.alice, &stmt);
        // alice may use her schema but does not own bob's table.
        assert_eq!(
            result.expect_err("not owner").to_string(),
            "permission denied for table p"
        );
    }
}
