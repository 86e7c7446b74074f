//! Effective-privilege evaluation and the permission-error vocabulary.

use crate::catalog::oid::{
    Oid, PG_CATALOG_NAMESPACE, ROLE_PG_READ_ALL_DATA, ROLE_PG_WRITE_ALL_DATA,
};
use crate::catalog::{
    missing_attribute, missing_object, Catalog, ObjectAddress, ObjectClass, ObjectType, RelKind,
    Relation,
};
use crate::error::AclError;

use super::acl::{
    acldefault, AclMaskHow, AclMode, AclModes, AclRights, RoleMembership, ACL_ALL_RIGHTS_SCHEMA,
};
use super::roles::RoleRegistry;
use super::SessionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclResult {
    Ok,
    NoPriv,
    NotOwner,
}

/// Answers "what may this role do to that object" against one catalog
/// state and one session.
pub struct PrivilegeEvaluator<'a> {
    catalog: &'a Catalog,
    session: &'a SessionContext,
}

/// Object type whose hard-wired default applies to a class's rows.
pub fn default_object_type(class: ObjectClass) -> ObjectType {
    match class {
        ObjectClass::Relation => ObjectType::Table,
        ObjectClass::Database => ObjectType::Database,
        ObjectClass::ForeignDataWrapper => ObjectType::ForeignDataWrapper,
        ObjectClass::ForeignServer => ObjectType::ForeignServer,
        ObjectClass::Function => ObjectType::Function,
        ObjectClass::Language => ObjectType::Language,
        ObjectClass::LargeObject => ObjectType::LargeObject,
        ObjectClass::Namespace => ObjectType::Schema,
        ObjectClass::Tablespace => ObjectType::Tablespace,
        ObjectClass::Type | ObjectClass::DefaultAcl => ObjectType::Type,
    }
}

fn is_system_class(rel: &Relation) -> bool {
    rel.namespace == PG_CATALOG_NAMESPACE && rel.kind != RelKind::View
}

impl<'a> PrivilegeEvaluator<'a> {
    pub fn new(catalog: &'a Catalog, session: &'a SessionContext) -> Self {
        Self { catalog, session }
    }

    fn roles(&self) -> &RoleRegistry {
        self.catalog.roles()
    }

    /// Privileges out of `mask` that `roleid` holds on the object, or on
    /// one of its columns when `attnum` is given. Column results cover the
    /// column's own ACL only.
    pub fn effective_privileges(
        &self,
        objtype: ObjectType,
        object_id: Oid,
        attnum: Option<i16>,
        roleid: Oid,
        mask: AclRights,
        how: AclMaskHow,
    ) -> Result<AclRights, AclError> {
        match (objtype, attnum) {
            (_, Some(attnum)) => self.column_aclmask(object_id, attnum, roleid, mask, how),
            (ObjectType::Column, None) => Err(AclError::Internal(
                "column privilege check without an attribute number".to_string(),
            )),
            (objtype, None) => self.object_aclmask(objtype.class(), object_id, roleid, mask, how),
        }
    }

    pub fn object_aclmask(
        &self,
        class: ObjectClass,
        object_id: Oid,
        roleid: Oid,
        mask: AclRights,
        how: AclMaskHow,
    ) -> Result<AclRights, AclError> {
        match class {
            ObjectClass::Relation => self.class_aclmask(object_id, roleid, mask, how),
            ObjectClass::Namespace => self.namespace_aclmask(object_id, roleid, mask, how),
            ObjectClass::Type => self.type_aclmask(object_id, roleid, mask, how),
            ObjectClass::DefaultAcl => Err(AclError::Internal(format!(
                "unrecognized privilege target class {class:?}"
            ))),
            _ => {
                let owner = self.catalog.get_owner(class, object_id)?;
                if self.roles().is_superuser(roleid) {
                    return Ok(mask);
                }
                let acl = self
                    .catalog
                    .get_acl(ObjectAddress::new(class, object_id))?
                    .unwrap_or_else(|| acldefault(default_object_type(class), owner));
                Ok(acl.mask(roleid, owner, mask, how, self.roles()))
            }
        }
    }

    fn class_aclmask(
        &self,
        relid: Oid,
        roleid: Oid,
        mask: AclRights,
        how: AclMaskHow,
    ) -> Result<AclRights, AclError> {
        let rel = self
            .catalog
            .relation(relid)
            .ok_or_else(|| missing_object(ObjectClass::Relation, relid))?;
        let superuser = self.roles().is_superuser(roleid);

        // Nobody but a superuser modifies system catalogs directly.
        let mut mask = mask;
        let protected = AclMode::Insert
            | AclMode::Update
            | AclMode::Delete
            | AclMode::Truncate
            | AclMode::Usage;
        if is_system_class(rel) && !superuser {
            mask.privs &= !protected;
        }
        if superuser {
            return Ok(mask);
        }

        let default_type = if rel.kind == RelKind::Sequence {
            ObjectType::Sequence
        } else {
            ObjectType::Table
        };
        let acl = rel
            .acl
            .clone()
            .unwrap_or_else(|| acldefault(default_type, rel.owner));
        let mut result = acl.mask(roleid, rel.owner, mask, how, self.roles());

        if mask.privs.contains(AclMode::Select)
            && !result.privs.contains(AclMode::Select)
            && self.roles().has_privs_of_role(roleid, ROLE_PG_READ_ALL_DATA)
        {
            result.privs |= AclMode::Select;
        }
        let writes = AclMode::Insert | AclMode::Update | AclMode::Delete;
        if mask.privs.intersects(writes)
            && !result.privs.intersects(writes)
            && self.roles().has_privs_of_role(roleid, ROLE_PG_WRITE_ALL_DATA)
        {
            result.privs |= mask.privs & writes;
        }
        Ok(result)
    }

    fn column_aclmask(
        &self,
        relid: Oid,
        attnum: i16,
        roleid: Oid,
        mask: AclRights,
        how: AclMaskHow,
    ) -> Result<AclRights, AclError> {
        let rel = self
            .catalog
            .relation(relid)
            .ok_or_else(|| missing_object(ObjectClass::Relation, relid))?;
        let col = rel
            .column(attnum)
            .filter(|col| !col.dropped)
            .ok_or_else(|| missing_attribute(relid, attnum))?;
        let superuser = self.roles().is_superuser(roleid);

        let mut mask = mask;
        if is_system_class(rel) && !superuser {
            mask.privs &= !(AclMode::Insert | AclMode::Update);
        }
        if superuser {
            return Ok(mask);
        }
        // Columns default to an empty ACL.
        let Some(acl) = &col.acl else {
            return Ok(AclRights::NONE);
        };
        Ok(acl.mask(roleid, rel.owner, mask, how, self.roles()))
    }

    fn namespace_aclmask(
        &self,
        nspid: Oid,
        roleid: Oid,
        mask: AclRights,
        how: AclMaskHow,
    ) -> Result<AclRights, AclError> {
        let ns = self
            .catalog
            .namespace(nspid)
            .ok_or_else(|| missing_object(ObjectClass::Namespace, nspid))?;
        if self.roles().is_superuser(roleid) {
            return Ok(mask);
        }

        // The session's temp schema has no ACL of its own: whoever may create
        // temp tables here gets USAGE and CREATE, everyone else just USAGE.
        if self.session.is_temp_namespace(nspid) {
            let temp_ok = self.object_aclcheck(
                ObjectClass::Database,
                self.session.database,
                roleid,
                AclMode::CreateTemp.into(),
            )? == AclResult::Ok;
            let allowed = if temp_ok {
                ACL_ALL_RIGHTS_SCHEMA
            } else {
                AclMode::Usage.into()
            };
            return Ok(mask & AclRights::privileges(allowed));
        }

        let acl = ns
            .acl
            .clone()
            .unwrap_or_else(|| acldefault(ObjectType::Schema, ns.owner));
        let mut result = acl.mask(roleid, ns.owner, mask, how, self.roles());

        if mask.privs.contains(AclMode::Usage)
            && !result.privs.contains(AclMode::Usage)
            && (self.roles().has_privs_of_role(roleid, ROLE_PG_READ_ALL_DATA)
                || self.roles().has_privs_of_role(roleid, ROLE_PG_WRITE_ALL_DATA))
        {
            result.privs |= AclMode::Usage;
        }
        Ok(result)
    }

    fn type_aclmask(
        &self,
        typid: Oid,
        roleid: Oid,
        mask: AclRights,
        how: AclMaskHow,
    ) -> Result<AclRights, AclError> {
        let mut typ = self
            .catalog
            .type_entry(typid)
            .ok_or_else(|| missing_object(ObjectClass::Type, typid))?;
        if self.roles().is_superuser(roleid) {
            return Ok(mask);
        }
        // True arrays have no privileges of their own.
        if let Some(elem) = typ.array_of {
            typ = self.catalog.type_entry(elem).ok_or_else(|| {
                AclError::Internal(format!("cache lookup failed for type {elem}"))
            })?;
        }
        let acl = typ
            .acl
            .clone()
            .unwrap_or_else(|| acldefault(ObjectType::Type, typ.owner));
        Ok(acl.mask(roleid, typ.owner, mask, how, self.roles()))
    }

    pub fn object_aclcheck(
        &self,
        class: ObjectClass,
        object_id: Oid,
        roleid: Oid,
        mode: AclModes,
    ) -> Result<AclResult, AclError> {
        let held = self.object_aclmask(
            class,
            object_id,
            roleid,
            AclRights::privileges(mode),
            AclMaskHow::Any,
        )?;
        Ok(if held.is_empty() {
            AclResult::NoPriv
        } else {
            AclResult::Ok
        })
    }

    pub fn column_aclcheck(
        &self,
        relid: Oid,
        attnum: i16,
        roleid: Oid,
        mode: AclModes,
    ) -> Result<AclResult, AclError> {
        let held = self.column_aclmask(
            relid,
            attnum,
            roleid,
            AclRights::privileges(mode),
            AclMaskHow::Any,
        )?;
        Ok(if held.is_empty() {
            AclResult::NoPriv
        } else {
            AclResult::Ok
        })
    }

    /// Checks `mode` on the live user columns of a relation: with `Any`
    /// one column suffices, with `All` every column must qualify.
    pub fn attribute_aclcheck_all(
        &self,
        relid: Oid,
        roleid: Oid,
        mode: AclModes,
        how: AclMaskHow,
    ) -> Result<AclResult, AclError> {
        let rel = self
            .catalog
            .relation(relid)
            .ok_or_else(|| missing_object(ObjectClass::Relation, relid))?;
        let mut result = AclResult::NoPriv;
        for col in rel.user_columns().filter(|col| !col.dropped) {
            match self.column_aclcheck(relid, col.attnum, roleid, mode)? {
                AclResult::Ok => {
                    result = AclResult::Ok;
                    if how == AclMaskHow::Any {
                        break;
                    }
                }
                _ => {
                    result = AclResult::NoPriv;
                    if how == AclMaskHow::All {
                        break;
                    }
                }
            }
        }
        Ok(result)
    }

    /// Does `roleid` own the object, directly or through role membership?
    pub fn object_ownercheck(
        &self,
        class: ObjectClass,
        object_id: Oid,
        roleid: Oid,
    ) -> Result<bool, AclError> {
        let owner = self.catalog.get_owner(class, object_id)?;
        Ok(self.roles().has_privs_of_role(roleid, owner))
    }

    pub fn largeobject_aclcheck(
        &self,
        lobj: Oid,
        roleid: Oid,
        mode: AclModes,
    ) -> Result<AclResult, AclError> {
        if self.session.settings.lo_compat_privileges {
            return Ok(AclResult::Ok);
        }
        self.object_aclcheck(ObjectClass::LargeObject, lobj, roleid, mode)
    }
}

/// Turns a failed check into the matching permission error.
pub fn aclcheck_error(result: AclResult, objtype: ObjectType, name: &str) -> Result<(), AclError> {
    match result {
        AclResult::Ok => Ok(()),
        AclResult::NoPriv => Err(AclError::InsufficientPrivilege(format!(
            "permission denied for {} {name}",
            objtype.noun()
        ))),
        AclResult::NotOwner => Err(AclError::InsufficientPrivilege(format!(
            "must be owner of {} {name}",
            objtype.noun()
        ))),
    }
}

pub fn aclcheck_error_col(
    result: AclResult,
    objtype: ObjectType,
    relname: &str,
    colname: &str,
) -> Result<(), AclError> {
    match result {
        AclResult::NoPriv => Err(AclError::InsufficientPrivilege(format!(
            "permission denied for column \"{colname}\" of relation \"{relname}\""
        ))),
        // Columns have no owners of their own.
        other => aclcheck_error(other, objtype, relname),
    }
}
