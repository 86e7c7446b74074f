//! `pg_default_acl` maintenance and lookup.

use crate::catalog::oid::Oid;
use crate::catalog::{
    Catalog, DefaultAclKey, DefaultAclObjectType, ObjectAddress, ObjectClass, ObjectType,
};
use crate::error::AclError;

use super::acl::{acldefault, merge_acl_with_grant, whole_mask, Acl, AclModes, DropBehavior};

/// One ALTER DEFAULT PRIVILEGES action for a single (role, schema) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultAclRequest {
    pub role: Oid,
    /// `None` targets the database-wide entry.
    pub namespace: Option<Oid>,
    pub objtype: DefaultAclObjectType,
    pub is_grant: bool,
    pub grant_option: bool,
    pub behavior: DropBehavior,
    pub grantees: Vec<Oid>,
    pub privileges: AclModes,
    pub all_privs: bool,
}

/// The ACL a default-ACL row is compared against: the hard-wired default
/// for a database-wide entry, nothing for a per-schema one.
fn baseline(key: &DefaultAclKey) -> Acl {
    match key.namespace {
        None => acldefault(key.objtype.object_type(), key.role),
        Some(_) => Acl::new(),
    }
}

/// Applies one change to the role's default ACL. A result equal to the
/// baseline removes the row instead of storing it.
pub fn set_default_acl(catalog: &mut Catalog, request: &DefaultAclRequest) -> Result<(), AclError> {
    let key = DefaultAclKey {
        role: request.role,
        namespace: request.namespace,
        objtype: request.objtype,
    };
    let privileges = if request.all_privs {
        whole_mask(request.objtype.object_type())
    } else {
        request.privileges
    };

    let def_acl = baseline(&key);
    let (old_acl, old_members) = match catalog.default_acl(&key) {
        Some(entry) => (entry.acl.clone(), entry.acl.members()),
        None => (def_acl.clone(), Vec::new()),
    };

    let new_acl = merge_acl_with_grant(
        old_acl,
        request.is_grant,
        request.grant_option,
        request.behavior,
        &request.grantees,
        privileges,
        request.role,
        request.role,
        catalog.roles(),
    )?;

    if new_acl == def_acl {
        if catalog.remove_default_acl(&key).is_some() {
            tracing::debug!(role = key.role, objtype = ?key.objtype, "default ACL reset");
        }
        return Ok(());
    }

    let new_members = new_acl.members();
    let (oid, is_new) = catalog.upsert_default_acl(key, new_acl);
    let addr = ObjectAddress::new(ObjectClass::DefaultAcl, oid);
    if is_new {
        catalog.shdepend_mut().record_owner(addr, request.role);
    }
    catalog
        .shdepend_mut()
        .update_acl_dependencies(addr, request.role, &old_members, &new_members);
    tracing::debug!(role = key.role, objtype = ?key.objtype, oid, "default ACL stored");
    Ok(())
}

/// The ACL a new object of `objtype` owned by `owner` in `namespace` should
/// start with, or `None` when the hard-wired default applies.
pub fn get_user_default_acl(
    catalog: &Catalog,
    objtype: ObjectType,
    owner: Oid,
    namespace: Option<Oid>,
) -> Result<Option<Acl>, AclError> {
    let Some(defobjtype) = DefaultAclObjectType::from_object_type(objtype) else {
        return Ok(None);
    };
    let lookup = |namespace: Option<Oid>| {
        catalog
            .default_acl(&DefaultAclKey {
                role: owner,
                namespace,
                objtype: defobjtype,
            })
            .map(|entry| entry.acl.clone())
    };
    let global = lookup(None);
    let schema = namespace.and_then(|ns| lookup(Some(ns)));
    if global.is_none() && schema.is_none() {
        return Ok(None);
    }

    let def_acl = acldefault(objtype, owner);
    let global = global.unwrap_or_else(|| def_acl.clone());
    let merged = Acl::merge(Some(&global), schema.as_ref(), owner, catalog.roles())?
        .unwrap_or_default();
    if merged == def_acl {
        return Ok(None);
    }
    Ok(Some(merged))
}

/// Registers the roles an ACL given to a freshly created object refers to.
pub fn record_dependency_on_new_acl(
    catalog: &mut Catalog,
    object: ObjectAddress,
    owner: Oid,
    acl: Option<&Acl>,
) {
    if let Some(acl) = acl {
        catalog
            .shdepend_mut()
            .update_acl_dependencies(object, owner, &[], &acl.members());
    }
}

/// Drops every default-ACL row belonging to `role`.
pub fn remove_role_default_acls(catalog: &mut Catalog, role: Oid) -> usize {
    let keys: Vec<DefaultAclKey> = catalog
        .default_acls()
        .filter(|(key, _)| key.role == role)
        .map(|(key, _)| *key)
        .collect();
    for key in &keys {
        catalog.remove_default_acl(key);
    }
    keys.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::oid::{ACL_ID_PUBLIC, PG_PUBLIC_NAMESPACE};
    use crate::security::acl::{AclItem, AclMode, AclRights};
    use crate::security::roles::CreateRoleOptions;

    fn setup() -> (Catalog, Oid, Oid) {
        let mut catalog = Catalog::new_bootstrap();
        let alice = catalog
            .create_role("alice", CreateRoleOptions::default())
            .expect("alice");
        let bob = catalog
            .create_role("bob", CreateRoleOptions::default())
            .expect("bob");
        (catalog, alice, bob)
    }

    fn request(role: Oid, namespace: Option<Oid>, is_grant: bool, grantees: Vec<Oid>) -> DefaultAclRequest {
        DefaultAclRequest {
            role,
            namespace,
            objtype: DefaultAclObjectType::Relation,
            is_grant,
            grant_option: false,
            behavior: DropBehavior::Restrict,
            grantees,
            privileges: AclMode::Select.into(),
            all_privs: false,
        }
    }

    #[test]
    fn repeated_grant_keeps_one_row() {
        let (mut catalog, alice, bob) = setup();
        let req = request(alice, None, true, vec![bob]);
        set_default_acl(&mut catalog, &req).expect("first");
        set_default_acl(&mut catalog, &req).expect("second");
        assert_eq!(catalog.default_acls().count(), 1);
        assert!(catalog.shdepend().has_dependents(bob));
    }

    #[test]
    fn reverting_to_default_removes_row() {
        let (mut catalog, alice, bob) = setup();
        set_default_acl(&mut catalog, &request(alice, None, true, vec![bob])).expect("grant");
        set_default_acl(&mut catalog, &request(alice, None, false, vec![bob])).expect("revoke");
        assert_eq!(catalog.default_acls().count(), 0);
        assert!(!catalog.shdepend().has_dependents(bob));
        assert!(!catalog.shdepend().has_dependents(alice));
    }

    #[test]
    fn revoke_from_public_on_functions_is_stored() {
        let (mut catalog, alice, _) = setup();
        let mut req = request(alice, None, false, vec![ACL_ID_PUBLIC]);
        req.objtype = DefaultAclObjectType::Function;
        req.privileges = AclMode::Execute.into();
        set_default_acl(&mut catalog, &req).expect("revoke");
        let acl = get_user_default_acl(&catalog, ObjectType::Function, alice, None)
            .expect("lookup")
            .expect("differs from default");
        assert_eq!(acl.len(), 1);
        assert_eq!(acl.items()[0].grantee, alice);

        req.is_grant = true;
        set_default_acl(&mut catalog, &req).expect("grant back");
        assert_eq!(catalog.default_acls().count(), 0);
    }

    #[test]
    fn schema_entry_adds_to_default() {
        let (mut catalog, alice, bob) = setup();
        assert_eq!(
            get_user_default_acl(&catalog, ObjectType::Table, alice, Some(PG_PUBLIC_NAMESPACE))
                .expect("lookup"),
            None
        );
        set_default_acl(
            &mut catalog,
            &request(alice, Some(PG_PUBLIC_NAMESPACE), true, vec![bob]),
        )
        .expect("schema grant");
        let acl = get_user_default_acl(&catalog, ObjectType::Table, alice, Some(PG_PUBLIC_NAMESPACE))
            .expect("lookup")
            .expect("schema override");
        let expected: Acl = acldefault(ObjectType::Table, alice)
            .items()
            .iter()
            .copied()
            .chain([AclItem::new(
                bob,
                alice,
                AclRights::privileges(AclMode::Select.into()),
            )])
            .collect();
        assert_eq!(acl, expected);
        // Other schemas are unaffected.
        assert_eq!(
            get_user_default_acl(&catalog, ObjectType::Table, alice, None).expect("lookup"),
            None
        );
    }

    #[test]
    fn drop_role_cleanup_removes_rows() {
        let (mut catalog, alice, bob) = setup();
        set_default_acl(&mut catalog, &request(alice, None, true, vec![bob])).expect("grant");
        assert_eq!(remove_role_default_acls(&mut catalog, alice), 1);
        assert_eq!(catalog.default_acls().count(), 0);
        assert!(!catalog.shdepend().has_dependents(bob));
    }
}
