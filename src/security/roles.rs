use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::catalog::oid::{
    Oid, BOOTSTRAP_SUPERUSERID, ROLE_PG_READ_ALL_DATA, ROLE_PG_WRITE_ALL_DATA,
};
use crate::error::AclError;

use super::acl::{Acl, AclMaskHow, AclModes, AclRights, RoleMembership, RoleNames};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleEntry {
    pub oid: Oid,
    pub name: String,
    pub superuser: bool,
    pub inherit: bool,
    pub login: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleOptions {
    pub superuser: bool,
    pub inherit: bool,
    pub login: bool,
}

impl Default for CreateRoleOptions {
    fn default() -> Self {
        Self {
            superuser: false,
            inherit: true,
            login: true,
        }
    }
}

/// Picks the role a GRANT or REVOKE is performed as.
pub trait GrantorResolver {
    /// Returns the grantor and the grant options it holds out of
    /// `privileges`.
    fn select_best_grantor(
        &self,
        roleid: Oid,
        privileges: AclModes,
        acl: &Acl,
        owner: Oid,
    ) -> (Oid, AclModes);
}

#[derive(Debug, Clone)]
pub struct RoleRegistry {
    roles: BTreeMap<Oid, RoleEntry>,
    by_name: HashMap<String, Oid>,
    /// member -> roles granted to it
    granted_roles: HashMap<Oid, HashSet<Oid>>,
}

impl Default for RoleRegistry {
    fn default() -> Self {
        Self::bootstrap()
    }
}

impl RoleRegistry {
    pub fn bootstrap() -> Self {
        let mut registry = Self {
            roles: BTreeMap::new(),
            by_name: HashMap::new(),
            granted_roles: HashMap::new(),
        };
        registry.insert(RoleEntry {
            oid: BOOTSTRAP_SUPERUSERID,
            name: "postgres".to_string(),
            superuser: true,
            inherit: true,
            login: true,
        });
        for (oid, name) in [
            (ROLE_PG_READ_ALL_DATA, "pg_read_all_data"),
            (ROLE_PG_WRITE_ALL_DATA, "pg_write_all_data"),
        ] {
            registry.insert(RoleEntry {
                oid,
                name: name.to_string(),
                superuser: false,
                inherit: true,
                login: false,
            });
        }
        registry
    }

    fn insert(&mut self, entry: RoleEntry) {
        self.by_name.insert(entry.name.clone(), entry.oid);
        self.roles.insert(entry.oid, entry);
    }

    pub fn role(&self, oid: Oid) -> Option<&RoleEntry> {
        self.roles.get(&oid)
    }

    pub fn roles(&self) -> impl Iterator<Item = &RoleEntry> {
        self.roles.values()
    }

    pub fn role_exists(&self, oid: Oid) -> bool {
        self.roles.contains_key(&oid)
    }

    pub fn lookup(&self, name: &str) -> Result<Oid, AclError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| AclError::UndefinedObject(format!("role \"{name}\" does not exist")))
    }

    pub fn display_name(&self, oid: Oid) -> String {
        match self.roles.get(&oid) {
            Some(entry) => entry.name.clone(),
            None => oid.to_string(),
        }
    }

    pub fn create_role(
        &mut self,
        oid: Oid,
        name: &str,
        options: CreateRoleOptions,
    ) -> Result<(), AclError> {
        if name.eq_ignore_ascii_case("public") || name.eq_ignore_ascii_case("none") {
            return Err(AclError::Syntax(format!("role name \"{name}\" is reserved")));
        }
        if self.by_name.contains_key(name) {
            return Err(AclError::DuplicateObject(format!(
                "role \"{name}\" already exists"
            )));
        }
        self.insert(RoleEntry {
            oid,
            name: name.to_string(),
            superuser: options.superuser,
            inherit: options.inherit,
            login: options.login,
        });
        Ok(())
    }

    /// Removes the role and its memberships. Dependency checks are the
    /// caller's job.
    pub fn drop_role(&mut self, oid: Oid) -> Result<RoleEntry, AclError> {
        if oid == BOOTSTRAP_SUPERUSERID {
            return Err(AclError::DependentObjectsStillExist {
                message: format!(
                    "cannot drop role {} because it is required by the database system",
                    self.display_name(oid)
                ),
                detail: None,
                hint: None,
            });
        }
        let Some(entry) = self.roles.remove(&oid) else {
            return Err(AclError::UndefinedObject(format!(
                "role with OID {oid} does not exist"
            )));
        };
        self.by_name.remove(&entry.name);
        self.granted_roles.remove(&oid);
        for grants in self.granted_roles.values_mut() {
            grants.remove(&oid);
        }
        Ok(entry)
    }

    pub fn grant_role(&mut self, role: Oid, member: Oid) -> Result<(), AclError> {
        for oid in [role, member] {
            if !self.role_exists(oid) {
                return Err(AclError::UndefinedObject(format!(
                    "role with OID {oid} does not exist"
                )));
            }
        }
        if self.membership_closure(role).contains(&member) {
            return Err(AclError::invalid_grant(format!(
                "role \"{}\" is a member of role \"{}\"",
                self.display_name(role),
                self.display_name(member)
            )));
        }
        self.granted_roles.entry(member).or_default().insert(role);
        Ok(())
    }

    pub fn revoke_role(&mut self, role: Oid, member: Oid) {
        if let Some(grants) = self.granted_roles.get_mut(&member) {
            grants.remove(&role);
        }
    }

    pub fn is_superuser(&self, oid: Oid) -> bool {
        self.roles.get(&oid).is_some_and(|r| r.superuser)
    }

    /// Roles whose privileges `role` can use, in breadth-first order
    /// starting with `role` itself. NOINHERIT roles do not pass on what
    /// was granted to them.
    pub fn privs_closure(&self, role: Oid) -> Vec<Oid> {
        self.closure(role, true)
    }

    /// Every role `role` is a member of, directly or indirectly.
    pub fn membership_closure(&self, role: Oid) -> Vec<Oid> {
        self.closure(role, false)
    }

    fn closure(&self, role: Oid, follow_inherit: bool) -> Vec<Oid> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([role]);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            order.push(current);
            if follow_inherit && !self.roles.get(&current).is_some_and(|r| r.inherit) {
                continue;
            }
            if let Some(grants) = self.granted_roles.get(&current) {
                let mut next: Vec<Oid> = grants.iter().copied().collect();
                next.sort_unstable();
                queue.extend(next);
            }
        }
        order
    }

    pub fn is_member_of_role(&self, member: Oid, role: Oid) -> bool {
        member == role
            || self.is_superuser(member)
            || self.membership_closure(member).contains(&role)
    }

    pub fn can_set_role(&self, member: Oid, role: Oid) -> bool {
        self.is_member_of_role(member, role)
    }
}

impl RoleMembership for RoleRegistry {
    fn has_privs_of_role(&self, member: Oid, role: Oid) -> bool {
        member == role || self.is_superuser(member) || self.privs_closure(member).contains(&role)
    }
}

impl RoleNames for RoleRegistry {
    fn role_name(&self, oid: Oid) -> Option<&str> {
        self.roles.get(&oid).map(|r| r.name.as_str())
    }

    fn role_oid(&self, name: &str) -> Option<Oid> {
        self.by_name.get(name).copied()
    }
}

impl GrantorResolver for RoleRegistry {
    fn select_best_grantor(
        &self,
        roleid: Oid,
        privileges: AclModes,
        acl: &Acl,
        owner: Oid,
    ) -> (Oid, AclModes) {
        // Owners and superusers always act as the owner.
        if self.has_privs_of_role(roleid, owner) {
            return (owner, privileges);
        }

        let needed = AclRights::grant_options_for(privileges);
        let mut best = (roleid, AclModes::empty());
        for candidate in self.privs_closure(roleid) {
            if candidate == owner {
                return (owner, privileges);
            }
            let held = acl
                .mask_direct(candidate, owner, needed, AclMaskHow::All)
                .goptions;
            if held == privileges {
                tracing::trace!(grantor = candidate, "grantor holds every needed option");
                return (candidate, held);
            }
            if held.len() > best.1.len() {
                best = (candidate, held);
            }
        }
        tracing::trace!(grantor = best.0, options = best.1.bits(), "best partial grantor");
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::acl::{AclItem, AclMode};

    fn registry_with(names: &[(Oid, &str)]) -> RoleRegistry {
        let mut registry = RoleRegistry::bootstrap();
        for (oid, name) in names {
            registry
                .create_role(*oid, name, CreateRoleOptions::default())
                .expect("create role");
        }
        registry
    }

    #[test]
    fn closure_follows_inherit_flag() {
        let mut registry = registry_with(&[(100, "alice"), (101, "staff"), (102, "admins")]);
        registry.grant_role(101, 100).expect("grant staff to alice");
        registry.grant_role(102, 101).expect("grant admins to staff");
        assert_eq!(registry.privs_closure(100), vec![100, 101, 102]);
        assert!(registry.has_privs_of_role(100, 102));

        registry
            .create_role(
                103,
                "bob",
                CreateRoleOptions {
                    inherit: false,
                    ..CreateRoleOptions::default()
                },
            )
            .expect("create bob");
        registry.grant_role(101, 103).expect("grant staff to bob");
        assert!(!registry.has_privs_of_role(103, 101));
        assert!(registry.is_member_of_role(103, 101));
    }

    #[test]
    fn membership_cycles_are_rejected() {
        let mut registry = registry_with(&[(100, "a"), (101, "b")]);
        registry.grant_role(100, 101).expect("grant a to b");
        let err = registry.grant_role(101, 100).expect_err("cycle");
        assert_eq!(err.to_string(), "role \"b\" is a member of role \"a\"");
    }

    #[test]
    fn duplicate_and_reserved_names_fail() {
        let mut registry = registry_with(&[(100, "alice")]);
        let err = registry
            .create_role(101, "alice", CreateRoleOptions::default())
            .expect_err("duplicate");
        assert_eq!(err.sqlstate(), "42710");
        assert!(registry
            .create_role(102, "public", CreateRoleOptions::default())
            .is_err());
    }

    #[test]
    fn best_grantor_prefers_full_option_holder() {
        let mut registry = registry_with(&[(100, "owner"), (101, "u"), (102, "g1"), (103, "g2")]);
        registry.grant_role(102, 101).expect("grant g1 to u");
        registry.grant_role(103, 101).expect("grant g2 to u");
        let select: AclModes = AclMode::Select.into();
        let both = select | AclMode::Update;
        let acl: Acl = [
            AclItem::new(102, 100, AclRights::with_grant_option(select)),
            AclItem::new(103, 100, AclRights::with_grant_option(both)),
        ]
        .into_iter()
        .collect();

        assert_eq!(registry.select_best_grantor(101, both, &acl, 100), (103, both));
        assert_eq!(
            registry.select_best_grantor(100, both, &acl, 100),
            (100, both)
        );
        assert_eq!(
            registry.select_best_grantor(BOOTSTRAP_SUPERUSERID, both, &acl, 100),
            (100, both)
        );
        let (grantor, options) = registry.select_best_grantor(102, both, &acl, 100);
        assert_eq!((grantor, options), (102, select));
    }
}
