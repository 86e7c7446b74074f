use std::collections::BTreeSet;

use itertools::{EitherOrBoth, Itertools};

use super::object_type::ObjectAddress;
use super::oid::{Oid, BOOTSTRAP_SUPERUSERID};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SharedDependencyType {
    Owner,
    Acl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SharedDependency {
    pub object: ObjectAddress,
    pub role: Oid,
    pub deptype: SharedDependencyType,
}

/// Links between objects and the roles that own them or appear in their
/// ACLs, so that dropping a role can find everything that mentions it.
#[derive(Debug, Clone, Default)]
pub struct SharedDependencies {
    rows: BTreeSet<SharedDependency>,
}

/// Pinned roles are never dropped, so nothing records a dependency on them.
fn is_pinned(role: Oid) -> bool {
    role == BOOTSTRAP_SUPERUSERID
}

impl SharedDependencies {
    pub fn record_owner(&mut self, object: ObjectAddress, owner: Oid) {
        if is_pinned(owner) {
            return;
        }
        self.rows.insert(SharedDependency {
            object,
            role: owner,
            deptype: SharedDependencyType::Owner,
        });
    }

    /// Moves the owner link to `new_owner`. The new owner no longer needs
    /// an ACL link of its own, on the object or any of its columns.
    pub fn change_owner(&mut self, object: ObjectAddress, new_owner: Oid) {
        self.rows.retain(|row| {
            !(row.object == object && row.deptype == SharedDependencyType::Owner)
                && !(row.object.class == object.class
                    && row.object.object_id == object.object_id
                    && row.role == new_owner
                    && row.deptype == SharedDependencyType::Acl)
        });
        self.record_owner(object, new_owner);
    }

    /// Brings the ACL links of `object` in line with a changed ACL, given
    /// the sorted member lists of the old and new ACL.
    pub fn update_acl_dependencies(
        &mut self,
        object: ObjectAddress,
        owner: Oid,
        old_members: &[Oid],
        new_members: &[Oid],
    ) {
        for change in old_members
            .iter()
            .merge_join_by(new_members.iter(), |old, new| old.cmp(new))
        {
            let (role, added) = match change {
                EitherOrBoth::Left(role) => (*role, false),
                EitherOrBoth::Right(role) => (*role, true),
                EitherOrBoth::Both(..) => continue,
            };
            // The owner is covered by its owner link.
            if role == owner || is_pinned(role) {
                continue;
            }
            let row = SharedDependency {
                object,
                role,
                deptype: SharedDependencyType::Acl,
            };
            if added {
                self.rows.insert(row);
            } else {
                self.rows.remove(&row);
            }
        }
    }

    /// Forgets every link of `object`, and of its columns when
    /// `object.sub_id` is zero.
    pub fn drop_object(&mut self, object: ObjectAddress) {
        self.rows.retain(|row| {
            !(row.object.class == object.class
                && row.object.object_id == object.object_id
                && (object.sub_id == 0 || row.object.sub_id == object.sub_id))
        });
    }

    pub fn dependents_of_role(&self, role: Oid) -> Vec<SharedDependency> {
        self.rows.iter().filter(|row| row.role == role).copied().collect()
    }

    pub fn has_dependents(&self, role: Oid) -> bool {
        self.rows.iter().any(|row| row.role == role)
    }

    pub fn rows(&self) -> impl Iterator<Item = &SharedDependency> {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::object_type::ObjectClass;

    fn table(oid: Oid) -> ObjectAddress {
        ObjectAddress::new(ObjectClass::Relation, oid)
    }

    #[test]
    fn acl_links_follow_member_diff() {
        let mut deps = SharedDependencies::default();
        let addr = table(20_000);
        deps.update_acl_dependencies(addr, 100, &[], &[100, 200, 300]);
        assert!(!deps.has_dependents(100), "owner gets no ACL link");
        assert!(deps.has_dependents(200));

        deps.update_acl_dependencies(addr, 100, &[100, 200, 300], &[100, 300]);
        assert!(!deps.has_dependents(200));
        assert_eq!(deps.dependents_of_role(300).len(), 1);
    }

    #[test]
    fn pinned_roles_are_never_recorded() {
        let mut deps = SharedDependencies::default();
        deps.record_owner(table(20_000), BOOTSTRAP_SUPERUSERID);
        deps.update_acl_dependencies(table(20_000), 100, &[], &[BOOTSTRAP_SUPERUSERID]);
        assert_eq!(deps.rows().count(), 0);
    }

    #[test]
    fn owner_change_drops_acl_links_of_new_owner() {
        let mut deps = SharedDependencies::default();
        let addr = table(20_000);
        deps.record_owner(addr, 100);
        deps.update_acl_dependencies(ObjectAddress::column(20_000, 1), 100, &[], &[200]);
        deps.change_owner(addr, 200);
        let rows = deps.dependents_of_role(200);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].deptype, SharedDependencyType::Owner);
        assert!(!deps.has_dependents(100));
    }

    #[test]
    fn drop_object_removes_column_links() {
        let mut deps = SharedDependencies::default();
        deps.update_acl_dependencies(ObjectAddress::column(20_000, 2), 100, &[], &[200]);
        deps.update_acl_dependencies(table(20_000), 100, &[], &[200]);
        deps.drop_object(table(20_000));
        assert!(!deps.has_dependents(200));
    }
}
