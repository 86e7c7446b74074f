//! Catalog rows for the ACL-bearing objects other than relations, plus the
//! `pg_default_acl`, `pg_init_privs` and `pg_extension` rows.

use super::object_type::{DefaultAclObjectType, ObjectClass};
use super::oid::Oid;
use crate::security::acl::Acl;

/// Row shape shared by databases, schemas, tablespaces, foreign-data
/// wrappers, foreign servers and large objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclObject {
    pub oid: Oid,
    pub name: String,
    pub owner: Oid,
    pub acl: Option<Acl>,
}

impl AclObject {
    pub fn new(oid: Oid, name: &str, owner: Oid) -> Self {
        Self {
            oid,
            name: name.to_string(),
            owner,
            acl: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Function,
    Aggregate,
    Procedure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub oid: Oid,
    pub name: String,
    pub namespace: Oid,
    pub kind: FunctionKind,
    pub arg_types: Vec<Oid>,
    pub language: Oid,
    pub owner: Oid,
    pub acl: Option<Acl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    pub oid: Oid,
    pub name: String,
    pub trusted: bool,
    pub owner: Oid,
    pub acl: Option<Acl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Base,
    Domain,
    Composite,
    Enum,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeEntry {
    pub oid: Oid,
    pub name: String,
    pub namespace: Oid,
    pub kind: TypeKind,
    /// Element type of a true (varlena) array type. Fixed-length
    /// subscriptable types such as `name` leave this empty.
    pub array_of: Option<Oid>,
    pub owner: Oid,
    pub acl: Option<Acl>,
}

impl TypeEntry {
    pub fn is_true_array(&self) -> bool {
        self.array_of.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignServer {
    pub object: AclObject,
    pub fdw: Oid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub oid: Oid,
    pub name: String,
    pub owner: Oid,
    pub namespace: Oid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefaultAclKey {
    pub role: Oid,
    /// `None` for a database-wide entry.
    pub namespace: Option<Oid>,
    pub objtype: DefaultAclObjectType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultAclEntry {
    pub oid: Oid,
    pub acl: Acl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InitPrivKey {
    pub object_id: Oid,
    pub class: ObjectClass,
    pub sub_id: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPrivsType {
    Extension,
    BinaryUpgrade,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitPrivEntry {
    pub privtype: InitPrivsType,
    pub acl: Acl,
}
