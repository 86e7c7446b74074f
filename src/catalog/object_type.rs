use super::oid::Oid;

/// User-facing object kinds, as named by GRANT and by error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectType {
    Table,
    Sequence,
    View,
    MaterializedView,
    ForeignTable,
    Index,
    Column,
    Database,
    Domain,
    ForeignDataWrapper,
    ForeignServer,
    Function,
    Procedure,
    Routine,
    Language,
    LargeObject,
    Schema,
    Tablespace,
    Type,
}

impl ObjectType {
    /// Noun used in "permission denied for ..." and "must be owner of ...".
    pub fn noun(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Sequence => "sequence",
            Self::View => "view",
            Self::MaterializedView => "materialized view",
            Self::ForeignTable => "foreign table",
            Self::Index => "index",
            Self::Column => "column",
            Self::Database => "database",
            Self::Domain => "domain",
            Self::ForeignDataWrapper => "foreign-data wrapper",
            Self::ForeignServer => "foreign server",
            Self::Function => "function",
            Self::Procedure => "procedure",
            Self::Routine => "routine",
            Self::Language => "language",
            Self::LargeObject => "large object",
            Self::Schema => "schema",
            Self::Tablespace => "tablespace",
            Self::Type => "type",
        }
    }

    /// Noun used by "invalid privilege type X for ..." during GRANT parsing.
    pub fn grant_noun(self) -> &'static str {
        match self {
            Self::Table | Self::View | Self::MaterializedView | Self::ForeignTable => "relation",
            other => other.noun(),
        }
    }

    /// Catalog the object's ACL lives in.
    pub fn class(self) -> ObjectClass {
        match self {
            Self::Table
            | Self::Sequence
            | Self::View
            | Self::MaterializedView
            | Self::ForeignTable
            | Self::Index
            | Self::Column => ObjectClass::Relation,
            Self::Database => ObjectClass::Database,
            Self::Domain | Self::Type => ObjectClass::Type,
            Self::ForeignDataWrapper => ObjectClass::ForeignDataWrapper,
            Self::ForeignServer => ObjectClass::ForeignServer,
            Self::Function | Self::Procedure | Self::Routine => ObjectClass::Function,
            Self::Language => ObjectClass::Language,
            Self::LargeObject => ObjectClass::LargeObject,
            Self::Schema => ObjectClass::Namespace,
            Self::Tablespace => ObjectClass::Tablespace,
        }
    }

    /// Event hooks are not fired for shared objects.
    pub fn supports_event_hooks(self) -> bool {
        !matches!(self, Self::Database | Self::Tablespace)
    }
}

/// Catalogs holding ACL-bearing rows, plus `pg_default_acl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectClass {
    Relation,
    Database,
    ForeignDataWrapper,
    ForeignServer,
    Function,
    Language,
    LargeObject,
    Namespace,
    Tablespace,
    Type,
    DefaultAcl,
}

/// Identifies a catalog object, or one of its columns when `sub_id != 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectAddress {
    pub class: ObjectClass,
    pub object_id: Oid,
    pub sub_id: i16,
}

impl ObjectAddress {
    pub fn new(class: ObjectClass, object_id: Oid) -> Self {
        Self {
            class,
            object_id,
            sub_id: 0,
        }
    }

    pub fn column(relation: Oid, attnum: i16) -> Self {
        Self {
            class: ObjectClass::Relation,
            object_id: relation,
            sub_id: attnum,
        }
    }
}

/// Object kinds ALTER DEFAULT PRIVILEGES can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DefaultAclObjectType {
    Relation,
    Sequence,
    Function,
    Type,
    Namespace,
}

impl DefaultAclObjectType {
    pub fn object_type(self) -> ObjectType {
        match self {
            Self::Relation => ObjectType::Table,
            Self::Sequence => ObjectType::Sequence,
            Self::Function => ObjectType::Function,
            Self::Type => ObjectType::Type,
            Self::Namespace => ObjectType::Schema,
        }
    }

    pub fn from_object_type(objtype: ObjectType) -> Option<Self> {
        match objtype {
            ObjectType::Table => Some(Self::Relation),
            ObjectType::Sequence => Some(Self::Sequence),
            ObjectType::Function | ObjectType::Procedure | ObjectType::Routine => {
                Some(Self::Function)
            }
            ObjectType::Type | ObjectType::Domain => Some(Self::Type),
            ObjectType::Schema => Some(Self::Namespace),
            _ => None,
        }
    }

    /// The `defaclobjtype` letter.
    pub fn code(self) -> char {
        match self {
            Self::Relation => 'r',
            Self::Sequence => 'S',
            Self::Function => 'f',
            Self::Type => 'T',
            Self::Namespace => 'n',
        }
    }
}
