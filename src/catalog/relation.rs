use super::object_type::ObjectType;
use super::oid::Oid;
use crate::security::acl::Acl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelKind {
    Table,
    Sequence,
    View,
    MaterializedView,
    ForeignTable,
    Index,
    CompositeType,
}

impl RelKind {
    /// Object type used for hard-wired defaults and error messages.
    pub fn object_type(self) -> ObjectType {
        match self {
            Self::Table | Self::CompositeType => ObjectType::Table,
            Self::Sequence => ObjectType::Sequence,
            Self::View => ObjectType::View,
            Self::MaterializedView => ObjectType::MaterializedView,
            Self::ForeignTable => ObjectType::ForeignTable,
            Self::Index => ObjectType::Index,
        }
    }

    pub fn has_system_columns(self) -> bool {
        matches!(
            self,
            Self::Table | Self::Sequence | Self::MaterializedView | Self::ForeignTable
        )
    }

    /// Kinds that carry an ACL of their own.
    pub fn is_grantable(self) -> bool {
        !matches!(self, Self::Index | Self::CompositeType)
    }
}

/// System attributes, numbered below zero.
pub const SYSTEM_COLUMNS: [(&str, i16); 6] = [
    ("ctid", -1),
    ("xmin", -2),
    ("cmin", -3),
    ("xmax", -4),
    ("cmax", -5),
    ("tableoid", -6),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub attnum: i16,
    pub dropped: bool,
    pub acl: Option<Acl>,
}

impl Column {
    fn new(name: &str, attnum: i16) -> Self {
        Self {
            name: name.to_string(),
            attnum,
            dropped: false,
            acl: None,
        }
    }

    pub fn is_system(&self) -> bool {
        self.attnum < 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub oid: Oid,
    pub name: String,
    pub namespace: Oid,
    pub kind: RelKind,
    pub owner: Oid,
    pub acl: Option<Acl>,
    columns: Vec<Column>,
}

impl Relation {
    pub fn new(
        oid: Oid,
        name: &str,
        namespace: Oid,
        kind: RelKind,
        owner: Oid,
        column_names: &[&str],
    ) -> Self {
        let mut columns = Vec::new();
        if kind.has_system_columns() {
            columns.extend(
                SYSTEM_COLUMNS
                    .iter()
                    .rev()
                    .map(|(name, attnum)| Column::new(name, *attnum)),
            );
        }
        for (idx, name) in column_names.iter().enumerate() {
            let attnum = i16::try_from(idx + 1).unwrap_or(i16::MAX);
            columns.push(Column::new(name, attnum));
        }
        Self {
            oid,
            name: name.to_string(),
            namespace,
            kind,
            owner,
            acl: None,
            columns,
        }
    }

    /// Every attribute row, system and dropped ones included.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn user_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|col| col.attnum > 0)
    }

    pub fn live_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|col| !col.dropped)
    }

    pub fn column(&self, attnum: i16) -> Option<&Column> {
        self.columns.iter().find(|col| col.attnum == attnum)
    }

    pub fn column_mut(&mut self, attnum: i16) -> Option<&mut Column> {
        self.columns.iter_mut().find(|col| col.attnum == attnum)
    }

    /// Looks a live column up by name.
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.live_columns().find(|col| col.name == name)
    }

    pub fn add_column(&mut self, name: &str) -> i16 {
        let attnum = self
            .columns
            .iter()
            .map(|col| col.attnum)
            .max()
            .unwrap_or(0)
            .max(0)
            + 1;
        self.columns.push(Column::new(name, attnum));
        attnum
    }

    /// Marks a column dropped. Its attribute row, ACL included, stays behind
    /// under a placeholder name.
    pub fn drop_column(&mut self, name: &str) -> Option<i16> {
        let col = self
            .columns
            .iter_mut()
            .find(|col| col.attnum > 0 && !col.dropped && col.name == name)?;
        col.dropped = true;
        col.name = format!("........pg.dropped.{}........", col.attnum);
        Some(col.attnum)
    }
}
