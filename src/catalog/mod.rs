use std::collections::BTreeMap;

pub mod dependency;
pub mod object_type;
pub mod objects;
pub mod oid;
pub mod relation;

pub use dependency::{SharedDependencies, SharedDependency, SharedDependencyType};
pub use object_type::{DefaultAclObjectType, ObjectAddress, ObjectClass, ObjectType};
pub use objects::{
    AclObject, DefaultAclEntry, DefaultAclKey, Extension, ForeignServer, Function, FunctionKind,
    InitPrivEntry, InitPrivKey, InitPrivsType, Language, TypeEntry, TypeKind,
};
pub use relation::{Column, RelKind, Relation};

use oid::{
    Oid, OidGenerator, BOOTSTRAP_SUPERUSERID, CHAR_TYPE, C_LANGUAGE, DEFAULT_TABLESPACE,
    GLOBAL_TABLESPACE, INT4_ARRAY_TYPE, INT4_TYPE, INTERNAL_LANGUAGE, NAME_TYPE,
    PG_CATALOG_NAMESPACE, PG_CLASS_RELATION, PG_PUBLIC_NAMESPACE, PG_ROLES_VIEW,
    POSTGRES_DATABASE, SQL_LANGUAGE, TEMPLATE1_DATABASE, TEXT_ARRAY_TYPE, TEXT_TYPE,
};

use crate::error::AclError;
use crate::security::acl::{Acl, AclMode, AclRights, AclItem};
use crate::security::roles::{CreateRoleOptions, RoleRegistry};

/// In-memory catalog: every ACL-bearing row, plus the default-ACL,
/// init-privs, extension and shared-dependency bookkeeping.
#[derive(Debug, Clone)]
pub struct Catalog {
    oid_gen: OidGenerator,
    roles: RoleRegistry,
    databases: BTreeMap<Oid, AclObject>,
    namespaces: BTreeMap<Oid, AclObject>,
    relations: BTreeMap<Oid, Relation>,
    functions: BTreeMap<Oid, Function>,
    languages: BTreeMap<Oid, Language>,
    types: BTreeMap<Oid, TypeEntry>,
    tablespaces: BTreeMap<Oid, AclObject>,
    fdws: BTreeMap<Oid, AclObject>,
    servers: BTreeMap<Oid, ForeignServer>,
    large_objects: BTreeMap<Oid, AclObject>,
    default_acls: BTreeMap<DefaultAclKey, DefaultAclEntry>,
    init_privs: BTreeMap<InitPrivKey, InitPrivEntry>,
    extensions: BTreeMap<Oid, Extension>,
    extension_members: BTreeMap<ObjectAddress, Oid>,
    shdepend: SharedDependencies,
    command_id: u32,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new_bootstrap()
    }
}

/// The owner and ACL column of one catalog row.
struct AclColumn<'a> {
    name: &'a str,
    owner: Oid,
    acl: &'a Option<Acl>,
}

struct AclColumnMut<'a> {
    owner: &'a mut Oid,
    acl: &'a mut Option<Acl>,
}

impl Catalog {
    pub fn new_bootstrap() -> Self {
        let mut catalog = Self {
            oid_gen: OidGenerator::default(),
            roles: RoleRegistry::bootstrap(),
            databases: BTreeMap::new(),
            namespaces: BTreeMap::new(),
            relations: BTreeMap::new(),
            functions: BTreeMap::new(),
            languages: BTreeMap::new(),
            types: BTreeMap::new(),
            tablespaces: BTreeMap::new(),
            fdws: BTreeMap::new(),
            servers: BTreeMap::new(),
            large_objects: BTreeMap::new(),
            default_acls: BTreeMap::new(),
            init_privs: BTreeMap::new(),
            extensions: BTreeMap::new(),
            extension_members: BTreeMap::new(),
            shdepend: SharedDependencies::default(),
            command_id: 0,
        };
        let su = BOOTSTRAP_SUPERUSERID;

        for (oid, name) in [(TEMPLATE1_DATABASE, "template1"), (POSTGRES_DATABASE, "postgres")] {
            catalog.databases.insert(oid, AclObject::new(oid, name, su));
        }
        catalog
            .namespaces
            .insert(PG_CATALOG_NAMESPACE, AclObject::new(PG_CATALOG_NAMESPACE, "pg_catalog", su));
        let mut public = AclObject::new(PG_PUBLIC_NAMESPACE, "public", su);
        let usage_create = AclMode::Usage | AclMode::Create;
        public.acl = Some(
            [
                AclItem::new(su, su, AclRights::privileges(usage_create)),
                AclItem::new(oid::ACL_ID_PUBLIC, su, AclRights::privileges(usage_create)),
            ]
            .into_iter()
            .collect(),
        );
        catalog.namespaces.insert(PG_PUBLIC_NAMESPACE, public);

        for (oid, name) in [(DEFAULT_TABLESPACE, "pg_default"), (GLOBAL_TABLESPACE, "pg_global")] {
            catalog.tablespaces.insert(oid, AclObject::new(oid, name, su));
        }
        for (oid, name, trusted) in [
            (INTERNAL_LANGUAGE, "internal", false),
            (C_LANGUAGE, "c", false),
            (SQL_LANGUAGE, "sql", true),
        ] {
            catalog.languages.insert(
                oid,
                Language {
                    oid,
                    name: name.to_string(),
                    trusted,
                    owner: su,
                    acl: None,
                },
            );
        }
        for (oid, name, array_of) in [
            (CHAR_TYPE, "char", None),
            (NAME_TYPE, "name", None),
            (INT4_TYPE, "int4", None),
            (TEXT_TYPE, "text", None),
            (INT4_ARRAY_TYPE, "_int4", Some(INT4_TYPE)),
            (TEXT_ARRAY_TYPE, "_text", Some(TEXT_TYPE)),
        ] {
            catalog.types.insert(
                oid,
                TypeEntry {
                    oid,
                    name: name.to_string(),
                    namespace: PG_CATALOG_NAMESPACE,
                    kind: TypeKind::Base,
                    array_of,
                    owner: su,
                    acl: None,
                },
            );
        }
        catalog.relations.insert(
            PG_CLASS_RELATION,
            Relation::new(
                PG_CLASS_RELATION,
                "pg_class",
                PG_CATALOG_NAMESPACE,
                RelKind::Table,
                su,
                &["oid", "relname", "relnamespace", "relowner", "relacl"],
            ),
        );
        catalog.relations.insert(
            PG_ROLES_VIEW,
            Relation::new(
                PG_ROLES_VIEW,
                "pg_roles",
                PG_CATALOG_NAMESPACE,
                RelKind::View,
                su,
                &["rolname", "rolsuper", "rolinherit"],
            ),
        );
        catalog
    }

    pub fn new_oid(&mut self) -> Oid {
        self.oid_gen.next_oid()
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    pub fn roles_mut(&mut self) -> &mut RoleRegistry {
        &mut self.roles
    }

    pub fn create_role(&mut self, name: &str, options: CreateRoleOptions) -> Result<Oid, AclError> {
        let oid = self.new_oid();
        self.roles.create_role(oid, name, options)?;
        Ok(oid)
    }

    pub fn shdepend(&self) -> &SharedDependencies {
        &self.shdepend
    }

    pub fn shdepend_mut(&mut self) -> &mut SharedDependencies {
        &mut self.shdepend
    }

    /// Makes the effects of the current step visible to the next one.
    pub fn command_counter_increment(&mut self) {
        self.command_id = self.command_id.wrapping_add(1);
        tracing::debug!(command_id = self.command_id, "command counter incremented");
    }

    pub fn command_id(&self) -> u32 {
        self.command_id
    }

    /// Runs one statement. An error rolls the catalog back to its state
    /// before the statement began.
    pub fn in_transaction<T>(
        &mut self,
        f: impl FnOnce(&mut Catalog) -> Result<T, AclError>,
    ) -> Result<T, AclError> {
        let snapshot = self.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::debug!(sqlstate = err.sqlstate(), "statement rolled back: {err}");
                *self = snapshot;
                Err(err)
            }
        }
    }

    // ---- row access -------------------------------------------------------

    pub fn relation(&self, oid: Oid) -> Option<&Relation> {
        self.relations.get(&oid)
    }

    pub fn relation_mut(&mut self, oid: Oid) -> Option<&mut Relation> {
        self.relations.get_mut(&oid)
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    pub fn database(&self, oid: Oid) -> Option<&AclObject> {
        self.databases.get(&oid)
    }

    pub fn namespace(&self, oid: Oid) -> Option<&AclObject> {
        self.namespaces.get(&oid)
    }

    pub fn function(&self, oid: Oid) -> Option<&Function> {
        self.functions.get(&oid)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    pub fn language(&self, oid: Oid) -> Option<&Language> {
        self.languages.get(&oid)
    }

    pub fn type_entry(&self, oid: Oid) -> Option<&TypeEntry> {
        self.types.get(&oid)
    }

    pub fn tablespace(&self, oid: Oid) -> Option<&AclObject> {
        self.tablespaces.get(&oid)
    }

    pub fn foreign_data_wrapper(&self, oid: Oid) -> Option<&AclObject> {
        self.fdws.get(&oid)
    }

    pub fn foreign_server(&self, oid: Oid) -> Option<&ForeignServer> {
        self.servers.get(&oid)
    }

    pub fn large_object(&self, oid: Oid) -> Option<&AclObject> {
        self.large_objects.get(&oid)
    }

    pub fn extension(&self, oid: Oid) -> Option<&Extension> {
        self.extensions.get(&oid)
    }

    fn acl_column(&self, class: ObjectClass, oid: Oid) -> Option<AclColumn<'_>> {
        fn plain(obj: &AclObject) -> AclColumn<'_> {
            AclColumn {
                name: &obj.name,
                owner: obj.owner,
                acl: &obj.acl,
            }
        }
        match class {
            ObjectClass::Relation => self.relations.get(&oid).map(|r| AclColumn {
                name: &r.name,
                owner: r.owner,
                acl: &r.acl,
            }),
            ObjectClass::Database => self.databases.get(&oid).map(plain),
            ObjectClass::Namespace => self.namespaces.get(&oid).map(plain),
            ObjectClass::Tablespace => self.tablespaces.get(&oid).map(plain),
            ObjectClass::ForeignDataWrapper => self.fdws.get(&oid).map(plain),
            ObjectClass::ForeignServer => self.servers.get(&oid).map(|s| plain(&s.object)),
            ObjectClass::LargeObject => self.large_objects.get(&oid).map(plain),
            ObjectClass::Function => self.functions.get(&oid).map(|f| AclColumn {
                name: &f.name,
                owner: f.owner,
                acl: &f.acl,
            }),
            ObjectClass::Language => self.languages.get(&oid).map(|l| AclColumn {
                name: &l.name,
                owner: l.owner,
                acl: &l.acl,
            }),
            ObjectClass::Type => self.types.get(&oid).map(|t| AclColumn {
                name: &t.name,
                owner: t.owner,
                acl: &t.acl,
            }),
            ObjectClass::DefaultAcl => None,
        }
    }

    fn acl_column_mut(&mut self, class: ObjectClass, oid: Oid) -> Option<AclColumnMut<'_>> {
        fn plain(obj: &mut AclObject) -> AclColumnMut<'_> {
            AclColumnMut {
                owner: &mut obj.owner,
                acl: &mut obj.acl,
            }
        }
        match class {
            ObjectClass::Relation => self.relations.get_mut(&oid).map(|r| AclColumnMut {
                owner: &mut r.owner,
                acl: &mut r.acl,
            }),
            ObjectClass::Database => self.databases.get_mut(&oid).map(plain),
            ObjectClass::Namespace => self.namespaces.get_mut(&oid).map(plain),
            ObjectClass::Tablespace => self.tablespaces.get_mut(&oid).map(plain),
            ObjectClass::ForeignDataWrapper => self.fdws.get_mut(&oid).map(plain),
            ObjectClass::ForeignServer => self.servers.get_mut(&oid).map(|s| plain(&mut s.object)),
            ObjectClass::LargeObject => self.large_objects.get_mut(&oid).map(plain),
            ObjectClass::Function => self.functions.get_mut(&oid).map(|f| AclColumnMut {
                owner: &mut f.owner,
                acl: &mut f.acl,
            }),
            ObjectClass::Language => self.languages.get_mut(&oid).map(|l| AclColumnMut {
                owner: &mut l.owner,
                acl: &mut l.acl,
            }),
            ObjectClass::Type => self.types.get_mut(&oid).map(|t| AclColumnMut {
                owner: &mut t.owner,
                acl: &mut t.acl,
            }),
            ObjectClass::DefaultAcl => None,
        }
    }

    pub fn object_exists(&self, addr: ObjectAddress) -> bool {
        if addr.sub_id != 0 {
            return addr.class == ObjectClass::Relation
                && self
                    .relations
                    .get(&addr.object_id)
                    .and_then(|rel| rel.column(addr.sub_id))
                    .is_some_and(|col| !col.dropped);
        }
        if addr.class == ObjectClass::DefaultAcl {
            return self.default_acls.values().any(|e| e.oid == addr.object_id);
        }
        self.acl_column(addr.class, addr.object_id).is_some()
    }

    pub fn get_owner(&self, class: ObjectClass, oid: Oid) -> Result<Oid, AclError> {
        self.acl_column(class, oid)
            .map(|row| row.owner)
            .ok_or_else(|| missing_object(class, oid))
    }

    pub fn object_name(&self, class: ObjectClass, oid: Oid) -> Result<String, AclError> {
        if class == ObjectClass::LargeObject {
            return self
                .large_objects
                .contains_key(&oid)
                .then(|| oid.to_string())
                .ok_or_else(|| missing_object(class, oid));
        }
        self.acl_column(class, oid)
            .map(|row| row.name.to_string())
            .ok_or_else(|| missing_object(class, oid))
    }

    /// The stored ACL; `None` means the hard-wired default applies.
    pub fn get_acl(&self, addr: ObjectAddress) -> Result<Option<Acl>, AclError> {
        if addr.sub_id != 0 {
            let rel = self
                .relation(addr.object_id)
                .ok_or_else(|| missing_object(ObjectClass::Relation, addr.object_id))?;
            return rel
                .column(addr.sub_id)
                .map(|col| col.acl.clone())
                .ok_or_else(|| missing_attribute(addr.object_id, addr.sub_id));
        }
        self.acl_column(addr.class, addr.object_id)
            .map(|row| row.acl.clone())
            .ok_or_else(|| missing_object(addr.class, addr.object_id))
    }

    pub fn set_acl(&mut self, addr: ObjectAddress, acl: Option<Acl>) -> Result<(), AclError> {
        if addr.sub_id != 0 {
            let col = self
                .relations
                .get_mut(&addr.object_id)
                .ok_or_else(|| missing_object(ObjectClass::Relation, addr.object_id))?
                .column_mut(addr.sub_id)
                .ok_or_else(|| missing_attribute(addr.object_id, addr.sub_id))?;
            col.acl = acl;
            return Ok(());
        }
        let row = self
            .acl_column_mut(addr.class, addr.object_id)
            .ok_or_else(|| missing_object(addr.class, addr.object_id))?;
        *row.acl = acl;
        Ok(())
    }

    pub fn set_owner(&mut self, class: ObjectClass, oid: Oid, owner: Oid) -> Result<(), AclError> {
        let row = self
            .acl_column_mut(class, oid)
            .ok_or_else(|| missing_object(class, oid))?;
        *row.owner = owner;
        Ok(())
    }

    /// Containing schema, for the kinds that live in one.
    pub fn namespace_of(&self, class: ObjectClass, oid: Oid) -> Option<Oid> {
        match class {
            ObjectClass::Relation => self.relations.get(&oid).map(|r| r.namespace),
            ObjectClass::Function => self.functions.get(&oid).map(|f| f.namespace),
            ObjectClass::Type => self.types.get(&oid).map(|t| t.namespace),
            _ => None,
        }
    }

    /// Human-readable object description, as used in dependency reports.
    pub fn describe_object(&self, addr: ObjectAddress) -> String {
        match addr.class {
            ObjectClass::Relation => match self.relations.get(&addr.object_id) {
                Some(rel) if addr.sub_id != 0 => {
                    let col = rel
                        .column(addr.sub_id)
                        .map_or_else(|| addr.sub_id.to_string(), |c| c.name.clone());
                    format!("column {col} of {} {}", rel.kind.object_type().noun(), rel.name)
                }
                Some(rel) => format!("{} {}", rel.kind.object_type().noun(), rel.name),
                None => format!("relation {}", addr.object_id),
            },
            ObjectClass::Function => match self.functions.get(&addr.object_id) {
                Some(func) => {
                    let noun = match func.kind {
                        FunctionKind::Procedure => "procedure",
                        FunctionKind::Aggregate => "aggregate",
                        FunctionKind::Function => "function",
                    };
                    format!("{noun} {}", self.function_signature(func))
                }
                None => format!("function {}", addr.object_id),
            },
            ObjectClass::DefaultAcl => self.describe_default_acl(addr.object_id),
            ObjectClass::LargeObject => format!("large object {}", addr.object_id),
            class => {
                let noun = match class {
                    ObjectClass::Database => "database",
                    ObjectClass::Namespace => "schema",
                    ObjectClass::Tablespace => "tablespace",
                    ObjectClass::ForeignDataWrapper => "foreign-data wrapper",
                    ObjectClass::ForeignServer => "server",
                    ObjectClass::Language => "language",
                    _ => "type",
                };
                let name = self
                    .acl_column(class, addr.object_id)
                    .map_or_else(|| addr.object_id.to_string(), |row| row.name.to_string());
                format!("{noun} {name}")
            }
        }
    }

    fn describe_default_acl(&self, oid: Oid) -> String {
        let Some((key, _)) = self.default_acls.iter().find(|(_, e)| e.oid == oid) else {
            return format!("default privileges {oid}");
        };
        let kinds = match key.objtype {
            DefaultAclObjectType::Relation => "relations",
            DefaultAclObjectType::Sequence => "sequences",
            DefaultAclObjectType::Function => "functions",
            DefaultAclObjectType::Type => "types",
            DefaultAclObjectType::Namespace => "schemas",
        };
        let mut text = format!(
            "default privileges on new {kinds} belonging to role {}",
            self.roles.display_name(key.role)
        );
        if let Some(ns) = key.namespace.and_then(|ns| self.namespaces.get(&ns)) {
            text.push_str(&format!(" in schema {}", ns.name));
        }
        text
    }

    pub fn function_signature(&self, func: &Function) -> String {
        let args = func
            .arg_types
            .iter()
            .map(|oid| {
                self.types
                    .get(oid)
                    .map_or_else(|| oid.to_string(), |t| t.name.clone())
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({args})", func.name)
    }

    // ---- name lookup ------------------------------------------------------

    pub fn namespace_oid(&self, name: &str) -> Option<Oid> {
        self.namespaces
            .values()
            .find(|ns| ns.name == name)
            .map(|ns| ns.oid)
    }

    pub fn resolve_namespace(&self, name: &str) -> Result<Oid, AclError> {
        self.namespace_oid(name)
            .ok_or_else(|| AclError::UndefinedSchema(format!("schema \"{name}\" does not exist")))
    }

    pub fn database_oid(&self, name: &str) -> Result<Oid, AclError> {
        find_named(&self.databases, name).ok_or_else(|| {
            AclError::UndefinedDatabase(format!("database \"{name}\" does not exist"))
        })
    }

    pub fn tablespace_oid(&self, name: &str) -> Result<Oid, AclError> {
        find_named(&self.tablespaces, name).ok_or_else(|| {
            AclError::UndefinedObject(format!("tablespace \"{name}\" does not exist"))
        })
    }

    pub fn fdw_oid(&self, name: &str) -> Result<Oid, AclError> {
        find_named(&self.fdws, name).ok_or_else(|| {
            AclError::UndefinedObject(format!("foreign-data wrapper \"{name}\" does not exist"))
        })
    }

    pub fn server_oid(&self, name: &str) -> Result<Oid, AclError> {
        self.servers
            .values()
            .find(|s| s.object.name == name)
            .map(|s| s.object.oid)
            .ok_or_else(|| AclError::UndefinedObject(format!("server \"{name}\" does not exist")))
    }

    pub fn language_oid(&self, name: &str) -> Result<Oid, AclError> {
        self.languages
            .values()
            .find(|l| l.name == name)
            .map(|l| l.oid)
            .ok_or_else(|| {
                AclError::UndefinedObject(format!("language \"{name}\" does not exist"))
            })
    }

    pub fn extension_oid(&self, name: &str) -> Result<Oid, AclError> {
        self.extensions
            .values()
            .find(|e| e.name == name)
            .map(|e| e.oid)
            .ok_or_else(|| {
                AclError::UndefinedObject(format!("extension \"{name}\" does not exist"))
            })
    }

    pub fn resolve_relation(&self, parts: &[String], search_path: &[Oid]) -> Result<Oid, AclError> {
        let (schema, name) = split_qualified(parts)?;
        let found = match schema {
            Some(schema) => {
                let ns = self.resolve_namespace(schema)?;
                self.relation_in(ns, name)
            }
            None => search_path.iter().find_map(|ns| self.relation_in(*ns, name)),
        };
        found.ok_or_else(|| {
            AclError::UndefinedTable(format!("relation \"{}\" does not exist", parts.join(".")))
        })
    }

    fn relation_in(&self, namespace: Oid, name: &str) -> Option<Oid> {
        self.relations
            .values()
            .find(|r| r.namespace == namespace && r.name == name)
            .map(|r| r.oid)
    }

    pub fn relations_in_namespace(&self, namespace: Oid) -> impl Iterator<Item = &Relation> {
        self.relations
            .values()
            .filter(move |r| r.namespace == namespace)
    }

    pub fn functions_in_namespace(&self, namespace: Oid) -> impl Iterator<Item = &Function> {
        self.functions
            .values()
            .filter(move |f| f.namespace == namespace)
    }

    pub fn resolve_type(&self, parts: &[String], search_path: &[Oid]) -> Result<Oid, AclError> {
        let (schema, name) = split_qualified(parts)?;
        let (name, is_array) = match name.strip_suffix("[]") {
            Some(elem) => (elem.trim(), true),
            None => (name, false),
        };
        let name = match name {
            "integer" | "int" => "int4",
            other => other,
        };
        let in_ns = |ns: Oid| {
            self.types
                .values()
                .find(|t| t.namespace == ns && t.name == name)
                .map(|t| t.oid)
        };
        let found = match schema {
            Some(schema) => in_ns(self.resolve_namespace(schema)?),
            None => search_path.iter().find_map(|ns| in_ns(*ns)),
        };
        let found = match (found, is_array) {
            (Some(elem), true) => self
                .types
                .values()
                .find(|t| t.array_of == Some(elem))
                .map(|t| t.oid),
            (found, _) => found,
        };
        found.ok_or_else(|| {
            AclError::UndefinedObject(format!("type \"{}\" does not exist", parts.join(".")))
        })
    }

    /// Functions of that name visible through the search path, or in the
    /// named schema.
    pub fn lookup_functions(
        &self,
        parts: &[String],
        search_path: &[Oid],
    ) -> Result<Vec<&Function>, AclError> {
        let (schema, name) = split_qualified(parts)?;
        let namespaces = match schema {
            Some(schema) => vec![self.resolve_namespace(schema)?],
            None => search_path.to_vec(),
        };
        Ok(self
            .functions
            .values()
            .filter(|f| f.name == name && namespaces.contains(&f.namespace))
            .collect())
    }

    // ---- row creation -----------------------------------------------------

    pub fn insert_namespace(&mut self, name: &str, owner: Oid) -> Result<Oid, AclError> {
        if self.namespace_oid(name).is_some() {
            return Err(AclError::DuplicateObject(format!(
                "schema \"{name}\" already exists"
            )));
        }
        let oid = self.new_oid();
        self.namespaces.insert(oid, AclObject::new(oid, name, owner));
        Ok(oid)
    }

    pub fn insert_relation(
        &mut self,
        namespace: Oid,
        name: &str,
        kind: RelKind,
        owner: Oid,
        columns: &[&str],
    ) -> Result<Oid, AclError> {
        if self.relation_in(namespace, name).is_some() {
            return Err(AclError::DuplicateObject(format!(
                "relation \"{name}\" already exists"
            )));
        }
        let oid = self.new_oid();
        self.relations
            .insert(oid, Relation::new(oid, name, namespace, kind, owner, columns));
        Ok(oid)
    }

    /// Marks a column dropped. Its ACL stays on the attribute row but its
    /// dependency links go away.
    pub fn drop_column(&mut self, relation: Oid, name: &str) -> Result<i16, AclError> {
        let rel = self
            .relations
            .get_mut(&relation)
            .ok_or_else(|| missing_object(ObjectClass::Relation, relation))?;
        let attnum = rel.drop_column(name).ok_or_else(|| {
            AclError::UndefinedColumn(format!(
                "column \"{name}\" of relation \"{}\" does not exist",
                rel.name
            ))
        })?;
        self.shdepend
            .drop_object(ObjectAddress::column(relation, attnum));
        Ok(attnum)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn insert_function(
        &mut self,
        namespace: Oid,
        name: &str,
        kind: FunctionKind,
        arg_types: Vec<Oid>,
        language: Oid,
        owner: Oid,
    ) -> Result<Oid, AclError> {
        if self
            .functions
            .values()
            .any(|f| f.namespace == namespace && f.name == name && f.arg_types == arg_types)
        {
            return Err(AclError::DuplicateObject(format!(
                "function \"{name}\" already exists with same argument types"
            )));
        }
        let oid = self.new_oid();
        self.functions.insert(
            oid,
            Function {
                oid,
                name: name.to_string(),
                namespace,
                kind,
                arg_types,
                language,
                owner,
                acl: None,
            },
        );
        Ok(oid)
    }

    pub fn insert_language(&mut self, name: &str, trusted: bool, owner: Oid) -> Result<Oid, AclError> {
        if self.language_oid(name).is_ok() {
            return Err(AclError::DuplicateObject(format!(
                "language \"{name}\" already exists"
            )));
        }
        let oid = self.new_oid();
        self.languages.insert(
            oid,
            Language {
                oid,
                name: name.to_string(),
                trusted,
                owner,
                acl: None,
            },
        );
        Ok(oid)
    }

    /// Creates a type together with its `_name` array type. Domains get no
    /// array type. Returns the type's OID and its array's, if any.
    pub fn insert_type(
        &mut self,
        namespace: Oid,
        name: &str,
        kind: TypeKind,
        owner: Oid,
    ) -> Result<(Oid, Option<Oid>), AclError> {
        if self
            .types
            .values()
            .any(|t| t.namespace == namespace && t.name == name)
        {
            return Err(AclError::DuplicateObject(format!(
                "type \"{name}\" already exists"
            )));
        }
        let oid = self.new_oid();
        self.types.insert(
            oid,
            TypeEntry {
                oid,
                name: name.to_string(),
                namespace,
                kind,
                array_of: None,
                owner,
                acl: None,
            },
        );
        if kind == TypeKind::Domain {
            return Ok((oid, None));
        }
        let array_oid = self.new_oid();
        self.types.insert(
            array_oid,
            TypeEntry {
                oid: array_oid,
                name: format!("_{name}"),
                namespace,
                kind: TypeKind::Base,
                array_of: Some(oid),
                owner,
                acl: None,
            },
        );
        Ok((oid, Some(array_oid)))
    }

    pub fn insert_database(&mut self, name: &str, owner: Oid) -> Result<Oid, AclError> {
        insert_named(&mut self.oid_gen, &mut self.databases, name, owner, "database")
    }

    pub fn insert_tablespace(&mut self, name: &str, owner: Oid) -> Result<Oid, AclError> {
        insert_named(&mut self.oid_gen, &mut self.tablespaces, name, owner, "tablespace")
    }

    pub fn insert_fdw(&mut self, name: &str, owner: Oid) -> Result<Oid, AclError> {
        insert_named(&mut self.oid_gen, &mut self.fdws, name, owner, "foreign-data wrapper")
    }

    pub fn insert_server(&mut self, name: &str, fdw: Oid, owner: Oid) -> Result<Oid, AclError> {
        if self.server_oid(name).is_ok() {
            return Err(AclError::DuplicateObject(format!(
                "server \"{name}\" already exists"
            )));
        }
        let oid = self.new_oid();
        self.servers.insert(
            oid,
            ForeignServer {
                object: AclObject::new(oid, name, owner),
                fdw,
            },
        );
        Ok(oid)
    }

    pub fn insert_large_object(&mut self, owner: Oid) -> Oid {
        let oid = self.new_oid();
        self.large_objects
            .insert(oid, AclObject::new(oid, &oid.to_string(), owner));
        oid
    }

    pub fn insert_extension(&mut self, name: &str, owner: Oid, namespace: Oid) -> Result<Oid, AclError> {
        if self.extension_oid(name).is_ok() {
            return Err(AclError::DuplicateObject(format!(
                "extension \"{name}\" already exists"
            )));
        }
        let oid = self.new_oid();
        self.extensions.insert(
            oid,
            Extension {
                oid,
                name: name.to_string(),
                owner,
                namespace,
            },
        );
        Ok(oid)
    }

    // ---- extension membership ---------------------------------------------

    pub fn extension_of(&self, addr: ObjectAddress) -> Option<Oid> {
        self.extension_members.get(&addr).copied()
    }

    pub fn add_extension_member(&mut self, addr: ObjectAddress, extension: Oid) {
        self.extension_members.insert(addr, extension);
    }

    pub fn remove_extension_member(&mut self, addr: ObjectAddress) -> Option<Oid> {
        self.extension_members.remove(&addr)
    }

    pub fn extension_members(&self, extension: Oid) -> Vec<ObjectAddress> {
        self.extension_members
            .iter()
            .filter(|(_, ext)| **ext == extension)
            .map(|(addr, _)| *addr)
            .collect()
    }

    // ---- pg_default_acl ---------------------------------------------------

    pub fn default_acl(&self, key: &DefaultAclKey) -> Option<&DefaultAclEntry> {
        self.default_acls.get(key)
    }

    pub fn default_acls(&self) -> impl Iterator<Item = (&DefaultAclKey, &DefaultAclEntry)> {
        self.default_acls.iter()
    }

    pub fn default_acl_by_oid(&self, oid: Oid) -> Option<(DefaultAclKey, &DefaultAclEntry)> {
        self.default_acls
            .iter()
            .find(|(_, entry)| entry.oid == oid)
            .map(|(key, entry)| (*key, entry))
    }

    /// Inserts or replaces a row, returning its OID and whether it is new.
    pub fn upsert_default_acl(&mut self, key: DefaultAclKey, acl: Acl) -> (Oid, bool) {
        if let Some(entry) = self.default_acls.get_mut(&key) {
            entry.acl = acl;
            return (entry.oid, false);
        }
        let oid = self.oid_gen.next_oid();
        self.default_acls.insert(key, DefaultAclEntry { oid, acl });
        (oid, true)
    }

    pub fn remove_default_acl(&mut self, key: &DefaultAclKey) -> Option<DefaultAclEntry> {
        let entry = self.default_acls.remove(key)?;
        self.shdepend
            .drop_object(ObjectAddress::new(ObjectClass::DefaultAcl, entry.oid));
        Some(entry)
    }

    // ---- pg_init_privs ----------------------------------------------------

    pub fn init_priv(&self, key: &InitPrivKey) -> Option<&InitPrivEntry> {
        self.init_privs.get(key)
    }

    pub fn init_privs(&self) -> impl Iterator<Item = (&InitPrivKey, &InitPrivEntry)> {
        self.init_privs.iter()
    }

    pub fn set_init_priv(&mut self, key: InitPrivKey, entry: InitPrivEntry) {
        self.init_privs.insert(key, entry);
    }

    pub fn remove_init_priv(&mut self, key: &InitPrivKey) -> Option<InitPrivEntry> {
        self.init_privs.remove(key)
    }
}

fn find_named(rows: &BTreeMap<Oid, AclObject>, name: &str) -> Option<Oid> {
    rows.values().find(|row| row.name == name).map(|row| row.oid)
}

fn insert_named(
    oid_gen: &mut OidGenerator,
    rows: &mut BTreeMap<Oid, AclObject>,
    name: &str,
    owner: Oid,
    noun: &str,
) -> Result<Oid, AclError> {
    if find_named(rows, name).is_some() {
        return Err(AclError::DuplicateObject(format!(
            "{noun} \"{name}\" already exists"
        )));
    }
    let oid = oid_gen.next_oid();
    rows.insert(oid, AclObject::new(oid, name, owner));
    Ok(oid)
}

fn split_qualified(parts: &[String]) -> Result<(Option<&str>, &str), AclError> {
    match parts {
        [name] => Ok((None, name.as_str())),
        [schema, name] => Ok((Some(schema.as_str()), name.as_str())),
        _ => Err(AclError::Syntax(format!(
            "improper qualified name (too many dotted names): {}",
            parts.join(".")
        ))),
    }
}

/// Error for an OID that no longer resolves, e.g. dropped concurrently.
pub fn missing_object(class: ObjectClass, oid: Oid) -> AclError {
    match class {
        ObjectClass::Relation => {
            AclError::UndefinedTable(format!("relation with OID {oid} does not exist"))
        }
        ObjectClass::Database => {
            AclError::UndefinedDatabase(format!("database with OID {oid} does not exist"))
        }
        ObjectClass::Namespace => {
            AclError::UndefinedSchema(format!("schema with OID {oid} does not exist"))
        }
        ObjectClass::Function => {
            AclError::UndefinedFunction(format!("function with OID {oid} does not exist"))
        }
        ObjectClass::Language => {
            AclError::UndefinedObject(format!("language with OID {oid} does not exist"))
        }
        ObjectClass::Type => AclError::UndefinedObject(format!("type with OID {oid} does not exist")),
        ObjectClass::Tablespace => {
            AclError::UndefinedObject(format!("tablespace with OID {oid} does not exist"))
        }
        ObjectClass::ForeignDataWrapper => AclError::UndefinedObject(format!(
            "foreign-data wrapper with OID {oid} does not exist"
        )),
        ObjectClass::ForeignServer => {
            AclError::UndefinedObject(format!("foreign server with OID {oid} does not exist"))
        }
        ObjectClass::LargeObject => {
            AclError::UndefinedObject(format!("large object {oid} does not exist"))
        }
        ObjectClass::DefaultAcl => {
            AclError::Internal(format!("default ACL with OID {oid} does not exist"))
        }
    }
}

pub fn missing_attribute(relation: Oid, attnum: i16) -> AclError {
    AclError::UndefinedColumn(format!(
        "attribute {attnum} of relation with OID {relation} does not exist"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_has_core_objects() {
        let catalog = Catalog::new_bootstrap();
        assert_eq!(catalog.namespace_oid("pg_catalog"), Some(PG_CATALOG_NAMESPACE));
        assert_eq!(catalog.database_oid("postgres").expect("postgres db"), POSTGRES_DATABASE);
        assert!(catalog.type_entry(INT4_ARRAY_TYPE).is_some_and(TypeEntry::is_true_array));
        assert!(!catalog.type_entry(NAME_TYPE).is_some_and(TypeEntry::is_true_array));
        assert!(catalog.language(SQL_LANGUAGE).is_some_and(|l| l.trusted));
    }

    #[test]
    fn acl_column_round_trips_for_columns() {
        let mut catalog = Catalog::new_bootstrap();
        let rel = catalog
            .insert_relation(PG_PUBLIC_NAMESPACE, "t", RelKind::Table, 10, &["a"])
            .expect("create table");
        let col = ObjectAddress::column(rel, 1);
        assert_eq!(catalog.get_acl(col).expect("column acl"), None);
        catalog
            .set_acl(col, Some(Acl::new()))
            .expect("set column acl");
        assert_eq!(catalog.get_acl(col).expect("column acl"), Some(Acl::new()));

        let err = catalog
            .get_acl(ObjectAddress::column(rel, 9))
            .expect_err("missing attribute");
        assert_eq!(err.sqlstate(), "42703");
    }

    #[test]
    fn failed_statement_rolls_back() {
        let mut catalog = Catalog::new_bootstrap();
        let result: Result<(), AclError> = catalog.in_transaction(|cat| {
            cat.insert_namespace("scratch", 10)?;
            Err(AclError::Internal("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(catalog.namespace_oid("scratch"), None);
    }

    #[test]
    fn unqualified_lookup_walks_search_path() {
        let mut catalog = Catalog::new_bootstrap();
        let rel = catalog
            .insert_relation(PG_PUBLIC_NAMESPACE, "t", RelKind::Table, 10, &[])
            .expect("create table");
        let path = [PG_CATALOG_NAMESPACE, PG_PUBLIC_NAMESPACE];
        assert_eq!(
            catalog.resolve_relation(&["t".to_string()], &path).expect("t"),
            rel
        );
        let err = catalog
            .resolve_relation(&["nope".to_string()], &path)
            .expect_err("missing");
        assert_eq!(err.to_string(), "relation \"nope\" does not exist");
        assert_eq!(
            catalog
                .resolve_type(&["integer".to_string()], &path)
                .expect("int4 alias"),
            INT4_TYPE
        );
        assert_eq!(
            catalog
                .resolve_type(&["int4[]".to_string()], &path)
                .expect("array spelling"),
            INT4_ARRAY_TYPE
        );
    }

    #[test]
    fn describe_object_names_kind() {
        let mut catalog = Catalog::new_bootstrap();
        let rel = catalog
            .insert_relation(PG_PUBLIC_NAMESPACE, "t", RelKind::Table, 10, &["a"])
            .expect("create table");
        assert_eq!(
            catalog.describe_object(ObjectAddress::column(rel, 1)),
            "column a of table t"
        );
        assert_eq!(
            catalog.describe_object(ObjectAddress::new(ObjectClass::Namespace, PG_PUBLIC_NAMESPACE)),
            "schema public"
        );
    }
}
