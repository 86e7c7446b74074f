//! ACL values and the grant/revoke algebra over them.
//!
//! An [`Acl`] is a list of [`AclItem`]s, at most one per (grantee, grantor)
//! pair. Every transform consumes the old value and hands back a new one, so
//! a failed statement simply drops the half-built result.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Sub};

use enumflags2::{bitflags, make_bitflags, BitFlags};
use itertools::Itertools;
use parse_display::{Display, FromStr};

use crate::catalog::oid::{Oid, ACL_ID_PUBLIC, BOOTSTRAP_SUPERUSERID};
use crate::catalog::ObjectType;
use crate::error::AclError;

#[bitflags]
#[repr(u16)]
#[derive(Clone, Copy, Debug, Display, FromStr, PartialEq, Eq, Hash)]
pub enum AclMode {
    #[display("a")]
    Insert = 1 << 0,
    #[display("r")]
    Select = 1 << 1,
    #[display("w")]
    Update = 1 << 2,
    #[display("d")]
    Delete = 1 << 3,
    #[display("D")]
    Truncate = 1 << 4,
    #[display("x")]
    References = 1 << 5,
    #[display("t")]
    Trigger = 1 << 6,
    #[display("X")]
    Execute = 1 << 7,
    #[display("U")]
    Usage = 1 << 8,
    #[display("C")]
    Create = 1 << 9,
    #[display("T")]
    CreateTemp = 1 << 10,
    #[display("c")]
    Connect = 1 << 11,
}

pub type AclModes = BitFlags<AclMode>;

pub const ACL_NO_RIGHTS: AclModes = BitFlags::EMPTY;
pub const ACL_ALL_RIGHTS_STR: &str = "arwdDxtXUCTc";

pub const ACL_ALL_RIGHTS_COLUMN: AclModes =
    make_bitflags!(AclMode::{Insert | Select | Update | References});
pub const ACL_ALL_RIGHTS_RELATION: AclModes = make_bitflags!(AclMode::{
    Insert | Select | Update | Delete | Truncate | References | Trigger
});
pub const ACL_ALL_RIGHTS_SEQUENCE: AclModes = make_bitflags!(AclMode::{Usage | Select | Update});
pub const ACL_ALL_RIGHTS_DATABASE: AclModes =
    make_bitflags!(AclMode::{Create | CreateTemp | Connect});
pub const ACL_ALL_RIGHTS_FDW: AclModes = make_bitflags!(AclMode::{Usage});
pub const ACL_ALL_RIGHTS_FOREIGN_SERVER: AclModes = make_bitflags!(AclMode::{Usage});
pub const ACL_ALL_RIGHTS_FUNCTION: AclModes = make_bitflags!(AclMode::{Execute});
pub const ACL_ALL_RIGHTS_LANGUAGE: AclModes = make_bitflags!(AclMode::{Usage});
pub const ACL_ALL_RIGHTS_LARGEOBJECT: AclModes = make_bitflags!(AclMode::{Select | Update});
pub const ACL_ALL_RIGHTS_SCHEMA: AclModes = make_bitflags!(AclMode::{Usage | Create});
pub const ACL_ALL_RIGHTS_TABLESPACE: AclModes = make_bitflags!(AclMode::{Create});
pub const ACL_ALL_RIGHTS_TYPE: AclModes = make_bitflags!(AclMode::{Usage});

impl AclMode {
    pub fn name(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Select => "SELECT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::References => "REFERENCES",
            Self::Trigger => "TRIGGER",
            Self::Execute => "EXECUTE",
            Self::Usage => "USAGE",
            Self::Create => "CREATE",
            Self::CreateTemp => "TEMP",
            Self::Connect => "CONNECT",
        }
    }
}

/// Parses a privilege keyword. The obsolete `RULE` privilege is accepted
/// and maps to no bits at all.
pub fn string_to_privilege(name: &str) -> Result<AclModes, AclError> {
    let mode = match name.trim().to_ascii_lowercase().as_str() {
        "insert" => AclMode::Insert,
        "select" => AclMode::Select,
        "update" => AclMode::Update,
        "delete" => AclMode::Delete,
        "truncate" => AclMode::Truncate,
        "references" => AclMode::References,
        "trigger" => AclMode::Trigger,
        "execute" => AclMode::Execute,
        "usage" => AclMode::Usage,
        "create" => AclMode::Create,
        "temporary" | "temp" => AclMode::CreateTemp,
        "connect" => AclMode::Connect,
        "rule" => return Ok(ACL_NO_RIGHTS),
        _ => {
            return Err(AclError::Syntax(format!(
                "unrecognized privilege type \"{name}\""
            )))
        }
    };
    Ok(mode.into())
}

/// Comma-separated keyword list, e.g. `SELECT, UPDATE`.
pub fn privilege_to_string(privileges: AclModes) -> String {
    privileges.iter().map(AclMode::name).join(", ")
}

/// Hard-wired whole mask for an object kind: every privilege it may carry.
pub fn whole_mask(objtype: ObjectType) -> AclModes {
    match objtype {
        ObjectType::Table
        | ObjectType::View
        | ObjectType::MaterializedView
        | ObjectType::ForeignTable => ACL_ALL_RIGHTS_RELATION,
        ObjectType::Sequence => ACL_ALL_RIGHTS_SEQUENCE,
        ObjectType::Column => ACL_ALL_RIGHTS_COLUMN,
        ObjectType::Database => ACL_ALL_RIGHTS_DATABASE,
        ObjectType::Domain | ObjectType::Type => ACL_ALL_RIGHTS_TYPE,
        ObjectType::ForeignDataWrapper => ACL_ALL_RIGHTS_FDW,
        ObjectType::ForeignServer => ACL_ALL_RIGHTS_FOREIGN_SERVER,
        ObjectType::Function | ObjectType::Procedure | ObjectType::Routine => {
            ACL_ALL_RIGHTS_FUNCTION
        }
        ObjectType::Language => ACL_ALL_RIGHTS_LANGUAGE,
        ObjectType::LargeObject => ACL_ALL_RIGHTS_LARGEOBJECT,
        ObjectType::Schema => ACL_ALL_RIGHTS_SCHEMA,
        ObjectType::Tablespace => ACL_ALL_RIGHTS_TABLESPACE,
        ObjectType::Index => ACL_NO_RIGHTS,
    }
}

/// A privilege set paired with the grant options held for it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AclRights {
    pub privs: AclModes,
    pub goptions: AclModes,
}

impl AclRights {
    pub const NONE: Self = Self {
        privs: ACL_NO_RIGHTS,
        goptions: ACL_NO_RIGHTS,
    };

    pub fn new(privs: AclModes, goptions: AclModes) -> Self {
        Self { privs, goptions }
    }

    pub fn privileges(privs: AclModes) -> Self {
        Self::new(privs, ACL_NO_RIGHTS)
    }

    /// Only the grant options for `privs`, not the privileges themselves.
    pub fn grant_options_for(privs: AclModes) -> Self {
        Self::new(ACL_NO_RIGHTS, privs)
    }

    pub fn with_grant_option(privs: AclModes) -> Self {
        Self::new(privs, privs)
    }

    pub fn is_empty(self) -> bool {
        self.privs.is_empty() && self.goptions.is_empty()
    }

    pub fn contains(self, other: Self) -> bool {
        self.privs.contains(other.privs) && self.goptions.contains(other.goptions)
    }

    /// Number of grant option bits; used to rank candidate grantors.
    pub fn option_count(self) -> usize {
        self.goptions.len()
    }
}

impl BitOr for AclRights {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self::new(self.privs | rhs.privs, self.goptions | rhs.goptions)
    }
}

impl BitOrAssign for AclRights {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

impl BitAnd for AclRights {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self::new(self.privs & rhs.privs, self.goptions & rhs.goptions)
    }
}

impl Sub for AclRights {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.privs & !rhs.privs, self.goptions & !rhs.goptions)
    }
}

impl fmt::Display for AclRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for mode in self.privs.iter() {
            write!(f, "{mode}")?;
            if self.goptions.contains(mode) {
                f.write_str("*")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclMaskHow {
    All,
    Any,
}

impl AclMaskHow {
    fn satisfied(self, result: AclRights, mask: AclRights) -> bool {
        match self {
            Self::All => result.contains(mask),
            Self::Any => !result.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChange {
    Add,
    Del,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropBehavior {
    #[default]
    Restrict,
    Cascade,
}

/// Role-graph lookups the ACL algebra depends on.
pub trait RoleMembership {
    /// Does `member` hold the privileges of `role`, directly or by
    /// inheritance?
    fn has_privs_of_role(&self, member: Oid, role: Oid) -> bool;
}

/// Name resolution for the aclitem text format.
pub trait RoleNames {
    fn role_name(&self, oid: Oid) -> Option<&str>;
    fn role_oid(&self, name: &str) -> Option<Oid>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AclItem {
    pub grantee: Oid,
    pub grantor: Oid,
    pub rights: AclRights,
}

impl AclItem {
    pub fn new(grantee: Oid, grantor: Oid, rights: AclRights) -> Self {
        Self {
            grantee,
            grantor,
            rights,
        }
    }

    fn same_pair(&self, other: &Self) -> bool {
        self.grantee == other.grantee && self.grantor == other.grantor
    }

    fn sort_key(&self) -> (Oid, Oid, u16, u16) {
        (
            self.grantee,
            self.grantor,
            self.rights.privs.bits(),
            self.rights.goptions.bits(),
        )
    }

    pub fn to_text(&self, names: &dyn RoleNames) -> String {
        let grantee = if self.grantee == ACL_ID_PUBLIC {
            String::new()
        } else {
            role_text(self.grantee, names)
        };
        format!(
            "{grantee}={}/{}",
            self.rights,
            role_text(self.grantor, names)
        )
    }

    /// Parses `grantee=privs/grantor`. An empty grantee means PUBLIC; a
    /// missing grantor defaults to the bootstrap superuser.
    pub fn parse(text: &str, names: &dyn RoleNames) -> Result<Self, AclError> {
        let Some((grantee_text, rest)) = text.trim().split_once('=') else {
            return Err(AclError::InvalidTextRepresentation(
                "missing \"=\" sign".to_string(),
            ));
        };
        let grantee = match grantee_text.trim() {
            "" => ACL_ID_PUBLIC,
            name => lookup_role(name, names)?,
        };
        let (privs_text, grantor_text) = match rest.split_once('/') {
            Some((privs, grantor)) => (privs, Some(grantor.trim())),
            None => (rest, None),
        };

        let mut rights = AclRights::NONE;
        let mut last: Option<AclMode> = None;
        for ch in privs_text.trim().chars() {
            if ch == '*' {
                if let Some(mode) = last {
                    rights.goptions |= mode;
                    continue;
                }
            }
            let Ok(mode) = ch.to_string().parse::<AclMode>() else {
                return Err(AclError::InvalidTextRepresentation(format!(
                    "invalid mode character: must be one of \"{ACL_ALL_RIGHTS_STR}\""
                )));
            };
            rights.privs |= mode;
            last = Some(mode);
        }
        if grantee == ACL_ID_PUBLIC && !rights.goptions.is_empty() {
            return Err(AclError::invalid_grant(
                "a grant option can only be granted to a role",
            ));
        }

        let grantor = match grantor_text {
            Some("") => {
                return Err(AclError::InvalidTextRepresentation(
                    "a name must follow the \"/\" sign".to_string(),
                ))
            }
            Some(name) => lookup_role(name, names)?,
            None => {
                tracing::warn!("defaulting grantor to user ID {BOOTSTRAP_SUPERUSERID}");
                BOOTSTRAP_SUPERUSERID
            }
        };
        Ok(Self::new(grantee, grantor, rights))
    }
}

impl fmt::Display for AclItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.grantee != ACL_ID_PUBLIC {
            write!(f, "{}", self.grantee)?;
        }
        write!(f, "={}/{}", self.rights, self.grantor)
    }
}

fn role_text(oid: Oid, names: &dyn RoleNames) -> String {
    match names.role_name(oid) {
        Some(name) => name.to_string(),
        None => oid.to_string(),
    }
}

fn lookup_role(name: &str, names: &dyn RoleNames) -> Result<Oid, AclError> {
    let name = name.trim().trim_matches('"');
    names
        .role_oid(name)
        .ok_or_else(|| AclError::UndefinedObject(format!("role \"{name}\" does not exist")))
}

/// Access control list. Equality ignores entry order.
#[derive(Debug, Clone, Default)]
pub struct Acl {
    items: Vec<AclItem>,
}

impl PartialEq for Acl {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len() && self.clone().sorted().items == other.clone().sorted().items
    }
}

impl Eq for Acl {}

impl FromIterator<AclItem> for Acl {
    fn from_iter<I: IntoIterator<Item = AclItem>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl Acl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[AclItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Canonical order: grantee, then grantor.
    pub fn sorted(mut self) -> Self {
        self.items.sort_by_key(AclItem::sort_key);
        self
    }

    pub fn concat(left: &Acl, right: &Acl) -> Acl {
        left.items.iter().chain(right.items.iter()).copied().collect()
    }

    /// Roles mentioned as grantee or grantor, sorted and de-duplicated.
    /// PUBLIC is not a role and is left out.
    pub fn members(&self) -> Vec<Oid> {
        self.items
            .iter()
            .flat_map(|item| [item.grantee, item.grantor])
            .filter(|oid| *oid != ACL_ID_PUBLIC)
            .sorted()
            .dedup()
            .collect()
    }

    pub fn mentions_role(&self, role: Oid) -> bool {
        self.items
            .iter()
            .any(|item| item.grantee == role || item.grantor == role)
    }

    /// Applies one modification, folding it into the matching
    /// (grantee, grantor) entry. Entries left without rights are removed;
    /// lost grant options trigger a cascading revoke.
    pub fn update(
        mut self,
        mod_item: &AclItem,
        modechg: ModeChange,
        owner: Oid,
        behavior: DropBehavior,
        roles: &dyn RoleMembership,
    ) -> Result<Acl, AclError> {
        if modechg == ModeChange::Add && !mod_item.rights.goptions.is_empty() {
            check_circularity(&self, mod_item, owner, roles)?;
        }

        let idx = match self.items.iter().position(|item| item.same_pair(mod_item)) {
            Some(idx) => idx,
            None => {
                self.items.push(AclItem::new(
                    mod_item.grantee,
                    mod_item.grantor,
                    AclRights::NONE,
                ));
                self.items.len() - 1
            }
        };

        let old_goptions = self.items[idx].rights.goptions;
        let rights = &mut self.items[idx].rights;
        *rights = match modechg {
            ModeChange::Add => *rights | mod_item.rights,
            ModeChange::Del => *rights - mod_item.rights,
        };
        let new_goptions = rights.goptions;

        if self.items[idx].rights.is_empty() {
            self.items.remove(idx);
        }

        let lost = old_goptions & !new_goptions;
        if !lost.is_empty() {
            debug_assert_ne!(mod_item.grantee, ACL_ID_PUBLIC);
            self = recursive_revoke(self, mod_item.grantee, lost, owner, behavior, roles)?;
        }
        Ok(self)
    }

    /// Privileges `roleid` holds out of `mask`, counting PUBLIC entries,
    /// entries of roles whose privileges it inherits, and the owner's
    /// implicit grant options.
    pub fn mask(
        &self,
        roleid: Oid,
        owner: Oid,
        mask: AclRights,
        how: AclMaskHow,
        roles: &dyn RoleMembership,
    ) -> AclRights {
        if mask.is_empty() {
            return AclRights::NONE;
        }
        let mut result = AclRights::NONE;

        if !mask.goptions.is_empty() && roles.has_privs_of_role(roleid, owner) {
            result = AclRights::grant_options_for(mask.goptions);
            if how.satisfied(result, mask) {
                return result;
            }
        }

        for item in &self.items {
            if item.grantee == ACL_ID_PUBLIC || item.grantee == roleid {
                result |= item.rights & mask;
                if how.satisfied(result, mask) {
                    return result;
                }
            }
        }

        // Inherited entries are costlier to test, so they go last.
        let mut remaining = mask - result;
        for item in &self.items {
            if item.grantee == ACL_ID_PUBLIC || item.grantee == roleid {
                continue;
            }
            if (item.rights & remaining).is_empty() {
                continue;
            }
            if roles.has_privs_of_role(roleid, item.grantee) {
                result |= item.rights & mask;
                if how.satisfied(result, mask) {
                    return result;
                }
                remaining = mask - result;
            }
        }
        result
    }

    /// Like [`Acl::mask`] but only entries naming `roleid` itself count.
    pub fn mask_direct(
        &self,
        roleid: Oid,
        owner: Oid,
        mask: AclRights,
        how: AclMaskHow,
    ) -> AclRights {
        if mask.is_empty() {
            return AclRights::NONE;
        }
        let mut result = AclRights::NONE;
        if !mask.goptions.is_empty() && roleid == owner {
            result = AclRights::grant_options_for(mask.goptions);
            if how.satisfied(result, mask) {
                return result;
            }
        }
        for item in self.items.iter().filter(|item| item.grantee == roleid) {
            result |= item.rights & mask;
            if how.satisfied(result, mask) {
                return result;
            }
        }
        result
    }

    /// Union of two ACLs; `None` stands for "no ACL at all".
    pub fn merge(
        left: Option<&Acl>,
        right: Option<&Acl>,
        owner: Oid,
        roles: &dyn RoleMembership,
    ) -> Result<Option<Acl>, AclError> {
        match (left, right) {
            (None, None) => Ok(None),
            (Some(acl), None) | (None, Some(acl)) => Ok(Some(acl.clone())),
            (Some(left), Some(right)) => {
                let mut result = left.clone();
                for item in &right.items {
                    result =
                        result.update(item, ModeChange::Add, owner, DropBehavior::Restrict, roles)?;
                }
                Ok(Some(result))
            }
        }
    }

    /// Rewrites every mention of `old_owner` to `new_owner` and folds any
    /// (grantee, grantor) duplicates that creates.
    pub fn with_new_owner(&self, old_owner: Oid, new_owner: Oid) -> Acl {
        let mut items = self.items.clone();
        let mut changed = false;
        for item in &mut items {
            if item.grantee == old_owner {
                item.grantee = new_owner;
                changed = true;
            }
            if item.grantor == old_owner {
                item.grantor = new_owner;
                changed = true;
            }
        }
        if !changed {
            return self.clone();
        }

        let mut folded: Vec<AclItem> = Vec::with_capacity(items.len());
        for item in items {
            if item.rights.is_empty() {
                continue;
            }
            match folded.iter_mut().find(|existing| existing.same_pair(&item)) {
                Some(existing) => existing.rights |= item.rights,
                None => folded.push(item),
            }
        }
        Acl { items: folded }
    }

    pub fn to_text(&self, names: &dyn RoleNames) -> String {
        format!(
            "{{{}}}",
            self.items.iter().map(|item| item.to_text(names)).join(",")
        )
    }

    /// Parses `{item,item,...}`; the braces are optional.
    pub fn parse(text: &str, names: &dyn RoleNames) -> Result<Acl, AclError> {
        let inner = text.trim();
        let inner = inner
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .unwrap_or(inner);
        inner
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| AclItem::parse(part, names))
            .collect()
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.items.iter().join(","))
    }
}

/// Refuses grants that would hand a grant option back up the chain it came
/// down, which would leave grants nobody can revoke.
fn check_circularity(
    old_acl: &Acl,
    mod_item: &AclItem,
    owner: Oid,
    roles: &dyn RoleMembership,
) -> Result<(), AclError> {
    if mod_item.rights.goptions.is_empty() || mod_item.grantor == owner {
        return Ok(());
    }

    // Zap every grant option the target grantee holds, plus whatever was
    // granted on the strength of those options.
    let mut acl = old_acl.clone();
    while let Some(item) = acl
        .items
        .iter()
        .find(|item| item.grantee == mod_item.grantee && !item.rights.goptions.is_empty())
        .copied()
    {
        let zap = AclItem::new(
            item.grantee,
            item.grantor,
            AclRights::grant_options_for(item.rights.goptions),
        );
        acl = acl.update(&zap, ModeChange::Del, owner, DropBehavior::Cascade, roles)?;
    }

    let own = acl
        .mask(
            mod_item.grantor,
            owner,
            AclRights::grant_options_for(mod_item.rights.goptions),
            AclMaskHow::All,
            roles,
        )
        .goptions;
    if !(mod_item.rights.goptions & !own).is_empty() {
        return Err(AclError::invalid_grant(
            "grant options cannot be granted back to your own grantor",
        ));
    }
    Ok(())
}

/// `grantee` just lost the grant options in `revoke_privs`; take back
/// whatever it granted with them unless it still holds them another way.
fn recursive_revoke(
    mut acl: Acl,
    grantee: Oid,
    revoke_privs: AclModes,
    owner: Oid,
    behavior: DropBehavior,
    roles: &dyn RoleMembership,
) -> Result<Acl, AclError> {
    // The owner always holds every grant option.
    if grantee == owner {
        return Ok(acl);
    }
    // Options still held through another grantor keep their dependents.
    let still_held = acl.mask(
        grantee,
        owner,
        AclRights::grant_options_for(revoke_privs),
        AclMaskHow::All,
        roles,
    );
    let revoke_privs = revoke_privs & !still_held.goptions;
    if revoke_privs.is_empty() {
        return Ok(acl);
    }

    while let Some(item) = acl
        .items
        .iter()
        .find(|item| item.grantor == grantee && !(item.rights.privs & revoke_privs).is_empty())
        .copied()
    {
        if behavior == DropBehavior::Restrict {
            return Err(AclError::DependentObjectsStillExist {
                message: "dependent privileges exist".to_string(),
                detail: None,
                hint: Some("Use CASCADE to revoke them too.".to_string()),
            });
        }
        let mod_item = AclItem::new(
            item.grantee,
            grantee,
            AclRights::with_grant_option(revoke_privs),
        );
        acl = acl.update(&mod_item, ModeChange::Del, owner, behavior, roles)?;
    }
    Ok(acl)
}

/// Built-in ACL an object has while its ACL column is NULL.
///
/// The owner's entry lists plain privileges only: its grant options come
/// from ownership itself, see [`Acl::mask`].
pub fn acldefault(objtype: ObjectType, owner: Oid) -> Acl {
    let (world_default, owner_default) = match objtype {
        ObjectType::Column => (ACL_NO_RIGHTS, ACL_NO_RIGHTS),
        ObjectType::Database => (
            make_bitflags!(AclMode::{CreateTemp | Connect}),
            ACL_ALL_RIGHTS_DATABASE,
        ),
        ObjectType::Function | ObjectType::Procedure | ObjectType::Routine => {
            (ACL_ALL_RIGHTS_FUNCTION, ACL_ALL_RIGHTS_FUNCTION)
        }
        ObjectType::Language => (ACL_ALL_RIGHTS_LANGUAGE, ACL_ALL_RIGHTS_LANGUAGE),
        ObjectType::Domain | ObjectType::Type => (ACL_ALL_RIGHTS_TYPE, ACL_ALL_RIGHTS_TYPE),
        other => (ACL_NO_RIGHTS, whole_mask(other)),
    };

    let mut items = Vec::with_capacity(2);
    if !world_default.is_empty() {
        items.push(AclItem::new(
            ACL_ID_PUBLIC,
            owner,
            AclRights::privileges(world_default),
        ));
    }
    if !owner_default.is_empty() {
        items.push(AclItem::new(
            owner,
            owner,
            AclRights::privileges(owner_default),
        ));
    }
    Acl { items }
}

/// Folds one GRANT or REVOKE for several grantees into `old_acl`.
///
/// GRANT gives the plain privileges, plus their options under WITH GRANT
/// OPTION. Plain REVOKE removes privileges and options together, while
/// REVOKE GRANT OPTION FOR removes only the options.
#[allow(clippy::too_many_arguments)]
pub fn merge_acl_with_grant(
    old_acl: Acl,
    is_grant: bool,
    grant_option: bool,
    behavior: DropBehavior,
    grantees: &[Oid],
    privileges: AclModes,
    grantor: Oid,
    owner: Oid,
    roles: &dyn RoleMembership,
) -> Result<Acl, AclError> {
    // Someone re-granting a privilege held only through PUBLIC could never
    // be cleaned up after, so PUBLIC never gets grant options.
    if is_grant && grant_option && grantees.contains(&ACL_ID_PUBLIC) {
        return Err(AclError::invalid_grant(
            "grant options can only be granted to roles",
        ));
    }

    let modechg = if is_grant {
        ModeChange::Add
    } else {
        ModeChange::Del
    };
    let privs = if is_grant || !grant_option {
        privileges
    } else {
        ACL_NO_RIGHTS
    };
    let goptions = if !is_grant || grant_option {
        privileges
    } else {
        ACL_NO_RIGHTS
    };

    let mut acl = old_acl;
    for &grantee in grantees {
        let item = AclItem::new(grantee, grantor, AclRights::new(privs, goptions));
        acl = acl.update(&item, modechg, owner, behavior, roles)?;
    }
    Ok(acl)
}
