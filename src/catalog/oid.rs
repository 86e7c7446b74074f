pub type Oid = u32;

pub const INVALID_OID: Oid = 0;

/// Grantee id standing for PUBLIC in ACL entries.
pub const ACL_ID_PUBLIC: Oid = 0;

pub const BOOTSTRAP_SUPERUSERID: Oid = 10;
pub const PG_CATALOG_NAMESPACE: Oid = 11;
pub const PG_PUBLIC_NAMESPACE: Oid = 2200;
pub const TEMPLATE1_DATABASE: Oid = 1;
pub const POSTGRES_DATABASE: Oid = 5;
pub const DEFAULT_TABLESPACE: Oid = 1663;
pub const GLOBAL_TABLESPACE: Oid = 1664;

pub const INTERNAL_LANGUAGE: Oid = 12;
pub const C_LANGUAGE: Oid = 13;
pub const SQL_LANGUAGE: Oid = 14;

pub const CHAR_TYPE: Oid = 18;
pub const NAME_TYPE: Oid = 19;
pub const INT4_TYPE: Oid = 23;
pub const TEXT_TYPE: Oid = 25;
pub const INT4_ARRAY_TYPE: Oid = 1007;
pub const TEXT_ARRAY_TYPE: Oid = 1009;

pub const PG_CLASS_RELATION: Oid = 1259;
pub const PG_ROLES_VIEW: Oid = 12_001;

pub const ROLE_PG_READ_ALL_DATA: Oid = 6181;
pub const ROLE_PG_WRITE_ALL_DATA: Oid = 6182;

pub const FIRST_NORMAL_OID: Oid = 16_384;

#[derive(Debug, Clone)]
pub struct OidGenerator {
    next: Oid,
}

impl Default for OidGenerator {
    fn default() -> Self {
        Self::new(FIRST_NORMAL_OID)
    }
}

impl OidGenerator {
    pub const fn new(start: Oid) -> Self {
        Self { next: start }
    }

    /// Hands out the next normal OID, wrapping back to `FIRST_NORMAL_OID`
    /// instead of ever reissuing a bootstrap OID.
    pub fn next_oid(&mut self) -> Oid {
        let oid = self.next;
        self.next = match self.next.checked_add(1) {
            Some(next) => next,
            None => FIRST_NORMAL_OID,
        };
        oid
    }
}
