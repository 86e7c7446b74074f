//! `pg_init_privs`: the ACLs objects had when their extension put them in
//! place, so that later changes by an administrator can be told apart.

use crate::catalog::{
    missing_object, Catalog, InitPrivEntry, InitPrivKey, InitPrivsType, ObjectAddress,
    ObjectClass, RelKind,
};
use crate::error::AclError;

use super::acl::Acl;
use super::{RecordingMode, SessionContext};

fn key_of(addr: ObjectAddress) -> InitPrivKey {
    InitPrivKey {
        object_id: addr.object_id,
        class: addr.class,
        sub_id: addr.sub_id,
    }
}

fn recording_type(mode: RecordingMode) -> Option<InitPrivsType> {
    match mode {
        RecordingMode::Off => None,
        RecordingMode::CreatingExtension(_) => Some(InitPrivsType::Extension),
        RecordingMode::BinaryUpgrade => Some(InitPrivsType::BinaryUpgrade),
    }
}

/// Replaces the stored initial ACL of one object or column. `None` deletes
/// the row.
fn record_init_priv_worker(
    catalog: &mut Catalog,
    addr: ObjectAddress,
    acl: Option<&Acl>,
    privtype: InitPrivsType,
) {
    let key = key_of(addr);
    match acl {
        Some(acl) => {
            tracing::debug!(?addr, ?privtype, "recording initial privileges");
            catalog.set_init_priv(
                key,
                InitPrivEntry {
                    privtype,
                    acl: acl.clone(),
                },
            );
        }
        None => {
            catalog.remove_init_priv(&key);
        }
    }
}

/// Called after every ACL change. Does nothing unless the session is
/// creating an extension or replaying one under binary upgrade.
pub fn record_extension_init_priv(
    catalog: &mut Catalog,
    session: &SessionContext,
    addr: ObjectAddress,
    acl: Option<&Acl>,
) {
    if let Some(privtype) = recording_type(session.recording) {
        record_init_priv_worker(catalog, addr, acl, privtype);
    }
}

/// Snapshots the current ACL of an object joining an extension, and of its
/// live columns for relations. NULL ACLs are not recorded.
pub fn record_ext_obj_init_priv(
    catalog: &mut Catalog,
    addr: ObjectAddress,
    privtype: InitPrivsType,
) -> Result<(), AclError> {
    if addr.class == ObjectClass::Relation {
        let rel = catalog
            .relation(addr.object_id)
            .ok_or_else(|| missing_object(ObjectClass::Relation, addr.object_id))?;
        // Neither has privileges of its own.
        if matches!(rel.kind, RelKind::Index | RelKind::CompositeType) {
            return Ok(());
        }
        if rel.kind != RelKind::Sequence {
            let columns: Vec<(i16, Acl)> = rel
                .user_columns()
                .filter(|col| !col.dropped)
                .filter_map(|col| col.acl.clone().map(|acl| (col.attnum, acl)))
                .collect();
            for (attnum, acl) in columns {
                record_init_priv_worker(
                    catalog,
                    ObjectAddress::column(addr.object_id, attnum),
                    Some(&acl),
                    privtype,
                );
            }
        }
    }

    let acl = catalog.get_acl(ObjectAddress::new(addr.class, addr.object_id))?;
    if let Some(acl) = acl {
        record_init_priv_worker(
            catalog,
            ObjectAddress::new(addr.class, addr.object_id),
            Some(&acl),
            privtype,
        );
    }
    Ok(())
}

/// Forgets the initial ACLs of an object leaving its extension. Dropped
/// columns are cleared too so that no row is left behind.
pub fn remove_ext_obj_init_priv(catalog: &mut Catalog, addr: ObjectAddress) -> Result<(), AclError> {
    if addr.class == ObjectClass::Relation {
        let rel = catalog
            .relation(addr.object_id)
            .ok_or_else(|| missing_object(ObjectClass::Relation, addr.object_id))?;
        if matches!(rel.kind, RelKind::Index | RelKind::CompositeType) {
            return Ok(());
        }
        if rel.kind != RelKind::Sequence {
            let attnums: Vec<i16> = rel.user_columns().map(|col| col.attnum).collect();
            for attnum in attnums {
                catalog.remove_init_priv(&key_of(ObjectAddress::column(addr.object_id, attnum)));
            }
        }
    }
    catalog.remove_init_priv(&key_of(ObjectAddress::new(addr.class, addr.object_id)));
    Ok(())
}

/// `binary_upgrade_set_record_init_privs(bool)`: only pg_upgrade may flip
/// recording on outside of CREATE EXTENSION.
pub fn binary_upgrade_set_record_init_privs(
    session: &mut SessionContext,
    record: bool,
) -> Result<(), AclError> {
    if !session.settings.binary_upgrade {
        return Err(AclError::CantChangeRuntimeParam(
            "function can only be called when server is in binary upgrade mode".to_string(),
        ));
    }
    if record {
        session.recording = RecordingMode::BinaryUpgrade;
    } else if session.recording == RecordingMode::BinaryUpgrade {
        session.recording = RecordingMode::Off;
    }
    tracing::debug!(record, "binary upgrade init-privs recording toggled");
    Ok(())
}
