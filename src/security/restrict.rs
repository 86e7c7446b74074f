//! Narrowing a GRANT/REVOKE to what the grantor may actually pass on.

use crate::catalog::oid::Oid;
use crate::catalog::ObjectType;
use crate::error::AclError;

use super::acl::{whole_mask, AclMaskHow, AclModes, AclRights, ACL_ALL_RIGHTS_COLUMN};
use super::aclmask::{aclcheck_error, aclcheck_error_col, AclResult, PrivilegeEvaluator};
use super::{Notices, WARNING_PRIVILEGE_NOT_GRANTED, WARNING_PRIVILEGE_NOT_REVOKED};

/// The object a privilege change is aimed at. For a column, `objtype` is
/// the kind of the owning relation and `name` is the relation's name.
#[derive(Debug, Clone, Copy)]
pub struct RestrictTarget<'a> {
    pub objtype: ObjectType,
    pub object_id: Oid,
    pub name: &'a str,
    pub column: Option<(i16, &'a str)>,
}

impl<'a> RestrictTarget<'a> {
    pub fn object(objtype: ObjectType, object_id: Oid, name: &'a str) -> Self {
        Self {
            objtype,
            object_id,
            name,
            column: None,
        }
    }

    pub fn column(
        objtype: ObjectType,
        relation: Oid,
        relname: &'a str,
        attnum: i16,
        colname: &'a str,
    ) -> Self {
        Self {
            objtype,
            object_id: relation,
            name: relname,
            column: Some((attnum, colname)),
        }
    }

    fn describe(&self) -> String {
        match self.column {
            Some((_, colname)) => {
                format!("column \"{colname}\" of relation \"{}\"", self.name)
            }
            None => format!("\"{}\"", self.name),
        }
    }
}

/// Returns the subset of `privileges` the grantor holds grant options for.
///
/// A grantor with no options at all must still hold some privilege on the
/// object, or the statement fails with a permission error. An empty result
/// only warns. A narrowed result warns only when ALL PRIVILEGES was asked
/// for; narrowing an explicit list is silent.
#[allow(clippy::too_many_arguments)]
pub fn restrict_and_check_grant(
    evaluator: &PrivilegeEvaluator<'_>,
    notices: &mut Notices,
    is_grant: bool,
    avail_goptions: AclModes,
    all_privs: bool,
    privileges: AclModes,
    grantor: Oid,
    target: &RestrictTarget<'_>,
) -> Result<AclModes, AclError> {
    let whole = match target.column {
        Some(_) => ACL_ALL_RIGHTS_COLUMN,
        None => whole_mask(target.objtype),
    };

    if avail_goptions.is_empty() {
        let wanted = AclRights::with_grant_option(whole);
        let held = match target.column {
            // Table-level privileges count towards a column.
            Some((attnum, _)) => {
                evaluator.effective_privileges(
                    target.objtype,
                    target.object_id,
                    None,
                    grantor,
                    wanted,
                    AclMaskHow::Any,
                )? | evaluator.effective_privileges(
                    target.objtype,
                    target.object_id,
                    Some(attnum),
                    grantor,
                    wanted,
                    AclMaskHow::Any,
                )?
            }
            None => evaluator.effective_privileges(
                target.objtype,
                target.object_id,
                None,
                grantor,
                wanted,
                AclMaskHow::Any,
            )?,
        };
        if held.is_empty() {
            match target.column {
                Some((_, colname)) => {
                    aclcheck_error_col(AclResult::NoPriv, target.objtype, target.name, colname)?
                }
                None => aclcheck_error(AclResult::NoPriv, target.objtype, target.name)?,
            }
        }
    }

    let granted = privileges & avail_goptions;
    if granted.is_empty() {
        if is_grant {
            notices.warn(
                WARNING_PRIVILEGE_NOT_GRANTED,
                format!("no privileges were granted for {}", target.describe()),
            );
        } else {
            notices.warn(
                WARNING_PRIVILEGE_NOT_REVOKED,
                format!("no privileges could be revoked for {}", target.describe()),
            );
        }
    } else if all_privs && granted != privileges {
        if is_grant {
            notices.warn(
                WARNING_PRIVILEGE_NOT_GRANTED,
                format!("not all privileges were granted for {}", target.describe()),
            );
        } else {
            notices.warn(
                WARNING_PRIVILEGE_NOT_REVOKED,
                format!("not all privileges could be revoked for {}", target.describe()),
            );
        }
    }
    Ok(granted)
}
