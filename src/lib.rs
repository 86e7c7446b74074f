#![allow(
    clippy::module_name_repetitions,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::similar_names,
    clippy::match_same_arms,
    clippy::missing_errors_doc
)]

//! Access control for the postgrust catalog: ACL values and their merge
//! rules, privilege evaluation, GRANT/REVOKE, default privileges and the
//! initial privileges of extension objects.

pub mod catalog;
pub mod commands;
pub mod config;
pub mod error;
pub mod security;

pub use catalog::oid::Oid;
pub use catalog::{Catalog, ObjectAddress, ObjectClass, ObjectType};
pub use commands::{CommandResult, RoleSpec};
pub use config::AclSettings;
pub use error::AclError;
pub use security::{Notice, Notices, SessionContext};
