use thiserror::Error;

/// Errors raised while evaluating or changing privileges. Every variant
/// aborts the enclosing statement; warnings travel separately as
/// [`Notice`](crate::security::Notice) values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AclError {
    #[error("{0}")]
    Syntax(String),
    #[error("{message}")]
    InvalidGrantOperation {
        message: String,
        hint: Option<String>,
    },
    #[error("{message}")]
    WrongObjectType {
        message: String,
        detail: Option<String>,
        hint: Option<String>,
    },
    #[error("{0}")]
    FeatureNotSupported(String),
    #[error("{0}")]
    UndefinedObject(String),
    #[error("{0}")]
    UndefinedTable(String),
    #[error("{0}")]
    UndefinedColumn(String),
    #[error("{0}")]
    UndefinedFunction(String),
    #[error("{0}")]
    UndefinedSchema(String),
    #[error("{0}")]
    UndefinedDatabase(String),
    #[error("{0}")]
    AmbiguousFunction(String),
    #[error("{0}")]
    DuplicateObject(String),
    #[error("{message}")]
    DependentObjectsStillExist {
        message: String,
        detail: Option<String>,
        hint: Option<String>,
    },
    #[error("{0}")]
    InsufficientPrivilege(String),
    #[error("{0}")]
    InvalidTextRepresentation(String),
    #[error("{0}")]
    ObjectNotInPrerequisiteState(String),
    #[error("{0}")]
    ObjectInUse(String),
    #[error("{0}")]
    CantChangeRuntimeParam(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AclError {
    pub fn wrong_object_type(message: impl Into<String>) -> Self {
        Self::WrongObjectType {
            message: message.into(),
            detail: None,
            hint: None,
        }
    }

    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrantOperation {
            message: message.into(),
            hint: None,
        }
    }

    pub fn sqlstate(&self) -> &'static str {
        match self {
            Self::Syntax(_) => "42601",
            Self::InvalidGrantOperation { .. } => "0LP01",
            Self::WrongObjectType { .. } => "42809",
            Self::FeatureNotSupported(_) => "0A000",
            Self::UndefinedObject(_) => "42704",
            Self::UndefinedTable(_) => "42P01",
            Self::UndefinedColumn(_) => "42703",
            Self::UndefinedFunction(_) => "42883",
            Self::UndefinedSchema(_) => "3F000",
            Self::UndefinedDatabase(_) => "3D000",
            Self::AmbiguousFunction(_) => "42725",
            Self::DuplicateObject(_) => "42710",
            Self::DependentObjectsStillExist { .. } => "2BP01",
            Self::InsufficientPrivilege(_) => "42501",
            Self::InvalidTextRepresentation(_) => "22P02",
            Self::ObjectNotInPrerequisiteState(_) => "55000",
            Self::ObjectInUse(_) => "55006",
            Self::CantChangeRuntimeParam(_) => "55P02",
            Self::Internal(_) => "XX000",
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::WrongObjectType { detail, .. } | Self::DependentObjectsStillExist { detail, .. } => {
                detail.as_deref()
            }
            _ => None,
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::WrongObjectType { hint, .. }
            | Self::DependentObjectsStillExist { hint, .. }
            | Self::InvalidGrantOperation { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }

    /// True for invariant violations that valid input can never reach.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}
