use derive_more::Display;
use querybatch_core::{
    config::ConfigError,
    error::{ErrorClass, ErrorOrigin as CoreErrorOrigin, InternalError},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Debug, Deserialize, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }

    /// The caller drove the batch protocol out of order.
    #[must_use]
    pub const fn is_misuse(&self) -> bool {
        matches!(self.kind, ErrorKind::Misuse)
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        Self::new(err.class.into(), err.origin.into(), err.message)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        InternalError::from(err).into()
    }
}

///
/// ErrorKind
/// Public error taxonomy for callers.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    /// Protocol misuse: second execute, results before execute, bad handle.
    Misuse,

    /// The provider, cursor or session failed while running commands.
    Execution,

    /// Rejected configuration or unsupported request.
    Unsupported,

    /// Duplicate item key.
    Conflict,

    /// Unknown item key.
    NotFound,

    /// The caller cannot remediate this.
    Internal,
}

impl From<ErrorClass> for ErrorKind {
    fn from(class: ErrorClass) -> Self {
        match class {
            ErrorClass::InvariantViolation => Self::Misuse,
            ErrorClass::Execution => Self::Execution,
            ErrorClass::Unsupported => Self::Unsupported,
            ErrorClass::Conflict => Self::Conflict,
            ErrorClass::NotFound => Self::NotFound,
            ErrorClass::Internal => Self::Internal,
        }
    }
}

///
/// ErrorOrigin
/// Public origin taxonomy for callers.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum ErrorOrigin {
    Batch,
    Item,
    Cursor,
    Cache,
    Session,
    Provider,
    Config,
}

impl From<CoreErrorOrigin> for ErrorOrigin {
    fn from(origin: CoreErrorOrigin) -> Self {
        match origin {
            CoreErrorOrigin::Batch => Self::Batch,
            CoreErrorOrigin::Item => Self::Item,
            CoreErrorOrigin::Cursor => Self::Cursor,
            CoreErrorOrigin::Cache => Self::Cache,
            CoreErrorOrigin::Session => Self::Session,
            CoreErrorOrigin::Provider => Self::Provider,
            CoreErrorOrigin::Config => Self::Config,
        }
    }
}
