use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Not a stable API; the facade crate maps it onto its public error.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a batch-origin protocol violation.
    pub(crate) fn batch_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Batch,
            message.into(),
        )
    }

    /// Construct an item-origin protocol violation.
    pub fn item_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Item,
            message.into(),
        )
    }

    /// Construct a cursor-origin protocol violation.
    pub fn cursor_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Cursor,
            message.into(),
        )
    }

    /// Construct a provider-origin execution failure.
    pub fn provider_execution(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Execution, ErrorOrigin::Provider, message.into())
    }

    /// Construct a cursor-origin execution failure.
    pub fn cursor_execution(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Execution, ErrorOrigin::Cursor, message.into())
    }

    /// Construct a session-origin execution failure (flush, connection).
    pub fn session_execution(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Execution, ErrorOrigin::Session, message.into())
    }

    /// Construct a cache-origin internal error.
    pub fn cache_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Cache, message.into())
    }

    /// Construct an item-origin internal error, used by row mappers.
    pub fn item_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Item, message.into())
    }

    pub(crate) fn item_key_conflict(key: &str) -> Self {
        Self::new(
            ErrorClass::Conflict,
            ErrorOrigin::Batch,
            format!("duplicate batch item key: '{key}'"),
        )
    }

    pub(crate) fn item_key_not_found(key: &str) -> Self {
        Self::new(
            ErrorClass::NotFound,
            ErrorOrigin::Batch,
            format!("unknown batch item key: '{key}'"),
        )
    }

    #[must_use]
    pub const fn is_protocol_misuse(&self) -> bool {
        matches!(self.class, ErrorClass::InvariantViolation)
    }

    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self.class, ErrorClass::Execution)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// Protocol misuse: the caller or an item broke the batching contract.
    InvariantViolation,
    /// The backend failed to run a command or produce a cursor.
    Execution,
    Unsupported,
    Conflict,
    NotFound,
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvariantViolation => "invariant_violation",
            Self::Execution => "execution",
            Self::Unsupported => "unsupported",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Batch,
    Item,
    Cursor,
    Cache,
    Session,
    Provider,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Batch => "batch",
            Self::Item => "item",
            Self::Cursor => "cursor",
            Self::Cache => "cache",
            Self::Session => "session",
            Self::Provider => "provider",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}
