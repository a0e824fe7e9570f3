use std::error::Error as StdError;
use thiserror::Error;

pub type LinqResult<T> = Result<T, LinqError>;

/// Errors raised while composing or executing a query.
///
/// Argument errors surface when a pipeline is built; everything else surfaces from the call that
/// pulled the failing element (`move_next`, `to_vec`, `count`, ...), after every cursor the
/// failing stage had opened has been closed.
#[derive(Debug, Error)]
pub enum LinqError {
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("arithmetic overflow in {operation}")]
    Overflow { operation: &'static str },

    /// A caller-supplied closure or source failed. The underlying error is kept as is.
    #[error(transparent)]
    Transform(Box<dyn StdError + Send + Sync>),
}

impl LinqError {
    /// Wrap an error raised by user code so it can travel through the pipeline unchanged.
    pub fn transform<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        LinqError::Transform(err.into())
    }

    pub(crate) fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        LinqError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn overflow(operation: &'static str) -> Self {
        LinqError::Overflow { operation }
    }

    pub(crate) fn no_elements() -> Self {
        LinqError::InvalidOperation("sequence contains no elements".into())
    }

    pub(crate) fn no_current() -> Self {
        LinqError::InvalidOperation("enumerator is not positioned on an element".into())
    }

    /// The user error carried by a [`LinqError::Transform`], if any.
    pub fn transform_source(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            LinqError::Transform(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

pub(crate) fn checked_add(a: usize, b: usize, operation: &'static str) -> LinqResult<usize> {
    a.checked_add(b).ok_or_else(|| LinqError::overflow(operation))
}
