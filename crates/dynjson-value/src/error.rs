use thiserror::Error;

use crate::Kind;

/// Failures of the value engine itself.
///
/// These are the "programmer error" category: unsupported operations for a
/// value's kind, malformed input text, bad merge options. Schema violations
/// are never reported through this type; they are data in the validation
/// report.
#[derive(Debug, Error)]
pub enum Error {
    /// An operation was invoked on a value whose kind does not support it.
    #[error("unsupported operation `{operation}` on a {kind} value")]
    UnsupportedOperation {
        operation: &'static str,
        kind: Kind,
    },

    /// Array index out of range.
    #[error("index {index} out of range for array of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// The input text is not valid JSON. `index` is the character offset at
    /// which the problem was detected.
    #[error("syntax error at character {index}: {message}")]
    Syntax { index: usize, message: String },

    /// A JSON pointer could not be evaluated against the value it was
    /// applied to.
    #[error("cannot resolve pointer `{pointer}` on {target}")]
    Pointer { pointer: String, target: String },

    /// Malformed merge options passed to `with`.
    #[error("invalid merge options: {0}")]
    MergeOptions(String),

    /// The two sides of a merge (or of an ordered comparison inside one)
    /// have incompatible kinds.
    #[error("cannot {operation} a {left} value with a {right} value")]
    KindMismatch {
        operation: &'static str,
        left: Kind,
        right: Kind,
    },
}

impl Error {
    pub(crate) fn unsupported(operation: &'static str, kind: Kind) -> Self {
        Error::UnsupportedOperation { operation, kind }
    }

    pub(crate) fn syntax(index: usize, message: impl Into<String>) -> Self {
        Error::Syntax {
            index,
            message: message.into(),
        }
    }
}
