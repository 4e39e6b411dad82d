use thiserror::Error;

/// Failures of schema compilation or of structurally accessing the
/// document during validation.
///
/// Rule violations are never reported through this type; they accumulate
/// in the `errors` array of the validation report.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A keyword's value has the wrong shape (`required` not an array of
    /// strings, `minimum` not a number, ...).
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// A `pattern` or `patternProperties` regex failed to compile.
    #[error("invalid regular expression `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Value access failed (operation unsupported for the kind, bad
    /// index, ...).
    #[error(transparent)]
    Value(#[from] dynjson_value::Error),

    /// Reference expansion failed (bad URI, unreachable document, bad
    /// pointer).
    #[error(transparent)]
    Referencing(#[from] dynjson_referencing::Error),
}
