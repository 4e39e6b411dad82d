use thiserror::Error;

/// Failures of reference resolution.
#[derive(Debug, Error)]
pub enum Error {
    /// The referenced or base URI could not be parsed.
    #[error("invalid uri `{uri}`: {reason}")]
    InvalidUri { uri: String, reason: String },

    /// A relative reference was used without any base URI to resolve it
    /// against.
    #[error("relative reference `{reference}` requires a base uri")]
    NoBase { reference: String },

    /// The retriever failed to produce a document.
    #[error("failed to retrieve `{uri}`: {source}")]
    Retrieval {
        uri: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The default retriever only understands `file:` URIs.
    #[error("cannot retrieve `{uri}`: unsupported scheme `{scheme}`")]
    UnsupportedScheme { uri: String, scheme: String },

    /// Pointer evaluation or value access failed.
    #[error(transparent)]
    Value(#[from] dynjson_value::Error),
}
