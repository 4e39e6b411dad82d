//! # dynjson-referencing
//!
//! JSON reference resolution for `dynjson` schema documents: JSON Pointer
//! evaluation, base-URI composition, a fetch-once document registry, and
//! the `$ref` expander that rewrites a schema tree in place.
mod error;
mod expand;
mod pointer;
mod registry;
pub mod uri;

pub use error::Error;
pub use expand::expand;
pub use fluent_uri::Uri;
pub use pointer::resolve_pointer;
pub use registry::{DefaultRetriever, Registry, Retrieve};

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, Error>;
