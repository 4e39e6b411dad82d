//! # dynjson
//!
//! A self-contained JSON value engine paired with a JSON Schema draft-4
//! validator.
//!
//! The [`Json`] type represents any of the six JSON kinds behind one
//! uniformly-typed handle; [`read`] parses tolerant JSON text into it and
//! its `Display` impl renders it back. [`schema`] compiles a schema
//! document (itself a [`Json`]) into an executable [`Schema`], resolving
//! `$ref` references across documents through a pluggable [`Retrieve`]
//! seam.
//!
//! ```
//! use dynjson::{schema, Json};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), dynjson::SchemaError> {
//! let validator = schema(Json::make(json!({
//!     "type": "object",
//!     "required": ["name"],
//!     "properties": {"name": {"type": "string"}},
//! })))?;
//!
//! let report = validator.validate(&Json::make(json!({"name": "ok"})))?;
//! assert!(report.is("ok", true));
//!
//! let report = validator.validate(&Json::make(json!({})))?;
//! assert!(report.is("ok", false));
//! assert_eq!(report.get("errors")?.unwrap().len()?, 1);
//! # Ok(())
//! # }
//! ```
mod compiler;
mod error;
mod instructions;
mod runtime;

pub use dynjson_referencing::{
    expand, resolve_pointer, DefaultRetriever, Error as ReferencingError, Registry, Retrieve, Uri,
};
pub use dynjson_value::{
    attach_factory, detach_factory, factory, read, set_global_factory, DefaultFactory,
    Error as ValueError, Factory, Json, Kind, Number,
};
pub use error::SchemaError;

use compiler::Compiler;
use dynjson_referencing::uri::parse_uri;
use instructions::{InstrId, Program};

/// A compiled, executable schema.
///
/// Holds the expanded schema graph (which a recursive schema makes
/// cyclic) together with the instruction program compiled from it.
pub struct Schema {
    schema: Json,
    program: Program,
    root: InstrId,
}

impl Schema {
    /// Validate a document.
    ///
    /// Validation proceeds past failures and accumulates everything it
    /// finds. The report is `{"ok": true}` when the document conforms,
    /// and `{"ok": false, "errors": [...]}` with one message per
    /// violation otherwise. Rule violations never produce an `Err`; only
    /// structural access failures do.
    pub fn validate(&self, document: &Json) -> Result<Json, SchemaError> {
        let report = Json::object();
        match self.program.apply(self.root, document)? {
            None => {
                report.set("ok", true)?;
            }
            Some(errors) => {
                report.set("ok", false)?;
                report.set("errors", errors)?;
            }
        }
        Ok(report)
    }

    /// The expanded schema this validator was compiled from.
    pub fn source(&self) -> &Json {
        &self.schema
    }
}

/// Compile a schema document. References are resolved against no base
/// URI, so cross-document `$ref`s must be absolute; the default retriever
/// fetches `file:` URIs.
pub fn schema(source: Json) -> Result<Schema, SchemaError> {
    build(source, None, &DefaultRetriever)
}

/// Compile a schema document that lives at `uri`; relative `$ref`s
/// resolve against it.
pub fn schema_at(uri: &str, source: Json) -> Result<Schema, SchemaError> {
    let uri = parse_uri(uri)?;
    build(source, Some(uri), &DefaultRetriever)
}

/// Fetch the document at `uri` with the default retriever and compile it.
pub fn schema_from_uri(uri: &str) -> Result<Schema, SchemaError> {
    schema_from_uri_with(uri, &DefaultRetriever)
}

/// Fetch the document at `uri` through `retriever` and compile it.
pub fn schema_from_uri_with(uri: &str, retriever: &dyn Retrieve) -> Result<Schema, SchemaError> {
    let parsed = parse_uri(uri)?;
    let mut registry = Registry::new(retriever);
    let source = registry.document(&parsed)?;
    build(source, Some(parsed), retriever)
}

/// Compile a schema with an explicit retriever for cross-document
/// references, and optionally the URI the schema lives at.
pub fn schema_with_retriever(
    source: Json,
    uri: Option<&str>,
    retriever: &dyn Retrieve,
) -> Result<Schema, SchemaError> {
    let uri = uri.map(parse_uri).transpose()?;
    build(source, uri, retriever)
}

fn build(
    source: Json,
    uri: Option<Uri<String>>,
    retriever: &dyn Retrieve,
) -> Result<Schema, SchemaError> {
    let mut registry = Registry::new(retriever);
    if let Some(uri) = &uri {
        registry.insert(uri, source.clone());
    }
    let expanded = expand(&source, uri.as_ref(), &mut registry)?;
    let mut program = Program::new();
    let root = Compiler::new(&mut program).compile(&expanded)?;
    tracing::debug!(instructions = program.len(), "schema compiled");
    Ok(Schema {
        schema: expanded,
        program,
        root,
    })
}
