use ahash::AHashMap;
use dynjson_value::Json;
use fluent_uri::Uri;

use crate::uri::doc_uri;
use crate::{Error, Result};

/// Fetches the content of an absolute, fragment-stripped document URI.
///
/// The expander calls this for every `$ref` that leaves the current
/// document; the [`Registry`] makes sure each distinct document is fetched
/// at most once. This is the only operation in the engine that may block.
pub trait Retrieve {
    fn retrieve(
        &self,
        uri: &Uri<String>,
    ) -> std::result::Result<Json, Box<dyn std::error::Error + Send + Sync>>;
}

/// The stock retriever: reads `file:` URIs from disk, decodes them as
/// UTF-8 and parses them with the tolerant reader. Any other scheme is
/// rejected; plug in your own [`Retrieve`] for network access.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRetriever;

impl Retrieve for DefaultRetriever {
    fn retrieve(
        &self,
        uri: &Uri<String>,
    ) -> std::result::Result<Json, Box<dyn std::error::Error + Send + Sync>> {
        let scheme = uri.scheme().as_str();
        if !scheme.eq_ignore_ascii_case("file") {
            return Err(Box::new(Error::UnsupportedScheme {
                uri: uri.to_string(),
                scheme: scheme.to_string(),
            }));
        }
        let text = std::fs::read_to_string(uri.path().as_str())?;
        Ok(dynjson_value::read(&text)?)
    }
}

/// A cache of fetched schema documents keyed by document identity
/// (scheme + authority + path, fragment stripped).
pub struct Registry<'r> {
    documents: AHashMap<String, Json>,
    retriever: &'r dyn Retrieve,
}

impl<'r> Registry<'r> {
    pub fn new(retriever: &'r dyn Retrieve) -> Registry<'r> {
        Registry {
            documents: AHashMap::new(),
            retriever,
        }
    }

    /// Pre-seed the registry with an already-parsed document, e.g. the
    /// root schema under its declared URI.
    pub fn insert(&mut self, uri: &Uri<String>, document: Json) {
        self.documents.insert(doc_uri(uri), document);
    }

    /// The parsed document behind `uri`, fetching it on first use.
    pub fn document(&mut self, uri: &Uri<String>) -> Result<Json> {
        let key = doc_uri(uri);
        if let Some(document) = self.documents.get(&key) {
            tracing::trace!(uri = %key, "document cache hit");
            return Ok(document.clone());
        }
        tracing::debug!(uri = %key, "retrieving schema document");
        let document = self
            .retriever
            .retrieve(uri)
            .map_err(|source| Error::Retrieval {
                uri: key.clone(),
                source,
            })?;
        self.documents.insert(key, document.clone());
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use serde_json::json;

    use super::*;
    use crate::uri::parse_uri;

    struct CountingRetriever {
        calls: Cell<usize>,
    }

    impl Retrieve for CountingRetriever {
        fn retrieve(
            &self,
            _uri: &Uri<String>,
        ) -> std::result::Result<Json, Box<dyn std::error::Error + Send + Sync>> {
            self.calls.set(self.calls.get() + 1);
            Ok(Json::make(json!({"type": "string"})))
        }
    }

    #[test]
    fn documents_are_fetched_once() {
        let retriever = CountingRetriever { calls: Cell::new(0) };
        let mut registry = Registry::new(&retriever);
        let first = parse_uri("http://host/s.json#/a").unwrap();
        let second = parse_uri("http://host/s.json#/b").unwrap();
        registry.document(&first).unwrap();
        registry.document(&second).unwrap();
        assert_eq!(retriever.calls.get(), 1);
    }

    #[test]
    fn seeded_documents_are_not_fetched() {
        let retriever = CountingRetriever { calls: Cell::new(0) };
        let mut registry = Registry::new(&retriever);
        let uri = parse_uri("urn:seeded").unwrap();
        registry.insert(&uri, Json::make(json!({})));
        registry.document(&uri).unwrap();
        assert_eq!(retriever.calls.get(), 0);
    }

    #[test]
    fn default_retriever_rejects_unknown_schemes() {
        let uri = parse_uri("http://host/s.json").unwrap();
        assert!(DefaultRetriever.retrieve(&uri).is_err());
    }
}
