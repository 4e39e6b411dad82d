use ahash::{AHashMap, AHashSet};
use dynjson_value::Json;
use fluent_uri::{Uri, UriRef};

use crate::pointer::resolve_pointer;
use crate::uri::{doc_uri, make_absolute, parse_uri, same_document};
use crate::{Error, Registry, Result};

/// Replace every `$ref` subtree in `root` with its resolved target,
/// in place, and return the (possibly replaced) root.
///
/// An object's `id` string property changes the base URI for its subtree.
/// Targets inside the current document are found by JSON Pointer; other
/// documents are fetched through the registry and expanded against their
/// own URI first. Two memo tables make cyclic schemas terminate: a
/// resolved map from absolute reference to target (filled *before* the
/// target's own expansion, so a reference back into a schema still being
/// expanded resolves to the in-progress node) and an identity-keyed set
/// of fully expanded nodes.
///
/// A reference cycle leaves the returned graph cyclic; callers keep the
/// graph alive for as long as they validate against it.
pub fn expand(
    root: &Json,
    base: Option<&Uri<String>>,
    registry: &mut Registry<'_>,
) -> Result<Json> {
    let mut expander = Expander {
        registry,
        resolved: AHashMap::new(),
        expanded: AHashSet::new(),
    };
    expander.expand_node(root.clone(), root, base.cloned())
}

struct Expander<'a, 'r> {
    registry: &'a mut Registry<'r>,
    /// Absolute reference string → resolved target.
    resolved: AHashMap<String, Json>,
    /// Identities of nodes whose subtree is fully expanded. Keyed by node
    /// identity, not value equality: structurally equal but distinct
    /// subtrees must expand independently.
    expanded: AHashSet<usize>,
}

impl Expander<'_, '_> {
    fn expand_node(
        &mut self,
        json: Json,
        topdoc: &Json,
        base: Option<Uri<String>>,
    ) -> Result<Json> {
        if self.expanded.contains(&json.node_id()) {
            return Ok(json);
        }
        if json.is_object() {
            let base = match json.get("id")? {
                Some(id) if id.is_string() => {
                    self.scope(base, id.as_str().unwrap_or_default())?
                }
                _ => base,
            };
            if let Some(reference) = json.get("$ref")? {
                if let Some(reference) = reference.as_str() {
                    return self.expand_ref(reference, topdoc, base);
                }
            }
            for (key, value) in json.entries()? {
                let child = self.expand_node(value, topdoc, base.clone())?;
                json.set(key, child)?;
            }
        } else if json.is_array() {
            for index in 0..json.len()? {
                let element = json.at(index)?;
                let element = self.expand_node(element, topdoc, base.clone())?;
                json.set_at(index, element)?;
            }
        }
        self.expanded.insert(json.node_id());
        Ok(json)
    }

    /// A subtree `id` pushes a new base for the scope: an absolute id
    /// replaces the base, a relative one resolves against it.
    fn scope(&self, base: Option<Uri<String>>, id: &str) -> Result<Option<Uri<String>>> {
        if let Ok(absolute) = Uri::parse(id.to_owned()) {
            tracing::trace!(base = %absolute, "schema id opens a new resolution scope");
            return Ok(Some(absolute));
        }
        match base {
            Some(base) => {
                let relative = UriRef::parse(id).map_err(|e| Error::InvalidUri {
                    uri: id.to_string(),
                    reason: e.to_string(),
                })?;
                let scoped = relative.resolve_against(&base).map_err(|e| Error::InvalidUri {
                    uri: id.to_string(),
                    reason: e.to_string(),
                })?;
                tracing::trace!(base = %scoped, "schema id opens a new resolution scope");
                Ok(Some(scoped))
            }
            // A relative id with no base leaves the scope anonymous.
            None => Ok(None),
        }
    }

    fn expand_ref(
        &mut self,
        reference: &str,
        topdoc: &Json,
        base: Option<Uri<String>>,
    ) -> Result<Json> {
        match make_absolute(base.as_ref(), reference) {
            Ok(refuri) => {
                let key = refuri.to_string();
                if let Some(target) = self.resolved.get(&key) {
                    return Ok(target.clone());
                }
                tracing::debug!(reference = %key, "resolving $ref");
                let target = self.resolve_ref(base.as_ref(), topdoc, &refuri)?;
                self.finish_ref(key, target, topdoc, base)
            }
            // A fragment-only reference in an anonymous schema points
            // into the document being expanded.
            Err(Error::NoBase { .. }) if reference.starts_with('#') => {
                let key = reference.to_string();
                if let Some(target) = self.resolved.get(&key) {
                    return Ok(target.clone());
                }
                let target = resolve_pointer(&reference[1..], topdoc)?;
                self.finish_ref(key, target, topdoc, base)
            }
            Err(e) => Err(e),
        }
    }

    /// Memoize the raw target, expand it, memoize the expansion. The
    /// first insert is what lets a self-referential schema resolve to its
    /// own in-progress node instead of recursing forever.
    fn finish_ref(
        &mut self,
        key: String,
        target: Json,
        topdoc: &Json,
        base: Option<Uri<String>>,
    ) -> Result<Json> {
        self.resolved.insert(key.clone(), target.clone());
        let target = self.expand_node(target, topdoc, base)?;
        self.resolved.insert(key, target.clone());
        self.expanded.insert(target.node_id());
        Ok(target)
    }

    fn resolve_ref(
        &mut self,
        base: Option<&Uri<String>>,
        topdoc: &Json,
        refuri: &Uri<String>,
    ) -> Result<Json> {
        let refdoc = if base.is_some_and(|base| same_document(base, refuri)) {
            topdoc.clone()
        } else {
            let document_uri = parse_uri(&doc_uri(refuri))?;
            let document = self.registry.document(&document_uri)?;
            // The fetched document is expanded as its own root before the
            // pointer is applied.
            self.expand_node(document.clone(), &document, Some(document_uri))?
        };
        match refuri.fragment() {
            None => Ok(refdoc),
            Some(fragment) => resolve_pointer(fragment.as_str(), &refdoc),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::json;

    use super::*;
    use crate::DefaultRetriever;
    use crate::Retrieve;

    fn expand_anonymous(root: &Json) -> Json {
        let mut registry = Registry::new(&DefaultRetriever);
        expand(root, None, &mut registry).unwrap()
    }

    #[test]
    fn local_fragment_refs_are_replaced_by_their_target() {
        let root = Json::make(json!({
            "definitions": {"s": {"type": "string"}},
            "properties": {"a": {"$ref": "#/definitions/s"}},
        }));
        let expanded = expand_anonymous(&root);
        let target = expanded.pointer("/definitions/s").unwrap();
        let replaced = expanded.pointer("/properties/a").unwrap();
        assert!(replaced.same_node(&target));
    }

    #[test]
    fn self_reference_resolves_to_the_root_in_progress() {
        let root = Json::make(json!({
            "id": "urn:t",
            "type": "object",
            "properties": {"child": {"$ref": "urn:t"}},
        }));
        let expanded = expand_anonymous(&root);
        let child = expanded.pointer("/properties/child").unwrap();
        assert!(child.same_node(&expanded));
    }

    #[test]
    fn structurally_equal_subtrees_expand_independently() {
        // Two distinct but equal `$ref` objects must both be replaced.
        let root = Json::make(json!({
            "definitions": {"s": {"type": "number"}},
            "properties": {
                "a": {"$ref": "#/definitions/s"},
                "b": {"$ref": "#/definitions/s"},
            },
        }));
        let expanded = expand_anonymous(&root);
        let target = expanded.pointer("/definitions/s").unwrap();
        for name in ["a", "b"] {
            let replaced = expanded
                .pointer(&format!("/properties/{name}"))
                .unwrap();
            assert!(replaced.same_node(&target), "{name}");
        }
    }

    struct MapRetriever {
        documents: ahash::AHashMap<String, Json>,
        requests: RefCell<Vec<String>>,
    }

    impl Retrieve for MapRetriever {
        fn retrieve(
            &self,
            uri: &Uri<String>,
        ) -> std::result::Result<Json, Box<dyn std::error::Error + Send + Sync>> {
            let key = uri.to_string();
            self.requests.borrow_mut().push(key.clone());
            self.documents
                .get(&key)
                .cloned()
                .ok_or_else(|| format!("no such document: {key}").into())
        }
    }

    #[test]
    fn cross_document_refs_fetch_and_cache() {
        let mut documents = ahash::AHashMap::new();
        documents.insert(
            "http://host/types.json".to_string(),
            Json::make(json!({"definitions": {"name": {"type": "string"}}})),
        );
        let retriever = MapRetriever {
            documents,
            requests: RefCell::new(Vec::new()),
        };
        let mut registry = Registry::new(&retriever);

        let root = Json::make(json!({
            "id": "http://host/root.json",
            "properties": {
                "first": {"$ref": "types.json#/definitions/name"},
                "second": {"$ref": "types.json#/definitions/name"},
            },
        }));
        let expanded = expand(&root, None, &mut registry).unwrap();
        assert_eq!(
            expanded.pointer("/properties/first").unwrap(),
            Json::make(json!({"type": "string"}))
        );
        // One fetch despite two references.
        assert_eq!(
            retriever.requests.borrow().as_slice(),
            ["http://host/types.json"]
        );
    }

    #[test]
    fn nested_id_changes_the_resolution_scope() {
        let mut documents = ahash::AHashMap::new();
        documents.insert(
            "http://other/common.json".to_string(),
            Json::make(json!({"type": "number"})),
        );
        let retriever = MapRetriever {
            documents,
            requests: RefCell::new(Vec::new()),
        };
        let mut registry = Registry::new(&retriever);

        let root = Json::make(json!({
            "id": "http://host/root.json",
            "properties": {
                "nested": {
                    "id": "http://other/base.json",
                    "properties": {"x": {"$ref": "common.json"}},
                },
            },
        }));
        expand(&root, None, &mut registry).unwrap();
        assert_eq!(
            retriever.requests.borrow().as_slice(),
            ["http://other/common.json"]
        );
    }

    #[test]
    fn arrays_are_expanded_in_place() {
        let root = Json::make(json!({
            "definitions": {"s": {"type": "boolean"}},
            "anyOf": [{"$ref": "#/definitions/s"}, {"type": "null"}],
        }));
        let expanded = expand_anonymous(&root);
        let first = expanded.pointer("/anyOf/0").unwrap();
        assert!(first.same_node(&expanded.pointer("/definitions/s").unwrap()));
    }
}
