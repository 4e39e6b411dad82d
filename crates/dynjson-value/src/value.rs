use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;

use crate::{factory, Error, Number, Result};

/// The runtime tag of a [`Json`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl Kind {
    /// The kind name as it appears in schema `type` keywords and error
    /// messages.
    pub fn name(self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Bool => "boolean",
            Kind::Number => "number",
            Kind::String => "string",
            Kind::Array => "array",
            Kind::Object => "object",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub(crate) struct Node {
    parent: RefCell<Weak<Node>>,
    pub(crate) repr: Repr,
}

pub(crate) enum Repr {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(RefCell<Vec<Json>>),
    Object(RefCell<AHashMap<String, Json>>),
}

/// A dynamic JSON value.
///
/// `Json` is a cheap-to-clone handle; [`Clone`] produces another handle to
/// the *same* node, the way object references behave in dynamically typed
/// engines. Use [`dup`](Json::dup) for a deep copy.
///
/// Containers own their elements. Every element additionally carries a
/// weak back-reference to its container, maintained by all mutating
/// operations and queried with [`up`](Json::up). A value belongs to at
/// most one container at a time; inserting a value that is already owned
/// elsewhere leaves the old container's copy in place but repoints the
/// back-reference, which is the caller's situation to avoid.
#[derive(Clone)]
pub struct Json {
    node: Rc<Node>,
}

impl Json {
    pub(crate) fn from_repr(repr: Repr) -> Json {
        Json {
            node: Rc::new(Node {
                parent: RefCell::new(Weak::new()),
                repr,
            }),
        }
    }

    /// The JSON `null` value.
    pub fn null() -> Json {
        factory().nil()
    }

    /// A boolean value.
    pub fn bool(value: bool) -> Json {
        factory().bool(value)
    }

    /// A number value.
    pub fn number(value: impl Into<Number>) -> Json {
        factory().number(value.into())
    }

    /// A string value.
    pub fn string(value: impl AsRef<str>) -> Json {
        factory().string(value.as_ref())
    }

    /// An empty object.
    pub fn object() -> Json {
        factory().object()
    }

    /// An empty array.
    pub fn array() -> Json {
        factory().array()
    }

    /// Convert any JSON-compatible input into a value, dispatching on the
    /// input's own tag. This is the polymorphic construction seam; it
    /// routes through the active [`Factory`](crate::Factory).
    pub fn make(value: impl Into<serde_json::Value>) -> Json {
        factory().make(value.into())
    }

    /// The kind tag of this value.
    pub fn kind(&self) -> Kind {
        match &self.node.repr {
            Repr::Null => Kind::Null,
            Repr::Bool(_) => Kind::Bool,
            Repr::Number(_) => Kind::Number,
            Repr::String(_) => Kind::String,
            Repr::Array(_) => Kind::Array,
            Repr::Object(_) => Kind::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.node.repr, Repr::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.node.repr, Repr::Bool(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self.node.repr, Repr::Number(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self.node.repr, Repr::String(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.node.repr, Repr::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self.node.repr, Repr::Object(_))
    }

    /// String, number or boolean.
    pub fn is_primitive(&self) -> bool {
        self.is_string() || self.is_number() || self.is_bool()
    }

    /// A stable identity for this node, distinct from structural equality.
    /// Two handles compare identical exactly when they alias the same node.
    pub fn node_id(&self) -> usize {
        Rc::as_ptr(&self.node) as usize
    }

    /// Whether two handles alias the same node.
    pub fn same_node(&self, other: &Json) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    /// The enclosing container, if this value is currently an element of
    /// one.
    pub fn up(&self) -> Option<Json> {
        self.node.parent.borrow().upgrade().map(|node| Json { node })
    }

    /// Deep copy. The copy has no parent; every node in it is fresh, so
    /// the copy can be inserted anywhere without disturbing the original's
    /// back-references.
    pub fn dup(&self) -> Json {
        match &self.node.repr {
            Repr::Null => Json::from_repr(Repr::Null),
            Repr::Bool(b) => Json::from_repr(Repr::Bool(*b)),
            Repr::Number(n) => Json::from_repr(Repr::Number(n.clone())),
            Repr::String(s) => Json::from_repr(Repr::String(s.clone())),
            Repr::Array(items) => {
                let copy = Json::from_repr(Repr::Array(RefCell::new(Vec::new())));
                for item in items.borrow().iter() {
                    let child = item.dup();
                    copy.attach(&child);
                    if let Repr::Array(list) = &copy.node.repr {
                        list.borrow_mut().push(child);
                    }
                }
                copy
            }
            Repr::Object(map) => {
                let copy = Json::from_repr(Repr::Object(RefCell::new(AHashMap::new())));
                for (key, value) in map.borrow().iter() {
                    let child = value.dup();
                    copy.attach(&child);
                    if let Repr::Object(entries) = &copy.node.repr {
                        entries.borrow_mut().insert(key.clone(), child);
                    }
                }
                copy
            }
        }
    }

    // Unwrap views.

    pub fn as_bool(&self) -> Option<bool> {
        match &self.node.repr {
            Repr::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.node.repr {
            Repr::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match &self.node.repr {
            Repr::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().and_then(Number::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().map(Number::as_f64)
    }

    /// Element or property count of a container.
    pub fn len(&self) -> Result<usize> {
        match &self.node.repr {
            Repr::Array(items) => Ok(items.borrow().len()),
            Repr::Object(map) => Ok(map.borrow().len()),
            _ => Err(Error::unsupported("len", self.kind())),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    // Array operations.

    /// The element at `index`. Out of range is an error.
    pub fn at(&self, index: usize) -> Result<Json> {
        match &self.node.repr {
            Repr::Array(items) => {
                let items = items.borrow();
                items
                    .get(index)
                    .cloned()
                    .ok_or(Error::IndexOutOfRange {
                        index,
                        len: items.len(),
                    })
            }
            _ => Err(Error::unsupported("at", self.kind())),
        }
    }

    /// Append an element.
    pub fn push(&self, value: impl Into<Json>) -> Result<&Json> {
        match &self.node.repr {
            Repr::Array(items) => {
                let value = value.into();
                self.attach(&value);
                items.borrow_mut().push(value);
                Ok(self)
            }
            _ => Err(Error::unsupported("push", self.kind())),
        }
    }

    /// Replace the element at `index`, re-parenting both the incoming and
    /// the outgoing value.
    pub fn set_at(&self, index: usize, value: impl Into<Json>) -> Result<&Json> {
        match &self.node.repr {
            Repr::Array(items) => {
                let value = value.into();
                let mut items = items.borrow_mut();
                let len = items.len();
                let slot = items
                    .get_mut(index)
                    .ok_or(Error::IndexOutOfRange { index, len })?;
                let old = std::mem::replace(slot, value.clone());
                drop(items);
                if !old.same_node(&value) {
                    Json::detach(&old);
                }
                self.attach(&value);
                Ok(self)
            }
            _ => Err(Error::unsupported("set_at", self.kind())),
        }
    }

    /// Insert an element at `index`, shifting the rest to the right.
    pub fn insert_at(&self, index: usize, value: impl Into<Json>) -> Result<&Json> {
        match &self.node.repr {
            Repr::Array(items) => {
                let value = value.into();
                let mut items = items.borrow_mut();
                if index > items.len() {
                    return Err(Error::IndexOutOfRange {
                        index,
                        len: items.len(),
                    });
                }
                items.insert(index, value.clone());
                drop(items);
                self.attach(&value);
                Ok(self)
            }
            _ => Err(Error::unsupported("insert_at", self.kind())),
        }
    }

    /// Remove the first element structurally equal to `value`.
    pub fn remove_value(&self, value: &Json) -> Result<&Json> {
        match &self.node.repr {
            Repr::Array(items) => {
                let position = items.borrow().iter().position(|item| item == value);
                if let Some(position) = position {
                    let removed = items.borrow_mut().remove(position);
                    Json::detach(&removed);
                }
                Ok(self)
            }
            _ => Err(Error::unsupported("remove_value", self.kind())),
        }
    }

    /// Remove the element at `index`.
    pub fn del_at(&self, index: usize) -> Result<&Json> {
        self.take_at(index)?;
        Ok(self)
    }

    /// Remove and return the element at `index`.
    pub fn take_at(&self, index: usize) -> Result<Json> {
        match &self.node.repr {
            Repr::Array(items) => {
                let mut items = items.borrow_mut();
                if index >= items.len() {
                    return Err(Error::IndexOutOfRange {
                        index,
                        len: items.len(),
                    });
                }
                let removed = items.remove(index);
                drop(items);
                Json::detach(&removed);
                Ok(removed)
            }
            _ => Err(Error::unsupported("take_at", self.kind())),
        }
    }

    /// Whether the element at `index` equals `value`. `false` when the
    /// receiver is not an array or the index is out of range.
    pub fn is_at(&self, index: usize, value: impl Into<Json>) -> bool {
        match self.at(index) {
            Ok(element) => element == value.into(),
            Err(_) => false,
        }
    }

    /// A snapshot of the array's elements.
    pub fn elements(&self) -> Result<Vec<Json>> {
        match &self.node.repr {
            Repr::Array(items) => Ok(items.borrow().clone()),
            _ => Err(Error::unsupported("elements", self.kind())),
        }
    }

    // Object operations.

    /// The property value, or `None` when the key is absent.
    pub fn get(&self, key: &str) -> Result<Option<Json>> {
        match &self.node.repr {
            Repr::Object(map) => Ok(map.borrow().get(key).cloned()),
            _ => Err(Error::unsupported("get", self.kind())),
        }
    }

    pub fn has(&self, key: &str) -> Result<bool> {
        match &self.node.repr {
            Repr::Object(map) => Ok(map.borrow().contains_key(key)),
            _ => Err(Error::unsupported("has", self.kind())),
        }
    }

    /// Set a property, replacing any existing value under the same key.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Json>) -> Result<&Json> {
        match &self.node.repr {
            Repr::Object(map) => {
                let value = value.into();
                self.attach(&value);
                let old = map.borrow_mut().insert(key.into(), value.clone());
                if let Some(old) = old {
                    if !old.same_node(&value) {
                        Json::detach(&old);
                    }
                }
                Ok(self)
            }
            _ => Err(Error::unsupported("set", self.kind())),
        }
    }

    /// Remove a property.
    pub fn del(&self, key: &str) -> Result<&Json> {
        self.take(key)?;
        Ok(self)
    }

    /// Remove and return a property, or `None` when it was absent.
    pub fn take(&self, key: &str) -> Result<Option<Json>> {
        match &self.node.repr {
            Repr::Object(map) => {
                let removed = map.borrow_mut().remove(key);
                if let Some(removed) = &removed {
                    Json::detach(removed);
                }
                Ok(removed)
            }
            _ => Err(Error::unsupported("take", self.kind())),
        }
    }

    /// The property value if present; otherwise store `default` under the
    /// key and return the stored value. This is a mutating read.
    pub fn get_or_insert(&self, key: &str, default: impl Into<Json>) -> Result<Json> {
        if let Some(existing) = self.get(key)? {
            return Ok(existing);
        }
        let value = default.into();
        self.set(key, value.clone())?;
        Ok(value)
    }

    /// Whether the property exists and equals `value`. `false` when the
    /// receiver is not an object or the property is absent.
    pub fn is(&self, key: &str, value: impl Into<Json>) -> bool {
        match self.get(key) {
            Ok(Some(existing)) => existing == value.into(),
            _ => false,
        }
    }

    /// A snapshot of the object's entries.
    pub fn entries(&self) -> Result<Vec<(String, Json)>> {
        match &self.node.repr {
            Repr::Object(map) => Ok(map
                .borrow()
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()),
            _ => Err(Error::unsupported("entries", self.kind())),
        }
    }

    /// A snapshot of the object's keys.
    pub fn keys(&self) -> Result<Vec<String>> {
        match &self.node.repr {
            Repr::Object(map) => Ok(map.borrow().keys().cloned().collect()),
            _ => Err(Error::unsupported("keys", self.kind())),
        }
    }

    /// Evaluate a JSON Pointer (RFC 6901) against this value. Segments
    /// unescape `~1` to `/` and `~0` to `~`; no percent-decoding happens
    /// at this layer.
    pub fn pointer(&self, expr: &str) -> Result<Json> {
        let mut cursor = self.clone();
        for segment in expr.split('/') {
            if segment.is_empty() {
                continue;
            }
            let segment = segment.replace("~1", "/").replace("~0", "~");
            cursor = if cursor.is_array() {
                let index: usize = segment
                    .parse()
                    .map_err(|_| self.pointer_error(expr))?;
                cursor.at(index).map_err(|_| self.pointer_error(expr))?
            } else if cursor.is_object() {
                cursor
                    .get(&segment)?
                    .ok_or_else(|| self.pointer_error(expr))?
            } else {
                return Err(self.pointer_error(expr));
            };
        }
        Ok(cursor)
    }

    fn pointer_error(&self, expr: &str) -> Error {
        Error::Pointer {
            pointer: expr.to_string(),
            target: self.preview(200),
        }
    }

    /// Deep conversion to a plain `serde_json::Value`. Arbitrary-precision
    /// numbers degrade to `f64`; use [`Number::to_text`] when the exact
    /// digits matter.
    pub fn to_plain(&self) -> serde_json::Value {
        match &self.node.repr {
            Repr::Null => serde_json::Value::Null,
            Repr::Bool(b) => serde_json::Value::Bool(*b),
            Repr::Number(n) => match n {
                Number::Int(i) => serde_json::Value::from(*i),
                Number::Float(f) => serde_json::Value::from(*f),
                Number::BigInt(_) | Number::BigDec(_) => n
                    .as_i64()
                    .map(serde_json::Value::from)
                    .unwrap_or_else(|| serde_json::Value::from(n.as_f64())),
            },
            Repr::String(s) => serde_json::Value::from(s.as_str()),
            Repr::Array(items) => serde_json::Value::Array(
                items.borrow().iter().map(Json::to_plain).collect(),
            ),
            Repr::Object(map) => serde_json::Value::Object(
                map.borrow()
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_plain()))
                    .collect(),
            ),
        }
    }

    /// JSON-with-padding: `name(json);` when `name` is non-empty,
    /// otherwise the plain serialization.
    pub fn pad(&self, name: &str) -> String {
        if name.is_empty() {
            self.to_string()
        } else {
            format!("{name}({self});")
        }
    }

    pub(crate) fn repr(&self) -> &Repr {
        &self.node.repr
    }

    pub(crate) fn attach(&self, child: &Json) {
        *child.node.parent.borrow_mut() = Rc::downgrade(&self.node);
    }

    pub(crate) fn detach(child: &Json) {
        *child.node.parent.borrow_mut() = Weak::new();
    }
}

/// Structural equality: same kind and recursively equal contents. Numbers
/// compare by value, objects regardless of insertion order. Parent links
/// do not participate.
impl PartialEq for Json {
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.node, &other.node) {
            return true;
        }
        match (&self.node.repr, &other.node.repr) {
            (Repr::Null, Repr::Null) => true,
            (Repr::Bool(a), Repr::Bool(b)) => a == b,
            (Repr::Number(a), Repr::Number(b)) => a == b,
            (Repr::String(a), Repr::String(b)) => a == b,
            (Repr::Array(a), Repr::Array(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            (Repr::Object(a), Repr::Object(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(key, value)| b.get(key).is_some_and(|other| value == other))
            }
            _ => false,
        }
    }
}

// Bounded rendering: Debug output stays readable for large documents and
// terminates on self-referential graphs.
impl fmt::Debug for Json {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.preview(200))
    }
}

impl From<bool> for Json {
    fn from(value: bool) -> Self {
        Json::bool(value)
    }
}

impl From<i64> for Json {
    fn from(value: i64) -> Self {
        Json::number(value)
    }
}

impl From<i32> for Json {
    fn from(value: i32) -> Self {
        Json::number(value)
    }
}

impl From<u64> for Json {
    fn from(value: u64) -> Self {
        Json::number(value)
    }
}

impl From<f64> for Json {
    fn from(value: f64) -> Self {
        Json::number(value)
    }
}

impl From<&str> for Json {
    fn from(value: &str) -> Self {
        Json::string(value)
    }
}

impl From<String> for Json {
    fn from(value: String) -> Self {
        Json::string(value)
    }
}

impl From<Number> for Json {
    fn from(value: Number) -> Self {
        Json::number(value)
    }
}

impl From<&Json> for Json {
    fn from(value: &Json) -> Self {
        value.clone()
    }
}

impl From<serde_json::Value> for Json {
    fn from(value: serde_json::Value) -> Self {
        factory().make(value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn predicates_are_exclusive() {
        let values = [
            Json::null(),
            Json::bool(true),
            Json::number(1),
            Json::string("x"),
            Json::array(),
            Json::object(),
        ];
        for value in &values {
            let hits = [
                value.is_null(),
                value.is_bool(),
                value.is_number(),
                value.is_string(),
                value.is_array(),
                value.is_object(),
            ]
            .iter()
            .filter(|hit| **hit)
            .count();
            assert_eq!(hits, 1, "{value:?}");
        }
    }

    #[test]
    fn parent_follows_insertion() {
        let object = Json::object();
        let child = Json::string("v");
        object.set("k", child.clone()).unwrap();
        assert!(child.up().unwrap().same_node(&object));

        let taken = object.take("k").unwrap().unwrap();
        assert!(taken.up().is_none());

        let array = Json::array();
        array.push(child.clone()).unwrap();
        assert!(child.up().unwrap().same_node(&array));
        array.del_at(0).unwrap();
        assert!(child.up().is_none());

        array.push(child.clone()).unwrap();
        array.remove_value(&Json::string("v")).unwrap();
        assert!(array.is_empty().unwrap());
        assert!(child.up().is_none());
    }

    #[test]
    fn dup_is_deep_and_unparented() {
        let original = Json::make(json!({"a": [1, 2], "b": {"c": true}}));
        let copy = original.dup();
        assert_eq!(original, copy);
        assert!(!original.same_node(&copy));
        assert!(copy.up().is_none());

        // Mutating the copy leaves the original alone.
        copy.get("a").unwrap().unwrap().push(3).unwrap();
        assert_ne!(original, copy);
    }

    #[test]
    fn object_equality_ignores_insertion_order() {
        let left = Json::object();
        left.set("a", 1).unwrap().set("b", 2).unwrap();
        let right = Json::object();
        right.set("b", 2).unwrap().set("a", 1).unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn number_equality_across_forms() {
        assert_eq!(Json::number(1), Json::number(1.0));
        assert_eq!(Json::make(json!(1)), Json::make(json!(1.0)));
    }

    #[test]
    fn make_round_trips_equality() {
        let value = json!({"s": "x", "n": 2.5, "a": [null, true], "o": {}});
        assert_eq!(Json::make(value.clone()), Json::make(value));
    }

    #[test]
    fn get_or_insert_is_a_mutating_read() {
        let object = Json::object();
        let stored = object.get_or_insert("k", 5).unwrap();
        assert_eq!(stored, Json::number(5));
        assert!(object.has("k").unwrap());
        // Second call returns the stored value, not the new default.
        let again = object.get_or_insert("k", 7).unwrap();
        assert_eq!(again, Json::number(5));
    }

    #[test]
    fn set_at_reparents_both_sides() {
        let array = Json::array();
        let first = Json::string("a");
        array.push(first.clone()).unwrap();
        let replacement = Json::string("b");
        array.set_at(0, replacement.clone()).unwrap();
        assert!(first.up().is_none());
        assert!(replacement.up().unwrap().same_node(&array));
    }

    #[test]
    fn wrong_kind_operations_fail() {
        let s = Json::string("x");
        assert!(matches!(
            s.at(0),
            Err(Error::UnsupportedOperation { .. })
        ));
        assert!(matches!(
            s.set("k", 1),
            Err(Error::UnsupportedOperation { .. })
        ));
        let a = Json::array();
        assert!(matches!(a.at(0), Err(Error::IndexOutOfRange { .. })));
    }

    #[test]
    fn pointer_traversal() {
        let doc = Json::make(json!({"a": {"b/c": [10, 20]}}));
        assert_eq!(doc.pointer("/a/b~1c/1").unwrap(), Json::number(20));
        assert!(doc.pointer("/a/missing").is_err());
        assert!(doc.pointer("").unwrap().same_node(&doc));
    }

    #[test]
    fn pad_wraps_in_callback() {
        let value = Json::make(json!([1]));
        assert_eq!(value.pad("cb"), "cb([1]);");
        assert_eq!(value.pad(""), "[1]");
    }
}
