//! Structural merge with per-path policies.
//!
//! `with` combines two values of matching kind. Without options, objects
//! shallow-overwrite by key and arrays append. Options select richer
//! behavior per path: recursive object merge, sorted or deduplicating
//! array union under a `compareBy` projection, and deep-copying of the
//! inserted values.

use std::cmp::Ordering;

use crate::{Error, Json, Kind, Result};

impl Json {
    /// Merge `other` into the receiver and return the receiver.
    ///
    /// Each option is either a string (a global flag such as `"merge"`)
    /// or an object `{"for": [paths...], "merge": .., "dup": ..,
    /// "sort": .., "compareBy": ..}` scoping the flags to JSON-Pointer
    /// paths rooted at the receiver; `""` addresses the root.
    ///
    /// Merging an array with a non-array appends the value as a single
    /// element. Merging an object with a non-object is an error.
    pub fn with(&self, other: &Json, options: &[Json]) -> Result<&Json> {
        if self.is_array() {
            if !other.is_array() {
                self.push(other.clone())?;
                return Ok(self);
            }
            if options.is_empty() {
                for element in other.elements()? {
                    self.push(element)?;
                }
                return Ok(self);
            }
            let policy = collect_options(options)?;
            array_with(self, other, &policy, "")?;
            Ok(self)
        } else if self.is_object() {
            if !other.is_object() {
                return Err(Error::KindMismatch {
                    operation: "merge",
                    left: Kind::Object,
                    right: other.kind(),
                });
            }
            if options.is_empty() {
                for (key, value) in other.entries()? {
                    self.set(key, value)?;
                }
                return Ok(self);
            }
            let policy = collect_options(options)?;
            object_with(self, other, &policy, "")?;
            Ok(self)
        } else {
            Err(Error::unsupported("with", self.kind()))
        }
    }
}

/// Compile the option list into a policy object keyed by path. Every
/// addressed path maps to its effective `merge`/`dup`/`sort`/`compareBy`
/// flags.
fn collect_options(options: &[Json]) -> Result<Json> {
    let policy = Json::object();
    for option in options {
        if let Some(flag) = option.as_str() {
            policy.get_or_insert("", Json::object())?.set(flag, true)?;
        } else if option.is_object() {
            let paths = match option.get("for")? {
                Some(paths) if paths.is_array() => paths,
                Some(single) => {
                    let wrapped = Json::array();
                    wrapped.push(single)?;
                    wrapped
                }
                None => {
                    let root = Json::array();
                    root.push("")?;
                    root
                }
            };
            for path in paths.elements()? {
                let path = path.as_str().ok_or_else(|| {
                    Error::MergeOptions(format!(
                        "`for` paths must be strings, got {}",
                        path.preview(50)
                    ))
                })?;
                let at_path = policy.get_or_insert(path, Json::object())?;
                at_path.set("merge", option.is("merge", true))?;
                at_path.set("dup", option.is("dup", true))?;
                at_path.set("sort", option.is("sort", true))?;
                at_path.set(
                    "compareBy",
                    option.get("compareBy")?.unwrap_or_else(Json::null),
                )?;
            }
        } else {
            return Err(Error::MergeOptions(format!(
                "options must be strings or objects, got {}",
                option.preview(50)
            )));
        }
    }
    Ok(policy)
}

fn object_with(receiver: &Json, other: &Json, policy: &Json, path: &str) -> Result<()> {
    let options = policy.get_or_insert(path, Json::object())?;
    let duplicate = options.is("dup", true);
    if options.is("merge", true) {
        for (key, value) in other.entries()? {
            match receiver.get(&key)? {
                Some(local) if local.is_object() => {
                    object_with(&local, &value, policy, &format!("{path}/{key}"))?;
                }
                Some(local) if local.is_array() => {
                    array_with(&local, &value, policy, &format!("{path}/{key}"))?;
                }
                _ => {
                    receiver.set(key, if duplicate { value.dup() } else { value })?;
                }
            }
        }
    } else {
        for (key, value) in other.entries()? {
            receiver.set(key, if duplicate { value.dup() } else { value })?;
        }
    }
    Ok(())
}

fn array_with(receiver: &Json, other: &Json, policy: &Json, path: &str) -> Result<()> {
    let options = policy.get_or_insert(path, Json::object())?;
    let duplicate = options.is("dup", true);
    let compare_by = options.get("compareBy")?.unwrap_or_else(Json::null);
    if options.is("sort", true) {
        // Merge-style union: both sides are assumed sorted under
        // `compare_by`; elements equal under it are merged (receiver
        // wins).
        let mut this_index = 0;
        let mut that_index = 0;
        while that_index < other.len()? {
            let that_element = other.at(that_index)?;
            if this_index == receiver.len()? {
                receiver.push(pick(&that_element, duplicate))?;
                this_index += 1;
                that_index += 1;
                continue;
            }
            match compare_under(&receiver.at(this_index)?, &that_element, &compare_by)? {
                Ordering::Less => this_index += 1,
                Ordering::Greater => {
                    receiver.insert_at(this_index, pick(&that_element, duplicate))?;
                    that_index += 1;
                }
                Ordering::Equal => that_index += 1,
            }
        }
    } else {
        // Deduplicating append.
        for that_element in other.elements()? {
            let mut present = false;
            for this_element in receiver.elements()? {
                if equal_under(&this_element, &that_element, &compare_by)? {
                    present = true;
                    break;
                }
            }
            if !present {
                receiver.push(pick(&that_element, duplicate))?;
            }
        }
    }
    Ok(())
}

fn pick(element: &Json, duplicate: bool) -> Json {
    if duplicate {
        element.dup()
    } else {
        element.clone()
    }
}

/// Equality under a `compareBy` projection: `null` compares whole
/// elements, a string pointer compares one projected field, an array of
/// pointers compares each in turn. A field missing on both sides counts
/// as equal.
fn equal_under(left: &Json, right: &Json, fields: &Json) -> Result<bool> {
    if fields.is_null() {
        Ok(left == right)
    } else if let Some(pointer) = fields.as_str() {
        Ok(match (left.pointer(pointer).ok(), right.pointer(pointer).ok()) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b,
            _ => false,
        })
    } else if fields.is_array() {
        for field in fields.elements()? {
            if !equal_under(left, right, &field)? {
                return Ok(false);
            }
        }
        Ok(true)
    } else {
        Err(Error::MergeOptions(format!(
            "compareBy must be a pointer or an array of pointers, got {}",
            fields.preview(50)
        )))
    }
}

fn compare_under(left: &Json, right: &Json, fields: &Json) -> Result<Ordering> {
    if fields.is_null() {
        compare_values(left, right)
    } else if let Some(pointer) = fields.as_str() {
        compare_values(&left.pointer(pointer)?, &right.pointer(pointer)?)
    } else if fields.is_array() {
        for field in fields.elements()? {
            let ordering = compare_under(left, right, &field)?;
            if ordering != Ordering::Equal {
                return Ok(ordering);
            }
        }
        Ok(Ordering::Equal)
    } else {
        Err(Error::MergeOptions(format!(
            "compareBy must be a pointer or an array of pointers, got {}",
            fields.preview(50)
        )))
    }
}

fn compare_values(left: &Json, right: &Json) -> Result<Ordering> {
    if left.kind() != right.kind() {
        return Err(Error::KindMismatch {
            operation: "compare",
            left: left.kind(),
            right: right.kind(),
        });
    }
    match left.kind() {
        Kind::Number => left
            .as_f64()
            .zip(right.as_f64())
            .and_then(|(a, b)| a.partial_cmp(&b))
            .ok_or_else(|| Error::MergeOptions("cannot order non-finite numbers".into())),
        Kind::String => Ok(left
            .as_str()
            .unwrap_or_default()
            .cmp(right.as_str().unwrap_or_default())),
        Kind::Bool => Ok(left
            .as_bool()
            .unwrap_or_default()
            .cmp(&right.as_bool().unwrap_or_default())),
        kind => Err(Error::MergeOptions(format!(
            "cannot order {kind} values in a sorted merge"
        ))),
    }
}
