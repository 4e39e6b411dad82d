//! Executes an instruction program against a document.
//!
//! Validation accumulates errors instead of short-circuiting, except
//! inside `anyOf`/`oneOf`/`not`, whose branch outcomes are only counted.
//! Instructions never mutate the document.

use ahash::AHashSet;
use dynjson_value::{Json, Number};
use num_cmp::NumCmp;

use crate::instructions::{
    Additional, ArrayCheck, Instr, InstrId, NumericCheck, ObjectCheck, Program, TextCheck,
    TypeCheck,
};
use crate::SchemaError;

/// Budget for value previews inside error messages.
const MAX_CHARS: usize = 50;

impl Program {
    /// Apply one instruction. `None` means no errors; otherwise the
    /// returned value is an array of error strings.
    pub(crate) fn apply(
        &self,
        id: InstrId,
        document: &Json,
    ) -> Result<Option<Json>, SchemaError> {
        match self.get(id) {
            Instr::Sequence(children) => {
                let mut errors = None;
                for &child in children {
                    let result = self.apply(child, document)?;
                    accumulate(&mut errors, result)?;
                }
                Ok(errors)
            }
            Instr::Type { allowed, rendered } => {
                if allowed.iter().any(|check| matches_type(*check, document)) {
                    Ok(None)
                } else {
                    Ok(single(format!(
                        "Type mismatch for {}, allowed types: {rendered}",
                        document.preview(MAX_CHARS)
                    )))
                }
            }
            Instr::Enum { options } => {
                for option in options.elements()? {
                    if option == *document {
                        return Ok(None);
                    }
                }
                Ok(single(format!(
                    "Element {} doesn't match any of enumerated possibilities {}",
                    document.preview(MAX_CHARS),
                    options.preview(MAX_CHARS)
                )))
            }
            Instr::AnyOf { alternates, schema } => {
                for &alternate in alternates {
                    if self.apply(alternate, document)?.is_none() {
                        return Ok(None);
                    }
                }
                Ok(single(format!(
                    "Element {} must conform to at least one of the available sub-schemas {}",
                    document.preview(MAX_CHARS),
                    schema.preview(MAX_CHARS)
                )))
            }
            Instr::OneOf { alternates, schema } => {
                let mut matches = 0;
                for &alternate in alternates {
                    if self.apply(alternate, document)?.is_none() {
                        matches += 1;
                    }
                }
                if matches == 1 {
                    Ok(None)
                } else {
                    Ok(single(format!(
                        "Element {} must conform to exactly one of the available sub-schemas {}",
                        document.preview(MAX_CHARS),
                        schema.preview(MAX_CHARS)
                    )))
                }
            }
            Instr::Not { inner, schema } => {
                if self.apply(*inner, document)?.is_some() {
                    Ok(None)
                } else {
                    Ok(single(format!(
                        "Element {} must NOT conform to the schema {}",
                        document.preview(MAX_CHARS),
                        schema.preview(MAX_CHARS)
                    )))
                }
            }
            Instr::Required { property } => {
                if document.is_object() && !document.has(property)? {
                    Ok(single(format!(
                        "Required property {property} missing from object {}",
                        document.preview(MAX_CHARS)
                    )))
                } else {
                    Ok(None)
                }
            }
            Instr::Object(check) => self.apply_object(check, document),
            Instr::Array(check) => self.apply_array(check, document),
            Instr::Numeric(check) => apply_numeric(check, document),
            Instr::Text(check) => apply_text(check, document),
            Instr::SchemaDependency { property, schema } => {
                if document.is_object() && document.has(property)? {
                    self.apply(*schema, document)
                } else {
                    Ok(None)
                }
            }
            Instr::PropertyDependency { property, required } => {
                if !document.is_object() || !document.has(property)? {
                    return Ok(None);
                }
                let mut errors = None;
                for name in required {
                    if !document.has(name)? {
                        accumulate(
                            &mut errors,
                            single(format!(
                                "Conditionally required property {name} missing from object {}",
                                document.preview(MAX_CHARS)
                            )),
                        )?;
                    }
                }
                Ok(errors)
            }
        }
    }

    fn apply_object(
        &self,
        check: &ObjectCheck,
        document: &Json,
    ) -> Result<Option<Json>, SchemaError> {
        if !document.is_object() {
            return Ok(None);
        }
        let mut errors = None;
        // Scoped per call so validators stay re-entrant.
        let mut checked: AHashSet<String> = AHashSet::new();
        for (name, schema) in &check.properties {
            if let Some(value) = document.get(name)? {
                checked.insert(name.clone());
                let result = self.apply(*schema, &value)?;
                accumulate(&mut errors, result)?;
            }
        }
        for (pattern, schema) in &check.pattern_properties {
            for (name, value) in document.entries()? {
                if pattern.is_match(&name).unwrap_or(false) {
                    checked.insert(name);
                    let result = self.apply(*schema, &value)?;
                    accumulate(&mut errors, result)?;
                }
            }
        }
        match &check.additional {
            Additional::Any => {}
            Additional::Forbidden => {
                for (name, _) in document.entries()? {
                    if !checked.contains(&name) {
                        accumulate(
                            &mut errors,
                            single(format!(
                                "Extra property '{name}', schema doesn't allow any properties \
                                 not explicitly defined: {}",
                                document.preview(MAX_CHARS)
                            )),
                        )?;
                    }
                }
            }
            Additional::Schema(schema) => {
                for (name, value) in document.entries()? {
                    if !checked.contains(&name) {
                        let result = self.apply(*schema, &value)?;
                        accumulate(&mut errors, result)?;
                    }
                }
            }
        }
        let count = document.len()?;
        if count < check.min_properties {
            accumulate(
                &mut errors,
                single(format!(
                    "Object {} has fewer than the permitted {} number of properties.",
                    document.preview(MAX_CHARS),
                    check.min_properties
                )),
            )?;
        }
        if count > check.max_properties {
            accumulate(
                &mut errors,
                single(format!(
                    "Object {} has more than the permitted {} number of properties.",
                    document.preview(MAX_CHARS),
                    check.max_properties
                )),
            )?;
        }
        Ok(errors)
    }

    fn apply_array(
        &self,
        check: &ArrayCheck,
        document: &Json,
    ) -> Result<Option<Json>, SchemaError> {
        if !document.is_array() {
            return Ok(None);
        }
        if check.items.is_none()
            && check.positional.is_none()
            && matches!(check.additional, Additional::Forbidden)
        {
            // `additionalItems: false` with no item schemas constrains
            // nothing.
            return Ok(None);
        }
        let mut errors = None;
        let elements = document.elements()?;
        for (index, element) in elements.iter().enumerate() {
            let slot = if let Some(items) = check.items {
                Some(items)
            } else if check
                .positional
                .as_ref()
                .is_some_and(|positional| index < positional.len())
            {
                check.positional.as_ref().map(|positional| positional[index])
            } else {
                match &check.additional {
                    Additional::Schema(schema) => Some(*schema),
                    Additional::Any => None,
                    Additional::Forbidden => {
                        accumulate(
                            &mut errors,
                            single(format!(
                                "Additional items are not permitted: {} in {}",
                                element.preview(MAX_CHARS),
                                document.preview(MAX_CHARS)
                            )),
                        )?;
                        None
                    }
                }
            };
            if let Some(schema) = slot {
                let result = self.apply(schema, element)?;
                accumulate(&mut errors, result)?;
            }
            if check.unique_items
                && elements[index + 1..].iter().any(|other| other == element)
            {
                accumulate(
                    &mut errors,
                    single(format!(
                        "Element {} is duplicate in array.",
                        element.preview(MAX_CHARS)
                    )),
                )?;
            }
        }
        let count = elements.len();
        if count < check.min_items || count > check.max_items {
            accumulate(
                &mut errors,
                single(format!(
                    "Array {} has number of elements outside of the permitted range [{}, {}].",
                    document.preview(MAX_CHARS),
                    check.min_items,
                    render_limit(check.max_items)
                )),
            )?;
        }
        Ok(errors)
    }
}

fn apply_numeric(check: &NumericCheck, document: &Json) -> Result<Option<Json>, SchemaError> {
    let Some(number) = document.as_number() else {
        return Ok(None);
    };
    let mut errors = None;
    if let Some(minimum) = check.minimum {
        if below_minimum(number, minimum, check.exclusive_minimum) {
            accumulate(
                &mut errors,
                single(format!(
                    "Number {} is below allowed minimum {minimum}",
                    document.preview(MAX_CHARS)
                )),
            )?;
        }
    }
    if let Some(maximum) = check.maximum {
        if above_maximum(number, maximum, check.exclusive_maximum) {
            accumulate(
                &mut errors,
                single(format!(
                    "Number {} is above allowed maximum {maximum}",
                    document.preview(MAX_CHARS)
                )),
            )?;
        }
    }
    if let Some(multiple_of) = check.multiple_of {
        if (number.as_f64() / multiple_of) % 1.0 != 0.0 {
            accumulate(
                &mut errors,
                single(format!(
                    "Number {} is not a multiple of {multiple_of}",
                    document.preview(MAX_CHARS)
                )),
            )?;
        }
    }
    Ok(errors)
}

fn apply_text(check: &TextCheck, document: &Json) -> Result<Option<Json>, SchemaError> {
    let Some(text) = document.as_str() else {
        return Ok(None);
    };
    let mut errors = None;
    // Length in Unicode code points, not code units.
    let length = text.chars().count();
    if length < check.min_length || length > check.max_length {
        accumulate(
            &mut errors,
            single(format!(
                "String {} has length outside of the permitted range [{}, {}].",
                document.preview(MAX_CHARS),
                check.min_length,
                render_limit(check.max_length)
            )),
        )?;
    }
    if let Some(pattern) = &check.pattern {
        // Draft-4 semantics: the pattern searches anywhere in the string,
        // it is not anchored.
        if !pattern.is_match(text).unwrap_or(false) {
            accumulate(
                &mut errors,
                single(format!(
                    "String {} does not match regex {}",
                    document.preview(MAX_CHARS),
                    pattern.as_str()
                )),
            )?;
        }
    }
    Ok(errors)
}

fn matches_type(check: TypeCheck, document: &Json) -> bool {
    match check {
        TypeCheck::Null => document.is_null(),
        TypeCheck::Boolean => document.is_bool(),
        TypeCheck::Number => document.is_number(),
        TypeCheck::String => document.is_string(),
        TypeCheck::Array => document.is_array(),
        TypeCheck::Object => document.is_object(),
        TypeCheck::Integer => document.as_number().is_some_and(Number::is_integral),
        TypeCheck::Any => true,
    }
}

/// Exact comparison of a document number against an `f64` bound. Native
/// integers compare without going through a lossy `f64` conversion.
fn below_minimum(value: &Number, limit: f64, exclusive: bool) -> bool {
    match value {
        Number::Int(i) => {
            if exclusive {
                !NumCmp::num_gt(*i, limit)
            } else {
                NumCmp::num_lt(*i, limit)
            }
        }
        other => {
            let v = other.as_f64();
            if exclusive {
                v <= limit
            } else {
                v < limit
            }
        }
    }
}

fn above_maximum(value: &Number, limit: f64, exclusive: bool) -> bool {
    match value {
        Number::Int(i) => {
            if exclusive {
                !NumCmp::num_lt(*i, limit)
            } else {
                NumCmp::num_gt(*i, limit)
            }
        }
        other => {
            let v = other.as_f64();
            if exclusive {
                v >= limit
            } else {
                v > limit
            }
        }
    }
}

fn render_limit(limit: usize) -> String {
    if limit == usize::MAX {
        "unbounded".to_string()
    } else {
        limit.to_string()
    }
}

fn single(message: String) -> Option<Json> {
    Some(Json::string(message))
}

/// Fold one instruction's outcome into the accumulated errors: a single
/// error is appended, an array of errors is concatenated.
fn accumulate(errors: &mut Option<Json>, more: Option<Json>) -> Result<(), SchemaError> {
    if let Some(more) = more {
        if errors.is_none() {
            *errors = Some(Json::array());
        }
        if let Some(target) = errors {
            target.with(&more, &[])?;
        }
    }
    Ok(())
}

