//! Translates an expanded schema value into an instruction program.

use ahash::AHashMap;
use dynjson_value::Json;
use fancy_regex::Regex;

use crate::instructions::{
    Additional, ArrayCheck, Instr, InstrId, NumericCheck, ObjectCheck, Program, TextCheck,
    TypeCheck,
};
use crate::SchemaError;

pub(crate) struct Compiler<'p> {
    program: &'p mut Program,
    /// Compilation cache keyed by schema node identity. Holds the
    /// reserved slot of every node whose compilation has started, so a
    /// recursive schema resolves to the placeholder instead of recursing
    /// forever.
    cache: AHashMap<usize, InstrId>,
}

impl<'p> Compiler<'p> {
    pub(crate) fn new(program: &'p mut Program) -> Compiler<'p> {
        Compiler {
            program,
            cache: AHashMap::new(),
        }
    }

    pub(crate) fn compile(&mut self, schema: &Json) -> Result<InstrId, SchemaError> {
        if let Some(&id) = self.cache.get(&schema.node_id()) {
            tracing::trace!(node = schema.node_id(), "compilation cache hit");
            return Ok(id);
        }
        if !schema.is_object() {
            return Err(invalid(format!(
                "a schema must be an object, got {}",
                schema.preview(50)
            )));
        }
        let id = self.program.reserve();
        self.cache.insert(schema.node_id(), id);
        let mut sequence = Vec::new();

        if let Some(types) = schema.get("type")? {
            if types.as_str() != Some("any") {
                sequence.push(self.compile_type(&types)?);
            }
        }
        if let Some(options) = schema.get("enum")? {
            if !options.is_array() {
                return Err(invalid("`enum` must be an array"));
            }
            sequence.push(self.program.push(Instr::Enum { options }));
        }
        if let Some(all_of) = schema.get("allOf")? {
            let subs = self.compile_list(&all_of, "allOf")?;
            sequence.push(self.program.push(Instr::Sequence(subs)));
        }
        if let Some(any_of) = schema.get("anyOf")? {
            let alternates = self.compile_list(&any_of, "anyOf")?;
            sequence.push(self.program.push(Instr::AnyOf {
                alternates,
                schema: any_of,
            }));
        }
        if let Some(one_of) = schema.get("oneOf")? {
            let alternates = self.compile_list(&one_of, "oneOf")?;
            sequence.push(self.program.push(Instr::OneOf {
                alternates,
                schema: one_of,
            }));
        }
        if let Some(not) = schema.get("not")? {
            let inner = self.compile(&not)?;
            sequence.push(self.program.push(Instr::Not { inner, schema: not }));
        }
        if let Some(required) = schema.get("required")? {
            if !required.is_array() {
                return Err(invalid("`required` must be an array of property names"));
            }
            for name in required.elements()? {
                let name = name
                    .as_str()
                    .ok_or_else(|| invalid("`required` entries must be strings"))?;
                sequence.push(self.program.push(Instr::Required {
                    property: name.to_string(),
                }));
            }
        }

        let object_check = self.compile_object_shape(schema)?;
        if !object_check.is_trivial() {
            sequence.push(self.program.push(Instr::Object(object_check)));
        }
        if let Some(array_check) = self.compile_array_shape(schema)? {
            sequence.push(self.program.push(Instr::Array(array_check)));
        }
        if let Some(numeric_check) = self.compile_numeric(schema)? {
            sequence.push(self.program.push(Instr::Numeric(numeric_check)));
        }
        if let Some(text_check) = self.compile_text(schema)? {
            sequence.push(self.program.push(Instr::Text(text_check)));
        }
        self.compile_dependencies(schema, &mut sequence)?;

        self.program.fill(id, Instr::Sequence(sequence));
        Ok(id)
    }

    fn compile_type(&mut self, types: &Json) -> Result<InstrId, SchemaError> {
        let (allowed, rendered) = if let Some(name) = types.as_str() {
            (vec![parse_type(name)?], types.preview(50))
        } else if types.is_array() {
            let mut allowed = Vec::new();
            for entry in types.elements()? {
                let name = entry
                    .as_str()
                    .ok_or_else(|| invalid("`type` entries must be strings"))?;
                allowed.push(parse_type(name)?);
            }
            (allowed, types.preview(50))
        } else {
            return Err(invalid("`type` must be a string or an array of strings"));
        };
        Ok(self.program.push(Instr::Type { allowed, rendered }))
    }

    fn compile_list(&mut self, list: &Json, keyword: &str) -> Result<Vec<InstrId>, SchemaError> {
        if !list.is_array() {
            return Err(invalid(format!("`{keyword}` must be an array of schemas")));
        }
        let mut compiled = Vec::new();
        for sub in list.elements()? {
            compiled.push(self.compile(&sub)?);
        }
        Ok(compiled)
    }

    fn compile_object_shape(&mut self, schema: &Json) -> Result<ObjectCheck, SchemaError> {
        let mut check = ObjectCheck {
            min_properties: 0,
            max_properties: usize::MAX,
            properties: Vec::new(),
            pattern_properties: Vec::new(),
            additional: Additional::Any,
        };
        if let Some(properties) = schema.get("properties")? {
            if !properties.is_object() {
                return Err(invalid("`properties` must be an object"));
            }
            let mut entries = properties.entries()?;
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (name, sub) in entries {
                check.properties.push((name, self.compile(&sub)?));
            }
        }
        if let Some(patterns) = schema.get("patternProperties")? {
            if !patterns.is_object() {
                return Err(invalid("`patternProperties` must be an object"));
            }
            let mut entries = patterns.entries()?;
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (pattern, sub) in entries {
                let regex = compile_regex(&pattern)?;
                check.pattern_properties.push((regex, self.compile(&sub)?));
            }
        }
        if let Some(additional) = schema.get("additionalProperties")? {
            check.additional = self.compile_additional(&additional, "additionalProperties")?;
        }
        if let Some(min) = usize_keyword(schema, "minProperties")? {
            check.min_properties = min;
        }
        if let Some(max) = usize_keyword(schema, "maxProperties")? {
            check.max_properties = max;
        }
        Ok(check)
    }

    fn compile_array_shape(&mut self, schema: &Json) -> Result<Option<ArrayCheck>, SchemaError> {
        let mut check = ArrayCheck {
            min_items: 0,
            max_items: usize::MAX,
            unique_items: false,
            items: None,
            positional: None,
            additional: Additional::Any,
        };
        let mut unique_present = false;
        if let Some(items) = schema.get("items")? {
            if items.is_object() {
                check.items = Some(self.compile(&items)?);
            } else if items.is_array() {
                let mut positional = Vec::new();
                for sub in items.elements()? {
                    positional.push(self.compile(&sub)?);
                }
                check.positional = Some(positional);
            } else {
                return Err(invalid("`items` must be a schema or an array of schemas"));
            }
        }
        if let Some(additional) = schema.get("additionalItems")? {
            check.additional = self.compile_additional(&additional, "additionalItems")?;
        }
        if let Some(unique) = schema.get("uniqueItems")? {
            check.unique_items = unique
                .as_bool()
                .ok_or_else(|| invalid("`uniqueItems` must be a boolean"))?;
            unique_present = true;
        }
        if let Some(min) = usize_keyword(schema, "minItems")? {
            check.min_items = min;
        }
        if let Some(max) = usize_keyword(schema, "maxItems")? {
            check.max_items = max;
        }
        let trivial = check.items.is_none()
            && check.positional.is_none()
            && matches!(check.additional, Additional::Any)
            && !unique_present
            && check.min_items == 0
            && check.max_items == usize::MAX;
        Ok(if trivial { None } else { Some(check) })
    }

    fn compile_additional(
        &mut self,
        value: &Json,
        keyword: &str,
    ) -> Result<Additional, SchemaError> {
        if value.is_object() {
            Ok(Additional::Schema(self.compile(value)?))
        } else if let Some(allowed) = value.as_bool() {
            Ok(if allowed {
                Additional::Any
            } else {
                Additional::Forbidden
            })
        } else {
            Err(invalid(format!("`{keyword}` must be a schema or a boolean")))
        }
    }

    fn compile_numeric(&mut self, schema: &Json) -> Result<Option<NumericCheck>, SchemaError> {
        let check = NumericCheck {
            minimum: f64_keyword(schema, "minimum")?,
            maximum: f64_keyword(schema, "maximum")?,
            multiple_of: f64_keyword(schema, "multipleOf")?,
            exclusive_minimum: bool_keyword(schema, "exclusiveMinimum")?.unwrap_or(false),
            exclusive_maximum: bool_keyword(schema, "exclusiveMaximum")?.unwrap_or(false),
        };
        // Exclusivity flags only matter alongside a bound.
        if check.minimum.is_none() && check.maximum.is_none() && check.multiple_of.is_none() {
            Ok(None)
        } else {
            Ok(Some(check))
        }
    }

    fn compile_text(&mut self, schema: &Json) -> Result<Option<TextCheck>, SchemaError> {
        let mut check = TextCheck {
            min_length: 0,
            max_length: usize::MAX,
            pattern: None,
        };
        if let Some(min) = usize_keyword(schema, "minLength")? {
            check.min_length = min;
        }
        if let Some(max) = usize_keyword(schema, "maxLength")? {
            check.max_length = max;
        }
        if let Some(pattern) = schema.get("pattern")? {
            let pattern = pattern
                .as_str()
                .ok_or_else(|| invalid("`pattern` must be a string"))?;
            check.pattern = Some(compile_regex(pattern)?);
        }
        if check.min_length == 0 && check.max_length == usize::MAX && check.pattern.is_none() {
            Ok(None)
        } else {
            Ok(Some(check))
        }
    }

    fn compile_dependencies(
        &mut self,
        schema: &Json,
        sequence: &mut Vec<InstrId>,
    ) -> Result<(), SchemaError> {
        let Some(dependencies) = schema.get("dependencies")? else {
            return Ok(());
        };
        if !dependencies.is_object() {
            return Err(invalid("`dependencies` must be an object"));
        }
        let mut entries = dependencies.entries()?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (property, value) in entries {
            if value.is_object() {
                let compiled = self.compile(&value)?;
                sequence.push(self.program.push(Instr::SchemaDependency {
                    property,
                    schema: compiled,
                }));
            } else if value.is_array() {
                let mut required = Vec::new();
                for name in value.elements()? {
                    let name = name.as_str().ok_or_else(|| {
                        invalid("`dependencies` property lists must contain strings")
                    })?;
                    required.push(name.to_string());
                }
                sequence.push(
                    self.program
                        .push(Instr::PropertyDependency { property, required }),
                );
            } else if let Some(name) = value.as_str() {
                // A bare property name is treated as a one-element list.
                sequence.push(self.program.push(Instr::PropertyDependency {
                    property,
                    required: vec![name.to_string()],
                }));
            } else {
                return Err(invalid(
                    "`dependencies` values must be schemas or property lists",
                ));
            }
        }
        Ok(())
    }
}

fn parse_type(name: &str) -> Result<TypeCheck, SchemaError> {
    TypeCheck::from_name(name)
        .ok_or_else(|| invalid(format!("unknown type `{name}` in `type` keyword")))
}

fn compile_regex(pattern: &str) -> Result<Regex, SchemaError> {
    Regex::new(pattern).map_err(|e| SchemaError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

fn invalid(message: impl Into<String>) -> SchemaError {
    SchemaError::InvalidSchema(message.into())
}

fn f64_keyword(schema: &Json, keyword: &str) -> Result<Option<f64>, SchemaError> {
    match schema.get(keyword)? {
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| invalid(format!("`{keyword}` must be a number"))),
        None => Ok(None),
    }
}

fn bool_keyword(schema: &Json, keyword: &str) -> Result<Option<bool>, SchemaError> {
    match schema.get(keyword)? {
        Some(value) => value
            .as_bool()
            .map(Some)
            .ok_or_else(|| invalid(format!("`{keyword}` must be a boolean"))),
        None => Ok(None),
    }
}

fn usize_keyword(schema: &Json, keyword: &str) -> Result<Option<usize>, SchemaError> {
    match schema.get(keyword)? {
        Some(value) => {
            let n = value
                .as_i64()
                .filter(|n| *n >= 0)
                .ok_or_else(|| invalid(format!("`{keyword}` must be a non-negative integer")))?;
            Ok(Some(n as usize))
        }
        None => Ok(None),
    }
}
