use dynjson::{schema, Json, Retrieve, SchemaError, Uri};
use serde_json::json;
use test_case::test_case;

fn j(value: serde_json::Value) -> Json {
    Json::make(value)
}

fn validate(schema_doc: serde_json::Value, document: serde_json::Value) -> Json {
    schema(j(schema_doc))
        .expect("schema must compile")
        .validate(&j(document))
        .expect("validation must run")
}

fn errors_of(report: &Json) -> Vec<String> {
    report
        .get("errors")
        .unwrap()
        .map(|errors| {
            errors
                .elements()
                .unwrap()
                .iter()
                .map(|e| e.as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[test_case(json!(5), true; "integer accepts 5")]
#[test_case(json!(5.5), false; "integer rejects 5.5")]
#[test_case(json!("5"), false; "integer rejects a numeric string")]
#[test_case(json!(5.0), true; "integral float counts as integer")]
fn type_integer(document: serde_json::Value, ok: bool) {
    let report = validate(json!({"type": "integer"}), document);
    assert!(report.is("ok", ok), "{report:?}");
    if !ok {
        assert!(!errors_of(&report).is_empty());
    }
}

#[test_case(json!("x"), true)]
#[test_case(json!(null), true)]
#[test_case(json!(3), false)]
fn type_lists(document: serde_json::Value, ok: bool) {
    let report = validate(json!({"type": ["string", "null"]}), document);
    assert!(report.is("ok", ok));
}

#[test]
fn required_reports_each_missing_property() {
    let report = validate(
        json!({"type": "object", "required": ["a", "b"]}),
        json!({"a": 1}),
    );
    assert!(report.is("ok", false));
    let errors = errors_of(&report);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains('b'), "{errors:?}");
}

#[test]
fn recursive_schema_validates_recursive_data() {
    let validator = schema(j(json!({
        "id": "urn:t",
        "type": "object",
        "properties": {"child": {"$ref": "urn:t"}},
    })))
    .unwrap();

    let report = validator
        .validate(&j(json!({"child": {"child": {}}})))
        .unwrap();
    assert!(report.is("ok", true), "{report:?}");

    let report = validator
        .validate(&j(json!({"child": {"child": "x"}})))
        .unwrap();
    assert!(report.is("ok", false), "{report:?}");
}

#[test_case(json!("a"), true; "string matches")]
#[test_case(json!(3), true; "number matches")]
#[test_case(json!(true), false; "boolean matches neither")]
#[test_case(json!(null), false; "null matches neither")]
fn one_of(document: serde_json::Value, ok: bool) {
    let report = validate(
        json!({"oneOf": [{"type": "string"}, {"type": "number"}]}),
        document,
    );
    assert!(report.is("ok", ok));
}

#[test]
fn one_of_rejects_multiple_matches() {
    // An integral number matches both branches.
    let report = validate(
        json!({"oneOf": [{"type": "integer"}, {"type": "number"}]}),
        json!(4),
    );
    assert!(report.is("ok", false));
}

#[test]
fn unique_items_reports_one_duplicate() {
    let report = validate(json!({"type": "array", "uniqueItems": true}), json!([1, 2, 2]));
    assert!(report.is("ok", false));
    let errors = errors_of(&report);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].contains("duplicate"));
}

#[test]
fn pattern_properties_with_closed_object() {
    let report = validate(
        json!({
            "patternProperties": {"^x": {"type": "number"}},
            "additionalProperties": false,
        }),
        json!({"x1": 1, "y": 2}),
    );
    assert!(report.is("ok", false));
    let errors = errors_of(&report);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].contains("'y'"), "{errors:?}");
}

#[test]
fn any_of_collapses_branch_errors_into_one_summary() {
    let report = validate(
        json!({"anyOf": [{"type": "string"}, {"type": "number"}]}),
        json!(true),
    );
    assert!(report.is("ok", false));
    let errors = errors_of(&report);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("at least one"), "{errors:?}");
}

#[test]
fn all_of_accumulates_errors_from_every_branch() {
    let report = validate(
        json!({"allOf": [{"type": "object"}, {"minProperties": 1}]}),
        json!([]),
    );
    assert!(report.is("ok", false));
    // Only the type branch fails: minProperties ignores non-objects.
    assert_eq!(errors_of(&report).len(), 1);

    let report = validate(
        json!({"allOf": [{"minimum": 10}, {"multipleOf": 3}]}),
        json!(4),
    );
    let errors = errors_of(&report);
    assert_eq!(errors.len(), 2, "{errors:?}");
    // Declaration order is preserved.
    assert!(errors[0].contains("minimum"));
    assert!(errors[1].contains("multiple"));
}

#[test]
fn not_inverts_the_inner_schema() {
    assert!(validate(json!({"not": {"type": "string"}}), json!(1)).is("ok", true));
    assert!(validate(json!({"not": {"type": "string"}}), json!("s")).is("ok", false));
}

#[test_case(json!({"enum": [1, "a", [2]]}), json!("a"), true)]
#[test_case(json!({"enum": [1, "a", [2]]}), json!([2]), true)]
#[test_case(json!({"enum": [1, "a", [2]]}), json!(2), false)]
#[test_case(json!({"enum": [1]}), json!(1.0), true; "enum compares numbers by value")]
fn enumerations(schema_doc: serde_json::Value, document: serde_json::Value, ok: bool) {
    assert!(validate(schema_doc, document).is("ok", ok));
}

#[test_case(json!(3), true; "above minimum")]
#[test_case(json!(2), true; "at inclusive minimum")]
#[test_case(json!(1), false; "below minimum")]
fn minimum_bound(document: serde_json::Value, ok: bool) {
    assert!(validate(json!({"minimum": 2}), document).is("ok", ok));
}

#[test]
fn exclusive_bounds_reject_the_boundary() {
    let schema_doc = json!({"minimum": 2, "exclusiveMinimum": true});
    assert!(validate(schema_doc.clone(), json!(2)).is("ok", false));
    assert!(validate(schema_doc, json!(2.001)).is("ok", true));

    let schema_doc = json!({"maximum": 10, "exclusiveMaximum": true});
    assert!(validate(schema_doc.clone(), json!(10)).is("ok", false));
    assert!(validate(schema_doc, json!(9)).is("ok", true));
}

#[test_case(json!(9), true)]
#[test_case(json!(10), false)]
fn multiple_of(document: serde_json::Value, ok: bool) {
    assert!(validate(json!({"multipleOf": 3}), document).is("ok", ok));
}

#[test]
fn string_length_counts_code_points() {
    let schema_doc = json!({"minLength": 2, "maxLength": 3});
    assert!(validate(schema_doc.clone(), json!("ab")).is("ok", true));
    assert!(validate(schema_doc.clone(), json!("a")).is("ok", false));
    assert!(validate(schema_doc.clone(), json!("abcd")).is("ok", false));
    // Two code points, even though each takes several UTF-8 bytes.
    assert!(validate(schema_doc, json!("漢字")).is("ok", true));
}

#[test]
fn pattern_searches_instead_of_anchoring() {
    // Draft-4 `pattern` is a search, so an unanchored pattern matches
    // in the middle of the string.
    assert!(validate(json!({"pattern": "b+c"}), json!("abbcd")).is("ok", true));
    assert!(validate(json!({"pattern": "^b"}), json!("abc")).is("ok", false));
}

#[test]
fn positional_items_with_additional_false() {
    let schema_doc = json!({
        "items": [{"type": "number"}, {"type": "string"}],
        "additionalItems": false,
    });
    assert!(validate(schema_doc.clone(), json!([1, "a"])).is("ok", true));
    let report = validate(schema_doc.clone(), json!([1, "a", true]));
    assert!(report.is("ok", false));
    assert!(errors_of(&report)[0].contains("Additional items"));
    assert!(validate(schema_doc, json!(["a", 1])).is("ok", false));
}

#[test]
fn single_items_schema_applies_to_every_element() {
    let schema_doc = json!({"items": {"type": "number"}});
    assert!(validate(schema_doc.clone(), json!([1, 2, 3])).is("ok", true));
    let report = validate(schema_doc, json!([1, "x", "y"]));
    assert_eq!(errors_of(&report).len(), 2);
}

#[test]
fn array_bounds() {
    let schema_doc = json!({"minItems": 1, "maxItems": 2});
    assert!(validate(schema_doc.clone(), json!([1])).is("ok", true));
    assert!(validate(schema_doc.clone(), json!([])).is("ok", false));
    assert!(validate(schema_doc, json!([1, 2, 3])).is("ok", false));
}

#[test]
fn property_dependencies() {
    let schema_doc = json!({"dependencies": {"a": ["b", "c"]}});
    assert!(validate(schema_doc.clone(), json!({"x": 1})).is("ok", true));
    assert!(validate(schema_doc.clone(), json!({"a": 1, "b": 2, "c": 3})).is("ok", true));
    let report = validate(schema_doc, json!({"a": 1, "b": 2}));
    assert!(report.is("ok", false));
    assert!(errors_of(&report)[0].contains('c'));
}

#[test]
fn schema_dependencies() {
    let schema_doc = json!({"dependencies": {"a": {"required": ["b"]}}});
    assert!(validate(schema_doc.clone(), json!({"b": 1})).is("ok", true));
    assert!(validate(schema_doc.clone(), json!({"a": 1, "b": 1})).is("ok", true));
    assert!(validate(schema_doc, json!({"a": 1})).is("ok", false));
}

#[test]
fn object_property_bounds_have_distinct_messages() {
    let report = validate(json!({"minProperties": 2}), json!({"a": 1}));
    assert!(errors_of(&report)[0].contains("fewer than the permitted 2"));
    let report = validate(json!({"maxProperties": 1}), json!({"a": 1, "b": 2}));
    assert!(errors_of(&report)[0].contains("more than the permitted 1"));
}

#[test]
fn local_fragment_refs_resolve_without_a_base_uri() {
    let validator = schema(j(json!({
        "definitions": {"positive": {"minimum": 1}},
        "properties": {"count": {"$ref": "#/definitions/positive"}},
    })))
    .unwrap();
    assert!(validator
        .validate(&j(json!({"count": 5})))
        .unwrap()
        .is("ok", true));
    assert!(validator
        .validate(&j(json!({"count": 0})))
        .unwrap()
        .is("ok", false));
}

struct MapRetriever(ahash::AHashMap<String, Json>);

impl Retrieve for MapRetriever {
    fn retrieve(
        &self,
        uri: &Uri<String>,
    ) -> Result<Json, Box<dyn std::error::Error + Send + Sync>> {
        self.0
            .get(&uri.to_string())
            .cloned()
            .ok_or_else(|| format!("no such document: {uri}").into())
    }
}

#[test]
fn cross_document_references_validate() {
    let mut documents = ahash::AHashMap::new();
    documents.insert(
        "http://types.example/strings.json".to_string(),
        j(json!({"definitions": {"short": {"type": "string", "maxLength": 3}}})),
    );
    let retriever = MapRetriever(documents);

    let validator = dynjson::schema_with_retriever(
        j(json!({
            "properties": {
                "tag": {"$ref": "http://types.example/strings.json#/definitions/short"},
            },
        })),
        None,
        &retriever,
    )
    .unwrap();

    assert!(validator
        .validate(&j(json!({"tag": "abc"})))
        .unwrap()
        .is("ok", true));
    assert!(validator
        .validate(&j(json!({"tag": "abcd"})))
        .unwrap()
        .is("ok", false));
}

#[test]
fn validation_does_not_mutate_the_document() {
    let validator = schema(j(json!({
        "type": "object",
        "properties": {"a": {"type": "number"}},
        "additionalProperties": false,
    })))
    .unwrap();
    let document = j(json!({"a": 1, "b": "extra"}));
    let before = document.dup();
    validator.validate(&document).unwrap();
    assert_eq!(document, before);
}

#[test]
fn ok_report_has_no_errors_key() {
    let report = validate(json!({"type": "number"}), json!(1));
    assert!(report.is("ok", true));
    assert!(report.get("errors").unwrap().is_none());
}

#[test]
fn malformed_keywords_fail_compilation() {
    assert!(matches!(
        schema(j(json!({"required": "name"}))),
        Err(SchemaError::InvalidSchema(_))
    ));
    assert!(matches!(
        schema(j(json!({"minimum": "low"}))),
        Err(SchemaError::InvalidSchema(_))
    ));
    assert!(matches!(
        schema(j(json!({"pattern": "("}))),
        Err(SchemaError::InvalidPattern { .. })
    ));
    assert!(matches!(
        schema(j(json!({"type": "integerish"}))),
        Err(SchemaError::InvalidSchema(_))
    ));
}

#[test]
fn validators_are_reentrant_across_calls() {
    // The `checked` bookkeeping of the object validator is per call, so
    // interleaved validations of different documents cannot bleed into
    // each other.
    let validator = schema(j(json!({
        "patternProperties": {"^x": {"type": "number"}},
        "additionalProperties": false,
    })))
    .unwrap();
    assert!(validator
        .validate(&j(json!({"x1": 1})))
        .unwrap()
        .is("ok", true));
    let report = validator.validate(&j(json!({"y": 2}))).unwrap();
    assert!(report.is("ok", false));
    assert_eq!(errors_of(&report).len(), 1);
    assert!(validator
        .validate(&j(json!({"x2": 3})))
        .unwrap()
        .is("ok", true));
}
