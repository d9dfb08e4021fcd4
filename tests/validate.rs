// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use schema_tools::{
    CompileError, Compiler, ExtensionCompiler, ExtensionError, ExtensionSchema, InstanceError,
    SchemaRef, UrlLoader,
};
use serde_json::{json, Map, Value};

fn compiler_with(resources: &[(&str, Value)]) -> Compiler {
    let mut c = Compiler::new();
    for (url, doc) in resources {
        c.add_resource(url, serde_json::to_vec(doc).unwrap().as_slice()).unwrap();
    }
    c
}

fn compile_one(doc: Value) -> (Compiler, SchemaRef) {
    let mut c = compiler_with(&[("schema.json", doc)]);
    let sch = c.compile("schema.json").unwrap();
    (c, sch)
}

#[test]
fn test_integer_minimum() {
    let (c, sch) = compile_one(json!({"type": "integer", "minimum": 0}));
    assert!(c.validate(sch, &json!(3)).is_ok());

    let err = c.validate(sch, &json!(-1)).unwrap_err();
    assert!(err.leaves().iter().any(|l| l.keyword_location.ends_with("/minimum")));

    let err = c.validate(sch, &json!(3.5)).unwrap_err();
    assert!(err.leaves().iter().any(|l| l.keyword_location.ends_with("/type")));

    let err = c.validate(sch, &json!("3")).unwrap_err();
    assert!(err.leaves().iter().any(|l| l.keyword_location.ends_with("/type")));
}

#[test]
fn test_local_ref_into_defs() {
    let (c, sch) = compile_one(json!({
        "$ref": "#/$defs/A",
        "$defs": {"A": {"type": "string"}}
    }));
    assert!(c.validate(sch, &json!("x")).is_ok());
    let err = c.validate(sch, &json!(1)).unwrap_err();
    let leaf = &err.leaves()[0];
    assert!(leaf.absolute_keyword_location.ends_with("/$defs/A/type"));
}

#[test]
fn test_recursive_tree_schema() {
    let (c, sch) = compile_one(json!({
        "$id": "tree",
        "type": "object",
        "properties": {
            "children": {"type": "array", "items": {"$ref": "tree"}}
        }
    }));
    assert!(c.validate(sch, &json!({"children": [{"children": []}]})).is_ok());
    assert!(c.validate(sch, &json!({})).is_ok());

    let err = c.validate(sch, &json!({"children": [1]})).unwrap_err();
    assert!(err.leaves().iter().any(|l| l.instance_location == "/children/0"));
}

#[test]
fn test_dynamic_ref_rebinds_per_call() {
    // A generic list whose element schema is a $dynamicAnchor, overridden by
    // derived schemas at validation time.
    let mut c = compiler_with(&[
        (
            "list",
            json!({
                "$id": "list",
                "type": "array",
                "items": {"$dynamicRef": "#T"},
                "$defs": {"default": {"$dynamicAnchor": "T"}}
            }),
        ),
        (
            "strlist",
            json!({
                "$id": "strlist",
                "$ref": "list",
                "$defs": {"override": {"$dynamicAnchor": "T", "type": "string"}}
            }),
        ),
        (
            "numlist",
            json!({
                "$id": "numlist",
                "$ref": "list",
                "$defs": {"override": {"$dynamicAnchor": "T", "type": "number"}}
            }),
        ),
    ]);
    let list = c.compile("list").unwrap();
    let strlist = c.compile("strlist").unwrap();
    let numlist = c.compile("numlist").unwrap();

    // the base list accepts anything
    assert!(c.validate(list, &json!(["a", 1])).is_ok());
    // each derived schema swaps the effective element type
    assert!(c.validate(strlist, &json!(["a", "b"])).is_ok());
    assert!(c.validate(strlist, &json!(["a", 1])).is_err());
    assert!(c.validate(numlist, &json!([1, 2.5])).is_ok());
    assert!(c.validate(numlist, &json!([1, "a"])).is_err());
}

#[test]
fn test_recursive_ref_rebinds_to_outermost_anchor() {
    let mut c = compiler_with(&[
        (
            "node",
            json!({
                "$schema": "https://json-schema.org/draft/2019-09/schema",
                "$id": "node",
                "$recursiveAnchor": true,
                "type": "object",
                "properties": {
                    "children": {"type": "array", "items": {"$recursiveRef": "#"}}
                }
            }),
        ),
        (
            "strict-node",
            json!({
                "$schema": "https://json-schema.org/draft/2019-09/schema",
                "$id": "strict-node",
                "$recursiveAnchor": true,
                "$ref": "node",
                "properties": {"extra": {"type": "string"}}
            }),
        ),
    ]);
    let node = c.compile("node").unwrap();
    let strict = c.compile("strict-node").unwrap();

    let inst = json!({"children": [{"extra": 42}]});
    // plain node schema does not constrain "extra", even in children
    assert!(c.validate(node, &inst).is_ok());
    // via strict-node, the recursive ref lands back on strict-node
    assert!(c.validate(strict, &inst).is_err());
    assert!(c.validate(strict, &json!({"children": [{"extra": "ok"}]})).is_ok());
}

struct PowerOfCompiler;

impl ExtensionCompiler for PowerOfCompiler {
    fn compile(
        &self,
        obj: &Map<String, Value>,
    ) -> Result<Option<Box<dyn ExtensionSchema>>, CompileError> {
        match obj.get("powerOf").and_then(Value::as_u64) {
            Some(base) => Ok(Some(Box::new(PowerOf(base)))),
            None => Ok(None),
        }
    }
}

#[derive(Debug)]
struct PowerOf(u64);

impl ExtensionSchema for PowerOf {
    fn validate(&self, instance: &Value) -> Result<(), ExtensionError> {
        let Some(mut n) = instance.as_u64() else {
            return Ok(());
        };
        while n > 1 && n % self.0 == 0 {
            n /= self.0;
        }
        if n == 1 {
            Ok(())
        } else {
            Err(ExtensionError {
                keyword: "powerOf".to_string(),
                message: format!("{instance} is not a power of {}", self.0),
            })
        }
    }
}

#[test]
fn test_power_of_extension() {
    let mut c = Compiler::new();
    c.register_extension(
        "powerOf",
        json!({
            "properties": {
                "powerOf": {"type": "integer", "exclusiveMinimum": 0}
            }
        }),
        Box::new(PowerOfCompiler),
    )
    .unwrap();
    c.add_resource("schema.json", br#"{"powerOf": 10}"#.as_slice()).unwrap();
    let sch = c.compile("schema.json").unwrap();

    assert!(c.validate(sch, &json!(100)).is_ok());
    assert!(c.validate(sch, &json!(1)).is_ok());
    assert!(c.validate(sch, &json!("ten")).is_ok());
    let err = c.validate(sch, &json!(99)).unwrap_err();
    assert!(err.leaves().iter().any(|l| l.keyword_location.ends_with("/powerOf")));
}

#[test]
fn test_extension_meta_schema_rejects_bad_usage() {
    let mut c = Compiler::new();
    c.register_extension(
        "powerOf",
        json!({
            "properties": {
                "powerOf": {"type": "integer", "exclusiveMinimum": 0}
            }
        }),
        Box::new(PowerOfCompiler),
    )
    .unwrap();
    c.add_resource("schema.json", br#"{"powerOf": "ten"}"#.as_slice()).unwrap();
    assert!(matches!(c.compile("schema.json"), Err(CompileError::SchemaNotValid { .. })));
}

#[test]
fn test_multiple_of_has_no_float_drift() {
    let (c, sch) = compile_one(json!({"multipleOf": 0.1}));
    assert!(c.validate(sch, &json!(1.1)).is_ok());
    assert!(c.validate(sch, &json!(0.3)).is_ok());
    assert!(c.validate(sch, &json!(1.15)).is_err());
}

#[test]
fn test_unevaluated_properties_across_all_of() {
    let (c, sch) = compile_one(json!({
        "unevaluatedProperties": false,
        "properties": {"a": {}},
        "allOf": [{"properties": {"b": {}}}]
    }));
    assert!(c.validate(sch, &json!({"a": 1, "b": 2})).is_ok());

    let err = c.validate(sch, &json!({"a": 1, "b": 2, "c": 3})).unwrap_err();
    let leaf = &err.leaves()[0];
    assert_eq!(leaf.instance_location, "/c");
    assert!(leaf.keyword_location.contains("unevaluatedProperties"));
}

#[test]
fn test_cross_document_refs() {
    let mut c = compiler_with(&[
        ("https://example.com/a.json", json!({"$ref": "b.json#/$defs/x"})),
        ("https://example.com/b.json", json!({"$defs": {"x": {"type": "boolean"}}})),
    ]);
    let sch = c.compile("https://example.com/a.json").unwrap();
    assert!(c.validate(sch, &json!(true)).is_ok());
    assert!(c.validate(sch, &json!("true")).is_err());
}

struct MapLoader(Vec<(String, String)>);

impl UrlLoader for MapLoader {
    fn load(&self, url: &str) -> Result<Vec<u8>, schema_tools::LoadError> {
        match self.0.iter().find(|(u, _)| u == url) {
            Some((_, doc)) => Ok(doc.clone().into_bytes()),
            None => Err(format!("no such resource: {url}").into()),
        }
    }
}

#[test]
fn test_loader_fetches_referenced_documents() {
    let mut c = Compiler::new();
    c.use_loader(Box::new(MapLoader(vec![(
        "https://test.invalid/items.json".to_string(),
        r#"{"type": "integer"}"#.to_string(),
    )])));
    c.add_resource(
        "https://test.invalid/root.json",
        br#"{"type": "array", "items": {"$ref": "items.json"}}"#.as_slice(),
    )
    .unwrap();
    let sch = c.compile("https://test.invalid/root.json").unwrap();
    assert!(c.validate(sch, &json!([1, 2])).is_ok());
    assert!(c.validate(sch, &json!([1, "x"])).is_err());

    // a reference outside the loader's world is a loader error
    let mut c = Compiler::new();
    c.use_loader(Box::new(MapLoader(vec![])));
    c.add_resource(
        "https://test.invalid/root.json",
        br#"{"$ref": "https://test.invalid/gone.json"}"#.as_slice(),
    )
    .unwrap();
    assert!(matches!(
        c.compile("https://test.invalid/root.json"),
        Err(CompileError::Load { .. })
    ));
}

#[test]
fn test_validate_reader() {
    let (c, sch) = compile_one(json!({"required": ["a"]}));
    assert!(c.validate_reader(sch, br#"{"a": 1}"#.as_slice()).is_ok());
    assert!(matches!(
        c.validate_reader(sch, br#"{}"#.as_slice()),
        Err(InstanceError::Validation(_))
    ));
    assert!(matches!(
        c.validate_reader(sch, br#"{"a": "#.as_slice()),
        Err(InstanceError::Parse(_))
    ));
    // duplicate keys in the instance are parse errors too
    assert!(matches!(
        c.validate_reader(sch, br#"{"a": 1, "a": 2}"#.as_slice()),
        Err(InstanceError::Parse(_))
    ));
}

#[test]
fn test_duplicate_keys_in_schema_are_rejected() {
    let mut c = Compiler::new();
    let err = c
        .add_resource("s.json", br#"{"type": "object", "type": "array"}"#.as_slice())
        .unwrap_err();
    assert!(matches!(err, CompileError::Parse { .. }));
}

#[test]
fn test_duplicate_anchor_is_fatal_to_add_resource() {
    let mut c = Compiler::new();
    let err = c
        .add_resource(
            "s.json",
            br#"{"$defs": {"a": {"$anchor": "x"}, "b": {"$anchor": "x"}}}"#.as_slice(),
        )
        .unwrap_err();
    assert!(matches!(err, CompileError::DuplicateAnchor { .. }));
}

#[test]
fn test_error_rendering_is_indented() {
    let (c, sch) = compile_one(json!({
        "properties": {"a": {"type": "integer", "minimum": 10}}
    }));
    let rendered = c.validate(sch, &json!({"a": 3.5})).unwrap_err().to_string();
    let lines: Vec<&str> = rendered.lines().collect();
    assert!(lines.len() >= 2);
    assert!(lines.iter().any(|l| l.contains("/a")));
    assert!(lines[1].starts_with("  "));
}

#[test]
fn test_draft4_vs_draft6_integer_semantics() {
    let draft4 = json!({
        "$schema": "http://json-schema.org/draft-04/schema#",
        "type": "integer"
    });
    let draft6 = json!({
        "$schema": "http://json-schema.org/draft-06/schema#",
        "type": "integer"
    });
    let (c4, s4) = compile_one(draft4);
    let (c6, s6) = compile_one(draft6);
    assert!(c4.validate(s4, &json!(1)).is_ok());
    assert!(c4.validate(s4, &json!(1.0)).is_err());
    assert!(c6.validate(s6, &json!(1.0)).is_ok());
}

#[test]
fn test_anchor_refs_across_documents() {
    let mut c = compiler_with(&[
        ("https://example.com/a.json", json!({"$ref": "b.json#leaf"})),
        (
            "https://example.com/b.json",
            json!({"$defs": {"leaf": {"$anchor": "leaf", "const": "leaf"}}}),
        ),
    ]);
    let sch = c.compile("https://example.com/a.json").unwrap();
    assert!(c.validate(sch, &json!("leaf")).is_ok());
    assert!(c.validate(sch, &json!("node")).is_err());
}

#[test]
fn test_nested_id_changes_ref_base() {
    // a $ref inside an embedded $id resource resolves against that $id
    let mut c = compiler_with(&[
        (
            "https://example.com/root.json",
            json!({
                "$ref": "#/$defs/inner",
                "$defs": {
                    "inner": {
                        "$id": "https://other.com/inner.json",
                        "$ref": "leaf.json"
                    }
                }
            }),
        ),
        ("https://other.com/leaf.json", json!({"type": "null"})),
    ]);
    let sch = c.compile("https://example.com/root.json").unwrap();
    assert!(c.validate(sch, &json!(null)).is_ok());
    assert!(c.validate(sch, &json!(0)).is_err());
}

#[test]
fn test_compile_twice_returns_same_handle() {
    let mut c = compiler_with(&[("s.json", json!({"type": "string"}))]);
    let a = c.compile("s.json").unwrap();
    let b = c.compile("s.json").unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_must_compile_panics_on_bad_schema() {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut c = Compiler::new();
        c.add_resource("s.json", br##"{"$ref": "#/missing"}"##.as_slice()).unwrap();
        c.must_compile("s.json")
    }));
    assert!(result.is_err());
}
