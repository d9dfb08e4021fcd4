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

//! The compiler: resolves schema URLs to resources, meta-validates the
//! documents, and translates them into the compiled schema graph in two
//! phases — a placeholder is indexed under the canonical location before the
//! body compiles, which is what lets recursive references terminate.

use std::collections::{HashMap, HashSet};
use std::io::Read;

use serde_json::{Map, Value};

use crate::document;
use crate::drafts::{self, Draft};
use crate::error::{CompileError, InstanceError, ValidationError};
use crate::formats::{self, FormatCheck};
use crate::number::Decimal;
use crate::pointer::{self, escape};
use crate::resource::{FileLoader, Resource, UrlLoader};
use crate::schema::{
    Dependency, DynamicRef, ExtensionSchema, Format, InstanceType, Items, ObjectSchema,
    SchemaKind, SchemaNode, SchemaRef,
};
use crate::uri;
use crate::validator;

/// Compiles a user-registered keyword into an assertion. Returning
/// `Ok(None)` means the keyword is absent and there is nothing to compile.
pub trait ExtensionCompiler {
    fn compile(
        &self,
        obj: &Map<String, Value>,
    ) -> Result<Option<Box<dyn ExtensionSchema>>, CompileError>;
}

struct Extension {
    name: String,
    meta: Value,
    meta_sch: Option<SchemaRef>,
    compiler: Box<dyn ExtensionCompiler>,
}

/// Compiles JSON Schema documents and validates instances against them.
///
/// ```
/// # use serde_json::json;
/// # use schema_tools::Compiler;
/// let mut c = Compiler::new();
/// let doc = r#"{"type": "integer", "minimum": 0}"#;
/// c.add_resource("schema.json", doc.as_bytes()).unwrap();
/// let sch = c.compile("schema.json").unwrap();
/// assert!(c.validate(sch, &json!(3)).is_ok());
/// assert!(c.validate(sch, &json!(-1)).is_err());
/// ```
pub struct Compiler {
    resources: HashMap<String, Resource>,
    /// Every absolute `$id` (and resource URL) to its owning resource.
    id_index: HashMap<String, String>,
    /// The arena. Nodes are appended during compilation and their indices
    /// never change.
    nodes: Vec<SchemaNode>,
    /// Canonical location to compiled node.
    index: HashMap<String, SchemaRef>,
    /// `(resource base URL, anchor)` for every compiled `$dynamicAnchor`.
    dynamic_anchors: HashMap<(String, String), SchemaRef>,
    extensions: Vec<Extension>,
    formats: HashMap<String, FormatCheck>,
    loader: Box<dyn UrlLoader>,
    default_draft: Draft,
    assert_format: Option<bool>,
    assert_content: bool,
    /// Custom `$schema` chains being followed, to cut cycles.
    meta_loading: HashSet<String>,
    /// Resources whose meta-validation is underway, to cut cycles.
    meta_validating: HashSet<String>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Compiler {
        Compiler {
            resources: HashMap::new(),
            id_index: HashMap::new(),
            nodes: vec![],
            index: HashMap::new(),
            dynamic_anchors: HashMap::new(),
            extensions: vec![],
            formats: HashMap::new(),
            loader: Box::new(FileLoader),
            default_draft: Draft::latest(),
            assert_format: None,
            assert_content: false,
            meta_loading: HashSet::new(),
            meta_validating: HashSet::new(),
        }
    }

    /// The draft assumed for documents without a `$schema` declaration.
    pub fn set_default_draft(&mut self, draft: Draft) {
        self.default_draft = draft;
    }

    /// Whether `format` asserts. Unset, it asserts for drafts up to 7 and
    /// annotates only from 2019-09 on.
    pub fn set_assert_format(&mut self, assert: bool) {
        self.assert_format = Some(assert);
    }

    /// Whether `contentEncoding` / `contentMediaType` / `contentSchema`
    /// assert. Off by default.
    pub fn set_assert_content(&mut self, assert: bool) {
        self.assert_content = assert;
    }

    /// Replaces the loader used for URLs that are neither embedded
    /// meta-schemas nor already added resources.
    pub fn use_loader(&mut self, loader: Box<dyn UrlLoader>) {
        self.loader = loader;
    }

    /// Registers (or overrides) a `format` check.
    pub fn register_format(&mut self, name: &str, check: FormatCheck) {
        self.formats.insert(name.to_string(), check);
    }

    /// Registers an extension keyword. Every compiled document is
    /// additionally meta-validated against `meta`, and `compiler` runs on
    /// every schema object.
    pub fn register_extension(
        &mut self,
        name: &str,
        meta: Value,
        compiler: Box<dyn ExtensionCompiler>,
    ) -> Result<(), CompileError> {
        if name.is_empty() || self.extensions.iter().any(|e| e.name == name) {
            return Err(CompileError::Extension {
                keyword: name.to_string(),
                message: "extension name must be unique and non-empty".to_string(),
            });
        }
        self.extensions.push(Extension { name: name.to_string(), meta, meta_sch: None, compiler });
        Ok(())
    }

    /// Parses `rdr` and registers it as the resource at `url`, enumerating
    /// its nested `$id`s and anchors. Adding the same URL twice keeps the
    /// first document.
    pub fn add_resource(&mut self, url: &str, rdr: impl Read) -> Result<(), CompileError> {
        let url = uri::canonicalize(url);
        let doc = document::from_reader(rdr)
            .map_err(|src| CompileError::Parse { url: url.clone(), src })?;
        self.add_resource_value(&url, doc)
    }

    fn add_resource_value(&mut self, url: &str, doc: Value) -> Result<(), CompileError> {
        if self.resources.contains_key(url) {
            return Ok(());
        }
        let (draft, meta_url) = self.detect_draft(url, &doc)?;
        let res = Resource::new(url.to_string(), draft, meta_url, doc)?;
        for id in res.ids.keys() {
            self.id_index.insert(id.clone(), url.to_string());
        }
        self.resources.insert(url.to_string(), res);
        Ok(())
    }

    /// The draft in effect for a document: its `$schema` if declared (fetched
    /// and followed when it names a custom meta-schema), else the compiler
    /// default.
    fn detect_draft(
        &mut self,
        url: &str,
        doc: &Value,
    ) -> Result<(Draft, Option<String>), CompileError> {
        let Some(decl) = doc.get("$schema") else {
            return Ok((self.default_draft, None));
        };
        let Some(text) = decl.as_str() else {
            return Err(CompileError::InvalidMetaschema {
                url: url.to_string(),
                schema: decl.to_string(),
            });
        };
        let meta_url = uri::canonicalize(text);
        if let Some(draft) = Draft::from_meta_url(&meta_url) {
            return Ok((draft, Some(draft.meta_url().to_string())));
        }
        if !self.meta_loading.insert(meta_url.clone()) {
            return Err(CompileError::InvalidMetaschema {
                url: url.to_string(),
                schema: meta_url,
            });
        }
        let loaded = self.ensure_resource(&meta_url);
        self.meta_loading.remove(&meta_url);
        loaded?;
        Ok((self.resources[&meta_url].draft, Some(meta_url)))
    }

    /// Fetches and registers a resource if it is not already present.
    /// Embedded meta-schemas short-circuit the loader.
    fn ensure_resource(&mut self, url: &str) -> Result<(), CompileError> {
        if self.resources.contains_key(url) {
            return Ok(());
        }
        let doc = match drafts::embedded_meta(url) {
            Some(text) => serde_json::from_str(text)
                .map_err(|e| CompileError::Parse { url: url.to_string(), src: e.into() })?,
            None => {
                let bytes = self
                    .loader
                    .load(url)
                    .map_err(|src| CompileError::Load { url: url.to_string(), src })?;
                document::from_slice(&bytes)
                    .map_err(|src| CompileError::Parse { url: url.to_string(), src })?
            }
        };
        self.add_resource_value(url, doc)
    }

    /// Resolves a schema URL to its owning resource and the JSON-Pointer of
    /// the target inside that resource's document, rewriting plain-name
    /// anchors to their pointer form.
    fn resolve_location(&mut self, url: &str) -> Result<(String, String), CompileError> {
        let url = uri::canonicalize(url);
        let (base, raw_frag) = uri::split(&url);
        let frag = uri::decode_fragment(raw_frag)?;
        if !self.id_index.contains_key(base) {
            self.ensure_resource(base)?;
        }
        let res_url = self.id_index.get(base).cloned().ok_or_else(|| {
            CompileError::InvalidReference { url: url.clone(), reference: base.to_string() }
        })?;
        let res = &self.resources[&res_url];
        let id_ptr = res.ids.get(base).cloned().unwrap_or_default();
        if frag.is_empty() || frag.starts_with('/') {
            Ok((res_url, format!("{id_ptr}{frag}")))
        } else {
            match res.anchors.get(&(base.to_string(), frag.clone())) {
                Some(ptr) => Ok((res_url, ptr.clone())),
                None => Err(CompileError::InvalidReference {
                    url: res_url.clone(),
                    reference: format!("{base}#{frag}"),
                }),
            }
        }
    }

    /// Compiles the schema at `url`. Compiling the same location again
    /// returns the same handle. On error, every node added by this call is
    /// rolled back so a later retry starts clean.
    pub fn compile(&mut self, url: &str) -> Result<SchemaRef, CompileError> {
        let mark = self.nodes.len();
        let result = self.compile_url(url);
        if result.is_err() {
            self.nodes.truncate(mark);
            self.index.retain(|_, r| r.0 < mark);
            self.dynamic_anchors.retain(|_, r| r.0 < mark);
            for ext in &mut self.extensions {
                if ext.meta_sch.is_some_and(|r| r.0 >= mark) {
                    ext.meta_sch = None;
                }
            }
            self.meta_validating.clear();
        }
        result
    }

    /// [Compiler::compile], panicking on error. For schemas known to be
    /// valid, typically compiled from embedded documents.
    pub fn must_compile(&mut self, url: &str) -> SchemaRef {
        match self.compile(url) {
            Ok(sch) => sch,
            Err(e) => panic!("compile {url}: {e}"),
        }
    }

    /// Validates a parsed instance. Takes `&self`: validations may run
    /// concurrently once compilation is done.
    pub fn validate(
        &self,
        sch: SchemaRef,
        instance: &Value,
    ) -> Result<(), Box<ValidationError>> {
        validator::validate(self, sch, instance)
    }

    /// Parses an instance from a stream and validates it.
    pub fn validate_reader(
        &self,
        sch: SchemaRef,
        rdr: impl Read,
    ) -> Result<(), InstanceError> {
        let doc = document::from_reader(rdr)?;
        self.validate(sch, &doc)?;
        Ok(())
    }

    pub(crate) fn node(&self, sch: SchemaRef) -> &SchemaNode {
        &self.nodes[sch.0]
    }

    pub(crate) fn dynamic_target(&self, resource: &str, anchor: &str) -> Option<SchemaRef> {
        self.dynamic_anchors.get(&(resource.to_string(), anchor.to_string())).copied()
    }

    fn compile_url(&mut self, url: &str) -> Result<SchemaRef, CompileError> {
        let (res_url, ptr) = self.resolve_location(url)?;
        let loc = format!("{res_url}#{ptr}");
        if let Some(&sch) = self.index.get(&loc) {
            return Ok(sch);
        }
        self.meta_validate(&res_url)?;
        let sch = self.compile_at(&res_url, &ptr)?;
        self.compile_dynamic_anchors(&res_url)?;
        Ok(sch)
    }

    /// `$dynamicAnchor` targets participate in dynamic-scope resolution even
    /// when nothing references them lexically, so every declaration in a
    /// resource compiles along with the first schema compiled from it.
    fn compile_dynamic_anchors(&mut self, res_url: &str) -> Result<(), CompileError> {
        let res = &self.resources[res_url];
        let ptrs: Vec<String> =
            res.dynamic_anchors.iter().filter_map(|key| res.anchors.get(key).cloned()).collect();
        for ptr in ptrs {
            self.compile_at(res_url, &ptr)?;
        }
        Ok(())
    }

    /// Validates a resource's document against its draft meta-schema and
    /// every registered extension meta-schema. Runs once per resource;
    /// embedded meta-schemas and extension meta-schemas are trusted.
    fn meta_validate(&mut self, res_url: &str) -> Result<(), CompileError> {
        if self.resources[res_url].meta_checked {
            return Ok(());
        }
        if drafts::is_meta_url(res_url) || res_url.starts_with("ext:") {
            self.resources.get_mut(res_url).expect("resource is registered").meta_checked = true;
            return Ok(());
        }
        if !self.meta_validating.insert(res_url.to_string()) {
            return Ok(());
        }
        let result = self.meta_validate_inner(res_url);
        self.meta_validating.remove(res_url);
        if result.is_ok() {
            self.resources.get_mut(res_url).expect("resource is registered").meta_checked = true;
        }
        result
    }

    fn meta_validate_inner(&mut self, res_url: &str) -> Result<(), CompileError> {
        let res = &self.resources[res_url];
        let meta_url = res
            .meta_url
            .clone()
            .unwrap_or_else(|| res.draft.meta_url().to_string());
        let meta_sch = self.compile_url(&meta_url)?;
        let doc = self.resources[res_url].doc.clone();
        validator::validate(self, meta_sch, &doc)
            .map_err(|src| CompileError::SchemaNotValid { url: res_url.to_string(), src })?;
        for i in 0..self.extensions.len() {
            let sch = match self.extensions[i].meta_sch {
                Some(sch) => sch,
                None => {
                    let ext_url = format!("ext:{}", self.extensions[i].name);
                    let meta_doc = self.extensions[i].meta.clone();
                    self.add_resource_value(&ext_url, meta_doc)?;
                    let sch = self.compile_url(&ext_url)?;
                    self.extensions[i].meta_sch = Some(sch);
                    sch
                }
            };
            validator::validate(self, sch, &doc)
                .map_err(|src| CompileError::SchemaNotValid { url: res_url.to_string(), src })?;
        }
        Ok(())
    }

    /// Phase 1 of a node compile: reserve the placeholder under its
    /// canonical location, then fill the body in place.
    fn compile_at(&mut self, res_url: &str, ptr: &str) -> Result<SchemaRef, CompileError> {
        let loc = format!("{res_url}#{ptr}");
        if let Some(&sch) = self.index.get(&loc) {
            return Ok(sch);
        }
        let res = &self.resources[res_url];
        let draft = res.draft;
        let base = res.base_of(ptr).to_string();
        let doc = pointer::lookup(&res.doc, ptr)
            .ok_or_else(|| CompileError::InvalidReference {
                url: res_url.to_string(),
                reference: format!("#{ptr}"),
            })?
            .clone();
        let sref = SchemaRef(self.nodes.len());
        self.nodes.push(SchemaNode {
            draft,
            loc: loc.clone(),
            resource: base.clone(),
            kind: SchemaKind::Pending,
        });
        self.index.insert(loc.clone(), sref);
        let kind = self.compile_value(&doc, draft, &base, res_url, ptr, &loc, sref)?;
        self.nodes[sref.0].kind = kind;
        Ok(sref)
    }

    fn compile_value(
        &mut self,
        doc: &Value,
        draft: Draft,
        base: &str,
        res_url: &str,
        ptr: &str,
        loc: &str,
        self_ref: SchemaRef,
    ) -> Result<SchemaKind, CompileError> {
        match doc {
            Value::Bool(b) if draft.bool_schema() => Ok(SchemaKind::Bool(*b)),
            Value::Object(obj) => self
                .compile_object(obj, draft, base, res_url, ptr, loc, self_ref)
                .map(|s| SchemaKind::Object(Box::new(s))),
            _ => Err(CompileError::NotASchema { url: loc.to_string() }),
        }
    }

    fn compile_child(
        &mut self,
        res_url: &str,
        ptr: &str,
        suffix: &str,
    ) -> Result<SchemaRef, CompileError> {
        self.compile_at(res_url, &format!("{ptr}/{suffix}"))
    }

    fn compile_object(
        &mut self,
        obj: &Map<String, Value>,
        draft: Draft,
        base: &str,
        res_url: &str,
        ptr: &str,
        loc: &str,
        self_ref: SchemaRef,
    ) -> Result<ObjectSchema, CompileError> {
        let version = draft.version();
        let mut s = ObjectSchema {
            assert_format: self.assert_format.unwrap_or(version <= 7),
            assert_content: self.assert_content,
            ..ObjectSchema::default()
        };

        // core
        if let Some(v) = obj.get("$ref") {
            let reference = expect_str(v, loc, "$ref")?;
            let abs = uri::resolve_url(base, reference)?;
            s.ref_ = Some(self.compile_url(&abs)?);
            if version <= 7 {
                // $ref keeps its siblings inert before 2019-09.
                return Ok(s);
            }
        }
        if version >= 2019 {
            if let Some(v) = obj.get("$recursiveRef") {
                let reference = expect_str(v, loc, "$recursiveRef")?;
                if reference != "#" {
                    return Err(CompileError::InvalidReference {
                        url: loc.to_string(),
                        reference: reference.to_string(),
                    });
                }
                s.recursive_ref = Some(self.compile_url(base)?);
            }
            s.recursive_anchor =
                obj.get("$recursiveAnchor").and_then(Value::as_bool) == Some(true);
        }
        if version >= 2020 {
            if let Some(v) = obj.get("$dynamicRef") {
                let reference = expect_str(v, loc, "$dynamicRef")?;
                let abs = uri::resolve_url(base, reference)?;
                let target = self.compile_url(&abs)?;
                let (tbase, raw_frag) = uri::split(&abs);
                let frag = uri::decode_fragment(raw_frag)?;
                let anchor = if !frag.is_empty() && !frag.starts_with('/') {
                    let declared = self
                        .id_index
                        .get(tbase)
                        .and_then(|r| self.resources.get(r))
                        .is_some_and(|r| {
                            r.dynamic_anchors.contains(&(tbase.to_string(), frag.clone()))
                        });
                    declared.then_some(frag)
                } else {
                    None
                };
                s.dynamic_ref = Some(DynamicRef { sch: target, anchor });
            }
            if let Some(name) = obj.get("$dynamicAnchor").and_then(Value::as_str) {
                s.dynamic_anchor = Some(name.to_string());
                self.dynamic_anchors.insert((base.to_string(), name.to_string()), self_ref);
            }
        }

        // logical
        if obj.contains_key("not") {
            s.not = Some(self.compile_child(res_url, ptr, "not")?);
        }
        for (kw, field) in [("allOf", 0), ("anyOf", 1), ("oneOf", 2)] {
            let Some(v) = obj.get(kw) else { continue };
            let arr = expect_array(v, loc, kw)?;
            let mut subs = Vec::with_capacity(arr.len());
            for i in 0..arr.len() {
                subs.push(self.compile_child(res_url, ptr, &format!("{kw}/{i}"))?);
            }
            match field {
                0 => s.all_of = subs,
                1 => s.any_of = subs,
                _ => s.one_of = subs,
            }
        }
        if version >= 7 {
            if obj.contains_key("if") {
                s.if_ = Some(self.compile_child(res_url, ptr, "if")?);
            }
            if obj.contains_key("then") {
                s.then_ = Some(self.compile_child(res_url, ptr, "then")?);
            }
            if obj.contains_key("else") {
                s.else_ = Some(self.compile_child(res_url, ptr, "else")?);
            }
        }

        // object
        if let Some(v) = obj.get("properties") {
            for name in expect_object(v, loc, "properties")?.keys() {
                let sub = self.compile_child(res_url, ptr, &format!("properties/{}", escape(name)))?;
                s.properties.insert(name.clone(), sub);
            }
        }
        if let Some(v) = obj.get("patternProperties") {
            for pat in expect_object(v, loc, "patternProperties")?.keys() {
                let re = regex::Regex::new(pat).map_err(|src| CompileError::InvalidRegex {
                    url: loc.to_string(),
                    regex: pat.clone(),
                    src,
                })?;
                let sub = self
                    .compile_child(res_url, ptr, &format!("patternProperties/{}", escape(pat)))?;
                s.pattern_properties.push((re, sub));
            }
        }
        if obj.contains_key("additionalProperties") {
            s.additional_properties =
                Some(self.compile_child(res_url, ptr, "additionalProperties")?);
        }
        if version >= 6 && obj.contains_key("propertyNames") {
            s.property_names = Some(self.compile_child(res_url, ptr, "propertyNames")?);
        }
        if let Some(v) = obj.get("required") {
            s.required = string_array(v, loc, "required")?;
        }
        if version >= 2019 {
            if let Some(v) = obj.get("dependentRequired") {
                for (name, val) in expect_object(v, loc, "dependentRequired")? {
                    s.dependent_required
                        .push((name.clone(), string_array(val, loc, "dependentRequired")?));
                }
            }
            if let Some(v) = obj.get("dependentSchemas") {
                for name in expect_object(v, loc, "dependentSchemas")?.keys() {
                    let sub = self
                        .compile_child(res_url, ptr, &format!("dependentSchemas/{}", escape(name)))?;
                    s.dependent_schemas.push((name.clone(), sub));
                }
            }
        } else if let Some(v) = obj.get("dependencies") {
            for (name, val) in expect_object(v, loc, "dependencies")? {
                let dep = match val {
                    Value::Array(_) => Dependency::Required(string_array(val, loc, "dependencies")?),
                    _ => Dependency::Schema(self.compile_child(
                        res_url,
                        ptr,
                        &format!("dependencies/{}", escape(name)),
                    )?),
                };
                s.dependencies.push((name.clone(), dep));
            }
        }
        s.min_properties = usize_keyword(obj, "minProperties", loc)?;
        s.max_properties = usize_keyword(obj, "maxProperties", loc)?;
        if version >= 2019 && obj.contains_key("unevaluatedProperties") {
            s.unevaluated_properties =
                Some(self.compile_child(res_url, ptr, "unevaluatedProperties")?);
        }

        // array
        if version >= 2020 {
            if let Some(v) = obj.get("prefixItems") {
                let arr = expect_array(v, loc, "prefixItems")?;
                for i in 0..arr.len() {
                    let sub = self.compile_child(res_url, ptr, &format!("prefixItems/{i}"))?;
                    s.prefix_items.push(sub);
                }
            }
            if obj.contains_key("items") {
                s.items = Some(Items::Schema(self.compile_child(res_url, ptr, "items")?));
            }
        } else {
            if let Some(v) = obj.get("items") {
                s.items = Some(match v {
                    Value::Array(arr) => {
                        let mut subs = Vec::with_capacity(arr.len());
                        for i in 0..arr.len() {
                            subs.push(self.compile_child(res_url, ptr, &format!("items/{i}"))?);
                        }
                        Items::Array(subs)
                    }
                    _ => Items::Schema(self.compile_child(res_url, ptr, "items")?),
                });
            }
            if obj.contains_key("additionalItems") {
                s.additional_items = Some(self.compile_child(res_url, ptr, "additionalItems")?);
            }
        }
        if version >= 6 && obj.contains_key("contains") {
            s.contains = Some(self.compile_child(res_url, ptr, "contains")?);
        }
        if version >= 2019 {
            s.min_contains = usize_keyword(obj, "minContains", loc)?;
            s.max_contains = usize_keyword(obj, "maxContains", loc)?;
        }
        s.min_items = usize_keyword(obj, "minItems", loc)?;
        s.max_items = usize_keyword(obj, "maxItems", loc)?;
        s.unique_items = obj.get("uniqueItems").and_then(Value::as_bool) == Some(true);
        if version >= 2019 && obj.contains_key("unevaluatedItems") {
            s.unevaluated_items = Some(self.compile_child(res_url, ptr, "unevaluatedItems")?);
        }

        // string
        s.min_length = usize_keyword(obj, "minLength", loc)?;
        s.max_length = usize_keyword(obj, "maxLength", loc)?;
        if let Some(v) = obj.get("pattern") {
            let pat = expect_str(v, loc, "pattern")?;
            s.pattern = Some(regex::Regex::new(pat).map_err(|src| CompileError::InvalidRegex {
                url: loc.to_string(),
                regex: pat.to_string(),
                src,
            })?);
        }
        if let Some(v) = obj.get("format") {
            let name = expect_str(v, loc, "format")?;
            s.format = Some(Format { name: name.to_string(), check: self.format_check(name) });
        }
        if version >= 7 {
            if let Some(v) = obj.get("contentEncoding") {
                s.content_encoding = Some(expect_str(v, loc, "contentEncoding")?.to_string());
            }
            if let Some(v) = obj.get("contentMediaType") {
                s.content_media_type = Some(expect_str(v, loc, "contentMediaType")?.to_string());
            }
            if version >= 2019 && obj.contains_key("contentSchema") {
                s.content_schema = Some(self.compile_child(res_url, ptr, "contentSchema")?);
            }
        }

        // numeric
        s.multiple_of = decimal_keyword(obj, "multipleOf", loc)?;
        s.minimum = decimal_keyword(obj, "minimum", loc)?;
        s.maximum = decimal_keyword(obj, "maximum", loc)?;
        if version == 4 {
            // Boolean flags turning minimum/maximum strict.
            if obj.get("exclusiveMinimum").and_then(Value::as_bool) == Some(true) {
                s.exclusive_minimum = s.minimum.take();
            }
            if obj.get("exclusiveMaximum").and_then(Value::as_bool) == Some(true) {
                s.exclusive_maximum = s.maximum.take();
            }
        } else {
            s.exclusive_minimum = decimal_keyword(obj, "exclusiveMinimum", loc)?;
            s.exclusive_maximum = decimal_keyword(obj, "exclusiveMaximum", loc)?;
        }

        // generic
        if version >= 6 {
            if let Some(v) = obj.get("const") {
                s.const_ = Some(v.clone());
            }
        }
        if let Some(v) = obj.get("enum") {
            s.enum_ = Some(expect_array(v, loc, "enum")?.clone());
        }
        if let Some(v) = obj.get("type") {
            let names: Vec<&str> = match v {
                Value::String(one) => vec![one.as_str()],
                Value::Array(many) => {
                    let mut names = Vec::with_capacity(many.len());
                    for t in many {
                        names.push(expect_str(t, loc, "type")?);
                    }
                    names
                }
                _ => {
                    return Err(CompileError::UnexpectedValue {
                        url: loc.to_string(),
                        keyword: "type",
                        expected: "string or array of strings",
                    });
                }
            };
            for name in names {
                s.types.push(InstanceType::from_name(name).ok_or_else(|| {
                    CompileError::UnexpectedValue {
                        url: loc.to_string(),
                        keyword: "type",
                        expected: "a simple type name",
                    }
                })?);
            }
        }

        // extensions
        for ext in &self.extensions {
            if let Some(compiled) = ext.compiler.compile(obj)? {
                s.extensions.push(compiled);
            }
        }

        Ok(s)
    }

    fn format_check(&self, name: &str) -> Option<FormatCheck> {
        self.formats.get(name).copied().or_else(|| formats::default_check(name))
    }
}

fn expect_str<'a>(v: &'a Value, loc: &str, kw: &'static str) -> Result<&'a str, CompileError> {
    v.as_str().ok_or(CompileError::UnexpectedValue {
        url: loc.to_string(),
        keyword: kw,
        expected: "string",
    })
}

fn expect_array<'a>(
    v: &'a Value,
    loc: &str,
    kw: &'static str,
) -> Result<&'a Vec<Value>, CompileError> {
    v.as_array().ok_or(CompileError::UnexpectedValue {
        url: loc.to_string(),
        keyword: kw,
        expected: "array",
    })
}

fn expect_object<'a>(
    v: &'a Value,
    loc: &str,
    kw: &'static str,
) -> Result<&'a Map<String, Value>, CompileError> {
    v.as_object().ok_or(CompileError::UnexpectedValue {
        url: loc.to_string(),
        keyword: kw,
        expected: "object",
    })
}

fn string_array(v: &Value, loc: &str, kw: &'static str) -> Result<Vec<String>, CompileError> {
    expect_array(v, loc, kw)?
        .iter()
        .map(|s| expect_str(s, loc, kw).map(str::to_string))
        .collect()
}

fn usize_keyword(
    obj: &Map<String, Value>,
    kw: &'static str,
    loc: &str,
) -> Result<Option<usize>, CompileError> {
    let Some(v) = obj.get(kw) else {
        return Ok(None);
    };
    let n = v.as_number().ok_or(CompileError::UnexpectedValue {
        url: loc.to_string(),
        keyword: kw,
        expected: "number",
    })?;
    crate::schema::usize_of(n)
        .map(Some)
        .ok_or(CompileError::UnexpectedValue {
            url: loc.to_string(),
            keyword: kw,
            expected: "non-negative integer",
        })
}

fn decimal_keyword(
    obj: &Map<String, Value>,
    kw: &'static str,
    loc: &str,
) -> Result<Option<Decimal>, CompileError> {
    let Some(v) = obj.get(kw) else {
        return Ok(None);
    };
    let n = v.as_number().ok_or(CompileError::UnexpectedValue {
        url: loc.to_string(),
        keyword: kw,
        expected: "number",
    })?;
    Ok(Some(Decimal::from_number(n)))
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn compiler_with(url: &str, doc: Value) -> Compiler {
        let mut c = Compiler::new();
        c.add_resource(url, serde_json::to_vec(&doc).unwrap().as_slice()).unwrap();
        c
    }

    #[test]
    fn test_compile_is_idempotent() {
        let mut c = compiler_with("s.json", json!({"type": "string"}));
        let a = c.compile("s.json").unwrap();
        let b = c.compile("s.json").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_cyclic_refs_terminate() {
        let mut c = compiler_with(
            "s.json",
            json!({
                "$defs": {
                    "a": {"properties": {"next": {"$ref": "#/$defs/b"}}},
                    "b": {"properties": {"next": {"$ref": "#/$defs/a"}}}
                },
                "$ref": "#/$defs/a"
            }),
        );
        c.compile("s.json").unwrap();
    }

    #[test]
    fn test_dangling_ref_is_invalid_reference() {
        let mut c = compiler_with("s.json", json!({"$ref": "#/$defs/missing"}));
        assert!(matches!(c.compile("s.json"), Err(CompileError::InvalidReference { .. })));
    }

    #[test]
    fn test_failed_compile_rolls_back() {
        let mut c = Compiler::new();
        c.add_resource("bad.json", br##"{"$ref": "#/nope"}"##.as_slice()).unwrap();
        c.add_resource("good.json", br#"{"type": "integer"}"#.as_slice()).unwrap();
        let before = c.nodes.len();
        assert!(c.compile("bad.json").is_err());
        assert_eq!(c.nodes.len(), before);
        assert!(c.index.values().all(|r| r.0 < before));
        // The compiler stays usable.
        let sch = c.compile("good.json").unwrap();
        assert!(c.validate(sch, &json!(3)).is_ok());
    }

    #[test]
    fn test_anchor_resolution() {
        let mut c = compiler_with(
            "s.json",
            json!({
                "$ref": "#num",
                "$defs": {"n": {"$anchor": "num", "type": "number"}}
            }),
        );
        let sch = c.compile("s.json").unwrap();
        assert!(c.validate(sch, &json!(1.5)).is_ok());
        assert!(c.validate(sch, &json!("x")).is_err());
    }

    #[test]
    fn test_missing_anchor_is_invalid_reference() {
        let mut c = compiler_with("s.json", json!({"$ref": "#nothere"}));
        assert!(matches!(c.compile("s.json"), Err(CompileError::InvalidReference { .. })));
    }

    #[test]
    fn test_unknown_metaschema_without_loader_entry() {
        let mut c = Compiler::new();
        let err = c
            .add_resource(
                "s.json",
                br#"{"$schema": "https://example.invalid/meta", "type": "string"}"#.as_slice(),
            )
            .unwrap_err();
        assert!(matches!(err, CompileError::Load { .. }));
    }

    #[test]
    fn test_non_string_schema_declaration() {
        let mut c = Compiler::new();
        let err = c.add_resource("s.json", br#"{"$schema": 42}"#.as_slice()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidMetaschema { .. }));
    }

    #[test]
    fn test_draft4_rejects_boolean_schema() {
        let mut c = Compiler::new();
        c.set_default_draft(Draft::Draft4);
        c.add_resource("s.json", br#"{"items": true, "type": "array"}"#.as_slice()).unwrap();
        assert!(c.compile("s.json#/items").is_err());
    }

    #[test]
    fn test_meta_schemas_compile_from_embedded_text() {
        let mut c = Compiler::new();
        for draft in
            [Draft::Draft4, Draft::Draft6, Draft::Draft7, Draft::Draft2019, Draft::Draft2020]
        {
            c.compile(draft.meta_url()).unwrap();
        }
    }

    #[test]
    fn test_schema_not_valid_wraps_validation_error() {
        let mut c = Compiler::new();
        c.add_resource("s.json", br#"{"type": 42}"#.as_slice()).unwrap();
        match c.compile("s.json") {
            Err(CompileError::SchemaNotValid { url, src }) => {
                assert_eq!(url, "s.json");
                assert!(!src.leaves().is_empty());
            }
            other => panic!("want SchemaNotValid, got {other:?}"),
        }
    }
}
