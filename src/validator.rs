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

//! The evaluator: a depth-first walk of the compiled schema graph against an
//! instance, carrying the dynamic scope stack (for `$dynamicRef` /
//! `$recursiveRef`), the evaluated-property and evaluated-item annotations
//! (for `unevaluatedProperties` / `unevaluatedItems`) and the location trails
//! that end up in the error tree. Every applicable keyword runs even after an
//! earlier one failed, so the error tree is complete.

use std::collections::HashSet;

use serde_json::Value;

use crate::compiler::Compiler;
use crate::error::ValidationError;
use crate::formats;
use crate::number::{self, Decimal};
use crate::pointer::escape;
use crate::schema::{
    Dependency, DynamicRef, InstanceType, Items, ObjectSchema, SchemaKind, SchemaNode, SchemaRef,
};

pub(crate) fn validate(
    c: &Compiler,
    sch: SchemaRef,
    instance: &Value,
) -> Result<(), Box<ValidationError>> {
    let mut v = Validator { c, scopes: vec![], kw_loc: String::new(), inst_loc: String::new() };
    v.apply(sch, instance, &mut Uneval::default()).map_err(Box::new)
}

/// Evaluation annotations collected at one schema level: which properties
/// and how many leading items have been evaluated by the keywords and
/// in-place applicator branches seen so far.
#[derive(Default)]
struct Uneval<'i> {
    props: HashSet<&'i str>,
    items: usize,
}

impl<'i> Uneval<'i> {
    fn merge(&mut self, other: Uneval<'i>) {
        self.props.extend(other.props);
        self.items = self.items.max(other.items);
    }
}

/// A dynamic-scope frame. The instance-location length doubles as the
/// infinite-recursion guard: re-entering a schema without consuming any
/// instance is a cycle.
struct Frame {
    sch: SchemaRef,
    inst_len: usize,
}

struct Validator<'c> {
    c: &'c Compiler,
    scopes: Vec<Frame>,
    kw_loc: String,
    inst_loc: String,
}

impl<'c> Validator<'c> {
    fn apply<'i>(
        &mut self,
        sch: SchemaRef,
        inst: &'i Value,
        uneval: &mut Uneval<'i>,
    ) -> Result<(), ValidationError> {
        if self.scopes.iter().any(|f| f.sch == sch && f.inst_len == self.inst_loc.len()) {
            let node = self.c.node(sch);
            return Err(self.err_at(node, "", "infinite recursion".to_string()));
        }
        self.scopes.push(Frame { sch, inst_len: self.inst_loc.len() });
        let result = self.apply_frame(sch, inst, uneval);
        self.scopes.pop();
        result
    }

    fn apply_frame<'i>(
        &mut self,
        sch: SchemaRef,
        inst: &'i Value,
        uneval: &mut Uneval<'i>,
    ) -> Result<(), ValidationError> {
        let c = self.c;
        let node = c.node(sch);
        match &node.kind {
            SchemaKind::Bool(true) | SchemaKind::Pending => Ok(()),
            SchemaKind::Bool(false) => Err(self.err_at(node, "", "false schema".to_string())),
            SchemaKind::Object(s) => self.apply_object(s, node, inst, uneval),
        }
    }

    fn apply_object<'i>(
        &mut self,
        s: &'c ObjectSchema,
        node: &'c SchemaNode,
        inst: &'i Value,
        uneval: &mut Uneval<'i>,
    ) -> Result<(), ValidationError> {
        let version = node.draft.version();
        let mut errors: Vec<ValidationError> = vec![];
        let mut local = Uneval::default();

        // references apply in place
        if let Some(target) = s.ref_ {
            self.in_place(target, inst, &mut local, &mut errors, "$ref");
        }
        if let Some(lexical) = s.recursive_ref {
            let target = self.resolve_recursive(lexical);
            self.in_place(target, inst, &mut local, &mut errors, "$recursiveRef");
        }
        if let Some(dref) = &s.dynamic_ref {
            let target = self.resolve_dynamic(dref);
            self.in_place(target, inst, &mut local, &mut errors, "$dynamicRef");
        }

        // generic assertions
        if !s.types.is_empty() && !s.types.iter().any(|t| t.matches(inst, version)) {
            let want: Vec<&str> = s.types.iter().map(|t| t.name()).collect();
            errors.push(self.err_at(
                node,
                "type",
                format!("got {}, want {}", InstanceType::of(inst).name(), want.join(" or ")),
            ));
        }
        if let Some(want) = &s.const_ {
            if !number::equals(inst, want) {
                errors.push(self.err_at(node, "const", format!("must equal {want}")));
            }
        }
        if let Some(allowed) = &s.enum_ {
            if !allowed.iter().any(|o| number::equals(inst, o)) {
                errors.push(self.err_at(node, "enum", "not one of the allowed values".to_string()));
            }
        }

        // numeric assertions
        if let Some(n) = inst.as_number() {
            let d = Decimal::from_number(n);
            if let Some(divisor) = s.multiple_of {
                if !d.is_multiple_of(divisor) {
                    errors.push(self.err_at(
                        node,
                        "multipleOf",
                        format!("{n} is not a multiple of {divisor}"),
                    ));
                }
            }
            if let Some(min) = s.minimum {
                if d.compare(min).is_lt() {
                    errors.push(self.err_at(node, "minimum", format!("{n} is less than {min}")));
                }
            }
            if let Some(max) = s.maximum {
                if d.compare(max).is_gt() {
                    errors.push(self.err_at(node, "maximum", format!("{n} is greater than {max}")));
                }
            }
            if let Some(min) = s.exclusive_minimum {
                if d.compare(min).is_le() {
                    errors.push(self.err_at(
                        node,
                        "exclusiveMinimum",
                        format!("{n} must be greater than {min}"),
                    ));
                }
            }
            if let Some(max) = s.exclusive_maximum {
                if d.compare(max).is_ge() {
                    errors.push(self.err_at(
                        node,
                        "exclusiveMaximum",
                        format!("{n} must be less than {max}"),
                    ));
                }
            }
        }

        // string assertions
        if let Some(text) = inst.as_str() {
            if s.min_length.is_some() || s.max_length.is_some() {
                let count = text.chars().count();
                if let Some(min) = s.min_length {
                    if count < min {
                        errors.push(self.err_at(
                            node,
                            "minLength",
                            format!("length {count} is less than {min}"),
                        ));
                    }
                }
                if let Some(max) = s.max_length {
                    if count > max {
                        errors.push(self.err_at(
                            node,
                            "maxLength",
                            format!("length {count} is greater than {max}"),
                        ));
                    }
                }
            }
            if let Some(re) = &s.pattern {
                if !re.is_match(text) {
                    errors.push(self.err_at(
                        node,
                        "pattern",
                        format!("does not match pattern {:?}", re.as_str()),
                    ));
                }
            }
            if s.assert_format {
                if let Some(format) = &s.format {
                    if let Some(check) = format.check {
                        if !check(text) {
                            errors.push(self.err_at(
                                node,
                                "format",
                                format!("{text:?} is not a valid {}", format.name),
                            ));
                        }
                    }
                }
            }
            if s.assert_content {
                self.assert_content(s, node, text, &mut errors);
            }
        }

        // object keywords
        if let Some(map) = inst.as_object() {
            if !s.required.is_empty() {
                let missing: Vec<String> = s
                    .required
                    .iter()
                    .filter(|p| !map.contains_key(*p))
                    .map(|p| format!("'{p}'"))
                    .collect();
                if !missing.is_empty() {
                    errors.push(self.err_at(
                        node,
                        "required",
                        format!("missing properties {}", missing.join(", ")),
                    ));
                }
            }
            if let Some(min) = s.min_properties {
                if map.len() < min {
                    errors.push(self.err_at(
                        node,
                        "minProperties",
                        format!("got {} properties, need at least {min}", map.len()),
                    ));
                }
            }
            if let Some(max) = s.max_properties {
                if map.len() > max {
                    errors.push(self.err_at(
                        node,
                        "maxProperties",
                        format!("got {} properties, want at most {max}", map.len()),
                    ));
                }
            }
            for (name, needs) in &s.dependent_required {
                if map.contains_key(name) {
                    self.require_all(node, map, name, needs, "dependentRequired", &mut errors);
                }
            }
            for (name, dep) in &s.dependencies {
                if map.contains_key(name) {
                    match dep {
                        Dependency::Required(needs) => {
                            self.require_all(node, map, name, needs, "dependencies", &mut errors);
                        }
                        Dependency::Schema(child) => {
                            let kw = format!("dependencies/{}", escape(name));
                            self.in_place(*child, inst, &mut local, &mut errors, &kw);
                        }
                    }
                }
            }
            for (name, child) in &s.dependent_schemas {
                if map.contains_key(name) {
                    let kw = format!("dependentSchemas/{}", escape(name));
                    self.in_place(*child, inst, &mut local, &mut errors, &kw);
                }
            }
            if let Some(child) = s.property_names {
                for key in map.keys() {
                    let name = Value::String(key.clone());
                    if let Some(e) = self.apply_at(child, &name, "propertyNames", Some(key)) {
                        errors.push(e);
                    }
                }
            }
            // additionalProperties sees only what properties and
            // patternProperties matched at this level.
            let mut matched: HashSet<&str> = HashSet::new();
            for (name, child) in &s.properties {
                if let Some((key, value)) = map.get_key_value(name.as_str()) {
                    matched.insert(key.as_str());
                    local.props.insert(key.as_str());
                    let kw = format!("properties/{}", escape(name));
                    if let Some(e) = self.apply_at(*child, value, &kw, Some(key)) {
                        errors.push(e);
                    }
                }
            }
            for (re, child) in &s.pattern_properties {
                for (key, value) in map {
                    if re.is_match(key) {
                        matched.insert(key.as_str());
                        local.props.insert(key.as_str());
                        let kw = format!("patternProperties/{}", escape(re.as_str()));
                        if let Some(e) = self.apply_at(*child, value, &kw, Some(key)) {
                            errors.push(e);
                        }
                    }
                }
            }
            if let Some(child) = s.additional_properties {
                for (key, value) in map {
                    if matched.contains(key.as_str()) {
                        continue;
                    }
                    local.props.insert(key.as_str());
                    if let Some(e) = self.apply_at(child, value, "additionalProperties", Some(key))
                    {
                        errors.push(e);
                    }
                }
            }
        }

        // array keywords
        if let Some(arr) = inst.as_array() {
            if let Some(min) = s.min_items {
                if arr.len() < min {
                    errors.push(self.err_at(
                        node,
                        "minItems",
                        format!("got {} items, need at least {min}", arr.len()),
                    ));
                }
            }
            if let Some(max) = s.max_items {
                if arr.len() > max {
                    errors.push(self.err_at(
                        node,
                        "maxItems",
                        format!("got {} items, want at most {max}", arr.len()),
                    ));
                }
            }
            if s.unique_items {
                'unique: for i in 0..arr.len() {
                    for j in i + 1..arr.len() {
                        if number::equals(&arr[i], &arr[j]) {
                            errors.push(self.err_at(
                                node,
                                "uniqueItems",
                                format!("items at {i} and {j} are equal"),
                            ));
                            break 'unique;
                        }
                    }
                }
            }
            let mut evaluated = 0usize;
            if version >= 2020 {
                for (i, child) in s.prefix_items.iter().enumerate() {
                    let Some(item) = arr.get(i) else { break };
                    let kw = format!("prefixItems/{i}");
                    if let Some(e) = self.apply_at(*child, item, &kw, Some(&i.to_string())) {
                        errors.push(e);
                    }
                }
                evaluated = s.prefix_items.len().min(arr.len());
                if let Some(Items::Schema(child)) = &s.items {
                    for (i, item) in arr.iter().enumerate().skip(evaluated) {
                        if let Some(e) = self.apply_at(*child, item, "items", Some(&i.to_string()))
                        {
                            errors.push(e);
                        }
                    }
                    evaluated = arr.len();
                }
            } else {
                match &s.items {
                    Some(Items::Schema(child)) => {
                        for (i, item) in arr.iter().enumerate() {
                            if let Some(e) =
                                self.apply_at(*child, item, "items", Some(&i.to_string()))
                            {
                                errors.push(e);
                            }
                        }
                        evaluated = arr.len();
                    }
                    Some(Items::Array(subs)) => {
                        for (i, child) in subs.iter().enumerate() {
                            let Some(item) = arr.get(i) else { break };
                            let kw = format!("items/{i}");
                            if let Some(e) = self.apply_at(*child, item, &kw, Some(&i.to_string()))
                            {
                                errors.push(e);
                            }
                        }
                        evaluated = subs.len().min(arr.len());
                        if let Some(child) = s.additional_items {
                            for (i, item) in arr.iter().enumerate().skip(evaluated) {
                                if let Some(e) = self.apply_at(
                                    child,
                                    item,
                                    "additionalItems",
                                    Some(&i.to_string()),
                                ) {
                                    errors.push(e);
                                }
                            }
                            evaluated = arr.len();
                        }
                    }
                    None => {}
                }
            }
            local.items = local.items.max(evaluated);
            if let Some(child) = s.contains {
                let min = s.min_contains.unwrap_or(1);
                let mut count = 0usize;
                for (i, item) in arr.iter().enumerate() {
                    if self.apply_at(child, item, "contains", Some(&i.to_string())).is_none() {
                        count += 1;
                    }
                }
                if count < min {
                    let kw = if s.min_contains.is_some() { "minContains" } else { "contains" };
                    errors.push(self.err_at(
                        node,
                        kw,
                        format!("{count} items match, need at least {min}"),
                    ));
                }
                if let Some(max) = s.max_contains {
                    if count > max {
                        errors.push(self.err_at(
                            node,
                            "maxContains",
                            format!("{count} items match, want at most {max}"),
                        ));
                    }
                }
            }
        }

        // in-place applicators
        if let Some(child) = s.not {
            if self.branch(child, inst, "not").is_ok() {
                errors.push(self.err_at(
                    node,
                    "not",
                    "must not validate against the subschema".to_string(),
                ));
            }
        }
        for (i, child) in s.all_of.iter().enumerate() {
            self.in_place(*child, inst, &mut local, &mut errors, &format!("allOf/{i}"));
        }
        if !s.any_of.is_empty() {
            let mut branch_errors = vec![];
            let mut any = false;
            for (i, child) in s.any_of.iter().enumerate() {
                match self.branch(*child, inst, &format!("anyOf/{i}")) {
                    Ok(sub) => {
                        any = true;
                        local.merge(sub);
                    }
                    Err(e) => branch_errors.push(e),
                }
            }
            if !any {
                let mut e = self.err_at(node, "anyOf", "no subschema matched".to_string());
                e.causes = branch_errors;
                errors.push(e);
            }
        }
        if !s.one_of.is_empty() {
            let mut branch_errors = vec![];
            let mut matched: Vec<usize> = vec![];
            for (i, child) in s.one_of.iter().enumerate() {
                match self.branch(*child, inst, &format!("oneOf/{i}")) {
                    Ok(sub) => {
                        matched.push(i);
                        local.merge(sub);
                    }
                    Err(e) => branch_errors.push(e),
                }
            }
            match matched.as_slice() {
                [_] => {}
                [] => {
                    let mut e = self.err_at(node, "oneOf", "no subschema matched".to_string());
                    e.causes = branch_errors;
                    errors.push(e);
                }
                [first, second, ..] => {
                    errors.push(self.err_at(
                        node,
                        "oneOf",
                        format!("valid against subschemas {first} and {second}"),
                    ));
                }
            }
        }
        if let Some(cond) = s.if_ {
            match self.branch(cond, inst, "if") {
                Ok(sub) => {
                    local.merge(sub);
                    if let Some(then) = s.then_ {
                        self.in_place(then, inst, &mut local, &mut errors, "then");
                    }
                }
                Err(_) => {
                    if let Some(els) = s.else_ {
                        self.in_place(els, inst, &mut local, &mut errors, "else");
                    }
                }
            }
        }

        // extensions
        for ext in &s.extensions {
            if let Err(e) = ext.validate(inst) {
                errors.push(self.err_at(node, &e.keyword, e.message));
            }
        }

        // unevaluated*, after every sibling has reported its evaluations
        if let Some(child) = s.unevaluated_properties {
            if let Some(map) = inst.as_object() {
                for (key, value) in map {
                    if local.props.contains(key.as_str()) {
                        continue;
                    }
                    local.props.insert(key.as_str());
                    if let Some(e) =
                        self.apply_at(child, value, "unevaluatedProperties", Some(key))
                    {
                        errors.push(e);
                    }
                }
            }
        }
        if let Some(child) = s.unevaluated_items {
            if let Some(arr) = inst.as_array() {
                for (i, item) in arr.iter().enumerate().skip(local.items) {
                    if let Some(e) =
                        self.apply_at(child, item, "unevaluatedItems", Some(&i.to_string()))
                    {
                        errors.push(e);
                    }
                }
                local.items = arr.len();
            }
        }

        match errors.len() {
            0 => {
                uneval.merge(local);
                Ok(())
            }
            1 => Err(errors.pop().expect("one error is present")),
            _ => {
                let mut e = self.err_at(node, "", "validation failed".to_string());
                e.causes = errors;
                Err(e)
            }
        }
    }

    fn assert_content(
        &mut self,
        s: &'c ObjectSchema,
        node: &'c SchemaNode,
        text: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        let mut decoded: Option<Vec<u8>> = None;
        if let Some(encoding) = &s.content_encoding {
            if encoding == "base64" {
                match formats::decode_base64(text) {
                    Some(bytes) => decoded = Some(bytes),
                    None => {
                        errors.push(self.err_at(
                            node,
                            "contentEncoding",
                            "is not valid base64".to_string(),
                        ));
                        return;
                    }
                }
            }
        }
        if let Some(media_type) = &s.content_media_type {
            if media_type == "application/json" {
                let bytes = decoded.as_deref().unwrap_or(text.as_bytes());
                match serde_json::from_slice::<Value>(bytes) {
                    Ok(doc) => {
                        if let Some(child) = s.content_schema {
                            if let Some(e) = self.apply_at(child, &doc, "contentSchema", None) {
                                errors.push(e);
                            }
                        }
                    }
                    Err(_) => {
                        errors.push(self.err_at(
                            node,
                            "contentMediaType",
                            "is not valid JSON".to_string(),
                        ));
                    }
                }
            }
        }
    }

    fn require_all(
        &self,
        node: &SchemaNode,
        map: &serde_json::Map<String, Value>,
        name: &str,
        needs: &[String],
        kw: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        let missing: Vec<String> = needs
            .iter()
            .filter(|p| !map.contains_key(*p))
            .map(|p| format!("'{p}'"))
            .collect();
        if !missing.is_empty() {
            errors.push(self.err_at(
                node,
                &format!("{kw}/{}", escape(name)),
                format!("missing properties {} required by '{name}'", missing.join(", ")),
            ));
        }
    }

    /// Runs an in-place applicator branch: annotations merge into `local` on
    /// success, the failure lands in `errors` otherwise.
    fn in_place<'i>(
        &mut self,
        sch: SchemaRef,
        inst: &'i Value,
        local: &mut Uneval<'i>,
        errors: &mut Vec<ValidationError>,
        kw: &str,
    ) {
        match self.branch(sch, inst, kw) {
            Ok(sub) => local.merge(sub),
            Err(e) => errors.push(e),
        }
    }

    fn branch<'i>(
        &mut self,
        sch: SchemaRef,
        inst: &'i Value,
        kw: &str,
    ) -> Result<Uneval<'i>, ValidationError> {
        let mark = self.kw_loc.len();
        self.kw_loc.push('/');
        self.kw_loc.push_str(kw);
        let mut sub = Uneval::default();
        let result = self.apply(sch, inst, &mut sub);
        self.kw_loc.truncate(mark);
        result.map(|()| sub)
    }

    /// Applies a schema at a child instance location. The child's own
    /// annotations stay at its level.
    fn apply_at<'i>(
        &mut self,
        sch: SchemaRef,
        inst: &'i Value,
        kw: &str,
        inst_token: Option<&str>,
    ) -> Option<ValidationError> {
        let kw_mark = self.kw_loc.len();
        self.kw_loc.push('/');
        self.kw_loc.push_str(kw);
        let inst_mark = self.inst_loc.len();
        if let Some(token) = inst_token {
            self.inst_loc.push('/');
            self.inst_loc.push_str(&escape(token));
        }
        let result = self.apply(sch, inst, &mut Uneval::default());
        self.kw_loc.truncate(kw_mark);
        self.inst_loc.truncate(inst_mark);
        result.err()
    }

    /// `$recursiveRef` rebinds to the outermost dynamic scope carrying
    /// `$recursiveAnchor: true`, provided the lexical target carries it too.
    fn resolve_recursive(&self, lexical: SchemaRef) -> SchemaRef {
        let anchored = match &self.c.node(lexical).kind {
            SchemaKind::Object(o) => o.recursive_anchor,
            _ => false,
        };
        if !anchored {
            return lexical;
        }
        for frame in &self.scopes {
            if let SchemaKind::Object(o) = &self.c.node(frame.sch).kind {
                if o.recursive_anchor {
                    return frame.sch;
                }
            }
        }
        lexical
    }

    /// `$dynamicRef` rebinds to the outermost dynamic scope whose resource
    /// declares the anchor as a `$dynamicAnchor`.
    fn resolve_dynamic(&self, dref: &DynamicRef) -> SchemaRef {
        if let Some(anchor) = &dref.anchor {
            for frame in &self.scopes {
                let resource = &self.c.node(frame.sch).resource;
                if let Some(target) = self.c.dynamic_target(resource, anchor) {
                    return target;
                }
            }
        }
        dref.sch
    }

    fn err_at(&self, node: &SchemaNode, kw: &str, message: String) -> ValidationError {
        let (keyword_location, absolute_keyword_location) = if kw.is_empty() {
            (self.kw_loc.clone(), node.loc.clone())
        } else {
            (format!("{}/{kw}", self.kw_loc), format!("{}/{kw}", node.loc))
        };
        ValidationError {
            keyword_location,
            absolute_keyword_location,
            instance_location: self.inst_loc.clone(),
            message,
            causes: vec![],
        }
    }
}

#[cfg(test)]
mod test {
    use crate::compiler::Compiler;
    use crate::schema::SchemaRef;
    use serde_json::{json, Value};

    fn compile(doc: Value) -> (Compiler, SchemaRef) {
        let mut c = Compiler::new();
        c.add_resource("test.json", serde_json::to_vec(&doc).unwrap().as_slice()).unwrap();
        let sch = c.compile("test.json").unwrap();
        (c, sch)
    }

    fn is_valid(doc: Value, inst: Value) -> bool {
        let (c, sch) = compile(doc);
        c.validate(sch, &inst).is_ok()
    }

    #[test]
    fn test_type() {
        assert!(is_valid(json!({"type": "string"}), json!("x")));
        assert!(is_valid(json!({"type": ["string", "null"]}), json!(null)));
        assert!(!is_valid(json!({"type": "string"}), json!(42)));
        assert!(is_valid(json!({"type": "integer"}), json!(1.0)));
        assert!(!is_valid(json!({"type": "integer"}), json!(1.5)));
    }

    #[test]
    fn test_const_and_enum_numeric_equality() {
        assert!(is_valid(json!({"const": 1}), json!(1.0)));
        assert!(is_valid(json!({"enum": [1, "a"]}), json!(1.0)));
        assert!(!is_valid(json!({"enum": [1, "a"]}), json!(2)));
        assert!(!is_valid(json!({"const": {"a": 1}}), json!({"a": 2})));
    }

    #[test]
    fn test_numeric_bounds() {
        assert!(is_valid(json!({"minimum": 3}), json!(3)));
        assert!(!is_valid(json!({"exclusiveMinimum": 3}), json!(3)));
        assert!(is_valid(json!({"maximum": 3}), json!(3)));
        assert!(!is_valid(json!({"exclusiveMaximum": 3}), json!(3)));
        // non-numbers pass numeric assertions
        assert!(is_valid(json!({"minimum": 3}), json!("0")));
    }

    #[test]
    fn test_multiple_of_exact_decimal() {
        assert!(is_valid(json!({"multipleOf": 0.1}), json!(1.1)));
        assert!(is_valid(json!({"multipleOf": 0.01}), json!(19.99)));
        assert!(!is_valid(json!({"multipleOf": 0.1}), json!(1.15)));
    }

    #[test]
    fn test_string_assertions() {
        assert!(is_valid(json!({"minLength": 2, "maxLength": 3}), json!("ab")));
        assert!(!is_valid(json!({"minLength": 2}), json!("a")));
        // length counts characters, not bytes
        assert!(is_valid(json!({"maxLength": 2}), json!("éé")));
        assert!(is_valid(json!({"pattern": "^a+$"}), json!("aaa")));
        assert!(!is_valid(json!({"pattern": "^a+$"}), json!("b")));
    }

    #[test]
    fn test_object_assertions() {
        assert!(is_valid(json!({"required": ["a"]}), json!({"a": 1})));
        assert!(!is_valid(json!({"required": ["a", "b"]}), json!({"a": 1})));
        assert!(!is_valid(json!({"minProperties": 2}), json!({"a": 1})));
        assert!(!is_valid(json!({"maxProperties": 1}), json!({"a": 1, "b": 2})));
        assert!(!is_valid(json!({"propertyNames": {"maxLength": 2}}), json!({"abc": 1})));
    }

    #[test]
    fn test_properties_and_additional() {
        let schema = json!({
            "properties": {"a": {"type": "integer"}},
            "patternProperties": {"^p": {"type": "string"}},
            "additionalProperties": {"type": "boolean"}
        });
        assert!(is_valid(schema.clone(), json!({"a": 1, "p1": "x", "other": true})));
        assert!(!is_valid(schema.clone(), json!({"a": "not int"})));
        assert!(!is_valid(schema.clone(), json!({"p1": 42})));
        assert!(!is_valid(schema, json!({"other": "not bool"})));
    }

    #[test]
    fn test_dependent_required_and_schemas() {
        let schema = json!({"dependentRequired": {"a": ["b"]}});
        assert!(is_valid(schema.clone(), json!({"a": 1, "b": 2})));
        assert!(is_valid(schema.clone(), json!({"b": 2})));
        assert!(!is_valid(schema, json!({"a": 1})));

        let schema = json!({"dependentSchemas": {"a": {"required": ["b"]}}});
        assert!(!is_valid(schema.clone(), json!({"a": 1})));
        assert!(is_valid(schema, json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_legacy_dependencies() {
        let schema = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "dependencies": {"a": ["b"], "c": {"required": ["d"]}}
        });
        assert!(is_valid(schema.clone(), json!({"a": 1, "b": 2})));
        assert!(!is_valid(schema.clone(), json!({"a": 1})));
        assert!(!is_valid(schema.clone(), json!({"c": 1})));
        assert!(is_valid(schema, json!({"c": 1, "d": 2})));
    }

    #[test]
    fn test_array_assertions() {
        assert!(!is_valid(json!({"minItems": 2}), json!([1])));
        assert!(!is_valid(json!({"maxItems": 1}), json!([1, 2])));
        assert!(!is_valid(json!({"uniqueItems": true}), json!([1, 2, 1.0])));
        assert!(is_valid(json!({"uniqueItems": true}), json!([1, 2, "1"])));
    }

    #[test]
    fn test_prefix_items_and_items() {
        let schema = json!({
            "prefixItems": [{"type": "integer"}, {"type": "string"}],
            "items": {"type": "boolean"}
        });
        assert!(is_valid(schema.clone(), json!([1, "a", true, false])));
        assert!(is_valid(schema.clone(), json!([1])));
        assert!(!is_valid(schema.clone(), json!(["a"])));
        assert!(!is_valid(schema, json!([1, "a", "not bool"])));
    }

    #[test]
    fn test_items_array_form_with_additional() {
        let schema = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "items": [{"type": "integer"}, {"type": "string"}],
            "additionalItems": {"type": "boolean"}
        });
        assert!(is_valid(schema.clone(), json!([1, "a", true])));
        assert!(!is_valid(schema.clone(), json!([1, 2])));
        assert!(!is_valid(schema, json!([1, "a", "no"])));
    }

    #[test]
    fn test_contains_bounds() {
        let schema = json!({"contains": {"type": "integer"}});
        assert!(is_valid(schema.clone(), json!(["a", 1])));
        assert!(!is_valid(schema, json!(["a", "b"])));
        // minContains: 0 passes with no matching items
        assert!(is_valid(json!({"contains": {"type": "integer"}, "minContains": 0}), json!(["a"])));
        assert!(!is_valid(
            json!({"contains": {"type": "integer"}, "maxContains": 1}),
            json!([1, 2])
        ));
    }

    #[test]
    fn test_logical_applicators() {
        assert!(is_valid(json!({"not": {"type": "string"}}), json!(42)));
        assert!(!is_valid(json!({"not": {"type": "string"}}), json!("x")));
        assert!(is_valid(json!({"allOf": [{"minimum": 0}, {"maximum": 10}]}), json!(5)));
        assert!(!is_valid(json!({"allOf": [{"minimum": 0}, {"maximum": 10}]}), json!(11)));
        assert!(is_valid(json!({"anyOf": [{"type": "string"}, {"minimum": 0}]}), json!(5)));
        assert!(!is_valid(json!({"anyOf": [{"type": "string"}, {"minimum": 0}]}), json!(-1)));
        assert!(is_valid(json!({"oneOf": [{"type": "string"}, {"minimum": 0}]}), json!(5)));
        assert!(!is_valid(json!({"oneOf": [{"minimum": 0}, {"maximum": 10}]}), json!(5)));
    }

    #[test]
    fn test_one_of_reports_conflicting_branches() {
        let (c, sch) = compile(json!({"oneOf": [{"minimum": 0}, {"maximum": 10}]}));
        let err = c.validate(sch, &json!(5)).unwrap_err();
        let leaf = &err.leaves()[0];
        assert!(leaf.keyword_location.ends_with("/oneOf"));
        assert!(leaf.message.contains("0 and 1"));
    }

    #[test]
    fn test_if_then_else() {
        let schema = json!({
            "if": {"type": "integer"},
            "then": {"minimum": 0},
            "else": {"type": "string"}
        });
        assert!(is_valid(schema.clone(), json!(5)));
        assert!(!is_valid(schema.clone(), json!(-5)));
        assert!(is_valid(schema.clone(), json!("text")));
        assert!(!is_valid(schema, json!(null)));
    }

    #[test]
    fn test_unevaluated_properties() {
        let schema = json!({
            "unevaluatedProperties": false,
            "properties": {"a": true},
            "allOf": [{"properties": {"b": true}}]
        });
        assert!(is_valid(schema.clone(), json!({"a": 1, "b": 2})));
        assert!(!is_valid(schema, json!({"a": 1, "b": 2, "c": 3})));
    }

    #[test]
    fn test_unevaluated_properties_ignores_failed_branches() {
        // b is evaluated only by a branch that fails, so it stays
        // unevaluated and the unevaluated schema rejects it.
        let schema = json!({
            "unevaluatedProperties": false,
            "anyOf": [
                {"properties": {"b": {"type": "string"}}, "required": ["b"]},
                {"properties": {"a": true}, "required": ["a"]}
            ]
        });
        assert!(!is_valid(schema, json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_unevaluated_items() {
        let schema = json!({
            "unevaluatedItems": false,
            "prefixItems": [{"type": "integer"}]
        });
        assert!(is_valid(schema.clone(), json!([1])));
        assert!(!is_valid(schema, json!([1, 2])));

        let schema = json!({
            "unevaluatedItems": {"type": "string"},
            "allOf": [{"prefixItems": [true]}]
        });
        assert!(is_valid(schema.clone(), json!([1, "a"])));
        assert!(!is_valid(schema, json!([1, 2])));
    }

    #[test]
    fn test_ref_error_locations() {
        let (c, sch) = compile(json!({
            "$ref": "#/$defs/A",
            "$defs": {"A": {"type": "string"}}
        }));
        assert!(c.validate(sch, &json!("x")).is_ok());
        let err = c.validate(sch, &json!(1)).unwrap_err();
        let leaf = &err.leaves()[0];
        assert!(leaf.absolute_keyword_location.ends_with("/$defs/A/type"));
        assert_eq!(leaf.keyword_location, "/$ref/type");
    }

    #[test]
    fn test_infinite_recursion_is_detected() {
        let (c, sch) = compile(json!({"$ref": "#"}));
        let err = c.validate(sch, &json!(1)).unwrap_err();
        assert!(err.leaves()[0].message.contains("infinite recursion"));
    }

    #[test]
    fn test_format_asserts_per_draft_default() {
        // draft-7 asserts formats by default
        let schema =
            json!({"$schema": "http://json-schema.org/draft-07/schema#", "format": "ipv4"});
        assert!(!is_valid(schema, json!("999.0.0.1")));
        // 2020-12 treats format as an annotation unless opted in
        assert!(is_valid(json!({"format": "ipv4"}), json!("999.0.0.1")));
        let mut c = Compiler::new();
        c.set_assert_format(true);
        c.add_resource("f.json", br#"{"format": "ipv4"}"#.as_slice()).unwrap();
        let sch = c.compile("f.json").unwrap();
        assert!(c.validate(sch, &json!("999.0.0.1")).is_err());
        assert!(c.validate(sch, &json!("127.0.0.1")).is_ok());
    }

    #[test]
    fn test_content_assertions_opt_in() {
        let schema_text = br#"{
            "contentEncoding": "base64",
            "contentMediaType": "application/json",
            "contentSchema": {"type": "object"}
        }"#;
        // off by default
        assert!(is_valid(serde_json::from_slice(schema_text).unwrap(), json!("not base64!")));
        let mut c = Compiler::new();
        c.set_assert_content(true);
        c.add_resource("c.json", schema_text.as_slice()).unwrap();
        let sch = c.compile("c.json").unwrap();
        // "eyJhIjogMX0=" decodes to {"a": 1}
        assert!(c.validate(sch, &json!("eyJhIjogMX0=")).is_ok());
        assert!(c.validate(sch, &json!("@@@")).is_err());
        // "MQ==" decodes to 1, which is not an object
        assert!(c.validate(sch, &json!("MQ==")).is_err());
    }

    #[test]
    fn test_draft4_exclusive_bounds_are_booleans() {
        let schema = json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "minimum": 3,
            "exclusiveMinimum": true
        });
        assert!(!is_valid(schema.clone(), json!(3)));
        assert!(is_valid(schema, json!(4)));
    }

    #[test]
    fn test_ref_siblings_by_draft() {
        // draft-7: keywords next to $ref are ignored
        let schema = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "definitions": {"any": {}},
            "$ref": "#/definitions/any",
            "minimum": 10
        });
        assert!(is_valid(schema, json!(1)));
        // 2019-09: they apply
        let schema = json!({
            "$schema": "https://json-schema.org/draft/2019-09/schema",
            "$defs": {"any": {}},
            "$ref": "#/$defs/any",
            "minimum": 10
        });
        assert!(!is_valid(schema, json!(1)));
    }

    #[test]
    fn test_error_tree_has_all_failing_keywords() {
        let (c, sch) = compile(json!({"type": "integer", "minimum": 10, "multipleOf": 3}));
        let err = c.validate(sch, &json!(2.5)).unwrap_err();
        let kws: Vec<&str> = err.leaves().iter().map(|l| l.keyword_location.as_str()).collect();
        assert!(kws.contains(&"/type"));
        assert!(kws.contains(&"/minimum"));
        assert!(kws.contains(&"/multipleOf"));
    }

    #[test]
    fn test_validation_is_pure() {
        let (c, sch) = compile(json!({"items": {"$ref": "#"}, "maxItems": 2}));
        let inst = json!([[], [[]]]);
        let first = c.validate(sch, &inst).is_ok();
        let second = c.validate(sch, &inst).is_ok();
        assert_eq!(first, second);
        assert!(first);
    }
}
