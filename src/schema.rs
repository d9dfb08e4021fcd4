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

//! The compiled schema model: a graph of nodes held in an arena owned by the
//! compiler, referenced by stable [SchemaRef] indices so recursive schemas
//! can be wired before their bodies exist.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use serde_json::{Number, Value};

use crate::drafts::Draft;
use crate::error::ExtensionError;
use crate::formats::FormatCheck;
use crate::number::{self, Decimal};

/// A handle to a compiled schema. Stays valid for the lifetime of the
/// [crate::Compiler] that returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaRef(pub(crate) usize);

/// A compiled assertion produced by a registered extension.
pub trait ExtensionSchema: Send + Sync + fmt::Debug {
    fn validate(&self, instance: &Value) -> Result<(), ExtensionError>;
}

pub(crate) struct SchemaNode {
    pub draft: Draft,
    /// Canonical absolute location: resource URL + `#` + JSON-Pointer.
    pub loc: String,
    /// Base URL of the innermost enclosing `$id` resource; dynamic-scope
    /// anchor lookups are keyed by it.
    pub resource: String,
    pub kind: SchemaKind,
}

pub(crate) enum SchemaKind {
    /// Placeholder reserved while the body compiles. Never survives a
    /// successful compile.
    Pending,
    Bool(bool),
    Object(Box<ObjectSchema>),
}

/// `items` keeps its pre-2020 dual shape; the 2020 schema form reuses
/// [Items::Schema].
#[derive(Debug)]
pub(crate) enum Items {
    Schema(SchemaRef),
    Array(Vec<SchemaRef>),
}

/// A `dependencies` entry (drafts up to 7): required property names or a
/// schema applied in place.
#[derive(Debug)]
pub(crate) enum Dependency {
    Required(Vec<String>),
    Schema(SchemaRef),
}

#[derive(Debug)]
pub(crate) struct DynamicRef {
    /// Lexical target, used when no dynamic anchor is in scope.
    pub sch: SchemaRef,
    /// Anchor name, present only when the fragment names a `$dynamicAnchor`
    /// in the target resource.
    pub anchor: Option<String>,
}

pub(crate) struct Format {
    pub name: String,
    pub check: Option<FormatCheck>,
}

impl fmt::Debug for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Format").field("name", &self.name).finish()
    }
}

/// One optional field per supported keyword. Absent keywords assert nothing.
#[derive(Debug, Default)]
pub(crate) struct ObjectSchema {
    // core
    pub ref_: Option<SchemaRef>,
    pub recursive_ref: Option<SchemaRef>,
    pub recursive_anchor: bool,
    pub dynamic_ref: Option<DynamicRef>,
    pub dynamic_anchor: Option<String>,

    // logical
    pub not: Option<SchemaRef>,
    pub all_of: Vec<SchemaRef>,
    pub any_of: Vec<SchemaRef>,
    pub one_of: Vec<SchemaRef>,
    pub if_: Option<SchemaRef>,
    pub then_: Option<SchemaRef>,
    pub else_: Option<SchemaRef>,

    // object
    pub properties: HashMap<String, SchemaRef>,
    pub pattern_properties: Vec<(Regex, SchemaRef)>,
    pub additional_properties: Option<SchemaRef>,
    pub property_names: Option<SchemaRef>,
    pub required: Vec<String>,
    pub dependent_required: Vec<(String, Vec<String>)>,
    pub dependencies: Vec<(String, Dependency)>,
    pub dependent_schemas: Vec<(String, SchemaRef)>,
    pub min_properties: Option<usize>,
    pub max_properties: Option<usize>,
    pub unevaluated_properties: Option<SchemaRef>,

    // array
    pub items: Option<Items>,
    pub prefix_items: Vec<SchemaRef>,
    pub additional_items: Option<SchemaRef>,
    pub contains: Option<SchemaRef>,
    pub min_contains: Option<usize>,
    pub max_contains: Option<usize>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub unique_items: bool,
    pub unevaluated_items: Option<SchemaRef>,

    // string
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
    pub format: Option<Format>,
    pub content_encoding: Option<String>,
    pub content_media_type: Option<String>,
    pub content_schema: Option<SchemaRef>,

    // numeric
    pub multiple_of: Option<Decimal>,
    pub minimum: Option<Decimal>,
    pub maximum: Option<Decimal>,
    pub exclusive_minimum: Option<Decimal>,
    pub exclusive_maximum: Option<Decimal>,

    // generic
    pub const_: Option<Value>,
    pub enum_: Option<Vec<Value>>,
    pub types: Vec<InstanceType>,

    // extensions
    pub extensions: Vec<Box<dyn ExtensionSchema>>,

    // resolved per-node options
    pub assert_format: bool,
    pub assert_content: bool,
}

/// A type name usable in the `type` keyword.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum InstanceType {
    Null,
    Boolean,
    Object,
    Array,
    Number,
    Integer,
    String,
}

impl InstanceType {
    pub fn from_name(name: &str) -> Option<InstanceType> {
        match name {
            "null" => Some(InstanceType::Null),
            "boolean" => Some(InstanceType::Boolean),
            "object" => Some(InstanceType::Object),
            "array" => Some(InstanceType::Array),
            "number" => Some(InstanceType::Number),
            "integer" => Some(InstanceType::Integer),
            "string" => Some(InstanceType::String),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            InstanceType::Null => "null",
            InstanceType::Boolean => "boolean",
            InstanceType::Object => "object",
            InstanceType::Array => "array",
            InstanceType::Number => "number",
            InstanceType::Integer => "integer",
            InstanceType::String => "string",
        }
    }

    /// The primitive type of an instance, for error messages.
    pub fn of(v: &Value) -> InstanceType {
        match v {
            Value::Null => InstanceType::Null,
            Value::Bool(_) => InstanceType::Boolean,
            Value::Number(_) => InstanceType::Number,
            Value::String(_) => InstanceType::String,
            Value::Array(_) => InstanceType::Array,
            Value::Object(_) => InstanceType::Object,
        }
    }

    /// Whether `v` is of this type. Integer matching depends on the draft:
    /// see [number::is_integer].
    pub fn matches(self, v: &Value, draft_version: u16) -> bool {
        match self {
            InstanceType::Null => v.is_null(),
            InstanceType::Boolean => v.is_boolean(),
            InstanceType::Object => v.is_object(),
            InstanceType::Array => v.is_array(),
            InstanceType::Number => v.is_number(),
            InstanceType::String => v.is_string(),
            InstanceType::Integer => {
                v.as_number().is_some_and(|n| number::is_integer(n, draft_version))
            }
        }
    }
}

/// Reads a non-negative integer keyword value.
pub(crate) fn usize_of(n: &Number) -> Option<usize> {
    number::as_usize(n)
}
