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

//! A JSON Schema compiler and validator supporting drafts 4, 6, 7, 2019-09
//! and 2020-12.
//!
//! Schema documents are added to (or fetched by) a [Compiler], compiled into
//! an executable form with all references resolved — including recursive,
//! cross-document and dynamic references — and then run against instances,
//! producing a hierarchical [ValidationError] that mirrors the keyword tree
//! that rejected the instance.
//!
//! ```
//! # use serde_json::json;
//! # use schema_tools::Compiler;
//! let mut c = Compiler::new();
//! let doc = r#"{
//!     "$ref": "#/$defs/positive",
//!     "$defs": {"positive": {"type": "number", "exclusiveMinimum": 0}}
//! }"#;
//! c.add_resource("positive.json", doc.as_bytes()).unwrap();
//! let sch = c.compile("positive.json").unwrap();
//! assert!(c.validate(sch, &json!(1.5)).is_ok());
//! assert!(c.validate(sch, &json!(-1)).is_err());
//! ```

use serde_json::Value;

mod compiler;
mod document;
mod drafts;
mod error;
mod formats;
mod number;
mod pointer;
mod resource;
mod schema;
mod uri;
mod validator;

pub use compiler::{Compiler, ExtensionCompiler};
pub use drafts::Draft;
pub use error::{
    CompileError, ExtensionError, InstanceError, LoadError, ParseError, ValidationError,
};
pub use formats::FormatCheck;
pub use resource::UrlLoader;
pub use schema::{ExtensionSchema, SchemaRef};

/// Validates a JSON instance against a JSON schema, both given as text.
/// Panics if either input is not JSON or the schema does not compile.
pub fn validate<S: AsRef<str>>(schema: S, instance: S) -> bool {
    validate_json(
        &serde_json::from_str(schema.as_ref()).unwrap(),
        &serde_json::from_str(instance.as_ref()).unwrap(),
    )
}

/// Validates a JSON instance against a single-document JSON schema using a
/// default [Compiler]. Panics if the schema does not compile.
///
/// ```
/// # use serde_json::json;
/// # use schema_tools::validate_json;
/// assert!(validate_json(&json!({"minimum": 0}), &json!(42)));
/// assert!(!validate_json(&json!({"minimum": 0}), &json!(-42)));
/// ```
pub fn validate_json(schema: &Value, instance: &Value) -> bool {
    let mut c = Compiler::new();
    let bytes = serde_json::to_vec(schema).expect("schema value serializes");
    match c.add_resource("schema.json", bytes.as_slice()).and_then(|()| c.compile("schema.json")) {
        Ok(sch) => c.validate(sch, instance).is_ok(),
        Err(e) => panic!("{}", e),
    }
}
