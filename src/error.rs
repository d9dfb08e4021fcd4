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

//! Error surface: fatal compile-time errors and the hierarchical validation
//! error tree.

use std::fmt;

use thiserror::Error;

/// Errors from turning bytes into a document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An error raised by a [crate::UrlLoader].
pub type LoadError = Box<dyn std::error::Error + Send + Sync>;

/// Fatal errors from [crate::Compiler::add_resource] and
/// [crate::Compiler::compile]. A failed compile rolls back any partially
/// compiled schemas, so retrying after fixing the cause is safe.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("error parsing {url}: {src}")]
    Parse {
        url: String,
        #[source]
        src: ParseError,
    },
    #[error("invalid $schema {schema:?} in {url}")]
    InvalidMetaschema { url: String, schema: String },
    #[error("invalid reference {reference:?} in {url}")]
    InvalidReference { url: String, reference: String },
    #[error("error loading {url}: {src}")]
    Load {
        url: String,
        #[source]
        src: LoadError,
    },
    #[error("{url} is not valid against its metaschema:\n{src}")]
    SchemaNotValid {
        url: String,
        #[source]
        src: Box<ValidationError>,
    },
    #[error("duplicate id {id:?} in {url}")]
    DuplicateId { url: String, id: String },
    #[error("duplicate anchor {anchor:?} in {url}")]
    DuplicateAnchor { url: String, anchor: String },
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid regex {regex:?} in {url}: {src}")]
    InvalidRegex {
        url: String,
        regex: String,
        #[source]
        src: regex::Error,
    },
    #[error("{url} is not a schema document")]
    NotASchema { url: String },
    #[error("{url}: {keyword} expects {expected}")]
    UnexpectedValue {
        url: String,
        keyword: &'static str,
        expected: &'static str,
    },
    #[error("extension {keyword:?}: {message}")]
    Extension { keyword: String, message: String },
}

/// An error raised by an extension assertion. The validator fills in the
/// location trails.
#[derive(Debug)]
pub struct ExtensionError {
    /// The extension keyword that rejected the instance.
    pub keyword: String,
    pub message: String,
}

/// Why an instance failed to validate. Errors form a tree mirroring the
/// keyword tree that rejected the instance: `causes` holds the failures of
/// nested keywords and applicator branches.
#[derive(Debug)]
pub struct ValidationError {
    /// Evaluation path of the failing keyword from the validation root,
    /// including `$ref` hops (`/allOf/1/$ref/minimum`).
    pub keyword_location: String,
    /// Canonical location of the failing keyword
    /// (`https://example.com/s.json#/$defs/a/minimum`).
    pub absolute_keyword_location: String,
    /// JSON-Pointer into the instance (`/items/3`).
    pub instance_location: String,
    pub message: String,
    pub causes: Vec<ValidationError>,
}

impl ValidationError {
    fn write_indented(&self, f: &mut fmt::Formatter, indent: usize) -> fmt::Result {
        write!(
            f,
            "{:indent$}at '#{}': {} [{}]",
            "",
            self.instance_location,
            self.message,
            if self.keyword_location.is_empty() { "#" } else { self.keyword_location.as_str() },
            indent = indent,
        )?;
        for cause in &self.causes {
            writeln!(f)?;
            cause.write_indented(f, indent + 2)?;
        }
        Ok(())
    }

    /// Depth-first iteration over the leaves of the error tree, which carry
    /// the individual keyword failures.
    pub fn leaves(&self) -> Vec<&ValidationError> {
        if self.causes.is_empty() {
            vec![self]
        } else {
            self.causes.iter().flat_map(|c| c.leaves()).collect()
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

impl std::error::Error for ValidationError {}

/// Error from validating a not-yet-parsed instance: either the bytes are not
/// a document, or the document is invalid against the schema.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] Box<ValidationError>),
}
