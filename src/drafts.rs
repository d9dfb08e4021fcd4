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

//! The draft registry: per-revision metadata that drives resource
//! enumeration and compilation. Each draft knows its identifier keyword,
//! whether boolean documents are schemas, where subschemas nest inside each
//! keyword, and the embedded text of its meta-schema.

use serde_json::Value;

/// A revision of the JSON Schema specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Draft {
    Draft4,
    Draft6,
    Draft7,
    Draft2019,
    Draft2020,
}

/// Subschema position bits: where schemas nest inside a keyword's value.
pub(crate) const SELF: u8 = 1; // the value is itself a schema
pub(crate) const PROP: u8 = 2; // the value is an object of schemas
pub(crate) const ITEM: u8 = 4; // the value is an array of schemas

/// Keyword positions with the draft that introduced them. Entries carry over
/// to every later draft.
const SUBSCHEMAS: &[(&str, u8, u16)] = &[
    ("definitions", PROP, 4),
    ("not", SELF, 4),
    ("allOf", ITEM, 4),
    ("anyOf", ITEM, 4),
    ("oneOf", ITEM, 4),
    ("properties", PROP, 4),
    ("additionalProperties", SELF, 4),
    ("patternProperties", PROP, 4),
    ("items", SELF | ITEM, 4),
    ("additionalItems", SELF, 4),
    ("dependencies", PROP, 4),
    ("propertyNames", SELF, 6),
    ("contains", SELF, 6),
    ("if", SELF, 7),
    ("then", SELF, 7),
    ("else", SELF, 7),
    ("$defs", PROP, 2019),
    ("dependentSchemas", PROP, 2019),
    ("unevaluatedProperties", SELF, 2019),
    ("unevaluatedItems", SELF, 2019),
    ("contentSchema", SELF, 2019),
    ("prefixItems", ITEM, 2020),
];

impl Draft {
    pub(crate) fn latest() -> Draft {
        Draft::Draft2020
    }

    pub(crate) fn version(self) -> u16 {
        match self {
            Draft::Draft4 => 4,
            Draft::Draft6 => 6,
            Draft::Draft7 => 7,
            Draft::Draft2019 => 2019,
            Draft::Draft2020 => 2020,
        }
    }

    /// The property name that declares a schema identifier.
    pub(crate) fn id_keyword(self) -> &'static str {
        match self {
            Draft::Draft4 => "id",
            _ => "$id",
        }
    }

    /// Whether `true` / `false` documents are valid schemas.
    pub(crate) fn bool_schema(self) -> bool {
        self != Draft::Draft4
    }

    pub(crate) fn meta_url(self) -> &'static str {
        match self {
            Draft::Draft4 => "https://json-schema.org/draft-04/schema",
            Draft::Draft6 => "https://json-schema.org/draft-06/schema",
            Draft::Draft7 => "https://json-schema.org/draft-07/schema",
            Draft::Draft2019 => "https://json-schema.org/draft/2019-09/schema",
            Draft::Draft2020 => "https://json-schema.org/draft/2020-12/schema",
        }
    }

    /// Maps a canonicalised `$schema` URL to its draft.
    pub(crate) fn from_meta_url(url: &str) -> Option<Draft> {
        match url {
            "https://json-schema.org/schema" => Some(Draft::latest()),
            "https://json-schema.org/draft/2020-12/schema" => Some(Draft::Draft2020),
            "https://json-schema.org/draft/2019-09/schema" => Some(Draft::Draft2019),
            "https://json-schema.org/draft-07/schema" => Some(Draft::Draft7),
            "https://json-schema.org/draft-06/schema" => Some(Draft::Draft6),
            "https://json-schema.org/draft-04/schema" => Some(Draft::Draft4),
            _ => None,
        }
    }

    /// The subschema position table in effect for this draft.
    pub(crate) fn subschemas(self) -> impl Iterator<Item = (&'static str, u8)> {
        let version = self.version();
        SUBSCHEMAS
            .iter()
            .filter(move |(_, _, since)| *since <= version)
            .map(|&(kw, pos, _)| (kw, pos))
    }

    /// The `$id` (or draft-4 `id`) declared on a schema object, if any. For
    /// drafts up to 7 a sibling `$ref` suppresses it.
    pub(crate) fn id_of<'a>(self, sch: &'a Value) -> Option<&'a str> {
        let obj = sch.as_object()?;
        if self.version() <= 7 && obj.contains_key("$ref") {
            return None;
        }
        obj.get(self.id_keyword())?.as_str()
    }
}

/// `(canonical URL, document text)` for every embedded meta-schema.
const META_SCHEMAS: &[(&str, &str)] = &[
    (
        "https://json-schema.org/draft-04/schema",
        include_str!("metaschemas/draft4.json"),
    ),
    (
        "https://json-schema.org/draft-06/schema",
        include_str!("metaschemas/draft6.json"),
    ),
    (
        "https://json-schema.org/draft-07/schema",
        include_str!("metaschemas/draft7.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/schema",
        include_str!("metaschemas/draft2019.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/meta/core",
        include_str!("metaschemas/draft2019_core.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/meta/applicator",
        include_str!("metaschemas/draft2019_applicator.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/meta/validation",
        include_str!("metaschemas/draft2019_validation.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/meta/meta-data",
        include_str!("metaschemas/draft2019_meta_data.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/meta/format",
        include_str!("metaschemas/draft2019_format.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/meta/content",
        include_str!("metaschemas/draft2019_content.json"),
    ),
    (
        "https://json-schema.org/draft/2020-12/schema",
        include_str!("metaschemas/draft2020.json"),
    ),
    (
        "https://json-schema.org/draft/2020-12/meta/core",
        include_str!("metaschemas/draft2020_core.json"),
    ),
    (
        "https://json-schema.org/draft/2020-12/meta/applicator",
        include_str!("metaschemas/draft2020_applicator.json"),
    ),
    (
        "https://json-schema.org/draft/2020-12/meta/unevaluated",
        include_str!("metaschemas/draft2020_unevaluated.json"),
    ),
    (
        "https://json-schema.org/draft/2020-12/meta/validation",
        include_str!("metaschemas/draft2020_validation.json"),
    ),
    (
        "https://json-schema.org/draft/2020-12/meta/meta-data",
        include_str!("metaschemas/draft2020_meta_data.json"),
    ),
    (
        "https://json-schema.org/draft/2020-12/meta/format-annotation",
        include_str!("metaschemas/draft2020_format_annotation.json"),
    ),
    (
        "https://json-schema.org/draft/2020-12/meta/content",
        include_str!("metaschemas/draft2020_content.json"),
    ),
];

/// The embedded document for a canonical meta-schema URL. The loader
/// short-circuits these so no meta-schema is ever fetched.
pub(crate) fn embedded_meta(url: &str) -> Option<&'static str> {
    META_SCHEMAS.iter().find(|(u, _)| *u == url).map(|&(_, text)| text)
}

pub(crate) fn is_meta_url(url: &str) -> bool {
    url == "https://json-schema.org/schema" || embedded_meta(url).is_some()
}
