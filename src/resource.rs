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

//! Schema resources: a parsed root document plus the tables that make its
//! inner schemas addressable — `$id` bases, plain-name anchors and the
//! effective base URL at every nested subschema. Also the loader seam that
//! turns a URL into bytes.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::drafts::{Draft, ITEM, PROP, SELF};
use crate::error::{CompileError, LoadError};
use crate::pointer::escape;
use crate::uri;

/// Turns a URL into a byte stream. The default loader resolves embedded
/// meta-schemas and local files; network schemes are the caller's concern.
pub trait UrlLoader {
    fn load(&self, url: &str) -> Result<Vec<u8>, LoadError>;
}

/// Loads `file://` URLs and plain paths from the local filesystem.
pub(crate) struct FileLoader;

impl UrlLoader for FileLoader {
    fn load(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let path = url.strip_prefix("file://").unwrap_or(url);
        Ok(std::fs::read(path)?)
    }
}

/// A top-level schema document keyed by its fragment-less URL.
#[derive(Debug)]
pub(crate) struct Resource {
    pub url: String,
    pub draft: Draft,
    /// Canonical `$schema` value, when the document declared one.
    pub meta_url: Option<String>,
    pub doc: Value,
    /// Absolute `$id` URL (fragment-less) to the JSON-Pointer of the
    /// subschema that declared it. The resource URL itself maps to `""`.
    pub ids: HashMap<String, String>,
    /// `(base URL, anchor name)` to the JSON-Pointer of the declaring
    /// subschema. Anchors are scoped to their nearest enclosing `$id`.
    pub anchors: HashMap<(String, String), String>,
    /// The subset of [Resource::anchors] declared via `$dynamicAnchor`.
    pub dynamic_anchors: HashSet<(String, String)>,
    /// Effective base URL at every nested subschema position.
    bases: HashMap<String, String>,
    /// Set once this resource passed meta-validation.
    pub meta_checked: bool,
}

impl Resource {
    pub fn new(
        url: String,
        draft: Draft,
        meta_url: Option<String>,
        doc: Value,
    ) -> Result<Resource, CompileError> {
        let mut res = Resource {
            url,
            draft,
            meta_url,
            doc: Value::Null,
            ids: HashMap::new(),
            anchors: HashMap::new(),
            dynamic_anchors: HashSet::new(),
            bases: HashMap::new(),
            meta_checked: false,
        };
        res.ids.insert(res.url.clone(), String::new());
        let root_base = res.url.clone();
        res.walk(&doc, "", &root_base)?;
        res.doc = doc;
        Ok(res)
    }

    /// The base URL in effect at `ptr`: the nearest enclosing subschema with
    /// a recorded base.
    pub fn base_of(&self, ptr: &str) -> &str {
        let mut p = ptr;
        loop {
            if let Some(base) = self.bases.get(p) {
                return base;
            }
            match p.rfind('/') {
                Some(i) => p = &p[..i],
                None => return &self.url,
            }
        }
    }

    /// Recursively enumerates subschemas along the draft's position table,
    /// registering `$id`s, anchors and effective bases.
    fn walk(&mut self, doc: &Value, ptr: &str, base: &str) -> Result<(), CompileError> {
        let mut cur_base = base.to_string();
        let mut anchors: Vec<(String, bool)> = vec![];
        if let Some(obj) = doc.as_object() {
            if let Some(id) = self.draft.id_of(doc) {
                let (id_base, id_frag) = uri::split(id);
                if !id_base.is_empty() {
                    let abs = uri::resolve_url(&cur_base, id_base)?;
                    match self.ids.get(&abs).map(|existing| existing == ptr) {
                        Some(true) => {}
                        Some(false) => {
                            return Err(CompileError::DuplicateId {
                                url: self.url.clone(),
                                id: abs,
                            });
                        }
                        None => {
                            self.ids.insert(abs.clone(), ptr.to_string());
                        }
                    }
                    cur_base = abs;
                }
                // Before 2019 a fragment in the id declares an anchor.
                if self.draft.version() < 2019 && !id_frag.is_empty() {
                    anchors.push((id_frag.to_string(), false));
                }
            }
            if self.draft.version() >= 2019 {
                if let Some(name) = obj.get("$anchor").and_then(Value::as_str) {
                    anchors.push((name.to_string(), false));
                }
            }
            if self.draft.version() >= 2020 {
                if let Some(name) = obj.get("$dynamicAnchor").and_then(Value::as_str) {
                    anchors.push((name.to_string(), true));
                }
            }
        }
        for (name, dynamic) in anchors {
            let key = (cur_base.clone(), name.clone());
            if self.anchors.insert(key, ptr.to_string()).is_some() {
                return Err(CompileError::DuplicateAnchor { url: self.url.clone(), anchor: name });
            }
            if dynamic {
                self.dynamic_anchors.insert((cur_base.clone(), name));
            }
        }
        self.bases.insert(ptr.to_string(), cur_base.clone());

        let Some(obj) = doc.as_object() else {
            return Ok(());
        };
        for (kw, pos) in self.draft.subschemas() {
            let Some(v) = obj.get(kw) else { continue };
            if pos & SELF != 0 && (v.is_object() || (v.is_boolean() && self.draft.bool_schema())) {
                self.walk(v, &format!("{ptr}/{kw}"), &cur_base)?;
            }
            if pos & ITEM != 0 {
                if let Some(arr) = v.as_array() {
                    for (i, item) in arr.iter().enumerate() {
                        self.walk(item, &format!("{ptr}/{kw}/{i}"), &cur_base)?;
                    }
                }
            }
            if pos & PROP != 0 {
                if let Some(map) = v.as_object() {
                    for (name, val) in map {
                        self.walk(val, &format!("{ptr}/{kw}/{}", escape(name)), &cur_base)?;
                    }
                }
            }
        }
        Ok(())
    }
}
