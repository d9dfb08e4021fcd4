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

//! URL handling: splitting off fragments, RFC 3986 reference resolution and
//! canonicalisation of schema locations.

use percent_encoding::percent_decode_str;
use url::Url;

use crate::drafts;
use crate::error::CompileError;

/// Splits a URL at the first `#`. Returns the fragment-less URL and the raw
/// fragment (without the `#`, empty if there is none).
pub(crate) fn split(url: &str) -> (&str, &str) {
    match url.find('#') {
        Some(i) => (&url[..i], &url[i + 1..]),
        None => (url, ""),
    }
}

/// Percent-decodes a fragment. Fails on invalid UTF-8 in the decoded bytes.
pub(crate) fn decode_fragment(frag: &str) -> Result<String, CompileError> {
    match percent_decode_str(frag).decode_utf8() {
        Ok(s) => Ok(s.into_owned()),
        Err(_) => Err(CompileError::InvalidUrl {
            url: format!("#{frag}"),
            reason: "fragment is not valid UTF-8".into(),
        }),
    }
}

/// Canonicalises a schema URL: strips a trailing `#` or `#/` and upgrades the
/// `http` scheme to `https` when that makes the URL match one of the known
/// meta-schema URLs.
pub(crate) fn canonicalize(url: &str) -> String {
    let url = url
        .strip_suffix("#/")
        .or_else(|| url.strip_suffix('#'))
        .unwrap_or(url);
    if let Some(rest) = url.strip_prefix("http://") {
        let https = format!("https://{rest}");
        if drafts::is_meta_url(&https) {
            return https;
        }
    }
    url.to_string()
}

/// Resolves `reference` against `base` per RFC 3986. Scheme-less bases (plain
/// file names used as schema identifiers) are resolved with plain path
/// merging so that relative resources keep working without a registered
/// scheme.
pub(crate) fn resolve_url(base: &str, reference: &str) -> Result<String, CompileError> {
    if reference.is_empty() {
        return Ok(base.to_string());
    }
    if let Ok(abs) = Url::parse(reference) {
        return Ok(abs.to_string());
    }
    if let Some(urn) = base.strip_prefix("urn:") {
        let (path, _) = split(urn);
        let (frag_base, frag) = split(reference);
        if frag_base.is_empty() {
            return Ok(format!("urn:{path}#{frag}"));
        }
        return Err(CompileError::InvalidUrl {
            url: reference.to_string(),
            reason: format!("cannot resolve against urn base {base:?}"),
        });
    }
    match Url::parse(base) {
        Ok(b) => match b.join(reference) {
            Ok(u) => Ok(u.to_string()),
            Err(e) => Err(CompileError::InvalidUrl {
                url: reference.to_string(),
                reason: e.to_string(),
            }),
        },
        Err(_) => Ok(merge_relative(base, reference)),
    }
}

/// RFC 3986 §5.3 merge for bases that carry no scheme.
fn merge_relative(base: &str, reference: &str) -> String {
    let (ref_path, frag) = split(reference);
    let merged = if ref_path.is_empty() {
        let (base_path, _) = split(base);
        base_path.to_string()
    } else if ref_path.starts_with('/') {
        ref_path.to_string()
    } else {
        let (base_path, _) = split(base);
        let dir = match base_path.rfind('/') {
            Some(i) => &base_path[..=i],
            None => "",
        };
        remove_dot_segments(&format!("{dir}{ref_path}"))
    };
    if reference.contains('#') {
        format!("{merged}#{frag}")
    } else {
        merged
    }
}

fn remove_dot_segments(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut out: Vec<&str> = vec![];
    for seg in path.split('/') {
        match seg {
            "." | "" => {}
            ".." => {
                out.pop();
            }
            _ => out.push(seg),
        }
    }
    let joined = out.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}
