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

//! Format assertions. The core only dispatches: every check is a plain
//! function the compiler looks up by name, and callers can register their
//! own through [crate::Compiler::register_format]. Unknown names are
//! annotations and always pass.

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use url::Url;

/// A format check. Receives the string instance, returns whether it conforms.
pub type FormatCheck = fn(&str) -> bool;

/// The built-in check for a format name, if there is one.
pub(crate) fn default_check(name: &str) -> Option<FormatCheck> {
    Some(match name {
        "date-time" => is_date_time,
        "date" => is_date,
        "time" => is_time,
        "duration" => is_duration,
        "email" | "idn-email" => is_email,
        "hostname" | "idn-hostname" => is_hostname,
        "ipv4" => is_ipv4,
        "ipv6" => is_ipv6,
        "uri" | "iri" => is_uri,
        "uri-reference" | "iri-reference" | "uriref" => is_uri_reference,
        "uuid" => is_uuid,
        "regex" => is_regex,
        "json-pointer" => is_json_pointer,
        "relative-json-pointer" => is_relative_json_pointer,
        _ => return None,
    })
}

fn is_date_time(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
}

fn is_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

fn is_time(s: &str) -> bool {
    // full-time of RFC 3339, checked by anchoring it to a date.
    DateTime::parse_from_rfc3339(&format!("1970-01-01T{s}")).is_ok()
}

// ISO 8601 duration: P[nY][nM][nD][T[nH][nM][nS]] or PnW.
fn is_duration(s: &str) -> bool {
    let Some(rest) = s.strip_prefix('P') else {
        return false;
    };
    if rest.is_empty() {
        return false;
    }
    let (date_part, time_part) = match rest.find('T') {
        Some(i) => (&rest[..i], Some(&rest[i + 1..])),
        None => (rest, None),
    };
    if let Some(weeks) = date_part.strip_suffix('W') {
        return time_part.is_none() && !weeks.is_empty() && weeks.bytes().all(|b| b.is_ascii_digit());
    }
    fn units(part: &str, allowed: &[char]) -> bool {
        let mut idx = 0;
        let mut digits = 0;
        for c in part.chars() {
            if c.is_ascii_digit() {
                digits += 1;
            } else {
                match allowed[idx..].iter().position(|&u| u == c) {
                    Some(i) if digits > 0 => {
                        idx += i + 1;
                        digits = 0;
                    }
                    _ => return false,
                }
            }
        }
        digits == 0
    }
    if !units(date_part, &['Y', 'M', 'D']) {
        return false;
    }
    match time_part {
        Some(t) => !t.is_empty() && units(t, &['H', 'M', 'S']),
        None => !date_part.is_empty(),
    }
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !s.contains(char::is_whitespace)
        && !domain.contains('@')
}

fn is_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }
    s.strip_suffix('.').unwrap_or(s).split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}

fn is_ipv4(s: &str) -> bool {
    s.parse::<std::net::Ipv4Addr>().is_ok()
}

fn is_ipv6(s: &str) -> bool {
    s.parse::<std::net::Ipv6Addr>().is_ok()
}

fn is_uri(s: &str) -> bool {
    Url::parse(s).is_ok()
}

fn is_uri_reference(s: &str) -> bool {
    if Url::parse(s).is_ok() {
        return true;
    }
    // Relative references validate by resolution against a fixed base.
    match Url::parse("https://example.com/") {
        Ok(base) => base.join(s).is_ok(),
        Err(_) => false,
    }
}

fn is_uuid(s: &str) -> bool {
    let groups = [8, 4, 4, 4, 12];
    let mut parts = s.split('-');
    for len in groups {
        match parts.next() {
            Some(p) if p.len() == len && p.bytes().all(|b| b.is_ascii_hexdigit()) => {}
            _ => return false,
        }
    }
    parts.next().is_none()
}

fn is_regex(s: &str) -> bool {
    Regex::new(s).is_ok()
}

fn is_json_pointer(s: &str) -> bool {
    if s.is_empty() {
        return true;
    }
    if !s.starts_with('/') {
        return false;
    }
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '~' && !matches!(chars.next(), Some('0') | Some('1')) {
            return false;
        }
    }
    true
}

fn is_relative_json_pointer(s: &str) -> bool {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || (digits.len() > 1 && digits.starts_with('0')) {
        return false;
    }
    let rest = &s[digits.len()..];
    rest.is_empty() || rest == "#" || is_json_pointer(rest)
}

/// Decodes padded standard-alphabet base64, as `contentEncoding` needs it.
pub(crate) fn decode_base64(s: &str) -> Option<Vec<u8>> {
    fn val(b: u8) -> Option<u32> {
        match b {
            b'A'..=b'Z' => Some((b - b'A') as u32),
            b'a'..=b'z' => Some((b - b'a' + 26) as u32),
            b'0'..=b'9' => Some((b - b'0' + 52) as u32),
            b'+' => Some(62),
            b'/' => Some(63),
            _ => None,
        }
    }
    let bytes = s.as_bytes();
    if bytes.len() % 4 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(bytes.len() / 4 * 3);
    for (i, chunk) in bytes.chunks(4).enumerate() {
        let last = (i + 1) * 4 == bytes.len();
        let pad = chunk.iter().rev().take_while(|&&b| b == b'=').count();
        if pad > 2 || (pad > 0 && !last) {
            return None;
        }
        let mut acc: u32 = 0;
        for &b in &chunk[..4 - pad] {
            acc = (acc << 6) | val(b)?;
        }
        acc <<= 6 * pad as u32;
        let produced = 3 - pad;
        out.extend_from_slice(&acc.to_be_bytes()[1..1 + produced]);
    }
    Some(out)
}
