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

//! Document parsing. [serde_json::Value] already preserves object key order
//! and the exact textual form of numbers (the `preserve_order` and
//! `arbitrary_precision` features); this module adds the one guarantee
//! serde_json does not give: objects with duplicate keys are parse errors
//! instead of silently collapsing to the last value.

use std::collections::HashSet;
use std::fmt;
use std::io::Read;

use serde::de::{DeserializeSeed, Deserializer, Error as _, MapAccess, SeqAccess, Visitor};
use serde_json::Value;

use crate::error::ParseError;

/// Parses a JSON document from bytes.
pub(crate) fn from_slice(bytes: &[u8]) -> Result<Value, ParseError> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    DupKeyProbe.deserialize(&mut de)?;
    de.end()?;
    Ok(serde_json::from_slice(bytes)?)
}

/// Reads a stream to the end and parses it.
pub(crate) fn from_reader(mut rdr: impl Read) -> Result<Value, ParseError> {
    let mut bytes = Vec::new();
    rdr.read_to_end(&mut bytes)?;
    from_slice(&bytes)
}

/// A serde pass that visits every value without building one, erroring on the
/// first object that repeats a key.
struct DupKeyProbe;

impl<'de> DeserializeSeed<'de> for DupKeyProbe {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_any(DupKeyProbe)
    }
}

impl<'de> Visitor<'de> for DupKeyProbe {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E>(self, _: bool) -> Result<(), E> {
        Ok(())
    }

    fn visit_i64<E>(self, _: i64) -> Result<(), E> {
        Ok(())
    }

    fn visit_u64<E>(self, _: u64) -> Result<(), E> {
        Ok(())
    }

    fn visit_f64<E>(self, _: f64) -> Result<(), E> {
        Ok(())
    }

    fn visit_str<E>(self, _: &str) -> Result<(), E> {
        Ok(())
    }

    fn visit_unit<E>(self) -> Result<(), E> {
        Ok(())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        while seq.next_element_seed(DupKeyProbe)?.is_some() {}
        Ok(())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let mut seen = HashSet::new();
        while let Some(key) = map.next_key::<String>()? {
            if !seen.insert(key.clone()) {
                return Err(A::Error::custom(format!("duplicate key {key:?} in object")));
            }
            map.next_value_seed(DupKeyProbe)?;
        }
        Ok(())
    }
}
