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

//! Numeric semantics on the textual representation of JSON numbers: exact
//! comparison, `multipleOf` divisibility and draft-sensitive integer
//! detection, without going through `f64` except for magnitudes beyond i128.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Number, Value};

/// A decimal number as `mant * 10^exp`, falling back to `f64` when the
/// mantissa does not fit i128.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Decimal {
    Exact { mant: i128, exp: i32 },
    Approx(f64),
}

impl Decimal {
    pub(crate) fn from_number(n: &Number) -> Decimal {
        Self::parse(&n.to_string())
    }

    /// Parses `[-]digits[.digits][(e|E)[+-]digits]`. The input is known-valid
    /// JSON number text, so any shape surprise degrades to the f64 form.
    fn parse(text: &str) -> Decimal {
        let approx = || Decimal::Approx(text.parse::<f64>().unwrap_or(0.0));
        let (neg, rest) = match text.strip_prefix('-') {
            Some(r) => (true, r),
            None => (false, text),
        };
        let (mantissa_text, exp_text) = match rest.find(['e', 'E']) {
            Some(i) => (&rest[..i], &rest[i + 1..]),
            None => (rest, ""),
        };
        let mut exp: i32 = if exp_text.is_empty() {
            0
        } else {
            match exp_text.parse() {
                Ok(e) => e,
                Err(_) => return approx(),
            }
        };
        let mut mant: i128 = 0;
        for c in mantissa_text.chars() {
            match c {
                '.' => continue,
                '0'..='9' => {
                    let digit = (c as u8 - b'0') as i128;
                    mant = match mant.checked_mul(10).and_then(|m| m.checked_add(digit)) {
                        Some(m) => m,
                        None => return approx(),
                    };
                }
                _ => return approx(),
            }
        }
        if let Some(dot) = mantissa_text.find('.') {
            let frac_digits = (mantissa_text.len() - dot - 1) as i32;
            exp = match exp.checked_sub(frac_digits) {
                Some(e) => e,
                None => return approx(),
            };
        }
        if neg {
            mant = -mant;
        }
        Decimal::Exact { mant, exp }
    }

    fn to_f64(self) -> f64 {
        match self {
            Decimal::Exact { mant, exp } => mant as f64 * 10f64.powi(exp),
            Decimal::Approx(f) => f,
        }
    }

    pub(crate) fn compare(self, other: Decimal) -> Ordering {
        if let (Decimal::Exact { mant: a, exp: ae }, Decimal::Exact { mant: b, exp: be }) =
            (self, other)
        {
            let scaled = if ae >= be {
                scale(a, ae - be).map(|a| (a, b))
            } else {
                scale(b, be - ae).map(|b| (a, b))
            };
            if let Some((a, b)) = scaled {
                return a.cmp(&b);
            }
        }
        self.to_f64().partial_cmp(&other.to_f64()).unwrap_or(Ordering::Equal)
    }

    /// Whether the value has a zero fractional part.
    pub(crate) fn is_integer(self) -> bool {
        match self {
            Decimal::Exact { mant, mut exp } => {
                let mut m = mant;
                while exp < 0 {
                    if m % 10 != 0 {
                        return false;
                    }
                    m /= 10;
                    exp += 1;
                }
                true
            }
            Decimal::Approx(f) => f.fract() == 0.0,
        }
    }

    /// Whether `self / divisor` is integral.
    pub(crate) fn is_multiple_of(self, divisor: Decimal) -> bool {
        if let (Decimal::Exact { mant: a, exp: ae }, Decimal::Exact { mant: b, exp: be }) =
            (self, divisor)
        {
            if b != 0 {
                let scaled = if ae >= be {
                    scale(a, ae - be).map(|a| (a, b))
                } else {
                    scale(b, be - ae).map(|b| (a, b))
                };
                if let Some((a, b)) = scaled {
                    return a % b == 0;
                }
            }
        }
        let q = self.to_f64() / divisor.to_f64();
        q == q.trunc()
    }

    pub(crate) fn to_usize(self) -> Option<usize> {
        match self {
            Decimal::Exact { mant, mut exp } => {
                let mut m = mant;
                while exp < 0 {
                    if m % 10 != 0 {
                        return None;
                    }
                    m /= 10;
                    exp += 1;
                }
                usize::try_from(scale(m, exp)?).ok()
            }
            Decimal::Approx(f) if f >= 0.0 && f.fract() == 0.0 && f <= usize::MAX as f64 => {
                Some(f as usize)
            }
            Decimal::Approx(_) => None,
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Decimal::Exact { mant, exp } if *exp >= 0 => {
                write!(f, "{}{}", mant, "0".repeat(*exp as usize))
            }
            Decimal::Exact { mant, exp } => {
                let digits = mant.unsigned_abs().to_string();
                let frac = (-exp) as usize;
                let sign = if *mant < 0 { "-" } else { "" };
                if digits.len() > frac {
                    let split = digits.len() - frac;
                    write!(f, "{sign}{}.{}", &digits[..split], &digits[split..])
                } else {
                    write!(f, "{sign}0.{}{}", "0".repeat(frac - digits.len()), digits)
                }
            }
            Decimal::Approx(x) => write!(f, "{x}"),
        }
    }
}

fn scale(mant: i128, by: i32) -> Option<i128> {
    let mut m = mant;
    for _ in 0..by {
        m = m.checked_mul(10)?;
    }
    Some(m)
}

/// Integer detection for `"type": "integer"`. Draft-4 requires the literal to
/// be written without fraction or exponent; later drafts accept any number
/// with a zero fractional part (`1.0` counts).
pub(crate) fn is_integer(n: &Number, draft_version: u16) -> bool {
    if draft_version == 4 {
        let text = n.to_string();
        !text.contains(['.', 'e', 'E'])
    } else {
        Decimal::from_number(n).is_integer()
    }
}

/// Non-negative integer keyword values (`minItems`, `maxLength`, ...).
pub(crate) fn as_usize(n: &Number) -> Option<usize> {
    Decimal::from_number(n).to_usize()
}

/// JSON equality as the `const` / `enum` / `uniqueItems` keywords need it:
/// deep, order-sensitive for arrays, order-insensitive for objects, and
/// numeric across representations (`1` equals `1.0`).
pub(crate) fn equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => {
            Decimal::from_number(a).compare(Decimal::from_number(b)) == Ordering::Equal
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equals(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| equals(v, w)))
        }
        _ => false,
    }
}
