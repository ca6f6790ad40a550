// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Structured keyword values.

Groupings and other side tables are stored as table keywords. The column
tables only hold strings there, so structured values are stored as compact
JSON and parsed back on read. Numbers without a fraction or exponent read
back as ints; floats are always written with one, so they stay floats.

*/

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("cannot encode or parse keyword value: {0}")]
pub struct KeywordParseError(#[from] serde_json::Error);

/// A keyword value. Variant order matters for deserialization: `Int` has
/// to be tried before `Float`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeywordValue {
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<KeywordValue>),
    Map(BTreeMap<String, KeywordValue>),
}

impl KeywordValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            KeywordValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            KeywordValue::Float(f) => Some(*f),
            KeywordValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeywordValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[KeywordValue]> {
        match self {
            KeywordValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, KeywordValue>> {
        match self {
            KeywordValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up `key` if this is a map.
    pub fn get(&self, key: &str) -> Option<&KeywordValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Interpret a list of ints.
    pub fn as_int_list(&self) -> Option<Vec<i64>> {
        self.as_list()?.iter().map(|v| v.as_int()).collect()
    }

    fn all_finite(&self) -> bool {
        match self {
            KeywordValue::Float(f) => f.is_finite(),
            KeywordValue::List(l) => l.iter().all(|v| v.all_finite()),
            KeywordValue::Map(m) => m.values().all(|v| v.all_finite()),
            _ => true,
        }
    }

    /// Encode as JSON text. Non-finite floats have no JSON form and are
    /// rejected.
    pub fn to_text(&self) -> Result<String, KeywordParseError> {
        if !self.all_finite() {
            return Err(<serde_json::Error as serde::ser::Error>::custom(
                "non-finite floats cannot be stored in keywords",
            )
            .into());
        }

        Ok(serde_json::to_string(self)?)
    }

    pub fn parse(text: &str) -> Result<KeywordValue, KeywordParseError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl fmt::Display for KeywordValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.to_text() {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}

impl FromStr for KeywordValue {
    type Err = KeywordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeywordValue::parse(s)
    }
}

impl From<i64> for KeywordValue {
    fn from(v: i64) -> Self {
        KeywordValue::Int(v)
    }
}

impl From<i32> for KeywordValue {
    fn from(v: i32) -> Self {
        KeywordValue::Int(v as i64)
    }
}

impl From<usize> for KeywordValue {
    fn from(v: usize) -> Self {
        KeywordValue::Int(v as i64)
    }
}

impl From<f64> for KeywordValue {
    fn from(v: f64) -> Self {
        KeywordValue::Float(v)
    }
}

impl From<&str> for KeywordValue {
    fn from(v: &str) -> Self {
        KeywordValue::Str(v.to_owned())
    }
}

impl From<String> for KeywordValue {
    fn from(v: String) -> Self {
        KeywordValue::Str(v)
    }
}

impl<T: Into<KeywordValue>> From<Vec<T>> for KeywordValue {
    fn from(v: Vec<T>) -> Self {
        KeywordValue::List(v.into_iter().map(|x| x.into()).collect())
    }
}

impl<T: Into<KeywordValue>> From<BTreeMap<String, T>> for KeywordValue {
    fn from(v: BTreeMap<String, T>) -> Self {
        KeywordValue::Map(v.into_iter().map(|(k, x)| (k, x.into())).collect())
    }
}
