//! Correlation keys carried down the record hierarchy.
//!
//! A [`CorrelationKeys`] value is immutable and cheap to clone: pairing a row
//! builds a new map that shares nothing mutable with its parent, so sibling
//! branches can extend the same parent keys concurrently.

use crate::error::ConversionError;
use crate::record::{Row, scalar_text};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CorrelationKeys(Arc<IndexMap<String, String>>);

impl CorrelationKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// A copy of these keys with `name` set to `value`.
    pub fn with(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = (*self.0).clone();
        next.insert(name.into(), value.into());
        Self(Arc::new(next))
    }

    /// Extend these keys with `fields` taken from `row`.
    ///
    /// Existing keys of the same name are overridden, all others are kept.
    pub fn pair(&self, row: &Row, fields: &[&str]) -> Result<Self, ConversionError> {
        self.pair_map(row.as_map(), fields, &[])
    }

    /// Like [`pair`](Self::pair), with `carried` fields copied when present and
    /// left out when absent or `null`.
    pub fn pair_carrying(
        &self,
        row: &Row,
        fields: &[&str],
        carried: &[&str],
    ) -> Result<Self, ConversionError> {
        self.pair_map(row.as_map(), fields, carried)
    }

    pub(crate) fn pair_map(
        &self,
        obj: &Map<String, Value>,
        fields: &[&str],
        carried: &[&str],
    ) -> Result<Self, ConversionError> {
        if fields.is_empty() && carried.is_empty() {
            return Ok(self.clone());
        }
        let mut next = (*self.0).clone();
        for field in fields {
            let value = key_text(obj, field)?.ok_or_else(|| ConversionError::MissingKey {
                field: field.to_string(),
            })?;
            next.insert(field.to_string(), value);
        }
        for field in carried {
            if let Some(value) = key_text(obj, field)? {
                next.insert(field.to_string(), value);
            }
        }
        Ok(Self(Arc::new(next)))
    }
}

fn key_text(obj: &Map<String, Value>, field: &str) -> Result<Option<String>, ConversionError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => scalar_text(v).map(Some).ok_or_else(|| ConversionError::InvalidValue {
            column: field.to_string(),
            reason: "identifier must be a scalar".into(),
        }),
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CorrelationKeys {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(Arc::new(
            iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }
}

/// Pair `row` onto `keys`; see [`CorrelationKeys::pair`].
pub fn pair(row: &Row, keys: &CorrelationKeys, fields: &[&str]) -> Result<CorrelationKeys, ConversionError> {
    keys.pair(row, fields)
}
