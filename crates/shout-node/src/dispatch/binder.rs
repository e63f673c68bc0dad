//! Payload-to-parameter binding.
//!
//! A payload is a flat JSON object. Each key becomes a named parameter and
//! each value must be a scalar; composite values are rejected instead of
//! being stringified.

use std::collections::BTreeMap;

use serde_json::{Number, Value};
use shout_db::rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue};
use shout_db::rusqlite::{self, Statement};

use crate::error::DispatchError;

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Number(Number),
    Boolean(bool),
    Null,
}

impl ToSql for ParamValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            ParamValue::String(s) => ToSqlOutput::from(s.as_str()),
            ParamValue::Number(n) => match n.as_i64() {
                Some(i) => ToSqlOutput::Owned(SqlValue::Integer(i)),
                // Unsigned values past i64::MAX and all fractions bind as REAL.
                None => ToSqlOutput::Owned(SqlValue::Real(n.as_f64().unwrap_or(f64::NAN))),
            },
            ParamValue::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            ParamValue::Null => ToSqlOutput::Owned(SqlValue::Null),
        })
    }
}

/// Named parameters for one statement. Keys carry no placeholder prefix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    params: BTreeMap<String, ParamValue>,
}

impl ParameterSet {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// Bind every named placeholder of `stmt` that has a matching parameter.
    ///
    /// Placeholders without a value stay unbound and read as NULL. Parameters
    /// without a placeholder are skipped.
    pub fn bind_to(&self, stmt: &mut Statement<'_>) -> Result<usize, DispatchError> {
        let mut bound = 0;
        let mut used = Vec::with_capacity(self.params.len());
        for index in 1..=stmt.parameter_count() {
            let Some(placeholder) = stmt.parameter_name(index) else {
                continue;
            };
            let key = placeholder.trim_start_matches([':', '@', '$']);
            let Some((name, value)) = self.params.get_key_value(key) else {
                tracing::debug!(placeholder, "no payload value for placeholder");
                continue;
            };
            used.push(name.as_str());
            stmt.raw_bind_parameter(index, value)?;
            bound += 1;
        }
        for name in self.names().filter(|name| !used.contains(name)) {
            tracing::debug!(param = name, "payload field has no placeholder");
        }
        Ok(bound)
    }
}

impl FromIterator<(String, ParamValue)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

/// Parse a raw payload into a [`ParameterSet`].
///
/// An empty (or all-whitespace) payload yields an empty set.
pub fn bind_payload(payload: &[u8]) -> Result<ParameterSet, DispatchError> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Ok(ParameterSet::default());
    }
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| DispatchError::PayloadParse(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(DispatchError::PayloadParse(format!(
            "top-level value is {}",
            json_type(&value)
        )));
    };

    fields
        .into_iter()
        .map(|(key, value)| {
            let param = match value {
                Value::String(s) => ParamValue::String(s),
                Value::Number(n) => ParamValue::Number(n),
                Value::Bool(b) => ParamValue::Boolean(b),
                Value::Null => ParamValue::Null,
                other @ (Value::Array(_) | Value::Object(_)) => {
                    return Err(DispatchError::PayloadShape {
                        key,
                        found: json_type(&other),
                    });
                }
            };
            Ok((key, param))
        })
        .collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
