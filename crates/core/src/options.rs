// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declared option schemas and normalization of requested option values.
//!
//! Normalization turns whatever the caller sent into one canonical form:
//! defaults filled in, scalars coerced to the declared type, sets sorted and
//! de-duplicated. Two requests that mean the same thing normalize to equal
//! values, which is what makes fingerprints stable.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Option values keyed by option name.
pub type Options = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("method {method}: unknown option {option:?}")]
    Unknown { method: String, option: String },
    #[error("method {method}: missing required option {option:?}")]
    Missing { method: String, option: String },
    #[error("method {method}: option {option:?} {reason}")]
    Invalid { method: String, option: String, reason: String },
}

/// Declared type of one option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptionType {
    Any,
    Str,
    NonEmptyStr,
    Int,
    Float,
    Bool,
    /// One of a fixed set of strings. A value ending in `*` accepts any
    /// string with that prefix.
    Enum { values: Vec<String> },
    List { item: Box<OptionType> },
    Set { item: Box<OptionType> },
    Map { value: Box<OptionType> },
}

impl OptionType {
    pub fn list(item: OptionType) -> Self {
        OptionType::List { item: Box::new(item) }
    }

    pub fn set(item: OptionType) -> Self {
        OptionType::Set { item: Box::new(item) }
    }

    pub fn map(value: OptionType) -> Self {
        OptionType::Map { value: Box::new(value) }
    }

    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        OptionType::Enum { values: values.into_iter().map(Into::into).collect() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: OptionType,
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub required: bool,
}

impl OptionSpec {
    pub fn new(name: impl Into<String>, ty: OptionType) -> Self {
        Self { name: name.into(), ty, default: Value::Null, required: false }
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// The full set of options a method accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionSchema {
    specs: BTreeMap<String, OptionSpec>,
}

impl OptionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, spec: OptionSpec) -> Self {
        self.specs.insert(spec.name.clone(), spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.specs.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptionSpec> {
        self.specs.values()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Validate and canonicalize `given` against this schema.
    pub fn normalize(&self, method: &str, given: &Options) -> Result<Options, OptionsError> {
        if let Some(option) = given.keys().find(|k| !self.specs.contains_key(*k)) {
            return Err(OptionsError::Unknown { method: method.to_string(), option: option.clone() });
        }

        let mut out = Options::new();
        for spec in self.specs.values() {
            let invalid = |reason: String| OptionsError::Invalid {
                method: method.to_string(),
                option: spec.name.clone(),
                reason,
            };
            let value = match given.get(&spec.name) {
                Some(v) => coerce(&spec.ty, v).map_err(invalid)?,
                None if spec.required => {
                    return Err(OptionsError::Missing {
                        method: method.to_string(),
                        option: spec.name.clone(),
                    });
                }
                None => coerce(&spec.ty, &spec.default)
                    .map_err(|reason| invalid(format!("has an invalid default: {reason}")))?,
            };
            if spec.required && value.is_null() {
                return Err(invalid("must not be null".to_string()));
            }
            out.insert(spec.name.clone(), value);
        }
        Ok(out)
    }

    /// Coerce only the keys present in `given`, for matching against
    /// normalized options. Absent keys are not filled with defaults.
    pub fn normalize_filter(&self, method: &str, given: &Options) -> Result<Options, OptionsError> {
        let mut out = Options::new();
        for (key, value) in given {
            let spec = self.specs.get(key).ok_or_else(|| OptionsError::Unknown {
                method: method.to_string(),
                option: key.clone(),
            })?;
            let value = coerce(&spec.ty, value).map_err(|reason| OptionsError::Invalid {
                method: method.to_string(),
                option: key.clone(),
                reason,
            })?;
            out.insert(key.clone(), value);
        }
        Ok(out)
    }

    /// Check that every declared default is itself a valid value.
    pub fn check_defaults(&self, method: &str) -> Result<(), OptionsError> {
        for spec in self.specs.values().filter(|s| !s.required) {
            coerce(&spec.ty, &spec.default).map_err(|reason| OptionsError::Invalid {
                method: method.to_string(),
                option: spec.name.clone(),
                reason: format!("has an invalid default: {reason}"),
            })?;
        }
        Ok(())
    }
}

/// Coerce one value to `ty`. `null` passes through for every type except
/// non-empty strings; required-ness is checked by the caller.
pub fn coerce(ty: &OptionType, value: &Value) -> Result<Value, String> {
    if value.is_null() {
        return match ty {
            OptionType::NonEmptyStr => Err("must be a non-empty string".to_string()),
            _ => Ok(Value::Null),
        };
    }
    match ty {
        OptionType::Any => Ok(value.clone()),
        OptionType::Str => coerce_str(value).map(Value::String),
        OptionType::NonEmptyStr => match coerce_str(value)? {
            s if s.is_empty() => Err("must be a non-empty string".to_string()),
            s => Ok(Value::String(s)),
        },
        OptionType::Int => coerce_int(value).map(Value::from),
        OptionType::Float => coerce_float(value),
        OptionType::Bool => coerce_bool(value).map(Value::Bool),
        OptionType::Enum { values } => coerce_enum(values, value),
        OptionType::List { item } => coerce_items(item, value).map(Value::Array),
        OptionType::Set { item } => {
            let mut items = coerce_items(item, value)?;
            items.sort_by_cached_key(|v| v.to_string());
            items.dedup();
            Ok(Value::Array(items))
        }
        OptionType::Map { value: value_ty } => match value {
            Value::Object(map) => {
                let mut out = Options::new();
                for (k, v) in map {
                    let v = coerce(value_ty, v).map_err(|reason| format!("[{k:?}] {reason}"))?;
                    out.insert(k.clone(), v);
                }
                Ok(Value::Object(out))
            }
            _ => Err("expected a mapping".to_string()),
        },
    }
}

fn coerce_str(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err("expected a string".to_string()),
    }
}

fn coerce_int(value: &Value) -> Result<i64, String> {
    let err = || format!("expected an integer, got {value}");
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Ok(f as i64),
                _ => Err(err()),
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| err()),
        _ => Err(err()),
    }
}

fn coerce_float(value: &Value) -> Result<Value, String> {
    let f = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    f.and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| format!("expected a finite number, got {value}"))
}

fn coerce_bool(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" | "t" | "y" => Ok(true),
            "false" | "no" | "off" | "0" | "f" | "n" | "" => Ok(false),
            _ => Err(format!("expected a boolean, got {s:?}")),
        },
        _ => Err(format!("expected a boolean, got {value}")),
    }
}

fn coerce_enum(values: &[String], value: &Value) -> Result<Value, String> {
    let s = match value {
        Value::String(s) => s,
        _ => return Err(format!("expected one of {values:?}")),
    };
    let ok = values.iter().any(|allowed| match allowed.strip_suffix('*') {
        Some(prefix) => s.starts_with(prefix),
        None => allowed == s,
    });
    if ok {
        Ok(Value::String(s.clone()))
    } else {
        Err(format!("{s:?} is not one of {values:?}"))
    }
}

fn coerce_items(item: &OptionType, value: &Value) -> Result<Vec<Value>, String> {
    let raw: Vec<Value> = match value {
        Value::Array(items) => items.clone(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| Value::String(p.to_string()))
            .collect(),
        _ => return Err("expected a list".to_string()),
    };
    raw.iter()
        .enumerate()
        .map(|(i, v)| coerce(item, v).map_err(|reason| format!("[{i}] {reason}")))
        .collect()
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
