//! Type Coercion
//!
//! Scripts only produce strings, numbers, booleans, null and arrays. Before a
//! parameter reaches its typed Rust argument it is normalised here to the
//! shape that argument deserializes from:
//!
//! - null stays null, nullable targets are unwrapped first
//! - enumerations accept a member name or an ordinal
//! - UUIDs are parsed from their canonical string form
//! - integers are narrowed with a range check, from JSON numbers or from
//!   decimal strings of any length
//! - floats are converted to the target float
//!
//! Anything else passes through unchanged. That is a permissive fallback: an
//! ill-typed value fails later, when the argument is deserialized.

use super::capability::{IntWidth, ValueType};
use crate::core::error::{CoercionError, CoercionResult};
use num_bigint::BigInt;
use serde_json::{Number, Value};
use std::str::FromStr;
use uuid::Uuid;

/// Normalise `value` towards `target`
pub fn coerce(value: Value, target: &ValueType) -> CoercionResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    match target {
        ValueType::Any | ValueType::Bool | ValueType::Text => Ok(value),
        ValueType::Nullable(inner) => coerce(value, inner),
        ValueType::Enumeration { name, members } => coerce_enum(value, name, members),
        ValueType::Uuid => coerce_uuid(value),
        ValueType::Int(width) => coerce_int(value, *width),
        ValueType::Float => coerce_float(value),
        ValueType::List(inner) => match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| coerce(item, inner))
                .collect::<CoercionResult<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other),
        },
    }
}

/// Coerce a positional parameter list against the declared types
///
/// Missing trailing parameters are filled with null, surplus ones dropped.
pub fn coerce_all(parameters: Vec<Value>, types: &[ValueType]) -> CoercionResult<Vec<Value>> {
    let mut parameters = parameters.into_iter();
    types
        .iter()
        .map(|ty| coerce(parameters.next().unwrap_or(Value::Null), ty))
        .collect()
}

fn coerce_enum(value: Value, name: &str, members: &[&str]) -> CoercionResult<Value> {
    match value {
        Value::Number(ref n) => {
            let ordinal = integral(n).ok_or_else(|| CoercionError::UnknownOrdinal {
                name: name.to_string(),
                ordinal: n.to_string(),
            })?;
            usize::try_from(ordinal)
                .ok()
                .and_then(|index| members.get(index))
                .map(|member| Value::String((*member).to_string()))
                .ok_or_else(|| CoercionError::UnknownOrdinal {
                    name: name.to_string(),
                    ordinal: ordinal.to_string(),
                })
        }
        other => Ok(other),
    }
}

fn coerce_uuid(value: Value) -> CoercionResult<Value> {
    match value {
        Value::String(s) => Uuid::parse_str(s.trim())
            .map(|uuid| Value::String(uuid.hyphenated().to_string()))
            .map_err(|_| CoercionError::InvalidUuid(s)),
        other => Err(CoercionError::InvalidUuid(other.to_string())),
    }
}

fn coerce_int(value: Value, width: IntWidth) -> CoercionResult<Value> {
    let wide = match &value {
        Value::Number(n) => integral(n).ok_or_else(|| CoercionError::OutOfRange {
            value: n.to_string(),
            target: width.name().to_string(),
        })?,
        Value::String(s) => parse_big_integer(s, width)?,
        _ => return Ok(value),
    };
    narrow(wide, width)
}

fn coerce_float(value: Value) -> CoercionResult<Value> {
    match &value {
        Value::Number(n) => {
            let f = n.as_f64().unwrap_or(f64::NAN);
            Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| CoercionError::OutOfRange {
                    value: n.to_string(),
                    target: "float".to_string(),
                })
        }
        _ => Ok(value),
    }
}

/// Integer value of a JSON number; non-integral floats round half to even
fn integral(n: &Number) -> Option<i128> {
    if let Some(i) = n.as_i64() {
        return Some(i as i128);
    }
    if let Some(u) = n.as_u64() {
        return Some(u as i128);
    }
    let f = n.as_f64()?.round_ties_even();
    // i128 covers every value a u64/i64 target can hold
    if f.is_finite() && f >= i128::MIN as f64 && f < i128::MAX as f64 {
        Some(f as i128)
    } else {
        None
    }
}

/// Decimal string of arbitrary length
fn parse_big_integer(text: &str, width: IntWidth) -> CoercionResult<i128> {
    let big = BigInt::from_str(text.trim())
        .map_err(|_| CoercionError::InvalidNumber(text.to_string()))?;
    i128::try_from(&big).map_err(|_| CoercionError::OutOfRange {
        value: big.to_string(),
        target: width.name().to_string(),
    })
}

fn narrow(value: i128, width: IntWidth) -> CoercionResult<Value> {
    if value < width.min() || value > width.max() {
        return Err(CoercionError::OutOfRange {
            value: value.to_string(),
            target: width.name().to_string(),
        });
    }
    if value >= 0 {
        Ok(Value::from(value as u64))
    } else {
        Ok(Value::from(value as i64))
    }
}
