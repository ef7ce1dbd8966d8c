//! Lenient field readers for vendor JSON. Missing or mistyped fields fall back
//! to empty values instead of failing the whole payload.

use serde_json::{
    Number,
    Value,
};

pub(crate) fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

pub(crate) fn number(value: &Value) -> Number {
    match value {
        Value::Number(n) => n.clone(),
        _ => Number::from(0),
    }
}

pub(crate) fn flag(value: &Value) -> bool {
    value.as_bool().unwrap_or(false)
}

pub(crate) fn items(value: &Value) -> impl Iterator<Item = &Value> {
    value.as_array().into_iter().flatten()
}
