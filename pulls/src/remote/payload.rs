//! Normalisation of list payloads.
//!
//! The backend answers list endpoints with either a bare array or an
//! object wrapping the array under `data`, `items` or `results`.

use corelib::Pull;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::remote::types::PullDto;

/// Wrapper keys tried in order.
pub const WRAPPER_KEYS: [&str; 3] = ["data", "items", "results"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("expected a JSON array or object, got {0}")]
    UnexpectedShape(&'static str),

    #[error("`{0}` is not an array")]
    NotAnArray(&'static str),
}

/// Decoded list plus the number of items that could not be decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub pulls: Vec<Pull>,
    pub skipped: usize,
}

impl Normalized {
    pub fn is_complete(&self) -> bool {
        self.skipped == 0
    }
}

pub fn normalize(payload: &Value) -> Result<Normalized, PayloadError> {
    let items = match payload {
        Value::Array(items) => items.as_slice(),
        Value::Object(obj) => match WRAPPER_KEYS.iter().find(|k| obj.contains_key(**k)) {
            Some(key) => obj
                .get(*key)
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .ok_or(PayloadError::NotAnArray(*key))?,
            // a wrapper without a known key carries no pulls
            None => &[],
        },
        other => return Err(PayloadError::UnexpectedShape(shape_name(other))),
    };

    let mut out = Normalized::default();
    for item in items {
        match decode_item(item) {
            Ok(p) => out.pulls.push(p),
            Err(e) => {
                // poison-item resilience: skip but don't fail the list
                warn!(error = %e, "skipping malformed pull item");
                out.skipped += 1;
            }
        }
    }

    Ok(out)
}

fn decode_item(item: &Value) -> anyhow::Result<Pull> {
    let dto: PullDto = serde_json::from_value(item.clone())?;
    Ok(Pull::try_from(dto)?)
}

fn shape_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
