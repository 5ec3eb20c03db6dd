//! Reading saved API snapshots back into typed records.
//!
//! The main entry point is [`surface_from_json`], which accepts either the
//! bare method array printed by `surface methods` or an object with
//! `types` and `methods` arrays.

use crate::types::{sort_methods, ApiSurface, MethodRecord, TypeRecord};
use std::fmt;

/// Errors while reading a saved snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterchangeError {
    /// The snapshot is missing a required top-level field.
    MissingField { field: String },
    /// A record inside the snapshot does not have the expected shape.
    RecordError { index: usize, message: String },
    /// The snapshot is neither an array nor an object.
    InvalidSnapshot(String),
}

impl fmt::Display for InterchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterchangeError::MissingField { field } => {
                write!(f, "snapshot missing required field: '{}'", field)
            }
            InterchangeError::RecordError { index, message } => {
                write!(f, "record {}: {}", index, message)
            }
            InterchangeError::InvalidSnapshot(msg) => {
                write!(f, "invalid snapshot: {}", msg)
            }
        }
    }
}

impl std::error::Error for InterchangeError {}

/// Deserialize a saved snapshot into an [`ApiSurface`].
///
/// Records are re-sorted into output order so that snapshots edited by
/// hand still diff deterministically.
pub fn surface_from_json(value: &serde_json::Value) -> Result<ApiSurface, InterchangeError> {
    let (types_arr, methods_arr) = match value {
        serde_json::Value::Array(methods) => (None, methods),
        serde_json::Value::Object(obj) => {
            let methods = obj.get("methods").and_then(|m| m.as_array()).ok_or_else(|| {
                InterchangeError::MissingField {
                    field: "methods".to_string(),
                }
            })?;
            (obj.get("types").and_then(|t| t.as_array()), methods)
        }
        other => {
            return Err(InterchangeError::InvalidSnapshot(format!(
                "expected an array or object, found {}",
                json_kind(other)
            )))
        }
    };

    let mut methods = Vec::with_capacity(methods_arr.len());
    for (index, raw) in methods_arr.iter().enumerate() {
        let record: MethodRecord =
            serde_json::from_value(raw.clone()).map_err(|e| InterchangeError::RecordError {
                index,
                message: e.to_string(),
            })?;
        methods.push(record);
    }
    sort_methods(&mut methods);

    let mut types = Vec::new();
    if let Some(arr) = types_arr {
        for (index, raw) in arr.iter().enumerate() {
            let record: TypeRecord =
                serde_json::from_value(raw.clone()).map_err(|e| InterchangeError::RecordError {
                    index,
                    message: e.to_string(),
                })?;
            types.push(record);
        }
        types.sort();
    }

    Ok(ApiSurface::new(types, methods))
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
