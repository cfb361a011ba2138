//! The pluggable scalar conversion contract.
//!
//! Each scalar declares which wire kinds it converts from and a converter
//! that produces the native value. Conversion first attempts a zero-cost
//! pass-through when the runtime value already is native.

use serde_json::Value;
use std::sync::Arc;

/// The runtime kind of a wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireKind {
    Null,
    Boolean,
    Int,
    Float,
    String,
    List,
    Object,
}

impl WireKind {
    /// Returns the kind of a JSON value.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    Self::Int
                } else {
                    Self::Float
                }
            }
            Value::String(_) => Self::String,
            Value::Array(_) => Self::List,
            Value::Object(_) => Self::Object,
        }
    }
}

type NativePredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
type ConvertFn = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// Conversion behavior for one scalar type.
#[derive(Clone)]
pub struct ScalarHandler {
    is_native: NativePredicate,
    convert_from: Vec<WireKind>,
    convert: ConvertFn,
}

impl ScalarHandler {
    /// Creates a handler from a native predicate, a convert-from allow-list
    /// and a converter.
    pub fn new<N, C>(is_native: N, convert_from: Vec<WireKind>, convert: C) -> Self
    where
        N: Fn(&Value) -> bool + Send + Sync + 'static,
        C: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            is_native: Arc::new(is_native),
            convert_from,
            convert: Arc::new(convert),
        }
    }

    /// Converts a wire value into the native value.
    pub fn convert(&self, value: Value) -> Result<Value, String> {
        if (self.is_native)(&value) {
            return Ok(value);
        }
        let kind = WireKind::of(&value);
        if !self.convert_from.contains(&kind) {
            return Err(format!("cannot convert {kind:?} value"));
        }
        (self.convert)(value)
    }
}

impl std::fmt::Debug for ScalarHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalarHandler")
            .field("convert_from", &self.convert_from)
            .finish()
    }
}

/// Returns the handler for a built-in scalar name.
#[must_use]
pub fn builtin(name: &str) -> Option<ScalarHandler> {
    match name {
        "Int" => Some(ScalarHandler::new(
            |v| v.as_i64().is_some_and(|i| i32::try_from(i).is_ok()),
            vec![WireKind::Int],
            |v| {
                let i = v.as_i64().ok_or("expected an integer")?;
                i32::try_from(i)
                    .map(|i| Value::from(i64::from(i)))
                    .map_err(|_| format!("Int out of range: {i}"))
            },
        )),
        "Float" => Some(ScalarHandler::new(
            |v| matches!(v, Value::Number(n) if n.is_f64()),
            vec![WireKind::Int, WireKind::Float],
            |v| {
                let f = v.as_f64().ok_or("expected a number")?;
                Ok(Value::from(f))
            },
        )),
        "String" => Some(ScalarHandler::new(
            |v| v.is_string(),
            vec![WireKind::String],
            Ok,
        )),
        "Boolean" => Some(ScalarHandler::new(
            |v| v.is_boolean(),
            vec![WireKind::Boolean],
            Ok,
        )),
        "ID" => Some(ScalarHandler::new(
            |v| v.is_string(),
            vec![WireKind::String, WireKind::Int],
            |v| match v {
                Value::String(s) => Ok(Value::String(s)),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                _ => Err("expected a string or integer".to_string()),
            },
        )),
        _ => None,
    }
}

/// The names of the built-in scalars.
pub const BUILTIN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];
