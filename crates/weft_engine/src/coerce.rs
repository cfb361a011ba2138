//! The value-coercion contract.
//!
//! Converts wire values to native argument/variable values for a target
//! type reference, and coerces leaf values on the output path. Conversion
//! dispatches by the target's base type kind: scalars go through the
//! schema's handler allow-list, enums validate names (flag-style enums
//! decode to an `i64` bitmask), input objects coerce per declared field.

use crate::request::{Operation, ValueNode};
use serde_json::Value;
use std::collections::HashMap;
use weft_core::{ErrorCode, GraphQLError, ResponsePath};
use weft_schema::{EnumDef, Schema, TypeDef, TypeRef};

/// Evaluates a request value node against variable values.
///
/// An unbound variable evaluates to `null`; whether that is acceptable is
/// decided by the subsequent conversion against the target type.
#[must_use]
pub fn eval_value(node: &ValueNode, variables: &HashMap<String, Value>) -> Value {
    match node {
        ValueNode::Null => Value::Null,
        ValueNode::Int(i) => Value::from(*i),
        ValueNode::Float(f) => Value::from(*f),
        ValueNode::String(s) => Value::String(s.clone()),
        ValueNode::Boolean(b) => Value::Bool(*b),
        ValueNode::Enum(name) => Value::String(name.clone()),
        ValueNode::Variable(name) => variables.get(name).cloned().unwrap_or(Value::Null),
        ValueNode::List(items) => {
            Value::Array(items.iter().map(|v| eval_value(v, variables)).collect())
        }
        ValueNode::Object(fields) => {
            let mut map = serde_json::Map::new();
            for (key, value) in fields {
                map.insert(key.clone(), eval_value(value, variables));
            }
            Value::Object(map)
        }
    }
}

fn input_error(anchor: &ResponsePath, message: String) -> GraphQLError {
    GraphQLError::new(ErrorCode::InputError, message).with_path(anchor.clone())
}

/// Validates and converts a wire value for a target type reference.
///
/// Passing `null` for a non-null target is an anchored input error, never a
/// silent default.
pub fn validate_convert(
    value: Value,
    ty: &TypeRef,
    schema: &Schema,
    anchor: &ResponsePath,
) -> Result<Value, GraphQLError> {
    match ty {
        TypeRef::NonNull(inner) => {
            if value.is_null() {
                return Err(input_error(
                    anchor,
                    format!("null provided for non-null type {}", ty.render()),
                ));
            }
            validate_convert(value, inner, schema, anchor)
        }
        _ if value.is_null() => Ok(Value::Null),
        TypeRef::List(inner) => match value {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    out.push(validate_convert(item, inner, schema, &anchor.child_index(i))?);
                }
                Ok(Value::Array(out))
            }
            // A single value coerces to a one-element list.
            single => Ok(Value::Array(vec![validate_convert(
                single,
                inner,
                schema,
                &anchor.child_index(0),
            )?])),
        },
        TypeRef::Named(name) => match schema.get_type(name) {
            Some(TypeDef::Scalar(_)) => {
                let handler = schema.scalar_handler(name).ok_or_else(|| {
                    input_error(anchor, format!("no conversion handler for scalar {name}"))
                })?;
                handler
                    .convert(value)
                    .map_err(|e| input_error(anchor, format!("invalid {name} value: {e}")))
            }
            Some(TypeDef::Enum(def)) => convert_enum_input(value, def, anchor),
            Some(TypeDef::InputObject(def)) => {
                let Value::Object(map) = value else {
                    return Err(input_error(
                        anchor,
                        format!("expected input object {name}"),
                    ));
                };
                let mut out = serde_json::Map::new();
                for (key, _) in &map {
                    if !def.fields.contains_key(key) {
                        return Err(input_error(
                            &anchor.child_key(key.clone()),
                            format!("unknown field '{key}' on input object {name}"),
                        ));
                    }
                }
                let mut map = map;
                for (field_name, field) in &def.fields {
                    let field_anchor = anchor.child_key(field_name.clone());
                    match map.remove(field_name) {
                        Some(v) => {
                            out.insert(
                                field_name.clone(),
                                validate_convert(v, &field.ty, schema, &field_anchor)?,
                            );
                        }
                        None => {
                            if let Some(default) = &field.default_value {
                                out.insert(field_name.clone(), default.clone());
                            } else if field.ty.is_non_null() {
                                return Err(input_error(
                                    &field_anchor,
                                    format!(
                                        "missing required field '{field_name}' on input object {name}"
                                    ),
                                ));
                            }
                        }
                    }
                }
                Ok(Value::Object(out))
            }
            Some(def) => Err(input_error(
                anchor,
                format!("{} type {name} is not an input type", def.kind_name()),
            )),
            None => Err(input_error(anchor, format!("unknown type {name}"))),
        },
    }
}

fn convert_enum_input(
    value: Value,
    def: &EnumDef,
    anchor: &ResponsePath,
) -> Result<Value, GraphQLError> {
    if let Some(table) = def.flag_table() {
        return match value {
            // Already a decoded mask.
            Value::Number(n) => {
                let mask = n
                    .as_i64()
                    .ok_or_else(|| input_error(anchor, format!("invalid {} mask", def.name)))?;
                if mask & !table.all_bits() != 0 {
                    return Err(input_error(
                        anchor,
                        format!("undeclared bits in {} mask", def.name),
                    ));
                }
                Ok(Value::from(mask))
            }
            Value::String(s) => table
                .decode([s.as_str()])
                .map(Value::from)
                .map_err(|e| input_error(anchor, format!("invalid {} value: {e}", def.name))),
            Value::Array(items) => {
                let mut names = Vec::with_capacity(items.len());
                for item in &items {
                    let name = item.as_str().ok_or_else(|| {
                        input_error(anchor, format!("expected {} value names", def.name))
                    })?;
                    names.push(name);
                }
                table
                    .decode(names)
                    .map(Value::from)
                    .map_err(|e| input_error(anchor, format!("invalid {} value: {e}", def.name)))
            }
            _ => Err(input_error(
                anchor,
                format!("expected {} value or list of values", def.name),
            )),
        };
    }
    match value {
        Value::String(s) if def.has_value(&s) => Ok(Value::String(s)),
        Value::String(s) => Err(input_error(
            anchor,
            format!("unknown {} value '{s}'", def.name),
        )),
        _ => Err(input_error(anchor, format!("expected {} value", def.name))),
    }
}

/// Coerces a leaf value on the output path.
///
/// Scalars pass through their handler; flag-style enum masks encode to
/// their wire string-array form. A mismatch here is a server fault, not a
/// client input error.
pub fn convert_leaf_output(
    value: Value,
    base_type: &str,
    schema: &Schema,
    path: &ResponsePath,
) -> Result<Value, GraphQLError> {
    let server_error = |message: String| {
        GraphQLError::new(ErrorCode::ServerError, message).with_path(path.clone())
    };
    match schema.get_type(base_type) {
        Some(TypeDef::Scalar(_)) => {
            let handler = schema
                .scalar_handler(base_type)
                .ok_or_else(|| server_error(format!("no handler for scalar {base_type}")))?;
            handler
                .convert(value)
                .map_err(|e| server_error(format!("invalid {base_type} result: {e}")))
        }
        Some(TypeDef::Enum(def)) => {
            if let Some(table) = def.flag_table() {
                return match value {
                    Value::Number(n) => {
                        let mask = n.as_i64().ok_or_else(|| {
                            server_error(format!("invalid {} mask", def.name))
                        })?;
                        Ok(Value::Array(
                            table.encode(mask).into_iter().map(Value::String).collect(),
                        ))
                    }
                    Value::Array(items) => Ok(Value::Array(items)),
                    other => Err(server_error(format!(
                        "expected {} mask, got {other}",
                        def.name
                    ))),
                };
            }
            match value {
                Value::String(s) if def.has_value(&s) => Ok(Value::String(s)),
                other => Err(server_error(format!(
                    "invalid {} result: {other}",
                    def.name
                ))),
            }
        }
        _ => Err(server_error(format!("{base_type} is not a leaf type"))),
    }
}

/// Coerces externally supplied variable values against an operation's
/// variable definitions. Values may already be native or raw wire values;
/// operation defaults apply when a variable is absent. Errors accumulate.
pub fn coerce_variables(
    operation: &Operation,
    raw: &HashMap<String, Value>,
    schema: &Schema,
) -> Result<HashMap<String, Value>, Vec<GraphQLError>> {
    let mut coerced = HashMap::new();
    let mut errors = Vec::new();
    let empty = HashMap::new();

    for var in &operation.variables {
        let anchor = ResponsePath::root().child_key(format!("${}", var.name));
        let supplied = raw.get(&var.name).cloned();
        let value = match supplied {
            Some(v) => v,
            None => match &var.default_value {
                Some(node) => eval_value(node, &empty),
                None if var.ty.is_non_null() => {
                    errors.push(
                        GraphQLError::new(
                            ErrorCode::InputError,
                            format!(
                                "variable ${} of non-null type {} was not provided",
                                var.name,
                                var.ty.render()
                            ),
                        )
                        .with_path(anchor),
                    );
                    continue;
                }
                None => continue,
            },
        };
        match validate_convert(value, &var.ty, schema, &anchor) {
            Ok(v) => {
                coerced.insert(var.name.clone(), v);
            }
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(coerced)
    } else {
        Err(errors)
    }
}
