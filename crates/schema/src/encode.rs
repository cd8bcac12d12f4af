use prost::bytes::BufMut;
use prost::encoding::{encode_key, encode_varint, WireType};
use serde_json::Value;

use crate::descriptor::{FieldDef, FieldKind, MessageDef, ScalarType, Schema};
use crate::error::{Result, SchemaError};

/// Encode a JSON object against the schema's root message.
///
/// Fields are written in field-number order; absent and empty repeated
/// fields are omitted. Enumerations accept either the numeric value or the
/// value name. `null` is rejected, so every accepted value comes back
/// unchanged from [`crate::decode`], up to enum names decoding as numbers.
pub fn encode(schema: &Schema, value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_message(schema, schema.root_message(), value, &mut buf)?;
    Ok(buf)
}

fn encode_message(
    schema: &Schema,
    message: &MessageDef,
    value: &Value,
    buf: &mut Vec<u8>,
) -> Result<()> {
    let object = value.as_object().ok_or_else(|| SchemaError::Encode {
        field: message.name.clone(),
        reason: "expected an object".to_string(),
    })?;

    if let Some(unknown) = object.keys().find(|key| message.field_by_name(key).is_none()) {
        return Err(SchemaError::UnknownField {
            message: message.name.clone(),
            field: unknown.clone(),
        });
    }

    for field in &message.fields {
        let Some(value) = object.get(&field.name) else {
            continue;
        };
        if value.is_null() {
            return Err(encode_error(field, "null is not a field value"));
        }

        if !field.repeated {
            encode_key(field.number, field.kind.wire_type(), buf);
            encode_value(schema, field, value, buf)?;
            continue;
        }

        let items = value.as_array().ok_or_else(|| encode_error(field, "expected an array"))?;
        if items.is_empty() {
            continue;
        }

        if field.packed && field.kind.is_packable() {
            let mut packed = Vec::new();
            for item in items {
                encode_value(schema, field, item, &mut packed)?;
            }
            encode_key(field.number, WireType::LengthDelimited, buf);
            encode_varint(packed.len() as u64, buf);
            buf.put_slice(&packed);
        } else {
            for item in items {
                encode_key(field.number, field.kind.wire_type(), buf);
                encode_value(schema, field, item, buf)?;
            }
        }
    }

    Ok(())
}

fn encode_error(field: &FieldDef, reason: impl Into<String>) -> SchemaError {
    SchemaError::Encode {
        field: field.name.clone(),
        reason: reason.into(),
    }
}

fn encode_value(
    schema: &Schema,
    field: &FieldDef,
    value: &Value,
    buf: &mut Vec<u8>,
) -> Result<()> {
    match &field.kind {
        FieldKind::Enum(name) => {
            let number = match value {
                Value::String(label) => schema
                    .enum_def(name)
                    .and_then(|def| def.value_of(label))
                    .ok_or_else(|| {
                        encode_error(field, format!("{label} is not a value of {name}"))
                    })?,
                _ => value
                    .as_i64()
                    .and_then(|n| i32::try_from(n).ok())
                    .ok_or_else(|| encode_error(field, "expected an enum value"))?,
            };
            encode_varint(i64::from(number) as u64, buf);
        }
        FieldKind::Message(name) => {
            let message = schema.message(name).ok_or_else(|| SchemaError::UnresolvedType {
                field: field.name.clone(),
                type_name: name.clone(),
            })?;
            let mut inner = Vec::new();
            encode_message(schema, message, value, &mut inner)?;
            encode_varint(inner.len() as u64, buf);
            buf.put_slice(&inner);
        }
        FieldKind::Scalar(scalar) => encode_scalar(*scalar, field, value, buf)?,
    }
    Ok(())
}

fn encode_scalar(
    scalar: ScalarType,
    field: &FieldDef,
    value: &Value,
    buf: &mut Vec<u8>,
) -> Result<()> {
    let signed = |bits: &str| {
        value
            .as_i64()
            .ok_or_else(|| encode_error(field, format!("expected a {bits}-bit signed integer")))
    };
    let unsigned = |bits: &str| {
        value
            .as_u64()
            .ok_or_else(|| encode_error(field, format!("expected a {bits}-bit unsigned integer")))
    };
    let float = || {
        value
            .as_f64()
            .ok_or_else(|| encode_error(field, "expected a number"))
    };
    let narrow_i32 = |n: i64| i32::try_from(n).map_err(|_| encode_error(field, "out of range"));
    let narrow_u32 = |n: u64| u32::try_from(n).map_err(|_| encode_error(field, "out of range"));

    match scalar {
        ScalarType::Int32 => encode_varint(i64::from(narrow_i32(signed("32")?)?) as u64, buf),
        ScalarType::Int64 => encode_varint(signed("64")? as u64, buf),
        ScalarType::Uint32 => encode_varint(u64::from(narrow_u32(unsigned("32")?)?), buf),
        ScalarType::Uint64 => encode_varint(unsigned("64")?, buf),
        ScalarType::Sint32 => {
            let n = narrow_i32(signed("32")?)?;
            encode_varint(u64::from(((n << 1) ^ (n >> 31)) as u32), buf);
        }
        ScalarType::Sint64 => {
            let n = signed("64")?;
            encode_varint(((n << 1) ^ (n >> 63)) as u64, buf);
        }
        ScalarType::Bool => {
            let flag = value
                .as_bool()
                .ok_or_else(|| encode_error(field, "expected a boolean"))?;
            encode_varint(u64::from(flag), buf);
        }
        ScalarType::Fixed32 => buf.put_u32_le(narrow_u32(unsigned("32")?)?),
        ScalarType::Sfixed32 => buf.put_i32_le(narrow_i32(signed("32")?)?),
        ScalarType::Float => buf.put_f32_le(float()? as f32),
        ScalarType::Fixed64 => buf.put_u64_le(unsigned("64")?),
        ScalarType::Sfixed64 => buf.put_i64_le(signed("64")?),
        ScalarType::Double => buf.put_f64_le(float()?),
        ScalarType::String => {
            let text = value
                .as_str()
                .ok_or_else(|| encode_error(field, "expected a string"))?;
            encode_varint(text.len() as u64, buf);
            buf.put_slice(text.as_bytes());
        }
        ScalarType::Bytes => {
            let text = value
                .as_str()
                .ok_or_else(|| encode_error(field, "expected a hex string"))?;
            let bytes = hex::decode(text.trim_start_matches("0x"))
                .map_err(|e| encode_error(field, e.to_string()))?;
            encode_varint(bytes.len() as u64, buf);
            buf.put_slice(&bytes);
        }
    }
    Ok(())
}
