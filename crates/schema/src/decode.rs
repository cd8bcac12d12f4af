use prost::bytes::Buf;
use prost::encoding::{decode_key, decode_varint, WireType};
use serde_json::{Map, Value};

use crate::descriptor::{FieldDef, FieldKind, MessageDef, ScalarType, Schema};
use crate::error::{Result, SchemaError};

/// Decode a payload against the schema's root message.
///
/// Singular fields appear only when present on the wire; repeated fields are
/// always present, as `[]` when absent. Enumerations are rendered as their
/// numeric value, `bytes` as `0x`-prefixed hex. Unknown field numbers are
/// skipped.
pub fn decode(schema: &Schema, bytes: &[u8]) -> Result<Map<String, Value>> {
    decode_message(schema, schema.root_message(), bytes)
}

fn decode_message(
    schema: &Schema,
    message: &MessageDef,
    mut buf: &[u8],
) -> Result<Map<String, Value>> {
    let mut object = Map::new();

    while buf.has_remaining() {
        let (number, wire_type) = decode_key(&mut buf)?;

        let Some(field) = message.field_by_number(number) else {
            skip_field(number, wire_type, &mut buf)?;
            continue;
        };

        if field.repeated && field.kind.is_packable() && wire_type == WireType::LengthDelimited {
            let mut packed = take_length_delimited(&mut buf)?;
            while packed.has_remaining() {
                let value = decode_value(schema, field, &mut packed)?;
                push_repeated(&mut object, &field.name, value);
            }
            continue;
        }

        let expected = field.kind.wire_type();
        if wire_type != expected {
            return Err(SchemaError::WireTypeMismatch {
                field: field.name.clone(),
                expected,
                found: wire_type,
            });
        }

        let value = decode_value(schema, field, &mut buf)?;
        if field.repeated {
            push_repeated(&mut object, &field.name, value);
        } else {
            object.insert(field.name.clone(), value);
        }
    }

    for field in message.fields.iter().filter(|field| field.repeated) {
        object
            .entry(field.name.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
    }

    Ok(object)
}

fn push_repeated(object: &mut Map<String, Value>, name: &str, value: Value) {
    if let Value::Array(items) = object
        .entry(name)
        .or_insert_with(|| Value::Array(Vec::new()))
    {
        items.push(value);
    }
}

fn decode_value(schema: &Schema, field: &FieldDef, buf: &mut &[u8]) -> Result<Value> {
    match &field.kind {
        FieldKind::Enum(_) => Ok(Value::from(decode_varint(buf)? as i32)),
        FieldKind::Message(name) => {
            let inner = take_length_delimited(buf)?;
            let message = schema.message(name).ok_or_else(|| SchemaError::UnresolvedType {
                field: field.name.clone(),
                type_name: name.clone(),
            })?;
            Ok(Value::Object(decode_message(schema, message, inner)?))
        }
        FieldKind::Scalar(scalar) => decode_scalar(*scalar, field, buf),
    }
}

fn decode_scalar(scalar: ScalarType, field: &FieldDef, buf: &mut &[u8]) -> Result<Value> {
    let value = match scalar {
        ScalarType::Int32 => Value::from(decode_varint(buf)? as i32),
        ScalarType::Int64 => Value::from(decode_varint(buf)? as i64),
        ScalarType::Uint32 => Value::from(decode_varint(buf)? as u32),
        ScalarType::Uint64 => Value::from(decode_varint(buf)?),
        ScalarType::Sint32 => {
            let n = decode_varint(buf)? as u32;
            Value::from(((n >> 1) as i32) ^ -((n & 1) as i32))
        }
        ScalarType::Sint64 => {
            let n = decode_varint(buf)?;
            Value::from(((n >> 1) as i64) ^ -((n & 1) as i64))
        }
        ScalarType::Bool => Value::Bool(decode_varint(buf)? != 0),
        ScalarType::Fixed32 => {
            ensure_remaining(buf, 4)?;
            Value::from(buf.get_u32_le())
        }
        ScalarType::Sfixed32 => {
            ensure_remaining(buf, 4)?;
            Value::from(buf.get_i32_le())
        }
        ScalarType::Float => {
            ensure_remaining(buf, 4)?;
            Value::from(f64::from(buf.get_f32_le()))
        }
        ScalarType::Fixed64 => {
            ensure_remaining(buf, 8)?;
            Value::from(buf.get_u64_le())
        }
        ScalarType::Sfixed64 => {
            ensure_remaining(buf, 8)?;
            Value::from(buf.get_i64_le())
        }
        ScalarType::Double => {
            ensure_remaining(buf, 8)?;
            Value::from(buf.get_f64_le())
        }
        ScalarType::String => {
            let bytes = take_length_delimited(buf)?;
            let text = std::str::from_utf8(bytes)
                .map_err(|_| SchemaError::InvalidUtf8(field.name.clone()))?;
            Value::String(text.to_string())
        }
        ScalarType::Bytes => {
            let bytes = take_length_delimited(buf)?;
            Value::String(format!("0x{}", hex::encode(bytes)))
        }
    };
    Ok(value)
}

fn ensure_remaining(buf: &[u8], len: usize) -> Result<()> {
    if buf.len() < len {
        return Err(SchemaError::Truncated);
    }
    Ok(())
}

fn take_length_delimited<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8]> {
    let len = usize::try_from(decode_varint(buf)?).map_err(|_| SchemaError::Truncated)?;
    let slice: &'a [u8] = *buf;
    ensure_remaining(slice, len)?;
    let (head, tail) = slice.split_at(len);
    *buf = tail;
    Ok(head)
}

fn skip_field(number: u32, wire_type: WireType, buf: &mut &[u8]) -> Result<()> {
    match wire_type {
        WireType::Varint => {
            decode_varint(buf)?;
        }
        WireType::SixtyFourBit => {
            ensure_remaining(buf, 8)?;
            buf.advance(8);
        }
        WireType::ThirtyTwoBit => {
            ensure_remaining(buf, 4)?;
            buf.advance(4);
        }
        WireType::LengthDelimited => {
            take_length_delimited(buf)?;
        }
        WireType::StartGroup | WireType::EndGroup => {
            return Err(SchemaError::GroupsUnsupported(number));
        }
    }
    Ok(())
}
