//! Parsing of protobuf JSON descriptors.
//!
//! The descriptor format is the one emitted by protobuf.js `Root#toJSON`:
//! namespaces carry a `nested` object, messages carry `fields`, enums carry
//! `values`. Type references are resolved once at parse time using protobuf
//! scoping rules (innermost scope first).

use std::collections::{BTreeMap, HashMap, HashSet};

use prost::encoding::WireType;
use serde_json::{Map, Value};

use crate::error::{Result, SchemaError};

/// Root message used by collections that do not name one explicitly.
pub const DEFAULT_ROOT: &str = "onChainMetaData.NFTMeta";

const MAX_FIELD_NUMBER: u64 = (1 << 29) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarType {
    fn from_name(name: &str) -> Option<Self> {
        let scalar = match name {
            "double" => Self::Double,
            "float" => Self::Float,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "sint32" => Self::Sint32,
            "sint64" => Self::Sint64,
            "fixed32" => Self::Fixed32,
            "fixed64" => Self::Fixed64,
            "sfixed32" => Self::Sfixed32,
            "sfixed64" => Self::Sfixed64,
            "bool" => Self::Bool,
            "string" => Self::String,
            "bytes" => Self::Bytes,
            _ => return None,
        };
        Some(scalar)
    }

    pub fn wire_type(self) -> WireType {
        match self {
            Self::Double | Self::Fixed64 | Self::Sfixed64 => WireType::SixtyFourBit,
            Self::Float | Self::Fixed32 | Self::Sfixed32 => WireType::ThirtyTwoBit,
            Self::String | Self::Bytes => WireType::LengthDelimited,
            _ => WireType::Varint,
        }
    }
}

/// Closed set of field kinds the interpreter understands.
///
/// A repeated `Enum` field is how descriptors express a flag set (several
/// traits selected at once); a `Message` field is a nested reference such as
/// an image descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarType),
    Enum(String),
    Message(String),
}

impl FieldKind {
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Scalar(scalar) => scalar.wire_type(),
            Self::Enum(_) => WireType::Varint,
            Self::Message(_) => WireType::LengthDelimited,
        }
    }

    /// Whether repeated values of this kind may be packed into one record.
    pub fn is_packable(&self) -> bool {
        self.wire_type() != WireType::LengthDelimited
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub number: u32,
    pub kind: FieldKind,
    pub repeated: bool,
    /// Packed encoding for repeated packable fields. protobuf.js packs unless
    /// `options.packed` is explicitly false.
    pub packed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDef {
    pub name: String,
    /// Sorted by field number.
    pub fields: Vec<FieldDef>,
}

impl MessageDef {
    pub fn field_by_number(&self, number: u32) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.number == number)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    pub name: String,
    pub values: BTreeMap<String, i32>,
}

impl EnumDef {
    pub fn value_of(&self, name: &str) -> Option<i32> {
        self.values.get(name).copied()
    }
}

/// A parsed descriptor with every type reference resolved.
#[derive(Debug, Clone)]
pub struct Schema {
    root: String,
    messages: HashMap<String, MessageDef>,
    enums: HashMap<String, EnumDef>,
}

impl Schema {
    /// Parse a descriptor rooted at [`DEFAULT_ROOT`].
    pub fn parse(descriptor: &str) -> Result<Self> {
        Self::parse_with_root(descriptor, DEFAULT_ROOT)
    }

    pub fn parse_with_root(descriptor: &str, root: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(descriptor)?;
        if !document.is_object() {
            return Err(SchemaError::InvalidDescriptor(
                "descriptor must be a JSON object".to_string(),
            ));
        }

        let mut raw_messages = Vec::new();
        let mut enums = HashMap::new();
        collect_types("", &document, &mut raw_messages, &mut enums)?;

        let message_names: HashSet<String> =
            raw_messages.iter().map(|(name, _)| name.clone()).collect();

        let mut messages = HashMap::with_capacity(raw_messages.len());
        for (full_name, fields) in raw_messages {
            let def = resolve_message(&full_name, fields, &message_names, &enums)?;
            messages.insert(full_name, def);
        }

        let root = root.trim_start_matches('.').to_string();
        if !messages.contains_key(&root) {
            return Err(SchemaError::RootNotFound(root));
        }

        Ok(Self {
            root,
            messages,
            enums,
        })
    }

    pub fn root_message(&self) -> &MessageDef {
        // Presence of the root is checked in `parse_with_root`.
        &self.messages[&self.root]
    }

    pub fn message(&self, name: &str) -> Option<&MessageDef> {
        self.messages.get(name)
    }

    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enums.get(name)
    }
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

fn parent_scope(scope: &str) -> Option<&str> {
    if scope.is_empty() {
        return None;
    }
    Some(scope.rfind('.').map_or("", |idx| &scope[..idx]))
}

fn collect_types<'a>(
    scope: &str,
    node: &'a Value,
    messages: &mut Vec<(String, &'a Map<String, Value>)>,
    enums: &mut HashMap<String, EnumDef>,
) -> Result<()> {
    let Some(nested) = node.get("nested") else {
        return Ok(());
    };
    let nested = nested.as_object().ok_or_else(|| {
        SchemaError::InvalidDescriptor(format!("`nested` of '{scope}' is not an object"))
    })?;

    for (name, child) in nested {
        let full_name = qualify(scope, name);
        if let Some(fields) = child.get("fields") {
            let fields = fields.as_object().ok_or_else(|| {
                SchemaError::InvalidDescriptor(format!("`fields` of {full_name} is not an object"))
            })?;
            messages.push((full_name.clone(), fields));
        } else if let Some(values) = child.get("values") {
            enums.insert(full_name.clone(), parse_enum(&full_name, values)?);
        }
        collect_types(&full_name, child, messages, enums)?;
    }
    Ok(())
}

fn parse_enum(full_name: &str, values: &Value) -> Result<EnumDef> {
    let values = values.as_object().ok_or_else(|| {
        SchemaError::InvalidDescriptor(format!("`values` of {full_name} is not an object"))
    })?;

    let mut parsed = BTreeMap::new();
    for (name, number) in values {
        let number = number
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| {
                SchemaError::InvalidDescriptor(format!(
                    "enum value {full_name}.{name} is not a 32-bit integer"
                ))
            })?;
        parsed.insert(name.clone(), number);
    }

    Ok(EnumDef {
        name: full_name.to_string(),
        values: parsed,
    })
}

fn resolve_message(
    full_name: &str,
    fields: &Map<String, Value>,
    message_names: &HashSet<String>,
    enums: &HashMap<String, EnumDef>,
) -> Result<MessageDef> {
    let mut resolved = Vec::with_capacity(fields.len());

    for (name, field) in fields {
        let qualified = format!("{full_name}.{name}");

        let number = field
            .get("id")
            .and_then(Value::as_u64)
            .filter(|n| (1..=MAX_FIELD_NUMBER).contains(n))
            .ok_or_else(|| {
                SchemaError::InvalidDescriptor(format!("field {qualified} has no valid `id`"))
            })?;

        let type_name = field.get("type").and_then(Value::as_str).ok_or_else(|| {
            SchemaError::InvalidDescriptor(format!("field {qualified} has no `type`"))
        })?;

        if field.get("keyType").is_some() {
            return Err(SchemaError::UnsupportedType {
                field: qualified,
                type_name: format!("map<_, {type_name}>"),
            });
        }

        let kind = match ScalarType::from_name(type_name) {
            Some(scalar) => FieldKind::Scalar(scalar),
            None => resolve_reference(full_name, type_name, message_names, enums).ok_or_else(
                || SchemaError::UnresolvedType {
                    field: qualified.clone(),
                    type_name: type_name.to_string(),
                },
            )?,
        };

        let repeated = field.get("rule").and_then(Value::as_str) == Some("repeated");
        let packed = field
            .pointer("/options/packed")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        resolved.push(FieldDef {
            name: name.clone(),
            number: number as u32,
            kind,
            repeated,
            packed,
        });
    }

    resolved.sort_by_key(|field| field.number);
    if let Some(pair) = resolved.windows(2).find(|pair| pair[0].number == pair[1].number) {
        return Err(SchemaError::InvalidDescriptor(format!(
            "fields {} and {} of {full_name} share number {}",
            pair[0].name, pair[1].name, pair[0].number
        )));
    }

    Ok(MessageDef {
        name: full_name.to_string(),
        fields: resolved,
    })
}

fn resolve_reference(
    scope: &str,
    reference: &str,
    message_names: &HashSet<String>,
    enums: &HashMap<String, EnumDef>,
) -> Option<FieldKind> {
    let lookup = |candidate: String| {
        if message_names.contains(&candidate) {
            Some(FieldKind::Message(candidate))
        } else if enums.contains_key(&candidate) {
            Some(FieldKind::Enum(candidate))
        } else {
            None
        }
    };

    if let Some(absolute) = reference.strip_prefix('.') {
        return lookup(absolute.to_string());
    }

    let mut current = Some(scope);
    while let Some(scope) = current {
        if let Some(kind) = lookup(qualify(scope, reference)) {
            return Some(kind);
        }
        current = parent_scope(scope);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = r#"{
        "nested": {
            "onChainMetaData": {
                "nested": {
                    "NFTMeta": {
                        "fields": {
                            "name": { "id": 1, "rule": "required", "type": "string" },
                            "colors": { "id": 3, "rule": "repeated", "type": "Color" },
                            "image": { "id": 2, "type": "Image" }
                        },
                        "nested": {
                            "Image": { "fields": { "url": { "id": 1, "type": "string" } } }
                        }
                    },
                    "Color": { "values": { "Red": 0, "Green": 1 } }
                }
            }
        }
    }"#;

    #[test]
    fn test_parse_resolves_nested_and_sibling_types() {
        let schema = Schema::parse(DESCRIPTOR).unwrap();
        let root = schema.root_message();

        assert_eq!(root.name, "onChainMetaData.NFTMeta");
        let numbers: Vec<u32> = root.fields.iter().map(|f| f.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        let image = root.field_by_name("image").unwrap();
        assert_eq!(
            image.kind,
            FieldKind::Message("onChainMetaData.NFTMeta.Image".to_string())
        );

        let colors = root.field_by_name("colors").unwrap();
        assert_eq!(colors.kind, FieldKind::Enum("onChainMetaData.Color".to_string()));
        assert!(colors.repeated);
        assert!(colors.packed);

        let color = schema.enum_def("onChainMetaData.Color").unwrap();
        assert_eq!(color.value_of("Green"), Some(1));
    }

    #[test]
    fn test_parse_missing_root() {
        let err = Schema::parse_with_root(DESCRIPTOR, "other.Root").unwrap_err();
        assert!(matches!(err, SchemaError::RootNotFound(name) if name == "other.Root"));
    }

    #[test]
    fn test_parse_unresolved_type() {
        let descriptor = r#"{"nested":{"onChainMetaData":{"nested":{"NFTMeta":{
            "fields":{"kind":{"id":1,"type":"Missing"}}}}}}}"#;
        let err = Schema::parse(descriptor).unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedType { type_name, .. } if type_name == "Missing"));
    }

    #[test]
    fn test_parse_rejects_duplicate_numbers() {
        let descriptor = r#"{"nested":{"onChainMetaData":{"nested":{"NFTMeta":{
            "fields":{"a":{"id":1,"type":"string"},"b":{"id":1,"type":"bool"}}}}}}}"#;
        assert!(matches!(
            Schema::parse(descriptor),
            Err(SchemaError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(matches!(
            Schema::parse("not json"),
            Err(SchemaError::DescriptorJson(_))
        ));
    }

    #[test]
    fn test_explicit_unpacked_option() {
        let descriptor = r#"{"nested":{"onChainMetaData":{"nested":{"NFTMeta":{
            "fields":{"ids":{"id":1,"rule":"repeated","type":"uint32","options":{"packed":false}}}}}}}}"#;
        let schema = Schema::parse(descriptor).unwrap();
        assert!(!schema.root_message().fields[0].packed);
    }
}
