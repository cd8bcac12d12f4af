use prost::encoding::WireType;

pub type Result<T> = std::result::Result<T, SchemaError>;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Descriptor is not valid JSON: {0}")]
    DescriptorJson(#[from] serde_json::Error),
    #[error("Invalid schema descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("Root message {0} not found in descriptor")]
    RootNotFound(String),
    #[error("Type {type_name} referenced by field {field} is not defined")]
    UnresolvedType { field: String, type_name: String },
    #[error("Field {field} uses unsupported type {type_name}")]
    UnsupportedType { field: String, type_name: String },
    #[error("Wire decode failed: {0}")]
    Wire(#[from] prost::DecodeError),
    #[error("Field {field} expected wire type {expected:?}, found {found:?}")]
    WireTypeMismatch {
        field: String,
        expected: WireType,
        found: WireType,
    },
    #[error("Payload truncated")]
    Truncated,
    #[error("Field {0} is not valid UTF-8")]
    InvalidUtf8(String),
    #[error("Groups are not supported (field number {0})")]
    GroupsUnsupported(u32),
    #[error("Cannot encode field {field}: {reason}")]
    Encode { field: String, reason: String },
    #[error("Field {field} is not declared by message {message}")]
    UnknownField { message: String, field: String },
}
