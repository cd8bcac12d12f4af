//! Resolution of a collection's declared schema.

use std::sync::Arc;

use nft_export_schema::{Schema, SchemaError, DEFAULT_ROOT};
use serde_json::Value;

use crate::error::{ExportError, Result};

/// Structured on-chain schema described by a protobuf JSON descriptor.
pub const SCHEMA_VERSION_UNIQUE: &str = "Unique";
/// Off-chain image URL; the constant data carries no structured schema.
pub const SCHEMA_VERSION_IMAGE_URL: &str = "ImageURL";

/// Decides how a collection's constant data is decoded.
#[derive(Debug, Clone)]
pub struct SchemaDecoder {
    root_message: String,
}

impl Default for SchemaDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaDecoder {
    pub fn new() -> Self {
        Self {
            root_message: DEFAULT_ROOT.to_string(),
        }
    }

    /// Decode against a root message other than `onChainMetaData.NFTMeta`.
    pub fn with_root_message(root_message: impl Into<String>) -> Self {
        Self {
            root_message: root_message.into(),
        }
    }

    /// Resolve a collection's schema once, ahead of decoding its tokens.
    ///
    /// An empty descriptor and the `ImageURL` version both mean "no schema".
    /// An unknown version with a descriptor is an error. A descriptor that
    /// cannot be parsed is treated as absent.
    pub fn resolve(&self, version: &str, descriptor: &str) -> Result<ResolvedSchema> {
        if descriptor.trim().is_empty() {
            return Ok(ResolvedSchema::None);
        }

        match version {
            SCHEMA_VERSION_IMAGE_URL => Ok(ResolvedSchema::None),
            SCHEMA_VERSION_UNIQUE => {
                match Schema::parse_with_root(descriptor, &self.root_message) {
                    Ok(schema) => Ok(ResolvedSchema::Structured(Arc::new(schema))),
                    Err(error) => {
                        tracing::warn!(
                            target: "nft_export::schema",
                            error = %error,
                            "Unparseable schema descriptor, constant data left undecoded"
                        );
                        Ok(ResolvedSchema::None)
                    }
                }
            }
            other => Err(ExportError::UnsupportedSchema {
                version: other.to_string(),
            }),
        }
    }

    /// One-shot decode of `bytes` under `(version, descriptor)`.
    ///
    /// The enumerator resolves once and decodes through [`ResolvedSchema`]
    /// instead, reporting failures as [`ExportError::PayloadDecode`].
    pub fn decode(&self, version: &str, descriptor: &str, bytes: &[u8]) -> Result<Option<Value>> {
        self.resolve(version, descriptor)?
            .decode(bytes)
            .map_err(ExportError::ConstDataDecode)
    }
}

/// Outcome of [`SchemaDecoder::resolve`].
#[derive(Debug, Clone)]
pub enum ResolvedSchema {
    None,
    Structured(Arc<Schema>),
}

impl ResolvedSchema {
    pub fn decode(&self, bytes: &[u8]) -> Result<Option<Value>, SchemaError> {
        match self {
            Self::None => Ok(None),
            Self::Structured(schema) => {
                nft_export_schema::decode(schema, bytes).map(|object| Some(Value::Object(object)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DESCRIPTOR: &str = r#"{"nested":{"onChainMetaData":{"nested":{"NFTMeta":{
        "fields":{"level":{"id":1,"type":"uint32"}}}}}}}"#;

    #[test]
    fn test_no_descriptor_decodes_to_null() {
        let decoder = SchemaDecoder::new();
        assert_eq!(decoder.decode("ImageURL", "", &[0x08, 0x01]).unwrap(), None);
        assert_eq!(decoder.decode("Unique", "  ", &[]).unwrap(), None);
        // empty descriptor wins over an unknown version
        assert_eq!(decoder.decode("Custom", "", &[]).unwrap(), None);
    }

    #[test]
    fn test_image_url_version_ignores_descriptor() {
        let decoder = SchemaDecoder::new();
        assert_eq!(decoder.decode("ImageURL", DESCRIPTOR, &[0x08, 0x01]).unwrap(), None);
    }

    #[test]
    fn test_unique_version_decodes() {
        let decoder = SchemaDecoder::new();
        let decoded = decoder.decode("Unique", DESCRIPTOR, &[0x08, 0x07]).unwrap();
        assert_eq!(decoded, Some(json!({ "level": 7 })));
    }

    #[test]
    fn test_unknown_version_is_unsupported() {
        let err = SchemaDecoder::new().resolve("Custom", DESCRIPTOR).unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedSchema { version } if version == "Custom"));
    }

    #[test]
    fn test_undecodable_bytes() {
        // field 1 sent as a length-delimited record
        let err = SchemaDecoder::new()
            .decode("Unique", DESCRIPTOR, &[0x0a, 0x01, 0x00])
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::ConstDataDecode(SchemaError::WireTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_unparseable_descriptor_is_absent() {
        let resolved = SchemaDecoder::new().resolve("Unique", "{ not json").unwrap();
        assert!(matches!(resolved, ResolvedSchema::None));
    }

    #[test]
    fn test_custom_root_message() {
        let descriptor = r#"{"nested":{"Token":{"fields":{"flag":{"id":1,"type":"bool"}}}}}"#;
        let decoder = SchemaDecoder::with_root_message("Token");
        assert_eq!(
            decoder.decode("Unique", descriptor, &[0x08, 0x01]).unwrap(),
            Some(json!({ "flag": true }))
        );
    }
}
