//! Schema codec for NFT constant-data payloads.
//!
//! Collections declare the layout of their immutable token payload as a
//! protobuf JSON descriptor. This crate interprets such a descriptor at
//! runtime: [`Schema::parse`] resolves the type graph once, [`decode`] turns
//! wire bytes into a keyed JSON object and [`encode`] is its exact inverse.
//!
//! The decoded value is deliberately a generic `serde_json::Map` rather than a
//! generated struct: the schema is data owned by the collection, not a type
//! known at compile time.

mod decode;
mod descriptor;
mod encode;
mod error;

pub use decode::decode;
pub use descriptor::{
    EnumDef, FieldDef, FieldKind, MessageDef, ScalarType, Schema, DEFAULT_ROOT,
};
pub use encode::encode;
pub use error::{Result, SchemaError};

use serde_json::{Map, Value};

/// Parse `descriptor` and decode `bytes` against its default root message.
pub fn decode_with_descriptor(descriptor: &str, bytes: &[u8]) -> Result<Map<String, Value>> {
    let schema = Schema::parse(descriptor)?;
    decode(&schema, bytes)
}

/// Parse `descriptor` and encode `value` against its default root message.
pub fn encode_with_descriptor(descriptor: &str, value: &Value) -> Result<Vec<u8>> {
    let schema = Schema::parse(descriptor)?;
    encode(&schema, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NFT_META: &str = r#"{
        "nested": {
            "onChainMetaData": {
                "nested": {
                    "NFTMeta": {
                        "fields": {
                            "ipfsJson": { "id": 1, "rule": "required", "type": "string" },
                            "gender": { "id": 2, "rule": "required", "type": "Gender" },
                            "traits": { "id": 3, "rule": "repeated", "type": "PrioritizeTraits" }
                        }
                    },
                    "Gender": {
                        "options": { "Female": "{\"en\": \"Female\"}", "Male": "{\"en\": \"Male\"}" },
                        "values": { "Female": 0, "Male": 1 }
                    },
                    "PrioritizeTraits": {
                        "values": { "BLUE_EYES": 0, "SMILE": 1, "SUNGLASSES": 2, "RED_LIPS": 3 }
                    }
                }
            }
        }
    }"#;

    const IPFS_JSON: &str =
        r#"{"ipfs":"QmS8YXgfGKgTUnjAPtEf3uf5k4YrFLP2uDcYuNyGLnEiNb","type":"image"}"#;

    fn meta(traits: &[i32], gender: i32) -> Value {
        json!({ "ipfsJson": IPFS_JSON, "gender": gender, "traits": traits })
    }

    #[test]
    fn test_encode_matches_reference_bytes() {
        let schema = Schema::parse(NFT_META).unwrap();
        let bytes = encode(&schema, &meta(&[0, 1], 1)).unwrap();

        let mut expected = vec![0x0a, 0x48];
        expected.extend_from_slice(IPFS_JSON.as_bytes());
        expected.extend_from_slice(&[0x10, 0x01, 0x1a, 0x02, 0x00, 0x01]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_round_trip_representative_values() {
        let schema = Schema::parse(NFT_META).unwrap();
        let cases: [(&[i32], i32); 6] = [
            (&[0, 1], 1),
            (&[1, 2], 0),
            (&[2, 3], 1),
            (&[0, 3], 0),
            (&[3], 0),
            (&[], 1),
        ];
        for (traits, gender) in cases {
            let value = meta(traits, gender);
            let bytes = encode(&schema, &value).unwrap();
            let decoded = decode(&schema, &bytes).unwrap();
            assert_eq!(Value::Object(decoded), value);
        }

        let no_traits = json!({ "ipfsJson": "x", "traits": [] });
        let bytes = encode(&schema, &no_traits).unwrap();
        assert_eq!(Value::Object(decode(&schema, &bytes).unwrap()), no_traits);
    }

    #[test]
    fn test_absent_repeated_field_decodes_as_empty_array() {
        let schema = Schema::parse(NFT_META).unwrap();
        let bytes = encode(&schema, &json!({ "ipfsJson": "x" })).unwrap();
        assert_eq!(
            Value::Object(decode(&schema, &bytes).unwrap()),
            json!({ "ipfsJson": "x", "traits": [] })
        );
        // an empty packed record
        assert_eq!(
            Value::Object(decode(&schema, &[0x1a, 0x00]).unwrap()),
            json!({ "traits": [] })
        );
    }

    #[test]
    fn test_encode_rejects_null() {
        let schema = Schema::parse(NFT_META).unwrap();
        let err = encode(&schema, &json!({ "ipfsJson": null })).unwrap_err();
        assert!(matches!(err, SchemaError::Encode { field, .. } if field == "ipfsJson"));
    }

    #[test]
    fn test_decode_is_deterministic() {
        let bytes = encode_with_descriptor(NFT_META, &meta(&[2], 0)).unwrap();
        let first = decode_with_descriptor(NFT_META, &bytes).unwrap();
        let second = decode_with_descriptor(NFT_META, &bytes).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_enum_names_encode_to_numbers() {
        let schema = Schema::parse(NFT_META).unwrap();
        let by_name = json!({ "ipfsJson": "", "gender": "Male", "traits": ["SMILE", "RED_LIPS"] });
        let bytes = encode(&schema, &by_name).unwrap();
        let decoded = decode(&schema, &bytes).unwrap();
        assert_eq!(
            Value::Object(decoded),
            json!({ "ipfsJson": "", "gender": 1, "traits": [1, 3] })
        );
    }

    #[test]
    fn test_decode_accepts_unpacked_repeated() {
        let schema = Schema::parse(NFT_META).unwrap();
        // traits as two separate varint records
        let bytes = [0x18, 0x02, 0x18, 0x03];
        let decoded = decode(&schema, &bytes).unwrap();
        assert_eq!(Value::Object(decoded), json!({ "traits": [2, 3] }));
    }

    #[test]
    fn test_decode_skips_unknown_fields() {
        let schema = Schema::parse(NFT_META).unwrap();
        // field 9 (varint) and field 10 (length-delimited) are not declared
        let bytes = [0x48, 0x05, 0x52, 0x01, 0xff, 0x10, 0x01];
        let decoded = decode(&schema, &bytes).unwrap();
        assert_eq!(Value::Object(decoded), json!({ "gender": 1, "traits": [] }));
    }

    #[test]
    fn test_decode_empty_payload() {
        let schema = Schema::parse(NFT_META).unwrap();
        assert_eq!(
            Value::Object(decode(&schema, &[]).unwrap()),
            json!({ "traits": [] })
        );
    }

    #[test]
    fn test_decode_truncated_payload() {
        let schema = Schema::parse(NFT_META).unwrap();
        let err = decode(&schema, &[0x0a, 0x10, b'a']).unwrap_err();
        assert!(matches!(err, SchemaError::Truncated));
    }

    #[test]
    fn test_decode_wire_type_mismatch() {
        let schema = Schema::parse(NFT_META).unwrap();
        // ipfsJson sent as a varint
        let err = decode(&schema, &[0x08, 0x01]).unwrap_err();
        assert!(matches!(err, SchemaError::WireTypeMismatch { field, .. } if field == "ipfsJson"));
    }

    #[test]
    fn test_encode_rejects_unknown_field() {
        let schema = Schema::parse(NFT_META).unwrap();
        let err = encode(&schema, &json!({ "color": "red" })).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownField { field, .. } if field == "color"));
    }

    #[test]
    fn test_nested_message_and_scalars_round_trip() {
        let descriptor = r#"{
            "nested": {
                "onChainMetaData": {
                    "nested": {
                        "NFTMeta": {
                            "fields": {
                                "image": { "id": 1, "type": "Image" },
                                "level": { "id": 2, "type": "sint32" },
                                "supply": { "id": 3, "type": "uint64" },
                                "rare": { "id": 4, "type": "bool" },
                                "hash": { "id": 5, "type": "bytes" },
                                "weight": { "id": 6, "type": "double" },
                                "serial": { "id": 7, "type": "fixed32" },
                                "scores": { "id": 8, "rule": "repeated", "type": "int32", "options": { "packed": false } }
                            },
                            "nested": {
                                "Image": {
                                    "fields": {
                                        "url": { "id": 1, "type": "string" },
                                        "width": { "id": 2, "type": "uint32" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }"#;
        let value = json!({
            "image": { "url": "ipfs://Qm", "width": 512 },
            "level": -3,
            "supply": 18_446_744_073_709_551_615u64,
            "rare": true,
            "hash": "0xdeadbeef",
            "weight": 1.5,
            "serial": 7,
            "scores": [-1, 0, 42]
        });

        let bytes = encode_with_descriptor(descriptor, &value).unwrap();
        let decoded = decode_with_descriptor(descriptor, &bytes).unwrap();
        assert_eq!(Value::Object(decoded), value);
    }
}
