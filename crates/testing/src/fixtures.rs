//! Schema fixtures.

use serde_json::{json, Value};

/// Descriptor of the example NFT metadata: an IPFS JSON string, a gender and a
/// set of traits.
pub const EXAMPLE_SCHEMA_JSON: &str = r#"{
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
          "options": {
            "BLUE_EYES": "{\"en\": \"Blue Eyes\"}",
            "SMILE": "{\"en\": \"Smile\"}",
            "SUNGLASSES": "{\"en\": \"Sunglasses\"}",
            "RED_LIPS": "{\"en\": \"Red Lips\"}"
          },
          "values": { "BLUE_EYES": 0, "SMILE": 1, "SUNGLASSES": 2, "RED_LIPS": 3 }
        }
      }
    }
  }
}"#;

pub const EXAMPLE_IPFS_JSON: &str =
    r#"{"ipfs":"QmS8YXgfGKgTUnjAPtEf3uf5k4YrFLP2uDcYuNyGLnEiNb","type":"image"}"#;

pub fn example_data(traits: &[i32], gender: i32) -> Value {
    json!({ "ipfsJson": EXAMPLE_IPFS_JSON, "gender": gender, "traits": traits })
}

/// Wire bytes of [`example_data`] under [`EXAMPLE_SCHEMA_JSON`].
pub fn example_const_data(traits: &[i32], gender: i32) -> anyhow::Result<Vec<u8>> {
    Ok(nft_export_schema::encode_with_descriptor(
        EXAMPLE_SCHEMA_JSON,
        &example_data(traits, gender),
    )?)
}
