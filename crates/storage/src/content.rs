//! Document content serializers
//!
//! The `Content` column of the document table holds either JSON text or a
//! MessagePack blob. Decoding looks at the stored value, not at the
//! configured serializer, so a store switched from one format to the other
//! still reads documents written before the switch.
//!
//! # Known serializers
//!
//! - `"json"`: TEXT column, human-inspectable
//! - `"msgpack"`: BLOB column, named-field MessagePack

use quire_core::{ColumnValue, QuireError, QuireResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Encoding of document content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSerializer {
    /// JSON text
    #[default]
    Json,
    /// MessagePack with named fields
    #[serde(rename = "msgpack")]
    MessagePack,
}

impl ContentSerializer {
    /// Look up a serializer by its configuration name
    pub fn from_name(name: &str) -> QuireResult<Self> {
        match name {
            "json" => Ok(ContentSerializer::Json),
            "msgpack" => Ok(ContentSerializer::MessagePack),
            other => Err(QuireError::configuration(format!(
                "unknown content serializer: {}",
                other
            ))),
        }
    }

    /// Configuration name
    pub fn name(&self) -> &'static str {
        match self {
            ContentSerializer::Json => "json",
            ContentSerializer::MessagePack => "msgpack",
        }
    }

    /// Encode a document payload into the value stored in `Content`
    pub fn encode(&self, content: &JsonValue) -> QuireResult<ColumnValue> {
        match self {
            ContentSerializer::Json => Ok(ColumnValue::Text(serde_json::to_string(content)?)),
            ContentSerializer::MessagePack => rmp_serde::to_vec_named(content)
                .map(ColumnValue::Blob)
                .map_err(|e| QuireError::serialization(e.to_string())),
        }
    }

    /// Decode a stored `Content` value
    pub fn decode(stored: ColumnValue) -> QuireResult<JsonValue> {
        match stored {
            ColumnValue::Text(text) => Ok(serde_json::from_str(&text)?),
            ColumnValue::Blob(bytes) => rmp_serde::from_slice(&bytes)
                .map_err(|e| QuireError::serialization(e.to_string())),
            ColumnValue::Null => Err(QuireError::serialization("document content is NULL")),
            other => Err(QuireError::serialization(format!(
                "unexpected document content: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ContentSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
