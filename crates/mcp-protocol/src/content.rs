//! Content items returned by resource reads and tool calls.

use serde::{Deserialize, Serialize};

/// A single piece of content: plain text, a JSON document carried as text,
/// or raw binary.
///
/// Binary content carries an explicit length (`Vec<u8>`'s own length);
/// `read_resource` responses omit the `text` field for binary items rather
/// than base64-encoding the payload — see DESIGN.md for the reasoning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    /// Plain text.
    Text {
        /// The text payload.
        text: String,
        /// MIME type, e.g. `"text/plain"`.
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    /// A JSON document, carried pre-serialized as text so the server never
    /// has to parse content it merely relays.
    Json {
        /// The JSON document, already serialized.
        text: String,
        /// MIME type, defaults to `"application/json"` if absent.
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    /// Raw binary content. Never appears with a `text` field on the wire.
    Binary {
        /// Binary payload, not included on the wire in this implementation.
        #[serde(skip)]
        data: Vec<u8>,
        /// MIME type of the binary payload.
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

impl ContentItem {
    /// Construct a text content item.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            mime_type: None,
        }
    }

    /// Construct a text content item with an explicit MIME type.
    #[must_use]
    pub fn text_with_mime(text: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            mime_type: Some(mime_type.into()),
        }
    }

    /// Construct a JSON content item from an already-serialized document.
    #[must_use]
    pub fn json(text: impl Into<String>) -> Self {
        Self::Json {
            text: text.into(),
            mime_type: Some("application/json".to_string()),
        }
    }

    /// Construct a binary content item.
    #[must_use]
    pub fn binary(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self::Binary {
            data,
            mime_type: Some(mime_type.into()),
        }
    }

    /// The item's declared MIME type, if any.
    #[must_use]
    pub fn mime_type(&self) -> Option<&str> {
        match self {
            Self::Text { mime_type, .. } | Self::Json { mime_type, .. } | Self::Binary { mime_type, .. } => {
                mime_type.as_deref()
            }
        }
    }

    /// Size of the item's payload in bytes, as the cache's accounting wants
    /// it.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        match self {
            Self::Text { text, .. } | Self::Json { text, .. } => text.len(),
            Self::Binary { data, .. } => data.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_item_round_trips() {
        let item = ContentItem::text("hi");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "hi");
        assert!(json.get("mimeType").is_none());
    }

    #[test]
    fn binary_item_omits_payload_on_the_wire() {
        let item = ContentItem::binary(vec![1, 2, 3], "application/octet-stream");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "binary");
        assert!(json.get("data").is_none());
        assert_eq!(json["mimeType"], "application/octet-stream");
    }

    #[test]
    fn byte_len_matches_payload() {
        assert_eq!(ContentItem::text("hello").byte_len(), 5);
        assert_eq!(ContentItem::binary(vec![0; 7], "x").byte_len(), 7);
    }
}
