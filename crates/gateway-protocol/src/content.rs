use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A single block of adapter output; an ordered sequence of
/// these forms the uniform `content` shape every adapter returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        #[serde(rename = "mimeType")]
        mime_type: Option<String>,
    },
    Image {
        /// Base64-encoded image payload.
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Binary {
        /// Base64-encoded opaque payload.
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Structured {
        data: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        #[serde(rename = "mimeType")]
        mime_type: Option<String>,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text {
            text: text.into(),
            mime_type: None,
        }
    }

    pub fn structured(data: Value) -> Self {
        ContentBlock::Structured { data, mime_type: None }
    }
}

/// Output of a tool execution or resource read: an ordered list of content
/// blocks plus optional free-form metadata.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AdapterContent {
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl AdapterContent {
    pub fn single_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            metadata: HashMap::new(),
        }
    }
}
