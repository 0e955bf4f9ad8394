//! Domain update variants and their payload types.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error returned when a payload does not match any known update variant.
///
/// The sync engine treats this as the unknown-event case: the sequence slot
/// is still consumed, the consumer receives no payload.
#[derive(Debug, Error)]
#[error("unrecognized update payload: {0}")]
pub struct UpdateParseError(#[from] serde_json::Error);

/// A domain event in the account's update log.
///
/// Variants map one-to-one onto the server's `type`-tagged JSON objects.
/// The set is closed on the consumer side (exhaustive dispatch is fine
/// there); the engine never matches on variants and parses through
/// [`Update::from_value`] only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Update {
    /// A new memory was created.
    MemoryCreated {
        /// Server-issued memory id.
        id: String,
        /// Position in the account's memory list.
        index: u64,
        /// The memory payload.
        memory: MemoryContent,
    },
    /// An existing memory was rewritten in place.
    MemoryUpdated {
        /// Server-issued memory id.
        id: String,
        /// Position in the account's memory list.
        index: u64,
        /// The replacement payload.
        memory: MemoryContent,
    },
    /// An item was appended to a feed.
    #[serde(rename_all = "camelCase")]
    FeedPosted {
        /// Feed the item belongs to.
        source: String,
        /// Author id.
        by: String,
        /// Server timestamp, milliseconds since epoch.
        date: u64,
        /// De-duplication key for client-originated posts, if any.
        repeat_key: Option<String>,
        /// Position of the item within its feed.
        seq: u64,
        /// The posted content.
        content: Content,
    },
}

impl Update {
    /// Parses a raw JSON payload into a known update variant.
    ///
    /// Unknown `type` tags and shape mismatches both fail; callers decide
    /// whether that is an error or the tolerated unknown-event case.
    pub fn from_value(value: Value) -> Result<Self, UpdateParseError> {
        Ok(serde_json::from_value(value)?)
    }
}

/// The payload of a memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryContent {
    /// Short title.
    pub title: String,
    /// One-paragraph summary.
    pub summary: String,
    /// Cover image, if the memory has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
}

/// A reference to a server-hosted image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Download URL.
    pub url: String,
    /// Thumbhash placeholder string.
    pub thumbhash: String,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
}

/// A content payload: a single item or an ordered group of items.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Content {
    /// A single content item.
    One(ContentItem),
    /// An ordered group of content items.
    Many(Vec<ContentItem>),
}

/// A single piece of renderable content, tagged by `kind`.
///
/// Decoding never fails: anything that is not a well-formed known item
/// degrades to [`ContentItem::Unknown`], so a feed post with one exotic
/// item still delivers the rest.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentItem {
    /// Plain text.
    Text {
        /// The text body.
        text: String,
    },
    /// A reference to a memory by id.
    Memory {
        /// The referenced memory id.
        id: String,
    },
    /// An item this build does not recognize.
    Unknown,
}

impl ContentItem {
    fn from_value(value: &Value) -> Self {
        match value.get("kind").and_then(Value::as_str) {
            Some("text") => match value.get("text").and_then(Value::as_str) {
                Some(text) => ContentItem::Text {
                    text: text.to_string(),
                },
                None => ContentItem::Unknown,
            },
            Some("memory") => match value.get("id").and_then(Value::as_str) {
                Some(id) => ContentItem::Memory { id: id.to_string() },
                None => ContentItem::Unknown,
            },
            _ => ContentItem::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for ContentItem {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(ContentItem::from_value(&value))
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Array(items) => {
                Content::Many(items.iter().map(ContentItem::from_value).collect())
            }
            other => Content::One(ContentItem::from_value(&other)),
        })
    }
}
