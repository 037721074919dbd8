//! JSON form of a message
//!
//! `{"name", "tags", "fields", "timestamp"}`; meta is never serialized on its
//! own, only promoted into `tags` on request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

use crate::{ContractError, Fields, Message, Tags};

#[derive(Serialize)]
struct MessageJsonRef<'a> {
    name: &'a str,
    tags: BTreeMap<&'a str, &'a str>,
    fields: &'a Fields,
    timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
struct MessageJson {
    name: String,
    #[serde(default)]
    tags: Tags,
    #[serde(default)]
    fields: BTreeMap<String, serde_json::Value>,
    timestamp: DateTime<Utc>,
}

impl MessageJson {
    fn into_message(self) -> Result<Message, ContractError> {
        Message::new(self.name, self.tags, Tags::new(), self.fields, self.timestamp)
    }
}

impl Message {
    fn json_view<'a>(&'a self, meta_as_tags: &BTreeSet<String>) -> MessageJsonRef<'a> {
        MessageJsonRef {
            name: self.name(),
            tags: self.promoted_tags(meta_as_tags),
            fields: self.fields(),
            timestamp: self.time(),
        }
    }

    /// Serialize to JSON, promoting the selected meta keys into `tags`.
    pub fn to_json(&self, meta_as_tags: &BTreeSet<String>) -> Result<Vec<u8>, ContractError> {
        Ok(serde_json::to_vec(&self.json_view(meta_as_tags))?)
    }

    /// Parse the JSON form, re-running field normalization.
    ///
    /// The result has no meta. JSON `null` field values are dropped.
    pub fn from_json(data: &[u8]) -> Result<Self, ContractError> {
        let raw: MessageJson = serde_json::from_slice(data)?;
        raw.into_message()
    }
}

impl Serialize for Message {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.json_view(&BTreeSet::new()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        MessageJson::deserialize(deserializer)?
            .into_message()
            .map_err(serde::de::Error::custom)
    }
}
