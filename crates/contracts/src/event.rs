//! Event messages - string payload carried in the `event` field

use chrono::{DateTime, Utc};

use crate::{ContractError, Message};

impl Message {
    /// Build an event message with `event` as its only field.
    pub fn new_event<TK, TV, MK, MV>(
        name: impl Into<String>,
        tags: impl IntoIterator<Item = (TK, TV)>,
        meta: impl IntoIterator<Item = (MK, MV)>,
        event: impl Into<String>,
        time: DateTime<Utc>,
    ) -> Result<Self, ContractError>
    where
        TK: Into<String>,
        TV: Into<String>,
        MK: Into<String>,
        MV: Into<String>,
    {
        let event: String = event.into();
        Self::new(name, tags, meta, [("event", event)], time)
    }

    /// True if the message carries a string `event` field
    pub fn is_event(&self) -> bool {
        self.event_value().is_some()
    }

    pub fn event_value(&self) -> Option<&str> {
        self.get_field("event").and_then(|v| v.as_str())
    }
}
