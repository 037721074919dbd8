//! Log messages - string payload carried in the `log` field

use chrono::{DateTime, Utc};

use crate::{ContractError, Message};

impl Message {
    /// Build a log message with `log` as its only field.
    pub fn new_log<TK, TV, MK, MV>(
        name: impl Into<String>,
        tags: impl IntoIterator<Item = (TK, TV)>,
        meta: impl IntoIterator<Item = (MK, MV)>,
        log: impl Into<String>,
        time: DateTime<Utc>,
    ) -> Result<Self, ContractError>
    where
        TK: Into<String>,
        TV: Into<String>,
        MK: Into<String>,
        MV: Into<String>,
    {
        let log: String = log.into();
        Self::new(name, tags, meta, [("log", log)], time)
    }

    pub fn is_log(&self) -> bool {
        self.log_value().is_some()
    }

    pub fn log_value(&self) -> Option<&str> {
        self.get_field("log").and_then(|v| v.as_str())
    }
}
