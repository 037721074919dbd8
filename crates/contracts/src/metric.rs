//! Metric messages - numeric samples carried in the `value` field

use chrono::{DateTime, Utc};

use crate::{ContractError, FieldValue, IntoFieldValue, Message};

impl Message {
    /// Build a metric message with `value` as its only field.
    pub fn new_metric<TK, TV, MK, MV>(
        name: impl Into<String>,
        tags: impl IntoIterator<Item = (TK, TV)>,
        meta: impl IntoIterator<Item = (MK, MV)>,
        value: impl IntoFieldValue,
        time: DateTime<Utc>,
    ) -> Result<Self, ContractError>
    where
        TK: Into<String>,
        TV: Into<String>,
        MK: Into<String>,
        MV: Into<String>,
    {
        Self::new(name, tags, meta, [("value", value.into_field_value())], time)
    }

    /// True if the message carries a non-string `value` field
    pub fn is_metric(&self) -> bool {
        self.get_field("value").is_some_and(|v| !v.is_string())
    }

    pub fn metric_value(&self) -> Option<&FieldValue> {
        self.get_field("value").filter(|v| !v.is_string())
    }
}
