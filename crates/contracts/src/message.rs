//! Message - the unit telemetry record
//!
//! One concrete record for metrics, events, logs and control commands. The
//! kind of a message is not a type: it is read from the reserved field key
//! the message carries (see [`Variant`]).
//!
//! ## Ownership
//! The constructor takes its own copies of the caller's entries. The full-map
//! getters (`tags()`, `meta()`, `fields()`) borrow the live maps; mutation
//! goes through the `_mut` variants or the single-key helpers.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::{ContractError, FieldValue, IntoFieldValue};

/// Tag and meta maps (sorted by key)
pub type Tags = BTreeMap<String, String>;

/// Field map (sorted by key)
pub type Fields = BTreeMap<String, FieldValue>;

/// Message variant, decided by the reserved field key present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Metric,
    Event,
    Log,
    Control,
    Invalid,
}

impl Variant {
    /// Reserved field keys in classification priority order.
    ///
    /// A message carrying several of them is classified by the first match.
    pub const PRIORITY: [(&'static str, Variant); 4] = [
        ("value", Variant::Metric),
        ("event", Variant::Event),
        ("log", Variant::Log),
        ("control", Variant::Control),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Event => "event",
            Self::Log => "log",
            Self::Control => "control",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Telemetry message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    name: String,
    tags: Tags,
    meta: Tags,
    fields: Fields,
    time: DateTime<Utc>,
}

impl Message {
    /// Build a message, normalizing every field value.
    ///
    /// Field values that normalize to nothing (`None`, JSON `null`, arrays,
    /// objects) are left out of the field map.
    ///
    /// # Errors
    /// `InvalidMessage` if the name is empty or no field survives
    /// normalization.
    pub fn new<TK, TV, MK, MV, FK, FV>(
        name: impl Into<String>,
        tags: impl IntoIterator<Item = (TK, TV)>,
        meta: impl IntoIterator<Item = (MK, MV)>,
        fields: impl IntoIterator<Item = (FK, FV)>,
        time: DateTime<Utc>,
    ) -> Result<Self, ContractError>
    where
        TK: Into<String>,
        TV: Into<String>,
        MK: Into<String>,
        MV: Into<String>,
        FK: Into<String>,
        FV: IntoFieldValue,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(ContractError::invalid_message("name must not be empty"));
        }

        let fields: Fields = fields
            .into_iter()
            .filter_map(|(k, v)| v.into_field_value().map(|v| (k.into(), v)))
            .collect();
        if fields.is_empty() {
            return Err(ContractError::invalid_message(format!(
                "message '{name}' has no usable fields"
            )));
        }

        Ok(Self {
            name,
            tags: tags.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            meta: meta.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            fields,
            time,
        })
    }

    /// Empty message for incremental building.
    ///
    /// It classifies as [`Variant::Invalid`] and does not encode until a name
    /// and at least one field are set.
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            tags: Tags::new(),
            meta: Tags::new(),
            fields: Fields::new(),
            time: DateTime::UNIX_EPOCH,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn set_time(&mut self, time: DateTime<Utc>) {
        self.time = time;
    }

    /// Timestamp in nanoseconds since the Unix epoch.
    ///
    /// `None` outside roughly 1677..2262, which the wire format cannot carry.
    pub fn timestamp_nanos(&self) -> Option<i64> {
        self.time.timestamp_nanos_opt()
    }

    // ===== Tags =====

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut Tags {
        &mut self.tags
    }

    pub fn add_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }

    pub fn remove_tag(&mut self, key: &str) -> Option<String> {
        self.tags.remove(key)
    }

    // ===== Meta =====

    pub fn meta(&self) -> &Tags {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut Tags {
        &mut self.meta
    }

    pub fn add_meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.meta.insert(key.into(), value.into());
    }

    pub fn get_meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }

    pub fn has_meta(&self, key: &str) -> bool {
        self.meta.contains_key(key)
    }

    pub fn remove_meta(&mut self, key: &str) -> Option<String> {
        self.meta.remove(key)
    }

    // ===== Fields =====

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Fields {
        &mut self.fields
    }

    /// Add or replace a field.
    ///
    /// Returns `false` (and leaves the map untouched) when the value
    /// normalizes to nothing.
    pub fn add_field(&mut self, key: impl Into<String>, value: impl IntoFieldValue) -> bool {
        match value.into_field_value() {
            Some(v) => {
                self.fields.insert(key.into(), v);
                true
            }
            None => false,
        }
    }

    pub fn get_field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn remove_field(&mut self, key: &str) -> Option<FieldValue> {
        self.fields.remove(key)
    }

    // ===== Classification =====

    /// Classify by the first reserved field key found in
    /// [`Variant::PRIORITY`] order.
    pub fn variant(&self) -> Variant {
        Variant::PRIORITY
            .iter()
            .find(|(key, _)| self.fields.contains_key(*key))
            .map_or(Variant::Invalid, |(_, variant)| *variant)
    }

    /// Tag set for one encoding, with the selected meta entries promoted.
    ///
    /// A promoted meta entry replaces a tag with the same key.
    pub fn promoted_tags<'a>(
        &'a self,
        meta_as_tags: &BTreeSet<String>,
    ) -> BTreeMap<&'a str, &'a str> {
        let mut tags: BTreeMap<&str, &str> = self
            .tags
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        for key in meta_as_tags {
            if let Some((k, v)) = self.meta.get_key_value(key) {
                tags.insert(k.as_str(), v.as_str());
            }
        }
        tags
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Name: {}, Tags: {:?}, Meta: {:?}, Fields: {{",
            self.name, self.tags, self.meta
        )?;
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        match self.timestamp_nanos() {
            Some(ns) => write!(f, "}}, Timestamp: {ns}"),
            None => write!(f, "}}, Timestamp: {}", self.time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.timestamp_nanos(1_700_000_000_000_000_000)
    }

    #[test]
    fn test_new_copies_and_normalizes() {
        let mut tags = Tags::new();
        tags.insert("host".to_string(), "n1".to_string());

        let msg = Message::new(
            "cpu_load",
            tags.clone(),
            [("unit", "%")],
            [("value", Some(3u8)), ("missing", None)],
            ts(),
        )
        .unwrap();

        tags.insert("late".to_string(), "x".to_string());
        assert!(!msg.has_tag("late"));
        assert_eq!(msg.get_tag("host"), Some("n1"));
        assert_eq!(msg.get_meta("unit"), Some("%"));
        assert_eq!(msg.get_field("value"), Some(&FieldValue::UInt(3)));
        assert!(!msg.has_field("missing"));
        assert_eq!(msg.fields().len(), 1);
    }

    #[test]
    fn test_new_rejects_empty_name_and_empty_fields() {
        let err = Message::new("", Tags::new(), Tags::new(), [("value", 1i64)], ts());
        assert!(matches!(err, Err(ContractError::InvalidMessage { .. })));

        let err = Message::new("x", Tags::new(), Tags::new(), [("value", None::<f64>)], ts());
        assert!(matches!(err, Err(ContractError::InvalidMessage { .. })));
    }

    #[test]
    fn test_accessors() {
        let mut msg = Message::new("m", Tags::new(), Tags::new(), [("value", 1i64)], ts()).unwrap();

        msg.set_name("renamed");
        assert_eq!(msg.name(), "renamed");

        msg.add_tag("a", "1");
        assert_eq!(msg.remove_tag("a"), Some("1".to_string()));
        assert_eq!(msg.remove_tag("a"), None);

        msg.add_meta("unit", "B");
        assert!(msg.has_meta("unit"));
        assert_eq!(msg.remove_meta("unit"), Some("B".to_string()));

        assert!(msg.add_field("extra", -2i16));
        assert!(!msg.add_field("nothing", None::<u32>));
        assert_eq!(msg.get_field("extra"), Some(&FieldValue::Int(-2)));
        assert_eq!(msg.remove_field("extra"), Some(FieldValue::Int(-2)));

        let later = Utc.timestamp_nanos(5);
        msg.set_time(later);
        assert_eq!(msg.timestamp_nanos(), Some(5));
    }

    #[test]
    fn test_full_map_getters_are_live() {
        let mut msg = Message::new("m", Tags::new(), Tags::new(), [("value", 1i64)], ts()).unwrap();
        msg.tags_mut().insert("k".to_string(), "v".to_string());
        msg.fields_mut()
            .insert("value".to_string(), FieldValue::Float(2.0));
        assert_eq!(msg.tags().get("k").map(String::as_str), Some("v"));
        assert_eq!(msg.get_field("value"), Some(&FieldValue::Float(2.0)));
    }

    #[test]
    fn test_variant_priority() {
        let msg = Message::new(
            "m",
            Tags::new(),
            Tags::new(),
            [
                ("control", FieldValue::Str(String::new())),
                ("log", FieldValue::Str("l".into())),
                ("event", FieldValue::Str("e".into())),
                ("value", FieldValue::Int(1)),
            ],
            ts(),
        )
        .unwrap();
        assert_eq!(msg.variant(), Variant::Metric);

        let mut msg = msg;
        msg.remove_field("value");
        assert_eq!(msg.variant(), Variant::Event);
        msg.remove_field("event");
        assert_eq!(msg.variant(), Variant::Log);
        msg.remove_field("log");
        assert_eq!(msg.variant(), Variant::Control);
        msg.remove_field("control");
        assert_eq!(msg.variant(), Variant::Invalid);
    }

    #[test]
    fn test_no_reserved_key_is_invalid() {
        let msg = Message::new("m", Tags::new(), Tags::new(), [("temp", 21.5)], ts()).unwrap();
        assert_eq!(msg.variant(), Variant::Invalid);
        assert_eq!(Message::empty().variant(), Variant::Invalid);
    }

    #[test]
    fn test_promoted_tags_do_not_mutate() {
        let msg = Message::new(
            "m",
            [("host", "n1"), ("unit", "old")],
            [("unit", "B"), ("scope", "node")],
            [("value", 1i64)],
            ts(),
        )
        .unwrap();

        let select: BTreeSet<String> = ["unit".to_string(), "absent".to_string()].into();
        let tags = msg.promoted_tags(&select);
        assert_eq!(tags.get("unit"), Some(&"B"));
        assert_eq!(tags.get("host"), Some(&"n1"));
        assert!(!tags.contains_key("scope"));
        assert!(!tags.contains_key("absent"));
        assert_eq!(msg.get_tag("unit"), Some("old"));
    }

    #[test]
    fn test_display_contains_parts() {
        let msg = Message::new("m", [("h", "n")], [("u", "B")], [("value", 1i64)], ts()).unwrap();
        let text = msg.to_string();
        assert!(text.contains("Name: m"));
        assert!(text.contains("Meta:"));
        assert!(text.contains("value: 1"));
        assert!(text.contains("1700000000000000000"));
    }
}
