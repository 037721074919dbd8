//! Control messages - GET/PUT commands carried in the `control` field
//!
//! The method travels as the `method` tag; a GET carries an empty payload.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::{ContractError, Message};

/// Control command method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlMethod {
    Get,
    Put,
}

impl ControlMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "GET" => Some(Self::Get),
            "PUT" => Some(Self::Put),
            _ => None,
        }
    }
}

impl fmt::Display for ControlMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Message {
    /// Build a GET control message (empty payload, `method=GET`).
    pub fn new_get_control<TK, TV, MK, MV>(
        name: impl Into<String>,
        tags: impl IntoIterator<Item = (TK, TV)>,
        meta: impl IntoIterator<Item = (MK, MV)>,
        time: DateTime<Utc>,
    ) -> Result<Self, ContractError>
    where
        TK: Into<String>,
        TV: Into<String>,
        MK: Into<String>,
        MV: Into<String>,
    {
        let mut msg = Self::new(name, tags, meta, [("control", "")], time)?;
        msg.add_tag("method", ControlMethod::Get.as_str());
        Ok(msg)
    }

    /// Build a PUT control message carrying `value`.
    pub fn new_put_control<TK, TV, MK, MV>(
        name: impl Into<String>,
        tags: impl IntoIterator<Item = (TK, TV)>,
        meta: impl IntoIterator<Item = (MK, MV)>,
        value: impl Into<String>,
        time: DateTime<Utc>,
    ) -> Result<Self, ContractError>
    where
        TK: Into<String>,
        TV: Into<String>,
        MK: Into<String>,
        MV: Into<String>,
    {
        let value: String = value.into();
        let mut msg = Self::new(name, tags, meta, [("control", value)], time)?;
        msg.add_tag("method", ControlMethod::Put.as_str());
        Ok(msg)
    }

    /// True for a string `control` field with a `method` tag of GET or PUT
    pub fn is_control(&self) -> bool {
        self.control_method().is_some()
    }

    pub fn control_method(&self) -> Option<ControlMethod> {
        self.get_field("control")?.as_str()?;
        self.get_tag("method").and_then(ControlMethod::from_tag)
    }

    pub fn control_value(&self) -> Option<&str> {
        if self.is_control() {
            self.get_field("control").and_then(|v| v.as_str())
        } else {
            None
        }
    }
}
