//! Relay settings shared by the dispatcher, config loader and CLI.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default upper bound of extra messages drained per dispatcher wake-up
pub const SINK_MAX_FORWARD: usize = 50;

/// Default capacity of the inbound message queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// `relay` section of the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RelaySettings {
    /// Bounded capacity of the inbound queue
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub queue_capacity: usize,

    /// Messages drained after the first one in a single wake-up
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub max_forward: usize,

    /// Meta keys copied into every sink config without its own `meta_as_tags`
    pub meta_as_tags: Vec<String>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_forward: SINK_MAX_FORWARD,
            meta_as_tags: Vec::new(),
        }
    }
}
