//! Built-in sink implementations
//!
//! Every backend reads its options from its JSON config blob. Keys shared by
//! the text-producing sinks:
//! - `format`: `"line"` (default) or `"json"`
//! - `meta_as_tags`: meta keys emitted as tags

mod file;
mod prometheus;
mod stdout;
mod udp;

pub use self::file::{FileSink, FileSinkConfig};
pub use self::prometheus::{PrometheusSink, PrometheusSinkConfig};
pub use self::stdout::{StdoutSink, StdoutSinkConfig};
pub use self::udp::{UdpSink, UdpSinkConfig};

use std::collections::BTreeSet;

use contracts::{ContractError, Message};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Record encoding used by the text-producing sinks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Line protocol, one message per line
    #[default]
    Line,
    /// One JSON object per line
    Json,
}

impl OutputFormat {
    /// Encode one message as a newline-terminated record
    pub fn encode(
        self,
        msg: &Message,
        meta_as_tags: &BTreeSet<String>,
    ) -> Result<Vec<u8>, ContractError> {
        let mut out = match self {
            Self::Line => msg.encode_line(meta_as_tags)?.into_bytes(),
            Self::Json => msg.to_json(meta_as_tags)?,
        };
        out.push(b'\n');
        Ok(out)
    }
}

/// Decode a backend config struct, tagging errors with the sink name
pub(crate) fn parse_config<T: DeserializeOwned>(
    name: &str,
    config: &Value,
) -> Result<T, ContractError> {
    T::deserialize(config).map_err(|e| ContractError::sink_config(name, e.to_string()))
}
