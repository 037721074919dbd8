//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink construction failed (bad config blob or backend error)
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// No constructor registered for the `type` discriminator
    #[error("unknown type '{sink_type}' for sink '{name}'")]
    UnknownSinkType { name: String, sink_type: String },

    /// Sink configuration has the wrong shape
    #[error("invalid sink configuration: {message}")]
    InvalidConfig { message: String },

    /// Init finished without a single working sink
    #[error("found no usable sinks")]
    NoUsableSinks,

    /// Error from a contract (sink or codec)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an unknown sink type error
    pub fn unknown_sink_type(name: impl Into<String>, sink_type: impl Into<String>) -> Self {
        Self::UnknownSinkType {
            name: name.into(),
            sink_type: sink_type.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
