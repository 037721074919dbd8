//! # Contracts
//!
//! Shared telemetry message model and interface contracts. All other crates
//! depend on this one; reverse dependencies are prohibited.
//!
//! ## Message Model
//! - One concrete [`Message`] (name, tags, meta, fields, time) for every kind
//!   of telemetry; the [`Variant`] is derived from the reserved field present
//! - Field values are normalized into five [`FieldValue`] kinds
//! - Timestamps are UTC with nanosecond precision
//!
//! ## Wire Formats
//! - Line protocol: `name,tag=v field=v timestampNanos`
//! - JSON: `{"name", "tags", "fields", "timestamp"}`

mod control;
mod error;
mod event;
mod field;
mod job;
mod json;
mod line_protocol;
mod log;
mod message;
mod metric;
mod relay;
mod sink;

pub use control::ControlMethod;
pub use error::*;
pub use field::{FieldValue, IntoFieldValue};
pub use job::JobEvent;
pub use message::{Fields, Message, Tags, Variant};
pub use relay::*;
pub use sink::*;
