//! Job lifecycle events
//!
//! A job start/stop is an event named `start_job` / `stop_job` whose payload
//! is the JSON-serialized job descriptor. The descriptor type belongs to the
//! caller.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{ContractError, Message, Tags};

/// Job lifecycle event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobEvent {
    Start,
    Stop,
}

impl JobEvent {
    /// Message name used for this event kind
    pub fn message_name(&self) -> &'static str {
        match self {
            Self::Start => "start_job",
            Self::Stop => "stop_job",
        }
    }
}

impl Message {
    /// Build a `start_job` event carrying `job` as JSON
    pub fn new_job_start_event<J: Serialize>(
        job: &J,
        time: DateTime<Utc>,
    ) -> Result<Self, ContractError> {
        Self::new_job_event(JobEvent::Start, job, time)
    }

    /// Build a `stop_job` event carrying `job` as JSON
    pub fn new_job_stop_event<J: Serialize>(
        job: &J,
        time: DateTime<Utc>,
    ) -> Result<Self, ContractError> {
        Self::new_job_event(JobEvent::Stop, job, time)
    }

    fn new_job_event<J: Serialize>(
        kind: JobEvent,
        job: &J,
        time: DateTime<Utc>,
    ) -> Result<Self, ContractError> {
        let payload = serde_json::to_string(job)?;
        Self::new_event(kind.message_name(), Tags::new(), Tags::new(), payload, time)
    }

    /// Job event kind, if this is a job start/stop event
    pub fn job_event(&self) -> Option<JobEvent> {
        if !self.is_event() {
            return None;
        }
        match self.name() {
            "start_job" => Some(JobEvent::Start),
            "stop_job" => Some(JobEvent::Stop),
            _ => None,
        }
    }

    /// Decode the job descriptor from the event payload.
    ///
    /// Use `#[serde(deny_unknown_fields)]` on `J` for strict decoding.
    pub fn job<J: DeserializeOwned>(&self) -> Result<J, ContractError> {
        let payload = self
            .event_value()
            .ok_or_else(|| ContractError::invalid_message("not an event message"))?;
        Ok(serde_json::from_str(payload)?)
    }
}
