//! Worker control protocol
//!
//! A worker announces it is ready to receive input by writing a single
//! control line to its stdout. Everything it writes afterwards belongs to the
//! worker and is not interpreted by the supervisor.

use serde::{Deserialize, Serialize};

use crate::errors::{SharedError, SharedResult};
use crate::types::WorkerTopic;

/// Control messages a worker writes to its stdout, one JSON object per line
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// Startup acknowledgement, echoing the topic the worker was assigned
    Ready { topic: WorkerTopic },
}

impl WorkerMessage {
    pub fn ready(topic: &WorkerTopic) -> Self {
        WorkerMessage::Ready { topic: topic.clone() }
    }

    /// Parse one stdout line
    pub fn parse_line(line: &str) -> SharedResult<Self> {
        serde_json::from_str(line.trim_end()).map_err(|e| SharedError::ProtocolError {
            message: format!("not a worker control message: {e}"),
        })
    }

    /// Render as a single newline-terminated line
    pub fn to_line(&self) -> String {
        // A tagged enum of plain strings always serializes
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }
}

/// How the supervisor recognises that a worker finished initialising
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessSignal {
    /// A [`WorkerMessage::Ready`] line carrying the assigned topic
    #[default]
    Structured,
    /// A line consisting of exactly this token
    Token(String),
}

impl ReadinessSignal {
    /// Whether `line` is the readiness signal for the worker assigned `topic`
    pub fn matches(&self, line: &str, topic: &WorkerTopic) -> bool {
        let line = line.trim_end_matches(['\r', '\n']);
        match self {
            ReadinessSignal::Structured => matches!(
                WorkerMessage::parse_line(line),
                Ok(WorkerMessage::Ready { topic: ref announced }) if announced == topic
            ),
            ReadinessSignal::Token(token) => line == token,
        }
    }
}
