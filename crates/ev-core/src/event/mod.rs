//! AG-UI event model — the typed envelope around each payload an agent
//! streams back during a run.

use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event payload has no string `type` field")]
    MissingType,
}

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    RunStarted,
    RunFinished,
    RunError,
    StepStarted,
    StepFinished,
    TextMessageStart,
    TextMessageContent,
    TextMessageEnd,
    ToolCallStart,
    ToolCallArgs,
    ToolCallEnd,
    ToolCallResult,
    StateSnapshot,
    StateDelta,
    MessagesSnapshot,
    Raw,
    Custom,
    Unknown(String),
}

impl EventKind {
    pub fn from_type(tag: &str) -> Self {
        match tag {
            "RUN_STARTED" => EventKind::RunStarted,
            "RUN_FINISHED" => EventKind::RunFinished,
            "RUN_ERROR" => EventKind::RunError,
            "STEP_STARTED" => EventKind::StepStarted,
            "STEP_FINISHED" => EventKind::StepFinished,
            "TEXT_MESSAGE_START" => EventKind::TextMessageStart,
            "TEXT_MESSAGE_CONTENT" => EventKind::TextMessageContent,
            "TEXT_MESSAGE_END" => EventKind::TextMessageEnd,
            "TOOL_CALL_START" => EventKind::ToolCallStart,
            "TOOL_CALL_ARGS" => EventKind::ToolCallArgs,
            "TOOL_CALL_END" => EventKind::ToolCallEnd,
            "TOOL_CALL_RESULT" => EventKind::ToolCallResult,
            "STATE_SNAPSHOT" => EventKind::StateSnapshot,
            "STATE_DELTA" => EventKind::StateDelta,
            "MESSAGES_SNAPSHOT" => EventKind::MessagesSnapshot,
            "RAW" => EventKind::Raw,
            "CUSTOM" => EventKind::Custom,
            other => EventKind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::RunStarted => "RUN_STARTED",
            EventKind::RunFinished => "RUN_FINISHED",
            EventKind::RunError => "RUN_ERROR",
            EventKind::StepStarted => "STEP_STARTED",
            EventKind::StepFinished => "STEP_FINISHED",
            EventKind::TextMessageStart => "TEXT_MESSAGE_START",
            EventKind::TextMessageContent => "TEXT_MESSAGE_CONTENT",
            EventKind::TextMessageEnd => "TEXT_MESSAGE_END",
            EventKind::ToolCallStart => "TOOL_CALL_START",
            EventKind::ToolCallArgs => "TOOL_CALL_ARGS",
            EventKind::ToolCallEnd => "TOOL_CALL_END",
            EventKind::ToolCallResult => "TOOL_CALL_RESULT",
            EventKind::StateSnapshot => "STATE_SNAPSHOT",
            EventKind::StateDelta => "STATE_DELTA",
            EventKind::MessagesSnapshot => "MESSAGES_SNAPSHOT",
            EventKind::Raw => "RAW",
            EventKind::Custom => "CUSTOM",
            EventKind::Unknown(tag) => tag,
        }
    }

    /// The agent has declared the run over, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::RunFinished | EventKind::RunError)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Event envelope
// ---------------------------------------------------------------------------

/// One decoded event. The payload is kept verbatim for downstream mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgUiEvent {
    pub kind: EventKind,
    pub payload: serde_json::Value,
}

impl AgUiEvent {
    pub fn parse(data: &str) -> Result<Self, EventParseError> {
        let payload: serde_json::Value = serde_json::from_str(data)?;
        Self::from_value(payload)
    }

    pub fn from_value(payload: serde_json::Value) -> Result<Self, EventParseError> {
        let kind = payload
            .get("type")
            .and_then(|t| t.as_str())
            .map(EventKind::from_type)
            .ok_or(EventParseError::MissingType)?;
        Ok(Self { kind, payload })
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_run_end_kinds_are_terminal() {
        assert!(EventKind::RunFinished.is_terminal());
        assert!(EventKind::RunError.is_terminal());
        assert!(!EventKind::RunStarted.is_terminal());
        assert!(!EventKind::Unknown("RUN_DONE".into()).is_terminal());
    }

    #[test]
    fn kind_tags_round_trip() {
        for tag in ["RUN_STARTED", "TOOL_CALL_RESULT", "STATE_DELTA", "vendor.heartbeat"] {
            assert_eq!(EventKind::from_type(tag).as_str(), tag);
        }
    }

    #[test]
    fn parse_keeps_payload() {
        let ev = AgUiEvent::parse(r#"{"type":"TEXT_MESSAGE_CONTENT","delta":"hi"}"#).unwrap();
        assert_eq!(ev.kind, EventKind::TextMessageContent);
        assert_eq!(ev.payload["delta"], "hi");
    }

    #[test]
    fn parse_rejects_untyped_and_malformed_payloads() {
        assert!(matches!(
            AgUiEvent::parse(r#"{"delta":"hi"}"#),
            Err(EventParseError::MissingType)
        ));
        assert!(matches!(
            AgUiEvent::parse(r#"{"type": 7}"#),
            Err(EventParseError::MissingType)
        ));
        assert!(matches!(
            AgUiEvent::parse("{not json"),
            Err(EventParseError::Json(_))
        ));
    }
}
