//! Progress stream framing.
//!
//! A provisioning run is delivered as a sequence of [`StreamFrame`]s. Every
//! step event is one frame; the run ends with a [`StreamFrame::Done`]
//! terminator so consumers can tell a normal end of stream from a dropped
//! transport.

use thiserror::Error;

use crate::types::StepEvent;

/// Text payload of the terminator frame.
pub const DONE_MARKER: &str = "[DONE]";

const SSE_PREFIX: &str = "data: ";

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,

    #[error("frame is not a server-sent event data line: {0:?}")]
    NotData(String),

    #[error("malformed step event: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One unit of the progress stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Step(StepEvent),
    Done,
}

impl StreamFrame {
    /// Encode as a single line: the event JSON, or [`DONE_MARKER`].
    pub fn to_line(&self) -> Result<String, FrameError> {
        match self {
            Self::Step(event) => Ok(serde_json::to_string(event)?),
            Self::Done => Ok(DONE_MARKER.to_string()),
        }
    }

    /// Encode as a server-sent event (`data: ...` followed by a blank line).
    pub fn to_sse(&self) -> Result<String, FrameError> {
        Ok(format!("{SSE_PREFIX}{}\n\n", self.to_line()?))
    }

    /// Decode a line produced by [`StreamFrame::to_line`].
    pub fn parse_line(line: &str) -> Result<Self, FrameError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(FrameError::Empty);
        }
        if line == DONE_MARKER {
            return Ok(Self::Done);
        }
        Ok(Self::Step(serde_json::from_str(line)?))
    }

    /// Decode a frame produced by [`StreamFrame::to_sse`].
    pub fn parse_sse(frame: &str) -> Result<Self, FrameError> {
        let frame = frame.trim();
        let payload = frame
            .strip_prefix(SSE_PREFIX)
            .ok_or_else(|| FrameError::NotData(frame.to_string()))?;
        Self::parse_line(payload)
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    #[must_use]
    pub fn as_step(&self) -> Option<&StepEvent> {
        match self {
            Self::Step(event) => Some(event),
            Self::Done => None,
        }
    }
}
