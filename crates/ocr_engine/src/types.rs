use std::fmt;

use crate::wire::{HistoryResponse, ModelsResponse};

pub type RunId = u64;

/// One decoded unit of the recognition event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Fragment of the final output.
    ContentDelta(String),
    /// Fragment of the model's reasoning.
    ReasoningDelta(String),
    /// The `[DONE]` sentinel; nothing follows.
    Done,
    /// A `data:` line whose payload is not a JSON object. Consumers skip it.
    ParseError { line: String },
    /// The provider reported an error in the middle of the stream.
    UpstreamError(String),
}

/// Final text of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecognizeOutput {
    /// Output with the box markers removed.
    pub text: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    ModelsLoaded(Result<ModelsResponse, ClientError>),
    HistoryLoaded(Result<HistoryResponse, ClientError>),
    RequestSent {
        run_id: RunId,
    },
    Stream {
        run_id: RunId,
        event: StreamEvent,
    },
    RunFinished {
        run_id: RunId,
        result: Result<RecognizeOutput, ClientError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ClientError {
    pub kind: FailureKind,
    pub message: String,
}

impl ClientError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "cancelled by user")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == FailureKind::Cancelled
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    /// Error object delivered inside the event stream.
    Upstream,
    /// Response body was not the JSON we expected.
    Decode,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Upstream => write!(f, "upstream error"),
            FailureKind::Decode => write!(f, "invalid response body"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}
