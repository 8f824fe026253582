//! Incremental decoding of the recognition event stream.
//!
//! The wire format is line oriented: blank lines, `data: [DONE]`, or
//! `data: <json>`. Chunks may split lines (and UTF-8 characters) anywhere.
use std::collections::VecDeque;

use bytes::BytesMut;
use futures_util::{stream, Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;

use crate::types::{RecognizeOutput, StreamEvent};

pub const DATA_PREFIX: &str = "data:";
pub const DONE_SENTINEL: &str = "[DONE]";
pub const BEGIN_OF_BOX: &str = "<|begin_of_box|>";
pub const END_OF_BOX: &str = "<|end_of_box|>";

/// `type` tag of the Responses-style reasoning payload.
pub const REASONING_DELTA_TYPE: &str = "response.reasoning.delta";

/// Splits a byte stream into complete lines, buffering the unterminated tail.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: BytesMut,
    /// Bytes of `buffer` already searched for a newline.
    scanned: usize,
}

impl LineBuffer {
    /// Appends a chunk and returns every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(self.scanned + offset + 1);
            push_line(&mut lines, &line[..line.len() - 1]);
            self.scanned = 0;
        }
        self.scanned = self.buffer.len();
        lines
    }

    /// Returns the final unterminated line, if any, and empties the buffer.
    pub fn finish(&mut self) -> Vec<String> {
        let tail = self.buffer.split();
        self.scanned = 0;
        let mut lines = Vec::new();
        push_line(&mut lines, &tail);
        lines
    }

    /// Bytes waiting for their line terminator.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn push_line(lines: &mut Vec<String>, bytes: &[u8]) {
    match std::str::from_utf8(bytes) {
        Ok(text) => {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }
        Err(err) => {
            ocr_logging::ocr_debug!("Skipping stream line with invalid UTF-8: {}", err);
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChunkPayload {
    #[serde(rename = "type")]
    kind: Option<String>,
    delta: Option<Value>,
    choices: Vec<ChunkChoice>,
    error: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChunkChoice {
    delta: ChoiceDelta,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChoiceDelta {
    content: Option<String>,
    reasoning: Option<String>,
}

/// Decodes a single line into zero or more events.
///
/// Lines without the `data:` prefix produce nothing. The tagged reasoning
/// shape is tried first, then the `choices[0].delta` shape, which yields
/// reasoning before content when both are present.
pub fn decode_line(line: &str) -> Vec<StreamEvent> {
    let Some(payload) = line.trim().strip_prefix(DATA_PREFIX) else {
        return Vec::new();
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Vec::new();
    }
    if payload == DONE_SENTINEL {
        return vec![StreamEvent::Done];
    }

    let chunk: ChunkPayload = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(_) => {
            return vec![StreamEvent::ParseError {
                line: line.to_string(),
            }]
        }
    };

    if chunk.kind.as_deref() == Some(REASONING_DELTA_TYPE) {
        return chunk
            .delta
            .as_ref()
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(|text| vec![StreamEvent::ReasoningDelta(text.to_string())])
            .unwrap_or_default();
    }

    if let Some(error) = chunk.error.as_ref() {
        return vec![StreamEvent::UpstreamError(error_summary(error))];
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Vec::new();
    };
    let mut events = Vec::with_capacity(2);
    if let Some(reasoning) = choice.delta.reasoning.filter(|text| !text.is_empty()) {
        events.push(StreamEvent::ReasoningDelta(reasoning));
    }
    if let Some(content) = choice.delta.content.filter(|text| !text.is_empty()) {
        events.push(StreamEvent::ContentDelta(content));
    }
    events
}

fn error_summary(error: &Value) -> String {
    match error {
        Value::String(text) => text.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

/// Line buffer plus per-line decoding. Stops producing events after `Done`.
#[derive(Debug, Default)]
pub struct EventDecoder {
    lines: LineBuffer,
    finished: bool,
}

impl EventDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        let lines = self.lines.push(chunk);
        self.decode(lines)
    }

    /// Flushes a trailing line that had no newline.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        let lines = self.lines.finish();
        let events = self.decode(lines);
        self.finished = true;
        events
    }

    /// True once the sentinel was seen or the input was flushed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn decode(&mut self, lines: Vec<String>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        for line in lines {
            for event in decode_line(&line) {
                let done = event == StreamEvent::Done;
                events.push(event);
                if done {
                    self.finished = true;
                    return events;
                }
            }
        }
        events
    }
}

/// Adapts a stream of byte chunks into a lazy, order-preserving stream of events.
///
/// Transport errors are passed through and end the stream.
pub fn decode_events<S, B, E>(bytes: S) -> impl Stream<Item = Result<StreamEvent, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    struct State<S> {
        bytes: std::pin::Pin<Box<S>>,
        decoder: EventDecoder,
        pending: VecDeque<StreamEvent>,
        exhausted: bool,
    }

    let initial = State {
        bytes: Box::pin(bytes),
        decoder: EventDecoder::default(),
        pending: VecDeque::new(),
        exhausted: false,
    };

    stream::unfold(initial, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.exhausted || state.decoder.is_finished() {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(chunk.as_ref());
                    state.pending.extend(events);
                }
                Some(Err(err)) => {
                    state.exhausted = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.exhausted = true;
                    let events = state.decoder.finish();
                    state.pending.extend(events);
                }
            }
        }
    })
}

/// Sums deltas into output and reasoning text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextAccumulator {
    output: String,
    reasoning: String,
}

impl TextAccumulator {
    pub fn apply(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::ContentDelta(text) => self.output.push_str(text),
            StreamEvent::ReasoningDelta(text) => self.reasoning.push_str(text),
            StreamEvent::Done | StreamEvent::ParseError { .. } | StreamEvent::UpstreamError(_) => {}
        }
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Final delivery: strips the box markers from the output.
    pub fn finish(self) -> RecognizeOutput {
        RecognizeOutput {
            text: strip_box_markers(&self.output).to_string(),
            reasoning: self.reasoning,
        }
    }
}

/// Removes `<|begin_of_box|>` / `<|end_of_box|>` only when both wrap the text.
pub fn strip_box_markers(text: &str) -> &str {
    text.strip_prefix(BEGIN_OF_BOX)
        .and_then(|rest| rest.strip_suffix(END_OF_BOX))
        .unwrap_or(text)
}
