//! OCR engine: stream decoding, backend client and the worker that runs requests.
mod client;
mod engine;
mod stream;
mod types;
pub mod wire;

pub use client::{Backend, ChannelEventSink, ClientSettings, EventSink, ReqwestBackend};
pub use engine::EngineHandle;
pub use stream::{
    decode_events, decode_line, strip_box_markers, EventDecoder, LineBuffer, TextAccumulator,
    BEGIN_OF_BOX, DATA_PREFIX, DONE_SENTINEL, END_OF_BOX, REASONING_DELTA_TYPE,
};
pub use types::{ClientError, EngineEvent, FailureKind, RecognizeOutput, RunId, StreamEvent};
