use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use chrono::Local;
use ocr_core::{Effect, ExtractionResult, ModelInfo, Msg, RecognitionRequest, ReasoningSupport};
use ocr_engine::wire::{HistoryEntry, ModelEntry, ReasoningFlag, RecognizeRequest};
use ocr_engine::{ClientSettings, EngineEvent, EngineHandle, StreamEvent};
use ocr_logging::{ocr_info, ocr_warn};

/// Turns core effects into engine commands and engine events into messages.
pub struct EffectRunner {
    engine: EngineHandle,
    msg_tx: mpsc::Sender<Msg>,
}

impl EffectRunner {
    pub fn new(settings: ClientSettings, msg_tx: mpsc::Sender<Msg>) -> anyhow::Result<Self> {
        let engine = EngineHandle::new(settings)?;
        Ok(Self { engine, msg_tx })
    }

    /// Fetches the model list and session history.
    pub fn load_startup_data(&self) {
        self.engine.load_models();
        self.engine.load_history();
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartRecognition { run_id, request } => {
                    ocr_info!(
                        "StartRecognition run_id={} images={} model={:?} reasoning={}",
                        run_id,
                        request.images.len(),
                        request.model,
                        request.enable_reasoning
                    );
                    self.engine.recognize(run_id, to_wire_request(request));
                }
                Effect::CancelRecognition { run_id } => {
                    ocr_info!("CancelRecognition run_id={}", run_id);
                    self.engine.cancel(run_id);
                }
                Effect::ScheduleAutoSwitch { run_id, delay } => {
                    let msg_tx = self.msg_tx.clone();
                    thread::spawn(move || {
                        thread::sleep(delay);
                        let _ = msg_tx.send(Msg::AutoSwitchElapsed { run_id });
                    });
                }
                Effect::ShowAlert(text) => {
                    ocr_warn!("Alert: {}", text);
                    eprintln!("{text}");
                }
            }
        }
    }

    /// Waits up to `timeout` for the next engine event, already mapped to a message.
    pub fn next_message(&self, timeout: Duration) -> Option<Msg> {
        self.engine.recv_timeout(timeout).and_then(map_event)
    }
}

fn to_wire_request(request: RecognitionRequest) -> RecognizeRequest {
    RecognizeRequest {
        images: request.images,
        prompt: request.prompt,
        model: request.model,
        enable_reasoning: Some(request.enable_reasoning),
    }
}

fn map_event(event: EngineEvent) -> Option<Msg> {
    match event {
        EngineEvent::ModelsLoaded(Ok(response)) => Some(Msg::ModelsLoaded {
            models: response.models.into_iter().map(map_model).collect(),
            default_model: response.default_model,
            enable_reasoning_by_default: response.enable_reasoning_by_default,
        }),
        EngineEvent::ModelsLoaded(Err(err)) => {
            ocr_warn!("Loading models failed: {}", err);
            Some(Msg::ModelsLoadFailed(err.message))
        }
        EngineEvent::HistoryLoaded(Ok(response)) => Some(Msg::HistoryLoaded(
            response.history.into_iter().map(map_history).collect(),
        )),
        EngineEvent::HistoryLoaded(Err(err)) => {
            ocr_warn!("Loading history failed: {}", err);
            None
        }
        EngineEvent::RequestSent { run_id } => Some(Msg::RequestSent { run_id }),
        EngineEvent::Stream { run_id, event } => match event {
            StreamEvent::ContentDelta(text) => Some(Msg::ContentDelta { run_id, text }),
            StreamEvent::ReasoningDelta(text) => Some(Msg::ReasoningDelta { run_id, text }),
            StreamEvent::Done | StreamEvent::ParseError { .. } | StreamEvent::UpstreamError(_) => {
                None
            }
        },
        EngineEvent::RunFinished { run_id, result } => Some(match result {
            Ok(output) => Msg::StreamEnded {
                run_id,
                text: output.text,
                timestamp: Local::now().format("%H:%M:%S").to_string(),
            },
            Err(err) if err.is_cancelled() => Msg::StreamStopped { run_id },
            Err(err) => {
                ocr_warn!("Run {} failed ({}): {}", run_id, err.kind, err);
                Msg::StreamFailed {
                    run_id,
                    message: err.message,
                }
            }
        }),
    }
}

fn map_model(entry: ModelEntry) -> ModelInfo {
    ModelInfo {
        id: entry.id,
        name: entry.name,
        reasoning: map_reasoning(entry.supports_reasoning),
    }
}

fn map_reasoning(flag: ReasoningFlag) -> ReasoningSupport {
    match flag {
        ReasoningFlag::True => ReasoningSupport::Optional,
        ReasoningFlag::False => ReasoningSupport::Unsupported,
        ReasoningFlag::Default => ReasoningSupport::Mandatory,
    }
}

fn map_history(entry: HistoryEntry) -> ExtractionResult {
    ExtractionResult {
        id: entry.id,
        timestamp: entry.time,
        text: entry.text,
    }
}
