use crate::{ExtractionResult, ModelInfo, RunId, StagedImage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Backend returned the model list at startup.
    ModelsLoaded {
        models: Vec<ModelInfo>,
        default_model: String,
        enable_reasoning_by_default: bool,
    },
    /// Model list could not be fetched.
    ModelsLoadFailed(String),
    /// Backend returned the session history (newest first).
    HistoryLoaded(Vec<ExtractionResult>),
    /// User picked a model.
    ModelSelected(String),
    /// User flipped the reasoning checkbox.
    ReasoningToggled(bool),
    /// User edited the prompt.
    PromptChanged(String),
    /// An image was added to the staging list.
    ImageStaged(StagedImage),
    /// User removed the staged image at the given index.
    ImageRemoved(usize),
    /// User cleared all staged images.
    ImagesCleared,
    /// The context-dependent control button: start when idle, stop when running.
    ControlClicked,
    /// Explicit start request. While a run is active this stops it instead.
    StartClicked,
    /// Explicit stop request.
    StopClicked,
    /// Engine issued the HTTP request for the run.
    RequestSent { run_id: RunId },
    /// Engine decoded an output fragment.
    ContentDelta { run_id: RunId, text: String },
    /// Engine decoded a reasoning fragment.
    ReasoningDelta { run_id: RunId, text: String },
    /// Byte stream exhausted; `text` is the flushed final output.
    StreamEnded {
        run_id: RunId,
        text: String,
        timestamp: String,
    },
    /// Request rejected, non-2xx response or transport failure.
    StreamFailed { run_id: RunId, message: String },
    /// Engine observed the cancel signal.
    StreamStopped { run_id: RunId },
    /// The delay requested by `Effect::ScheduleAutoSwitch` elapsed.
    AutoSwitchElapsed { run_id: RunId },
    /// User clicked the reasoning panel header.
    ReasoningPanelToggled,
    /// User clicked the output panel header.
    OutputPanelToggled,
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
