//! OCR core: pure recognition state machine and view-model helpers.
mod effect;
mod history;
mod models;
mod msg;
mod panel;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use history::{ExtractionResult, HistoryStore, HISTORY_LIMIT};
pub use models::{ModelCatalog, ModelInfo, ReasoningControl, ReasoningSupport};
pub use msg::Msg;
pub use panel::PanelState;
pub use state::{
    AppState, ControllerConfig, RecognitionRequest, RunId, RunState, StagedImage,
    DEFAULT_AUTO_SWITCH_DELAY,
};
pub use update::update;
pub use view_model::{AppViewModel, ControlAction, ModelOptionView, NO_IMAGES_ALERT};
