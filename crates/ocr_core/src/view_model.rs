use crate::{ExtractionResult, RunId, RunState};

/// Alert shown when recognition is started without staged images.
pub const NO_IMAGES_ALERT: &str = "Please add at least one image first.";

/// What the single control button does when clicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlAction {
    #[default]
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelOptionView {
    pub id: String,
    pub name: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub run_state: RunState,
    pub run_id: RunId,
    pub control: ControlAction,
    pub status_text: String,
    pub spinner: bool,
    pub output: String,
    pub reasoning: String,
    pub reasoning_expanded: bool,
    pub output_expanded: bool,
    pub staged_images: Vec<String>,
    pub prompt: String,
    pub models: Vec<ModelOptionView>,
    pub reasoning_checked: bool,
    pub reasoning_locked: bool,
    pub error: Option<String>,
    pub history: Vec<ExtractionResult>,
    pub dirty: bool,
}
