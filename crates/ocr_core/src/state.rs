use std::time::Duration;

use crate::view_model::{AppViewModel, ControlAction, ModelOptionView};
use crate::{
    ExtractionResult, HistoryStore, ModelCatalog, ModelInfo, PanelState, ReasoningControl,
};

pub type RunId = u64;

/// Delay before the reasoning panel hands focus back to the output panel.
pub const DEFAULT_AUTO_SWITCH_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Connecting,
    Processing,
    Done,
    Stopped,
    Error,
}

impl RunState {
    /// A run is in flight and the control button acts as "stop".
    pub fn is_active(self) -> bool {
        matches!(self, RunState::Connecting | RunState::Processing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedImage {
    pub name: String,
    pub data_uri: String,
}

/// Behaviour switches for the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Keep exactly one of the reasoning/output panels expanded.
    pub reasoning_panel_exclusive: bool,
    pub auto_switch_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            reasoning_panel_exclusive: true,
            auto_switch_delay: DEFAULT_AUTO_SWITCH_DELAY,
        }
    }
}

/// Payload for the backend's streaming recognition endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionRequest {
    pub images: Vec<String>,
    pub prompt: String,
    pub model: Option<String>,
    pub enable_reasoning: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    config: ControllerConfig,
    run_state: RunState,
    run_id: RunId,
    staged: Vec<StagedImage>,
    prompt: String,
    catalog: ModelCatalog,
    reasoning_choice: bool,
    notice: Option<String>,
    output: String,
    reasoning: String,
    panels: PanelState,
    error: Option<String>,
    auto_switch_pending: bool,
    history: HistoryStore,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn panels(&self) -> PanelState {
        self.panels
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// The output panel is still waiting to take focus back.
    pub fn auto_switch_pending(&self) -> bool {
        self.auto_switch_pending
    }

    pub fn reasoning_control(&self) -> ReasoningControl {
        ReasoningControl::resolve(
            self.catalog.selected().map(|model| model.reasoning),
            self.reasoning_choice,
        )
    }

    pub fn view(&self) -> AppViewModel {
        let control = self.reasoning_control();
        let selected = self.catalog.selected_id();
        AppViewModel {
            run_state: self.run_state,
            run_id: self.run_id,
            control: if self.run_state.is_active() {
                ControlAction::Stop
            } else {
                ControlAction::Start
            },
            status_text: self.status_text(),
            spinner: self.run_state.is_active(),
            output: self.output.clone(),
            reasoning: self.reasoning.clone(),
            reasoning_expanded: self.panels.reasoning_expanded(),
            output_expanded: self.panels.output_expanded(),
            staged_images: self.staged.iter().map(|image| image.name.clone()).collect(),
            prompt: self.prompt.clone(),
            models: self
                .catalog
                .models()
                .iter()
                .map(|model| ModelOptionView {
                    id: model.id.clone(),
                    name: model.name.clone(),
                    selected: Some(model.id.as_str()) == selected,
                })
                .collect(),
            reasoning_checked: control.checked,
            reasoning_locked: control.locked,
            error: self.error.clone(),
            history: self.history.entries().to_vec(),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn status_text(&self) -> String {
        match self.run_state {
            RunState::Idle => self
                .notice
                .clone()
                .unwrap_or_else(|| "Ready".to_string()),
            RunState::Connecting => "Connecting...".to_string(),
            RunState::Processing if self.output.is_empty() && !self.reasoning.is_empty() => {
                "Thinking...".to_string()
            }
            RunState::Processing => "Processing...".to_string(),
            RunState::Done if self.output.is_empty() => "Done (no text recognized)".to_string(),
            RunState::Done => "Done".to_string(),
            RunState::Stopped => "Stopped".to_string(),
            RunState::Error => match &self.error {
                Some(message) => format!("Error: {message}"),
                None => "Error".to_string(),
            },
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn is_current(&self, run_id: RunId) -> bool {
        self.run_id == run_id
    }

    pub(crate) fn has_staged_images(&self) -> bool {
        !self.staged.is_empty()
    }

    pub(crate) fn load_models(
        &mut self,
        models: Vec<ModelInfo>,
        default_model: &str,
        enable_reasoning_by_default: bool,
    ) {
        self.catalog.load(models, default_model);
        self.reasoning_choice = enable_reasoning_by_default;
        self.notice = None;
        self.mark_dirty();
    }

    pub(crate) fn set_notice(&mut self, notice: String) {
        self.notice = Some(notice);
        self.mark_dirty();
    }

    pub(crate) fn replace_history(&mut self, entries: Vec<ExtractionResult>) {
        self.history.replace(entries);
        self.mark_dirty();
    }

    pub(crate) fn select_model(&mut self, id: &str) {
        if self.catalog.select(id) {
            self.mark_dirty();
        }
    }

    pub(crate) fn set_reasoning_choice(&mut self, checked: bool) {
        if self.reasoning_control().locked {
            return;
        }
        self.reasoning_choice = checked;
        self.mark_dirty();
    }

    pub(crate) fn set_prompt(&mut self, prompt: String) {
        self.prompt = prompt;
        self.mark_dirty();
    }

    pub(crate) fn stage_image(&mut self, image: StagedImage) {
        self.staged.push(image);
        self.mark_dirty();
    }

    pub(crate) fn remove_image(&mut self, index: usize) {
        if index < self.staged.len() {
            self.staged.remove(index);
            self.mark_dirty();
        }
    }

    pub(crate) fn clear_images(&mut self) {
        if !self.staged.is_empty() {
            self.staged.clear();
            self.mark_dirty();
        }
    }

    /// Resets per-run buffers and moves to `Connecting`. Returns the request to send.
    pub(crate) fn begin_run(&mut self) -> (RunId, RecognitionRequest) {
        let enable_reasoning = self.reasoning_control().checked;
        self.run_id += 1;
        self.run_state = RunState::Connecting;
        self.output.clear();
        self.reasoning.clear();
        self.error = None;
        self.auto_switch_pending = false;
        self.panels = PanelState::for_run(enable_reasoning, self.config.reasoning_panel_exclusive);
        self.mark_dirty();

        let request = RecognitionRequest {
            images: self
                .staged
                .iter()
                .map(|image| image.data_uri.clone())
                .collect(),
            prompt: self.prompt.clone(),
            model: self.catalog.selected_id().map(ToOwned::to_owned),
            enable_reasoning,
        };
        (self.run_id, request)
    }

    pub(crate) fn set_run_state(&mut self, run_state: RunState) {
        self.run_state = run_state;
        self.mark_dirty();
    }

    pub(crate) fn append_output(&mut self, text: &str) {
        self.output.push_str(text);
        self.mark_dirty();
    }

    pub(crate) fn append_reasoning(&mut self, text: &str) {
        self.reasoning.push_str(text);
        if self.config.reasoning_panel_exclusive {
            self.panels.focus_reasoning();
        }
        self.mark_dirty();
    }

    /// Moves to `Done`, records history and reports whether an auto-switch is due.
    pub(crate) fn complete_run(&mut self, text: String, timestamp: String) -> bool {
        self.output = text;
        if !self.output.is_empty() {
            self.history.push(timestamp, self.output.clone());
        }
        self.run_state = RunState::Done;
        self.auto_switch_pending =
            self.config.reasoning_panel_exclusive && !self.reasoning.is_empty();
        self.mark_dirty();
        self.auto_switch_pending
    }

    pub(crate) fn fail_run(&mut self, message: String) {
        self.error = Some(message);
        self.run_state = RunState::Error;
        self.mark_dirty();
    }

    pub(crate) fn apply_auto_switch(&mut self) {
        if std::mem::take(&mut self.auto_switch_pending) {
            self.panels.focus_output();
            self.mark_dirty();
        }
    }

    pub(crate) fn toggle_reasoning_panel(&mut self) {
        self.auto_switch_pending = false;
        self.panels.toggle_reasoning(self.config.reasoning_panel_exclusive);
        self.mark_dirty();
    }

    pub(crate) fn toggle_output_panel(&mut self) {
        self.auto_switch_pending = false;
        self.panels.toggle_output(self.config.reasoning_panel_exclusive);
        self.mark_dirty();
    }
}
