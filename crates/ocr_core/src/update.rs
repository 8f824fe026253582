use crate::view_model::NO_IMAGES_ALERT;
use crate::{AppState, Effect, Msg, RunState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::ModelsLoaded {
            models,
            default_model,
            enable_reasoning_by_default,
        } => {
            state.load_models(models, &default_model, enable_reasoning_by_default);
            Vec::new()
        }
        Msg::ModelsLoadFailed(message) => {
            state.set_notice(format!("Failed to load models: {message}"));
            Vec::new()
        }
        Msg::HistoryLoaded(entries) => {
            state.replace_history(entries);
            Vec::new()
        }
        Msg::ModelSelected(id) => {
            state.select_model(&id);
            Vec::new()
        }
        Msg::ReasoningToggled(checked) => {
            state.set_reasoning_choice(checked);
            Vec::new()
        }
        Msg::PromptChanged(prompt) => {
            state.set_prompt(prompt);
            Vec::new()
        }
        Msg::ImageStaged(image) => {
            state.stage_image(image);
            Vec::new()
        }
        Msg::ImageRemoved(index) => {
            state.remove_image(index);
            Vec::new()
        }
        Msg::ImagesCleared => {
            state.clear_images();
            Vec::new()
        }
        // Only one run may be active: starting while busy means "stop".
        Msg::ControlClicked | Msg::StartClicked => {
            if state.run_state().is_active() {
                stop(&mut state)
            } else {
                start(&mut state)
            }
        }
        Msg::StopClicked => {
            if state.run_state().is_active() {
                stop(&mut state)
            } else {
                Vec::new()
            }
        }
        Msg::RequestSent { run_id } => {
            if state.is_current(run_id) && state.run_state() == RunState::Connecting {
                state.set_run_state(RunState::Processing);
            }
            Vec::new()
        }
        Msg::ContentDelta { run_id, text } => {
            if accepts_deltas(&state, run_id) {
                state.append_output(&text);
            }
            Vec::new()
        }
        Msg::ReasoningDelta { run_id, text } => {
            if accepts_deltas(&state, run_id) {
                state.append_reasoning(&text);
            }
            Vec::new()
        }
        Msg::StreamEnded {
            run_id,
            text,
            timestamp,
        } => {
            if !accepts_deltas(&state, run_id) {
                return (state, Vec::new());
            }
            if state.complete_run(text, timestamp) {
                vec![Effect::ScheduleAutoSwitch {
                    run_id,
                    delay: state.config().auto_switch_delay,
                }]
            } else {
                Vec::new()
            }
        }
        Msg::StreamFailed { run_id, message } => {
            if state.is_current(run_id) && state.run_state().is_active() {
                state.fail_run(message);
            }
            Vec::new()
        }
        Msg::StreamStopped { run_id } => {
            if state.is_current(run_id) && state.run_state().is_active() {
                state.set_run_state(RunState::Stopped);
            }
            Vec::new()
        }
        Msg::AutoSwitchElapsed { run_id } => {
            if state.is_current(run_id) {
                state.apply_auto_switch();
            }
            Vec::new()
        }
        Msg::ReasoningPanelToggled => {
            state.toggle_reasoning_panel();
            Vec::new()
        }
        Msg::OutputPanelToggled => {
            state.toggle_output_panel();
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn start(state: &mut AppState) -> Vec<Effect> {
    if !state.has_staged_images() {
        return vec![Effect::ShowAlert(NO_IMAGES_ALERT.to_string())];
    }
    let (run_id, request) = state.begin_run();
    vec![Effect::StartRecognition { run_id, request }]
}

fn stop(state: &mut AppState) -> Vec<Effect> {
    state.set_run_state(RunState::Stopped);
    vec![Effect::CancelRecognition {
        run_id: state.run_id(),
    }]
}

fn accepts_deltas(state: &AppState, run_id: crate::RunId) -> bool {
    state.is_current(run_id) && state.run_state() == RunState::Processing
}
