use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use ocr_core::{update, AppState, ControllerConfig, Msg, RunState, StagedImage};
use ocr_engine::ClientSettings;
use ocr_logging::{ocr_debug, ocr_info, ocr_warn};

use crate::effects::EffectRunner;
use crate::render::TerminalRenderer;

/// What the user asked for on the command line.
pub struct Job {
    pub model: Option<String>,
    pub prompt: String,
    /// `None` keeps the backend's default.
    pub reasoning: Option<bool>,
    pub images: Vec<StagedImage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for the model list before applying the job.
    Loading,
    Running,
}

pub fn run_app(
    settings: ClientSettings,
    config: ControllerConfig,
    job: Job,
) -> anyhow::Result<RunState> {
    let (msg_tx, msg_rx) = mpsc::channel::<Msg>();
    let runner = EffectRunner::new(settings, msg_tx.clone())?;
    spawn_interrupt_listener(msg_tx);

    let mut app = App {
        state: AppState::with_config(config),
        runner,
        renderer: TerminalRenderer::default(),
        phase: Phase::Loading,
        job: Some(job),
        quit: false,
    };
    app.runner.load_startup_data();

    while !app.quit {
        if let Some(msg) = app.runner.next_message(Duration::from_millis(20)) {
            app.dispatch_msg(msg);
        }
        while let Ok(msg) = msg_rx.try_recv() {
            app.dispatch_msg(msg);
        }
        if app.phase == Phase::Running && app.is_settled() {
            break;
        }
    }
    Ok(app.state.run_state())
}

struct App {
    state: AppState,
    runner: EffectRunner,
    renderer: TerminalRenderer,
    phase: Phase,
    job: Option<Job>,
    quit: bool,
}

impl App {
    fn dispatch_msg(&mut self, msg: Msg) {
        let start_job = self.phase == Phase::Loading
            && matches!(msg, Msg::ModelsLoaded { .. } | Msg::ModelsLoadFailed(_));
        if matches!(msg, Msg::StopClicked) && !self.state.run_state().is_active() {
            ocr_info!("Interrupted while no run is active; quitting");
            self.quit = true;
        }

        self.apply(msg);
        if start_job {
            self.start_job();
        }
    }

    fn apply(&mut self, msg: Msg) {
        ocr_debug!("dispatch {:?}", msg);
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        let was_dirty = state.consume_dirty();
        let view = state.view();
        self.state = state;

        self.runner.enqueue(effects);
        if was_dirty {
            let mut live = io::stderr().lock();
            let mut result = io::stdout().lock();
            if let Err(err) = self.renderer.render(&view, &mut live, &mut result) {
                ocr_warn!("Rendering failed: {}", err);
            }
        }
    }

    /// Applies the command-line selections, then presses the control button.
    fn start_job(&mut self) {
        let Some(job) = self.job.take() else {
            return;
        };
        self.phase = Phase::Running;
        if let Some(model) = job.model {
            let known = self
                .state
                .view()
                .models
                .iter()
                .any(|option| option.id == model);
            if !known {
                ocr_warn!("Model {} is not offered by the backend; keeping the default", model);
            }
            self.apply(Msg::ModelSelected(model));
        }
        if let Some(reasoning) = job.reasoning {
            self.apply(Msg::ReasoningToggled(reasoning));
        }
        self.apply(Msg::PromptChanged(job.prompt));
        for image in job.images {
            self.apply(Msg::ImageStaged(image));
        }
        self.apply(Msg::ControlClicked);
    }

    /// The run reached a terminal state and no panel switch is still due.
    fn is_settled(&self) -> bool {
        !self.state.run_state().is_active() && !self.state.auto_switch_pending()
    }
}

/// Ctrl-C asks the controller to stop the active run.
fn spawn_interrupt_listener(msg_tx: mpsc::Sender<Msg>) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                ocr_warn!("Ctrl-C handling unavailable: {}", err);
                return;
            }
        };
        runtime.block_on(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if msg_tx.send(Msg::StopClicked).is_err() {
                    break;
                }
            }
        });
    });
}
