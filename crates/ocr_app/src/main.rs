mod app;
mod effects;
mod images;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use ocr_core::{ControllerConfig, RunState, DEFAULT_AUTO_SWITCH_DELAY};
use ocr_engine::ClientSettings;
use ocr_logging::{ocr_error, ocr_info, LogDestination};

/// Extract text from images through the OCR backend.
#[derive(Debug, Parser)]
#[command(name = "ocr_app")]
struct Args {
    /// Image files to recognize, sent together in one request.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Backend base URL.
    #[arg(long, env = "OCR_SERVER", default_value = "http://127.0.0.1:1203")]
    server: String,

    /// Model id; defaults to the backend's default model.
    #[arg(long)]
    model: Option<String>,

    /// Extra instructions sent with the images.
    #[arg(long, default_value = "")]
    prompt: String,

    /// Ask for no reasoning (ignored for models that always reason).
    #[arg(long)]
    no_reasoning: bool,

    /// Let the reasoning and output panels expand independently.
    #[arg(long)]
    basic_panels: bool,

    /// Seconds of silence tolerated while streaming.
    #[arg(long, default_value_t = 60)]
    read_timeout: u64,
}

fn main() -> ExitCode {
    let args = Args::parse();
    ocr_logging::initialize(
        LogDestination::File(PathBuf::from("./ocr_app.log")),
        LevelFilter::Info,
    );

    match run(args) {
        Ok(RunState::Done) => ExitCode::SUCCESS,
        Ok(state) => {
            ocr_info!("Finished in state {:?}", state);
            ExitCode::FAILURE
        }
        Err(err) => {
            ocr_error!("{:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<RunState> {
    let images = args
        .images
        .iter()
        .map(|path| images::load_image(path))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let settings = ClientSettings {
        base_url: args.server,
        read_timeout: Duration::from_secs(args.read_timeout.max(1)),
        ..ClientSettings::default()
    };
    let config = ControllerConfig {
        reasoning_panel_exclusive: !args.basic_panels,
        auto_switch_delay: DEFAULT_AUTO_SWITCH_DELAY,
    };
    let job = app::Job {
        model: args.model,
        prompt: args.prompt,
        reasoning: args.no_reasoning.then_some(false),
        images,
    };
    ocr_info!("Recognizing {} image(s) via {}", job.images.len(), settings.base_url);

    app::run_app(settings, config, job).context("recognition failed")
}
