use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use ocr_logging::{ocr_debug, ocr_info};

use crate::client::{Backend, ChannelEventSink, ClientSettings, ReqwestBackend};
use crate::wire::RecognizeRequest;
use crate::{ClientError, EngineEvent, FailureKind, RunId};

enum EngineCommand {
    LoadModels,
    LoadHistory,
    Recognize {
        run_id: RunId,
        request: RecognizeRequest,
    },
    Cancel {
        run_id: RunId,
    },
}

/// Owns a worker thread with a tokio runtime and talks to it over channels.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(settings: ClientSettings) -> Result<Self, ClientError> {
        let backend = Arc::new(ReqwestBackend::new(&settings)?);
        Self::with_backend(backend)
    }

    pub fn with_backend(backend: Arc<dyn Backend>) -> Result<Self, ClientError> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|err| ClientError::new(FailureKind::Network, err.to_string()))?;

        thread::spawn(move || {
            let mut active: Option<(RunId, CancellationToken)> = None;
            while let Ok(command) = cmd_rx.recv() {
                let backend = backend.clone();
                let event_tx = event_tx.clone();
                match command {
                    EngineCommand::LoadModels => {
                        runtime.spawn(async move {
                            let result = backend.fetch_models().await;
                            let _ = event_tx.send(EngineEvent::ModelsLoaded(result));
                        });
                    }
                    EngineCommand::LoadHistory => {
                        runtime.spawn(async move {
                            let result = backend.fetch_history().await;
                            let _ = event_tx.send(EngineEvent::HistoryLoaded(result));
                        });
                    }
                    EngineCommand::Recognize { run_id, request } => {
                        // One run at a time: a new run supersedes the old one.
                        if let Some((previous, token)) = active.take() {
                            ocr_debug!("Run {} superseded by run {}", previous, run_id);
                            token.cancel();
                        }
                        let token = CancellationToken::new();
                        active = Some((run_id, token.clone()));
                        runtime.spawn(async move {
                            let sink = ChannelEventSink::new(event_tx.clone());
                            let result = backend
                                .stream_recognize(run_id, &request, &sink, &token)
                                .await;
                            let _ = event_tx.send(EngineEvent::RunFinished { run_id, result });
                        });
                    }
                    EngineCommand::Cancel { run_id } => match active.take() {
                        Some((current, token)) if current == run_id => {
                            ocr_info!("Cancelling run {}", run_id);
                            token.cancel();
                        }
                        other => active = other,
                    },
                }
            }
            // Dropping the runtime here aborts anything still in flight.
        });

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn load_models(&self) {
        let _ = self.cmd_tx.send(EngineCommand::LoadModels);
    }

    pub fn load_history(&self) {
        let _ = self.cmd_tx.send(EngineCommand::LoadHistory);
    }

    pub fn recognize(&self, run_id: RunId, request: RecognizeRequest) {
        let _ = self
            .cmd_tx
            .send(EngineCommand::Recognize { run_id, request });
    }

    pub fn cancel(&self, run_id: RunId) {
        let _ = self.cmd_tx.send(EngineCommand::Cancel { run_id });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Waits up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}
