use std::time::Duration;

use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use ocr_logging::{ocr_debug, ocr_info, ocr_warn};

use crate::stream::{decode_events, TextAccumulator};
use crate::wire::{ErrorBody, HistoryResponse, ModelsResponse, RecognizeRequest};
use crate::{ClientError, EngineEvent, FailureKind, RecognizeOutput, RunId, StreamEvent};

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Backend root, e.g. `http://127.0.0.1:1203`.
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Maximum silence between two reads of a response body.
    pub read_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:1203".to_string(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelEventSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// The backend endpoints the client relies on.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_models(&self) -> Result<ModelsResponse, ClientError>;

    async fn fetch_history(&self) -> Result<HistoryResponse, ClientError>;

    /// Streams one recognition run into `sink`.
    ///
    /// Emits `RequestSent` as soon as the request is issued, then one
    /// `Stream` event per content/reasoning delta. Observing `cancel` at any
    /// await point yields `FailureKind::Cancelled`.
    async fn stream_recognize(
        &self,
        run_id: RunId,
        request: &RecognizeRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<RecognizeOutput, ClientError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    base_url: reqwest::Url,
    client: reqwest::Client,
}

impl ReqwestBackend {
    pub fn new(settings: &ClientSettings) -> Result<Self, ClientError> {
        let base_url = reqwest::Url::parse(&settings.base_url)
            .map_err(|err| ClientError::new(FailureKind::InvalidUrl, err.to_string()))?;
        // The backend keys history by session cookie.
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.read_timeout)
            .cookie_store(true)
            .build()
            .map_err(|err| ClientError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { base_url, client })
    }

    fn endpoint(&self, path: &str) -> Result<reqwest::Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|err| ClientError::new(FailureKind::InvalidUrl, err.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response
            .json::<T>()
            .await
            .map_err(|err| ClientError::new(FailureKind::Decode, err.to_string()))
    }
}

#[async_trait::async_trait]
impl Backend for ReqwestBackend {
    async fn fetch_models(&self) -> Result<ModelsResponse, ClientError> {
        self.get_json("/api/models").await
    }

    async fn fetch_history(&self) -> Result<HistoryResponse, ClientError> {
        self.get_json("/api/history").await
    }

    async fn stream_recognize(
        &self,
        run_id: RunId,
        request: &RecognizeRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<RecognizeOutput, ClientError> {
        let url = self.endpoint("/api/stream_recognize")?;
        ocr_info!(
            "Run {} sending {} image(s) to {}",
            run_id,
            request.images.len(),
            url
        );
        let pending = self.client.post(url).json(request).send();
        sink.emit(EngineEvent::RequestSent { run_id });

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::cancelled()),
            result = pending => result.map_err(|err| classify(err, cancel))?,
        };

        if !response.status().is_success() {
            let error = error_from_response(response).await;
            ocr_warn!("Run {} rejected: {}", run_id, error);
            return Err(error);
        }

        let mut events = Box::pin(decode_events(response.bytes_stream()));
        let mut text = TextAccumulator::default();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::cancelled()),
                next = events.next() => next,
            };
            let event = match next {
                None | Some(Ok(StreamEvent::Done)) => break,
                Some(Ok(event)) => event,
                Some(Err(err)) => return Err(classify(err, cancel)),
            };
            match event {
                StreamEvent::ContentDelta(_) | StreamEvent::ReasoningDelta(_) => {
                    text.apply(&event);
                    sink.emit(EngineEvent::Stream { run_id, event });
                }
                StreamEvent::ParseError { line } => {
                    ocr_debug!("Run {} skipped malformed line: {}", run_id, line);
                }
                StreamEvent::UpstreamError(message) => {
                    return Err(ClientError::new(FailureKind::Upstream, message));
                }
                StreamEvent::Done => break,
            }
        }

        let output = text.finish();
        ocr_info!(
            "Run {} finished: {} output chars, {} reasoning chars",
            run_id,
            output.text.len(),
            output.reasoning.len()
        );
        Ok(output)
    }
}

/// An abort shows up as a transport error; the token decides which it was.
fn classify(err: reqwest::Error, cancel: &CancellationToken) -> ClientError {
    if cancel.is_cancelled() {
        return ClientError::cancelled();
    }
    map_reqwest_error(err)
}

fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        return ClientError::new(FailureKind::Timeout, err.to_string());
    }
    ClientError::new(FailureKind::Network, err.to_string())
}

/// Builds the user-facing message for a non-2xx response.
async fn error_from_response(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ClientError::new(
        FailureKind::HttpStatus(status.as_u16()),
        error_message(status, &body),
    )
}

fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error,
            details: Some(details),
        }) if !details.trim().is_empty() => format!("{error} ({})", details.trim()),
        Ok(ErrorBody { error, .. }) if !error.trim().is_empty() => error,
        _ => format!("HTTP error {status}"),
    }
}
