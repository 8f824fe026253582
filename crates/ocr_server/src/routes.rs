use std::pin::Pin;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::{BufMut, Bytes, BytesMut};
use futures_util::{stream, Stream, StreamExt};
use ocr_engine::wire::{HistoryResponse, ModelsResponse, RecognizeRequest, RecognizeResponse};
use ocr_engine::{decode_line, strip_box_markers, LineBuffer, StreamEvent, TextAccumulator};
use ocr_logging::{ocr_debug, ocr_info, ocr_warn};
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::session::{Session, SessionStore};
use crate::upstream::UpstreamClient;

/// Shared by all handlers.
#[derive(Clone)]
pub struct ServerState {
    config: Arc<ServerConfig>,
    sessions: Arc<SessionStore>,
    upstream: UpstreamClient,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Result<Self, reqwest::Error> {
        let upstream = UpstreamClient::new(&config)?;
        Ok(Self {
            sessions: Arc::new(SessionStore::new(config.history_limit, config.max_sessions)),
            config: Arc::new(config),
            upstream,
        })
    }
}

pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/api/models", get(list_models))
        .route("/api/history", get(session_history))
        .route("/api/recognize", post(recognize))
        .route("/api/stream_recognize", post(stream_recognize))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn list_models(State(state): State<ServerState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.config.models.clone(),
        default_model: state.config.default_model.clone(),
        enable_reasoning_by_default: state.config.enable_reasoning_by_default,
    })
}

async fn session_history(
    State(state): State<ServerState>,
    session: Session,
) -> (Session, Json<HistoryResponse>) {
    let history = state.sessions.history(&session.id);
    (session, Json(HistoryResponse { history }))
}

/// Parses the body by hand so a missing or malformed body gets the same
/// `{error}` shape as the other validation failures.
fn parse_request(body: &[u8]) -> Result<RecognizeRequest, ApiError> {
    let request: Option<RecognizeRequest> =
        serde_json::from_slice(body).map_err(|_| ApiError::NoData)?;
    let request = request.ok_or(ApiError::NoData)?;
    if request.images.is_empty() {
        return Err(ApiError::NoImages);
    }
    Ok(request)
}

async fn recognize(
    State(state): State<ServerState>,
    session: Session,
    body: Bytes,
) -> Result<(Session, Json<RecognizeResponse>), ApiError> {
    let request = parse_request(&body)?;
    let chat = state.upstream.chat_request(&request, false);
    let response = state.upstream.send(&chat).await?;
    let completion = response
        .json::<crate::upstream::ChatCompletion>()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let text = strip_box_markers(&completion.into_text()?).to_string();
    state.sessions.record(&session.id, text.clone());
    Ok((
        session,
        Json(RecognizeResponse {
            success: true,
            text,
            model_used: chat.model,
        }),
    ))
}

async fn stream_recognize(
    State(state): State<ServerState>,
    session: Session,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = parse_request(&body)?;
    let chat = state.upstream.chat_request(&request, true);
    let response = state.upstream.send(&chat).await?;

    let relay = Relay::new(state.sessions.clone(), session.id.clone());
    let body = Body::from_stream(relay.into_stream(response.bytes_stream()));
    Ok((
        session,
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}

/// Forwards upstream lines verbatim while decoding them on the side, so the
/// final text can be recorded in the session history.
struct Relay {
    lines: LineBuffer,
    text: TextAccumulator,
    sessions: Arc<SessionStore>,
    session_id: String,
    /// Set once `[DONE]` or an upstream error is seen.
    settled: bool,
    failed: bool,
}

impl Relay {
    fn new(sessions: Arc<SessionStore>, session_id: String) -> Self {
        Self {
            lines: LineBuffer::default(),
            text: TextAccumulator::default(),
            sessions,
            session_id,
            settled: false,
            failed: false,
        }
    }

    /// Decodes `lines` and renders them back as newline-terminated output.
    fn forward(&mut self, lines: Vec<String>) -> Bytes {
        let mut out = BytesMut::new();
        for line in lines {
            if !self.settled {
                for event in decode_line(&line) {
                    match event {
                        StreamEvent::Done => self.settle(),
                        StreamEvent::UpstreamError(message) => {
                            ocr_warn!("Upstream reported an error mid-stream: {}", message);
                            self.failed = true;
                            self.settled = true;
                        }
                        StreamEvent::ParseError { line } => {
                            ocr_debug!("Relaying undecodable line: {}", line);
                        }
                        delta => self.text.apply(&delta),
                    }
                }
            }
            out.put_slice(line.as_bytes());
            out.put_u8(b'\n');
        }
        out.freeze()
    }

    fn settle(&mut self) {
        if self.settled {
            return;
        }
        self.settled = true;
        let text = std::mem::take(&mut self.text).finish().text;
        if self.failed || text.is_empty() {
            return;
        }
        let entry = self.sessions.record(&self.session_id, text);
        ocr_info!(
            "Recorded history entry {} for session {}",
            entry.id,
            self.session_id
        );
    }

    fn into_stream<S>(self, upstream: S) -> impl Stream<Item = Result<Bytes, reqwest::Error>>
    where
        S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    {
        let upstream: Pin<Box<S>> = Box::pin(upstream);
        stream::unfold(Some((self, upstream)), |state| async move {
            let (mut relay, mut upstream) = state?;
            loop {
                match upstream.next().await {
                    Some(Ok(chunk)) => {
                        let lines = relay.lines.push(&chunk);
                        let out = relay.forward(lines);
                        if !out.is_empty() {
                            return Some((Ok(out), Some((relay, upstream))));
                        }
                    }
                    Some(Err(err)) => {
                        ocr_warn!("Upstream stream broke off: {}", err);
                        return Some((Err(err), None));
                    }
                    None => {
                        let lines = relay.lines.finish();
                        let out = relay.forward(lines);
                        relay.settle();
                        return (!out.is_empty()).then_some((Ok(out), None));
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_null_bodies_are_rejected_as_no_data() {
        assert!(matches!(parse_request(b""), Err(ApiError::NoData)));
        assert!(matches!(parse_request(b"null"), Err(ApiError::NoData)));
        assert!(matches!(parse_request(b"{not json"), Err(ApiError::NoData)));
        assert!(matches!(parse_request(b"{}"), Err(ApiError::NoImages)));
        assert!(matches!(
            parse_request(br#"{"images": []}"#),
            Err(ApiError::NoImages)
        ));
        assert!(parse_request(br#"{"images": ["data:x"]}"#).is_ok());
    }

    #[test]
    fn relay_records_text_once_on_done() {
        let sessions = Arc::new(SessionStore::new(50, 10));
        let mut relay = Relay::new(sessions.clone(), "s".to_string());
        let out = relay.forward(vec![
            r#"data: {"choices":[{"delta":{"content":"<|begin_of_box|>Hi<|end_of_box|>"}}]}"#
                .to_string(),
            "data: [DONE]".to_string(),
        ]);
        assert!(out.ends_with(b"data: [DONE]\n"));
        relay.settle();

        let history = sessions.history("s");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "Hi");
    }

    #[test]
    fn relay_skips_history_after_upstream_error() {
        let sessions = Arc::new(SessionStore::new(50, 10));
        let mut relay = Relay::new(sessions.clone(), "s".to_string());
        relay.forward(vec![
            r#"data: {"choices":[{"delta":{"content":"partial"}}]}"#.to_string(),
            r#"data: {"error":{"message":"overloaded"}}"#.to_string(),
        ]);
        relay.settle();
        assert!(sessions.history("s").is_empty());
    }
}
