//! Per-session recognition history keyed by the `ocr_session` cookie.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Mutex, MutexGuard};

use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderValue;
use axum::response::{IntoResponseParts, ResponseParts};
use ocr_engine::wire::HistoryEntry;
use ocr_logging::ocr_info;

pub const SESSION_COOKIE: &str = "ocr_session";

/// The caller's session id, minted on first contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    is_new: bool,
}

impl Session {
    fn from_cookie_header(header: Option<&HeaderValue>) -> Self {
        let existing = header
            .and_then(|value| value.to_str().ok())
            .and_then(find_session_cookie);
        match existing {
            Some(id) => Self { id, is_new: false },
            None => Self {
                id: uuid::Uuid::new_v4().simple().to_string(),
                is_new: true,
            },
        }
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }
}

fn find_session_cookie(header: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_cookie_header(parts.headers.get(COOKIE)))
    }
}

impl IntoResponseParts for Session {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if self.is_new {
            let cookie = format!("{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax", self.id);
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                res.headers_mut().append(SET_COOKIE, value);
            }
        }
        Ok(res)
    }
}

#[derive(Debug, Default)]
struct SessionHistory {
    entries: Vec<HistoryEntry>,
    next_id: u64,
    last_used: u64,
}

#[derive(Debug, Default)]
struct SessionMap {
    by_id: HashMap<String, SessionHistory>,
    /// Bumped on every access; orders sessions by recency.
    clock: u64,
}

impl SessionMap {
    fn touch(&mut self, history: &mut SessionHistory) {
        self.clock += 1;
        history.last_used = self.clock;
    }

    fn least_recently_used(&self) -> Option<String> {
        self.by_id
            .iter()
            .min_by_key(|(_, history)| history.last_used)
            .map(|(id, _)| id.clone())
    }
}

/// In-memory history for all sessions. Newest entry first.
///
/// At most `max_sessions` histories are kept; recording for a new session
/// beyond that evicts the one used least recently.
#[derive(Debug)]
pub struct SessionStore {
    limit: usize,
    max_sessions: usize,
    sessions: Mutex<SessionMap>,
}

impl SessionStore {
    pub fn new(limit: usize, max_sessions: usize) -> Self {
        Self {
            limit,
            max_sessions: max_sessions.max(1),
            sessions: Mutex::new(SessionMap::default()),
        }
    }

    pub fn history(&self, session_id: &str) -> Vec<HistoryEntry> {
        let mut sessions = self.lock();
        let Some(mut history) = sessions.by_id.remove(session_id) else {
            return Vec::new();
        };
        sessions.touch(&mut history);
        let entries = history.entries.clone();
        sessions.by_id.insert(session_id.to_string(), history);
        entries
    }

    pub fn record(&self, session_id: &str, text: impl Into<String>) -> HistoryEntry {
        let time = chrono::Local::now().format("%H:%M:%S").to_string();
        self.record_at(session_id, time, text.into())
    }

    fn record_at(&self, session_id: &str, time: String, text: String) -> HistoryEntry {
        let mut sessions = self.lock();
        let mut history = match sessions.by_id.remove(session_id) {
            Some(history) => history,
            None => {
                if sessions.by_id.len() >= self.max_sessions {
                    if let Some(evicted) = sessions.least_recently_used() {
                        sessions.by_id.remove(&evicted);
                        ocr_info!("Evicted history of idle session {}", evicted);
                    }
                }
                SessionHistory::default()
            }
        };

        let entry = HistoryEntry {
            id: history.next_id,
            time,
            text,
        };
        history.next_id += 1;
        history.entries.insert(0, entry.clone());
        history.entries.truncate(self.limit);
        sessions.touch(&mut history);
        sessions.by_id.insert(session_id.to_string(), history);
        entry
    }

    pub fn len(&self) -> usize {
        self.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, SessionMap> {
        // History is plain data; a panic elsewhere cannot leave it half-written.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
