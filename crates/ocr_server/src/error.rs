use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ocr_engine::wire::ErrorBody;
use ocr_logging::{ocr_error, ocr_warn};

/// Characters of an upstream error body echoed back as `details`.
const DETAILS_LIMIT: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No data provided")]
    NoData,
    #[error("No images provided")]
    NoImages,
    #[error("API error: {status}")]
    Upstream { status: u16, details: String },
    #[error("API timeout")]
    Timeout,
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn upstream(status: u16, body: &str) -> Self {
        ApiError::Upstream {
            status,
            details: body.chars().take(DETAILS_LIMIT).collect(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoData | ApiError::NoImages => StatusCode::BAD_REQUEST,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Upstream { .. } | ApiError::Request(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Request(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Upstream { details, .. } => ocr_error!("{}: {}", self, details),
            _ if status.is_server_error() => ocr_error!("{}", self),
            _ => ocr_warn!("Rejected request: {}", self),
        }
        let details = match &self {
            ApiError::Upstream { details, .. } => Some(details.clone()),
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}
