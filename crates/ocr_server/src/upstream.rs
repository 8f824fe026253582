//! Chat-completions requests to the upstream vision model provider.

use ocr_engine::wire::RecognizeRequest;
use ocr_logging::ocr_info;
use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;
use crate::error::ApiError;

/// Text part sent when the user left the prompt empty.
pub const DEFAULT_PROMPT: &str = "Extract text";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System { content: String },
    User { content: Vec<ContentPart> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasoningOptions {
    pub enabled: bool,
}

/// Non-streaming completion; only the first choice is read.
#[derive(Debug, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletion {
    pub fn into_text(self) -> Result<String, ApiError> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| ApiError::Internal("upstream response has no choices".to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    http_referer: String,
    x_title: String,
    system_prompt: String,
    default_model: String,
    reasoning_by_default: bool,
}

impl UpstreamClient {
    pub fn new(config: &ServerConfig) -> Result<Self, reqwest::Error> {
        // Per-read timeout so long streams are not cut off as a whole.
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .read_timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            url: config.upstream_url.clone(),
            api_key: config.api_key.clone(),
            http_referer: config.http_referer.clone(),
            x_title: config.x_title.clone(),
            system_prompt: config.system_prompt.clone(),
            default_model: config.default_model.clone(),
            reasoning_by_default: config.enable_reasoning_by_default,
        })
    }

    /// Builds the chat body, filling in configured defaults.
    pub fn chat_request(&self, request: &RecognizeRequest, stream: bool) -> ChatRequest {
        let model = request
            .model
            .clone()
            .filter(|model| !model.is_empty())
            .unwrap_or_else(|| self.default_model.clone());
        let prompt = if request.prompt.is_empty() {
            DEFAULT_PROMPT.to_string()
        } else {
            request.prompt.clone()
        };

        let mut content = Vec::with_capacity(request.images.len() + 1);
        content.push(ContentPart::Text { text: prompt });
        content.extend(request.images.iter().map(|url| ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.clone() },
        }));

        let reasoning = request
            .enable_reasoning
            .unwrap_or(self.reasoning_by_default)
            .then_some(ReasoningOptions { enabled: true });

        ChatRequest {
            model,
            messages: vec![
                ChatMessage::System {
                    content: self.system_prompt.clone(),
                },
                ChatMessage::User { content },
            ],
            stream,
            reasoning,
        }
    }

    /// Sends the request; anything but a 2xx becomes `ApiError::Upstream`.
    pub async fn send(&self, body: &ChatRequest) -> Result<reqwest::Response, ApiError> {
        ocr_info!(
            "Sending {} request to upstream with model: {}",
            if body.stream { "streaming" } else { "blocking" },
            body.model
        );
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.http_referer)
            .header("X-Title", &self.x_title)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::upstream(status.as_u16(), &text));
        }
        Ok(response)
    }
}
