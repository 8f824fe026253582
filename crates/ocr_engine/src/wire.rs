//! JSON bodies exchanged between the client and the backend.
use serde::{Deserialize, Deserializer, Serialize};

/// Reasoning support of a model as advertised by `/api/models`.
///
/// Serialised as `"true"`, `"false"` or `"default"`. Plain JSON booleans are
/// accepted when reading hand-written config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "RawReasoningFlag")]
pub enum ReasoningFlag {
    /// Supported; the user decides.
    #[default]
    True,
    /// Not supported; always sent as disabled.
    False,
    /// Always on; always sent as enabled.
    Default,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawReasoningFlag {
    Bool(bool),
    Text(String),
}

impl TryFrom<RawReasoningFlag> for ReasoningFlag {
    type Error = String;

    fn try_from(raw: RawReasoningFlag) -> Result<Self, Self::Error> {
        match raw {
            RawReasoningFlag::Bool(true) => Ok(ReasoningFlag::True),
            RawReasoningFlag::Bool(false) => Ok(ReasoningFlag::False),
            RawReasoningFlag::Text(text) => match text.to_ascii_lowercase().as_str() {
                "true" => Ok(ReasoningFlag::True),
                "false" => Ok(ReasoningFlag::False),
                "default" => Ok(ReasoningFlag::Default),
                other => Err(format!("unknown supports_reasoning value {other:?}")),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub supports_reasoning: ReasoningFlag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelEntry>,
    #[serde(default)]
    pub default_model: String,
    #[serde(default = "default_true", deserialize_with = "flexible_bool")]
    pub enable_reasoning_by_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub time: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
}

/// Body of `POST /api/recognize` and `POST /api/stream_recognize`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecognizeRequest {
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_reasoning: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizeResponse {
    pub success: bool,
    pub text: String,
    pub model_used: String,
}

/// Error body returned with every non-2xx backend response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Accepts `true`, `"true"` and friends.
pub fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bool(value) => Ok(value),
        Raw::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean, got {other:?}"
            ))),
        },
    }
}
