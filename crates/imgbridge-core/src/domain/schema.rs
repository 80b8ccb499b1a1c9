//! Schema - 2 種類の JSON 形式
//!
//! - 外部（クライアント向け）: OpenAI images API 形式
//! - backend: Hyperbolic の image generation API 形式

use serde::{Deserialize, Serialize};

/// Inbound generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
}

/// Value of `response_format` that selects inline delivery.
pub const RESPONSE_FORMAT_B64_JSON: &str = "b64_json";

impl GenerationRequest {
    pub fn wants_inline(&self) -> bool {
        self.response_format.as_deref() == Some(RESPONSE_FORMAT_B64_JSON)
    }
}

/// Outbound request to the backend provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendRequest {
    pub model_name: String,
    pub prompt: String,
    pub height: u32,
    pub width: u32,
    pub backend: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    pub images: Vec<BackendImage>,

    #[serde(default)]
    pub inference_time: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendImage {
    #[serde(default)]
    pub index: i64,

    /// Base64 encoded image.
    pub image: String,

    #[serde(default)]
    pub random_seed: i64,
}

/// Reply to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub created: i64,
    pub data: Vec<GeneratedImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b64_json: Option<String>,
}
