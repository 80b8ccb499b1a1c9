//! Translator - 外部の画像 API を backend プロバイダに変換
//!
//! # フロー
//! 1. 受信リクエストを検証し、backend 用に組み替える
//! 2. backend を 1 回だけ呼ぶ（リトライなし）
//! 3. レスポンスを組み替える。URL 形式では画像を artifact store に置く

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::sync::Arc;
use tracing::info;

use crate::domain::{
    BackendRequest, BackendResponse, GeneratedImage, GenerationRequest, GenerationResponse,
    TranslateError,
};
use crate::ports::{ArtifactStore, Clock, ForwardHeaders, ImageBackend, SystemClock};

pub const DEFAULT_WIDTH: u32 = 1024;
pub const DEFAULT_HEIGHT: u32 = 1024;
pub const BACKEND_AUTO: &str = "auto";

/// Parses `"<width>x<height>"`. Absent sizes default to 1024x1024.
pub fn parse_size(size: Option<&str>) -> Result<(u32, u32), TranslateError> {
    let Some(size) = size else {
        return Ok((DEFAULT_WIDTH, DEFAULT_HEIGHT));
    };
    let invalid = || TranslateError::Validation(format!("invalid size {size:?}, expected WIDTHxHEIGHT"));

    let (width, height) = size.split_once('x').ok_or_else(invalid)?;
    let width: u32 = width.parse().map_err(|_| invalid())?;
    let height: u32 = height.parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}

/// Builds the backend request, rejecting anything the backend cannot honour.
pub fn to_backend_request(request: &GenerationRequest) -> Result<BackendRequest, TranslateError> {
    if let Some(n) = request.n
        && n != 1
    {
        return Err(TranslateError::Validation("n must be 1".to_string()));
    }
    let (width, height) = parse_size(request.size.as_deref())?;

    Ok(BackendRequest {
        model_name: request.model.clone(),
        prompt: request.prompt.clone(),
        height,
        width,
        backend: BACKEND_AUTO.to_string(),
    })
}

/// Translator は外部リクエストを backend 呼び出しと artifact 保存に変換
///
/// # 状態
/// - 自身は状態を持たない。保存は `ArtifactStore` に任せる
pub struct Translator {
    backend: Arc<dyn ImageBackend>,
    store: Arc<dyn ArtifactStore>,
    clock: Arc<dyn Clock>,
}

impl Translator {
    pub fn new(backend: Arc<dyn ImageBackend>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            backend,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Runs one generation request end to end.
    ///
    /// `base_url` prefixes fetch URLs for artifacts held by the ephemeral store.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        headers: &ForwardHeaders,
        base_url: &str,
    ) -> Result<GenerationResponse, TranslateError> {
        let backend_request = to_backend_request(request)?;
        let response = self.backend.generate(&backend_request, headers).await?;
        info!(
            images = response.images.len(),
            inference_time = response.inference_time,
            "Backend generated images"
        );
        self.to_external(response, request, base_url).await
    }

    async fn to_external(
        &self,
        response: BackendResponse,
        request: &GenerationRequest,
        base_url: &str,
    ) -> Result<GenerationResponse, TranslateError> {
        let mut data = Vec::with_capacity(response.images.len());

        for image in response.images {
            if request.wants_inline() {
                data.push(GeneratedImage {
                    b64_json: Some(image.image),
                    ..Default::default()
                });
                continue;
            }

            let bytes = BASE64.decode(image.image.trim())?;
            let handle = self.store.put(bytes, Some(&request.prompt)).await?;
            let url = match handle.path {
                Some(path) => path.display().to_string(),
                None => format!("{}/images/{}", base_url.trim_end_matches('/'), handle.id),
            };
            data.push(GeneratedImage {
                url: Some(url),
                ..Default::default()
            });
        }

        Ok(GenerationResponse {
            created: self.clock.now().timestamp(),
            data,
        })
    }
}
