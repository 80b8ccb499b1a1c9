//! ImageBackend port - 実際に画像を生成するプロバイダ

use async_trait::async_trait;

use crate::domain::{BackendRequest, BackendResponse, TranslateError};

/// Request headers forwarded to the backend, in arrival order.
pub type ForwardHeaders = Vec<(String, String)>;

/// One call per inbound generation request. No retries.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate(
        &self,
        request: &BackendRequest,
        headers: &ForwardHeaders,
    ) -> Result<BackendResponse, TranslateError>;
}
