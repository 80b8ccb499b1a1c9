//! ArtifactStore port - 生成直後の画像を後で取得できるよう保持
//!
//! # 実装
//! - **EphemeralStore**: TTL とサイズ上限付きのプロセス内 map
//! - **PersistentStore**: ディスク上の 1 ディレクトリ、期限なし
//!
//! backend は起動時に 1 つ選び、すべてのリクエストハンドラで共有する。

use async_trait::async_trait;

use crate::domain::{ArtifactHandle, StoreError};

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores an encoded image and returns its new id.
    ///
    /// Fails with `StoreError::Decode` when `image` is not a supported
    /// encoding. `prompt` is kept next to the image by backends that persist it.
    async fn put(&self, image: Vec<u8>, prompt: Option<&str>)
    -> Result<ArtifactHandle, StoreError>;

    /// Returns the stored bytes for `id`.
    ///
    /// Unknown (or malformed) ids fail with `StoreError::NotFound`. The
    /// ephemeral backend fails a lapsed id with `StoreError::Expired` once and
    /// forgets it.
    async fn get(&self, id: &str) -> Result<Vec<u8>, StoreError>;

    /// Number of records currently held.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Short backend name for logs and health output.
    fn kind(&self) -> &'static str;
}
