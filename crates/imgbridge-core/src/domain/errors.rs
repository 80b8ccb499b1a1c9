//! Errors - エラー型と分類
//!
//! - `StoreError`: artifact store と id 生成のエラー
//! - `TranslateError`: 受信リクエストから返信までのエラー。URL 配信の失敗は
//!   `StoreError` をラップする

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("artifact expired: {0}")]
    Expired(String),

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("artifact io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to generate artifact id: {0}")]
    IdGeneration(String),
}

impl From<image::ImageError> for StoreError {
    fn from(err: image::ImageError) -> Self {
        StoreError::Decode(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("backend returned {status}")]
    Upstream { status: u16, body: String },

    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode backend image: {0}")]
    Decode(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<base64::DecodeError> for TranslateError {
    fn from(err: base64::DecodeError) -> Self {
        TranslateError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert_into_store_errors() {
        let err: StoreError = std::io::Error::other("disk full").into();
        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(err.to_string(), "artifact io failed: disk full");
    }

    #[test]
    fn store_errors_are_transparent_inside_translate_errors() {
        let err: TranslateError = StoreError::NotFound("abc".into()).into();
        assert_eq!(err.to_string(), "artifact not found: abc");
    }
}
