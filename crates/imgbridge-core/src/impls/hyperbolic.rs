//! HyperbolicBackend - reqwest による HTTP 版 `ImageBackend`

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::{BackendRequest, BackendResponse, TranslateError};
use crate::ports::{ForwardHeaders, ImageBackend};

pub const DEFAULT_UPSTREAM_URL: &str = "https://api.hyperbolic.xyz/v1/image/generation";

/// Headers that describe the inbound hop and must not be forwarded.
const HOP_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "transfer-encoding",
    "accept-encoding",
];

pub struct HyperbolicBackend {
    client: reqwest::Client,
    url: String,
}

impl HyperbolicBackend {
    /// `timeout` bounds the whole outbound call; `None` waits indefinitely.
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, TranslateError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn forwardable(headers: &ForwardHeaders) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        if HOP_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            _ => debug!(header = %name, "Skipping header that cannot be forwarded"),
        }
    }
    map
}

#[async_trait]
impl ImageBackend for HyperbolicBackend {
    async fn generate(
        &self,
        request: &BackendRequest,
        headers: &ForwardHeaders,
    ) -> Result<BackendResponse, TranslateError> {
        let response = self
            .client
            .post(&self.url)
            .headers(forwardable(headers))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Backend rejected image generation");
            return Err(TranslateError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<BackendResponse>().await?)
    }
}
