//! Artifact - store が保持し、返却するもの

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use super::ids::ArtifactId;

/// Where an artifact's bytes live.
///
/// Each backend uses exactly one variant; they are never mixed within a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactPayload {
    /// Raw image bytes held in process memory (ephemeral backend).
    Inline(Vec<u8>),

    /// Re-encoded image on disk plus the sibling prompt file (persistent backend).
    Files {
        image: PathBuf,
        prompt: Option<PathBuf>,
    },
}

/// The unit held by an artifact store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub id: ArtifactId,
    pub payload: ArtifactPayload,
    pub created_at: DateTime<Utc>,

    /// Only set by the ephemeral backend.
    pub expires_at: Option<DateTime<Utc>>,
}

impl ArtifactRecord {
    pub fn inline(
        id: ArtifactId,
        bytes: Vec<u8>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            payload: ArtifactPayload::Inline(bytes),
            created_at,
            expires_at: Some(expires_at),
        }
    }

    pub fn files(
        id: ArtifactId,
        image: PathBuf,
        prompt: Option<PathBuf>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            payload: ArtifactPayload::Files { image, prompt },
            created_at,
            expires_at: None,
        }
    }

    /// A record is live while `now < expires_at`. Records without an expiry never lapse.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }

    /// Bytes counted against the ephemeral size bound.
    pub fn inline_len(&self) -> usize {
        match &self.payload {
            ArtifactPayload::Inline(bytes) => bytes.len(),
            ArtifactPayload::Files { .. } => 0,
        }
    }
}

/// Returned by `ArtifactStore::put`.
///
/// `path` is only populated by the persistent backend, where it names the
/// committed image file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    pub id: ArtifactId,
    pub path: Option<PathBuf>,
}
