//! EphemeralStore - TTL 付きのインメモリ artifact store
//!
//! # 実装詳細
//! - `HashMap<ArtifactId, ArtifactRecord>` を 1 つの `tokio::sync::Mutex` で保護
//! - `put` / `get` / `sweep` はクリティカルセクションの間ロックを保持する。
//!   画像のデコードはロック取得前に行う
//! - 時刻は注入された `Clock`、id は注入された `IdGenerator` から取得

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{ArtifactHandle, ArtifactId, ArtifactPayload, ArtifactRecord, StoreError};
use crate::impls::image_format;
use crate::ports::{ArtifactStore, Clock, IdGenerator, RandomHexGenerator, SystemClock};

/// Default time a record stays fetchable.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EphemeralConfig {
    pub ttl: Duration,

    /// Aggregate payload bound in bytes. `None` means unbounded.
    pub max_bytes: Option<u64>,
}

impl EphemeralConfig {
    /// Converts a megabyte bound as found in configuration; `0` disables the bound.
    pub fn with_max_megabytes(ttl: Duration, max_mb: u64) -> Self {
        let max_bytes = (max_mb > 0).then(|| max_mb.saturating_mul(1024 * 1024));
        Self { ttl, max_bytes }
    }
}

impl Default for EphemeralConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_bytes: None,
        }
    }
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records removed because their TTL had elapsed.
    pub expired: usize,

    /// Live records removed to get back under the size bound.
    pub evicted: usize,

    /// Records left after the pass.
    pub remaining: usize,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.expired + self.evicted
    }
}

/// EphemeralStore は TTL 付きで画像をメモリに保持
pub struct EphemeralStore {
    records: Mutex<HashMap<ArtifactId, ArtifactRecord>>,
    config: EphemeralConfig,
    clock: Arc<dyn Clock>,
    id_gen: Arc<dyn IdGenerator>,
}

impl EphemeralStore {
    pub fn new(config: EphemeralConfig) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            config,
            clock: Arc::new(SystemClock),
            id_gen: Arc::new(RandomHexGenerator),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, id_gen: Arc<dyn IdGenerator>) -> Self {
        self.id_gen = id_gen;
        self
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::from_std(self.config.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Drops lapsed records, then enforces the size bound oldest-first.
    pub async fn sweep(&self) -> SweepReport {
        let mut records = self.records.lock().await;
        let now = self.clock.now();

        let before = records.len();
        records.retain(|id, record| {
            let live = record.is_live_at(now);
            if !live {
                debug!(%id, "Removed expired image from cache");
            }
            live
        });
        let expired = before - records.len();

        let mut evicted = 0;
        if let Some(max_bytes) = self.config.max_bytes {
            let mut total: u64 = records.values().map(|r| r.inline_len() as u64).sum();
            if total > max_bytes {
                let mut by_age: Vec<(DateTime<Utc>, ArtifactId, u64)> = records
                    .values()
                    .map(|r| (r.created_at, r.id.clone(), r.inline_len() as u64))
                    .collect();
                by_age.sort();

                for (_, id, len) in by_age {
                    if total <= max_bytes {
                        break;
                    }
                    records.remove(&id);
                    total -= len;
                    evicted += 1;
                    debug!(%id, "Evicted image to honour store size bound");
                }
            }
        }

        SweepReport {
            expired,
            evicted,
            remaining: records.len(),
        }
    }
}

#[async_trait]
impl ArtifactStore for EphemeralStore {
    async fn put(
        &self,
        image: Vec<u8>,
        _prompt: Option<&str>,
    ) -> Result<ArtifactHandle, StoreError> {
        let image = tokio::task::spawn_blocking(move || {
            image_format::probe(&image)?;
            Ok::<_, StoreError>(image)
        })
        .await
        .map_err(|e| StoreError::Decode(format!("decode task failed: {e}")))??;

        let mut records = self.records.lock().await;
        let id = self.id_gen.generate().inspect_err(|err| {
            warn!(error = %err, "Failed to generate unique ID");
        })?;
        let now = self.clock.now();
        let record = ArtifactRecord::inline(id.clone(), image, now, self.expiry_from(now));
        records.insert(id.clone(), record);

        info!(%id, "Stored image in cache");
        Ok(ArtifactHandle { id, path: None })
    }

    async fn get(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let Ok(key) = id.parse::<ArtifactId>() else {
            warn!(id, "Image not found in cache");
            return Err(StoreError::NotFound(id.to_string()));
        };

        let mut records = self.records.lock().await;
        let Some(record) = records.get(&key) else {
            warn!(id, "Image not found in cache");
            return Err(StoreError::NotFound(id.to_string()));
        };

        if !record.is_live_at(self.clock.now()) {
            records.remove(&key);
            warn!(id, "Image expired in cache");
            return Err(StoreError::Expired(id.to_string()));
        }

        match &record.payload {
            ArtifactPayload::Inline(bytes) => {
                info!(id, "Retrieved image from cache");
                Ok(bytes.clone())
            }
            ArtifactPayload::Files { .. } => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    fn kind(&self) -> &'static str {
        "ephemeral"
    }
}
