//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # Fail-fast
//! `build()` はソケットを bind する前に不完全な設定を拒否する:
//! - backend 未設定
//! - sweep 間隔が 0
//! - 画像ディレクトリを作成できない

use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::app::http::{self, AppState};
use crate::app::sweep_loop::{DEFAULT_SWEEP_INTERVAL, SweepHandle, SweepLoop};
use crate::app::translator::Translator;
use crate::domain::StoreError;
use crate::impls::{EphemeralConfig, EphemeralStore, PersistentStore};
use crate::ports::{ArtifactStore, ImageBackend};

/// Which artifact backend to run. Chosen once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Ephemeral(EphemeralConfig),
    Persistent { path: PathBuf },
}

impl StoreConfig {
    /// An empty path selects the ephemeral backend.
    pub fn from_path_or(path: Option<PathBuf>, ephemeral: EphemeralConfig) -> Self {
        match path.filter(|p| !p.as_os_str().is_empty()) {
            Some(path) => StoreConfig::Persistent { path },
            None => StoreConfig::Ephemeral(ephemeral),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Ephemeral(EphemeralConfig::default())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no image backend configured")]
    MissingBackend,

    #[error("sweep interval must be greater than zero")]
    ZeroSweepInterval,

    #[error("failed to open artifact store: {0}")]
    Store(#[from] StoreError),
}

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new()
///     .store(StoreConfig::Persistent { path: "/var/lib/imgbridge".into() })
///     .backend(Arc::new(HyperbolicBackend::new(DEFAULT_UPSTREAM_URL, None)?))
///     .build()
///     .await?;
/// ```
pub struct AppBuilder {
    store: StoreConfig,
    sweep_interval: Duration,
    backend: Option<Arc<dyn ImageBackend>>,
    base_url: Option<String>,
    scheme: String,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            store: StoreConfig::default(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            backend: None,
            base_url: None,
            scheme: "http".to_string(),
        }
    }

    pub fn store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    pub fn sweep_interval(mut self, every: Duration) -> Self {
        self.sweep_interval = every;
        self
    }

    pub fn backend(mut self, backend: Arc<dyn ImageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Opens the store, starts the sweep when the store is ephemeral and
    /// assembles the router.
    pub async fn build(self) -> Result<App, BuildError> {
        let backend = self.backend.ok_or(BuildError::MissingBackend)?;
        if self.sweep_interval.is_zero() {
            return Err(BuildError::ZeroSweepInterval);
        }

        let (store, sweep): (Arc<dyn ArtifactStore>, Option<SweepHandle>) = match self.store {
            StoreConfig::Ephemeral(config) => {
                let store = Arc::new(EphemeralStore::new(config));
                let sweep = SweepLoop::new(store.clone(), self.sweep_interval).spawn();
                info!(
                    ttl_secs = config.ttl.as_secs(),
                    max_bytes = config.max_bytes,
                    "Using in-memory image cache"
                );
                (store as Arc<dyn ArtifactStore>, Some(sweep))
            }
            StoreConfig::Persistent { path } => {
                let store = PersistentStore::open(path).await?;
                (Arc::new(store) as Arc<dyn ArtifactStore>, None)
            }
        };

        let translator = Arc::new(Translator::new(backend, store.clone()));
        let state = AppState::new(translator)
            .with_scheme(self.scheme)
            .with_base_url(self.base_url);

        Ok(App {
            router: http::router(state),
            store,
            sweep,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A wired application: the router to serve plus what must be stopped afterwards.
pub struct App {
    pub router: Router,
    pub store: Arc<dyn ArtifactStore>,
    sweep: Option<SweepHandle>,
}

impl App {
    pub fn has_sweep(&self) -> bool {
        self.sweep.is_some()
    }

    /// Stops background work. Call after the server has drained.
    pub async fn shutdown(self) {
        if let Some(sweep) = self.sweep {
            sweep.shutdown().await;
        }
    }
}
