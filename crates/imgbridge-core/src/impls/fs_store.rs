//! PersistentStore - ファイルシステム上の artifact store（期限なし）
//!
//! # レイアウト
//! - `<base>/<id>.png`: PNG に再エンコードした画像
//! - `<base>/<id>.txt`: 生成に使った prompt（指定があった場合のみ）
//!
//! # コミット手順
//! 両ファイルをまず `*.tmp` として書き、prompt → 画像の順に rename する。
//! 途中で失敗したら作成したファイルをすべて削除するので、prompt のない画像は見えない。
//!
//! 検索は id → レコードのメモリ上の index で行う。index は open 時に `<base>` を
//! 1 回走査して再構築する。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::domain::{ArtifactHandle, ArtifactId, ArtifactPayload, ArtifactRecord, StoreError};
use crate::impls::image_format::{self, CANONICAL_FORMAT};
use crate::ports::{ArtifactStore, IdGenerator, RandomHexGenerator};

const PROMPT_EXT: &str = "txt";
const TMP_SUFFIX: &str = ".tmp";

/// PersistentStore は画像と prompt をディレクトリに保存
pub struct PersistentStore {
    base: PathBuf,
    index: RwLock<HashMap<ArtifactId, ArtifactRecord>>,
    id_gen: Arc<dyn IdGenerator>,
}

impl PersistentStore {
    /// Creates `base` if needed and indexes the artifacts already in it.
    pub async fn open(base: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base = base.into();
        tokio::fs::create_dir_all(&base).await?;
        let index = scan(&base).await?;
        info!(path = %base.display(), artifacts = index.len(), "Opened image store");

        Ok(Self {
            base,
            index: RwLock::new(index),
            id_gen: Arc::new(RandomHexGenerator),
        })
    }

    pub fn with_id_generator(mut self, id_gen: Arc<dyn IdGenerator>) -> Self {
        self.id_gen = id_gen;
        self
    }

    fn image_path(&self, id: &ArtifactId) -> PathBuf {
        self.base
            .join(format!("{id}.{}", image_format::extension_of(CANONICAL_FORMAT)))
    }

    fn prompt_path(&self, id: &ArtifactId) -> PathBuf {
        self.base.join(format!("{id}.{PROMPT_EXT}"))
    }

    /// Writes both files under temporary names and renames them into place.
    async fn commit(
        &self,
        image: &[u8],
        image_path: &Path,
        prompt: Option<(&str, &Path)>,
    ) -> io::Result<()> {
        let image_tmp = tmp_path(image_path);
        let prompt_tmp = prompt.map(|(_, path)| tmp_path(path));
        let mut created: Vec<PathBuf> = Vec::new();

        let result = async {
            created.push(image_tmp.clone());
            tokio::fs::write(&image_tmp, image).await?;

            if let (Some((text, path)), Some(tmp)) = (prompt, &prompt_tmp) {
                created.push(tmp.clone());
                tokio::fs::write(tmp, text).await?;
                tokio::fs::rename(tmp, path).await?;
                created.push(path.to_path_buf());
            }

            tokio::fs::rename(&image_tmp, image_path).await
        }
        .await;

        if result.is_err() {
            for path in &created {
                if let Err(err) = tokio::fs::remove_file(path).await
                    && err.kind() != io::ErrorKind::NotFound
                {
                    error!(path = %path.display(), error = %err, "Failed to roll back partial write");
                }
            }
        }
        result
    }
}

#[async_trait]
impl ArtifactStore for PersistentStore {
    async fn put(
        &self,
        image: Vec<u8>,
        prompt: Option<&str>,
    ) -> Result<ArtifactHandle, StoreError> {
        let encoded = tokio::task::spawn_blocking(move || {
            let probed = image_format::probe(&image)?;
            image_format::canonical_png(&probed.image)
        })
        .await
        .map_err(|e| StoreError::Decode(format!("decode task failed: {e}")))??;

        let id = self.id_gen.generate().inspect_err(|err| {
            warn!(error = %err, "Failed to generate unique ID");
        })?;
        let image_path = self.image_path(&id);
        let prompt_path = prompt.map(|_| self.prompt_path(&id));

        self.commit(
            &encoded,
            &image_path,
            prompt.zip(prompt_path.as_deref()),
        )
        .await
        .inspect_err(|err| {
            error!(%id, error = %err, "Failed to store image");
        })?;

        let record = ArtifactRecord::files(
            id.clone(),
            image_path.clone(),
            prompt_path,
            Utc::now(),
        );
        self.index.write().await.insert(id.clone(), record);

        info!(path = %image_path.display(), "Stored image");
        Ok(ArtifactHandle {
            id,
            path: Some(image_path),
        })
    }

    async fn get(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let Ok(key) = id.parse::<ArtifactId>() else {
            warn!(id, "Image not found in store");
            return Err(StoreError::NotFound(id.to_string()));
        };

        let path = match self.index.read().await.get(&key).map(|r| &r.payload) {
            Some(ArtifactPayload::Files { image, .. }) => image.clone(),
            _ => {
                warn!(id, "Image not found in store");
                return Err(StoreError::NotFound(id.to_string()));
            }
        };

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                info!(id, "Retrieved image from store");
                Ok(bytes)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                // Removed behind our back; forget it.
                self.index.write().await.remove(&key);
                warn!(id, path = %path.display(), "Image file disappeared from store");
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(err) => {
                error!(id, error = %err, "Failed to read image file");
                Err(StoreError::Io(err))
            }
        }
    }

    async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    fn kind(&self) -> &'static str {
        "persistent"
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}

/// Builds the index from the files already present under `base`.
async fn scan(base: &Path) -> Result<HashMap<ArtifactId, ArtifactRecord>, StoreError> {
    let mut images: HashMap<ArtifactId, (PathBuf, DateTime<Utc>)> = HashMap::new();
    let mut prompts: HashMap<ArtifactId, PathBuf> = HashMap::new();

    let mut entries = tokio::fs::read_dir(base).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        // Follows symlinks; an entry can also vanish between listing and stat.
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Skipping entry that disappeared during scan");
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        if !meta.is_file() {
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.ends_with(TMP_SUFFIX) {
            debug!(path = %path.display(), "Removing leftover temporary file");
            if let Err(err) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %err, "Failed to remove temporary file");
            }
            continue;
        }

        let Some((stem, ext)) = name.split_once('.') else {
            continue;
        };
        let Ok(id) = stem.parse::<ArtifactId>() else {
            continue;
        };

        if ext == PROMPT_EXT {
            prompts.insert(id, path);
        } else {
            let created_at = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            if let Some((existing, _)) = images.get(&id) {
                warn!(%id, kept = %existing.display(), ignored = %path.display(), "Duplicate image for id");
                continue;
            }
            images.insert(id, (path, created_at));
        }
    }

    Ok(images
        .into_iter()
        .map(|(id, (image, created_at))| {
            let prompt = prompts.remove(&id);
            let record = ArtifactRecord::files(id.clone(), image, prompt, created_at);
            (id, record)
        })
        .collect())
}
