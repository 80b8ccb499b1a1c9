//! Impls - Port の実装
//!
//! # 含まれるもの
//! - **EphemeralStore**: TTL とサイズ上限付きのインメモリ store
//! - **PersistentStore**: ディレクトリ上の store
//! - **HyperbolicBackend**: 画像プロバイダ向け reqwest クライアント
//! - **image_format**: 両 store で共有する形式判定と PNG 再エンコード

pub mod fs_store;
pub mod hyperbolic;
pub mod image_format;
pub mod memory_store;

pub use self::fs_store::PersistentStore;
pub use self::hyperbolic::{DEFAULT_UPSTREAM_URL, HyperbolicBackend};
pub use self::memory_store::{DEFAULT_TTL, EphemeralConfig, EphemeralStore, SweepReport};
