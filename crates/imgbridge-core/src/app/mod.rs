//! App - アプリケーション層
//!
//! Port を組み合わせて実行中のサービスを構成する。
//!
//! # 構成要素
//! - **AppBuilder**: ワイヤリングと起動時検証
//! - **Translator**: 外部リクエスト → backend リクエスト → 外部レスポンス
//! - **SweepLoop**: ephemeral store の定期的な掃除
//! - **http**: 生成・取得エンドポイントの axum router

pub mod builder;
pub mod http;
pub mod sweep_loop;
pub mod translator;

pub use self::builder::{App, AppBuilder, BuildError, StoreConfig};
pub use self::http::{ApiError, AppState, router};
pub use self::sweep_loop::{DEFAULT_SWEEP_INTERVAL, SweepHandle, SweepLoop};
pub use self::translator::{Translator, parse_size, to_backend_request};
