//! imgbridge-core
//!
//! Hyperbolic backend の前に置く OpenAI 形式の画像生成ブリッジ。
//! URL 配信用に生成画像を保持する artifact store を持つ。
//!
//! # モジュール
//! - **domain**: id、artifact レコード、wire schema、エラー
//! - **ports**: `ArtifactStore`, `ImageBackend`, `Clock`, `IdGenerator`
//! - **impls**: `EphemeralStore`, `PersistentStore`, `HyperbolicBackend`
//! - **app**: `AppBuilder`, `Translator`, `SweepLoop`, HTTP router

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
