//! Ports - 境界の trait
//!
//! 各 trait は協調相手を 1 つずつ隠す（時刻、乱数、artifact の保存、画像プロバイダ）。
//! これにより store と translator を決定的な代替実装でテストできる。

pub mod artifact_store;
pub mod clock;
pub mod id_generator;
pub mod image_backend;

pub use self::artifact_store::ArtifactStore;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, RandomHexGenerator};
pub use self::image_backend::{ForwardHeaders, ImageBackend};
