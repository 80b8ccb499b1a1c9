//! Domain - ドメインモデル（id、artifact レコード、wire schema、エラー）

pub mod artifact;
pub mod errors;
pub mod ids;
pub mod schema;

pub use self::artifact::{ArtifactHandle, ArtifactPayload, ArtifactRecord};
pub use self::errors::{StoreError, TranslateError};
pub use self::ids::{ArtifactId, InvalidArtifactId};
pub use self::schema::{
    BackendImage, BackendRequest, BackendResponse, GeneratedImage, GenerationRequest,
    GenerationResponse,
};
