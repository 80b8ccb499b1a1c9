//! IdGenerator port - artifact id の生成
//!
//! # 実装
//! - **RandomHexGenerator**: OS の CSPRNG から 128 bit、16 進エンコード
//!
//! 衝突は起きないものとして扱う。store は衝突を検査せず、衝突した `put` は
//! 既存のレコードを置き換える。

use rand::RngCore;
use rand::rngs::OsRng;

use crate::domain::errors::StoreError;
use crate::domain::ids::{ArtifactId, ID_BYTES};

/// IdGenerator は新しい artifact id を生成
///
/// # スレッド安全性
/// - `Send + Sync` なので共有 store の内側に置ける
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Result<ArtifactId, StoreError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomHexGenerator;

impl IdGenerator for RandomHexGenerator {
    fn generate(&self) -> Result<ArtifactId, StoreError> {
        let mut bytes = [0u8; ID_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| StoreError::IdGeneration(e.to_string()))?;
        Ok(ArtifactId::from_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::ID_HEX_LEN;
    use std::collections::HashSet;

    #[test]
    fn random_hex_generator_generates_unique_ids() {
        let id_gen = RandomHexGenerator;
        let ids: HashSet<_> = (0..1000).map(|_| id_gen.generate().unwrap()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn generated_ids_are_32_hex_chars() {
        let id = RandomHexGenerator.generate().unwrap();
        assert_eq!(id.as_str().len(), ID_HEX_LEN);
        assert!(id.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(id.as_str(), id.as_str().to_ascii_lowercase());
    }
}
