//! ArtifactId - artifact の識別子
//!
//! 128 bit の乱数を小文字 16 進 32 文字で表す。呼び出し側にとっては不透明な値で、
//! 比較・ハッシュ・map のキー・URL やファイル名への埋め込みにだけ使う。
//!
//! # パース
//! `ArtifactId::from_str` は 16 進 32 桁だけを受け付ける（大文字は小文字に正規化）。
//! それ以外は拒否するので、id から作るファイル名にパス区切りや `..` は入らない。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of random bytes behind an id.
pub const ID_BYTES: usize = 16;

/// Length of the hex rendering.
pub const ID_HEX_LEN: usize = ID_BYTES * 2;

#[repr(transparent)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid artifact id {0:?}: expected {ID_HEX_LEN} hex characters")]
pub struct InvalidArtifactId(pub String);

impl ArtifactId {
    /// Builds an id from raw random bytes.
    pub fn from_bytes(bytes: [u8; ID_BYTES]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ArtifactId {
    type Err = InvalidArtifactId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ID_HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidArtifactId(s.to_string()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for ArtifactId {
    type Error = InvalidArtifactId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArtifactId> for String {
    fn from(id: ArtifactId) -> Self {
        id.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArtifactId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
