//! Owned POD storage.
//!
//! libspa reads PODs in place through `struct spa_pod *`, so the bytes have
//! to be 8-byte aligned. `Vec<u8>` makes no such promise; `Pod` keeps its
//! bytes in `u64` words instead.

use crate::error::PodError;
use libspa::pod::Pod as SpaPod;
use std::fmt;

/// An owned, encoded POD.
#[derive(Clone, PartialEq, Eq)]
pub struct Pod {
    words: Vec<u64>,
    len: usize,
}

impl Pod {
    /// Copy encoded bytes into aligned storage.
    pub fn copy_from(bytes: &[u8]) -> Self {
        let mut words = vec![0u64; (bytes.len() + 7) / 8];
        bytemuck::cast_slice_mut::<u64, u8>(&mut words)[..bytes.len()].copy_from_slice(bytes);
        Pod {
            words,
            len: bytes.len(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrow as a libspa POD.
    ///
    /// Fails unless the bytes hold the whole POD the header describes,
    /// including its trailing padding.
    pub fn as_spa_pod(&self) -> Result<&SpaPod, PodError> {
        SpaPod::from_bytes(self.as_bytes()).ok_or(PodError::Malformed { len: self.len })
    }
}

impl AsRef<[u8]> for Pod {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for Pod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pod").field("len", &self.len).finish()
    }
}
