//! Wire-code lookup tables
//!
//! Packet kinds and value kinds are both identified on the wire by a single
//! byte. A [`TypeRegistry`] maps those bytes back to the kind. It is built
//! once from a fixed list and stores a dense table offset by the lowest
//! registered code, so lookups are a bounds check and an index.

use crate::{Error, Result};
use tracing::trace;

/// A kind with a one-byte wire code
pub trait Coded: Copy + std::fmt::Debug {
    /// The wire code for this kind
    fn code(&self) -> u8;
}

/// Immutable code → kind table
#[derive(Debug, Clone)]
pub struct TypeRegistry<K> {
    table: Vec<Option<K>>,
    offset: u8,
}

impl<K: Coded> TypeRegistry<K> {
    /// Build a registry from a list of kinds.
    ///
    /// Fails if the list is empty or two kinds share a code.
    pub fn new(kinds: &[K]) -> Result<Self> {
        let min = kinds.iter().map(Coded::code).min().ok_or(Error::EmptyRegistry)?;
        let max = kinds.iter().map(Coded::code).max().ok_or(Error::EmptyRegistry)?;

        let mut table = vec![None; (max - min) as usize + 1];
        for kind in kinds {
            let slot = &mut table[(kind.code() - min) as usize];
            if slot.is_some() {
                return Err(Error::DuplicateCode(kind.code()));
            }
            trace!("Mapping 0x{:02x} -> {:?}", kind.code(), kind);
            *slot = Some(*kind);
        }

        Ok(Self { table, offset: min })
    }

    /// Build a registry from one of the built-in kind lists, which are
    /// non-empty and collision free.
    pub(crate) fn from_known(kinds: &[K]) -> Self {
        let offset = kinds.iter().map(Coded::code).min().unwrap_or(0);
        let max = kinds.iter().map(Coded::code).max().unwrap_or(0);

        let mut table = vec![None; (max - offset) as usize + 1];
        for kind in kinds {
            debug_assert!(table[(kind.code() - offset) as usize].is_none());
            table[(kind.code() - offset) as usize] = Some(*kind);
        }

        Self { table, offset }
    }

    /// Look up the kind registered for `code`
    #[inline]
    pub fn get(&self, code: u8) -> Option<K> {
        let ix = code.checked_sub(self.offset)? as usize;
        self.table.get(ix).copied().flatten()
    }

    /// Number of registered kinds
    pub fn len(&self) -> usize {
        self.table.iter().filter(|k| k.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
