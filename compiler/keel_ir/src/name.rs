//! Interned identifier handle.

use std::fmt;

/// Interned string identifier.
///
/// The top four bits select the interner shard, the remaining 28 bits index
/// into that shard. Two names are equal iff their strings are equal.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
#[repr(transparent)]
pub struct Name(u32);

crate::static_assert_size!(Name, 4);

impl Name {
    /// Pre-interned empty string.
    pub const EMPTY: Name = Name(0);

    pub const SHARD_BITS: u32 = 4;
    pub const NUM_SHARDS: usize = 1 << Self::SHARD_BITS;
    pub const MAX_LOCAL: u32 = (1 << (32 - Self::SHARD_BITS)) - 1;

    #[inline]
    pub(crate) const fn new(shard: u32, local: u32) -> Self {
        debug_assert!((shard as usize) < Self::NUM_SHARDS);
        debug_assert!(local <= Self::MAX_LOCAL);
        Name((shard << (32 - Self::SHARD_BITS)) | local)
    }

    #[inline]
    pub const fn shard(self) -> usize {
        (self.0 >> (32 - Self::SHARD_BITS)) as usize
    }

    #[inline]
    pub const fn local(self) -> usize {
        (self.0 & Self::MAX_LOCAL) as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({}:{})", self.shard(), self.local())
    }
}
