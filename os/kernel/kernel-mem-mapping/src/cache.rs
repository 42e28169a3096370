//! Caching policy of a mapping.

use bitfield_struct::bitfield;

/// How the CPU may cache accesses made through a mapped pointer.
///
/// Ordinary buffers are mapped [`Cached`](Self::Cached). Device registers must
/// never be cached, and framebuffers are usually write-combined: stores may be
/// buffered and merged, loads bypass the cache.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum CachePolicy {
    NonCached,
    #[default]
    Cached,
    WriteCombined,
}

/// PAT slot expected to hold the write-combining memory type.
///
/// The power-on PAT has write-through in slot 1; kernels that support
/// write-combining reprogram it, leaving slots 0, 2 and 3 untouched.
pub const WRITE_COMBINING_PAT_INDEX: u8 = 1;

impl CachePolicy {
    /// Index into the page attribute table selected by this policy.
    #[inline]
    #[must_use]
    pub const fn pat_index(self) -> u8 {
        match self {
            Self::Cached => 0,
            Self::WriteCombined => WRITE_COMBINING_PAT_INDEX,
            Self::NonCached => 3,
        }
    }

    /// Page-table entry bits selecting this policy for a 4 KiB leaf.
    #[inline]
    #[must_use]
    pub const fn attribute_bits(self) -> CacheAttributeBits {
        let index = self.pat_index();
        CacheAttributeBits::new()
            .with_write_through(index & 0b001 != 0)
            .with_cache_disabled(index & 0b010 != 0)
            .with_pat(index & 0b100 != 0)
    }

    /// Whether accesses through the mapping bypass the CPU caches for reads.
    #[inline]
    #[must_use]
    pub const fn bypasses_cache(self) -> bool {
        !matches!(self, Self::Cached)
    }
}

/// The caching-related bits of a 4 KiB page-table entry, at their
/// architectural positions.
///
/// | Bit | Name | Meaning |
/// |-----|------|---------|
/// | 3 | `PWT` | Page write-through (PAT index bit 0) |
/// | 4 | `PCD` | Page cache disable (PAT index bit 1) |
/// | 7 | `PAT` | Page attribute table (PAT index bit 2) |
///
/// All other bits are zero, so the value can be OR-ed into an entry.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct CacheAttributeBits {
    #[bits(3)]
    __: u8,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    #[bits(2)]
    __: u8,

    /// Page Attribute Table (PAT, bit 7 in a 4 KiB PTE).
    pub pat: bool,

    #[bits(56)]
    __: u64,
}
