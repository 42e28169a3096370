//! Mapping a physical range (device registers, framebuffers) into virtual
//! address space.

use crate::cache::CachePolicy;
use crate::error::MappingError;
use crate::fault;
use crate::irql::IO_SPACE_CEILING;
use crate::platform::IoSpaceMapper;
use core::fmt;
use core::ptr::NonNull;
use kernel_memory_addresses::PhysicalAddress;
use log::{error, trace, warn};

/// A physical range mapped for the lifetime of the value.
///
/// Mapping happens in the constructor. Either it fully succeeds and
/// [`virtual_address`](Self::virtual_address) returns the mapping, which is
/// released exactly once on drop, or it fails and drop does nothing.
///
/// The physical base can be given as an integer, as a pointer holding a bus
/// address, or as a [`PhysicalAddress`]; all of them normalize through
/// `Into<PhysicalAddress>`.
///
/// ```ignore
/// let hpet = PhysicalRangeMapping::new(&platform, 0xFED0_0000_u64, 0x400);
/// let Some(regs) = hpet.virtual_address() else {
///     return Err(DeviceError::Unmapped);
/// };
/// ```
pub struct PhysicalRangeMapping<'p, P: IoSpaceMapper> {
    platform: &'p P,
    physical: PhysicalAddress,
    size: usize,
    cache: CachePolicy,
    mapped: Result<NonNull<u8>, MappingError>,
}

impl<'p, P: IoSpaceMapper> PhysicalRangeMapping<'p, P> {
    /// Maps `size` bytes at `address` non-cached.
    ///
    /// Integer addresses are `u64`, so an unsuffixed literal such as
    /// `PhysicalRangeMapping::new(&platform, 0x1000, 0x1000)` infers without
    /// annotation. A `usize` bus address is passed as a pointer.
    #[must_use]
    pub fn new(platform: &'p P, address: impl Into<PhysicalAddress>, size: usize) -> Self {
        Self::with_cache_policy(platform, address, size, CachePolicy::NonCached)
    }

    /// Maps `size` bytes at `address` with an explicit caching policy.
    #[must_use]
    pub fn with_cache_policy(
        platform: &'p P,
        address: impl Into<PhysicalAddress>,
        size: usize,
        cache: CachePolicy,
    ) -> Self {
        let physical = address.into();
        let mapped = Self::map(platform, physical, size, cache)
            .inspect(|va| trace!("mapped {size:#x} bytes at {physical} to {:p} ({cache:?})", *va))
            .inspect_err(|err| warn!("cannot map {size:#x} bytes at {physical}: {err}"));

        Self {
            platform,
            physical,
            size,
            cache,
            mapped,
        }
    }

    fn map(
        platform: &P,
        physical: PhysicalAddress,
        size: usize,
        cache: CachePolicy,
    ) -> Result<NonNull<u8>, MappingError> {
        if size == 0 || physical.checked_end(size as u64).is_none() {
            return Err(MappingError::InvalidRange);
        }

        platform.current_irql().check_ceiling(IO_SPACE_CEILING)?;

        fault::contain("map_io_space", || {
            platform.map_io_space(physical, size, cache)
        })
        .map_err(MappingError::MapFailure)?
        .ok_or(MappingError::MapRefused)
    }

    /// The mapped address, or `None` if mapping failed.
    #[inline]
    #[must_use]
    pub fn virtual_address(&self) -> Option<NonNull<u8>> {
        self.mapped.ok()
    }

    /// Why mapping failed, if it did.
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<MappingError> {
        self.mapped.err()
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        self.physical
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[inline]
    #[must_use]
    pub const fn cache_policy(&self) -> CachePolicy {
        self.cache
    }
}

impl<P: IoSpaceMapper> Drop for PhysicalRangeMapping<'_, P> {
    fn drop(&mut self) {
        let Ok(address) = self.mapped else {
            return;
        };

        if let Err(err) = self.platform.current_irql().check_ceiling(IO_SPACE_CEILING) {
            error!("leaking mapping of {} at {address:p}: {err}", self.physical);
            return;
        }

        let (platform, size) = (self.platform, self.size);
        if fault::release("unmap_io_space", || platform.unmap_io_space(address, size)).is_ok() {
            trace!("unmapped {} from {address:p}", self.physical);
        }
    }
}

impl<P: IoSpaceMapper> fmt::Debug for PhysicalRangeMapping<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicalRangeMapping")
            .field("physical", &self.physical)
            .field("size", &self.size)
            .field("cache", &self.cache)
            .field("mapped", &self.mapped)
            .finish()
    }
}
