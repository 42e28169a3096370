//! Pinning an existing virtual buffer and mapping its pages.
//!
//! A [`PageLockMapping`] walks through a fixed sequence of states:
//!
//! ```text
//!  describe ──► Unlocked ──lock──► Locked ──map──► Mapped
//!                                    ▲               │
//!                                    └─────unmap─────┘
//!  drop: unmap (if mapped) ──► unlock (if locked) ──► free descriptor
//! ```
//!
//! Describing the buffer happens in the constructor and never fails loudly:
//! if the platform cannot describe the range the instance is inert and every
//! later operation reports [`MappingError::AllocationFailure`].

use crate::cache::CachePolicy;
use crate::error::MappingError;
use crate::fault;
use crate::irql::{DESCRIPTOR_CEILING, LOCK_CEILING, MAP_CEILING};
use crate::platform::{LockOperation, PagePinning, TargetContext};
use core::fmt;
use core::ptr::NonNull;
use kernel_memory_addresses::{Size4K, VirtualAddress, page_span};
use log::{error, trace, warn};

/// Whether the buffer may be mapped for writing.
///
/// Fixed by the constructor: buffers handed over as `*const` are
/// [`ReadOnly`](Self::ReadOnly), buffers handed over as `*mut` are
/// [`ReadWrite`](Self::ReadWrite).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AccessIntent {
    ReadOnly,
    ReadWrite,
}

impl AccessIntent {
    /// Access the pages are probed for when pinning.
    #[inline]
    #[must_use]
    pub const fn lock_operation(self) -> LockOperation {
        match self {
            Self::ReadOnly => LockOperation::Read,
            Self::ReadWrite => LockOperation::Write,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum LockState {
    Unlocked,
    Locked,
}

#[derive(Copy, Clone, Debug)]
struct Mapping {
    address: NonNull<u8>,
    target: TargetContext,
}

/// Pins the pages backing a virtual buffer and hands out at most one mapping
/// of them at a time.
///
/// # Example
/// ```ignore
/// let mut pinned = PageLockMapping::new(&platform, buffer, 4096);
/// pinned.lock()?;
/// let ptr = pinned.write_ptr(CachePolicy::Cached)?;
/// // ... use ptr ...
/// pinned.unmap()?;
/// ```
pub struct PageLockMapping<'p, P: PagePinning> {
    platform: &'p P,
    source: VirtualAddress,
    len: usize,
    intent: AccessIntent,
    descriptor: Option<P::Descriptor>,
    lock_state: LockState,
    mapping: Option<Mapping>,
}

impl<'p, P: PagePinning> PageLockMapping<'p, P> {
    /// Describes a writable buffer of `len` bytes at `buffer`.
    #[must_use]
    pub fn new<T>(platform: &'p P, buffer: *mut T, len: usize) -> Self {
        Self::describe(
            platform,
            VirtualAddress::from_ptr(buffer.cast_const()),
            len,
            AccessIntent::ReadWrite,
        )
    }

    /// Describes a read-only buffer of `len` bytes at `buffer`.
    ///
    /// Write mappings of this instance are always refused.
    #[must_use]
    pub fn new_read_only<T>(platform: &'p P, buffer: *const T, len: usize) -> Self {
        Self::describe(
            platform,
            VirtualAddress::from_ptr(buffer),
            len,
            AccessIntent::ReadOnly,
        )
    }

    /// Describes the memory of `slice` for reading.
    ///
    /// The borrow is not tracked; pointers handed out by the instance must not
    /// be used after the slice's owner releases it.
    #[must_use]
    pub fn from_slice<T>(platform: &'p P, slice: &[T]) -> Self {
        Self::new_read_only(platform, slice.as_ptr(), size_of_val(slice))
    }

    /// Describes the memory of `slice` for reading and writing.
    ///
    /// The borrow is not tracked; see [`from_slice`](Self::from_slice).
    #[must_use]
    pub fn from_mut_slice<T>(platform: &'p P, slice: &mut [T]) -> Self {
        let len = size_of_val(slice);
        Self::new(platform, slice.as_mut_ptr(), len)
    }

    fn describe(platform: &'p P, source: VirtualAddress, len: usize, intent: AccessIntent) -> Self {
        let descriptor = Self::allocate(platform, source, len)
            .inspect_err(|err| warn!("cannot describe {len} bytes at {source}: {err}"))
            .ok();

        Self {
            platform,
            source,
            len,
            intent,
            descriptor,
            lock_state: LockState::Unlocked,
            mapping: None,
        }
    }

    fn allocate(
        platform: &P,
        source: VirtualAddress,
        len: usize,
    ) -> Result<P::Descriptor, MappingError> {
        // Descriptors carry a 32-bit byte count.
        let length = u32::try_from(len).map_err(|_| MappingError::AllocationFailure)?;
        if length == 0 || source.is_null() {
            return Err(MappingError::AllocationFailure);
        }
        page_span::<Size4K>(source, u64::from(length)).ok_or(MappingError::AllocationFailure)?;

        platform.current_irql().check_ceiling(DESCRIPTOR_CEILING)?;
        fault::contain("allocate_descriptor", || {
            Ok(platform.allocate_descriptor(source, length))
        })
        .ok()
        .flatten()
        .ok_or(MappingError::AllocationFailure)
    }

    /// Pins the described pages so they cannot be paged out.
    ///
    /// Pinning happens once; calling this on a locked instance succeeds
    /// without touching the platform again.
    ///
    /// # Errors
    /// - [`MappingError::AllocationFailure`] if the instance is inert.
    /// - [`MappingError::IrqlTooHigh`] above [`LOCK_CEILING`].
    /// - [`MappingError::LockFailure`] if probing the range faulted.
    pub fn lock(&mut self) -> Result<(), MappingError> {
        let platform = self.platform;
        let descriptor = self
            .descriptor
            .as_mut()
            .ok_or(MappingError::AllocationFailure)?;

        if self.lock_state == LockState::Locked {
            return Ok(());
        }

        platform.current_irql().check_ceiling(LOCK_CEILING)?;

        let operation = self.intent.lock_operation();
        fault::contain("probe_and_lock", || {
            platform.probe_and_lock(descriptor, operation)
        })
        .map_err(MappingError::LockFailure)?;

        self.lock_state = LockState::Locked;
        trace!("pinned {} bytes at {} for {operation:?}", self.len, self.source);
        Ok(())
    }

    /// Maps the buffer for reading in the owning context, pinning it first if
    /// needed.
    ///
    /// # Errors
    /// See [`lock`](Self::lock); additionally [`MappingError::AlreadyMapped`],
    /// [`MappingError::MapFailure`] and [`MappingError::MapRefused`].
    pub fn read_ptr(&mut self, cache: CachePolicy) -> Result<NonNull<u8>, MappingError> {
        self.map(cache, TargetContext::Owning)
    }

    /// Maps the buffer for writing in the owning context.
    ///
    /// # Errors
    /// [`MappingError::AccessDenied`] on a read-only instance, otherwise as
    /// [`read_ptr`](Self::read_ptr).
    pub fn write_ptr(&mut self, cache: CachePolicy) -> Result<NonNull<u8>, MappingError> {
        self.require_write()?;
        self.map(cache, TargetContext::Owning)
    }

    /// Maps the buffer for reading into the foreign context.
    ///
    /// # Errors
    /// As [`read_ptr`](Self::read_ptr).
    pub fn read_ptr_foreign(&mut self, cache: CachePolicy) -> Result<NonNull<u8>, MappingError> {
        self.map(cache, TargetContext::Foreign)
    }

    /// Maps the buffer for writing into the foreign context.
    ///
    /// # Errors
    /// As [`write_ptr`](Self::write_ptr).
    pub fn write_ptr_foreign(&mut self, cache: CachePolicy) -> Result<NonNull<u8>, MappingError> {
        self.require_write()?;
        self.map(cache, TargetContext::Foreign)
    }

    const fn require_write(&self) -> Result<(), MappingError> {
        match self.intent {
            AccessIntent::ReadWrite => Ok(()),
            AccessIntent::ReadOnly => Err(MappingError::AccessDenied),
        }
    }

    fn map(
        &mut self,
        cache: CachePolicy,
        target: TargetContext,
    ) -> Result<NonNull<u8>, MappingError> {
        if self.descriptor.is_none() {
            return Err(MappingError::AllocationFailure);
        }
        if self.mapping.is_some() {
            return Err(MappingError::AlreadyMapped);
        }

        self.platform.current_irql().check_ceiling(MAP_CEILING)?;
        self.lock()?;

        let platform = self.platform;
        let descriptor = self
            .descriptor
            .as_mut()
            .ok_or(MappingError::AllocationFailure)?;

        let priority = target.page_priority();
        let address = fault::contain("map_locked", || {
            platform.map_locked(descriptor, target, cache, priority)
        })
        .map_err(MappingError::MapFailure)?
        .ok_or(MappingError::MapRefused)
        .inspect_err(|_| warn!("{target:?} mapping of {} refused", self.source))?;

        self.mapping = Some(Mapping { address, target });
        trace!("mapped {} into {target:?} at {address:p} ({cache:?})", self.source);
        Ok(address)
    }

    /// Releases the outstanding mapping, if any. The pages stay pinned.
    ///
    /// A trap inside the platform's unmap is logged and the mapping is
    /// forgotten; it is never released twice.
    ///
    /// # Errors
    /// [`MappingError::IrqlTooHigh`] above the mapping's
    /// [unmap ceiling](TargetContext::unmap_ceiling); the mapping is kept.
    pub fn unmap(&mut self) -> Result<(), MappingError> {
        let (Some(mapping), Some(descriptor)) = (self.mapping, self.descriptor.as_mut()) else {
            return Ok(());
        };

        self.platform
            .current_irql()
            .check_ceiling(mapping.target.unmap_ceiling())?;

        let platform = self.platform;
        let released = fault::release("unmap_locked", || {
            platform.unmap_locked(mapping.address, descriptor);
        });
        self.mapping = None;
        if released.is_ok() {
            trace!("unmapped {} from {:?}", self.source, mapping.target);
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub const fn source(&self) -> VirtualAddress {
        self.source
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub const fn access_intent(&self) -> AccessIntent {
        self.intent
    }

    #[inline]
    #[must_use]
    pub const fn lock_state(&self) -> LockState {
        self.lock_state
    }

    /// Whether a page descriptor was created; inert instances return `false`.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.descriptor.is_some()
    }

    #[inline]
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        matches!(self.lock_state, LockState::Locked)
    }

    #[inline]
    #[must_use]
    pub const fn is_mapped(&self) -> bool {
        self.mapping.is_some()
    }

    /// Address of the outstanding mapping.
    #[inline]
    #[must_use]
    pub fn mapped_address(&self) -> Option<NonNull<u8>> {
        self.mapping.map(|m| m.address)
    }

    /// Number of 4 KiB pages the buffer touches.
    #[must_use]
    pub fn page_count(&self) -> u64 {
        page_span::<Size4K>(self.source, self.len as u64).unwrap_or(0)
    }
}

impl<P: PagePinning> Drop for PageLockMapping<'_, P> {
    fn drop(&mut self) {
        if let Err(err) = self.unmap() {
            // Unpinning pages under a live mapping is worse than leaking them.
            error!(
                "leaking pinned buffer {}: outstanding mapping not released: {err}",
                self.source
            );
            return;
        }

        let Some(mut descriptor) = self.descriptor.take() else {
            return;
        };

        if let Err(err) = self.platform.current_irql().check_ceiling(DESCRIPTOR_CEILING) {
            error!("leaking page descriptor for {}: {err}", self.source);
            return;
        }

        let platform = self.platform;
        if self.lock_state == LockState::Locked
            && fault::release("unlock", || platform.unlock(&mut descriptor)).is_ok()
        {
            trace!("unpinned {} bytes at {}", self.len, self.source);
        }
        let _ = fault::release("free_descriptor", || platform.free_descriptor(descriptor));
    }
}

impl<P: PagePinning> fmt::Debug for PageLockMapping<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageLockMapping")
            .field("source", &self.source)
            .field("len", &self.len)
            .field("intent", &self.intent)
            .field("valid", &self.is_valid())
            .field("lock_state", &self.lock_state)
            .field("mapping", &self.mapped_address())
            .finish()
    }
}
