//! The platform primitives the mapping types are built on.
//!
//! Pinning, mapping and unmapping are owned by the host platform (its memory
//! manager and page tables). This crate only calls them, so they are expressed
//! as traits; a kernel implements them over its own memory manager and tests
//! implement them over plain heap memory.

use crate::cache::CachePolicy;
use crate::error::PlatformFault;
use crate::irql::{ExecutionContext, Irql};
use core::ptr::NonNull;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Address space a mapping is created in.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TargetContext {
    /// System space of the context that owns the buffer (kernel mode).
    Owning,
    /// Address space of a foreign, typically less privileged, context (user mode).
    Foreign,
}

impl TargetContext {
    /// Priority the platform should give the mapping request.
    ///
    /// System-space mappings may not fail quietly under PTE pressure; foreign
    /// mappings can.
    #[inline]
    #[must_use]
    pub const fn page_priority(self) -> PagePriority {
        match self {
            Self::Owning => PagePriority::High,
            Self::Foreign => PagePriority::Normal,
        }
    }

    /// Highest level a mapping in this context may be torn down at.
    #[inline]
    #[must_use]
    pub const fn unmap_ceiling(self) -> Irql {
        match self {
            Self::Owning => Irql::DISPATCH,
            Self::Foreign => Irql::APC,
        }
    }
}

/// Access the pages are probed for while pinning.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum LockOperation {
    Read,
    Write,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PagePriority {
    Normal,
    High,
}

/// Page descriptor primitives: describe, pin, map and release a virtual buffer.
pub trait PagePinning: ExecutionContext {
    /// Opaque handle describing the pages backing a virtual buffer.
    type Descriptor;

    /// Describes `[address, address+len)`. Does not pin anything.
    fn allocate_descriptor(&self, address: VirtualAddress, len: u32) -> Option<Self::Descriptor>;

    fn free_descriptor(&self, descriptor: Self::Descriptor);

    /// Probes the described pages for `operation` and pins them.
    ///
    /// # Errors
    /// The range is not accessible for `operation`.
    fn probe_and_lock(
        &self,
        descriptor: &mut Self::Descriptor,
        operation: LockOperation,
    ) -> Result<(), PlatformFault>;

    /// Unpins pages pinned by [`probe_and_lock`](Self::probe_and_lock).
    fn unlock(&self, descriptor: &mut Self::Descriptor);

    /// Maps pinned pages into `target`.
    ///
    /// `Ok(None)` means the platform declined without trapping.
    ///
    /// # Errors
    /// The mapping call trapped.
    fn map_locked(
        &self,
        descriptor: &mut Self::Descriptor,
        target: TargetContext,
        cache: CachePolicy,
        priority: PagePriority,
    ) -> Result<Option<NonNull<u8>>, PlatformFault>;

    fn unmap_locked(&self, address: NonNull<u8>, descriptor: &mut Self::Descriptor);
}

/// Physical (I/O space) mapping primitives.
pub trait IoSpaceMapper: ExecutionContext {
    /// Maps `size` bytes of physical memory starting at `address`.
    ///
    /// `Ok(None)` means the platform declined without trapping.
    ///
    /// # Errors
    /// The mapping call trapped.
    fn map_io_space(
        &self,
        address: PhysicalAddress,
        size: usize,
        cache: CachePolicy,
    ) -> Result<Option<NonNull<u8>>, PlatformFault>;

    fn unmap_io_space(&self, address: NonNull<u8>, size: usize);
}
