use crate::irql::Irql;
use kernel_memory_addresses::VirtualAddress;

/// Why an operation on a [`PageLockMapping`](crate::PageLockMapping) or
/// [`PhysicalRangeMapping`](crate::PhysicalRangeMapping) did not succeed.
///
/// None of these leave the instance in a partial state: a failed lock leaves
/// the pages unpinned, a failed map leaves no mapping behind.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MappingError {
    /// The page descriptor could not be created; the instance is inert.
    #[error("page descriptor could not be allocated")]
    AllocationFailure,
    /// The physical range is empty or wraps the address space.
    #[error("invalid physical range")]
    InvalidRange,
    #[error("failed to pin pages: {0}")]
    LockFailure(PlatformFault),
    #[error("failed to map pages: {0}")]
    MapFailure(PlatformFault),
    /// The platform returned no address, e.g. because system PTEs ran out.
    #[error("platform refused the mapping")]
    MapRefused,
    /// A previous mapping must be released with `unmap` first.
    #[error("a mapping is already outstanding")]
    AlreadyMapped,
    /// Write access on a buffer that was described read-only.
    #[error("write access requested on a read-only buffer")]
    AccessDenied,
    #[error("invoked at {current}, above the {ceiling} ceiling")]
    IrqlTooHigh { current: Irql, ceiling: Irql },
}

/// A trap raised inside a platform primitive, caught at the call boundary.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PlatformFault {
    #[error("access violation at {0}")]
    AccessViolation(VirtualAddress),
    #[error("invalid address range")]
    InvalidRange,
    #[error("insufficient resources")]
    InsufficientResources,
    /// The primitive unwound instead of returning.
    #[error("platform call trapped")]
    Trapped,
}
