use crate::{MemoryAddress, PageSize};
use core::fmt;

/// Physical memory address.
///
/// A thin wrapper around [`MemoryAddress`] that denotes **physical** addresses
/// (host RAM / MMIO). Like [`VirtualAddress`](super::VirtualAddress), this type carries intent and
/// prevents accidental VA/PA mix-ups.
///
/// ### Normalization
/// Device ranges are handed around as plain integers, as pointers that really
/// hold a bus address, or already as a `PhysicalAddress`. All three convert
/// through [`From`] into the same representation, so code that maps a range
/// takes `impl Into<PhysicalAddress>` and has a single mapping path.
///
/// The only integer source is `u64`, so unsuffixed literals infer to it; a
/// `usize` bus address is passed as a pointer.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let from_int = PhysicalAddress::from(0xFED0_0000_u64);
/// let from_ptr = PhysicalAddress::from(0xFED0_0000_usize as *const u32);
/// assert_eq!(from_int, from_ptr);
/// let from_literal: PhysicalAddress = 0xFED0_0000.into();
/// assert_eq!(from_literal, from_int);
/// assert_eq!(PhysicalAddress::from(from_int), from_int);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(pub(crate) MemoryAddress);

impl PhysicalAddress {
    /// Reinterprets the pointer value as a physical address.
    #[inline]
    #[must_use]
    pub const fn from_ptr<T>(ptr: *const T) -> Self {
        Self(MemoryAddress::from_ptr(ptr))
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(MemoryAddress::new(v))
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0.as_u64()
    }

    /// Exclusive end of `[self, self+len)`, or `None` if the range wraps.
    #[inline]
    #[must_use]
    pub const fn checked_end(self, len: u64) -> Option<Self> {
        match self.0.checked_add(len) {
            Some(end) => Some(Self(end)),
            None => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn page_offset<S: PageSize>(self) -> u64 {
        self.0.page_offset::<S>()
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.as_u64())
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.as_u64())
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl<T> From<*const T> for PhysicalAddress {
    #[inline]
    fn from(ptr: *const T) -> Self {
        Self::from_ptr(ptr)
    }
}

impl<T> From<*mut T> for PhysicalAddress {
    #[inline]
    fn from(ptr: *mut T) -> Self {
        Self::from_ptr(ptr.cast_const())
    }
}
