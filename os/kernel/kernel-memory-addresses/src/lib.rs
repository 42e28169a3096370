//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw memory addresses used by the code that pins
//! buffers and maps device memory.
//!
//! ## Overview
//!
//! | Type | Meaning |
//! |----------|----------|
//! | [`MemoryAddress`] | A raw 64-bit address, either physical or virtual. |
//! | [`VirtualAddress`] | Refers to virtual (page-table translated) memory. |
//! | [`PhysicalAddress`] | Refers to physical memory or MMIO regions. |
//!
//! The wrappers are zero-cost `#[repr(transparent)]` newtypes; they exist so a
//! device's bus address can never be passed where a buffer pointer is expected
//! and vice versa.
//!
//! ## Page spans
//!
//! Pinning works on whole pages. [`page_span`] computes how many pages of a
//! given [`PageSize`] a byte range touches, including the partial pages at
//! either end:
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! // 16 bytes straddling a page boundary touch two pages.
//! let va = VirtualAddress::new(0x1FF8);
//! assert_eq!(page_span::<Size4K>(va, 16), Some(2));
//!
//! // A page-aligned page is exactly one page.
//! assert_eq!(page_span::<Size4K>(VirtualAddress::new(0x2000), 4096), Some(1));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod memory_address;
mod page_size;
mod physical_address;
mod virtual_address;

pub use memory_address::MemoryAddress;
pub use page_size::{PageSize, Size4K};
pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;

/// Number of `S`-sized pages touched by the byte range `[va, va+len)`.
///
/// An empty range touches no pages. Returns `None` if the range wraps the
/// address space.
#[inline]
#[must_use]
pub const fn page_span<S: PageSize>(va: VirtualAddress, len: u64) -> Option<u64> {
    if len == 0 {
        return Some(0);
    }

    let first = va.page_offset::<S>();
    let Some(total) = first.checked_add(len) else {
        return None;
    };
    if va.checked_add(len).is_none() {
        return None;
    }

    Some(total.div_ceil(S::SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_helpers() {
        let a = MemoryAddress::new(0x12345);
        assert_eq!(a.align_down::<Size4K>().as_u64(), 0x12000);
        assert_eq!(a.page_offset::<Size4K>(), 0x345);
        assert!(!a.is_aligned::<Size4K>());
        assert!(MemoryAddress::new(0x12000).is_aligned::<Size4K>());
    }

    #[test]
    fn physical_address_normalizes_all_forms() {
        let raw = 0x0000_0010_2000_0042_u64;
        let from_int = PhysicalAddress::from(raw);
        #[allow(clippy::cast_possible_truncation)]
        let from_ptr = PhysicalAddress::from(raw as usize as *const u8);
        let from_mut = PhysicalAddress::from(raw as usize as *mut u64);
        assert_eq!(from_int, from_ptr);
        assert_eq!(from_int, from_mut);
        assert_eq!(from_int.page_offset::<Size4K>(), 0x42);
    }

    #[test]
    fn physical_range_end_detects_wrap() {
        let pa = PhysicalAddress::new(u64::MAX - 0xFFF);
        assert_eq!(pa.checked_end(0x1000), None);
        assert_eq!(
            pa.checked_end(0xFFF),
            Some(PhysicalAddress::new(u64::MAX))
        );
    }

    #[test]
    fn page_span_counts_partial_pages() {
        assert_eq!(page_span::<Size4K>(VirtualAddress::new(0x1000), 0), Some(0));
        assert_eq!(page_span::<Size4K>(VirtualAddress::new(0x1000), 1), Some(1));
        assert_eq!(page_span::<Size4K>(VirtualAddress::new(0x1000), 4096), Some(1));
        assert_eq!(page_span::<Size4K>(VirtualAddress::new(0x1000), 4097), Some(2));
        assert_eq!(page_span::<Size4K>(VirtualAddress::new(0x1FFF), 2), Some(2));
        assert_eq!(page_span::<Size4K>(VirtualAddress::new(0x1800), 8192), Some(3));
    }

    #[test]
    fn page_span_rejects_wrapping_range() {
        let va = VirtualAddress::new(u64::MAX - 10);
        assert_eq!(page_span::<Size4K>(va, 100), None);
    }

    #[test]
    fn virtual_address_from_pointer() {
        let buf = [0u8; 16];
        let va = VirtualAddress::from(buf.as_ptr());
        assert_eq!(va.as_u64(), buf.as_ptr() as u64);
        assert!(!va.is_null());
        assert!(VirtualAddress::zero().is_null());
    }
}
