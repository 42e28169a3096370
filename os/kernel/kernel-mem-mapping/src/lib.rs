//! # Pinned and Device Memory Mappings
//!
//! Privileged code cannot simply dereference another context's buffer or a
//! device's physical address: the buffer may be paged out, and a physical
//! address has no virtual mapping until one is built. This crate provides the
//! two wrappers that make such memory addressable and release it again
//! deterministically.
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │      PageLockMapping         │   │    PhysicalRangeMapping      │
//! │  virtual buffer ─► pinned    │   │  physical range ─► mapped    │
//! │  pages ─► mapped pointer     │   │  (non-cached by default)     │
//! └──────────────┬───────────────┘   └──────────────┬───────────────┘
//!                │ PagePinning                      │ IoSpaceMapper
//! ┌──────────────▼──────────────────────────────────▼───────────────┐
//! │                platform memory manager (external)               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Components
//!
//! ### [`PageLockMapping`]
//! Describes an existing virtual buffer, pins its pages and hands out at most
//! one mapping at a time, either in the owning context or in a foreign
//! (less privileged) one. Buffers passed as `*const` can only be mapped for
//! reading.
//!
//! ### [`PhysicalRangeMapping`]
//! Maps a physical range on construction and unmaps it on drop.
//!
//! ## Execution context
//!
//! Every operation has an [`Irql`] ceiling and checks it against
//! [`ExecutionContext::current_irql`] before calling the platform. Violations
//! are refused with [`MappingError::IrqlTooHigh`] rather than trusted.
//!
//! ## Faults
//!
//! Platform primitives report traps as [`PlatformFault`] values; they surface
//! as [`MappingError::LockFailure`] or [`MappingError::MapFailure`] and never
//! propagate further. Release primitives (unmap, unpin, descriptor free) have
//! no failure channel; a trap in one of them is logged and teardown carries
//! on. With the `std` feature, every primitive that unwinds is contained as
//! well.
//!
//! ## Logging
//!
//! Diagnostics go through the [`log`] facade: `trace` for state transitions,
//! `warn` for refused or faulted operations and `error` for resources that had
//! to be leaked on drop.

#![cfg_attr(not(any(test, doctest, feature = "std")), no_std)]

pub mod cache;
mod error;
mod fault;
pub mod irql;
mod page_lock;
mod phys_range;
pub mod platform;

pub use crate::cache::CachePolicy;
pub use crate::error::{MappingError, PlatformFault};
pub use crate::irql::{ExecutionContext, Irql};
pub use crate::page_lock::{AccessIntent, LockState, PageLockMapping};
pub use crate::phys_range::PhysicalRangeMapping;
pub use crate::platform::{IoSpaceMapper, LockOperation, PagePinning, PagePriority, TargetContext};

/// Re-export of the address types used in the public API.
pub use kernel_memory_addresses as addresses;
