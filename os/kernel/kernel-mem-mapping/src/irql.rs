//! Execution-context priority levels.

use crate::MappingError;
use core::fmt;

/// Interrupt request level of the executing context.
///
/// Code running at a higher level may not block and may not take page faults
/// on pageable memory. Pinning pages can wait for them to become resident and
/// mapping can touch pageable page tables, so each operation in this crate has
/// a **ceiling**: the highest level it may be invoked at.
///
/// | Level | Meaning |
/// |-------|---------|
/// | [`PASSIVE`](Self::PASSIVE) | Ordinary thread context; everything is allowed. |
/// | [`APC`](Self::APC) | Asynchronous procedure calls are masked; paging still works. |
/// | [`DISPATCH`](Self::DISPATCH) | The scheduler is masked; no waiting, no faults on pageable memory. |
/// | `3..=HIGH` | Device interrupt levels and above; nothing here may run. |
///
/// Levels are totally ordered, so a ceiling check is a plain comparison.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Irql(u8);

impl Irql {
    pub const PASSIVE: Self = Self(0);
    pub const APC: Self = Self(1);
    pub const DISPATCH: Self = Self(2);
    pub const HIGH: Self = Self(15);

    #[inline]
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self.0
    }

    /// Refuses with [`MappingError::IrqlTooHigh`] if `self` is above `ceiling`.
    ///
    /// # Errors
    /// The current level exceeds `ceiling`.
    #[inline]
    pub const fn check_ceiling(self, ceiling: Self) -> Result<(), MappingError> {
        if self.0 <= ceiling.0 {
            Ok(())
        } else {
            Err(MappingError::IrqlTooHigh {
                current: self,
                ceiling,
            })
        }
    }
}

impl fmt::Debug for Irql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::PASSIVE => f.write_str("PASSIVE_LEVEL"),
            Self::APC => f.write_str("APC_LEVEL"),
            Self::DISPATCH => f.write_str("DISPATCH_LEVEL"),
            Self::HIGH => f.write_str("HIGH_LEVEL"),
            Self(level) => write!(f, "IRQL({level})"),
        }
    }
}

impl fmt::Display for Irql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<Irql> for u8 {
    #[inline]
    fn from(irql: Irql) -> Self {
        irql.to_u8()
    }
}

impl TryFrom<u8> for Irql {
    type Error = u8;

    #[inline]
    fn try_from(level: u8) -> Result<Self, Self::Error> {
        if level <= Self::HIGH.0 {
            Ok(Self(level))
        } else {
            Err(level)
        }
    }
}

/// Highest level a page descriptor may be allocated or freed at, and at which
/// pinned pages may be unpinned.
pub const DESCRIPTOR_CEILING: Irql = Irql::DISPATCH;

/// Highest level pageable buffers may be pinned at.
pub const LOCK_CEILING: Irql = Irql::APC;

/// Highest level locked pages may be mapped at.
pub const MAP_CEILING: Irql = Irql::APC;

/// Highest level a physical range may be mapped or unmapped at.
pub const IO_SPACE_CEILING: Irql = Irql::DISPATCH;

/// Access to the level the caller is currently executing at.
///
/// Implemented by the platform seams so every operation can check its own
/// ceiling instead of trusting the caller.
pub trait ExecutionContext {
    fn current_irql(&self) -> Irql;
}
