//! Containment of traps raised by platform primitives.
//!
//! Platform calls report traps as [`PlatformFault`] values. With the `std`
//! feature a primitive that unwinds is also stopped at the call boundary and
//! reported as [`PlatformFault::Trapped`]; without it (`panic = "abort"`
//! kernels) there is nothing to catch.

use crate::error::PlatformFault;
use log::warn;

/// Runs `call` and returns its outcome, logging any fault.
pub(crate) fn contain<T>(
    operation: &'static str,
    call: impl FnOnce() -> Result<T, PlatformFault>,
) -> Result<T, PlatformFault> {
    let result = guarded(call);
    if let Err(fault) = &result {
        warn!("{operation}: contained platform fault: {fault}");
    }
    result
}

/// Runs a primitive that has no failure channel of its own, such as an unmap
/// or an unpin. A trap is logged and returned; callers carry on regardless.
pub(crate) fn release(operation: &'static str, call: impl FnOnce()) -> Result<(), PlatformFault> {
    contain(operation, || {
        call();
        Ok(())
    })
}

#[cfg(any(test, feature = "std"))]
fn guarded<T>(call: impl FnOnce() -> Result<T, PlatformFault>) -> Result<T, PlatformFault> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(call))
        .unwrap_or(Err(PlatformFault::Trapped))
}

#[cfg(not(any(test, feature = "std")))]
#[inline]
fn guarded<T>(call: impl FnOnce() -> Result<T, PlatformFault>) -> Result<T, PlatformFault> {
    call()
}
