//! Error types for the card reader driver stack

use core::ffi::c_int;
use core::fmt;

// =============================================================================
// BSD errno values reported across the bus interface
// =============================================================================

/// Input/output error.
pub const EIO: c_int = 5;
/// Device not configured.
pub const ENXIO: c_int = 6;
/// Operation not supported.
pub const EOPNOTSUPP: c_int = 45;
/// Operation timed out.
pub const ETIMEDOUT: c_int = 60;

/// Implement errno conversion for a driver error enum.
///
/// Generates `as_errno()` from a list of `pattern => errno` arms, plus
/// `is_success_errno()` for the bus glue that still speaks integers.
macro_rules! impl_errno {
    ($ty:ty, { $($pat:pat => $errno:expr),* $(,)? }) => {
        impl $ty {
            /// Convert to the errno reported to the bus layer.
            #[inline]
            pub fn as_errno(self) -> c_int {
                match self {
                    $($pat => $errno,)*
                }
            }

            /// Check whether a raw bus return code means success.
            #[inline]
            pub fn is_success_errno(code: c_int) -> bool {
                code == 0
            }
        }
    };
}

/// Driver operation result type
pub type RtsxResult<T> = Result<T, RtsxError>;

/// Errors produced by register access, bring-up and resource management.
///
/// Every variant is fatal to the step that produced it. The core never
/// retries; callers decide whether a whole operation is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtsxError {
    /// Busy flag did not clear within the poll budget.
    Timeout {
        /// Indirect register being accessed.
        addr: u16,
    },
    /// Write completed but the chip echoed a different byte.
    VerificationMismatch {
        /// Indirect register being written.
        addr: u16,
        /// Byte requested by the driver.
        expected: u8,
        /// Byte echoed by the chip.
        observed: u8,
    },
    /// Chip reported a sub-revision the driver does not know.
    UnknownRevision(u8),
    /// Platform refused to grant the memory window.
    AllocationFailed {
        /// Base address register index that was requested.
        bar: u8,
    },
    /// No table entry matches the device handed to attach.
    NoDevice {
        vendor: u16,
        device: u16,
    },
    /// Identified and initialised, but the data path is not implemented.
    Unsupported,
}

impl_errno!(RtsxError, {
    RtsxError::Timeout { .. } => ETIMEDOUT,
    RtsxError::VerificationMismatch { .. } => EIO,
    RtsxError::UnknownRevision(_) => ENXIO,
    RtsxError::AllocationFailed { .. } => ENXIO,
    RtsxError::NoDevice { .. } => ENXIO,
    RtsxError::Unsupported => EOPNOTSUPP,
});

impl RtsxError {
    /// Whether repeating the whole operation could plausibly succeed.
    ///
    /// Only a timeout depends on bus conditions; every other error is a
    /// property of the device or the platform.
    #[inline]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl fmt::Display for RtsxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Timeout { addr } => write!(f, "register 0x{:04x}: busy timeout", addr),
            Self::VerificationMismatch {
                addr,
                expected,
                observed,
            } => write!(
                f,
                "register 0x{:04x}: wrote 0x{:02x}, chip echoed 0x{:02x}",
                addr, expected, observed
            ),
            Self::UnknownRevision(version) => write!(f, "unknown IC {:02x}", version),
            Self::AllocationFailed { bar } => {
                write!(f, "memory allocation of PCI base register {} failed", bar)
            }
            Self::NoDevice { vendor, device } => {
                write!(f, "no driver entry for {:04x}:{:04x}", vendor, device)
            }
            Self::Unsupported => write!(f, "operation not supported"),
        }
    }
}
