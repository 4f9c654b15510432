//! One-shot claim flag.
//!
//! Drivers use an `InitFlag` for work that must happen once per boot no
//! matter how many devices attach, such as printing the driver banner.
//!
//! ```ignore
//! static BANNER: InitFlag = InitFlag::new();
//!
//! if BANNER.claim() {
//!     klog_info!("rtsx: driver loaded");
//! }
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

#[repr(transparent)]
pub struct InitFlag {
    flag: AtomicBool,
}

impl InitFlag {
    #[inline]
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    /// Atomically claim the flag.
    ///
    /// Returns `true` for exactly one caller: the one that flipped it.
    #[inline]
    pub fn claim(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_succeeds_once() {
        let flag = InitFlag::new();
        assert!(flag.claim());
        assert!(!flag.claim());
        assert!(!flag.claim());
    }
}
