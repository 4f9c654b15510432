//! MMIO region abstraction - type-safe device register access.
//!
//! `MmioRegion` is the driver-side view of a mapped BAR: a virtual base and
//! a length. It is the `ioremap()` + `__iomem` pair of other kernels, and
//! the pair of bus handles (tag = physical base, handle = virtual base) a
//! register port needs.
//!
//! # Why MMIO Needs Special Handling
//!
//! 1. **Volatile access required** - Reads/writes have side effects and must
//!    not be optimized away or reordered by the compiler.
//!
//! 2. **Alignment requirements** - Device registers require naturally
//!    aligned access (32-bit registers at 4-byte boundaries).
//!
//! 3. **No caching** - The compiler must not assume values persist between
//!    accesses.
//!
//! # Usage
//!
//! ```ignore
//! use rtsz_mm::mmio::MmioRegion;
//! use x86_64::PhysAddr;
//!
//! let bar = MmioRegion::map(PhysAddr::new(0xFE00_0000), 0x1000, direct_map_offset)?;
//! let status: u32 = bar.read(0x14);
//! bar.write(0x14, status);
//! ```

use core::ptr::{read_volatile, write_volatile};

use x86_64::PhysAddr;

/// A mapped MMIO region providing volatile access to device registers.
///
/// This type guarantees:
/// - All accesses are volatile (not optimized away)
/// - Bounds checking (debug builds)
/// - Proper alignment verification (debug builds)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmioRegion {
    phys_base: u64,
    virt_base: u64,
    size: usize,
}

impl MmioRegion {
    /// Map a physical MMIO window through the kernel direct map.
    ///
    /// Returns `None` if:
    /// - Physical address is null
    /// - Size is zero
    /// - Address + size would overflow
    /// - The direct-mapped address would overflow
    pub fn map(phys: PhysAddr, size: usize, direct_map_offset: u64) -> Option<Self> {
        let phys_base = phys.as_u64();
        if phys_base == 0 || size == 0 {
            return None;
        }

        phys_base.checked_add(size as u64)?;
        let virt_base = phys_base.checked_add(direct_map_offset)?;

        Some(Self {
            phys_base,
            virt_base,
            size,
        })
    }

    /// Wrap an already-mapped virtual window.
    ///
    /// # Safety
    ///
    /// `virt_base..virt_base + size` must be mapped, device (or otherwise
    /// volatile-safe) memory that stays valid for the lifetime of every copy
    /// of the returned region.
    pub unsafe fn from_raw(phys_base: u64, virt_base: u64, size: usize) -> Self {
        Self {
            phys_base,
            virt_base,
            size,
        }
    }

    /// Read a value at byte offset from the MMIO region.
    ///
    /// # Panics
    ///
    /// - Debug-panics if `offset + sizeof(T)` exceeds region size.
    /// - Debug-panics if access is not naturally aligned.
    #[inline]
    pub fn read<T: Copy>(&self, offset: usize) -> T {
        let size = core::mem::size_of::<T>();

        debug_assert!(
            self.is_valid_offset(offset, size),
            "MMIO read out of bounds: offset={}, size={}, region_size={}",
            offset,
            size,
            self.size
        );

        debug_assert!(
            offset % size == 0,
            "MMIO read misaligned: offset={}, align={}",
            offset,
            size
        );

        let ptr = (self.virt_base + offset as u64) as *const T;
        // SAFETY: the region was created over a valid mapping, bounds checked above
        unsafe { read_volatile(ptr) }
    }

    /// Write a value at byte offset to the MMIO region.
    ///
    /// # Panics
    ///
    /// - Debug-panics if `offset + sizeof(T)` exceeds region size.
    /// - Debug-panics if access is not naturally aligned.
    #[inline]
    pub fn write<T: Copy>(&self, offset: usize, value: T) {
        let size = core::mem::size_of::<T>();

        debug_assert!(
            self.is_valid_offset(offset, size),
            "MMIO write out of bounds: offset={}, size={}, region_size={}",
            offset,
            size,
            self.size
        );

        debug_assert!(
            offset % size == 0,
            "MMIO write misaligned: offset={}, align={}",
            offset,
            size
        );

        let ptr = (self.virt_base + offset as u64) as *mut T;
        // SAFETY: the region was created over a valid mapping, bounds checked above
        unsafe { write_volatile(ptr, value) }
    }

    #[inline]
    pub fn read_u32(&self, offset: usize) -> u32 {
        self.read(offset)
    }

    #[inline]
    pub fn write_u32(&self, offset: usize, value: u32) {
        self.write(offset, value)
    }

    /// Bus tag: physical base of the window.
    #[inline]
    pub fn phys_base(&self) -> u64 {
        self.phys_base
    }

    /// Bus handle: virtual base of the window.
    ///
    /// **Warning**: Do not dereference this directly. Use `read()`/`write()`.
    #[inline]
    pub fn virt_base(&self) -> u64 {
        self.virt_base
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Check if an offset is within bounds for a given access size.
    #[inline]
    pub fn is_valid_offset(&self, offset: usize, access_size: usize) -> bool {
        offset
            .checked_add(access_size)
            .is_some_and(|end| end <= self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_rejects_degenerate_windows() {
        assert!(MmioRegion::map(PhysAddr::new(0), 0x1000, 0).is_none());
        assert!(MmioRegion::map(PhysAddr::new(0xFE00_0000), 0, 0).is_none());
        assert!(MmioRegion::map(PhysAddr::new(0xFE00_0000), 0x1000, u64::MAX).is_none());
    }

    #[test]
    fn map_applies_direct_map_offset() {
        let region =
            MmioRegion::map(PhysAddr::new(0xFE00_0000), 0x1000, 0xFFFF_8000_0000_0000).unwrap();
        assert_eq!(region.phys_base(), 0xFE00_0000);
        assert_eq!(region.virt_base(), 0xFFFF_8000_FE00_0000);
        assert_eq!(region.size(), 0x1000);
    }

    #[test]
    fn volatile_access_over_memory() {
        let mut backing = [0u32; 8];
        let base = backing.as_mut_ptr() as u64;
        let region = unsafe { MmioRegion::from_raw(0x1000, base, 32) };

        region.write_u32(0x14, 0xDEAD_BEEF);
        assert_eq!(region.read_u32(0x14), 0xDEAD_BEEF);
        assert_eq!(backing[5], 0xDEAD_BEEF);
    }

    #[test]
    fn region_is_shareable() {
        fn shareable<T: Send + Sync>() {}
        shareable::<MmioRegion>();
    }

    #[test]
    fn offset_bounds() {
        let region = unsafe { MmioRegion::from_raw(0x1000, 0x2000, 0x100) };
        assert!(region.is_valid_offset(0xFC, 4));
        assert!(!region.is_valid_offset(usize::MAX, 4));
        assert!(!region.is_valid_offset(0xFD, 4));
    }
}
