//! PCI bus hardware definitions and configuration space constants.
//!
//! This module provides constants for PCI configuration space access,
//! the command register bits, and the plain-data descriptors the bus layer
//! hands to a driver: device identity, decoded BARs and the BAR index type.

use bitflags::bitflags;

// =============================================================================
// Configuration Space Register Offsets
// =============================================================================

/// Vendor ID register offset (16-bit).
pub const PCI_VENDOR_ID_OFFSET: u8 = 0x00;

/// Device ID register offset (16-bit).
pub const PCI_DEVICE_ID_OFFSET: u8 = 0x02;

/// Command register offset (16-bit).
pub const PCI_COMMAND_OFFSET: u8 = 0x04;

/// Revision ID register offset (8-bit).
pub const PCI_REVISION_ID_OFFSET: u8 = 0x08;

/// Header Type register offset (8-bit).
pub const PCI_HEADER_TYPE_OFFSET: u8 = 0x0E;

/// Base Address Register 0 offset.
pub const PCI_BAR0_OFFSET: u8 = 0x10;

// =============================================================================
// BAR (Base Address Register) Flags
// =============================================================================

/// I/O space indicator (bit 0 = 1).
pub const PCI_BAR_IO_SPACE: u32 = 0x1;

/// I/O address mask (bits 2-31).
pub const PCI_BAR_IO_ADDRESS_MASK: u32 = 0xFFFF_FFFC;

/// Memory type mask (bits 1-2).
pub const PCI_BAR_MEM_TYPE_MASK: u32 = 0x6;

/// 64-bit memory type (bits 1-2 = 10).
pub const PCI_BAR_MEM_TYPE_64: u32 = 0x4;

/// Prefetchable flag (bit 3).
pub const PCI_BAR_MEM_PREFETCHABLE: u32 = 0x8;

/// Memory address mask (bits 4-31).
pub const PCI_BAR_MEM_ADDRESS_MASK: u32 = 0xFFFF_FFF0;

/// Maximum number of BARs per device.
pub const PCI_MAX_BARS: usize = 6;

/// Invalid vendor ID (no device present).
pub const PCI_VENDOR_ID_INVALID: u16 = 0xFFFF;

// =============================================================================
// Command Register Bits
// =============================================================================

bitflags! {
    /// PCI command register (offset 0x04).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PciCommand: u16 {
        /// Enable I/O space access (bit 0).
        const IO_SPACE = 0x0001;
        /// Enable memory space access (bit 1).
        const MEMORY_SPACE = 0x0002;
        /// Enable bus master capability (bit 2).
        const BUS_MASTER = 0x0004;
        /// Disable INTx interrupts (bit 10).
        const INTERRUPT_DISABLE = 0x0400;
    }
}

// =============================================================================
// BAR index
// =============================================================================

/// Index of a base address register (0-5).
///
/// Construction is checked, so a `BarIndex` always names a slot that exists
/// in a type 0 header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct BarIndex(u8);

impl BarIndex {
    /// BAR 0, the default register window for most devices.
    pub const BAR0: Self = Self(0);

    /// BAR 1.
    pub const BAR1: Self = Self(1);

    /// Create a BAR index, rejecting slots past the last BAR.
    #[inline]
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < PCI_MAX_BARS {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Raw slot number.
    #[inline]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Configuration space offset of this BAR (the resource id).
    #[inline]
    pub const fn config_offset(self) -> u8 {
        PCI_BAR0_OFFSET + self.0 * 4
    }
}

// =============================================================================
// Device descriptors
// =============================================================================

/// Vendor/device pair used to match drivers against devices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PciIdentity {
    pub vendor: u16,
    pub device: u16,
}

impl PciIdentity {
    #[inline]
    pub const fn new(vendor: u16, device: u16) -> Self {
        Self { vendor, device }
    }
}

/// One decoded base address register.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PciBarInfo {
    pub base: u64,
    pub size: u64,
    pub is_io: bool,
    pub is_64bit: bool,
    pub prefetchable: bool,
}

impl PciBarInfo {
    pub const fn zeroed() -> Self {
        Self {
            base: 0,
            size: 0,
            is_io: false,
            is_64bit: false,
            prefetchable: false,
        }
    }

    /// A BAR is implemented when it decodes a non-empty window.
    #[inline]
    pub const fn is_present(&self) -> bool {
        self.base != 0 && self.size != 0
    }

    /// Present and memory-mapped.
    #[inline]
    pub const fn is_mmio(&self) -> bool {
        self.is_present() && !self.is_io
    }
}

/// A function discovered on the bus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PciDeviceInfo {
    pub bus: u8,
    pub device: u8,
    pub function: u8,
    pub vendor_id: u16,
    pub device_id: u16,
    pub revision: u8,
    pub header_type: u8,
    pub bar_count: u8,
    pub bars: [PciBarInfo; PCI_MAX_BARS],
}

impl PciDeviceInfo {
    pub const fn zeroed() -> Self {
        Self {
            bus: 0,
            device: 0,
            function: 0,
            vendor_id: 0,
            device_id: 0,
            revision: 0,
            header_type: 0,
            bar_count: 0,
            bars: [PciBarInfo::zeroed(); PCI_MAX_BARS],
        }
    }

    #[inline]
    pub const fn identity(&self) -> PciIdentity {
        PciIdentity::new(self.vendor_id, self.device_id)
    }

    #[inline]
    pub fn bar(&self, index: BarIndex) -> &PciBarInfo {
        &self.bars[index.index() as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_index_bounds() {
        assert_eq!(BarIndex::new(0), Some(BarIndex::BAR0));
        assert_eq!(BarIndex::new(5).map(BarIndex::index), Some(5));
        assert_eq!(BarIndex::new(6), None);
    }

    #[test]
    fn bar_config_offsets() {
        assert_eq!(BarIndex::BAR0.config_offset(), 0x10);
        assert_eq!(BarIndex::BAR1.config_offset(), 0x14);
        assert_eq!(BarIndex::new(5).unwrap().config_offset(), 0x24);
    }

    #[test]
    fn command_bits() {
        let cmd = PciCommand::MEMORY_SPACE | PciCommand::BUS_MASTER;
        assert_eq!(cmd.bits(), 0x0006);
        assert!(!cmd.contains(PciCommand::IO_SPACE));
    }

    #[test]
    fn bar_presence() {
        let mut bar = PciBarInfo::zeroed();
        assert!(!bar.is_present());
        bar.base = 0xFE00_0000;
        bar.size = 0x1000;
        assert!(bar.is_mmio());
        bar.is_io = true;
        assert!(!bar.is_mmio());
    }
}
