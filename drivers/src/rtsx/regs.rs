//! Realtek card reader register map.
//!
//! Two address spaces exist. The host registers below are plain 32-bit
//! MMIO words in the BAR. Everything else lives in the chip's internal
//! byte-wide register file and is reached through `RTSX_HAIMR`.

use bitflags::bitflags;

use super::port::RegisterAddress;

// =============================================================================
// Host registers (directly mapped, 32-bit)
// =============================================================================

/// Host command buffer address.
pub const RTSX_HCBAR: usize = 0x00;
/// Host command buffer control.
pub const RTSX_HCBCTLR: usize = 0x04;
/// Host data buffer address.
pub const RTSX_HDBAR: usize = 0x08;
/// Host data buffer control.
pub const RTSX_HDBCTLR: usize = 0x0C;
/// Host access internal memory register (the index register).
pub const RTSX_HAIMR: usize = 0x10;
/// Bus interrupt pending register.
pub const RTSX_BIPR: usize = 0x14;
/// Bus interrupt enable register.
pub const RTSX_BIER: usize = 0x18;

// =============================================================================
// RTSX_HAIMR layout
// =============================================================================

/// Set by the driver to start a transaction, cleared by the chip when done.
pub const RTSX_HAIMR_BUSY: u32 = 1 << 31;
/// Transaction direction: set for writes.
pub const RTSX_HAIMR_WRITE: u32 = 1 << 30;
pub const RTSX_HAIMR_ADDR_SHIFT: u32 = 16;
pub const RTSX_HAIMR_MASK_SHIFT: u32 = 8;
/// Data byte (write value, or read result / write echo on completion).
pub const RTSX_HAIMR_DATA_MASK: u32 = 0xFF;

// =============================================================================
// Bus interrupt bits (RTSX_BIPR / RTSX_BIER)
// =============================================================================

bitflags! {
    /// Pending and enable bits shared by `RTSX_BIPR` and `RTSX_BIER`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct RtsxIntr: u32 {
        const CMD_DONE = 1 << 31;
        const DATA_DONE = 1 << 30;
        const TRANS_OK = 1 << 29;
        const TRANS_FAIL = 1 << 28;
        const XD_INT = 1 << 27;
        const MS_INT = 1 << 26;
        const SD_INT = 1 << 25;
        const SD_WRITE_PROTECT = 1 << 19;
        const XD_EXIST = 1 << 18;
        const MS_EXIST = 1 << 17;
        const SD_EXIST = 1 << 16;
    }
}

impl RtsxIntr {
    /// Card-detect bits that report presence rather than an event.
    pub const CARD_EXIST: Self = Self::SD_EXIST.union(Self::MS_EXIST).union(Self::XD_EXIST);
}

// =============================================================================
// Internal registers (indirect, 8-bit)
// =============================================================================

/// Dummy register; the low nibble carries the IC version on RTS5229.
pub const RTSX_DUMMY_REG: RegisterAddress = RegisterAddress::from_chip(0xFE90);

pub const RTSX_IC_VERSION_MASK: u8 = 0x0F;
pub const RTSX_IC_VERSION_A: u8 = 0x00;
pub const RTSX_IC_VERSION_B: u8 = 0x01;
pub const RTSX_IC_VERSION_C: u8 = 0x02;
pub const RTSX_IC_VERSION_D: u8 = 0x03;

/// N_FTS transmit control; also holds the interrupt clear-mode bit.
pub const RTSX_NFTS_TX_CTRL: RegisterAddress = RegisterAddress::from_chip(0xFC2B);
/// Interrupt status clears on read when set, on write-back when clear.
pub const RTSX_INT_READ_CLR: u8 = 0x02;
