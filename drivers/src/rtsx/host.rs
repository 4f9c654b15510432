//! SD host interface and DMA sizing.
//!
//! Commands reach the chip through a host command buffer: an array of
//! 32-bit entries, each naming one internal register operation. Data moves
//! through an ADMA descriptor table. Neither path is driven yet; the
//! constants fix the buffer geometry a data path will allocate.

use core::mem::size_of;

use rtsz_abi::RtsxResult;

use super::port::RegisterAddress;

/// Largest single DMA segment.
pub const RTSX_DMA_MAX_SEGSIZE: usize = 0x80000;
/// Entries in the host command buffer.
pub const RTSX_HOSTCMD_MAX: usize = 256;
pub const RTSX_HOSTCMD_BUFSIZE: usize = size_of::<u32>() * RTSX_HOSTCMD_MAX;
/// Largest transfer handed to the host in one request.
pub const RTSX_MAX_TRANSFER: usize = 128 * 1024;
pub const RTSX_PAGE_SIZE: usize = 4096;
/// Scatter/gather entries needed for an unaligned maximum transfer.
pub const RTSX_MAX_SEGMENTS: usize = RTSX_MAX_TRANSFER / RTSX_PAGE_SIZE + 1;
pub const RTSX_ADMA_DESC_SIZE: usize = size_of::<u64>() * RTSX_MAX_SEGMENTS;
/// DMA buffers must sit below this bus address.
pub const RTSX_DMA_ADDR_LIMIT: u64 = 1 << 32;

/// Operation carried by one host command buffer entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum HostCmdKind {
    ReadReg = 0,
    WriteReg = 1,
    CheckReg = 2,
}

/// Pack one host command buffer entry.
#[inline]
pub const fn rtsx_hostcmd(kind: HostCmdKind, reg: RegisterAddress, mask: u8, data: u8) -> u32 {
    ((kind as u32 & 0x3) << 30) | ((reg.raw() as u32) << 16) | ((mask as u32) << 8) | data as u32
}

/// Whether a buffer at `bus_addr` spanning `len` bytes is reachable by DMA.
#[inline]
pub fn rtsx_dma_reachable(bus_addr: u64, len: usize) -> bool {
    bus_addr
        .checked_add(len as u64)
        .is_some_and(|end| end <= RTSX_DMA_ADDR_LIMIT)
}

/// An SD command as issued by the bus layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SdCommand {
    pub opcode: u8,
    pub arg: u32,
}

/// Host-controller operations exposed to the SD/MMC bus layer.
pub trait RtsxHost {
    fn send_command(&mut self, cmd: &SdCommand) -> RtsxResult<()>;

    /// Run `cmd` with a data phase; returns bytes moved.
    fn transfer(&mut self, cmd: &SdCommand, data: &mut [u8]) -> RtsxResult<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_geometry() {
        assert_eq!(RTSX_HOSTCMD_BUFSIZE, 1024);
        assert_eq!(RTSX_MAX_SEGMENTS, 33);
        assert_eq!(RTSX_ADMA_DESC_SIZE, 264);
    }

    #[test]
    fn hostcmd_packing() {
        let reg = RegisterAddress::from_chip(0xFC2B);
        assert_eq!(
            rtsx_hostcmd(HostCmdKind::WriteReg, reg, 0x02, 0x00),
            0x4000_0000 | (0x3C2B << 16) | 0x0200
        );
        assert_eq!(
            rtsx_hostcmd(HostCmdKind::CheckReg, RegisterAddress::from_chip(0), 0xFF, 0x5A),
            0x8000_FF5A
        );
    }

    #[test]
    fn dma_window() {
        assert!(rtsx_dma_reachable(0xFFFF_0000, 0x1_0000));
        assert!(!rtsx_dma_reachable(0xFFFF_0000, 0x1_0001));
        assert!(!rtsx_dma_reachable(u64::MAX, 1));
    }
}
