//! Indirect access to the chip's internal register file.
//!
//! Every internal register is reached through one host word, `RTSX_HAIMR`.
//! The driver writes a command word with the busy bit set, then polls the
//! same word until the chip clears busy. On completion the low byte holds
//! the read result, or the chip's echo of the byte it just wrote.

use rtsz_abi::{RtsxError, RtsxResult};
use rtsz_lib::klog_trace;
use rtsz_mm::MmioRegion;

use super::regs::{
    RTSX_HAIMR, RTSX_HAIMR_ADDR_SHIFT, RTSX_HAIMR_BUSY, RTSX_HAIMR_DATA_MASK,
    RTSX_HAIMR_MASK_SHIFT, RTSX_HAIMR_WRITE,
};

/// Number of `RTSX_HAIMR` polls before a transaction is declared dead.
pub const RTSX_POLL_BUDGET: u32 = 1024;

/// 32-bit access to the host register window.
///
/// Implemented by the mapped BAR in the kernel and by the chip model in
/// tests.
pub trait RtsxBus {
    fn read_u32(&self, offset: usize) -> u32;
    fn write_u32(&self, offset: usize, value: u32);
}

impl RtsxBus for MmioRegion {
    #[inline]
    fn read_u32(&self, offset: usize) -> u32 {
        MmioRegion::read_u32(self, offset)
    }

    #[inline]
    fn write_u32(&self, offset: usize, value: u32) {
        MmioRegion::write_u32(self, offset, value)
    }
}

impl<B: RtsxBus + ?Sized> RtsxBus for &B {
    #[inline]
    fn read_u32(&self, offset: usize) -> u32 {
        (**self).read_u32(offset)
    }

    #[inline]
    fn write_u32(&self, offset: usize, value: u32) {
        (**self).write_u32(offset, value)
    }
}

/// Address in the chip's 14-bit internal register space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct RegisterAddress(u16);

impl RegisterAddress {
    /// Highest encodable address.
    pub const MAX: u16 = 0x3FFF;

    /// Checked constructor; `None` for anything past 14 bits.
    #[inline]
    pub const fn new(addr: u16) -> Option<Self> {
        if addr <= Self::MAX {
            Some(Self(addr))
        } else {
            None
        }
    }

    /// Address as printed in Realtek register listings.
    ///
    /// The chip decodes only the low 14 bits, so the listed `0xFxxx`
    /// addresses fold onto `0x3xxx`.
    #[inline]
    pub const fn from_chip(addr: u16) -> Self {
        Self(addr & Self::MAX)
    }

    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

#[inline]
const fn haimr_read_cmd(addr: RegisterAddress) -> u32 {
    RTSX_HAIMR_BUSY | ((addr.raw() as u32) << RTSX_HAIMR_ADDR_SHIFT)
}

#[inline]
const fn haimr_write_cmd(addr: RegisterAddress, mask: u8, value: u8) -> u32 {
    RTSX_HAIMR_BUSY
        | RTSX_HAIMR_WRITE
        | ((addr.raw() as u32) << RTSX_HAIMR_ADDR_SHIFT)
        | ((mask as u32) << RTSX_HAIMR_MASK_SHIFT)
        | value as u32
}

/// Outcome of one indirect transaction, before it is judged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Low byte of the last `RTSX_HAIMR` value observed.
    pub data: u8,
    /// Polls spent, at most the budget.
    pub polls: u32,
    /// The chip cleared busy within the budget.
    pub completed: bool,
}

/// Serialized indirect register access over one bus.
///
/// Transactions never overlap: every method issues its command and polls
/// it to completion (or budget exhaustion) before returning. Callers that
/// share a port across contexts must hold it behind a lock.
pub struct RegisterPort<B> {
    bus: B,
    poll_budget: u32,
    trace: bool,
}

impl<B: RtsxBus> RegisterPort<B> {
    pub fn new(bus: B, poll_budget: u32) -> Self {
        Self {
            bus,
            poll_budget,
            trace: false,
        }
    }

    /// Log every transaction at trace level.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    #[inline]
    pub fn bus(&self) -> &B {
        &self.bus
    }

    #[inline]
    pub fn poll_budget(&self) -> u32 {
        self.poll_budget
    }

    pub fn into_bus(self) -> B {
        self.bus
    }

    fn transact(&self, cmd: u32) -> Transaction {
        self.bus.write_u32(RTSX_HAIMR, cmd);

        let mut last = 0u32;
        let mut polls = 0u32;
        while polls < self.poll_budget {
            last = self.bus.read_u32(RTSX_HAIMR);
            polls += 1;
            if last & RTSX_HAIMR_BUSY == 0 {
                return Transaction {
                    data: (last & RTSX_HAIMR_DATA_MASK) as u8,
                    polls,
                    completed: true,
                };
            }
            core::hint::spin_loop();
        }

        Transaction {
            data: (last & RTSX_HAIMR_DATA_MASK) as u8,
            polls,
            completed: false,
        }
    }

    /// Issue a read and return the raw outcome.
    ///
    /// `data` is extracted even when the budget runs out; it is whatever
    /// the chip last left in the low byte and must not be trusted then.
    pub fn read_transaction(&self, addr: RegisterAddress) -> Transaction {
        let txn = self.transact(haimr_read_cmd(addr));
        if self.trace {
            klog_trace!(
                "rtsx: read  0x{:04x} -> 0x{:02x} ({} polls{})",
                addr.raw(),
                txn.data,
                txn.polls,
                if txn.completed { "" } else { ", timeout" }
            );
        }
        txn
    }

    /// Read one internal register.
    pub fn read(&self, addr: RegisterAddress) -> RtsxResult<u8> {
        let txn = self.read_transaction(addr);
        if txn.completed {
            Ok(txn.data)
        } else {
            Err(RtsxError::Timeout { addr: addr.raw() })
        }
    }

    /// Write `value` under `mask` and check the chip's echo.
    ///
    /// Only bits set in `mask` change; the chip merges them into the
    /// register itself. The echoed byte is compared with `value` as
    /// requested, not with `value & mask`.
    pub fn write(&self, addr: RegisterAddress, mask: u8, value: u8) -> RtsxResult<()> {
        let txn = self.transact(haimr_write_cmd(addr, mask, value));
        if self.trace {
            klog_trace!(
                "rtsx: write 0x{:04x} mask 0x{:02x} val 0x{:02x} echo 0x{:02x} ({} polls{})",
                addr.raw(),
                mask,
                value,
                txn.data,
                txn.polls,
                if txn.completed { "" } else { ", timeout" }
            );
        }

        if !txn.completed {
            return Err(RtsxError::Timeout { addr: addr.raw() });
        }
        if txn.data != value {
            return Err(RtsxError::VerificationMismatch {
                addr: addr.raw(),
                expected: value,
                observed: txn.data,
            });
        }
        Ok(())
    }

    /// Replace the whole register.
    #[inline]
    pub fn write_all(&self, addr: RegisterAddress, value: u8) -> RtsxResult<()> {
        self.write(addr, 0xFF, value)
    }

    /// Clear `bits`, leaving the rest of the register alone.
    #[inline]
    pub fn clear_bits(&self, addr: RegisterAddress, bits: u8) -> RtsxResult<()> {
        self.write(addr, bits, 0x00)
    }

    /// Set `bits`, leaving the rest of the register alone.
    #[inline]
    pub fn set_bits(&self, addr: RegisterAddress, bits: u8) -> RtsxResult<()> {
        self.write(addr, bits, 0xFF)
    }
}
