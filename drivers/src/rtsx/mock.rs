//! Chip and platform models for host tests.

use core::cell::{Cell, RefCell};
use std::vec;
use std::vec::Vec;

use rtsz_abi::{BarIndex, RtsxError, RtsxResult};

use super::port::{RegisterAddress, RtsxBus};
use super::regs::{
    RTSX_BIER, RTSX_BIPR, RTSX_HAIMR, RTSX_HAIMR_ADDR_SHIFT, RTSX_HAIMR_BUSY,
    RTSX_HAIMR_DATA_MASK, RTSX_HAIMR_MASK_SHIFT, RTSX_HAIMR_WRITE, RtsxIntr,
};
use super::resource::{MappedIoRegion, PciMapper};

/// Indirect register transaction as seen by the chip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read(RegisterAddress),
    Write {
        addr: RegisterAddress,
        mask: u8,
        value: u8,
    },
}

/// Register-level model of the card reader.
///
/// `RTSX_HAIMR` latches the last command and reports busy for a
/// configurable number of polls. Writes merge under the mask and echo the
/// requested byte. Every bit written back to `RTSX_BIPR` clears; a card
/// still in the slot is announced again with [`MockChip::raise`].
pub struct MockChip {
    regs: RefCell<Vec<u8>>,
    haimr: Cell<u32>,
    completion: Cell<u32>,
    pending_polls: Cell<u32>,
    busy_polls: Cell<u32>,
    stuck: Cell<bool>,
    stuck_at: Cell<Option<RegisterAddress>>,
    echo_xor: Cell<u8>,
    polls: Cell<u32>,
    bipr: Cell<u32>,
    bier: Cell<u32>,
    bipr_writes: RefCell<Vec<u32>>,
    log: RefCell<Vec<Access>>,
}

impl MockChip {
    pub fn new() -> Self {
        Self {
            regs: RefCell::new(vec![0u8; RegisterAddress::MAX as usize + 1]),
            haimr: Cell::new(0),
            completion: Cell::new(0),
            pending_polls: Cell::new(0),
            busy_polls: Cell::new(0),
            stuck: Cell::new(false),
            stuck_at: Cell::new(None),
            echo_xor: Cell::new(0),
            polls: Cell::new(0),
            bipr: Cell::new(0),
            bier: Cell::new(0),
            bipr_writes: RefCell::new(Vec::new()),
            log: RefCell::new(Vec::new()),
        }
    }

    pub fn reg(&self, addr: RegisterAddress) -> u8 {
        self.regs.borrow()[addr.raw() as usize]
    }

    pub fn set_reg(&self, addr: RegisterAddress, value: u8) {
        self.regs.borrow_mut()[addr.raw() as usize] = value;
    }

    /// Polls that still see busy after each command.
    pub fn set_busy_polls(&self, polls: u32) {
        self.busy_polls.set(polls);
    }

    /// Never clear busy.
    pub fn set_stuck_busy(&self, stuck: bool) {
        self.stuck.set(stuck);
    }

    /// Never clear busy for commands targeting `addr`.
    pub fn set_stuck_at(&self, addr: Option<RegisterAddress>) {
        self.stuck_at.set(addr);
    }

    /// Corrupt write echoes by XOR-ing them with `pattern`.
    pub fn set_echo_xor(&self, pattern: u8) {
        self.echo_xor.set(pattern);
    }

    /// Latch interrupt events or card presence in `RTSX_BIPR`.
    pub fn raise(&self, bits: RtsxIntr) {
        self.bipr.set(self.bipr.get() | bits.bits());
    }

    /// Remove the card.
    pub fn eject(&self) {
        self.bipr.set(self.bipr.get() & !RtsxIntr::CARD_EXIST.bits());
    }

    pub fn bipr(&self) -> u32 {
        self.bipr.get()
    }

    pub fn bier(&self) -> u32 {
        self.bier.get()
    }

    pub fn bipr_writes(&self) -> Vec<u32> {
        self.bipr_writes.borrow().clone()
    }

    /// Total `RTSX_HAIMR` reads since creation.
    pub fn haimr_polls(&self) -> u32 {
        self.polls.get()
    }

    pub fn accesses(&self) -> Vec<Access> {
        self.log.borrow().clone()
    }

    fn command(&self, cmd: u32) {
        let addr = RegisterAddress::from_chip((cmd >> RTSX_HAIMR_ADDR_SHIFT) as u16);
        let idx = addr.raw() as usize;
        let header = cmd & !(RTSX_HAIMR_BUSY | RTSX_HAIMR_DATA_MASK);

        let data = if cmd & RTSX_HAIMR_WRITE != 0 {
            let mask = (cmd >> RTSX_HAIMR_MASK_SHIFT) as u8;
            let value = cmd as u8;
            let mut regs = self.regs.borrow_mut();
            regs[idx] = (regs[idx] & !mask) | (value & mask);
            self.log.borrow_mut().push(Access::Write { addr, mask, value });
            value ^ self.echo_xor.get()
        } else {
            self.log.borrow_mut().push(Access::Read(addr));
            self.regs.borrow()[idx]
        };

        self.haimr.set(cmd);
        self.completion.set(header | data as u32);
        self.pending_polls.set(self.busy_polls.get());
    }

    fn poll(&self) -> u32 {
        self.polls.set(self.polls.get() + 1);

        let cmd = self.haimr.get();
        let target = RegisterAddress::from_chip((cmd >> RTSX_HAIMR_ADDR_SHIFT) as u16);
        if self.stuck.get() || self.stuck_at.get() == Some(target) {
            return cmd;
        }

        let pending = self.pending_polls.get();
        if pending > 0 {
            self.pending_polls.set(pending - 1);
            return cmd;
        }
        self.completion.get()
    }
}

impl RtsxBus for MockChip {
    fn read_u32(&self, offset: usize) -> u32 {
        match offset {
            RTSX_HAIMR => self.poll(),
            RTSX_BIPR => self.bipr.get(),
            RTSX_BIER => self.bier.get(),
            _ => 0,
        }
    }

    fn write_u32(&self, offset: usize, value: u32) {
        match offset {
            RTSX_HAIMR if value & RTSX_HAIMR_BUSY != 0 => self.command(value),
            RTSX_BIPR => {
                self.bipr_writes.borrow_mut().push(value);
                self.bipr.set(self.bipr.get() & !value);
            }
            RTSX_BIER => self.bier.set(value),
            _ => {}
        }
    }
}

/// Platform that maps every BAR onto one [`MockChip`].
pub struct FakePlatform<'c> {
    chip: &'c MockChip,
    refused: Cell<u8>,
    claimed: Cell<u8>,
    acquired: Cell<u32>,
    released: Cell<u32>,
    fail_release: Cell<bool>,
}

impl<'c> FakePlatform<'c> {
    pub fn new(chip: &'c MockChip) -> Self {
        Self {
            chip,
            refused: Cell::new(0),
            claimed: Cell::new(0),
            acquired: Cell::new(0),
            released: Cell::new(0),
            fail_release: Cell::new(false),
        }
    }

    pub fn refuse(&self, bar: BarIndex) {
        self.refused.set(self.refused.get() | (1 << bar.index()));
    }

    pub fn set_fail_release(&self, fail: bool) {
        self.fail_release.set(fail);
    }

    pub fn acquired(&self) -> u32 {
        self.acquired.get()
    }

    pub fn released(&self) -> u32 {
        self.released.get()
    }

    pub fn outstanding(&self) -> u32 {
        self.acquired.get() - self.released.get()
    }
}

impl<'c> PciMapper for FakePlatform<'c> {
    type Io = &'c MockChip;

    fn map_bar(&self, bar: BarIndex) -> RtsxResult<MappedIoRegion<Self::Io>> {
        let bit = 1u8 << bar.index();
        if (self.refused.get() | self.claimed.get()) & bit != 0 {
            return Err(RtsxError::AllocationFailed { bar: bar.index() });
        }
        self.claimed.set(self.claimed.get() | bit);
        self.acquired.set(self.acquired.get() + 1);

        let tag = 0xFE00_0000 + ((bar.index() as u64) << 12);
        Ok(MappedIoRegion::new(
            bar,
            tag,
            0xFFFF_8000_0000_0000 + tag,
            self.chip,
        ))
    }

    fn unmap_bar(&self, region: &MappedIoRegion<Self::Io>) -> RtsxResult<()> {
        let bit = 1u8 << region.bar().index();
        self.claimed.set(self.claimed.get() & !bit);
        self.released.set(self.released.get() + 1);
        if self.fail_release.get() {
            return Err(RtsxError::AllocationFailed {
                bar: region.bar().index(),
            });
        }
        Ok(())
    }
}
