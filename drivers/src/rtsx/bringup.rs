//! Post-mapping chip initialisation.
//!
//! Bring-up walks a fixed sequence of register steps. The first failing
//! step ends the sequence; nothing after it touches the chip.
//!
//! ```text
//! Start -> IdentifyRevision -> ConfigureInterruptMode
//!       -> DrainPendingInterrupts -> SampleCardPresence -> Done
//! ```

use rtsz_abi::{RtsxError, RtsxResult};
use rtsz_lib::{klog_debug, klog_error, klog_info};

use super::flags::{RtsxFlags, RtsxRevision, RtsxVariant};
use super::port::{RegisterPort, RtsxBus};
use super::regs::{
    RTSX_BIPR, RTSX_DUMMY_REG, RTSX_IC_VERSION_MASK, RTSX_INT_READ_CLR, RTSX_NFTS_TX_CTRL,
    RtsxIntr,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BringupState {
    Start,
    IdentifyRevision,
    ConfigureInterruptMode,
    DrainPendingInterrupts,
    SampleCardPresence,
    Done,
    Failed(RtsxError),
}

impl BringupState {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

/// What bring-up learned about the chip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BringupReport {
    /// Sub-revision, for variants that report one.
    pub revision: Option<RtsxRevision>,
    /// `RTSX_BIPR` as read before it was written back.
    pub pending: RtsxIntr,
    pub card_present: bool,
}

impl BringupReport {
    /// Runtime flags to merge into the device.
    pub fn runtime_flags(&self) -> RtsxFlags {
        let mut flags = RtsxFlags::empty();
        if self.revision.is_some_and(RtsxRevision::is_type_c) {
            flags |= RtsxFlags::RTS5229_TYPE_C;
        }
        if self.card_present {
            flags |= RtsxFlags::CARD_PRESENT;
        }
        flags
    }
}

/// Read the sub-revision on variants that have one.
pub fn rtsx_identify_revision<B: RtsxBus>(
    port: &RegisterPort<B>,
    variant: RtsxVariant,
) -> RtsxResult<Option<RtsxRevision>> {
    if !variant.has_revision_register() {
        return Ok(None);
    }

    let version = port.read(RTSX_DUMMY_REG)?;
    let nibble = version & RTSX_IC_VERSION_MASK;
    match RtsxRevision::from_nibble(nibble) {
        Some(revision) => Ok(Some(revision)),
        None => {
            klog_error!("rtsx: unknown IC {:02x}", version);
            Err(RtsxError::UnknownRevision(nibble))
        }
    }
}

/// Switch interrupt status to clear-on-write-back.
pub fn rtsx_configure_interrupt_mode<B: RtsxBus>(port: &RegisterPort<B>) -> RtsxResult<()> {
    port.clear_bits(RTSX_NFTS_TX_CTRL, RTSX_INT_READ_CLR)
}

/// Acknowledge everything pending and return what was pending.
///
/// With no new events in between, a second drain returns nothing.
pub fn rtsx_drain_pending_interrupts<B: RtsxBus>(bus: &B) -> RtsxIntr {
    let status = bus.read_u32(RTSX_BIPR);
    bus.write_u32(RTSX_BIPR, status);
    RtsxIntr::from_bits_retain(status)
}

#[inline]
pub fn rtsx_card_present(status: RtsxIntr) -> bool {
    status.contains(RtsxIntr::SD_EXIST)
}

/// Drives one device through the bring-up steps.
pub struct Bringup<'a, B> {
    port: &'a RegisterPort<B>,
    variant: RtsxVariant,
    state: BringupState,
    report: Option<BringupReport>,
    verbose: bool,
}

impl<'a, B: RtsxBus> Bringup<'a, B> {
    pub fn new(port: &'a RegisterPort<B>, variant: RtsxVariant) -> Self {
        Self {
            port,
            variant,
            state: BringupState::Start,
            report: None,
            verbose: false,
        }
    }

    /// Log each step at debug level.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    #[inline]
    pub fn state(&self) -> BringupState {
        self.state
    }

    /// Run to a terminal state. Later calls return the same outcome
    /// without touching the chip.
    pub fn run(&mut self) -> RtsxResult<BringupReport> {
        match (self.state, self.report) {
            (BringupState::Done, Some(report)) => return Ok(report),
            (BringupState::Failed(err), _) => return Err(err),
            _ => {}
        }

        match self.steps() {
            Ok(report) => {
                self.report = Some(report);
                self.enter(BringupState::Done);
                Ok(report)
            }
            Err(err) => {
                self.enter(BringupState::Failed(err));
                Err(err)
            }
        }
    }

    fn steps(&mut self) -> RtsxResult<BringupReport> {
        let name = self.variant.name();

        self.enter(BringupState::IdentifyRevision);
        let revision = rtsx_identify_revision(self.port, self.variant)?;
        if let Some(revision) = revision {
            klog_info!("rtsx: {} IC version {:?}", name, revision);
        }

        self.enter(BringupState::ConfigureInterruptMode);
        rtsx_configure_interrupt_mode(self.port)?;
        klog_info!("rtsx: {} interrupt write-clear enabled", name);

        self.enter(BringupState::DrainPendingInterrupts);
        let pending = rtsx_drain_pending_interrupts(self.port.bus());
        klog_info!("rtsx: {} cleared pending interrupts 0x{:08x}", name, pending.bits());

        self.enter(BringupState::SampleCardPresence);
        let card_present = rtsx_card_present(pending);

        Ok(BringupReport {
            revision,
            pending,
            card_present,
        })
    }

    fn enter(&mut self, next: BringupState) {
        if self.verbose {
            klog_debug!("rtsx: {} bring-up {:?} -> {:?}", self.variant.name(), self.state, next);
        }
        self.state = next;
    }
}
