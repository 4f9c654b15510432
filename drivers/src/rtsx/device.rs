//! Per-device state owned by an attached card reader.

use rtsz_abi::{BarIndex, PciIdentity, RtsxError, RtsxResult};

use super::bringup::{Bringup, BringupState, rtsx_card_present};
use super::config::DriverConfig;
use super::flags::{RtsxFlags, RtsxRevision, RtsxVariant};
use super::host::{RtsxHost, SdCommand};
use super::port::{RegisterPort, RtsxBus};
use super::regs::{RTSX_BIPR, RtsxIntr};
use super::resource::{MappedIoRegion, PciMapper, ScopedRegion};
use super::table::RtsxDeviceMatch;

/// Table-derived facts about a device. Fixed for the device's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub pci: PciIdentity,
    pub variant: RtsxVariant,
    pub description: &'static str,
    flags: RtsxFlags,
}

impl DeviceIdentity {
    pub fn from_match(entry: &RtsxDeviceMatch) -> Self {
        Self {
            pci: entry.identity,
            variant: entry.variant,
            description: entry.description,
            flags: entry.flags.difference(RtsxFlags::RUNTIME),
        }
    }

    #[inline]
    pub fn bar(&self) -> BarIndex {
        self.flags.bar()
    }

    #[inline]
    pub fn flags(&self) -> RtsxFlags {
        self.flags
    }
}

/// An attached card reader.
///
/// Owns the register window; dropping the state or passing it to
/// [`super::rtsx_detach`] hands the window back.
pub struct DeviceState<'p, P: PciMapper> {
    identity: DeviceIdentity,
    runtime: RtsxFlags,
    revision: Option<RtsxRevision>,
    bringup: BringupState,
    initial_status: RtsxIntr,
    config: DriverConfig,
    region: ScopedRegion<'p, P>,
}

impl<'p, P: PciMapper> DeviceState<'p, P> {
    pub(super) fn new(
        identity: DeviceIdentity,
        region: ScopedRegion<'p, P>,
        config: DriverConfig,
    ) -> Self {
        Self {
            identity,
            runtime: RtsxFlags::empty(),
            revision: None,
            bringup: BringupState::Start,
            initial_status: RtsxIntr::empty(),
            config,
            region,
        }
    }

    /// Run bring-up and record what it found.
    pub(super) fn bring_up(&mut self) -> RtsxResult<()> {
        let (state, result) = {
            let port = self.port();
            let mut bringup =
                Bringup::new(&port, self.identity.variant).verbose(self.config.trace_steps());
            let result = bringup.run();
            (bringup.state(), result)
        };

        self.bringup = state;
        let report = result?;
        self.runtime |= report.runtime_flags();
        self.revision = report.revision;
        self.initial_status = report.pending;
        Ok(())
    }

    /// Indirect register port over this device's window.
    pub fn port(&self) -> RegisterPort<&P::Io> {
        RegisterPort::new(self.region.region().io(), self.config.poll_budget)
            .with_trace(self.config.trace_registers())
    }

    #[inline]
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    #[inline]
    pub fn variant(&self) -> RtsxVariant {
        self.identity.variant
    }

    #[inline]
    pub fn description(&self) -> &'static str {
        self.identity.description
    }

    #[inline]
    pub fn bar(&self) -> BarIndex {
        self.identity.bar()
    }

    /// Table flags merged with what bring-up discovered.
    #[inline]
    pub fn flags(&self) -> RtsxFlags {
        self.identity.flags | self.runtime
    }

    #[inline]
    pub fn is_card_present(&self) -> bool {
        self.runtime.contains(RtsxFlags::CARD_PRESENT)
    }

    #[inline]
    pub fn is_type_c(&self) -> bool {
        self.runtime.contains(RtsxFlags::RTS5229_TYPE_C)
    }

    #[inline]
    pub fn revision(&self) -> Option<RtsxRevision> {
        self.revision
    }

    #[inline]
    pub fn bringup_state(&self) -> BringupState {
        self.bringup
    }

    /// Interrupt status acknowledged during bring-up.
    #[inline]
    pub fn initial_status(&self) -> RtsxIntr {
        self.initial_status
    }

    #[inline]
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    #[inline]
    pub fn region(&self) -> &MappedIoRegion<P::Io> {
        self.region.region()
    }

    /// Re-read card presence without acknowledging anything.
    pub fn refresh_card_presence(&mut self) -> bool {
        let status = RtsxIntr::from_bits_retain(self.region.region().io().read_u32(RTSX_BIPR));
        let present = rtsx_card_present(status);
        self.runtime.set(RtsxFlags::CARD_PRESENT, present);
        present
    }

    /// Commands and transfers are not wired to the chip yet.
    #[inline]
    pub fn is_data_path_ready(&self) -> bool {
        false
    }

    pub(super) fn into_region(self) -> ScopedRegion<'p, P> {
        self.region
    }
}

impl<P: PciMapper> RtsxHost for DeviceState<'_, P> {
    fn send_command(&mut self, _cmd: &SdCommand) -> RtsxResult<()> {
        Err(RtsxError::Unsupported)
    }

    fn transfer(&mut self, _cmd: &SdCommand, _data: &mut [u8]) -> RtsxResult<usize> {
        Err(RtsxError::Unsupported)
    }
}
