//! Realtek RTS5xxx / RTL84xx PCI Express SD card reader.
//!
//! The driver maps the register BAR, identifies the chip, puts interrupt
//! status into write-back-to-clear mode, acknowledges whatever is pending
//! and samples card presence. Commands and data transfers are not wired
//! up; the host interface reports `Unsupported` for both.

use rtsz_abi::{PciIdentity, RtsxError, RtsxResult};
use rtsz_lib::{InitFlag, klog_error, klog_info, klog_warn};

mod bringup;
mod config;
mod device;
mod flags;
mod host;
#[cfg(test)]
mod mock;
mod port;
mod regs;
mod resource;
mod table;

pub use bringup::{
    Bringup, BringupReport, BringupState, rtsx_card_present, rtsx_configure_interrupt_mode,
    rtsx_drain_pending_interrupts, rtsx_identify_revision,
};
pub use config::DriverConfig;
pub use device::{DeviceIdentity, DeviceState};
pub use flags::{RtsxFlags, RtsxRevision, RtsxVariant};
pub use host::{
    HostCmdKind, RTSX_ADMA_DESC_SIZE, RTSX_DMA_ADDR_LIMIT, RTSX_DMA_MAX_SEGSIZE,
    RTSX_HOSTCMD_BUFSIZE, RTSX_HOSTCMD_MAX, RTSX_MAX_SEGMENTS, RTSX_MAX_TRANSFER, RtsxHost,
    SdCommand, rtsx_dma_reachable, rtsx_hostcmd,
};
pub use port::{RTSX_POLL_BUDGET, RegisterAddress, RegisterPort, RtsxBus, Transaction};
pub use regs::*;
pub use resource::{MappedIoRegion, PciMapper, ScopedRegion};
pub use table::{PCI_VENDOR_REALTEK, RTSX_DEVICES, RtsxDeviceMatch, rtsx_lookup};

/// Attach reports the same errors as every other driver operation.
pub type AttachError = RtsxError;

static RTSX_BANNER: InitFlag = InitFlag::new();

/// Match a device against `table`.
pub fn rtsx_probe(table: &[RtsxDeviceMatch], identity: PciIdentity) -> Option<&'static str> {
    rtsx_lookup(table, identity).map(|entry| entry.description)
}

/// Map the register window and bring the chip up.
///
/// On any failure the window is released before returning and no device
/// state survives.
pub fn rtsx_attach<'p, P: PciMapper>(
    table: &[RtsxDeviceMatch],
    identity: PciIdentity,
    platform: &'p P,
    config: DriverConfig,
) -> Result<DeviceState<'p, P>, AttachError> {
    if RTSX_BANNER.claim() {
        klog_info!("rtsx: Realtek PCIe SD card reader driver");
    }

    let entry = rtsx_lookup(table, identity).ok_or(RtsxError::NoDevice {
        vendor: identity.vendor,
        device: identity.device,
    })?;
    let identity = DeviceIdentity::from_match(entry);
    let bar = identity.bar();

    let region = ScopedRegion::acquire(platform, bar).inspect_err(|_| {
        klog_error!(
            "rtsx: memory allocation of PCI base register {} failed",
            bar.index()
        );
    })?;
    klog_info!(
        "rtsx: {}: got iot 0x{:x}, ioh 0x{:x}",
        identity.description,
        region.region().bus_tag(),
        region.region().bus_handle()
    );

    let mut state = DeviceState::new(identity, region, config);
    if let Err(err) = state.bring_up() {
        klog_error!(
            "rtsx: {}: bring-up failed in {:?}: {}",
            identity.description,
            state.bringup_state(),
            err
        );
        return Err(err);
    }

    if state.is_card_present() {
        klog_info!("rtsx: {}: card present", identity.description);
    }
    klog_info!(
        "rtsx: {} attached (BAR {}, flags 0x{:x})",
        identity.description,
        bar.index(),
        state.flags().bits()
    );
    Ok(state)
}

/// Release everything `rtsx_attach` acquired.
///
/// Never fails; a platform that refuses the window back is logged.
pub fn rtsx_detach<P: PciMapper>(state: DeviceState<'_, P>) -> RtsxResult<()> {
    let description = state.description();
    let bar = state.bar();
    if let Err(err) = state.into_region().release() {
        klog_warn!(
            "rtsx: {}: releasing BAR {} failed: {}",
            description,
            bar.index(),
            err
        );
    }
    klog_info!("rtsx: {} detached", description);
    Ok(())
}
