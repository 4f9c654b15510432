//! Ownership of the card reader's register window.
//!
//! A window is claimed from a [`PciMapper`] and held by a
//! [`ScopedRegion`]. The scope hands the window back exactly once, either
//! through [`ScopedRegion::release`] on detach or when it is dropped on a
//! failed attach.

use rtsz_abi::{BarIndex, RtsxResult};
use rtsz_lib::klog_warn;

use super::port::RtsxBus;

/// Platform capability to map and unmap a device's memory windows.
///
/// The kernel implementation is [`crate::pci::PciBarPlatform`]; tests use
/// a fake that counts calls.
pub trait PciMapper {
    /// Register access type handed out for a mapped window.
    type Io: RtsxBus;

    /// Claim and map `bar`. Fails with `AllocationFailed` when the BAR is
    /// absent, not memory, already claimed, or cannot be mapped.
    fn map_bar(&self, bar: BarIndex) -> RtsxResult<MappedIoRegion<Self::Io>>;

    /// Return a window obtained from [`PciMapper::map_bar`].
    fn unmap_bar(&self, region: &MappedIoRegion<Self::Io>) -> RtsxResult<()>;
}

/// A mapped register window and the bus handles describing it.
#[derive(Debug)]
pub struct MappedIoRegion<Io> {
    bar: BarIndex,
    bus_tag: u64,
    bus_handle: u64,
    io: Io,
}

impl<Io> MappedIoRegion<Io> {
    pub fn new(bar: BarIndex, bus_tag: u64, bus_handle: u64, io: Io) -> Self {
        Self {
            bar,
            bus_tag,
            bus_handle,
            io,
        }
    }

    #[inline]
    pub fn bar(&self) -> BarIndex {
        self.bar
    }

    /// Opaque bus tag (the window's physical base on x86).
    #[inline]
    pub fn bus_tag(&self) -> u64 {
        self.bus_tag
    }

    /// Opaque bus handle (the window's virtual base on x86).
    #[inline]
    pub fn bus_handle(&self) -> u64 {
        self.bus_handle
    }

    #[inline]
    pub fn io(&self) -> &Io {
        &self.io
    }
}

/// A claimed window that is returned to its platform exactly once.
pub struct ScopedRegion<'p, P: PciMapper> {
    platform: &'p P,
    region: MappedIoRegion<P::Io>,
    armed: bool,
}

impl<'p, P: PciMapper> ScopedRegion<'p, P> {
    pub fn acquire(platform: &'p P, bar: BarIndex) -> RtsxResult<Self> {
        let region = platform.map_bar(bar)?;
        Ok(Self {
            platform,
            region,
            armed: true,
        })
    }

    #[inline]
    pub fn region(&self) -> &MappedIoRegion<P::Io> {
        &self.region
    }

    /// Hand the window back now and report what the platform said.
    pub fn release(mut self) -> RtsxResult<()> {
        self.armed = false;
        self.platform.unmap_bar(&self.region)
    }
}

impl<P: PciMapper> Drop for ScopedRegion<'_, P> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        if let Err(err) = self.platform.unmap_bar(&self.region) {
            klog_warn!(
                "rtsx: releasing BAR {} failed: {}",
                self.region.bar().index(),
                err
            );
        }
    }
}
