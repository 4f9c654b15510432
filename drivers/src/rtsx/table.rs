//! PCI IDs handled by the driver.

use rtsz_abi::{BarIndex, PciIdentity};

use super::flags::{RtsxFlags, RtsxVariant};

pub const PCI_VENDOR_REALTEK: u16 = 0x10EC;

/// One supported part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RtsxDeviceMatch {
    pub identity: PciIdentity,
    pub variant: RtsxVariant,
    pub flags: RtsxFlags,
    pub description: &'static str,
}

impl RtsxDeviceMatch {
    /// Realtek part with the family's stock flags.
    pub const fn realtek(device: u16, variant: RtsxVariant, description: &'static str) -> Self {
        Self {
            identity: PciIdentity::new(PCI_VENDOR_REALTEK, device),
            variant,
            flags: variant.default_flags(),
            description,
        }
    }

    /// Add per-board quirk flags.
    pub const fn with_flags(mut self, extra: RtsxFlags) -> Self {
        self.flags = self.flags.union(extra);
        self
    }

    #[inline]
    pub const fn bar(&self) -> BarIndex {
        self.flags.bar()
    }
}

pub static RTSX_DEVICES: &[RtsxDeviceMatch] = &[
    RtsxDeviceMatch::realtek(
        0x5209,
        RtsxVariant::Rts5209,
        "RTS5209 PCI Express SD Card Reader",
    ),
    RtsxDeviceMatch::realtek(
        0x5227,
        RtsxVariant::Rts5227,
        "RTS5227 PCI Express SD Card Reader",
    ),
    RtsxDeviceMatch::realtek(
        0x5229,
        RtsxVariant::Rts5229,
        "RTS5229 PCI Express SD Card Reader",
    ),
    RtsxDeviceMatch::realtek(
        0x522A,
        RtsxVariant::Rts522a,
        "RTS522A PCI Express SD Card Reader",
    ),
    RtsxDeviceMatch::realtek(
        0x525A,
        RtsxVariant::Rts525a,
        "RTS525A PCI Express SD Card Reader",
    ),
    RtsxDeviceMatch::realtek(
        0x5286,
        RtsxVariant::Rtl8402,
        "RTL8402 PCI Express SD Card Reader",
    ),
    RtsxDeviceMatch::realtek(
        0x5287,
        RtsxVariant::Rtl8411b,
        "RTL8411B PCI Express SD Card Reader",
    ),
    RtsxDeviceMatch::realtek(
        0x5289,
        RtsxVariant::Rtl8411,
        "RTL8411 PCI Express SD Card Reader",
    ),
];

/// First entry matching both vendor and device ID.
pub fn rtsx_lookup(table: &[RtsxDeviceMatch], identity: PciIdentity) -> Option<&RtsxDeviceMatch> {
    table.iter().find(|entry| entry.identity == identity)
}
