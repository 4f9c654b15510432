//! Chip variants and per-device flags.

use bitflags::bitflags;
use rtsz_abi::BarIndex;

use super::regs::{RTSX_IC_VERSION_A, RTSX_IC_VERSION_B, RTSX_IC_VERSION_C, RTSX_IC_VERSION_D};

bitflags! {
    /// Per-device flags.
    ///
    /// Model bits and `BAR1` come from the device table and never change.
    /// `CARD_PRESENT` and `RTS5229_TYPE_C` are discovered during bring-up.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct RtsxFlags: u32 {
        const CARD_PRESENT = 0x0001;
        const RTS5209 = 0x0004;
        const RTS5229 = 0x0008;
        const RTS5229_TYPE_C = 0x0010;
        const RTL8402 = 0x0020;
        const RTL8411 = 0x0040;
        const RTL8411B = 0x0080;
        const RTS5227 = 0x0100;
        const RTS522A = 0x0200;
        const RTS525A = 0x0400;
        /// Registers live behind BAR 1 instead of BAR 0.
        const BAR1 = 0x1000;
    }
}

impl RtsxFlags {
    /// Flags that bring-up may set.
    pub const RUNTIME: Self = Self::CARD_PRESENT.union(Self::RTS5229_TYPE_C);

    /// BAR holding the register window.
    #[inline]
    pub const fn bar(self) -> BarIndex {
        if self.contains(Self::BAR1) {
            BarIndex::BAR1
        } else {
            BarIndex::BAR0
        }
    }
}

/// Supported controller families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RtsxVariant {
    Rts5209,
    Rts5227,
    Rts5229,
    Rts522a,
    Rts525a,
    Rtl8402,
    Rtl8411,
    Rtl8411b,
}

impl RtsxVariant {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rts5209 => "RTS5209",
            Self::Rts5227 => "RTS5227",
            Self::Rts5229 => "RTS5229",
            Self::Rts522a => "RTS522A",
            Self::Rts525a => "RTS525A",
            Self::Rtl8402 => "RTL8402",
            Self::Rtl8411 => "RTL8411",
            Self::Rtl8411b => "RTL8411B",
        }
    }

    /// Model bit for this family.
    pub const fn model_flag(self) -> RtsxFlags {
        match self {
            Self::Rts5209 => RtsxFlags::RTS5209,
            Self::Rts5227 => RtsxFlags::RTS5227,
            Self::Rts5229 => RtsxFlags::RTS5229,
            Self::Rts522a => RtsxFlags::RTS522A,
            Self::Rts525a => RtsxFlags::RTS525A,
            Self::Rtl8402 => RtsxFlags::RTL8402,
            Self::Rtl8411 => RtsxFlags::RTL8411,
            Self::Rtl8411b => RtsxFlags::RTL8411B,
        }
    }

    /// Table flags for a stock part of this family.
    pub const fn default_flags(self) -> RtsxFlags {
        match self {
            Self::Rts525a => RtsxFlags::RTS525A.union(RtsxFlags::BAR1),
            _ => self.model_flag(),
        }
    }

    /// Only the RTS5229 reports a sub-revision through `RTSX_DUMMY_REG`.
    #[inline]
    pub const fn has_revision_register(self) -> bool {
        matches!(self, Self::Rts5229)
    }
}

/// Sub-revision decoded from the low nibble of `RTSX_DUMMY_REG`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RtsxRevision {
    A,
    B,
    C,
    D,
}

impl RtsxRevision {
    pub const fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            RTSX_IC_VERSION_A => Some(Self::A),
            RTSX_IC_VERSION_B => Some(Self::B),
            RTSX_IC_VERSION_C => Some(Self::C),
            RTSX_IC_VERSION_D => Some(Self::D),
            _ => None,
        }
    }

    /// Revision C of the RTS5229 is the type-C package.
    #[inline]
    pub const fn is_type_c(self) -> bool {
        matches!(self, Self::C)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_follows_flag() {
        assert_eq!(RtsxFlags::RTS522A.bar(), BarIndex::BAR0);
        assert_eq!(RtsxVariant::Rts525a.default_flags().bar(), BarIndex::BAR1);
        assert_eq!((RtsxFlags::RTS5229 | RtsxFlags::BAR1).bar(), BarIndex::BAR1);
    }

    #[test]
    fn only_5229_has_revision_register() {
        assert!(RtsxVariant::Rts5229.has_revision_register());
        assert!(!RtsxVariant::Rts522a.has_revision_register());
        assert!(!RtsxVariant::Rts525a.has_revision_register());
    }

    #[test]
    fn revision_nibbles() {
        assert_eq!(RtsxRevision::from_nibble(0), Some(RtsxRevision::A));
        assert_eq!(RtsxRevision::from_nibble(1), Some(RtsxRevision::B));
        assert_eq!(RtsxRevision::from_nibble(2), Some(RtsxRevision::C));
        assert_eq!(RtsxRevision::from_nibble(3), Some(RtsxRevision::D));
        assert_eq!(RtsxRevision::from_nibble(0xF), None);
        assert!(RtsxRevision::C.is_type_c());
        assert!(!RtsxRevision::D.is_type_c());
    }

    #[test]
    fn runtime_bits_are_disjoint_from_models() {
        let statics = RtsxFlags::all().difference(RtsxFlags::RUNTIME);
        assert!(!statics.intersects(RtsxFlags::RUNTIME));
        assert!(statics.contains(RtsxFlags::BAR1 | RtsxFlags::RTS525A));
    }
}
