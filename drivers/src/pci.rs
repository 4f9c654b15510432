//! PCI configuration space access and BAR mapping.

use spin::Mutex;
use x86_64::PhysAddr;
use x86_64::instructions::port::Port;

use rtsz_abi::pci::{
    PCI_BAR_IO_ADDRESS_MASK, PCI_BAR_IO_SPACE, PCI_BAR_MEM_ADDRESS_MASK, PCI_BAR_MEM_PREFETCHABLE,
    PCI_BAR_MEM_TYPE_64, PCI_BAR_MEM_TYPE_MASK, PCI_COMMAND_OFFSET, PCI_DEVICE_ID_OFFSET,
    PCI_HEADER_TYPE_OFFSET, PCI_MAX_BARS, PCI_REVISION_ID_OFFSET, PCI_VENDOR_ID_INVALID,
    PCI_VENDOR_ID_OFFSET,
};
use rtsz_abi::{BarIndex, PciBarInfo, PciCommand, PciDeviceInfo, RtsxError, RtsxResult};
use rtsz_lib::{klog_debug, klog_info};
use rtsz_mm::MmioRegion;

use crate::rtsx::{MappedIoRegion, PciMapper};

const PCI_CONFIG_ADDRESS: u16 = 0xCF8;
const PCI_CONFIG_DATA: u16 = 0xCFC;

/// Dword access to configuration space.
///
/// Narrower accesses are derived from the containing dword.
pub trait PciConfigSpace {
    fn read32(&self, bus: u8, device: u8, function: u8, offset: u8) -> u32;
    fn write32(&self, bus: u8, device: u8, function: u8, offset: u8, value: u32);

    fn read16(&self, bus: u8, device: u8, function: u8, offset: u8) -> u16 {
        let value = self.read32(bus, device, function, offset);
        ((value >> ((offset & 0x2) * 8)) & 0xFFFF) as u16
    }

    fn read8(&self, bus: u8, device: u8, function: u8, offset: u8) -> u8 {
        let value = self.read32(bus, device, function, offset);
        ((value >> ((offset & 0x3) * 8)) & 0xFF) as u8
    }

    fn write16(&self, bus: u8, device: u8, function: u8, offset: u8, value: u16) {
        let dword = self.read32(bus, device, function, offset);
        let shift = (offset & 0x2) * 8;
        let mask = !(0xFFFF << shift);
        self.write32(
            bus,
            device,
            function,
            offset,
            (dword & mask) | ((value as u32) << shift),
        );
    }
}

/// Configuration mechanism #1 through ports 0xCF8/0xCFC.
pub struct PortConfigSpace {
    lock: Mutex<()>,
}

impl PortConfigSpace {
    pub const fn new() -> Self {
        Self {
            lock: Mutex::new(()),
        }
    }
}

impl Default for PortConfigSpace {
    fn default() -> Self {
        Self::new()
    }
}

#[inline(always)]
fn pci_config_addr(bus: u8, device: u8, function: u8, offset: u8) -> u32 {
    0x8000_0000
        | ((bus as u32) << 16)
        | ((device as u32) << 11)
        | ((function as u32) << 8)
        | ((offset as u32) & 0xFC)
}

impl PciConfigSpace for PortConfigSpace {
    fn read32(&self, bus: u8, device: u8, function: u8, offset: u8) -> u32 {
        let _guard = self.lock.lock();
        let mut address = Port::<u32>::new(PCI_CONFIG_ADDRESS);
        let mut data = Port::<u32>::new(PCI_CONFIG_DATA);
        // SAFETY: the address/data pair is only touched under `lock`.
        unsafe {
            address.write(pci_config_addr(bus, device, function, offset));
            data.read()
        }
    }

    fn write32(&self, bus: u8, device: u8, function: u8, offset: u8, value: u32) {
        let _guard = self.lock.lock();
        let mut address = Port::<u32>::new(PCI_CONFIG_ADDRESS);
        let mut data = Port::<u32>::new(PCI_CONFIG_DATA);
        // SAFETY: the address/data pair is only touched under `lock`.
        unsafe {
            address.write(pci_config_addr(bus, device, function, offset));
            data.write(value);
        }
    }
}

/// Size and decode one BAR by the write-all-ones probe.
pub fn pci_probe_bar<C: PciConfigSpace + ?Sized>(
    cfg: &C,
    bus: u8,
    device: u8,
    function: u8,
    bar: BarIndex,
) -> PciBarInfo {
    let bar_offset = bar.config_offset();
    let original = cfg.read32(bus, device, function, bar_offset);
    let is_io = original & PCI_BAR_IO_SPACE != 0;

    cfg.write32(bus, device, function, bar_offset, 0xFFFF_FFFF);
    let size_mask = cfg.read32(bus, device, function, bar_offset);
    cfg.write32(bus, device, function, bar_offset, original);

    if size_mask == 0 || size_mask == 0xFFFF_FFFF {
        return PciBarInfo::zeroed();
    }

    if is_io {
        let size_bits = size_mask & PCI_BAR_IO_ADDRESS_MASK;
        PciBarInfo {
            base: (original & PCI_BAR_IO_ADDRESS_MASK) as u64,
            size: (!size_bits).wrapping_add(1) as u64 & 0xFFFF,
            is_io: true,
            is_64bit: false,
            prefetchable: false,
        }
    } else {
        let is_64bit = original & PCI_BAR_MEM_TYPE_MASK == PCI_BAR_MEM_TYPE_64;
        let base_low = (original & PCI_BAR_MEM_ADDRESS_MASK) as u64;
        let base_high = if is_64bit && (bar.index() as usize) < PCI_MAX_BARS - 1 {
            cfg.read32(bus, device, function, bar_offset + 4) as u64
        } else {
            0
        };
        let size_bits = size_mask & PCI_BAR_MEM_ADDRESS_MASK;
        PciBarInfo {
            base: base_low | (base_high << 32),
            size: (!size_bits).wrapping_add(1) as u64,
            is_io: false,
            is_64bit,
            prefetchable: original & PCI_BAR_MEM_PREFETCHABLE != 0,
        }
    }
}

/// Read identity and BARs of one function. `None` when nothing answers.
pub fn pci_read_device<C: PciConfigSpace + ?Sized>(
    cfg: &C,
    bus: u8,
    device: u8,
    function: u8,
) -> Option<PciDeviceInfo> {
    let vendor_id = cfg.read16(bus, device, function, PCI_VENDOR_ID_OFFSET);
    if vendor_id == PCI_VENDOR_ID_INVALID {
        return None;
    }

    let mut info = PciDeviceInfo {
        bus,
        device,
        function,
        vendor_id,
        device_id: cfg.read16(bus, device, function, PCI_DEVICE_ID_OFFSET),
        revision: cfg.read8(bus, device, function, PCI_REVISION_ID_OFFSET),
        header_type: cfg.read8(bus, device, function, PCI_HEADER_TYPE_OFFSET) & 0x7F,
        ..PciDeviceInfo::zeroed()
    };

    if info.header_type == 0 {
        let mut idx = 0u8;
        while (idx as usize) < PCI_MAX_BARS {
            let Some(bar) = BarIndex::new(idx) else { break };
            let decoded = pci_probe_bar(cfg, bus, device, function, bar);
            info.bars[idx as usize] = decoded;
            if decoded.is_present() {
                info.bar_count += 1;
            }
            // The upper half of a 64-bit BAR is not a BAR of its own.
            idx += if decoded.is_64bit { 2 } else { 1 };
        }
    }

    Some(info)
}

/// Turn on memory decoding, returning the command register as written.
pub fn pci_enable_memory<C: PciConfigSpace + ?Sized>(cfg: &C, info: &PciDeviceInfo) -> PciCommand {
    let current = PciCommand::from_bits_retain(cfg.read16(
        info.bus,
        info.device,
        info.function,
        PCI_COMMAND_OFFSET,
    ));
    if current.contains(PciCommand::MEMORY_SPACE) {
        return current;
    }
    let enabled = current | PciCommand::MEMORY_SPACE;
    cfg.write16(
        info.bus,
        info.device,
        info.function,
        PCI_COMMAND_OFFSET,
        enabled.bits(),
    );
    enabled
}

/// Maps a probed function's memory BARs through the kernel direct map.
pub struct PciBarPlatform<C: PciConfigSpace> {
    config: C,
    info: PciDeviceInfo,
    direct_map_offset: u64,
    claimed: Mutex<u8>,
}

impl<C: PciConfigSpace> PciBarPlatform<C> {
    pub fn new(config: C, info: PciDeviceInfo, direct_map_offset: u64) -> Self {
        Self {
            config,
            info,
            direct_map_offset,
            claimed: Mutex::new(0),
        }
    }

    #[inline]
    pub fn info(&self) -> &PciDeviceInfo {
        &self.info
    }

    pub fn is_claimed(&self, bar: BarIndex) -> bool {
        *self.claimed.lock() & (1 << bar.index()) != 0
    }
}

impl<C: PciConfigSpace> PciMapper for PciBarPlatform<C> {
    type Io = MmioRegion;

    fn map_bar(&self, bar: BarIndex) -> RtsxResult<MappedIoRegion<MmioRegion>> {
        let failed = RtsxError::AllocationFailed { bar: bar.index() };
        let decoded = self.info.bar(bar);
        if !decoded.is_mmio() {
            return Err(failed);
        }

        let mut claimed = self.claimed.lock();
        let bit = 1u8 << bar.index();
        if *claimed & bit != 0 {
            return Err(failed);
        }

        let phys = PhysAddr::try_new(decoded.base).map_err(|_| failed)?;
        let size = usize::try_from(decoded.size).map_err(|_| failed)?;
        let region = MmioRegion::map(phys, size, self.direct_map_offset).ok_or(failed)?;

        let command = pci_enable_memory(&self.config, &self.info);
        klog_debug!(
            "PCI: {:02x}:{:02x}.{} BAR{} 0x{:x}+0x{:x} cmd=0x{:04x}",
            self.info.bus,
            self.info.device,
            self.info.function,
            bar.index(),
            decoded.base,
            decoded.size,
            command.bits()
        );

        *claimed |= bit;
        Ok(MappedIoRegion::new(
            bar,
            region.phys_base(),
            region.virt_base(),
            region,
        ))
    }

    fn unmap_bar(&self, region: &MappedIoRegion<MmioRegion>) -> RtsxResult<()> {
        let bar = region.bar();
        let mut claimed = self.claimed.lock();
        let bit = 1u8 << bar.index();
        if *claimed & bit == 0 {
            return Err(RtsxError::AllocationFailed { bar: bar.index() });
        }
        *claimed &= !bit;
        klog_info!(
            "PCI: {:02x}:{:02x}.{} released BAR{}",
            self.info.bus,
            self.info.device,
            self.info.function,
            bar.index()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use core::cell::RefCell;

    use super::*;

    /// One function's configuration header with sizing emulation.
    struct FakeConfig {
        dwords: RefCell<[u32; 16]>,
        bar_masks: [u32; PCI_MAX_BARS],
    }

    impl FakeConfig {
        fn rts525a() -> Self {
            let mut dwords = [0u32; 16];
            dwords[0] = 0x525A_10EC;
            dwords[1] = 0x0000_0000;
            dwords[2] = 0xFF00_0001;
            dwords[5] = 0xFE10_0000;
            dwords[6] = 0xFE20_000C;
            dwords[7] = 0x0000_0001;
            let mut bar_masks = [0u32; PCI_MAX_BARS];
            bar_masks[1] = 0xFFFF_F000;
            bar_masks[2] = 0xFFFF_0000;
            Self {
                dwords: RefCell::new(dwords),
                bar_masks,
            }
        }
    }

    impl PciConfigSpace for FakeConfig {
        fn read32(&self, _bus: u8, _device: u8, _function: u8, offset: u8) -> u32 {
            self.dwords.borrow()[(offset as usize) / 4]
        }

        fn write32(&self, _bus: u8, _device: u8, _function: u8, offset: u8, value: u32) {
            let idx = (offset as usize) / 4;
            let mut dwords = self.dwords.borrow_mut();
            dwords[idx] = match idx.checked_sub(4) {
                Some(bar) if bar < PCI_MAX_BARS && value == 0xFFFF_FFFF => {
                    let mask = self.bar_masks[bar];
                    if mask == 0 { 0 } else { mask | (dwords[idx] & 0xF) }
                }
                _ => value,
            };
        }
    }

    #[test]
    fn config_address_encoding() {
        assert_eq!(pci_config_addr(0, 0, 0, 0), 0x8000_0000);
        assert_eq!(pci_config_addr(3, 0x1C, 2, 0x17), 0x8003_E214);
    }

    #[test]
    fn narrow_accessors() {
        let cfg = FakeConfig::rts525a();
        assert_eq!(cfg.read16(0, 0, 0, 0), 0x10EC);
        assert_eq!(cfg.read16(0, 0, 0, 2), 0x525A);
        assert_eq!(cfg.read8(0, 0, 0, 0x08), 0x01);
        cfg.write16(0, 0, 0, 0x06, 0xBEEF);
        assert_eq!(cfg.read32(0, 0, 0, 0x04), 0xBEEF_0000);
    }

    #[test]
    fn reads_identity_and_bars() {
        let cfg = FakeConfig::rts525a();
        let info = pci_read_device(&cfg, 0, 0, 0).unwrap();

        assert_eq!(info.vendor_id, 0x10EC);
        assert_eq!(info.device_id, 0x525A);
        assert_eq!(info.revision, 0x01);
        assert!(!info.bar(BarIndex::BAR0).is_present());

        let bar1 = info.bar(BarIndex::BAR1);
        assert_eq!(bar1.base, 0xFE10_0000);
        assert_eq!(bar1.size, 0x1000);
        assert!(bar1.is_mmio());

        let bar2 = info.bars[2];
        assert!(bar2.is_64bit);
        assert!(bar2.prefetchable);
        assert_eq!(bar2.base, 0x1_FE20_0000);
        assert_eq!(bar2.size, 0x1_0000);
        assert_eq!(info.bar_count, 2);

        // Sizing restored the original values.
        assert_eq!(cfg.read32(0, 0, 0, 0x14), 0xFE10_0000);
    }

    #[test]
    fn absent_function() {
        struct Empty;
        impl PciConfigSpace for Empty {
            fn read32(&self, _: u8, _: u8, _: u8, _: u8) -> u32 {
                0xFFFF_FFFF
            }
            fn write32(&self, _: u8, _: u8, _: u8, _: u8, _: u32) {}
        }
        assert!(pci_read_device(&Empty, 0, 1, 0).is_none());
    }

    #[test]
    fn mapping_enables_decode_and_tracks_claims() {
        let info = pci_read_device(&FakeConfig::rts525a(), 0, 0, 0).unwrap();
        let platform = PciBarPlatform::new(FakeConfig::rts525a(), info, 0xFFFF_8000_0000_0000);

        assert_eq!(
            platform.map_bar(BarIndex::BAR0).err(),
            Some(RtsxError::AllocationFailed { bar: 0 })
        );

        let region = platform.map_bar(BarIndex::BAR1).unwrap();
        assert_eq!(region.bus_tag(), 0xFE10_0000);
        assert_eq!(region.bus_handle(), 0xFFFF_8000_FE10_0000);
        assert_eq!(region.io().size(), 0x1000);
        assert!(platform.is_claimed(BarIndex::BAR1));
        assert!(platform.map_bar(BarIndex::BAR1).is_err());

        let command = platform.config.read16(0, 0, 0, PCI_COMMAND_OFFSET);
        assert!(PciCommand::from_bits_retain(command).contains(PciCommand::MEMORY_SPACE));

        assert_eq!(platform.unmap_bar(&region), Ok(()));
        assert!(!platform.is_claimed(BarIndex::BAR1));
        assert!(platform.unmap_bar(&region).is_err());
    }
}
