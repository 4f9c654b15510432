//! rtsz hardware-facing types
//!
//! This crate provides the definitions shared by every crate of the card
//! reader stack: PCI configuration-space layout, BAR descriptors, device
//! identity and the driver error taxonomy. Nothing here touches hardware.

#![no_std]
#![forbid(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod error;
pub mod pci;

pub use error::*;
pub use pci::{BarIndex, PciBarInfo, PciCommand, PciDeviceInfo, PciIdentity};
