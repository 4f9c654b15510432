#![no_std]

#[cfg(test)]
extern crate std;

pub mod init_flag;
pub mod klog;

pub use init_flag::InitFlag;
pub use klog::{KlogLevel, KlogSink, klog_get_level, klog_register_sink, klog_set_level};
