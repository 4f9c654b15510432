use super::port::RTSX_POLL_BUDGET;

/// Tunables for one attach.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DriverConfig {
    /// `RTSX_HAIMR` polls per indirect transaction.
    pub poll_budget: u32,
    /// 0 is quiet, 1 logs bring-up steps, 2 also logs every register access.
    pub debug_level: u8,
}

impl DriverConfig {
    pub const fn new() -> Self {
        Self {
            poll_budget: RTSX_POLL_BUDGET,
            debug_level: 0,
        }
    }

    pub const fn with_poll_budget(mut self, poll_budget: u32) -> Self {
        self.poll_budget = poll_budget;
        self
    }

    pub const fn with_debug_level(mut self, debug_level: u8) -> Self {
        self.debug_level = debug_level;
        self
    }

    #[inline]
    pub const fn trace_steps(&self) -> bool {
        self.debug_level >= 1
    }

    #[inline]
    pub const fn trace_registers(&self) -> bool {
        self.debug_level >= 2
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::new()
    }
}
