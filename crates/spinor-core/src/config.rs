//! Driver configuration
//!
//! Poll budgets and start-up timing for the SPI-NOR driver. All records have
//! sensible defaults; with the `std` feature they can also be read from TOML.

/// Busy-poll budget for one kind of internal operation
///
/// The device is polled at most `max(1, timeout_us / poll_delay_us)` times,
/// with `poll_delay_us` between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct PollPolicy {
    /// Delay between two status polls, in microseconds
    pub poll_delay_us: u32,
    /// Total time budget, in microseconds
    pub timeout_us: u32,
}

impl PollPolicy {
    /// Create a new poll policy
    pub const fn new(poll_delay_us: u32, timeout_us: u32) -> Self {
        Self {
            poll_delay_us,
            timeout_us,
        }
    }

    /// Build a policy from a millisecond budget
    pub const fn from_millis(poll_delay_us: u32, timeout_ms: u32) -> Self {
        Self::new(poll_delay_us, timeout_ms.saturating_mul(1_000))
    }

    /// Maximum number of status polls this budget allows (at least one)
    pub const fn max_polls(&self) -> u32 {
        let polls = if self.poll_delay_us > 0 {
            self.timeout_us / self.poll_delay_us
        } else {
            // Fall back to polling once per microsecond
            self.timeout_us
        };
        if polls == 0 {
            1
        } else {
            polls
        }
    }

    /// Page program: 10us poll, 10ms timeout (typical 0.7-3ms)
    pub const PAGE_PROGRAM: Self = Self::new(10, 10_000);
    /// 4KB sector erase: 10ms poll, 1s timeout (typical 45-400ms)
    pub const SECTOR_ERASE: Self = Self::new(10_000, 1_000_000);
    /// 64KB block erase: 100ms poll, 4s timeout (typical 150-2000ms)
    pub const BLOCK_ERASE: Self = Self::new(100_000, 4_000_000);
    /// Chip erase: 1s poll, 200s timeout
    pub const CHIP_ERASE: Self = Self::new(1_000_000, 200_000_000);
}

/// SPI-NOR driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(default))]
pub struct DriverConfig {
    /// Idle time with chip-select released before identification
    pub power_up_delay_ms: u32,
    /// Budget for a single page program
    pub page_program: PollPolicy,
    /// Budget for a sector erase
    pub sector_erase: PollPolicy,
    /// Budget for a block erase
    pub block_erase: PollPolicy,
    /// Budget for a chip erase
    pub chip_erase: PollPolicy,
    /// Reject reads, writes and erases past the device capacity
    pub bounds_check: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            power_up_delay_ms: 100,
            page_program: PollPolicy::PAGE_PROGRAM,
            sector_erase: PollPolicy::SECTOR_ERASE,
            block_erase: PollPolicy::BLOCK_ERASE,
            chip_erase: PollPolicy::CHIP_ERASE,
            bounds_check: true,
        }
    }
}

/// Error type for configuration parsing
#[cfg(feature = "std")]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML syntax or schema error
    #[error("invalid driver configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(feature = "std")]
impl DriverConfig {
    /// Parse a configuration from a TOML document
    ///
    /// Missing keys keep their default values.
    ///
    /// ```toml
    /// power_up_delay_ms = 10
    ///
    /// [chip_erase]
    /// poll_delay_us = 500000
    /// timeout_us = 100000000
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_polls() {
        assert_eq!(PollPolicy::PAGE_PROGRAM.max_polls(), 1_000);
        assert_eq!(PollPolicy::CHIP_ERASE.max_polls(), 200);
        assert_eq!(PollPolicy::new(0, 50).max_polls(), 50);
        // A budget shorter than one delay still gets one poll
        assert_eq!(PollPolicy::new(1_000, 10).max_polls(), 1);
        assert_eq!(PollPolicy::new(0, 0).max_polls(), 1);
    }

    #[test]
    fn test_from_millis() {
        let policy = PollPolicy::from_millis(100, 3_000);
        assert_eq!(policy.timeout_us, 3_000_000);
        assert_eq!(policy.max_polls(), 30_000);
    }

    #[test]
    fn test_default_config() {
        let config = DriverConfig::default();
        assert_eq!(config.power_up_delay_ms, 100);
        assert!(config.bounds_check);
        assert_eq!(config.sector_erase, PollPolicy::SECTOR_ERASE);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_from_toml() {
        let config = DriverConfig::from_toml_str(
            r#"
            power_up_delay_ms = 5
            bounds_check = false

            [chip_erase]
            poll_delay_us = 500000
            timeout_us = 100000000
            "#,
        )
        .unwrap();

        assert_eq!(config.power_up_delay_ms, 5);
        assert!(!config.bounds_check);
        assert_eq!(config.chip_erase, PollPolicy::new(500_000, 100_000_000));
        // Untouched sections keep their defaults
        assert_eq!(config.page_program, PollPolicy::PAGE_PROGRAM);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_from_toml_rejects_bad_types() {
        assert!(DriverConfig::from_toml_str("power_up_delay_ms = \"soon\"").is_err());
    }
}
