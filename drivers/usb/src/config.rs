//! Controller configuration and boot-argument overrides.

use bitflags::bitflags;

bitflags! {
    /// Process-wide behaviour overrides
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct XhciOptions: u32 {
        const NO_SLEEP = 1 << 0;
        const DEFER_INTEL_EHC_PORTS = 1 << 1;
        /// Never let the controller doze, even where the errata table allows it
        const NO_INTEL_IDLE = 1 << 2;
        /// Force legacy pin interrupts
        const NO_MSI = 1 << 3;
    }
}

impl XhciOptions {
    /// Parse overrides out of a kernel boot-argument string.
    ///
    /// `gux_options=<n>` sets the raw mask (decimal or `0x` hex); the
    /// `-gux_*` switches each add one flag. Unknown tokens are ignored.
    pub fn from_boot_args(args: &str) -> Self {
        let mut options = XhciOptions::empty();
        for token in args.split_whitespace() {
            if let Some(value) = token.strip_prefix("gux_options=") {
                match parse_number(value) {
                    Some(bits) => options |= XhciOptions::from_bits_truncate(bits),
                    None => log::warn!("ignoring malformed gux_options value {:?}", value),
                }
                continue;
            }
            options |= match token {
                "-gux_nosleep" => XhciOptions::NO_SLEEP,
                "-gux_defer_usb2" => XhciOptions::DEFER_INTEL_EHC_PORTS,
                "-gux_no_idle" => XhciOptions::NO_INTEL_IDLE,
                "-gux_nomsi" => XhciOptions::NO_MSI,
                _ => XhciOptions::empty(),
            };
        }
        options
    }
}

fn parse_number(value: &str) -> Option<u32> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

/// Static parameters of one controller instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Device slots enabled on the controller (MaxSlotsEn)
    pub num_slots: u8,
    /// USB address of the synthetic super-speed root hub
    pub hub3_address: u8,
    /// USB address of the synthetic high-speed root hub
    pub hub2_address: u8,
    pub options: XhciOptions,
    /// Bus stall floor requested when the controller sits behind a PCI tunnel
    pub tunnelled_bus_stall_ns: u32,
}

impl ControllerConfig {
    pub fn new(num_slots: u8, hub3_address: u8, hub2_address: u8) -> Self {
        Self {
            num_slots,
            hub3_address,
            hub2_address,
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options: XhciOptions) -> Self {
        self.options = options;
        self
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            num_slots: 32,
            hub3_address: 1,
            hub2_address: 2,
            options: XhciOptions::empty(),
            tunnelled_bus_stall_ns: 25_000,
        }
    }
}
