//! Per-silicon quirk table.
//!
//! Controllers are identified by their PCI vendor, device and revision IDs.
//! Every table row matching an identity contributes its bits; the boot-time
//! overrides in [`XhciOptions`] are applied afterwards.

use bitflags::bitflags;

use crate::config::XhciOptions;

bitflags! {
    /// Behavioural workarounds toggled by higher driver layers
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ErrataBits: u32 {
        const DISABLE_MSI = 1 << 0;
        const ALLOW_CONTROLLER_DOZE = 1 << 1;
        const PARK_RING = 1 << 2;
        const INTEL_PCI_ROUTING_EXTENSION = 1 << 3;
        const DISABLE_COMPLIANCE_EXTENSION = 1 << 4;
        const INTEL_PANTHER_POINT = 1 << 5;
        const RENESAS = 1 << 6;
        const ASMEDIA = 1 << 7;
        const FRESCO_LOGIC = 1 << 8;
        const FL1100 = 1 << 9;
    }
}

/// One row of the quirk table. A `device_id` of 0 matches every device of the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrataListEntry {
    pub vendor_id: u16,
    pub device_id: u16,
    pub revision_lo: u16,
    pub revision_hi: u16,
    pub errata: ErrataBits,
}

impl ErrataListEntry {
    pub fn matches(&self, vendor_id: u16, device_id: u16, revision_id: u16) -> bool {
        self.vendor_id == vendor_id
            && (self.device_id == 0 || self.device_id == device_id)
            && (self.revision_lo..=self.revision_hi).contains(&revision_id)
    }
}

pub static ERRATA_LIST: [ErrataListEntry; 6] = [
    // Renesas uPD720200
    ErrataListEntry {
        vendor_id: 0x1033,
        device_id: 0x0194,
        revision_lo: 0,
        revision_hi: u16::MAX,
        errata: ErrataBits::RENESAS,
    },
    // Fresco Logic FL1000
    ErrataListEntry {
        vendor_id: 0x1b73,
        device_id: 0x1000,
        revision_lo: 0,
        revision_hi: u16::MAX,
        errata: ErrataBits::DISABLE_MSI,
    },
    // Intel Series 7/C210
    ErrataListEntry {
        vendor_id: 0x8086,
        device_id: 0x1e31,
        revision_lo: 0,
        revision_hi: u16::MAX,
        errata: ErrataBits::ALLOW_CONTROLLER_DOZE
            .union(ErrataBits::PARK_RING)
            .union(ErrataBits::INTEL_PCI_ROUTING_EXTENSION)
            .union(ErrataBits::DISABLE_COMPLIANCE_EXTENSION)
            .union(ErrataBits::INTEL_PANTHER_POINT),
    },
    // Any ASMedia
    ErrataListEntry {
        vendor_id: 0x1b21,
        device_id: 0,
        revision_lo: 0,
        revision_hi: u16::MAX,
        errata: ErrataBits::ASMEDIA,
    },
    // Any Fresco Logic (FL1000, FL1009, FL1100)
    ErrataListEntry {
        vendor_id: 0x1b73,
        device_id: 0,
        revision_lo: 0,
        revision_hi: u16::MAX,
        errata: ErrataBits::FRESCO_LOGIC,
    },
    // Fresco Logic FL1100, early steppings
    ErrataListEntry {
        vendor_id: 0x1b73,
        device_id: 0x1100,
        revision_lo: 0,
        revision_hi: 0x10,
        errata: ErrataBits::FL1100,
    },
];

/// OR together the bits of every row in `table` matching the identity
pub fn lookup(
    table: &[ErrataListEntry],
    vendor_id: u16,
    device_id: u16,
    revision_id: u16,
) -> ErrataBits {
    table
        .iter()
        .filter(|entry| entry.matches(vendor_id, device_id, revision_id))
        .fold(ErrataBits::empty(), |errata, entry| errata | entry.errata)
}

/// Apply boot-time overrides. `NO_INTEL_IDLE` only ever clears, `NO_MSI` only ever sets.
pub fn apply_overrides(mut errata: ErrataBits, options: XhciOptions) -> ErrataBits {
    if options.contains(XhciOptions::NO_INTEL_IDLE) {
        errata.remove(ErrataBits::ALLOW_CONTROLLER_DOZE);
    }
    if options.contains(XhciOptions::NO_MSI) {
        errata.insert(ErrataBits::DISABLE_MSI);
    }
    errata
}

/// Bus-level properties of the PCI function the controller lives on
pub trait PciPlatform {
    /// Whether the function is reached through a PCIe tunnel (Thunderbolt)
    fn is_pci_tunnelled(&self) -> bool;

    /// Ask the platform to tolerate bus stalls of at least `ns` nanoseconds
    fn require_max_bus_stall(&mut self, ns: u32);
}

/// Errata lookup bound to one controller instance
#[derive(Debug, Clone, Copy)]
pub struct ErrataRegistry {
    options: XhciOptions,
    tunnelled_bus_stall_ns: u32,
    on_thunderbolt: bool,
}

impl ErrataRegistry {
    pub fn new(options: XhciOptions, tunnelled_bus_stall_ns: u32) -> Self {
        Self {
            options,
            tunnelled_bus_stall_ns,
            on_thunderbolt: false,
        }
    }

    /// Look up the errata for a controller identity.
    ///
    /// A tunnelled attachment latches [`Self::on_thunderbolt`] and raises the
    /// platform's bus-stall floor; it does not change the returned bits.
    pub fn errata_bits<P: PciPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        vendor_id: u16,
        device_id: u16,
        revision_id: u16,
    ) -> ErrataBits {
        let errata = lookup(&ERRATA_LIST, vendor_id, device_id, revision_id);
        if platform.is_pci_tunnelled() {
            log::debug!(
                "xHCI {:04x}:{:04x} is PCI tunnelled, requiring {}ns bus stall",
                vendor_id,
                device_id,
                self.tunnelled_bus_stall_ns
            );
            self.on_thunderbolt = true;
            platform.require_max_bus_stall(self.tunnelled_bus_stall_ns);
        }
        apply_overrides(errata, self.options)
    }

    pub fn on_thunderbolt(&self) -> bool {
        self.on_thunderbolt
    }

    pub fn options(&self) -> XhciOptions {
        self.options
    }
}
