/// USB address to slot bookkeeping.
///
/// Entry 0 of the mapper is the placeholder for the device currently being
/// enumerated at the default address. Enumeration is serialized by the
/// controller gate, so at most one device is ever "device zero".

use crate::types::MAX_DEVICES;

/// The not-yet-addressed device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceZero {
    pub is_being_addressed: bool,
    pub hub_address: u8,
    pub port_on_hub: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressMapperEntry {
    pub hub_address: u8,
    pub port_on_hub: u8,
    pub slot: u8,
    pub active: bool,
}

/// USB device address to slot ID table
#[derive(Debug, Clone)]
pub struct AddressMapper {
    entries: [AddressMapperEntry; MAX_DEVICES],
}

impl AddressMapper {
    pub fn new() -> Self {
        Self {
            entries: [AddressMapperEntry::default(); MAX_DEVICES],
        }
    }

    pub fn entry(&self, address: u8) -> Option<&AddressMapperEntry> {
        self.entries.get(address as usize)
    }

    /// Slot of an active address, 0 when there is none
    pub fn slot_id(&self, address: u16) -> u8 {
        match self.entries.get(address as usize) {
            Some(entry) if entry.active => entry.slot,
            _ => 0,
        }
    }

    /// Record a device that now answers at `address`
    pub fn assign(&mut self, address: u8, hub_address: u8, port_on_hub: u8, slot: u8) {
        if let Some(entry) = self.entries.get_mut(address as usize) {
            *entry = AddressMapperEntry {
                hub_address,
                port_on_hub,
                slot,
                active: true,
            };
        }
    }

    /// Point the default address at the slot being enumerated
    pub fn set_placeholder(&mut self, slot: u8) {
        let entry = &mut self.entries[0];
        entry.slot = slot;
        entry.active = true;
    }

    pub fn clear_placeholder(&mut self) {
        let entry = &mut self.entries[0];
        entry.slot = 0;
        entry.active = false;
    }

    pub fn release(&mut self, address: u8) -> Option<AddressMapperEntry> {
        let entry = self.entries.get_mut(address as usize)?;
        let previous = *entry;
        *entry = AddressMapperEntry::default();
        previous.active.then_some(previous)
    }

    /// Whether a SET_ADDRESS sequence is in flight
    pub fn addressing_in_progress(&self) -> bool {
        self.entries[0].active
    }
}

impl Default for AddressMapper {
    fn default() -> Self {
        Self::new()
    }
}

/// Enumeration state shared by every control endpoint of a controller
#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    pub device_zero: DeviceZero,
    pub address_mapper: AddressMapper,
}

impl Enumeration {
    /// Start enumerating the device in `slot` behind `hub_address`/`port_on_hub`
    pub fn begin_device_zero(&mut self, slot: u8, hub_address: u8, port_on_hub: u8) {
        self.device_zero.hub_address = hub_address;
        self.device_zero.port_on_hub = port_on_hub;
        self.address_mapper.set_placeholder(slot);
    }

    /// Move device zero's routing to its newly assigned address
    pub fn commit_address(&mut self, address: u8, slot: u8) {
        self.address_mapper.assign(
            address,
            self.device_zero.hub_address,
            self.device_zero.port_on_hub,
            slot,
        );
        self.device_zero.hub_address = 0;
        self.device_zero.port_on_hub = 0;
    }

    /// Tear down the address sequence once the status stage is queued
    pub fn finish_addressing(&mut self) {
        self.address_mapper.clear_placeholder();
        self.device_zero.is_being_addressed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_addresses_have_no_slot() {
        let mut mapper = AddressMapper::new();
        assert_eq!(mapper.slot_id(3), 0);
        mapper.assign(3, 0, 0, 9);
        assert_eq!(mapper.slot_id(3), 9);
        assert_eq!(mapper.slot_id(500), 0);

        let released = mapper.release(3).unwrap();
        assert_eq!(released.slot, 9);
        assert_eq!(mapper.slot_id(3), 0);
        assert_eq!(mapper.release(3), None);
    }

    #[test]
    fn address_sequence_moves_routing() {
        let mut enumeration = Enumeration::default();
        enumeration.begin_device_zero(4, 2, 3);
        assert!(enumeration.address_mapper.addressing_in_progress());
        assert_eq!(enumeration.address_mapper.slot_id(0), 4);

        enumeration.device_zero.is_being_addressed = true;
        enumeration.commit_address(6, 4);
        assert_eq!(
            enumeration.address_mapper.entry(6),
            Some(&AddressMapperEntry {
                hub_address: 2,
                port_on_hub: 3,
                slot: 4,
                active: true,
            })
        );
        assert_eq!(enumeration.device_zero.hub_address, 0);
        assert!(enumeration.device_zero.is_being_addressed);

        enumeration.finish_addressing();
        assert!(!enumeration.address_mapper.addressing_in_progress());
        assert_eq!(enumeration.address_mapper.slot_id(0), 0);
        assert!(!enumeration.device_zero.is_being_addressed);
    }
}
