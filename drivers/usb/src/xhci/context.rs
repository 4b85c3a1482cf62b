/// xHCI Device Context Structures
///
/// Read views over the slot and endpoint contexts the controller maintains in
/// the output device context. Setters exist so input contexts can be prepared
/// the same way.

use bit_field::BitField;

use crate::types::UsbSpeed;

/// Slot Context (32 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct SlotContext {
    dwords: [u32; 8],
}

impl SlotContext {
    pub fn from_dwords(dwords: [u32; 8]) -> Self {
        Self { dwords }
    }

    pub fn dwords(&self) -> [u32; 8] {
        self.dwords
    }

    /// Route string
    pub fn route_string(&self) -> u32 {
        self.dwords[0].get_bits(0..20)
    }

    pub fn set_route_string(&mut self, route: u32) {
        self.dwords[0].set_bits(0..20, route & 0xfffff);
    }

    /// Raw port speed ID
    pub fn speed_id(&self) -> u8 {
        self.dwords[0].get_bits(20..24) as u8
    }

    /// Device speed, if the slot has one assigned
    pub fn speed(&self) -> Option<UsbSpeed> {
        UsbSpeed::from_xhci_speed(self.speed_id())
    }

    pub fn set_speed(&mut self, speed: UsbSpeed) {
        self.dwords[0].set_bits(20..24, speed.to_xhci_speed() as u32);
    }

    pub fn is_hub(&self) -> bool {
        self.dwords[0].get_bit(26)
    }

    pub fn context_entries(&self) -> u8 {
        self.dwords[0].get_bits(27..32) as u8
    }

    pub fn root_hub_port(&self) -> u8 {
        self.dwords[1].get_bits(16..24) as u8
    }

    pub fn set_root_hub_port(&mut self, port: u8) {
        self.dwords[1].set_bits(16..24, port as u32);
    }

    /// Slot ID of the high-speed hub whose transaction translator serves this device
    pub fn tt_hub_slot_id(&self) -> u8 {
        self.dwords[2].get_bits(0..8) as u8
    }

    pub fn set_tt_hub_slot_id(&mut self, slot_id: u8) {
        self.dwords[2].set_bits(0..8, slot_id as u32);
    }

    /// Port of the TT hub the device is attached to
    pub fn tt_port_number(&self) -> u8 {
        self.dwords[2].get_bits(8..16) as u8
    }

    pub fn set_tt_port_number(&mut self, port: u8) {
        self.dwords[2].set_bits(8..16, port as u32);
    }

    pub fn tt_think_time(&self) -> u8 {
        self.dwords[2].get_bits(16..18) as u8
    }

    pub fn device_address(&self) -> u8 {
        self.dwords[3].get_bits(0..8) as u8
    }

    pub fn set_device_address(&mut self, address: u8) {
        self.dwords[3].set_bits(0..8, address as u32);
    }

    pub fn slot_state(&self) -> SlotState {
        SlotState::from(self.dwords[3].get_bits(27..32) as u8)
    }

    pub fn set_slot_state(&mut self, state: SlotState) {
        self.dwords[3].set_bits(27..32, state as u32);
    }
}

/// Slot state field of the slot context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    DisabledOrEnabled = 0,
    Default = 1,
    Addressed = 2,
    Configured = 3,
    Reserved = 31,
}

impl From<u8> for SlotState {
    fn from(value: u8) -> Self {
        match value {
            0 => SlotState::DisabledOrEnabled,
            1 => SlotState::Default,
            2 => SlotState::Addressed,
            3 => SlotState::Configured,
            _ => SlotState::Reserved,
        }
    }
}

/// Endpoint Context (32 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct EndpointContext {
    dwords: [u32; 8],
}

impl EndpointContext {
    pub fn from_dwords(dwords: [u32; 8]) -> Self {
        Self { dwords }
    }

    pub fn dwords(&self) -> [u32; 8] {
        self.dwords
    }

    pub fn endpoint_state(&self) -> EndpointState {
        EndpointState::from(self.dwords[0].get_bits(0..3) as u8)
    }

    pub fn set_endpoint_state(&mut self, state: EndpointState) {
        self.dwords[0].set_bits(0..3, state as u32);
    }

    pub fn interval(&self) -> u8 {
        self.dwords[0].get_bits(16..24) as u8
    }

    pub fn error_count(&self) -> u8 {
        self.dwords[1].get_bits(1..3) as u8
    }

    pub fn endpoint_type(&self) -> u8 {
        self.dwords[1].get_bits(3..6) as u8
    }

    pub fn max_burst_size(&self) -> u8 {
        self.dwords[1].get_bits(8..16) as u8
    }

    /// Get the maximum packet size
    pub fn max_packet_size(&self) -> u16 {
        self.dwords[1].get_bits(16..32) as u16
    }

    /// Set the maximum packet size
    pub fn set_max_packet_size(&mut self, size: u16) {
        self.dwords[1].set_bits(16..32, size as u32);
    }

    pub fn tr_dequeue_pointer(&self) -> u64 {
        let lo = (self.dwords[2] & !0x0f) as u64;
        let hi = self.dwords[3] as u64;
        (hi << 32) | lo
    }

    pub fn dequeue_cycle_state(&self) -> bool {
        self.dwords[2].get_bit(0)
    }

    pub fn set_tr_dequeue_pointer(&mut self, pointer: u64, cycle_state: bool) {
        self.dwords[2] = (pointer as u32 & !0x0f) | cycle_state as u32;
        self.dwords[3] = (pointer >> 32) as u32;
    }

    pub fn average_trb_length(&self) -> u16 {
        self.dwords[4].get_bits(0..16) as u16
    }
}

/// Endpoint state field of the endpoint context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    Disabled = 0,
    Running = 1,
    Halted = 2,
    Stopped = 3,
    Error = 4,
}

impl From<u8> for EndpointState {
    fn from(value: u8) -> Self {
        match value {
            1 => EndpointState::Running,
            2 => EndpointState::Halted,
            3 => EndpointState::Stopped,
            4 => EndpointState::Error,
            _ => EndpointState::Disabled,
        }
    }
}

/// Access to the output device contexts of enabled slots
pub trait ContextReader {
    fn slot_context(&self, slot_id: u8) -> SlotContext;

    /// `dci` is the device context index (1 = control endpoint)
    fn endpoint_context(&self, slot_id: u8, dci: u8) -> EndpointContext;
}
