#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use xhci_hcd::command::{MemoryDescriptor, UsbCommand, UsbCompletion};
use xhci_hcd::types::SetupStageHeader;
use xhci_hcd::xhci::ring::{AsyncEndpoint, Ring, TransferRing};
use xhci_hcd::xhci::{
    AddressDeviceRequest, ContextReader, Doorbells, EndpointContext, RegisterAccess, SlotContext,
    Trb, XhciBackend, XhciController, XhciRegister, CONTROL_DCI,
};
use xhci_hcd::{ControllerConfig, PciPlatform, Result};

pub const NUM_SLOTS: u8 = 4;
pub const HUB3_ADDRESS: u8 = 5;
pub const HUB2_ADDRESS: u8 = 6;

/// Records every call the controller makes into its environment.
#[derive(Default)]
pub struct MockPlatform {
    pub usbsts: u32,
    pub mfindex: u32,
    /// Values returned by MFINDEX reads before falling back to `mfindex`
    pub mfindex_script: VecDeque<u32>,
    pub register_reads: Vec<XhciRegister>,

    pub doorbells: Vec<(u8, u8, u16)>,

    pub slot_contexts: HashMap<u8, SlotContext>,
    pub endpoint_contexts: HashMap<(u8, u8), EndpointContext>,

    pub address_device_calls: Vec<(u8, AddressDeviceRequest)>,
    pub address_device_result: Option<xhci_hcd::UsbError>,

    /// Slots whose port still reports them connected and enabled
    pub connected: HashSet<u8>,
    pub timeout_checks: Vec<(u8, u32)>,

    /// (address, endpoint, stream ID) of generic ring appends
    pub transfers: Vec<(u8, u8, u16)>,
    pub dummy_commands: Vec<(u8, u8)>,
    /// (buffer tag, length, completion present)
    pub root_hub_reads: Vec<(u32, u32, bool)>,
    pub watchdog_cancels: usize,

    pub tunnelled: bool,
    pub bus_stall_requests: Vec<u32>,
}

impl RegisterAccess for MockPlatform {
    fn read32(&mut self, register: XhciRegister) -> u32 {
        self.register_reads.push(register);
        match register {
            XhciRegister::UsbSts => self.usbsts,
            XhciRegister::MfIndex => self.mfindex_script.pop_front().unwrap_or(self.mfindex),
        }
    }
}

impl Doorbells for MockPlatform {
    fn ring_doorbell(&mut self, slot_id: u8, target: u8, stream_id: u16) {
        self.doorbells.push((slot_id, target, stream_id));
    }
}

impl ContextReader for MockPlatform {
    fn slot_context(&self, slot_id: u8) -> SlotContext {
        self.slot_contexts.get(&slot_id).copied().unwrap_or_default()
    }

    fn endpoint_context(&self, slot_id: u8, dci: u8) -> EndpointContext {
        self.endpoint_contexts
            .get(&(slot_id, dci))
            .copied()
            .unwrap_or_default()
    }
}

impl XhciBackend for MockPlatform {
    fn address_device(&mut self, slot_id: u8, request: &AddressDeviceRequest) -> Result<()> {
        self.address_device_calls.push((slot_id, *request));
        match self.address_device_result {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn is_still_connected_and_enabled(&mut self, slot_id: u8) -> bool {
        self.connected.contains(&slot_id)
    }

    fn check_slot_for_timeouts(&mut self, slot_id: u8, frame_number: u32) {
        self.timeout_checks.push((slot_id, frame_number));
    }

    fn create_transfer(&mut self, command: &mut UsbCommand, stream_id: u16) -> Result<()> {
        self.transfers
            .push((command.address, command.endpoint, stream_id));
        Ok(())
    }

    fn add_dummy_command(&mut self, slot_id: u8, dci: u8, _command: &mut UsbCommand) -> Result<()> {
        self.dummy_commands.push((slot_id, dci));
        Ok(())
    }

    fn root_hub_queue_interrupt_read(
        &mut self,
        buffer: Arc<MemoryDescriptor>,
        length: u32,
        completion: Option<UsbCompletion>,
    ) -> Result<()> {
        self.root_hub_reads
            .push((buffer.tag(), length, completion.is_some()));
        Ok(())
    }

    fn cancel_watchdog(&mut self) {
        self.watchdog_cancels += 1;
    }
}

impl PciPlatform for MockPlatform {
    fn is_pci_tunnelled(&self) -> bool {
        self.tunnelled
    }

    fn require_max_bus_stall(&mut self, ns: u32) {
        self.bus_stall_requests.push(ns);
    }
}

pub fn config() -> ControllerConfig {
    ControllerConfig::new(NUM_SLOTS, HUB3_ADDRESS, HUB2_ADDRESS)
}

pub fn controller() -> XhciController<MockPlatform> {
    XhciController::new(MockPlatform::default(), config())
}

/// Controller with a live default control ring on `slot_id`
pub fn controller_with_control_ring(slot_id: u8, ring_size: usize) -> XhciController<MockPlatform> {
    let mut controller = controller();
    let storage = TransferRing::new(ring_size, 0x10_0000 * slot_id as u64).unwrap();
    let ring = Ring::new(storage).with_endpoint(AsyncEndpoint::new(slot_id, CONTROL_DCI));
    controller
        .install_ring(slot_id, CONTROL_DCI, 0, ring)
        .unwrap();
    controller
}

/// A setup packet buffer with a command already mapped onto it
pub fn setup_command(header: SetupStageHeader) -> (Arc<MemoryDescriptor>, UsbCommand) {
    let buffer = MemoryDescriptor::new(header.to_bytes().to_vec(), 0x8000);
    let command = UsbCommand::with_buffer(0, 0, buffer.clone());
    (buffer, command)
}

pub fn data_command(len: usize, physical_address: u64) -> (Arc<MemoryDescriptor>, UsbCommand) {
    let buffer = MemoryDescriptor::new(vec![0; len], physical_address);
    let command = UsbCommand::with_buffer(0, 0, buffer.clone());
    (buffer, command)
}

pub fn last_control_trb(controller: &XhciController<MockPlatform>, slot_id: u8) -> Trb {
    *controller
        .ring(slot_id, CONTROL_DCI, 0)
        .and_then(|ring| ring.storage())
        .and_then(|storage| storage.last_enqueued())
        .expect("no TRB queued on the control ring")
}

/// Completion that records every (status, length) it is called with
pub fn recording_completion() -> (UsbCompletion, Arc<Mutex<Vec<(Result<()>, u32)>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    let completion = UsbCompletion::new(move |status, length| {
        sink.lock().unwrap().push((status, length));
    });
    (completion, calls)
}
