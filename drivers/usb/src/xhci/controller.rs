/// xHCI Host Controller state
///
/// The controller owns the per-endpoint rings, the enumeration bookkeeping
/// and the watchdog state. Everything that lives outside this core (hardware
/// commands, the generic ring-append path, root hub emulation, the watchdog
/// timer) is reached through the platform traits.

use alloc::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use spin::{Mutex, MutexGuard};

use super::{
    address::{AddressMapper, DeviceZero, Enumeration},
    context::ContextReader,
    registers::{Doorbells, RegisterAccess, XhciRegister, INVALID_REGISTER_VALUE, MFINDEX_MASK},
    ring::Ring,
};
use crate::command::{MemoryDescriptor, UsbCommand, UsbCompletion};
use crate::config::ControllerConfig;
use crate::errata::{ErrataBits, ErrataRegistry, PciPlatform};
use crate::error::{Result, UsbError};
use crate::types::UsbSpeed;

/// DCI of the default control endpoint
pub const CONTROL_DCI: u8 = 1;

/// Parameters of an Address Device command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressDeviceRequest {
    pub max_packet_size: u16,
    /// The device currently answers at the default address
    pub is_device_zero: bool,
    /// Speed from the slot context, `None` if the field is not set
    pub speed: Option<UsbSpeed>,
    pub tt_hub_slot_id: u8,
    pub tt_port_number: u8,
}

/// Driver-side collaborators of the transfer core
pub trait XhciBackend {
    /// Issue Address Device for `slot_id` and wait for its completion
    fn address_device(&mut self, slot_id: u8, request: &AddressDeviceRequest) -> Result<()>;

    /// Port-level liveness of the device in `slot_id`
    fn is_still_connected_and_enabled(&mut self, slot_id: u8) -> bool;

    /// Retire transfers on `slot_id` whose deadline passed before `frame_number`
    fn check_slot_for_timeouts(&mut self, slot_id: u8, frame_number: u32);

    /// Append a bulk or interrupt transfer to its endpoint ring
    fn create_transfer(&mut self, command: &mut UsbCommand, stream_id: u16) -> Result<()>;

    /// Queue a placeholder command for rings handled through the intel workaround
    fn add_dummy_command(&mut self, slot_id: u8, dci: u8, command: &mut UsbCommand) -> Result<()>;

    /// Park an interrupt read on the emulated root hub status endpoint
    fn root_hub_queue_interrupt_read(
        &mut self,
        buffer: Arc<MemoryDescriptor>,
        length: u32,
        completion: Option<UsbCompletion>,
    ) -> Result<()>;

    /// Stop the pending watchdog timeout
    fn cancel_watchdog(&mut self);
}

/// Everything a controller instance needs from its environment
pub trait XhciPlatform: RegisterAccess + Doorbells + ContextReader + XhciBackend + PciPlatform {}

impl<T> XhciPlatform for T where T: RegisterAccess + Doorbells + ContextReader + XhciBackend + PciPlatform {}

/// USB power states, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PowerState {
    Off = 0,
    Restart = 1,
    Sleep = 2,
    LowPower = 3,
    On = 4,
}

/// Watchdog bookkeeping, present once the controller has extended state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogState {
    pub active: bool,
    /// A timer event source is attached
    pub has_timer: bool,
}

pub struct XhciController<P> {
    platform: P,
    config: ControllerConfig,
    errata: ErrataRegistry,
    /// Rings keyed by (slot ID, DCI, stream ID)
    rings: BTreeMap<(u8, u8, u16), Ring>,
    intel_flag_slots: BTreeSet<u8>,
    pub(crate) enumeration: Enumeration,
    pub(crate) watchdog: Option<WatchdogState>,
    pub(crate) power_state_changing_to: Option<PowerState>,
    pub(crate) hse_detected: bool,
    invalid_regspace: bool,
    mfindex_wrap_count: u32,
}

impl<P: XhciPlatform> XhciController<P> {
    pub fn new(platform: P, config: ControllerConfig) -> Self {
        Self {
            platform,
            errata: ErrataRegistry::new(config.options, config.tunnelled_bus_stall_ns),
            config,
            rings: BTreeMap::new(),
            intel_flag_slots: BTreeSet::new(),
            enumeration: Enumeration::default(),
            watchdog: None,
            power_state_changing_to: None,
            hse_detected: false,
            invalid_regspace: false,
            mfindex_wrap_count: 0,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Errata for the controller identity, see [`ErrataRegistry::errata_bits`]
    pub fn errata_bits(&mut self, vendor_id: u16, device_id: u16, revision_id: u16) -> ErrataBits {
        self.errata
            .errata_bits(&mut self.platform, vendor_id, device_id, revision_id)
    }

    pub fn on_thunderbolt(&self) -> bool {
        self.errata.on_thunderbolt()
    }

    /// Read a register, latching the register space invalid on an all-ones value.
    ///
    /// Once invalid, every read returns 0 without touching the hardware.
    pub fn read32_reg(&mut self, register: XhciRegister) -> u32 {
        if self.invalid_regspace {
            return 0;
        }
        let value = self.platform.read32(register);
        if value == INVALID_REGISTER_VALUE {
            log::error!("{:?} read back all ones, xHCI register space is gone", register);
            self.invalid_regspace = true;
            return 0;
        }
        value
    }

    pub fn is_register_space_invalid(&self) -> bool {
        self.invalid_regspace
    }

    /// Latch the register space invalid, e.g. on a surprise removal notification
    pub fn mark_register_space_invalid(&mut self) {
        self.invalid_regspace = true;
    }

    /// 32-bit frame counter built from MFINDEX and its wrap count
    pub fn frame_number32(&mut self) -> u32 {
        let mfindex = self.read32_reg(XhciRegister::MfIndex) & MFINDEX_MASK;
        (self.mfindex_wrap_count << 11) | (mfindex >> 3)
    }

    /// MFINDEX Wrap Event
    pub fn handle_mfindex_wrap(&mut self) {
        self.mfindex_wrap_count = self.mfindex_wrap_count.wrapping_add(1);
    }

    pub fn install_ring(&mut self, slot_id: u8, dci: u8, stream_id: u16, ring: Ring) -> Result<()> {
        if slot_id == 0 || slot_id > self.config.num_slots {
            return Err(UsbError::BadArgument);
        }
        self.rings.insert((slot_id, dci, stream_id), ring);
        Ok(())
    }

    pub fn remove_ring(&mut self, slot_id: u8, dci: u8, stream_id: u16) -> Option<Ring> {
        self.rings.remove(&(slot_id, dci, stream_id))
    }

    pub fn ring(&self, slot_id: u8, dci: u8, stream_id: u16) -> Option<&Ring> {
        debug_assert_ne!(slot_id, 0);
        self.rings.get(&(slot_id, dci, stream_id))
    }

    pub fn ring_mut(&mut self, slot_id: u8, dci: u8, stream_id: u16) -> Option<&mut Ring> {
        debug_assert_ne!(slot_id, 0);
        self.rings.get_mut(&(slot_id, dci, stream_id))
    }

    pub(crate) fn ring_and_platform_mut(
        &mut self,
        slot_id: u8,
        dci: u8,
        stream_id: u16,
    ) -> (Option<&mut Ring>, &mut P) {
        debug_assert_ne!(slot_id, 0);
        (self.rings.get_mut(&(slot_id, dci, stream_id)), &mut self.platform)
    }

    /// Route the slot's control transfers through the dummy-command workaround
    pub fn set_intel_flag(&mut self, slot_id: u8, enabled: bool) {
        if enabled {
            self.intel_flag_slots.insert(slot_id);
        } else {
            self.intel_flag_slots.remove(&slot_id);
        }
    }

    pub fn intel_flag(&self, slot_id: u8) -> bool {
        self.intel_flag_slots.contains(&slot_id)
    }

    /// Slot for a USB function address, 0 if none is active
    pub fn slot_id(&self, function: u16) -> u8 {
        self.enumeration.address_mapper.slot_id(function)
    }

    /// Start enumerating the device in `slot_id` at the default address
    pub fn begin_device_zero(&mut self, slot_id: u8, hub_address: u8, port_on_hub: u8) {
        self.enumeration
            .begin_device_zero(slot_id, hub_address, port_on_hub);
    }

    /// Forget the routing of a removed device
    pub fn release_address(&mut self, address: u8) {
        if let Some(entry) = self.enumeration.address_mapper.release(address) {
            log::debug!("address {} released from slot {}", address, entry.slot);
        }
    }

    pub fn device_zero(&self) -> &DeviceZero {
        &self.enumeration.device_zero
    }

    pub fn address_mapper(&self) -> &AddressMapper {
        &self.enumeration.address_mapper
    }

    pub fn begin_power_change(&mut self, target: PowerState) {
        self.power_state_changing_to = Some(target);
    }

    pub fn end_power_change(&mut self) {
        self.power_state_changing_to = None;
    }

    /// Attach watchdog state and mark it running
    pub fn arm_watchdog(&mut self, has_timer: bool) {
        self.watchdog = Some(WatchdogState {
            active: true,
            has_timer,
        });
    }

    pub fn watchdog(&self) -> Option<&WatchdogState> {
        self.watchdog.as_ref()
    }

    pub fn hse_detected(&self) -> bool {
        self.hse_detected
    }
}

/// Controller-wide execution gate.
///
/// Client submissions and the watchdog tick both enter the controller through
/// the gate, so ring and enumeration state never see concurrent mutation.
pub struct ControllerGate<P> {
    controller: Arc<Mutex<XhciController<P>>>,
}

impl<P> Clone for ControllerGate<P> {
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
        }
    }
}

impl<P: XhciPlatform> ControllerGate<P> {
    pub fn new(controller: XhciController<P>) -> Self {
        Self {
            controller: Arc::new(Mutex::new(controller)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, XhciController<P>> {
        self.controller.lock()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut XhciController<P>) -> R) -> R {
        let mut controller = self.controller.lock();
        f(&mut controller)
    }

    /// Watchdog timer entry point
    pub fn watchdog_tick(&self) {
        self.with(|controller| controller.check_for_timeouts());
    }
}
