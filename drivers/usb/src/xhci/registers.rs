/// xHCI Register Definitions and Access
///
/// Register blocks are overlaid on the mapped BAR with `volatile` cells. The
/// controller only ever reads them through [`RegisterAccess`], which lets the
/// caller detect a register space that has gone away (all-ones reads).

use core::ptr::NonNull;

use volatile::{ReadOnly, Volatile};

/// MFINDEX counts microframes in its low 14 bits
pub const MFINDEX_MASK: u32 = 0x3fff;

/// Value read back from a PCI function that is no longer there
pub const INVALID_REGISTER_VALUE: u32 = u32::MAX;

/// USB Status Register bits
pub mod usbsts {
    pub const HCH: u32 = 1 << 0;
    pub const HSE: u32 = 1 << 2;
    pub const EINT: u32 = 1 << 3;
    pub const PCD: u32 = 1 << 4;
    pub const CNR: u32 = 1 << 11;
    pub const HCE: u32 = 1 << 12;
}

/// 32-bit registers the transfer core reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XhciRegister {
    /// Operational USBSTS
    UsbSts,
    /// Runtime MFINDEX
    MfIndex,
}

/// Raw register reads
pub trait RegisterAccess {
    fn read32(&mut self, register: XhciRegister) -> u32;
}

/// Doorbell array writes
pub trait Doorbells {
    /// Ring doorbell `slot_id` for `target` (a DCI, or 0 for the command ring)
    fn ring_doorbell(&mut self, slot_id: u8, target: u8, stream_id: u16);
}

/// xHCI Capability Registers
#[repr(C)]
pub struct CapabilityRegisters {
    /// Capability Register Length and Reserved
    pub caplength_reserved: ReadOnly<u16>,
    /// Interface Version Number
    pub hciversion: ReadOnly<u16>,
    /// Structural Parameters 1
    pub hcsparams1: ReadOnly<u32>,
    /// Structural Parameters 2
    pub hcsparams2: ReadOnly<u32>,
    /// Structural Parameters 3
    pub hcsparams3: ReadOnly<u32>,
    /// Capability Parameters 1
    pub hccparams1: ReadOnly<u32>,
    /// Doorbell Offset
    pub dboff: ReadOnly<u32>,
    /// Runtime Register Space Offset
    pub rtsoff: ReadOnly<u32>,
    /// Capability Parameters 2
    pub hccparams2: ReadOnly<u32>,
}

impl CapabilityRegisters {
    /// Get the capability register length
    pub fn cap_length(&self) -> u8 {
        (self.caplength_reserved.read() & 0xff) as u8
    }

    /// Get the maximum number of device slots
    pub fn max_device_slots(&self) -> u8 {
        (self.hcsparams1.read() & 0xff) as u8
    }

    /// Get the doorbell offset
    pub fn doorbell_offset(&self) -> u32 {
        self.dboff.read() & !0x03
    }

    /// Get the runtime register space offset
    pub fn runtime_offset(&self) -> u32 {
        self.rtsoff.read() & !0x1f
    }
}

/// xHCI Operational Registers
#[repr(C)]
pub struct OperationalRegisters {
    /// USB Command Register
    pub usbcmd: Volatile<u32>,
    /// USB Status Register
    pub usbsts: Volatile<u32>,
    /// Page Size Register
    pub pagesize: ReadOnly<u32>,
    _reserved1: [u32; 2],
    /// Device Notification Control Register
    pub dnctrl: Volatile<u32>,
    /// Command Ring Control Register (64-bit)
    pub crcr: Volatile<u64>,
    _reserved2: [u32; 4],
    /// Device Context Base Address Array Pointer (64-bit)
    pub dcbaap: Volatile<u64>,
    /// Configure Register
    pub config: Volatile<u32>,
}

/// xHCI Runtime Registers, up to the first interrupter
#[repr(C)]
pub struct RuntimeRegisters {
    /// Microframe Index Register
    pub mfindex: ReadOnly<u32>,
    _reserved: [u32; 7],
}

/// xHCI Doorbell Register
#[repr(C)]
pub struct DoorbellRegister {
    pub doorbell: Volatile<u32>,
}

impl DoorbellRegister {
    /// Ring a doorbell for a specific endpoint
    pub fn ring(&mut self, target: u8, stream_id: u16) {
        let value = (target as u32) | ((stream_id as u32) << 16);
        self.doorbell.write(value);
    }
}

/// Register access through a memory-mapped BAR
pub struct MmioRegisters {
    operational: NonNull<OperationalRegisters>,
    runtime: NonNull<RuntimeRegisters>,
    doorbells: NonNull<DoorbellRegister>,
    max_slots: u8,
}

impl MmioRegisters {
    /// Locate the register blocks from the capability registers at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the virtual address of the controller's mapped BAR 0,
    /// 8-byte aligned, and stay mapped for as long as the returned value lives.
    pub unsafe fn new(base: usize) -> Option<Self> {
        let capability = NonNull::new(base as *mut CapabilityRegisters)?;
        // SAFETY: the caller guarantees the capability block is mapped at `base`.
        let caps = unsafe { capability.as_ref() };
        let operational = base + caps.cap_length() as usize;
        let runtime = base + caps.runtime_offset() as usize;
        let doorbells = base + caps.doorbell_offset() as usize;

        Some(Self {
            operational: NonNull::new(operational as *mut OperationalRegisters)?,
            runtime: NonNull::new(runtime as *mut RuntimeRegisters)?,
            doorbells: NonNull::new(doorbells as *mut DoorbellRegister)?,
            max_slots: caps.max_device_slots(),
        })
    }

    pub fn max_slots(&self) -> u8 {
        self.max_slots
    }
}

// The register window is owned by one controller instance.
unsafe impl Send for MmioRegisters {}

impl RegisterAccess for MmioRegisters {
    fn read32(&mut self, register: XhciRegister) -> u32 {
        // SAFETY: the pointers were derived from a mapped BAR in `new`.
        unsafe {
            match register {
                XhciRegister::UsbSts => self.operational.as_ref().usbsts.read(),
                XhciRegister::MfIndex => self.runtime.as_ref().mfindex.read(),
            }
        }
    }
}

impl Doorbells for MmioRegisters {
    fn ring_doorbell(&mut self, slot_id: u8, target: u8, stream_id: u16) {
        if slot_id > self.max_slots {
            log::warn!("doorbell for slot {} beyond MaxSlots {}", slot_id, self.max_slots);
            return;
        }
        // SAFETY: the doorbell array has MaxSlots + 1 entries.
        unsafe {
            let doorbell = self.doorbells.as_ptr().add(slot_id as usize);
            (*doorbell).ring(target, stream_id);
        }
    }
}
