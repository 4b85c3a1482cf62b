//! USB speeds, directions and the control request header.

use static_assertions::const_assert_eq;

/// Number of USB device addresses tracked by the controller (0..=127)
pub const MAX_DEVICES: usize = 128;

/// Address field of a root-hub buffer tag
pub const USB_ADDRESS_SHIFT: u32 = 8;
pub const USB_ADDRESS_MASK: u32 = 0xff00;

/// Standard request code for SET_ADDRESS
pub const REQUEST_SET_ADDRESS: u8 = 5;

/// USB device speed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbSpeed {
    /// Low speed (1.5 Mbit/s)
    Low,
    /// Full speed (12 Mbit/s)
    Full,
    /// High speed (480 Mbit/s)
    High,
    /// Super speed (5 Gbit/s)
    Super,
}

impl UsbSpeed {
    /// Decode the port speed ID stored in a slot context
    pub fn from_xhci_speed(value: u8) -> Option<Self> {
        match value {
            1 => Some(UsbSpeed::Full),
            2 => Some(UsbSpeed::Low),
            3 => Some(UsbSpeed::High),
            4 | 5 => Some(UsbSpeed::Super),
            _ => None,
        }
    }

    /// Get the speed value for xHCI slot context
    pub fn to_xhci_speed(self) -> u8 {
        match self {
            UsbSpeed::Low => 2,
            UsbSpeed::Full => 1,
            UsbSpeed::High => 3,
            UsbSpeed::Super => 4,
        }
    }

    /// Speed class as encoded in USB family tags (low = 0 .. super = 3)
    pub fn class_code(self) -> u32 {
        match self {
            UsbSpeed::Low => 0,
            UsbSpeed::Full => 1,
            UsbSpeed::High => 2,
            UsbSpeed::Super => 3,
        }
    }
}

/// Transfer direction of a control stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbDirection {
    /// Data flows from host to device
    Out,
    /// Data flows from device to host
    In,
    /// No data phase; marks the setup stage of a control transfer
    None,
}

/// The 8-byte header of a USB control request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct SetupStageHeader {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

const_assert_eq!(core::mem::size_of::<SetupStageHeader>(), SetupStageHeader::SIZE);

impl SetupStageHeader {
    pub const SIZE: usize = 8;

    pub fn new(request_type: u8, request: u8, value: u16, index: u16, length: u16) -> Self {
        Self {
            request_type,
            request,
            value,
            index,
            length,
        }
    }

    /// Decode a header from its little-endian wire form
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            request_type: bytes[0],
            request: bytes[1],
            value: u16::from_le_bytes([bytes[2], bytes[3]]),
            index: u16::from_le_bytes([bytes[4], bytes[5]]),
            length: u16::from_le_bytes([bytes[6], bytes[7]]),
        }
    }

    /// Encode the header in its little-endian wire form
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let value = self.value.to_le_bytes();
        let index = self.index.to_le_bytes();
        let length = self.length.to_le_bytes();
        [
            self.request_type,
            self.request,
            value[0],
            value[1],
            index[0],
            index[1],
            length[0],
            length[1],
        ]
    }

    /// Standard, host-to-device, device-recipient SET_ADDRESS
    pub fn is_set_address(&self) -> bool {
        self.request_type == 0 && self.request == REQUEST_SET_ADDRESS
    }

    /// Check if this is a device-to-host transfer
    pub fn is_device_to_host(&self) -> bool {
        (self.request_type & 0x80) != 0
    }
}
