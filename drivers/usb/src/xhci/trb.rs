/// Transfer Request Block (TRB) definitions for xHCI
///
/// TRBs are the 16-byte descriptors software places on transfer rings. The
/// control builder produces only the fourth dword (the control word) plus an
/// optional immediate payload; the endpoint layer turns that into ring entries.

use static_assertions::const_assert_eq;

/// TRB Types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrbType {
    // Transfer TRBs
    Normal = 1,
    SetupStage = 2,
    DataStage = 3,
    StatusStage = 4,
    Isoch = 5,
    Link = 6,
    EventData = 7,
    NoOp = 8,

    // Command TRBs
    EnableSlotCommand = 9,
    DisableSlotCommand = 10,
    AddressDeviceCommand = 11,
    ConfigureEndpointCommand = 12,
    EvaluateContextCommand = 13,
    ResetEndpointCommand = 14,
    StopEndpointCommand = 15,
    SetTrDequeuePointerCommand = 16,
    ResetDeviceCommand = 17,
    NoOpCommand = 23,

    // Event TRBs
    TransferEvent = 32,
    CommandCompletionEvent = 33,
    PortStatusChangeEvent = 34,
    HostControllerEvent = 37,
    MfindexWrapEvent = 39,

    // Unknown TRB type
    Unknown = 255,
}

impl From<u8> for TrbType {
    fn from(value: u8) -> Self {
        match value {
            1 => TrbType::Normal,
            2 => TrbType::SetupStage,
            3 => TrbType::DataStage,
            4 => TrbType::StatusStage,
            5 => TrbType::Isoch,
            6 => TrbType::Link,
            7 => TrbType::EventData,
            8 => TrbType::NoOp,
            9 => TrbType::EnableSlotCommand,
            10 => TrbType::DisableSlotCommand,
            11 => TrbType::AddressDeviceCommand,
            12 => TrbType::ConfigureEndpointCommand,
            13 => TrbType::EvaluateContextCommand,
            14 => TrbType::ResetEndpointCommand,
            15 => TrbType::StopEndpointCommand,
            16 => TrbType::SetTrDequeuePointerCommand,
            17 => TrbType::ResetDeviceCommand,
            23 => TrbType::NoOpCommand,
            32 => TrbType::TransferEvent,
            33 => TrbType::CommandCompletionEvent,
            34 => TrbType::PortStatusChangeEvent,
            37 => TrbType::HostControllerEvent,
            39 => TrbType::MfindexWrapEvent,
            _ => TrbType::Unknown,
        }
    }
}

/// Control word (dword 3) fields
pub mod control {
    use super::TrbType;

    pub const CYCLE: u32 = 1 << 0;
    /// Toggle Cycle (Link TRBs)
    pub const TC: u32 = 1 << 1;
    /// Chain
    pub const CH: u32 = 1 << 4;
    /// Interrupt On Completion
    pub const IOC: u32 = 1 << 5;
    /// Immediate Data
    pub const IDT: u32 = 1 << 6;

    /// Transfer Type of a Setup Stage TRB
    pub const TRT_NONE: u32 = 0 << 16;
    pub const TRT_OUT: u32 = 2 << 16;
    pub const TRT_IN: u32 = 3 << 16;
    pub const TRT_MASK: u32 = 3 << 16;

    /// Direction of a Data or Status Stage TRB
    pub const DIR_IN: u32 = 1 << 16;

    const TYPE_SHIFT: u32 = 10;
    const TYPE_MASK: u32 = 0x3f << TYPE_SHIFT;

    pub const fn type_set(trb_type: TrbType) -> u32 {
        ((trb_type as u32) << TYPE_SHIFT) & TYPE_MASK
    }

    pub fn type_get(control: u32) -> TrbType {
        TrbType::from(((control & TYPE_MASK) >> TYPE_SHIFT) as u8)
    }
}

/// Generic TRB structure (16 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C, align(16))]
pub struct Trb {
    /// Parameter or data (64-bit)
    pub parameter: u64,
    /// Status field (32-bit)
    pub status: u32,
    /// Control field (32-bit)
    pub control: u32,
}

const_assert_eq!(core::mem::size_of::<Trb>(), 16);

impl Trb {
    pub const TRANSFER_LENGTH_MASK: u32 = 0x1ffff;

    pub fn new(parameter: u64, status: u32, control: u32) -> Self {
        Self {
            parameter,
            status,
            control,
        }
    }

    /// Get the TRB type
    pub fn trb_type(&self) -> TrbType {
        control::type_get(self.control)
    }

    /// Get the cycle bit
    pub fn cycle_bit(&self) -> bool {
        (self.control & control::CYCLE) != 0
    }

    /// Set the cycle bit
    pub fn set_cycle_bit(&mut self, cycle: bool) {
        if cycle {
            self.control |= control::CYCLE;
        } else {
            self.control &= !control::CYCLE;
        }
    }

    pub fn transfer_length(&self) -> u32 {
        self.status & Self::TRANSFER_LENGTH_MASK
    }

    pub fn interrupt_on_completion(&self) -> bool {
        (self.control & control::IOC) != 0
    }

    pub fn immediate_data(&self) -> bool {
        (self.control & control::IDT) != 0
    }

    pub fn chain(&self) -> bool {
        (self.control & control::CH) != 0
    }

    /// Link TRB pointing at `ring_segment`
    pub fn link(ring_segment: u64, toggle_cycle: bool) -> Self {
        let mut control = control::type_set(TrbType::Link);
        if toggle_cycle {
            control |= control::TC;
        }
        Self::new(ring_segment & !0x0f, 0, control)
    }
}

/// Payload size value meaning "no immediate data, use the bound DMA buffer"
pub const IMMEDIATE_DATA_NONE: u8 = 0xff;

/// One stage of a control transfer as handed to the endpoint layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferTrb {
    /// Dword 3 without the cycle bit
    pub control: u32,
    /// Bytes of `immediate` that are valid, or [`IMMEDIATE_DATA_NONE`]
    pub immediate_data_size: u8,
    pub immediate: [u8; 8],
}

impl TransferTrb {
    /// No-op TRB that still raises a completion event
    pub fn no_op() -> Self {
        Self {
            control: control::type_set(TrbType::NoOp) | control::IOC,
            immediate_data_size: 0,
            immediate: [0; 8],
        }
    }

    /// Setup Stage TRB carrying the request header as immediate data
    pub fn setup_stage(header: [u8; 8], transfer_type: u32) -> Self {
        Self {
            control: control::type_set(TrbType::SetupStage)
                | control::IDT
                | control::IOC
                | (transfer_type & control::TRT_MASK),
            immediate_data_size: 8,
            immediate: header,
        }
    }

    /// Data Stage TRB over the command's DMA buffer
    pub fn data_stage(direction_in: bool) -> Self {
        let mut control = control::type_set(TrbType::DataStage);
        if direction_in {
            control |= control::DIR_IN;
        }
        Self {
            control,
            immediate_data_size: IMMEDIATE_DATA_NONE,
            immediate: [0; 8],
        }
    }

    /// Status Stage TRB
    pub fn status_stage(direction_in: bool) -> Self {
        let mut control = control::type_set(TrbType::StatusStage) | control::IOC;
        if direction_in {
            control |= control::DIR_IN;
        }
        Self {
            control,
            immediate_data_size: 0,
            immediate: [0; 8],
        }
    }

    pub fn trb_type(&self) -> TrbType {
        control::type_get(self.control)
    }

    pub fn is_immediate(&self) -> bool {
        self.immediate_data_size != IMMEDIATE_DATA_NONE
    }
}

/// TRB Completion Codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionCode {
    Invalid,
    Success,
    DataBufferError,
    BabbleDetectedError,
    UsbTransactionError,
    TrbError,
    StallError,
    ResourceError,
    BandwidthError,
    NoSlotsAvailableError,
    SlotNotEnabledError,
    EndpointNotEnabledError,
    ShortPacket,
    ParameterError,
    ContextStateError,
    CommandAborted,
    Stopped,
    Other(u8),
}

impl From<u8> for CompletionCode {
    fn from(value: u8) -> Self {
        match value {
            0 => CompletionCode::Invalid,
            1 => CompletionCode::Success,
            2 => CompletionCode::DataBufferError,
            3 => CompletionCode::BabbleDetectedError,
            4 => CompletionCode::UsbTransactionError,
            5 => CompletionCode::TrbError,
            6 => CompletionCode::StallError,
            7 => CompletionCode::ResourceError,
            8 => CompletionCode::BandwidthError,
            9 => CompletionCode::NoSlotsAvailableError,
            11 => CompletionCode::SlotNotEnabledError,
            12 => CompletionCode::EndpointNotEnabledError,
            13 => CompletionCode::ShortPacket,
            17 => CompletionCode::ParameterError,
            19 => CompletionCode::ContextStateError,
            25 => CompletionCode::CommandAborted,
            26 => CompletionCode::Stopped,
            other => CompletionCode::Other(other),
        }
    }
}
