//! Error type shared by every xHCI entry point.

use core::fmt;

use crate::xhci::trb::CompletionCode;

/// xHCI driver error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbError {
    /// Malformed request shape or size
    BadArgument,
    /// No slot, endpoint or address to route the request to
    EndpointNotFound,
    /// Ring is being torn down
    NoDevice,
    /// Endpoint has been flagged unusable
    NotPermitted,
    /// No DMA command bound to the request
    NoMemory,
    /// DMA binding mismatch or short read
    InternalError,
    /// Transfer ring has no room for the TD
    NoResources,
    /// Operation not supported by this controller
    Unsupported,
    /// Hardware command completed with a failure code
    Command(CompletionCode),
}

impl UsbError {
    /// Get a human-readable description of the error
    pub fn description(self) -> &'static str {
        match self {
            UsbError::BadArgument => "invalid argument",
            UsbError::EndpointNotFound => "USB endpoint not found",
            UsbError::NoDevice => "USB device is going away",
            UsbError::NotPermitted => "USB endpoint is unusable",
            UsbError::NoMemory => "no DMA command for transfer buffer",
            UsbError::InternalError => "internal xHCI driver error",
            UsbError::NoResources => "transfer ring is full",
            UsbError::Unsupported => "USB operation not supported",
            UsbError::Command(_) => "xHCI command failed",
        }
    }
}

impl fmt::Display for UsbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsbError::Command(code) => write!(f, "{} ({:?})", self.description(), code),
            _ => f.write_str(self.description()),
        }
    }
}

/// Result type for xHCI operations
pub type Result<T> = core::result::Result<T, UsbError>;
