/// Bulk, interrupt and isochronous submission
///
/// Interrupt reads addressed to the emulated root hubs never reach a ring;
/// everything else goes to the backend's generic ring-append path.

use super::controller::{XhciController, XhciPlatform};
use crate::command::UsbCommand;
use crate::error::{Result, UsbError};
use crate::types::{UsbSpeed, USB_ADDRESS_MASK, USB_ADDRESS_SHIFT};

/// Root hub status change endpoint
const ROOT_HUB_INTERRUPT_ENDPOINT: u8 = 1;

/// Tag identifying a root hub interrupt buffer by hub address and speed class
pub fn root_hub_buffer_tag(address: u8, speed: UsbSpeed) -> u32 {
    (((address as u32) << USB_ADDRESS_SHIFT) & USB_ADDRESS_MASK) | speed.class_code()
}

impl<P: XhciPlatform> XhciController<P> {
    pub fn create_bulk_transfer(&mut self, command: Option<&mut UsbCommand>) -> Result<()> {
        let command = command.ok_or(UsbError::BadArgument)?;
        let stream_id = command.stream_id;
        self.platform_mut().create_transfer(command, stream_id)
    }

    pub fn create_interrupt_transfer(&mut self, command: Option<&mut UsbCommand>) -> Result<()> {
        let command = command.ok_or(UsbError::BadArgument)?;
        let Some(buffer) = command.buffer.clone() else {
            return Err(UsbError::InternalError);
        };

        let speed = if command.address == self.config().hub3_address {
            UsbSpeed::Super
        } else if command.address == self.config().hub2_address {
            UsbSpeed::High
        } else {
            return self.platform_mut().create_transfer(command, 0);
        };

        // Root hub transfers are synthesized, never DMA'd.
        if let Some(dma) = command.dma_command.as_mut() {
            if dma.memory_descriptor().is_some() {
                dma.clear_memory_descriptor();
            }
        }

        if command.endpoint != ROOT_HUB_INTERRUPT_ENDPOINT {
            log::trace!(
                "root hub {} has no endpoint {}",
                command.address,
                command.endpoint
            );
            command.complete(Err(UsbError::EndpointNotFound), command.req_count);
            return Err(UsbError::EndpointNotFound);
        }

        buffer.set_tag(root_hub_buffer_tag(command.address, speed));
        log::trace!("root hub {} interrupt read of {} bytes", command.address, command.req_count);
        let length = command.req_count;
        let completion = command.completion.clone();
        self.platform_mut()
            .root_hub_queue_interrupt_read(buffer, length, completion)
    }

    /// Isochronous transfers are not handled by this controller core
    pub fn create_isoch_transfer(&mut self, command: Option<&mut UsbCommand>) -> Result<()> {
        match command {
            Some(command) => log::warn!(
                "isochronous transfer to {}:{} not supported",
                command.address,
                command.endpoint
            ),
            None => log::warn!("isochronous transfer not supported"),
        }
        Err(UsbError::Unsupported)
    }
}
