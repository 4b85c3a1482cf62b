/// Control transfer construction
///
/// Each call turns one stage of a control transfer into exactly one transfer
/// TRB on the slot's default control ring. SET_ADDRESS is intercepted and
/// carried out with an Address Device command instead of a bus request.

use alloc::sync::Arc;

use super::controller::{AddressDeviceRequest, XhciController, XhciPlatform, CONTROL_DCI};
use super::trb::{control, TransferTrb};
use crate::command::{MemoryDescriptor, UsbCommand};
use crate::error::{Result, UsbError};
use crate::types::{SetupStageHeader, UsbDirection, MAX_DEVICES};

impl<P: XhciPlatform> XhciController<P> {
    /// Queue one control stage for USB function `function`.
    ///
    /// `direction` is [`UsbDirection::None`] for the setup stage, whose 8-byte
    /// request header is read from `buffer`. Data and status stages carry the
    /// transfer direction. Validation failures return before anything is
    /// queued; once a TRB has been built the endpoint doorbell is rung even if
    /// the TD could not be placed, and the TD status is returned.
    pub fn create_control_transfer(
        &mut self,
        function: u16,
        endpoint: u8,
        command: &mut UsbCommand,
        buffer: Option<&Arc<MemoryDescriptor>>,
        buffer_size: u32,
        direction: UsbDirection,
    ) -> Result<()> {
        if endpoint != 0 {
            return Err(UsbError::BadArgument);
        }

        let slot_id = self.slot_id(function);
        if slot_id == 0 {
            return Err(UsbError::EndpointNotFound);
        }

        match self.ring(slot_id, CONTROL_DCI, 0) {
            Some(ring) if !ring.is_inactive() => {}
            _ => return Err(UsbError::BadArgument),
        }

        if self.intel_flag(slot_id) {
            return self
                .platform_mut()
                .add_dummy_command(slot_id, CONTROL_DCI, command);
        }

        self.check_control_endpoint(slot_id)?;

        if let Some(buffer) = buffer.filter(|_| buffer_size != 0) {
            let Some(dma) = command.dma_command.as_ref() else {
                log::error!("slot {}: control buffer without a DMA command", slot_id);
                return Err(UsbError::NoMemory);
            };
            if !dma.is_bound_to(buffer) {
                log::error!("slot {}: DMA command not bound to the control buffer", slot_id);
                return Err(UsbError::InternalError);
            }
        }

        let stage = if direction == UsbDirection::None {
            if buffer_size as usize != SetupStageHeader::SIZE {
                return Err(UsbError::BadArgument);
            }
            let mut bytes = [0u8; SetupStageHeader::SIZE];
            let read = buffer.map_or(0, |buffer| buffer.read_bytes(0, &mut bytes));
            if read != SetupStageHeader::SIZE {
                return Err(UsbError::InternalError);
            }

            let header = SetupStageHeader::from_bytes(&bytes);
            if header.is_set_address() {
                self.address_device_zero(slot_id, header.value)?;
                TransferTrb::no_op()
            } else {
                TransferTrb::setup_stage(bytes, setup_transfer_type(&header))
            }
        } else if buffer_size != 0 {
            TransferTrb::data_stage(direction == UsbDirection::In)
        } else if self.enumeration.device_zero.is_being_addressed {
            self.enumeration.finish_addressing();
            TransferTrb::no_op()
        } else {
            TransferTrb::status_stage(direction == UsbDirection::In)
        };

        let (ring, platform) = self.ring_and_platform_mut(slot_id, CONTROL_DCI, 0);
        let (Some(storage), Some(endpoint)) = ring.map_or((None, None), |ring| ring.parts_mut()) else {
            return Err(UsbError::InternalError);
        };

        let status = endpoint.create_tds(storage, command, 0, &stage);
        endpoint.schedule_tds(platform);
        status
    }

    fn check_control_endpoint(&self, slot_id: u8) -> Result<()> {
        let ring = self
            .ring(slot_id, CONTROL_DCI, 0)
            .ok_or(UsbError::BadArgument)?;
        if ring.delete_in_progress {
            return Err(UsbError::NoDevice);
        }
        match &ring.async_endpoint {
            None => Err(UsbError::EndpointNotFound),
            Some(endpoint) if endpoint.unusable => Err(UsbError::NotPermitted),
            Some(_) => Ok(()),
        }
    }

    /// Address the device-zero slot at `address` with an Address Device command
    fn address_device_zero(&mut self, slot_id: u8, address: u16) -> Result<()> {
        if address as usize >= MAX_DEVICES {
            log::warn!("slot {}: SET_ADDRESS to out-of-range address {}", slot_id, address);
            return Err(UsbError::BadArgument);
        }

        let endpoint_context = self.platform().endpoint_context(slot_id, CONTROL_DCI);
        let slot_context = self.platform().slot_context(slot_id);
        let request = AddressDeviceRequest {
            max_packet_size: endpoint_context.max_packet_size(),
            is_device_zero: true,
            speed: slot_context.speed(),
            tt_hub_slot_id: slot_context.tt_hub_slot_id(),
            tt_port_number: slot_context.tt_port_number(),
        };

        self.enumeration.device_zero.is_being_addressed = true;
        self.platform_mut().address_device(slot_id, &request)?;

        self.enumeration.commit_address(address as u8, slot_id);
        log::debug!("slot {} addressed as device {}", slot_id, address);
        Ok(())
    }
}

/// TRT field of a setup stage
fn setup_transfer_type(header: &SetupStageHeader) -> u32 {
    match (header.length, header.is_device_to_host()) {
        (0, _) => control::TRT_NONE,
        (_, true) => control::TRT_IN,
        (_, false) => control::TRT_OUT,
    }
}
