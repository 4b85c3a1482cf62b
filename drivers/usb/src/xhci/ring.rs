/// xHCI Ring Management
///
/// Per-endpoint transfer rings and the async endpoint that turns control
/// stages into queued TDs.

use alloc::{vec, vec::Vec};
use core::mem;

use super::registers::Doorbells;
use super::trb::{control, TransferTrb, Trb, TrbType};
use crate::command::UsbCommand;
use crate::error::{Result, UsbError};

/// Largest byte count a single transfer TRB may describe
pub const MAX_TRB_TRANSFER: u32 = 0x10000;

/// Transfer Ring for one endpoint (single segment, closed by a Link TRB)
pub struct TransferRing {
    trbs: Vec<Trb>,
    physical_address: u64,
    enqueue: usize,
    /// TRBs queued but not yet retired by the event path
    occupied: usize,
    /// Current cycle state
    cycle_state: bool,
}

impl TransferRing {
    /// Create a transfer ring with room for `size - 1` TRBs plus the link
    pub fn new(size: usize, physical_address: u64) -> Result<Self> {
        if size < 2 {
            return Err(UsbError::BadArgument);
        }

        let mut trbs = vec![Trb::default(); size];
        trbs[size - 1] = Trb::link(physical_address, true);

        Ok(Self {
            trbs,
            physical_address,
            enqueue: 0,
            occupied: 0,
            cycle_state: true,
        })
    }

    /// Usable TRB slots (the link TRB excluded)
    pub fn capacity(&self) -> usize {
        self.trbs.len() - 1
    }

    /// Get the number of free TRBs in the ring
    pub fn free_trbs(&self) -> usize {
        self.capacity() - self.occupied
    }

    /// Check if the ring has space for more TRBs
    pub fn has_space(&self, count: usize) -> bool {
        self.free_trbs() >= count
    }

    /// Get the current cycle state
    pub fn cycle_state(&self) -> bool {
        self.cycle_state
    }

    pub fn physical_address(&self) -> u64 {
        self.physical_address
    }

    /// Get the physical address of the current enqueue position
    pub fn enqueue_pointer(&self) -> u64 {
        self.physical_address + (self.enqueue * mem::size_of::<Trb>()) as u64
    }

    /// Add a TRB to the ring, stamping the producer cycle bit
    pub fn enqueue_trb(&mut self, mut trb: Trb) -> Result<()> {
        if !self.has_space(1) {
            return Err(UsbError::NoResources);
        }

        trb.set_cycle_bit(self.cycle_state);
        let chained = trb.chain();
        self.trbs[self.enqueue] = trb;
        self.occupied += 1;
        self.enqueue += 1;

        if self.enqueue == self.capacity() {
            // Hand the link TRB to the controller and wrap. A TD that
            // continues past the link must stay chained across it.
            let link = &mut self.trbs[self.enqueue];
            if chained {
                link.control |= control::CH;
            } else {
                link.control &= !control::CH;
            }
            link.set_cycle_bit(self.cycle_state);
            self.enqueue = 0;
            self.cycle_state = !self.cycle_state;
        }

        Ok(())
    }

    /// Release `count` TRBs the controller has consumed
    pub fn retire(&mut self, count: usize) {
        self.occupied = self.occupied.saturating_sub(count);
    }

    /// TRBs written so far, in ring order starting at index 0
    pub fn trbs(&self) -> &[Trb] {
        &self.trbs
    }

    /// The most recently enqueued TRB
    pub fn last_enqueued(&self) -> Option<&Trb> {
        if self.occupied == 0 {
            return None;
        }
        let index = match self.enqueue {
            0 => self.capacity() - 1,
            n => n - 1,
        };
        self.trbs.get(index)
    }
}

/// Software side of a schedulable endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncEndpoint {
    slot_id: u8,
    dci: u8,
    /// Set once the endpoint has failed in a way transfers cannot recover from
    pub unusable: bool,
    queued_tds: usize,
    scheduled_tds: usize,
}

impl AsyncEndpoint {
    pub fn new(slot_id: u8, dci: u8) -> Self {
        Self {
            slot_id,
            dci,
            unusable: false,
            queued_tds: 0,
            scheduled_tds: 0,
        }
    }

    pub fn slot_id(&self) -> u8 {
        self.slot_id
    }

    pub fn dci(&self) -> u8 {
        self.dci
    }

    /// TDs placed on the ring
    pub fn queued_tds(&self) -> usize {
        self.queued_tds
    }

    /// TDs the controller has been told about
    pub fn scheduled_tds(&self) -> usize {
        self.scheduled_tds
    }

    /// Turn one transfer stage into a TD on `ring`.
    ///
    /// Immediate stages become a single TRB carrying the payload. A data stage
    /// walks the command's DMA buffer, one Data Stage TRB followed by chained
    /// Normal TRBs at most [`MAX_TRB_TRANSFER`] bytes each.
    pub fn create_tds(
        &mut self,
        ring: &mut TransferRing,
        command: &UsbCommand,
        stream_id: u16,
        stage: &TransferTrb,
    ) -> Result<()> {
        if stream_id != 0 {
            log::warn!("slot {} dci {}: streams on a control ring", self.slot_id, self.dci);
            return Err(UsbError::BadArgument);
        }

        if stage.is_immediate() {
            let size = stage.immediate_data_size.min(8) as usize;
            let mut payload = [0u8; 8];
            payload[..size].copy_from_slice(&stage.immediate[..size]);
            let trb = Trb::new(u64::from_le_bytes(payload), size as u32, stage.control);
            ring.enqueue_trb(trb)?;
            self.queued_tds += 1;
            return Ok(());
        }

        let buffer = command
            .dma_command
            .as_ref()
            .and_then(|dma| dma.memory_descriptor())
            .ok_or(UsbError::NoMemory)?;
        let length = command.req_count;
        if length as usize > buffer.len() {
            log::error!(
                "slot {} dci {}: {} byte request over a {} byte buffer",
                self.slot_id,
                self.dci,
                length,
                buffer.len()
            );
            return Err(UsbError::BadArgument);
        }
        let chunks = (length.max(1) as usize).div_ceil(MAX_TRB_TRANSFER as usize);
        if !ring.has_space(chunks) {
            return Err(UsbError::NoResources);
        }

        let mut offset = 0u32;
        for chunk in 0..chunks {
            let size = (length - offset).min(MAX_TRB_TRANSFER);
            let last = chunk + 1 == chunks;
            let mut word = if chunk == 0 {
                stage.control
            } else {
                control::type_set(TrbType::Normal)
            };
            if !last {
                word |= control::CH;
            }
            let trb = Trb::new(buffer.physical_address() + offset as u64, size, word);
            ring.enqueue_trb(trb)?;
            offset += size;
        }
        self.queued_tds += 1;
        Ok(())
    }

    /// Tell the controller about queued work on this endpoint
    pub fn schedule_tds<D: Doorbells + ?Sized>(&mut self, doorbells: &mut D) {
        self.scheduled_tds = self.queued_tds;
        doorbells.ring_doorbell(self.slot_id, self.dci, 0);
    }
}

/// An endpoint's ring as seen by transfer submission
pub struct Ring {
    storage: Option<TransferRing>,
    pub delete_in_progress: bool,
    pub async_endpoint: Option<AsyncEndpoint>,
}

impl Ring {
    pub fn new(storage: TransferRing) -> Self {
        Self {
            storage: Some(storage),
            delete_in_progress: false,
            async_endpoint: None,
        }
    }

    /// A ring record whose memory has not been allocated
    pub fn inactive() -> Self {
        Self {
            storage: None,
            delete_in_progress: false,
            async_endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: AsyncEndpoint) -> Self {
        self.async_endpoint = Some(endpoint);
        self
    }

    pub fn is_inactive(&self) -> bool {
        self.storage.is_none()
    }

    pub fn storage(&self) -> Option<&TransferRing> {
        self.storage.as_ref()
    }

    pub fn storage_mut(&mut self) -> Option<&mut TransferRing> {
        self.storage.as_mut()
    }

    /// Split borrow of the ring memory and its endpoint
    pub fn parts_mut(&mut self) -> (Option<&mut TransferRing>, Option<&mut AsyncEndpoint>) {
        (self.storage.as_mut(), self.async_endpoint.as_mut())
    }
}
