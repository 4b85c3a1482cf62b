//! Client transfer requests and the DMA buffers bound to them.

use alloc::{sync::Arc, vec::Vec};
use core::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};
use spin::Mutex;

use crate::Result;

/// A client buffer backing a transfer.
pub struct MemoryDescriptor {
    bytes: Mutex<Vec<u8>>,
    physical_address: u64,
    tag: AtomicU32,
}

impl MemoryDescriptor {
    pub fn new(bytes: Vec<u8>, physical_address: u64) -> Arc<Self> {
        Arc::new(Self {
            bytes: Mutex::new(bytes),
            physical_address,
            tag: AtomicU32::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn physical_address(&self) -> u64 {
        self.physical_address
    }

    /// Copy bytes starting at `offset` into `out`, returning the count copied
    pub fn read_bytes(&self, offset: usize, out: &mut [u8]) -> usize {
        let bytes = self.bytes.lock();
        let Some(available) = bytes.get(offset..) else {
            return 0;
        };
        let count = available.len().min(out.len());
        out[..count].copy_from_slice(&available[..count]);
        count
    }

    pub fn write_bytes(&self, offset: usize, data: &[u8]) -> usize {
        let mut bytes = self.bytes.lock();
        let Some(available) = bytes.get_mut(offset..) else {
            return 0;
        };
        let count = available.len().min(data.len());
        available[..count].copy_from_slice(&data[..count]);
        count
    }

    pub fn tag(&self) -> u32 {
        self.tag.load(Ordering::Acquire)
    }

    pub fn set_tag(&self, tag: u32) {
        self.tag.store(tag, Ordering::Release);
    }
}

impl fmt::Debug for MemoryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDescriptor")
            .field("len", &self.len())
            .field("physical_address", &format_args!("{:#x}", self.physical_address))
            .field("tag", &self.tag())
            .finish()
    }
}

/// DMA mapping state of a command
#[derive(Debug, Default, Clone)]
pub struct DmaCommand {
    memory_descriptor: Option<Arc<MemoryDescriptor>>,
}

impl DmaCommand {
    pub fn new(memory_descriptor: Option<Arc<MemoryDescriptor>>) -> Self {
        Self { memory_descriptor }
    }

    pub fn memory_descriptor(&self) -> Option<&Arc<MemoryDescriptor>> {
        self.memory_descriptor.as_ref()
    }

    pub fn set_memory_descriptor(&mut self, memory_descriptor: Arc<MemoryDescriptor>) {
        self.memory_descriptor = Some(memory_descriptor);
    }

    pub fn clear_memory_descriptor(&mut self) {
        self.memory_descriptor = None;
    }

    /// Whether `buffer` is the descriptor this command is mapped onto
    pub fn is_bound_to(&self, buffer: &Arc<MemoryDescriptor>) -> bool {
        self.memory_descriptor
            .as_ref()
            .is_some_and(|bound| Arc::ptr_eq(bound, buffer))
    }
}

/// Completion callback: final status and the byte count reported with it
#[derive(Clone)]
pub struct UsbCompletion(Arc<dyn Fn(Result<()>, u32) + Send + Sync>);

impl UsbCompletion {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(Result<()>, u32) + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    pub fn complete(&self, status: Result<()>, length: u32) {
        (self.0)(status, length)
    }
}

impl fmt::Debug for UsbCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UsbCompletion")
    }
}

/// A client transfer request
#[derive(Debug, Default, Clone)]
pub struct UsbCommand {
    /// Target device address
    pub address: u8,
    /// Target endpoint number
    pub endpoint: u8,
    /// Stream ID for bulk streams, 0 otherwise
    pub stream_id: u16,
    /// Requested transfer length in bytes
    pub req_count: u32,
    pub buffer: Option<Arc<MemoryDescriptor>>,
    pub dma_command: Option<DmaCommand>,
    pub completion: Option<UsbCompletion>,
}

impl UsbCommand {
    /// A command whose DMA command is already bound to `buffer`
    pub fn with_buffer(address: u8, endpoint: u8, buffer: Arc<MemoryDescriptor>) -> Self {
        let req_count = u32::try_from(buffer.len()).unwrap_or(u32::MAX);
        Self {
            address,
            endpoint,
            req_count,
            dma_command: Some(DmaCommand::new(Some(buffer.clone()))),
            buffer: Some(buffer),
            ..Self::default()
        }
    }

    pub fn complete(&self, status: Result<()>, length: u32) {
        if let Some(completion) = &self.completion {
            completion.complete(status, length);
        }
    }
}
