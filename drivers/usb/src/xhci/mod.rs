/// xHCI Host Controller transfer core
///
/// Control transfer construction, bulk/interrupt routing and the watchdog
/// sweep of an xHCI (USB 3) host controller, on top of the ring, context and
/// register layers below.

pub mod address;
pub mod context;
pub mod control;
pub mod controller;
pub mod registers;
pub mod ring;
pub mod timeout;
pub mod transfer;
pub mod trb;

pub use address::{AddressMapper, AddressMapperEntry, DeviceZero, Enumeration};
pub use context::{ContextReader, EndpointContext, EndpointState, SlotContext, SlotState};
pub use controller::{
    AddressDeviceRequest, ControllerGate, PowerState, WatchdogState, XhciBackend, XhciController,
    XhciPlatform, CONTROL_DCI,
};
pub use registers::{Doorbells, MmioRegisters, RegisterAccess, XhciRegister};
pub use ring::{AsyncEndpoint, Ring, TransferRing};
pub use transfer::root_hub_buffer_tag;
pub use trb::{CompletionCode, TransferTrb, Trb, TrbType};
