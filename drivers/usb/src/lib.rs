//! xHCI host controller transfer core
//!
//! Builds control transfers TRB by TRB (including the SET_ADDRESS to Address
//! Device translation), routes bulk and interrupt requests between the real
//! rings and the emulated root hubs, supervises slot timeouts from the
//! watchdog, and derives controller errata from PCI identity.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod command;
pub mod config;
pub mod errata;
pub mod error;
pub mod types;
pub mod xhci;

pub use command::{DmaCommand, MemoryDescriptor, UsbCommand, UsbCompletion};
pub use config::{ControllerConfig, XhciOptions};
pub use errata::{ErrataBits, ErrataRegistry, PciPlatform};
pub use error::{Result, UsbError};
pub use types::{SetupStageHeader, UsbDirection, UsbSpeed};
pub use xhci::{ControllerGate, XhciController, XhciPlatform};
