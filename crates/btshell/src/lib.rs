//! btshell - Bluetooth demo shell
//!
//! Console-driven demo applications (HID over GATT keyboard, headset and
//! iBeacon) on top of a [`BluetoothStack`](stack::BluetoothStack). Console
//! lines are parsed and dispatched through per-mode command tables; stack
//! events arrive on an [`EventQueue`](stack::EventQueue) and update the
//! device records and security state before the demo reacts to them.

pub mod cli;
pub mod console;
pub mod demo;
pub mod device;
pub mod error;
pub mod gap;
pub mod hci;
pub mod runner;
pub mod security;
pub mod stack;

// Re-export common types for convenience
pub use cli::{CommandError, CommandResult, Flow, Mode, ParameterList};
pub use console::Console;
pub use demo::{Demo, DemoConfig, DemoContext, HeadsetDemo, HogpDemo, IbeaconDemo};
pub use device::{DeviceRecord, DeviceStore, LinkKeyStore};
pub use error::{HciError, StackError};
pub use gap::{AddressType, BdAddr, IoCapability, PairingCapabilities};
pub use hci::{HciCommand, HciEvent, HciSocket};
pub use runner::Runner;
pub use stack::{BluetoothStack, EventQueue, EventSender, HciStack, LoopbackStack, StackEvent};
