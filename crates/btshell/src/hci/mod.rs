//! Bluetooth HCI (Host Controller Interface) transport
//!
//! Packet codec and raw socket used by [`HciStack`](crate::stack::HciStack)
//! to drive a Linux controller directly.

pub mod constants;
pub mod packet;
pub mod socket;


pub use packet::{ControllerEvent, HciCommand, HciEvent};
pub use socket::HciSocket;
