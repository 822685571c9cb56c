//! Peer bookkeeping
//!
//! [`DeviceStore`] tracks LE peers across stack callbacks, keyed by address
//! and address type. [`LinkKeyStore`] caches classic link keys.

pub mod link_keys;
pub mod record;
pub mod store;


pub use link_keys::{LinkKey, LinkKeyStore, MAX_LINK_KEYS};
pub use record::{ClientConfiguration, ConfiguredCharacteristic, DeviceFlags, DeviceRecord};
pub use store::{AddressResolver, DeviceKey, DeviceStore, IrkResolver};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("No free link key slot")]
    StoreFull,

    #[error("The null address cannot be stored")]
    NullAddress,
}
