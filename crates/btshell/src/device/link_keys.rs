//! Classic link key cache
//!
//! A fixed number of slots, at most one per address. Deleting with
//! [`BdAddr::NULL`] clears every slot.

use super::DeviceError;
use crate::gap::BdAddr;
use std::fmt;

pub const MAX_LINK_KEYS: usize = 16;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LinkKey(pub [u8; 16]);

impl fmt::Debug for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkKey({})", hex::encode_upper(self.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LinkKeyEntry {
    address: BdAddr,
    key: LinkKey,
}

#[derive(Debug, Clone)]
pub struct LinkKeyStore {
    slots: [Option<LinkKeyEntry>; MAX_LINK_KEYS],
}

impl Default for LinkKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkKeyStore {
    pub fn new() -> Self {
        Self {
            slots: [None; MAX_LINK_KEYS],
        }
    }

    /// Store `key` for `address`, replacing any key already held for it
    pub fn add(&mut self, address: BdAddr, key: LinkKey) -> Result<(), DeviceError> {
        if address.is_null() {
            return Err(DeviceError::NullAddress);
        }

        let slot = match self.position(&address) {
            Some(index) => index,
            None => self
                .slots
                .iter()
                .position(Option::is_none)
                .ok_or(DeviceError::StoreFull)?,
        };

        self.slots[slot] = Some(LinkKeyEntry { address, key });
        Ok(())
    }

    pub fn find(&self, address: &BdAddr) -> Option<LinkKey> {
        self.position(address)
            .and_then(|index| self.slots[index])
            .map(|entry| entry.key)
    }

    /// Delete the key for `address`, or every key for the null address
    ///
    /// Returns the number of keys removed.
    pub fn delete(&mut self, address: &BdAddr) -> usize {
        if address.is_null() {
            let count = self.len();
            self.slots = [None; MAX_LINK_KEYS];
            return count;
        }

        match self.position(address) {
            Some(index) => {
                self.slots[index] = None;
                1
            }
            None => 0,
        }
    }

    pub fn addresses(&self) -> impl Iterator<Item = BdAddr> + '_ {
        self.slots.iter().flatten().map(|entry| entry.address)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn position(&self, address: &BdAddr) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.map_or(false, |entry| entry.address == *address))
    }
}
