//! LE device record store
//!
//! Records are keyed by (address, address type). A peer using a resolvable
//! private address is matched against every record holding an IRK before
//! the exact key is tried. That scan is linear with one AES operation per
//! candidate; peer counts here are one or two.

use super::record::DeviceRecord;
use crate::gap::{AddressType, BdAddr};
use crate::security::crypto;
use std::collections::HashMap;

/// Decides whether a private address was generated from an IRK
pub trait AddressResolver {
    fn resolve(&self, irk: &[u8; 16], address: &BdAddr) -> bool;
}

/// Resolves addresses with the `ah` hash
#[derive(Debug, Default, Clone, Copy)]
pub struct IrkResolver;

impl AddressResolver for IrkResolver {
    fn resolve(&self, irk: &[u8; 16], address: &BdAddr) -> bool {
        crypto::resolve_private_address(irk, address)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceKey {
    pub address: BdAddr,
    pub address_type: AddressType,
}

impl DeviceKey {
    pub fn new(address: BdAddr, address_type: AddressType) -> Self {
        Self {
            address,
            address_type,
        }
    }
}

/// Owned collection of [`DeviceRecord`]s
pub struct DeviceStore {
    records: HashMap<DeviceKey, DeviceRecord>,
    resolver: Box<dyn AddressResolver>,
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new(Box::new(IrkResolver))
    }
}

impl DeviceStore {
    pub fn new(resolver: Box<dyn AddressResolver>) -> Self {
        Self {
            records: HashMap::new(),
            resolver,
        }
    }

    /// Key of the record that represents the peer at `address`, if any
    ///
    /// Resolution order: IRK match for resolvable private addresses, exact
    /// key, then a record whose distributed identity address is `address`.
    pub fn resolve_key(&self, address: &BdAddr, address_type: AddressType) -> Option<DeviceKey> {
        if address_type == AddressType::Random && address.is_resolvable_private() {
            let resolved = self.records.iter().find(|(_, record)| {
                record
                    .irk
                    .map_or(false, |irk| self.resolver.resolve(&irk, address))
            });
            if let Some((key, _)) = resolved {
                return Some(*key);
            }
        }

        let key = DeviceKey::new(*address, address_type);
        if self.records.contains_key(&key) {
            return Some(key);
        }

        self.records
            .iter()
            .find(|(_, record)| {
                record
                    .identity_address
                    .map_or(false, |(identity, _)| identity == *address)
            })
            .map(|(key, _)| *key)
    }

    pub fn find(&self, address: &BdAddr, address_type: AddressType) -> Option<&DeviceRecord> {
        let key = self.resolve_key(address, address_type)?;
        self.records.get(&key)
    }

    pub fn find_mut(
        &mut self,
        address: &BdAddr,
        address_type: AddressType,
    ) -> Option<&mut DeviceRecord> {
        let key = self.resolve_key(address, address_type)?;
        self.records.get_mut(&key)
    }

    /// Find the record for `address` or insert an empty one
    ///
    /// Returns the record and whether it was created. An address that
    /// resolves to an existing record never creates a second one.
    pub fn create(&mut self, address: BdAddr, address_type: AddressType) -> (&mut DeviceRecord, bool) {
        let (key, created) = match self.resolve_key(&address, address_type) {
            Some(key) => (key, false),
            None => (DeviceKey::new(address, address_type), true),
        };

        let record = self
            .records
            .entry(key)
            .or_insert_with(|| DeviceRecord::new(address, address_type));
        (record, created)
    }

    /// Store the identity a peer distributed while connected from `address`
    ///
    /// The record for `address` is folded into the one keyed by the identity
    /// address, so the peer keeps a single record whichever address it
    /// connects from next.
    pub fn bind_identity(
        &mut self,
        address: &BdAddr,
        address_type: AddressType,
        irk: [u8; 16],
        identity: BdAddr,
        identity_type: AddressType,
    ) -> &mut DeviceRecord {
        let identity_key = DeviceKey::new(identity, identity_type.device_type());
        let current = self
            .resolve_key(address, address_type)
            .filter(|key| *key != identity_key)
            .and_then(|key| self.records.remove(&key));

        let record = self
            .records
            .entry(identity_key)
            .or_insert_with(|| DeviceRecord::new(identity_key.address, identity_key.address_type));
        if let Some(current) = current {
            record.absorb(current);
        }
        record.irk = Some(irk);
        record.identity_address = Some((identity, identity_type));
        record
    }

    /// Remove the record for `address` and hand it back
    pub fn remove(&mut self, address: &BdAddr, address_type: AddressType) -> Option<DeviceRecord> {
        let key = self.resolve_key(address, address_type)?;
        self.records.remove(&key)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
