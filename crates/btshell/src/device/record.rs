use crate::gap::{AddressType, BdAddr, LongTermKey};
use crate::device::store::DeviceKey;
use bitflags::bitflags;
use std::collections::HashMap;

bitflags! {
    /// Per-peer security and discovery state
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DeviceFlags: u8 {
        /// Pairing completed with bonding
        const BONDED = 0x01;
        /// The current link is encrypted
        const LINK_ENCRYPTED = 0x02;
        /// A service discovery is waiting for its result
        const SERVICE_DISCOVERY_OUTSTANDING = 0x04;
    }
}

bitflags! {
    /// Client Characteristic Configuration descriptor value
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClientConfiguration: u16 {
        const NOTIFY = 0x0001;
        const INDICATE = 0x0002;
    }
}

/// Characteristics whose client configuration is remembered per peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfiguredCharacteristic {
    InputReport,
    BootKeyboardInput,
    BootMouseInput,
    BatteryLevel,
}

/// State negotiated with one LE peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub address: BdAddr,
    pub address_type: AddressType,
    pub flags: DeviceFlags,
    pub long_term_key: Option<LongTermKey>,
    /// Identity Resolving Key distributed by the peer
    pub irk: Option<[u8; 16]>,
    pub identity_address: Option<(BdAddr, AddressType)>,
    /// Negotiated encryption key size in bytes, zero until pairing finishes
    pub encryption_key_size: u8,
    client_configuration: HashMap<ConfiguredCharacteristic, ClientConfiguration>,
}

impl DeviceRecord {
    pub fn new(address: BdAddr, address_type: AddressType) -> Self {
        Self {
            address,
            address_type,
            flags: DeviceFlags::empty(),
            long_term_key: None,
            irk: None,
            identity_address: None,
            encryption_key_size: 0,
            client_configuration: HashMap::new(),
        }
    }

    pub fn key(&self) -> DeviceKey {
        DeviceKey::new(self.address, self.address_type)
    }

    /// Take over the state `newer` negotiated under another address
    pub fn absorb(&mut self, newer: DeviceRecord) {
        self.flags |= newer.flags;
        if newer.long_term_key.is_some() {
            self.long_term_key = newer.long_term_key;
        }
        if newer.encryption_key_size != 0 {
            self.encryption_key_size = newer.encryption_key_size;
        }
        self.client_configuration.extend(newer.client_configuration);
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags.contains(DeviceFlags::LINK_ENCRYPTED)
    }

    pub fn is_bonded(&self) -> bool {
        self.flags.contains(DeviceFlags::BONDED)
    }

    pub fn client_configuration(&self, characteristic: ConfiguredCharacteristic) -> ClientConfiguration {
        self.client_configuration
            .get(&characteristic)
            .copied()
            .unwrap_or_default()
    }

    pub fn set_client_configuration(
        &mut self,
        characteristic: ConfiguredCharacteristic,
        value: ClientConfiguration,
    ) {
        self.client_configuration.insert(characteristic, value);
    }

    pub fn notifications_enabled(&self, characteristic: ConfiguredCharacteristic) -> bool {
        self.client_configuration(characteristic)
            .contains(ClientConfiguration::NOTIFY)
    }
}
