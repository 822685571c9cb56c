// Address types
pub const PUBLIC_DEVICE_ADDRESS: u8 = 0x00;
pub const RANDOM_DEVICE_ADDRESS: u8 = 0x01;
pub const PUBLIC_IDENTITY_ADDRESS: u8 = 0x02;
pub const RANDOM_IDENTITY_ADDRESS: u8 = 0x03;

// Two most significant bits of a random address
pub const RANDOM_ADDRESS_TYPE_MASK: u8 = 0xC0;
pub const RESOLVABLE_PRIVATE_ADDRESS_BITS: u8 = 0x40;
pub const STATIC_RANDOM_ADDRESS_BITS: u8 = 0xC0;

// LE advertising intervals (milliseconds)
pub const ADVERTISING_INTERVAL_MIN_MS: u16 = 100;
pub const ADVERTISING_INTERVAL_MAX_MS: u16 = 200;

// Advertising Data Types
pub const ADV_TYPE_FLAGS: u8 = 0x01;
pub const ADV_TYPE_16BIT_SERVICE_UUID_COMPLETE: u8 = 0x03;
pub const ADV_TYPE_SHORT_LOCAL_NAME: u8 = 0x08;
pub const ADV_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
pub const ADV_TYPE_TX_POWER_LEVEL: u8 = 0x0A;
pub const ADV_TYPE_APPEARANCE: u8 = 0x19;
pub const ADV_TYPE_MANUFACTURER_SPECIFIC: u8 = 0xFF;

// Advertising flags
pub const ADV_FLAG_LE_LIMITED_DISCOVERABLE: u8 = 0x01;
pub const ADV_FLAG_LE_GENERAL_DISCOVERABLE: u8 = 0x02;
pub const ADV_FLAG_BR_EDR_NOT_SUPPORTED: u8 = 0x04;

// Legacy advertising payload limit
pub const MAX_ADVERTISING_DATA_LEN: usize = 31;

// HCI status code for success
pub const HCI_STATUS_SUCCESS: u8 = 0x00;
// Disconnect reason sent on security failures
pub const HCI_ERROR_AUTHENTICATION_FAILURE: u8 = 0x05;
pub const HCI_ERROR_REMOTE_USER_TERMINATED: u8 = 0x13;
