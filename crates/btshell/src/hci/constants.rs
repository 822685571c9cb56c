//! HCI protocol constants
//!
//! This module contains constants used in the Bluetooth HCI protocol.

// HCI packet types
pub const HCI_COMMAND_PKT: u8 = 0x01;
pub const HCI_EVENT_PKT: u8 = 0x04;

// Maximum size of HCI command parameters
pub const HCI_MAX_PARAM_LEN: usize = 255;

// Common OGF (Opcode Group Field) values
pub const OGF_LINK_CTL: u8 = 0x01;
pub const OGF_HOST_CTL: u8 = 0x03;
pub const OGF_INFO_PARAM: u8 = 0x04;
pub const OGF_LE: u8 = 0x08;

// Link Control Commands (OGF: 0x01)
pub const OCF_DISCONNECT: u16 = 0x0006;

// Host Controller Commands (OGF: 0x03)
pub const OCF_SET_EVENT_MASK: u16 = 0x0001;
pub const OCF_RESET: u16 = 0x0003;
pub const OCF_WRITE_SCAN_ENABLE: u16 = 0x001A;

// Informational Parameters (OGF: 0x04)
pub const OCF_READ_BD_ADDR: u16 = 0x0009;

// LE Command OCF values (OGF: 0x08)
pub const OCF_LE_SET_EVENT_MASK: u16 = 0x0001;
pub const OCF_LE_SET_ADVERTISING_PARAMETERS: u16 = 0x0006;
pub const OCF_LE_SET_ADVERTISING_DATA: u16 = 0x0008;
pub const OCF_LE_SET_ADVERTISING_ENABLE: u16 = 0x000A;
pub const OCF_LE_LONG_TERM_KEY_REQUEST_REPLY: u16 = 0x001A;
pub const OCF_LE_LONG_TERM_KEY_REQUEST_NEGATIVE_REPLY: u16 = 0x001B;

// HCI Events
pub const EVT_DISCONN_COMPLETE: u8 = 0x05;
pub const EVT_ENCRYPTION_CHANGE: u8 = 0x08;
pub const EVT_CMD_COMPLETE: u8 = 0x0E;
pub const EVT_CMD_STATUS: u8 = 0x0F;
pub const EVT_ENCRYPTION_KEY_REFRESH_COMPLETE: u8 = 0x30;
pub const EVT_LE_META_EVENT: u8 = 0x3E;

// LE Meta Events
pub const EVT_LE_CONN_COMPLETE: u8 = 0x01;
pub const EVT_LE_LONG_TERM_KEY_REQUEST: u8 = 0x05;

// Advertising types
pub const ADV_IND: u8 = 0x00;
pub const ADV_NONCONN_IND: u8 = 0x03;

// Write Scan Enable bits
pub const SCAN_INQUIRY: u8 = 0x01;
pub const SCAN_PAGE: u8 = 0x02;

// Event masks enabling the events the stack translates
pub const DEFAULT_EVENT_MASK: u64 = 0x2000_8000_0000_0090;
pub const DEFAULT_LE_EVENT_MASK: u64 = 0x0000_0000_0000_0011;

// Socket level options (linux/include/net/bluetooth/hci.h)
pub const SOL_HCI: i32 = 0;
pub const HCI_FILTER: i32 = 2;
