//! HCI packet structures and parsing
//!
//! This module contains structures and methods for handling HCI packets.

use crate::hci::constants::*;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

/// HCI commands issued by the HCI backend
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HciCommand {
    // Link Control Commands (OGF: 0x01)
    Disconnect { handle: u16, reason: u8 },

    // Host Controller Commands (OGF: 0x03)
    Reset,
    SetEventMask { event_mask: u64 },
    WriteScanEnable { scan_enable: u8 },

    // Informational Parameters (OGF: 0x04)
    ReadBdAddr,

    // LE Commands (OGF: 0x08)
    LeSetEventMask { event_mask: u64 },
    LeSetAdvertisingParameters {
        min_interval: u16,
        max_interval: u16,
        advertising_type: u8,
        own_address_type: u8,
        peer_address_type: u8,
        peer_address: [u8; 6],
        channel_map: u8,
        filter_policy: u8,
    },
    LeSetAdvertisingData { data: Vec<u8> },
    LeSetAdvertisingEnable { enable: bool },
    LeLongTermKeyRequestReply { handle: u16, long_term_key: [u8; 16] },
    LeLongTermKeyRequestNegativeReply { handle: u16 },
}

impl HciCommand {
    /// Get the OGF and OCF for this command
    pub fn opcode_parts(&self) -> (u8, u16) {
        match self {
            Self::Disconnect { .. } => (OGF_LINK_CTL, OCF_DISCONNECT),

            Self::Reset => (OGF_HOST_CTL, OCF_RESET),
            Self::SetEventMask { .. } => (OGF_HOST_CTL, OCF_SET_EVENT_MASK),
            Self::WriteScanEnable { .. } => (OGF_HOST_CTL, OCF_WRITE_SCAN_ENABLE),

            Self::ReadBdAddr => (OGF_INFO_PARAM, OCF_READ_BD_ADDR),

            Self::LeSetEventMask { .. } => (OGF_LE, OCF_LE_SET_EVENT_MASK),
            Self::LeSetAdvertisingParameters { .. } => (OGF_LE, OCF_LE_SET_ADVERTISING_PARAMETERS),
            Self::LeSetAdvertisingData { .. } => (OGF_LE, OCF_LE_SET_ADVERTISING_DATA),
            Self::LeSetAdvertisingEnable { .. } => (OGF_LE, OCF_LE_SET_ADVERTISING_ENABLE),
            Self::LeLongTermKeyRequestReply { .. } => (OGF_LE, OCF_LE_LONG_TERM_KEY_REQUEST_REPLY),
            Self::LeLongTermKeyRequestNegativeReply { .. } => {
                (OGF_LE, OCF_LE_LONG_TERM_KEY_REQUEST_NEGATIVE_REPLY)
            }
        }
    }

    /// Packed 16-bit opcode
    pub fn opcode(&self) -> u16 {
        let (ogf, ocf) = self.opcode_parts();
        ((ogf as u16) << 10) | (ocf & 0x3ff)
    }

    /// Convert the command to its raw parameter bytes
    fn parameters(&self) -> Vec<u8> {
        match self {
            Self::Reset | Self::ReadBdAddr => vec![],

            Self::Disconnect { handle, reason } => {
                let mut params = Vec::with_capacity(3);
                params.extend_from_slice(&handle.to_le_bytes());
                params.push(*reason);
                params
            }

            Self::SetEventMask { event_mask } | Self::LeSetEventMask { event_mask } => {
                event_mask.to_le_bytes().to_vec()
            }

            Self::WriteScanEnable { scan_enable } => vec![*scan_enable],

            Self::LeSetAdvertisingParameters {
                min_interval,
                max_interval,
                advertising_type,
                own_address_type,
                peer_address_type,
                peer_address,
                channel_map,
                filter_policy,
            } => {
                let mut params = Vec::with_capacity(15);
                params.extend_from_slice(&min_interval.to_le_bytes());
                params.extend_from_slice(&max_interval.to_le_bytes());
                params.push(*advertising_type);
                params.push(*own_address_type);
                params.push(*peer_address_type);
                params.extend_from_slice(peer_address);
                params.push(*channel_map);
                params.push(*filter_policy);
                params
            }

            Self::LeSetAdvertisingData { data } => {
                // Length byte followed by a fixed 31-byte field
                let len = data.len().min(31);
                let mut params = vec![0u8; 32];
                params[0] = len as u8;
                params[1..1 + len].copy_from_slice(&data[..len]);
                params
            }

            Self::LeSetAdvertisingEnable { enable } => vec![*enable as u8],

            Self::LeLongTermKeyRequestReply {
                handle,
                long_term_key,
            } => {
                let mut params = Vec::with_capacity(18);
                params.extend_from_slice(&handle.to_le_bytes());
                params.extend_from_slice(long_term_key);
                params
            }

            Self::LeLongTermKeyRequestNegativeReply { handle } => handle.to_le_bytes().to_vec(),
        }
    }

    /// Convert the command to a raw HCI packet
    pub fn to_packet(&self) -> Vec<u8> {
        let params = self.parameters();

        let mut packet = vec![HCI_COMMAND_PKT];
        packet.extend_from_slice(&self.opcode().to_le_bytes());
        packet.push(params.len() as u8);
        packet.extend_from_slice(&params);
        packet
    }
}

/// HCI Event packet
#[derive(Debug, Clone)]
pub struct HciEvent {
    pub event_code: u8,
    pub parameter_total_length: u8,
    pub parameters: Vec<u8>,
}

impl HciEvent {
    /// Parse an HCI event from raw bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 2 {
            return None;
        }

        let event_code = data[0];
        let parameter_total_length = data[1];

        if data.len() < (parameter_total_length as usize + 2) {
            return None;
        }

        let parameters = data[2..(parameter_total_length as usize + 2)].to_vec();

        Some(HciEvent {
            event_code,
            parameter_total_length,
            parameters,
        })
    }

    /// Decode the events the HCI backend understands
    pub fn decode(&self) -> Option<ControllerEvent> {
        let mut cursor = Cursor::new(self.parameters.as_slice());
        decode_parameters(self.event_code, &mut cursor).ok()
    }
}

/// Decoded controller events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    CommandComplete {
        opcode: u16,
        status: u8,
        return_parameters: Vec<u8>,
    },
    CommandStatus {
        status: u8,
        opcode: u16,
    },
    DisconnectionComplete {
        status: u8,
        handle: u16,
        reason: u8,
    },
    EncryptionChange {
        status: u8,
        handle: u16,
        enabled: bool,
    },
    EncryptionKeyRefreshComplete {
        status: u8,
        handle: u16,
    },
    LeConnectionComplete {
        status: u8,
        handle: u16,
        role: u8,
        peer_address_type: u8,
        peer_address: [u8; 6],
        /// Units of 1.25 ms
        interval: u16,
        latency: u16,
        /// Units of 10 ms
        supervision_timeout: u16,
    },
    LeLongTermKeyRequest {
        handle: u16,
        rand: [u8; 8],
        ediv: u16,
    },
    Unhandled {
        event_code: u8,
    },
}

fn decode_parameters(event_code: u8, cursor: &mut Cursor<&[u8]>) -> std::io::Result<ControllerEvent> {
    let event = match event_code {
        EVT_CMD_COMPLETE => {
            let _num_packets = cursor.read_u8()?;
            let opcode = cursor.read_u16::<LittleEndian>()?;
            let status = cursor.read_u8()?;
            let mut return_parameters = Vec::new();
            cursor.read_to_end(&mut return_parameters)?;
            ControllerEvent::CommandComplete {
                opcode,
                status,
                return_parameters,
            }
        }
        EVT_CMD_STATUS => {
            let status = cursor.read_u8()?;
            let _num_packets = cursor.read_u8()?;
            let opcode = cursor.read_u16::<LittleEndian>()?;
            ControllerEvent::CommandStatus { status, opcode }
        }
        EVT_DISCONN_COMPLETE => ControllerEvent::DisconnectionComplete {
            status: cursor.read_u8()?,
            handle: cursor.read_u16::<LittleEndian>()?,
            reason: cursor.read_u8()?,
        },
        EVT_ENCRYPTION_CHANGE => ControllerEvent::EncryptionChange {
            status: cursor.read_u8()?,
            handle: cursor.read_u16::<LittleEndian>()?,
            enabled: cursor.read_u8()? != 0,
        },
        EVT_ENCRYPTION_KEY_REFRESH_COMPLETE => ControllerEvent::EncryptionKeyRefreshComplete {
            status: cursor.read_u8()?,
            handle: cursor.read_u16::<LittleEndian>()?,
        },
        EVT_LE_META_EVENT => match cursor.read_u8()? {
            EVT_LE_CONN_COMPLETE => {
                let status = cursor.read_u8()?;
                let handle = cursor.read_u16::<LittleEndian>()?;
                let role = cursor.read_u8()?;
                let peer_address_type = cursor.read_u8()?;
                let mut peer_address = [0u8; 6];
                cursor.read_exact(&mut peer_address)?;
                ControllerEvent::LeConnectionComplete {
                    status,
                    handle,
                    role,
                    peer_address_type,
                    peer_address,
                    interval: cursor.read_u16::<LittleEndian>()?,
                    latency: cursor.read_u16::<LittleEndian>()?,
                    supervision_timeout: cursor.read_u16::<LittleEndian>()?,
                }
            }
            EVT_LE_LONG_TERM_KEY_REQUEST => {
                let handle = cursor.read_u16::<LittleEndian>()?;
                let mut rand = [0u8; 8];
                cursor.read_exact(&mut rand)?;
                ControllerEvent::LeLongTermKeyRequest {
                    handle,
                    rand,
                    ediv: cursor.read_u16::<LittleEndian>()?,
                }
            }
            _ => ControllerEvent::Unhandled { event_code },
        },
        _ => ControllerEvent::Unhandled { event_code },
    };
    Ok(event)
}
