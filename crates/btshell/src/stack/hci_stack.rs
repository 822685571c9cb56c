//! Stack backend driving a local controller over a raw HCI socket
//!
//! Covers what a controller does on its own: advertising, disconnection,
//! scan enable and LTK replies. Pairing, GATT and the profiles need a host
//! stack and report [`StackError::Unsupported`].

use super::events::{LeAuthenticationEvent, StackEvent};
use super::queue::EventSender;
use super::types::{AdvertisingParameters, LeAuthenticationResponse, StackInfo};
use super::BluetoothStack;
use crate::error::{HciError, StackError};
use crate::gap::{
    AddressType, BdAddr, ConnectionMode, ConnectionParameters, DiscoveryMode, Role,
    HCI_ERROR_REMOTE_USER_TERMINATED, HCI_STATUS_SUCCESS,
};
use crate::hci::constants::*;
use crate::hci::{ControllerEvent, HciCommand, HciSocket};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long `open` waits for each initialization command
const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Poll period of the reader thread, bounds how long `close` waits
const READ_POLL: Duration = Duration::from_millis(100);

/// Peer behind a connection handle
#[derive(Debug, Clone, Copy)]
struct Peer {
    address: BdAddr,
    address_type: AddressType,
}

type Connections = Arc<Mutex<HashMap<u16, Peer>>>;

pub struct HciStack {
    device_id: u16,
    events: EventSender,
    socket: Option<Arc<HciSocket>>,
    reader: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    connections: Connections,
    scan_enable: u8,
}

impl HciStack {
    /// Backend for controller `hci<device_id>`, reporting through `events`
    pub fn new(device_id: u16, events: EventSender) -> Self {
        Self {
            device_id,
            events,
            socket: None,
            reader: None,
            stop: Arc::new(AtomicBool::new(false)),
            connections: Arc::new(Mutex::new(HashMap::new())),
            scan_enable: 0,
        }
    }

    fn socket(&self) -> Result<&HciSocket, StackError> {
        self.socket.as_deref().ok_or(StackError::NotOpen)
    }

    fn send(&self, command: HciCommand) -> Result<(), StackError> {
        debug!("HCI command 0x{:04X}", command.opcode());
        self.socket()?.send_command(&command)?;
        Ok(())
    }

    fn handle_for(&self, address: &BdAddr) -> Result<u16, StackError> {
        let connections = self
            .connections
            .lock()
            .map_err(|_| StackError::NotConnected(*address))?;
        connections
            .iter()
            .find(|(_, peer)| peer.address == *address)
            .map(|(handle, _)| *handle)
            .ok_or(StackError::NotConnected(*address))
    }

    fn write_scan_enable(&mut self, bits: u8, enable: bool) -> Result<(), StackError> {
        let scan_enable = if enable {
            self.scan_enable | bits
        } else {
            self.scan_enable & !bits
        };
        self.send(HciCommand::WriteScanEnable { scan_enable })?;
        self.scan_enable = scan_enable;
        Ok(())
    }
}

/// Send `command` and wait for its completion, returning the return parameters
fn command_sync(socket: &HciSocket, command: HciCommand) -> Result<Vec<u8>, HciError> {
    let opcode = command.opcode();
    socket.send_command(&command)?;

    let deadline = Instant::now() + COMMAND_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(HciError::Timeout);
        }

        match socket.read_event(remaining)?.decode() {
            Some(ControllerEvent::CommandComplete {
                opcode: completed,
                status,
                return_parameters,
            }) if completed == opcode => {
                if status != HCI_STATUS_SUCCESS {
                    return Err(HciError::CommandFailed { opcode, status });
                }
                return Ok(return_parameters);
            }
            Some(ControllerEvent::CommandStatus {
                opcode: pending,
                status,
            }) if pending == opcode && status != HCI_STATUS_SUCCESS => {
                return Err(HciError::CommandFailed { opcode, status });
            }
            _ => continue,
        }
    }
}

/// Milliseconds to advertising interval units of 0.625 ms
fn advertising_units(ms: u16) -> u16 {
    (ms as u32 * 8 / 5).min(u16::MAX as u32) as u16
}

fn translate(event: ControllerEvent, connections: &Connections) -> Option<StackEvent> {
    let mut connections = connections.lock().ok()?;

    match event {
        ControllerEvent::LeConnectionComplete {
            status,
            handle,
            role,
            peer_address_type,
            peer_address,
            interval,
            latency,
            supervision_timeout,
        } => {
            let address = BdAddr::new(peer_address);
            let address_type = AddressType::from(peer_address_type);
            if status == HCI_STATUS_SUCCESS {
                connections.insert(
                    handle,
                    Peer {
                        address,
                        address_type,
                    },
                );
            }
            Some(StackEvent::LeConnectionComplete {
                status,
                address,
                address_type,
                role: if role == 0 { Role::Central } else { Role::Peripheral },
                parameters: ConnectionParameters {
                    interval_ms: (interval as u32 * 5 / 4) as u16,
                    slave_latency: latency,
                    supervision_timeout_ms: supervision_timeout.saturating_mul(10),
                },
            })
        }
        ControllerEvent::DisconnectionComplete {
            status,
            handle,
            reason,
        } => {
            if status != HCI_STATUS_SUCCESS {
                warn!("Disconnect of handle 0x{:04X} failed: 0x{:02X}", handle, status);
                return None;
            }
            let peer = connections.remove(&handle)?;
            Some(StackEvent::LeDisconnectionComplete {
                address: peer.address,
                address_type: peer.address_type,
                reason,
            })
        }
        ControllerEvent::EncryptionChange {
            status,
            handle,
            enabled,
        } => {
            let peer = connections.get(&handle)?;
            Some(StackEvent::LeEncryptionChange {
                address: peer.address,
                address_type: peer.address_type,
                status,
                encrypted: enabled,
            })
        }
        ControllerEvent::EncryptionKeyRefreshComplete { status, handle } => {
            let peer = connections.get(&handle)?;
            Some(StackEvent::LeEncryptionRefreshComplete {
                address: peer.address,
                address_type: peer.address_type,
                status,
            })
        }
        ControllerEvent::LeLongTermKeyRequest { handle, rand, ediv } => {
            let peer = connections.get(&handle)?;
            Some(StackEvent::LeAuthentication {
                address: peer.address,
                address_type: peer.address_type,
                event: LeAuthenticationEvent::LongTermKeyRequest { ediv, rand },
            })
        }
        ControllerEvent::CommandComplete { opcode, status, .. }
        | ControllerEvent::CommandStatus { opcode, status } => {
            if status != HCI_STATUS_SUCCESS {
                warn!("HCI command 0x{:04X} failed: 0x{:02X}", opcode, status);
            }
            None
        }
        ControllerEvent::Unhandled { event_code } => {
            debug!("Ignoring HCI event 0x{:02X}", event_code);
            None
        }
    }
}

fn read_events(socket: Arc<HciSocket>, stop: Arc<AtomicBool>, connections: Connections, events: EventSender) {
    while !stop.load(Ordering::Relaxed) {
        let event = match socket.read_event(READ_POLL) {
            Ok(event) => event,
            Err(HciError::Timeout) | Err(HciError::InvalidPacketFormat) => continue,
            Err(e) => {
                warn!("HCI reader stopped: {}", e);
                break;
            }
        };

        let Some(decoded) = event.decode() else {
            debug!("Malformed HCI event 0x{:02X}", event.event_code);
            continue;
        };
        if let Some(stack_event) = translate(decoded, &connections) {
            if !events.event(stack_event) {
                break;
            }
        }
    }
}

impl BluetoothStack for HciStack {
    fn open(&mut self) -> Result<StackInfo, StackError> {
        if self.socket.is_some() {
            self.close();
        }

        let socket = HciSocket::open(self.device_id)?;
        socket.set_filter(&[
            EVT_DISCONN_COMPLETE,
            EVT_ENCRYPTION_CHANGE,
            EVT_CMD_COMPLETE,
            EVT_CMD_STATUS,
            EVT_ENCRYPTION_KEY_REFRESH_COMPLETE,
            EVT_LE_META_EVENT,
        ])?;

        command_sync(&socket, HciCommand::Reset)?;
        command_sync(
            &socket,
            HciCommand::SetEventMask {
                event_mask: DEFAULT_EVENT_MASK,
            },
        )?;
        command_sync(
            &socket,
            HciCommand::LeSetEventMask {
                event_mask: DEFAULT_LE_EVENT_MASK,
            },
        )?;
        let address = command_sync(&socket, HciCommand::ReadBdAddr)?;
        let local_address = BdAddr::from_slice(&address).ok_or(HciError::InvalidPacketFormat)?;

        let socket = Arc::new(socket);
        self.stop.store(false, Ordering::Relaxed);
        let reader = {
            let socket = Arc::clone(&socket);
            let stop = Arc::clone(&self.stop);
            let connections = Arc::clone(&self.connections);
            let events = self.events.clone();
            thread::spawn(move || read_events(socket, stop, connections, events))
        };

        self.socket = Some(socket);
        self.reader = Some(reader);
        self.scan_enable = 0;
        info!("hci{} opened, local address {}", self.device_id, local_address);

        Ok(StackInfo {
            stack_id: self.device_id as u32 + 1,
            local_address,
        })
    }

    fn close(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!("HCI reader thread panicked");
            }
        }
        if self.socket.take().is_some() {
            info!("hci{} closed", self.device_id);
        }
        if let Ok(mut connections) = self.connections.lock() {
            connections.clear();
        }
    }

    fn set_discoverability_mode(&mut self, mode: DiscoveryMode) -> Result<(), StackError> {
        self.write_scan_enable(SCAN_INQUIRY, mode != DiscoveryMode::NonDiscoverable)
    }

    fn set_connectability_mode(&mut self, mode: ConnectionMode) -> Result<(), StackError> {
        self.write_scan_enable(SCAN_PAGE, mode == ConnectionMode::Connectable)
    }

    fn le_set_advertising_data(&mut self, data: &[u8]) -> Result<(), StackError> {
        if data.len() > 31 {
            return Err(HciError::InvalidParamLength(data.len()).into());
        }
        self.send(HciCommand::LeSetAdvertisingData {
            data: data.to_vec(),
        })
    }

    fn le_advertising_enable(&mut self, params: &AdvertisingParameters) -> Result<(), StackError> {
        self.send(HciCommand::LeSetAdvertisingParameters {
            min_interval: advertising_units(params.interval_min_ms),
            max_interval: advertising_units(params.interval_max_ms),
            advertising_type: if params.connectable {
                ADV_IND
            } else {
                ADV_NONCONN_IND
            },
            own_address_type: 0,
            peer_address_type: 0,
            peer_address: [0; 6],
            channel_map: 0x07,
            filter_policy: 0,
        })?;
        self.send(HciCommand::LeSetAdvertisingEnable { enable: true })
    }

    fn le_advertising_disable(&mut self) -> Result<(), StackError> {
        self.send(HciCommand::LeSetAdvertisingEnable { enable: false })
    }

    fn le_disconnect(&mut self, address: BdAddr) -> Result<(), StackError> {
        let handle = self.handle_for(&address)?;
        self.send(HciCommand::Disconnect {
            handle,
            reason: HCI_ERROR_REMOTE_USER_TERMINATED,
        })
    }

    fn le_authentication_response(
        &mut self,
        address: BdAddr,
        response: LeAuthenticationResponse,
    ) -> Result<(), StackError> {
        let handle = self.handle_for(&address)?;
        match response {
            LeAuthenticationResponse::LongTermKey(Some(ltk)) => {
                self.send(HciCommand::LeLongTermKeyRequestReply {
                    handle,
                    long_term_key: ltk.key,
                })
            }
            LeAuthenticationResponse::LongTermKey(None) => {
                self.send(HciCommand::LeLongTermKeyRequestNegativeReply { handle })
            }
            _ => Err(StackError::Unsupported("GAP_LE_Authentication_Response")),
        }
    }
}

impl Drop for HciStack {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connections() -> Connections {
        Arc::new(Mutex::new(HashMap::new()))
    }

    #[test]
    fn test_connection_events_track_handles() {
        let connections = connections();
        let event = translate(
            ControllerEvent::LeConnectionComplete {
                status: 0,
                handle: 0x0040,
                role: 1,
                peer_address_type: 0,
                peer_address: [1, 2, 3, 4, 5, 6],
                interval: 24,
                latency: 2,
                supervision_timeout: 400,
            },
            &connections,
        );

        assert_eq!(
            event,
            Some(StackEvent::LeConnectionComplete {
                status: 0,
                address: BdAddr::new([1, 2, 3, 4, 5, 6]),
                address_type: AddressType::Public,
                role: Role::Peripheral,
                parameters: ConnectionParameters {
                    interval_ms: 30,
                    slave_latency: 2,
                    supervision_timeout_ms: 4000,
                },
            })
        );

        let event = translate(
            ControllerEvent::EncryptionChange {
                status: 0,
                handle: 0x0040,
                enabled: true,
            },
            &connections,
        );
        assert!(matches!(
            event,
            Some(StackEvent::LeEncryptionChange { encrypted: true, .. })
        ));

        let event = translate(
            ControllerEvent::DisconnectionComplete {
                status: 0,
                handle: 0x0040,
                reason: 0x13,
            },
            &connections,
        );
        assert!(matches!(
            event,
            Some(StackEvent::LeDisconnectionComplete { reason: 0x13, .. })
        ));
        assert!(connections.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_handles_are_dropped() {
        let connections = connections();
        let event = translate(
            ControllerEvent::EncryptionChange {
                status: 0,
                handle: 0x0099,
                enabled: true,
            },
            &connections,
        );
        assert!(event.is_none());
    }

    #[test]
    fn test_advertising_units() {
        assert_eq!(advertising_units(100), 160);
        assert_eq!(advertising_units(200), 320);
    }

    #[test]
    fn test_requests_need_an_open_socket() {
        let (_queue, sender) = crate::stack::EventQueue::new();
        let mut stack = HciStack::new(0, sender);
        assert!(matches!(
            stack.le_advertising_disable(),
            Err(StackError::NotOpen)
        ));
        assert!(matches!(
            stack.le_disconnect(BdAddr::new([1; 6])),
            Err(StackError::NotConnected(_))
        ));
    }

    #[test]
    fn test_open_reports_controller_address() {
        let (_queue, sender) = crate::stack::EventQueue::new();
        let mut stack = HciStack::new(0, sender);

        // Needs hci0 and CAP_NET_RAW; without them open fails cleanly
        match stack.open() {
            Ok(info) => {
                assert_eq!(info.stack_id, 1);
                assert!(!info.local_address.is_null());
                stack.close();
                assert!(matches!(stack.le_advertising_disable(), Err(StackError::NotOpen)));
            }
            Err(e) => assert!(matches!(e, StackError::Hci(_))),
        }
    }
}
