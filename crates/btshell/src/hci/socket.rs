//! Raw HCI socket bound to one controller
//!
//! Used by the HCI backend only. The socket passes event packets up after a
//! filter has been installed with [`HciSocket::set_filter`].

use crate::error::HciError;
use crate::hci::constants::{HCI_EVENT_PKT, HCI_FILTER, SOL_HCI};
use crate::hci::packet::{HciCommand, HciEvent};
use std::io;
use std::mem;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

const AF_BLUETOOTH: libc::c_int = 31;
const BTPROTO_HCI: libc::c_int = 1;
const HCI_CHANNEL_RAW: u16 = 0;

/// Packet indicator, event code, length and up to 255 parameter bytes
const MAX_EVENT_PACKET: usize = 258;

#[repr(C)]
struct SockaddrHci {
    hci_family: libc::sa_family_t,
    hci_dev: u16,
    hci_channel: u16,
}

// struct hci_filter from the kernel headers
#[repr(C)]
#[derive(Default)]
struct HciFilter {
    type_mask: u32,
    event_mask: [u32; 2],
    opcode: u16,
}

impl HciFilter {
    fn events(codes: &[u8]) -> Self {
        let mut filter = Self {
            type_mask: 1 << HCI_EVENT_PKT,
            ..Self::default()
        };
        for &code in codes {
            filter.event_mask[usize::from(code >> 5)] |= 1 << (code & 0x1f);
        }
        filter
    }
}

#[derive(Debug)]
pub struct HciSocket {
    fd: RawFd,
}

/// Map a negative libc return to the given error
fn check(ret: libc::c_int, err: fn(io::Error) -> HciError) -> Result<libc::c_int, HciError> {
    if ret < 0 {
        Err(err(io::Error::last_os_error()))
    } else {
        Ok(ret)
    }
}

impl HciSocket {
    /// Open a raw socket on controller `dev_id` (0 is `hci0`)
    pub fn open(dev_id: u16) -> Result<Self, HciError> {
        let fd = check(
            unsafe { libc::socket(AF_BLUETOOTH, libc::SOCK_RAW | libc::SOCK_CLOEXEC, BTPROTO_HCI) },
            HciError::SocketError,
        )?;
        // Closes the fd if binding fails
        let socket = Self { fd };

        let addr = SockaddrHci {
            hci_family: AF_BLUETOOTH as libc::sa_family_t,
            hci_dev: dev_id,
            hci_channel: HCI_CHANNEL_RAW,
        };
        check(
            unsafe {
                libc::bind(
                    socket.fd,
                    &addr as *const SockaddrHci as *const libc::sockaddr,
                    mem::size_of::<SockaddrHci>() as libc::socklen_t,
                )
            },
            HciError::BindError,
        )?;

        Ok(socket)
    }

    /// Pass only event packets with the given codes up to this socket
    pub fn set_filter(&self, events: &[u8]) -> Result<(), HciError> {
        let filter = HciFilter::events(events);
        check(
            unsafe {
                libc::setsockopt(
                    self.fd,
                    SOL_HCI,
                    HCI_FILTER,
                    &filter as *const HciFilter as *const libc::c_void,
                    mem::size_of::<HciFilter>() as libc::socklen_t,
                )
            },
            HciError::FilterError,
        )?;
        Ok(())
    }

    /// Wait up to `timeout` for the next event packet
    pub fn read_event(&self, timeout: Duration) -> Result<HciEvent, HciError> {
        let mut poll_fd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
        let ready = check(unsafe { libc::poll(&mut poll_fd, 1, millis) }, HciError::ReceiveError)?;
        if ready == 0 {
            return Err(HciError::Timeout);
        }

        let mut buffer = [0u8; MAX_EVENT_PACKET];
        let read = unsafe { libc::read(self.fd, buffer.as_mut_ptr() as *mut libc::c_void, buffer.len()) };
        if read < 0 {
            return Err(HciError::ReceiveError(io::Error::last_os_error()));
        }

        match &buffer[..read as usize] {
            [HCI_EVENT_PKT, packet @ ..] if packet.len() >= 2 => {
                HciEvent::parse(packet).ok_or(HciError::InvalidPacketFormat)
            }
            _ => Err(HciError::InvalidPacketFormat),
        }
    }

    pub fn send_command(&self, command: &HciCommand) -> Result<(), HciError> {
        let packet = command.to_packet();
        let written = unsafe { libc::write(self.fd, packet.as_ptr() as *const libc::c_void, packet.len()) };
        if written < 0 {
            return Err(HciError::SendError(io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl AsRawFd for HciSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for HciSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
