//! Bluetooth stack boundary
//!
//! [`BluetoothStack`] is the request side of the vendor stack API the demos
//! drive. Everything the stack reports back arrives as a [`StackEvent`]
//! message on an [`EventQueue`], consumed by the single-threaded runner.
//! Backends never call into application code directly.

pub mod events;
pub mod hci_stack;
pub mod loopback;
pub mod queue;
pub mod types;


pub use events::*;
pub use hci_stack::HciStack;
pub use loopback::{Journal, LoopbackStack, StackCall};
pub use queue::{EventQueue, EventSender, Message, Received};
pub use types::*;

use crate::error::StackError;
use crate::gap::{BdAddr, ConnectionMode, DiscoveryMode, PairabilityMode, PairingCapabilities};

/// Request side of the Bluetooth stack
///
/// Every call returns once the request is queued; results arrive later as
/// [`StackEvent`]s. Entry points a backend cannot serve keep the default
/// body and report [`StackError::Unsupported`].
pub trait BluetoothStack {
    /// Open the stack and report the controller's identity
    fn open(&mut self) -> Result<StackInfo, StackError>;

    /// Close the stack, dropping every connection and registration
    fn close(&mut self);

    fn set_discoverability_mode(&mut self, _mode: DiscoveryMode) -> Result<(), StackError> {
        Err(StackError::Unsupported("GAP_Set_Discoverability_Mode"))
    }

    fn set_connectability_mode(&mut self, _mode: ConnectionMode) -> Result<(), StackError> {
        Err(StackError::Unsupported("GAP_Set_Connectability_Mode"))
    }

    fn set_pairability_mode(&mut self, _mode: PairabilityMode) -> Result<(), StackError> {
        Err(StackError::Unsupported("GAP_Set_Pairability_Mode"))
    }

    fn le_set_advertising_data(&mut self, _data: &[u8]) -> Result<(), StackError> {
        Err(StackError::Unsupported("GAP_LE_Set_Advertising_Data"))
    }

    fn le_advertising_enable(&mut self, _params: &AdvertisingParameters) -> Result<(), StackError> {
        Err(StackError::Unsupported("GAP_LE_Advertising_Enable"))
    }

    fn le_advertising_disable(&mut self) -> Result<(), StackError> {
        Err(StackError::Unsupported("GAP_LE_Advertising_Disable"))
    }

    fn le_disconnect(&mut self, _address: BdAddr) -> Result<(), StackError> {
        Err(StackError::Unsupported("GAP_LE_Disconnect"))
    }

    /// Ask the peer to (re-)establish security on an existing link
    fn le_request_security(
        &mut self,
        _address: BdAddr,
        _capabilities: &PairingCapabilities,
    ) -> Result<(), StackError> {
        Err(StackError::Unsupported("GAP_LE_Request_Security"))
    }

    fn le_authentication_response(
        &mut self,
        _address: BdAddr,
        _response: LeAuthenticationResponse,
    ) -> Result<(), StackError> {
        Err(StackError::Unsupported("GAP_LE_Authentication_Response"))
    }

    fn inquiry(&mut self, _duration_secs: u8) -> Result<(), StackError> {
        Err(StackError::Unsupported("GAP_Perform_Inquiry"))
    }

    fn initiate_bonding(&mut self, _address: BdAddr) -> Result<(), StackError> {
        Err(StackError::Unsupported("GAP_Initiate_Bonding"))
    }

    fn end_bonding(&mut self, _address: BdAddr) -> Result<(), StackError> {
        Err(StackError::Unsupported("GAP_End_Bonding"))
    }

    fn authentication_response(
        &mut self,
        _address: BdAddr,
        _response: ClassicAuthenticationResponse,
    ) -> Result<(), StackError> {
        Err(StackError::Unsupported("GAP_Authentication_Response"))
    }

    fn gatt_initialize(&mut self) -> Result<(), StackError> {
        Err(StackError::Unsupported("GATT_Initialize"))
    }

    fn gatt_cleanup(&mut self) {}

    fn register_service(&mut self, _service: &Service) -> Result<ServiceId, StackError> {
        Err(StackError::Unsupported("GATT_Register_Service"))
    }

    fn unregister_service(&mut self, _id: ServiceId) {}

    fn hids_notify_input_report(
        &mut self,
        _address: BdAddr,
        _report: HidReportKind,
        _data: &[u8],
    ) -> Result<(), StackError> {
        Err(StackError::Unsupported("HIDS_Notify_Input_Report"))
    }

    fn hids_response(&mut self, _transaction_id: u32, _response: HidsResponse) -> Result<(), StackError> {
        Err(StackError::Unsupported("HIDS_Response"))
    }

    fn bas_notify_battery_level(&mut self, _address: BdAddr, _level: u8) -> Result<(), StackError> {
        Err(StackError::Unsupported("BAS_Notify_Battery_Level"))
    }

    fn bas_response(&mut self, _transaction_id: u32, _response: BasResponse) -> Result<(), StackError> {
        Err(StackError::Unsupported("BAS_Response"))
    }

    fn hdset_open_remote(
        &mut self,
        _role: HeadsetRole,
        _address: BdAddr,
        _port: u8,
    ) -> Result<PortId, StackError> {
        Err(StackError::Unsupported("HDSET_Open_Remote_Port"))
    }

    fn hdset_close(&mut self, _port: PortId) -> Result<(), StackError> {
        Err(StackError::Unsupported("HDSET_Close_Port"))
    }

    fn hdset_ring_indication(&mut self, _port: PortId) -> Result<(), StackError> {
        Err(StackError::Unsupported("HDSET_Ring_Indication"))
    }

    fn hdset_button_press(&mut self, _port: PortId) -> Result<(), StackError> {
        Err(StackError::Unsupported("HDSET_Send_Button_Press"))
    }

    fn hdset_set_speaker_gain(&mut self, _port: PortId, _gain: u8) -> Result<(), StackError> {
        Err(StackError::Unsupported("HDSET_Set_Speaker_Gain"))
    }

    fn hdset_set_microphone_gain(&mut self, _port: PortId, _gain: u8) -> Result<(), StackError> {
        Err(StackError::Unsupported("HDSET_Set_Microphone_Gain"))
    }

    fn hdset_setup_audio(&mut self, _port: PortId) -> Result<(), StackError> {
        Err(StackError::Unsupported("HDSET_Setup_Audio_Connection"))
    }

    fn hdset_release_audio(&mut self, _port: PortId) -> Result<(), StackError> {
        Err(StackError::Unsupported("HDSET_Release_Audio_Connection"))
    }
}
