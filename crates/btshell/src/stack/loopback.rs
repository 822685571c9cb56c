//! In-process stack without a controller
//!
//! Accepts every request, records it in a [`Journal`] and, when given an
//! [`EventSender`], answers headset requests with the confirmation events a
//! controller would produce. Used for trying the demos without hardware and
//! as the test double for the demos.

use super::events::{HeadsetEvent, StackEvent};
use super::queue::EventSender;
use super::types::*;
use super::BluetoothStack;
use crate::error::{StackError, BTPS_ERROR_INVALID_PARAMETER};
use crate::gap::{
    BdAddr, ConnectionMode, DiscoveryMode, PairabilityMode, PairingCapabilities,
    HCI_STATUS_SUCCESS,
};
use log::debug;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// One request as seen by the stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackCall {
    Open,
    Close,
    SetDiscoverabilityMode(DiscoveryMode),
    SetConnectabilityMode(ConnectionMode),
    SetPairabilityMode(PairabilityMode),
    LeSetAdvertisingData(Vec<u8>),
    LeAdvertisingEnable(AdvertisingParameters),
    LeAdvertisingDisable,
    LeDisconnect(BdAddr),
    LeRequestSecurity(BdAddr),
    LeAuthenticationResponse(BdAddr, LeAuthenticationResponse),
    Inquiry(u8),
    InitiateBonding(BdAddr),
    EndBonding(BdAddr),
    AuthenticationResponse(BdAddr, ClassicAuthenticationResponse),
    GattInitialize,
    GattCleanup,
    RegisterService(Service),
    UnregisterService(ServiceId),
    HidsNotifyInputReport {
        address: BdAddr,
        report: HidReportKind,
        data: Vec<u8>,
    },
    HidsResponse(u32, HidsResponse),
    BasNotifyBatteryLevel(BdAddr, u8),
    BasResponse(u32, BasResponse),
    HdsetOpenRemote(HeadsetRole, BdAddr, u8),
    HdsetClose(PortId),
    HdsetRingIndication(PortId),
    HdsetButtonPress(PortId),
    HdsetSetSpeakerGain(PortId, u8),
    HdsetSetMicrophoneGain(PortId, u8),
    HdsetSetupAudio(PortId),
    HdsetReleaseAudio(PortId),
}

/// Shared record of the calls a [`LoopbackStack`] accepted
#[derive(Debug, Clone, Default)]
pub struct Journal {
    calls: Rc<RefCell<Vec<StackCall>>>,
}

impl Journal {
    pub fn calls(&self) -> Vec<StackCall> {
        self.calls.borrow().clone()
    }

    /// Remove and return everything recorded so far
    pub fn take(&self) -> Vec<StackCall> {
        self.calls.borrow_mut().drain(..).collect()
    }

    pub fn count(&self, predicate: impl Fn(&StackCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|call| predicate(call)).count()
    }

    fn push(&self, call: StackCall) {
        self.calls.borrow_mut().push(call);
    }
}

pub struct LoopbackStack {
    local_address: BdAddr,
    stack_id: Option<u32>,
    journal: Journal,
    failing: HashSet<&'static str>,
    events: Option<EventSender>,
    next_service_id: u32,
    next_port_id: u32,
}

impl LoopbackStack {
    pub fn new(local_address: BdAddr) -> Self {
        Self {
            local_address,
            stack_id: None,
            journal: Journal::default(),
            failing: HashSet::new(),
            events: None,
            next_service_id: 1,
            next_port_id: 1,
        }
    }

    /// Loopback stack with a random static address
    pub fn with_random_address() -> Self {
        let mut bytes: [u8; 6] = rand::random();
        bytes[5] |= crate::gap::STATIC_RANDOM_ADDRESS_BITS;
        Self::new(BdAddr::new(bytes))
    }

    /// Report confirmation events through `events`
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    /// Make the stack function named `function` fail from now on
    pub fn fail(&mut self, function: &'static str) {
        self.failing.insert(function);
    }

    fn call(&mut self, function: &'static str, call: StackCall) -> Result<(), StackError> {
        if self.stack_id.is_none() {
            return Err(StackError::NotOpen);
        }
        if self.failing.contains(function) {
            debug!("{} failing on request", function);
            return Err(StackError::Failed {
                function,
                code: BTPS_ERROR_INVALID_PARAMETER,
            });
        }

        debug!("{}: {:?}", function, call);
        self.journal.push(call);
        Ok(())
    }

    fn report(&self, event: StackEvent) {
        if let Some(events) = &self.events {
            events.event(event);
        }
    }
}

impl BluetoothStack for LoopbackStack {
    fn open(&mut self) -> Result<StackInfo, StackError> {
        if self.failing.contains("BSC_Initialize") {
            return Err(StackError::Failed {
                function: "BSC_Initialize",
                code: BTPS_ERROR_INVALID_PARAMETER,
            });
        }

        let stack_id = 1;
        self.stack_id = Some(stack_id);
        self.journal.push(StackCall::Open);

        Ok(StackInfo {
            stack_id,
            local_address: self.local_address,
        })
    }

    fn close(&mut self) {
        if self.stack_id.take().is_some() {
            self.journal.push(StackCall::Close);
        }
    }

    fn set_discoverability_mode(&mut self, mode: DiscoveryMode) -> Result<(), StackError> {
        self.call("GAP_Set_Discoverability_Mode", StackCall::SetDiscoverabilityMode(mode))
    }

    fn set_connectability_mode(&mut self, mode: ConnectionMode) -> Result<(), StackError> {
        self.call("GAP_Set_Connectability_Mode", StackCall::SetConnectabilityMode(mode))
    }

    fn set_pairability_mode(&mut self, mode: PairabilityMode) -> Result<(), StackError> {
        self.call("GAP_Set_Pairability_Mode", StackCall::SetPairabilityMode(mode))
    }

    fn le_set_advertising_data(&mut self, data: &[u8]) -> Result<(), StackError> {
        self.call(
            "GAP_LE_Set_Advertising_Data",
            StackCall::LeSetAdvertisingData(data.to_vec()),
        )
    }

    fn le_advertising_enable(&mut self, params: &AdvertisingParameters) -> Result<(), StackError> {
        self.call("GAP_LE_Advertising_Enable", StackCall::LeAdvertisingEnable(*params))
    }

    fn le_advertising_disable(&mut self) -> Result<(), StackError> {
        self.call("GAP_LE_Advertising_Disable", StackCall::LeAdvertisingDisable)
    }

    fn le_disconnect(&mut self, address: BdAddr) -> Result<(), StackError> {
        self.call("GAP_LE_Disconnect", StackCall::LeDisconnect(address))
    }

    fn le_request_security(
        &mut self,
        address: BdAddr,
        _capabilities: &PairingCapabilities,
    ) -> Result<(), StackError> {
        self.call("GAP_LE_Request_Security", StackCall::LeRequestSecurity(address))
    }

    fn le_authentication_response(
        &mut self,
        address: BdAddr,
        response: LeAuthenticationResponse,
    ) -> Result<(), StackError> {
        self.call(
            "GAP_LE_Authentication_Response",
            StackCall::LeAuthenticationResponse(address, response),
        )
    }

    fn inquiry(&mut self, duration_secs: u8) -> Result<(), StackError> {
        self.call("GAP_Perform_Inquiry", StackCall::Inquiry(duration_secs))
    }

    fn initiate_bonding(&mut self, address: BdAddr) -> Result<(), StackError> {
        self.call("GAP_Initiate_Bonding", StackCall::InitiateBonding(address))
    }

    fn end_bonding(&mut self, address: BdAddr) -> Result<(), StackError> {
        self.call("GAP_End_Bonding", StackCall::EndBonding(address))
    }

    fn authentication_response(
        &mut self,
        address: BdAddr,
        response: ClassicAuthenticationResponse,
    ) -> Result<(), StackError> {
        self.call(
            "GAP_Authentication_Response",
            StackCall::AuthenticationResponse(address, response),
        )
    }

    fn gatt_initialize(&mut self) -> Result<(), StackError> {
        self.call("GATT_Initialize", StackCall::GattInitialize)
    }

    fn gatt_cleanup(&mut self) {
        let _ = self.call("GATT_Cleanup", StackCall::GattCleanup);
    }

    fn register_service(&mut self, service: &Service) -> Result<ServiceId, StackError> {
        let function = match service {
            Service::Hids { .. } => "HIDS_Initialize_Service",
            Service::Battery => "BAS_Initialize_Service",
            Service::DeviceInformation { .. } => "DIS_Initialize_Service",
        };
        self.call(function, StackCall::RegisterService(service.clone()))?;

        let id = ServiceId(self.next_service_id);
        self.next_service_id += 1;
        Ok(id)
    }

    fn unregister_service(&mut self, id: ServiceId) {
        let _ = self.call("GATT_Un_Register_Service", StackCall::UnregisterService(id));
    }

    fn hids_notify_input_report(
        &mut self,
        address: BdAddr,
        report: HidReportKind,
        data: &[u8],
    ) -> Result<(), StackError> {
        self.call(
            "HIDS_Notify_Input_Report",
            StackCall::HidsNotifyInputReport {
                address,
                report,
                data: data.to_vec(),
            },
        )
    }

    fn hids_response(&mut self, transaction_id: u32, response: HidsResponse) -> Result<(), StackError> {
        self.call("HIDS_Response", StackCall::HidsResponse(transaction_id, response))
    }

    fn bas_notify_battery_level(&mut self, address: BdAddr, level: u8) -> Result<(), StackError> {
        self.call(
            "BAS_Notify_Battery_Level",
            StackCall::BasNotifyBatteryLevel(address, level),
        )
    }

    fn bas_response(&mut self, transaction_id: u32, response: BasResponse) -> Result<(), StackError> {
        self.call("BAS_Response", StackCall::BasResponse(transaction_id, response))
    }

    fn hdset_open_remote(
        &mut self,
        role: HeadsetRole,
        address: BdAddr,
        port: u8,
    ) -> Result<PortId, StackError> {
        self.call(
            "HDSET_Open_Remote_Port",
            StackCall::HdsetOpenRemote(role, address, port),
        )?;

        let port = PortId(self.next_port_id);
        self.next_port_id += 1;
        self.report(StackEvent::Headset(HeadsetEvent::OpenConfirmation {
            port,
            status: HCI_STATUS_SUCCESS,
        }));
        Ok(port)
    }

    fn hdset_close(&mut self, port: PortId) -> Result<(), StackError> {
        self.call("HDSET_Close_Port", StackCall::HdsetClose(port))
    }

    fn hdset_ring_indication(&mut self, port: PortId) -> Result<(), StackError> {
        self.call("HDSET_Ring_Indication", StackCall::HdsetRingIndication(port))
    }

    fn hdset_button_press(&mut self, port: PortId) -> Result<(), StackError> {
        self.call("HDSET_Send_Button_Press", StackCall::HdsetButtonPress(port))
    }

    fn hdset_set_speaker_gain(&mut self, port: PortId, gain: u8) -> Result<(), StackError> {
        self.call(
            "HDSET_Set_Speaker_Gain",
            StackCall::HdsetSetSpeakerGain(port, gain),
        )
    }

    fn hdset_set_microphone_gain(&mut self, port: PortId, gain: u8) -> Result<(), StackError> {
        self.call(
            "HDSET_Set_Microphone_Gain",
            StackCall::HdsetSetMicrophoneGain(port, gain),
        )
    }

    fn hdset_setup_audio(&mut self, port: PortId) -> Result<(), StackError> {
        self.call("HDSET_Setup_Audio_Connection", StackCall::HdsetSetupAudio(port))?;
        self.report(StackEvent::Headset(HeadsetEvent::AudioConnection {
            port,
            connected: true,
        }));
        Ok(())
    }

    fn hdset_release_audio(&mut self, port: PortId) -> Result<(), StackError> {
        self.call("HDSET_Release_Audio_Connection", StackCall::HdsetReleaseAudio(port))?;
        self.report(StackEvent::Headset(HeadsetEvent::AudioConnection {
            port,
            connected: false,
        }));
        Ok(())
    }
}
