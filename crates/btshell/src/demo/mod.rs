//! Demo applications
//!
//! Each demo is a [`Demo`] implementation: the modes it offers, how it
//! brings the stack up and down, and how it reacts to profile events. The
//! shared state every handler sees is [`DemoContext`], passed explicitly to
//! command handlers and event handlers alike.

pub mod common;
pub mod headset;
pub mod hogp;
pub mod ibeacon;

#[cfg(test)]
mod tests;

pub use headset::HeadsetDemo;
pub use hogp::HogpDemo;
pub use ibeacon::{BeaconUuid, IbeaconDemo};

use crate::cli::{CommandError, Mode, TableError};
use crate::console::Console;
use crate::device::{DeviceStore, LinkKeyStore};
use crate::error::StackError;
use crate::gap::{Connection, PairingCapabilities};
use crate::security::{
    ClassicContext, ClassicSecurity, LeSecurity, SecurityContext, TimerKind, TimerQueue,
};
use crate::stack::{BluetoothStack, StackEvent, StackInfo};
use log::{debug, error};
use std::time::Instant;

/// Settings shared by every demo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    /// Name placed in advertising data
    pub device_name: String,
    pub capabilities: PairingCapabilities,
    pub beacon: BeaconConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            device_name: "btshell".to_string(),
            capabilities: PairingCapabilities::default(),
            beacon: BeaconConfig::default(),
        }
    }
}

/// Initial iBeacon fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconConfig {
    pub uuid: BeaconUuid,
    pub major: u16,
    pub minor: u16,
    /// Calibrated RSSI at one metre, dBm
    pub tx_power: i8,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            uuid: ibeacon::DEFAULT_UUID,
            major: 1,
            minor: 1,
            tx_power: -59,
        }
    }
}

/// A demo application
pub trait Demo: Sized {
    const NAME: &'static str;

    /// Whether `AdvertiseLE` starts connectable advertising
    const CONNECTABLE_ADVERTISING: bool = true;

    fn new(config: &DemoConfig) -> Self;

    /// Every mode of the demo, the outermost first
    fn modes<S: BluetoothStack>() -> Result<Vec<Mode<DemoContext<S, Self>>>, TableError>;

    /// Bring up the stack and register the demo's services
    fn open<S: BluetoothStack>(ctx: &mut DemoContext<S, Self>) -> Result<(), CommandError>;

    /// Undo [`Demo::open`]
    fn close<S: BluetoothStack>(ctx: &mut DemoContext<S, Self>);

    /// React to a stack event after the shared security handling ran
    fn handle_event<S: BluetoothStack>(_ctx: &mut DemoContext<S, Self>, _event: &StackEvent) {}

    /// Called when the user leaves `mode`
    fn mode_exited<S: BluetoothStack>(_ctx: &mut DemoContext<S, Self>, _mode: &'static str) {}

    /// Payload for `AdvertiseLE`
    fn advertising_data(&self, config: &DemoConfig) -> Vec<u8> {
        common::default_advertising_data(config)
    }
}

/// Application state handed to every command and event handler
pub struct DemoContext<S, D> {
    pub stack: S,
    pub console: Console,
    pub config: DemoConfig,
    pub devices: DeviceStore,
    pub link_keys: LinkKeyStore,
    pub le: LeSecurity,
    pub classic: ClassicSecurity,
    pub timers: TimerQueue<TimerKind>,
    pub stack_info: Option<StackInfo>,
    /// Clock reading for the event being handled
    pub now: Instant,
    /// Command names of the active mode, for `Help`
    pub commands: Vec<&'static str>,
    pub demo: D,
}

impl<S: BluetoothStack, D: Demo> DemoContext<S, D> {
    pub fn new(stack: S, console: Console, config: DemoConfig) -> Self {
        let demo = D::new(&config);
        Self {
            stack,
            console,
            devices: DeviceStore::default(),
            link_keys: LinkKeyStore::new(),
            le: LeSecurity::new(config.capabilities),
            classic: ClassicSecurity::new(config.capabilities),
            timers: TimerQueue::new(),
            stack_info: None,
            now: Instant::now(),
            commands: Vec::new(),
            config,
            demo,
        }
    }

    /// The active LE connection
    pub fn connection(&self) -> Option<Connection> {
        self.le.connection().copied()
    }

    /// Stack identity, or `InvalidStackId` before the stack is open
    pub fn stack_info(&self) -> Result<StackInfo, CommandError> {
        self.stack_info.ok_or(CommandError::InvalidStackId)
    }

    /// Run one stack call, reporting a failure on the console
    pub fn call<T>(
        &mut self,
        function: &'static str,
        f: impl FnOnce(&mut S) -> Result<T, StackError>,
    ) -> Result<T, CommandError> {
        self.stack_info()?;
        match f(&mut self.stack) {
            Ok(value) => {
                debug!("{} succeeded", function);
                Ok(value)
            }
            Err(e) => {
                error!("{} failed: {}", function, e);
                self.console
                    .line(format_args!("{} returned {}.", function, e.code()));
                Err(e.into())
            }
        }
    }

    /// Shared handling of connection and security events
    pub fn handle_security_event(&mut self, event: &StackEvent) {
        match event {
            StackEvent::ClassicAuthentication { address, event } => {
                let mut ctx = ClassicContext {
                    stack: &mut self.stack,
                    console: &mut self.console,
                    link_keys: &mut self.link_keys,
                };
                self.classic.handle_event(&mut ctx, address, event);
            }
            _ => {
                let mut ctx = SecurityContext {
                    stack: &mut self.stack,
                    console: &mut self.console,
                    devices: &mut self.devices,
                    timers: &mut self.timers,
                    now: self.now,
                };
                self.le.handle_event(&mut ctx, event);
            }
        }
    }

    /// Fire every timer due at `now`
    pub fn expire_timers(&mut self, now: Instant) {
        self.now = now;
        for (id, kind) in self.timers.expire(now) {
            match kind {
                TimerKind::ReSecurity(key) => {
                    let mut ctx = SecurityContext {
                        stack: &mut self.stack,
                        console: &mut self.console,
                        devices: &mut self.devices,
                        timers: &mut self.timers,
                        now,
                    };
                    self.le.timer_expired(&mut ctx, id, key);
                }
            }
        }
    }

    /// Forget all per-session state after the stack closed
    pub fn reset_session(&mut self) {
        self.le.reset(&mut self.timers);
        self.classic.reset();
        self.timers.clear();
        self.stack_info = None;
    }
}
