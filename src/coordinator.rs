//! Device-pairing/sync coordinator.
//!
//! The state machine at the heart of the bridge: it consumes normalized
//! vendor notifications, radio state changes and timeout fires, applies them
//! to the one live [`Session`], and reduces every outcome to at most one
//! event on the registered channel. All inputs are expected to arrive on a
//! single serialization point (see [`crate::service`]); the coordinator
//! itself is plain mutable state with no locking.

use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::BridgeConfig;
use crate::domain::dedup;
use crate::domain::models::{
    CommandError, ConnectionState, DeviceDescriptor, OutboundEvent, RadioState, Record,
    SessionMode,
};
use crate::domain::session::Session;
use crate::infrastructure::adapter::{AdapterNotification, DeviceAdapter};
use crate::infrastructure::storage::SeenRecordStore;
use crate::infrastructure::timeout::TimeoutSupervisor;

const SCAN_TIMEOUT_MSG: &str = "Scan timed out. No device was found.";
const SYNC_TIMEOUT_MSG: &str =
    "We did not receive a response. Please ensure your device is on and try again.";

pub struct Coordinator<A: DeviceAdapter, S: SeenRecordStore> {
    adapter: A,
    store: S,
    config: BridgeConfig,
    session: Session,
    radio: RadioState,
    channel: Option<mpsc::UnboundedSender<OutboundEvent>>,
    timeouts: TimeoutSupervisor,
    /// Armed deadlines report their generation here; the owning run loop
    /// feeds fires back in through [`Coordinator::on_timeout_fired`].
    fires: mpsc::UnboundedSender<u64>,
}

impl<A: DeviceAdapter, S: SeenRecordStore> Coordinator<A, S> {
    pub fn new(
        adapter: A,
        store: S,
        config: BridgeConfig,
        initial_radio: RadioState,
        fires: mpsc::UnboundedSender<u64>,
    ) -> Self {
        Self {
            adapter,
            store,
            config,
            session: Session::new(),
            radio: initial_radio,
            channel: None,
            timeouts: TimeoutSupervisor::new(),
            fires,
        }
    }

    // ---- commands -------------------------------------------------------

    /// Bind the live event channel, discarding any previous registration
    /// and its session. A stale fire from the old session's ticket misses
    /// the generation check and produces nothing.
    pub fn register_channel(&mut self, channel: mpsc::UnboundedSender<OutboundEvent>) {
        self.cancel_ticket();
        self.session = Session::new();
        self.channel = Some(channel);
        info!("event channel registered, session reset");
    }

    pub fn initialize(&self) -> RadioState {
        self.radio
    }

    pub fn is_paired(&self) -> bool {
        self.adapter.is_paired()
    }

    pub fn is_connected(&self) -> bool {
        self.adapter.is_connected()
    }

    pub fn known_device_id(&self) -> Option<String> {
        self.adapter.known_device()
    }

    pub fn start_discovery(&mut self) -> Result<(), CommandError> {
        if self.radio != RadioState::On {
            return Err(CommandError::BluetoothOff);
        }
        self.cancel_ticket();
        self.session.discovered_device = None;
        self.session.state = ConnectionState::Scanning;
        let dispatched = self.adapter.start_scan();
        self.dispatch("start_scan", dispatched);
        self.arm(self.config.discovery_timeout_ms);
        info!("discovery started");
        Ok(())
    }

    /// Pair with the most recently discovered device.
    pub fn pair(&mut self) -> Result<(), CommandError> {
        let device = self
            .session
            .discovered_device
            .clone()
            .ok_or(CommandError::DeviceNotFound)?;
        self.cancel_ticket();
        self.session.state = ConnectionState::Pairing;
        self.session.mode = SessionMode::Pairing;
        info!(mac_id = %device.mac_id, "pairing with discovered device");
        let dispatched = self.adapter.connect(&device.mac_id);
        self.dispatch("connect", dispatched);
        Ok(())
    }

    /// Reconnect to the stored device and sync its data. The whole attempt
    /// runs under one sync deadline.
    pub fn reconnect_and_sync(&mut self) -> Result<(), CommandError> {
        if !self.adapter.is_paired() {
            return Err(CommandError::NoPairedDevice);
        }
        self.cancel_ticket();
        self.session.state = ConnectionState::Connecting;
        self.session.mode = SessionMode::ReconnectSync;
        self.arm(self.config.sync_timeout_ms);
        let dispatched = self.adapter.connect_saved();
        self.dispatch("connect_saved", dispatched);
        info!("reconnect-and-sync started");
        Ok(())
    }

    pub fn set_known_device(&mut self, mac_id: &str) -> Result<(), CommandError> {
        if mac_id.trim().is_empty() {
            return Err(CommandError::InvalidMac);
        }
        if let Some(existing) = self.adapter.known_device() {
            if existing != mac_id {
                return Err(CommandError::MacMismatch);
            }
        }
        let dispatched = self.adapter.set_known_device(mac_id);
        self.dispatch("set_known_device", dispatched);
        Ok(())
    }

    pub fn set_force_full_resync(&mut self, force: bool) {
        self.session.force_full_resync = force;
    }

    /// Applies to every subsequently armed deadline; in-flight deadlines
    /// keep the duration they were armed with.
    pub fn set_operation_timeout(&mut self, milliseconds: u64) -> Result<(), CommandError> {
        if milliseconds == 0 {
            return Err(CommandError::InvalidTimeout);
        }
        self.config.discovery_timeout_ms = milliseconds;
        self.config.sync_timeout_ms = milliseconds;
        Ok(())
    }

    /// Disconnect, forget the device and clear the seen-record set.
    pub fn unlink(&mut self) {
        self.cancel_ticket();
        let dispatched = self.adapter.unlink();
        self.dispatch("unlink", dispatched);
        if let Err(e) = self.store.clear() {
            error!("failed to clear seen-record set: {e:#}");
        }
        self.session.state = ConnectionState::Disconnected;
        self.session.mode = SessionMode::Idle;
        self.session.discovered_device = None;
        self.session.force_full_resync = false;
        info!("device unlinked");
        self.emit(OutboundEvent::UnlinkSuccess);
    }

    // ---- notifications --------------------------------------------------

    /// Entry point for raw vendor SDK events.
    pub fn on_sdk_event(&mut self, event: A::SdkEvent) {
        if let Some(notification) = self.adapter.normalize(event) {
            self.on_notification(notification);
        }
    }

    pub fn on_notification(&mut self, notification: AdapterNotification) {
        match notification {
            AdapterNotification::DeviceFound(descriptor) => self.on_device_found(descriptor),
            AdapterNotification::PairingResult {
                success,
                mac_id,
                msg,
            } => self.on_connection_outcome(success, mac_id, msg),
            AdapterNotification::ConnectionResult { success, mac_id } => {
                self.on_connection_outcome(success, mac_id, "Connection failed.".to_string())
            }
            AdapterNotification::DataReceived(records) => self.on_data_received(records),
            AdapterNotification::Disconnected => self.on_disconnected(),
            AdapterNotification::Reconnecting => self.emit(OutboundEvent::DeviceReconnecting),
            AdapterNotification::AdapterError(msg) => self.on_adapter_error(msg),
        }
    }

    pub fn on_radio_changed(&mut self, state: RadioState) {
        self.radio = state;
        if state == RadioState::Off {
            self.cancel_ticket();
            self.session.state = ConnectionState::Disconnected;
            self.session.mode = SessionMode::Idle;
            warn!("radio powered off, session reset");
        }
        self.emit(OutboundEvent::BluetoothStateChanged { state });
    }

    pub fn on_timeout_fired(&mut self, generation: u64) {
        let live = self
            .session
            .active_ticket
            .map(|ticket| ticket.generation() == generation)
            .unwrap_or(false);
        if !live {
            debug!(generation, "stale timeout fire ignored");
            return;
        }
        self.session.active_ticket = None;
        let msg = match self.session.state {
            ConnectionState::Scanning => SCAN_TIMEOUT_MSG,
            _ => SYNC_TIMEOUT_MSG,
        };
        warn!(generation, "operation timed out");
        self.session.state = ConnectionState::Disconnected;
        self.session.mode = SessionMode::Idle;
        self.emit(OutboundEvent::TimeoutExceeded {
            msg: msg.to_string(),
        });
    }

    fn on_device_found(&mut self, descriptor: DeviceDescriptor) {
        if self.session.state != ConnectionState::Scanning {
            debug!(mac_id = %descriptor.mac_id, "discovery outside an active scan ignored");
            return;
        }
        info!(mac_id = %descriptor.mac_id, rssi = descriptor.rssi, "device found");
        self.emit(OutboundEvent::OnDeviceFound {
            name: descriptor.name.clone(),
            mac_id: descriptor.mac_id.clone(),
            rssi: descriptor.rssi,
        });
        // Latest discovery always wins; pair() acts on this one.
        self.session.discovered_device = Some(descriptor);
    }

    fn on_connection_outcome(&mut self, success: bool, mac_id: String, msg: String) {
        match self.session.state {
            ConnectionState::Connecting | ConnectionState::Pairing => {}
            ConnectionState::Connected | ConnectionState::Syncing if success => {
                debug!("duplicate connection success ignored");
                return;
            }
            _ => {
                debug!(success, "stale connection outcome ignored");
                return;
            }
        }
        self.cancel_ticket();
        if success {
            let mac_id = self.resolve_mac(mac_id);
            let was_pairing = self.session.mode == SessionMode::Pairing;
            self.session.state = ConnectionState::Connected;
            self.session.mode = SessionMode::Idle;
            info!(%mac_id, "device connected");
            self.emit(OutboundEvent::DeviceConnected { mac_id });
            if was_pairing {
                self.emit(OutboundEvent::OnPairingSuccess);
            }
        } else {
            self.session.state = ConnectionState::Disconnected;
            self.session.mode = SessionMode::Idle;
            warn!(%msg, "pairing/connection failed");
            self.emit(OutboundEvent::OnPairingFailed { msg });
        }
    }

    fn on_data_received(&mut self, records: Vec<Record>) {
        match self.session.state {
            ConnectionState::Connected => {}
            // Some SDKs complete a reconnect-sync without a separate
            // connection callback; the data itself is the completion.
            ConnectionState::Connecting if self.session.mode == SessionMode::ReconnectSync => {}
            _ => {
                debug!(count = records.len(), "data batch outside a sync ignored");
                return;
            }
        }
        self.cancel_ticket();
        self.session.state = ConnectionState::Syncing;

        let seen = match self.store.load() {
            Ok(seen) => seen,
            Err(e) => {
                error!("failed to load seen-record set, treating as empty: {e:#}");
                HashSet::new()
            }
        };
        let force = self.session.force_full_resync;
        let outcome = dedup::filter(&records, &seen, force);
        info!(
            total = records.len(),
            new = outcome.to_deliver.len(),
            force,
            "sync complete"
        );

        if outcome.to_deliver.is_empty() {
            self.emit(OutboundEvent::OnDataSyncedNoNewRecords);
        } else {
            self.emit(OutboundEvent::OnDataReceived {
                records: outcome.to_deliver,
            });
        }
        if outcome.any_new {
            if let Err(e) = self.store.store(&outcome.updated_seen) {
                error!("failed to persist seen-record set: {e:#}");
            }
        }
        self.session.force_full_resync = false;
        self.session.mode = SessionMode::Idle;
        self.session.state = ConnectionState::Connected;
    }

    fn on_disconnected(&mut self) {
        if self.session.state == ConnectionState::Disconnected {
            debug!("disconnect while already disconnected ignored");
            return;
        }
        self.cancel_ticket();
        self.session.state = ConnectionState::Disconnected;
        self.session.mode = SessionMode::Idle;
        info!("device disconnected");
        self.emit(OutboundEvent::DeviceDisconnected);
    }

    /// Errors while a connection holds are scoped to the sync attempt; all
    /// others tear the session down.
    fn on_adapter_error(&mut self, msg: String) {
        self.cancel_ticket();
        match self.session.state {
            ConnectionState::Connected | ConnectionState::Syncing => {
                self.session.state = ConnectionState::Connected;
            }
            _ => {
                self.session.state = ConnectionState::Disconnected;
            }
        }
        self.session.mode = SessionMode::Idle;
        warn!(%msg, "adapter error");
        self.emit(OutboundEvent::AdapterError { msg });
    }

    // ---- internals ------------------------------------------------------

    fn arm(&mut self, duration_ms: u64) {
        let fires = self.fires.clone();
        let ticket = self
            .timeouts
            .arm(Duration::from_millis(duration_ms), move |generation| {
                let _ = fires.send(generation);
            });
        self.session.active_ticket = Some(ticket);
    }

    fn cancel_ticket(&mut self) {
        if let Some(ticket) = self.session.active_ticket.take() {
            self.timeouts.cancel(&ticket);
        }
    }

    /// Vendor SDKs do not all report a mac with connection outcomes; fall
    /// back to what the session or the adapter already knows.
    fn resolve_mac(&self, mac_id: String) -> String {
        if !mac_id.is_empty() {
            return mac_id;
        }
        self.session
            .discovered_device
            .as_ref()
            .map(|d| d.mac_id.clone())
            .or_else(|| self.adapter.known_device())
            .unwrap_or_default()
    }

    /// Command dispatch failure means the SDK glue is gone; the armed
    /// deadline (where one exists) surfaces it to the client as a timeout.
    fn dispatch(&self, what: &str, result: anyhow::Result<()>) {
        if let Err(e) = result {
            error!("failed to dispatch {what} to the vendor SDK: {e:#}");
        }
    }

    fn emit(&self, event: OutboundEvent) {
        match &self.channel {
            Some(channel) => {
                debug!(?event, "emitting event");
                if channel.send(event).is_err() {
                    warn!("event channel closed, dropping event");
                }
            }
            None => warn!("no event channel registered, dropping event"),
        }
    }
}
