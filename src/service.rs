//! Bridge service and client handle.
//!
//! One spawned task owns the [`Coordinator`] and is the single serialization
//! point for everything that can touch it: client commands, raw vendor SDK
//! events, timeout fires and radio state changes all funnel through the same
//! `select!` loop, so no two inputs ever interleave mid-transition.
//!
//! Clients hold a cheap, cloneable [`BridgeHandle`] whose async methods send
//! a command and await the acknowledgement. Events flow back independently
//! on the channel obtained from [`BridgeHandle::register_channel`].

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::coordinator::Coordinator;
use crate::domain::models::{CommandError, OutboundEvent, RadioState};
use crate::infrastructure::adapter::DeviceAdapter;
use crate::infrastructure::radio::RadioMonitor;
use crate::infrastructure::storage::SeenRecordStore;

type AckReply = oneshot::Sender<Result<(), CommandError>>;

/// Commands accepted by the bridge run loop.
pub enum Command {
    RegisterChannel {
        channel: mpsc::UnboundedSender<OutboundEvent>,
        reply: AckReply,
    },
    Initialize {
        reply: oneshot::Sender<RadioState>,
    },
    IsPaired {
        reply: oneshot::Sender<bool>,
    },
    IsConnected {
        reply: oneshot::Sender<bool>,
    },
    KnownDevice {
        reply: oneshot::Sender<Option<String>>,
    },
    StartDiscovery {
        reply: AckReply,
    },
    Pair {
        reply: AckReply,
    },
    ReconnectAndSync {
        reply: AckReply,
    },
    SetKnownDevice {
        mac_id: String,
        reply: AckReply,
    },
    SetForceFullResync {
        force: bool,
        reply: AckReply,
    },
    SetOperationTimeout {
        milliseconds: u64,
        reply: AckReply,
    },
    Unlink {
        reply: AckReply,
    },
}

pub struct BridgeService<A: DeviceAdapter, S: SeenRecordStore> {
    coordinator: Coordinator<A, S>,
    commands: mpsc::UnboundedReceiver<Command>,
    sdk_events: mpsc::UnboundedReceiver<A::SdkEvent>,
    fires: mpsc::UnboundedReceiver<u64>,
    radio: RadioMonitor,
    radio_open: bool,
    sdk_open: bool,
}

impl<A: DeviceAdapter, S: SeenRecordStore> BridgeService<A, S> {
    /// Wire up a bridge. Returns the service (to be driven by [`run`]), the
    /// client handle, and the sender platform glue uses to push raw SDK
    /// events in.
    ///
    /// [`run`]: BridgeService::run
    pub fn new(
        adapter: A,
        store: S,
        config: BridgeConfig,
        radio: RadioMonitor,
    ) -> (Self, BridgeHandle, mpsc::UnboundedSender<A::SdkEvent>) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (sdk_tx, sdk_events) = mpsc::unbounded_channel();
        let (fire_tx, fires) = mpsc::unbounded_channel();
        let coordinator = Coordinator::new(adapter, store, config, radio.current(), fire_tx);
        let service = Self {
            coordinator,
            commands,
            sdk_events,
            fires,
            radio,
            radio_open: true,
            sdk_open: true,
        };
        let handle = BridgeHandle {
            commands: command_tx,
        };
        (service, handle, sdk_tx)
    }

    /// Drive the bridge until every client handle is dropped.
    pub async fn run(mut self) {
        info!("bridge service started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        info!("all client handles dropped, bridge service stopping");
                        break;
                    }
                },
                event = self.sdk_events.recv(), if self.sdk_open => match event {
                    Some(event) => self.coordinator.on_sdk_event(event),
                    None => {
                        warn!("vendor SDK event feed closed");
                        self.sdk_open = false;
                    }
                },
                Some(generation) = self.fires.recv() => {
                    self.coordinator.on_timeout_fired(generation);
                }
                state = self.radio.changed(), if self.radio_open => match state {
                    Some(state) => self.coordinator.on_radio_changed(state),
                    None => {
                        warn!("radio state feed closed");
                        self.radio_open = false;
                    }
                },
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::RegisterChannel { channel, reply } => {
                self.coordinator.register_channel(channel);
                let _ = reply.send(Ok(()));
            }
            Command::Initialize { reply } => {
                let _ = reply.send(self.coordinator.initialize());
            }
            Command::IsPaired { reply } => {
                let _ = reply.send(self.coordinator.is_paired());
            }
            Command::IsConnected { reply } => {
                let _ = reply.send(self.coordinator.is_connected());
            }
            Command::KnownDevice { reply } => {
                let _ = reply.send(self.coordinator.known_device_id());
            }
            Command::StartDiscovery { reply } => {
                let _ = reply.send(self.coordinator.start_discovery());
            }
            Command::Pair { reply } => {
                let _ = reply.send(self.coordinator.pair());
            }
            Command::ReconnectAndSync { reply } => {
                let _ = reply.send(self.coordinator.reconnect_and_sync());
            }
            Command::SetKnownDevice { mac_id, reply } => {
                let _ = reply.send(self.coordinator.set_known_device(&mac_id));
            }
            Command::SetForceFullResync { force, reply } => {
                self.coordinator.set_force_full_resync(force);
                let _ = reply.send(Ok(()));
            }
            Command::SetOperationTimeout {
                milliseconds,
                reply,
            } => {
                let _ = reply.send(self.coordinator.set_operation_timeout(milliseconds));
            }
            Command::Unlink { reply } => {
                self.coordinator.unlink();
                let _ = reply.send(Ok(()));
            }
        }
    }
}

/// Client-side handle to a running bridge. Clone freely; every method is a
/// command round-trip through the bridge's serialization point.
#[derive(Clone)]
pub struct BridgeHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl BridgeHandle {
    /// Open the persistent event channel. Replaces any prior registration
    /// and resets the session; the previous receiver goes silent.
    pub async fn register_channel(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<OutboundEvent>, CommandError> {
        let (channel, events) = mpsc::unbounded_channel();
        let (reply, rx) = oneshot::channel();
        self.send(Command::RegisterChannel { channel, reply })?;
        Self::await_reply(rx).await??;
        debug!("event channel registered");
        Ok(events)
    }

    pub async fn initialize(&self) -> Result<RadioState, CommandError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Initialize { reply })?;
        Self::await_reply(rx).await
    }

    pub async fn is_device_paired(&self) -> Result<bool, CommandError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::IsPaired { reply })?;
        Self::await_reply(rx).await
    }

    pub async fn is_device_connected(&self) -> Result<bool, CommandError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::IsConnected { reply })?;
        Self::await_reply(rx).await
    }

    pub async fn known_device(&self) -> Result<Option<String>, CommandError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::KnownDevice { reply })?;
        Self::await_reply(rx).await
    }

    pub async fn start_discovery(&self) -> Result<(), CommandError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::StartDiscovery { reply })?;
        Self::await_reply(rx).await?
    }

    pub async fn pair(&self) -> Result<(), CommandError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Pair { reply })?;
        Self::await_reply(rx).await?
    }

    pub async fn reconnect_and_sync(&self) -> Result<(), CommandError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ReconnectAndSync { reply })?;
        Self::await_reply(rx).await?
    }

    pub async fn set_known_device(&self, mac_id: &str) -> Result<(), CommandError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetKnownDevice {
            mac_id: mac_id.to_string(),
            reply,
        })?;
        Self::await_reply(rx).await?
    }

    /// Arrange for the next sync to deliver every record, seen or not.
    /// One-shot: the flag resets once that sync completes.
    pub async fn set_force_full_resync(&self, force: bool) -> Result<(), CommandError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetForceFullResync { force, reply })?;
        Self::await_reply(rx).await?
    }

    pub async fn set_operation_timeout(&self, milliseconds: u64) -> Result<(), CommandError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetOperationTimeout {
            milliseconds,
            reply,
        })?;
        Self::await_reply(rx).await?
    }

    pub async fn unlink(&self) -> Result<(), CommandError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Unlink { reply })?;
        Self::await_reply(rx).await?
    }

    fn send(&self, command: Command) -> Result<(), CommandError> {
        self.commands
            .send(command)
            .map_err(|_| CommandError::ServiceStopped)
    }

    async fn await_reply<T>(rx: oneshot::Receiver<T>) -> Result<T, CommandError> {
        rx.await.map_err(|_| CommandError::ServiceStopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::infrastructure::radio::radio_channel;
    use crate::infrastructure::storage::MemorySeenRecordStore;
    use crate::infrastructure::vendors::glucometer::{
        GlucometerAdapter, GlucometerCommand, GlucometerSdkEvent,
    };

    struct Rig {
        handle: BridgeHandle,
        sdk_tx: mpsc::UnboundedSender<GlucometerSdkEvent>,
        glue_rx: mpsc::UnboundedReceiver<GlucometerCommand>,
        radio_tx: tokio::sync::watch::Sender<crate::domain::models::RadioState>,
        service_task: tokio::task::JoinHandle<()>,
    }

    fn rig() -> Rig {
        let (glue_tx, glue_rx) = mpsc::unbounded_channel();
        let adapter = GlucometerAdapter::new(glue_tx);
        let (radio_tx, radio) = radio_channel(RadioState::On);
        let (service, handle, sdk_tx) = BridgeService::new(
            adapter,
            MemorySeenRecordStore::new(),
            BridgeConfig::default(),
            radio,
        );
        let service_task = tokio::spawn(service.run());
        Rig {
            handle,
            sdk_tx,
            glue_rx,
            radio_tx,
            service_task,
        }
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<OutboundEvent>) -> OutboundEvent {
        tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn full_pairing_flow_through_the_handle() {
        let mut rig = rig();
        let mut events = rig.handle.register_channel().await.unwrap();

        rig.handle.start_discovery().await.unwrap();
        assert_eq!(
            rig.glue_rx.recv().await.unwrap(),
            GlucometerCommand::StartScan
        );

        rig.sdk_tx
            .send(GlucometerSdkEvent::DeviceFound {
                name: "BGM-01".to_string(),
                mac_id: "AA:BB".to_string(),
                rssi: -58,
            })
            .unwrap();
        assert!(matches!(
            next_event(&mut events).await,
            OutboundEvent::OnDeviceFound { mac_id, .. } if mac_id == "AA:BB"
        ));

        rig.handle.pair().await.unwrap();
        assert_eq!(
            rig.glue_rx.recv().await.unwrap(),
            GlucometerCommand::Link {
                mac_id: "AA:BB".to_string()
            }
        );

        rig.sdk_tx
            .send(GlucometerSdkEvent::DeviceLinked {
                mac_id: "AA:BB".to_string(),
                name: "BGM-01".to_string(),
            })
            .unwrap();
        assert!(matches!(
            next_event(&mut events).await,
            OutboundEvent::DeviceConnected { mac_id } if mac_id == "AA:BB"
        ));
        assert!(matches!(
            next_event(&mut events).await,
            OutboundEvent::OnPairingSuccess
        ));
        assert!(rig.handle.is_device_paired().await.unwrap());
        assert_eq!(
            rig.handle.known_device().await.unwrap().as_deref(),
            Some("AA:BB")
        );
    }

    #[tokio::test]
    async fn sync_timeout_reaches_the_client() {
        let mut rig = rig();
        let mut events = rig.handle.register_channel().await.unwrap();

        rig.handle.set_known_device("AA:BB").await.unwrap();
        rig.handle.set_operation_timeout(10).await.unwrap();
        rig.handle.reconnect_and_sync().await.unwrap();
        assert_eq!(
            rig.glue_rx.recv().await.unwrap(),
            GlucometerCommand::SetKnownDevice {
                mac_id: "AA:BB".to_string()
            }
        );
        assert_eq!(
            rig.glue_rx.recv().await.unwrap(),
            GlucometerCommand::SyncSaved
        );

        assert!(matches!(
            next_event(&mut events).await,
            OutboundEvent::TimeoutExceeded { .. }
        ));
    }

    #[tokio::test]
    async fn radio_changes_are_forwarded_as_events() {
        let rig = rig();
        let mut events = rig.handle.register_channel().await.unwrap();

        rig.radio_tx.send(RadioState::Off).unwrap();
        assert!(matches!(
            next_event(&mut events).await,
            OutboundEvent::BluetoothStateChanged {
                state: RadioState::Off
            }
        ));
        assert_eq!(
            rig.handle.start_discovery().await,
            Err(CommandError::BluetoothOff)
        );
    }

    #[tokio::test]
    async fn initialize_reports_the_current_radio_state() {
        let rig = rig();
        assert_eq!(rig.handle.initialize().await.unwrap(), RadioState::On);
    }

    #[tokio::test]
    async fn commands_after_the_service_stops_fail_cleanly() {
        let rig = rig();
        rig.service_task.abort();
        let _ = rig.service_task.await;

        assert_eq!(
            rig.handle.is_device_paired().await,
            Err(CommandError::ServiceStopped)
        );
    }

    #[tokio::test]
    async fn reconnect_sync_delivers_glucometer_records() {
        let mut rig = rig();
        let mut events = rig.handle.register_channel().await.unwrap();

        rig.handle.set_known_device("AA:BB").await.unwrap();
        rig.handle.reconnect_and_sync().await.unwrap();
        let _ = rig.glue_rx.recv().await;
        let _ = rig.glue_rx.recv().await;

        let document = r#"{"data":[{"logDate":"2024-05-01","glucose":101}]}"#;
        rig.sdk_tx
            .send(GlucometerSdkEvent::SyncComplete {
                document: document.to_string(),
            })
            .unwrap();

        match next_event(&mut events).await {
            OutboundEvent::OnDataReceived { records } => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].log_date, "2024-05-01");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // The same document again yields nothing new.
        rig.sdk_tx
            .send(GlucometerSdkEvent::SyncComplete {
                document: document.to_string(),
            })
            .unwrap();
        assert!(matches!(
            next_event(&mut events).await,
            OutboundEvent::OnDataSyncedNoNewRecords
        ));
    }
}
