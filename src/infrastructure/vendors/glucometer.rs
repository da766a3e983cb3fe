//! Glucometer vendor adapter.
//!
//! This SDK reports discovery as separate name/mac/rssi callbacks, link and
//! unlink outcomes as distinct delegate methods, and an entire sync as one
//! JSON document whose `data` array holds records keyed by `logDate`.

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::models::{DeviceDescriptor, Record};
use crate::infrastructure::adapter::{AdapterNotification, DeviceAdapter};

/// Commands handed to the glucometer SDK glue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlucometerCommand {
    StartScan,
    Link { mac_id: String },
    SyncSaved,
    Disconnect,
    Unlink,
    SetKnownDevice { mac_id: String },
}

/// Raw callback shapes of the glucometer SDK.
#[derive(Debug, Clone)]
pub enum GlucometerSdkEvent {
    DeviceFound {
        name: String,
        mac_id: String,
        rssi: i16,
    },
    DeviceLinked {
        mac_id: String,
        name: String,
    },
    DeviceLinkFailed,
    DeviceUnlinked,
    /// Whole sync result as one JSON document: `{"data":[{"logDate":...}]}`.
    SyncComplete {
        document: String,
    },
    DeviceNotFound,
    DeviceNotPaired,
    Disconnected,
    Error(String),
}

pub struct GlucometerAdapter {
    commands: mpsc::UnboundedSender<GlucometerCommand>,
    known_mac: Option<String>,
    connected: bool,
}

impl GlucometerAdapter {
    pub fn new(commands: mpsc::UnboundedSender<GlucometerCommand>) -> Self {
        Self {
            commands,
            known_mac: None,
            connected: false,
        }
    }

    fn dispatch(&self, command: GlucometerCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow!("glucometer SDK channel closed"))
    }
}

/// Parse the SDK's sync document into records.
fn parse_sync_document(document: &str) -> Result<Vec<Record>> {
    let value: serde_json::Value = serde_json::from_str(document)?;
    let data = value
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("sync document has no data array"))?;
    data.iter()
        .map(|entry| serde_json::from_value::<Record>(entry.clone()).map_err(Into::into))
        .collect()
}

impl DeviceAdapter for GlucometerAdapter {
    type SdkEvent = GlucometerSdkEvent;

    fn normalize(&mut self, event: GlucometerSdkEvent) -> Option<AdapterNotification> {
        match event {
            GlucometerSdkEvent::DeviceFound { name, mac_id, rssi } => {
                Some(AdapterNotification::DeviceFound(DeviceDescriptor {
                    name: if name.is_empty() {
                        "Unknown".to_string()
                    } else {
                        name
                    },
                    mac_id,
                    rssi,
                }))
            }
            GlucometerSdkEvent::DeviceLinked { mac_id, name } => {
                debug!(%mac_id, %name, "glucometer linked");
                self.known_mac = Some(mac_id.clone());
                self.connected = true;
                Some(AdapterNotification::PairingResult {
                    success: true,
                    mac_id,
                    msg: "Device Linked".to_string(),
                })
            }
            GlucometerSdkEvent::DeviceLinkFailed => Some(AdapterNotification::PairingResult {
                success: false,
                mac_id: String::new(),
                msg: "Device Link Failed".to_string(),
            }),
            GlucometerSdkEvent::DeviceUnlinked => {
                // The coordinator already acknowledged the unlink command;
                // this late confirmation only clears adapter state.
                self.known_mac = None;
                self.connected = false;
                None
            }
            GlucometerSdkEvent::SyncComplete { document } => {
                match parse_sync_document(&document) {
                    Ok(records) => Some(AdapterNotification::DataReceived(records)),
                    Err(e) => {
                        warn!("failed to parse glucometer sync document: {e:#}");
                        Some(AdapterNotification::AdapterError(
                            "Error processing synced data.".to_string(),
                        ))
                    }
                }
            }
            GlucometerSdkEvent::DeviceNotFound => Some(AdapterNotification::PairingResult {
                success: false,
                mac_id: String::new(),
                msg: "Device Not Found".to_string(),
            }),
            GlucometerSdkEvent::DeviceNotPaired => Some(AdapterNotification::PairingResult {
                success: false,
                mac_id: String::new(),
                msg: "Device is not paired. Please pair the device first.".to_string(),
            }),
            GlucometerSdkEvent::Disconnected => {
                self.connected = false;
                Some(AdapterNotification::Disconnected)
            }
            GlucometerSdkEvent::Error(msg) => Some(AdapterNotification::AdapterError(msg)),
        }
    }

    fn start_scan(&mut self) -> Result<()> {
        self.dispatch(GlucometerCommand::StartScan)
    }

    fn connect(&mut self, mac_id: &str) -> Result<()> {
        self.dispatch(GlucometerCommand::Link {
            mac_id: mac_id.to_string(),
        })
    }

    fn connect_saved(&mut self) -> Result<()> {
        self.dispatch(GlucometerCommand::SyncSaved)
    }

    fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        self.dispatch(GlucometerCommand::Disconnect)
    }

    fn unlink(&mut self) -> Result<()> {
        self.known_mac = None;
        self.connected = false;
        self.dispatch(GlucometerCommand::Unlink)
    }

    fn set_known_device(&mut self, mac_id: &str) -> Result<()> {
        self.known_mac = Some(mac_id.to_string());
        self.dispatch(GlucometerCommand::SetKnownDevice {
            mac_id: mac_id.to_string(),
        })
    }

    fn known_device(&self) -> Option<String> {
        self.known_mac.clone()
    }

    fn is_paired(&self) -> bool {
        self.known_mac.is_some()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> (GlucometerAdapter, mpsc::UnboundedReceiver<GlucometerCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (GlucometerAdapter::new(tx), rx)
    }

    #[test]
    fn sync_document_normalizes_to_records() {
        let (mut adapter, _rx) = adapter();
        let document = r#"{"data":[
            {"logDate":"2024-01-01","glucose":104},
            {"logDate":"2024-01-02","glucose":98}
        ]}"#;

        let notification = adapter
            .normalize(GlucometerSdkEvent::SyncComplete {
                document: document.to_string(),
            })
            .unwrap();
        match notification {
            AdapterNotification::DataReceived(records) => {
                assert_eq!(records.len(), 2);
                assert_eq!(records[0].log_date, "2024-01-01");
                assert_eq!(records[0].payload["glucose"], 104);
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    #[test]
    fn unparseable_sync_document_becomes_adapter_error() {
        let (mut adapter, _rx) = adapter();
        let notification = adapter
            .normalize(GlucometerSdkEvent::SyncComplete {
                document: "not json".to_string(),
            })
            .unwrap();
        assert!(matches!(
            notification,
            AdapterNotification::AdapterError(msg) if msg.contains("synced data")
        ));
    }

    #[test]
    fn linking_stores_the_device_and_reports_pairing() {
        let (mut adapter, _rx) = adapter();
        assert!(!adapter.is_paired());

        let notification = adapter
            .normalize(GlucometerSdkEvent::DeviceLinked {
                mac_id: "AA:BB".to_string(),
                name: "BGM-01".to_string(),
            })
            .unwrap();
        assert!(matches!(
            notification,
            AdapterNotification::PairingResult { success: true, .. }
        ));
        assert!(adapter.is_paired());
        assert!(adapter.is_connected());
        assert_eq!(adapter.known_device().as_deref(), Some("AA:BB"));
    }

    #[test]
    fn commands_reach_the_sdk_channel() {
        let (mut adapter, mut rx) = adapter();
        adapter.start_scan().unwrap();
        adapter.connect("AA:BB").unwrap();
        adapter.unlink().unwrap();

        assert_eq!(rx.try_recv().unwrap(), GlucometerCommand::StartScan);
        assert_eq!(
            rx.try_recv().unwrap(),
            GlucometerCommand::Link {
                mac_id: "AA:BB".to_string()
            }
        );
        assert_eq!(rx.try_recv().unwrap(), GlucometerCommand::Unlink);
        assert!(!adapter.is_paired());
    }
}
