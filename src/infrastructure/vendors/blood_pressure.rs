//! Blood-pressure monitor vendor adapter.
//!
//! This SDK reports discovery with a success flag rather than a plain
//! descriptor, connection outcomes as flag-plus-mac, and measurements as
//! structured readings. Readings are keyed by their timestamp for
//! deduplication since the SDK has no per-record identifier.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::domain::models::{DeviceDescriptor, Record};
use crate::infrastructure::adapter::{AdapterNotification, DeviceAdapter};

/// Commands handed to the blood-pressure SDK glue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BloodPressureCommand {
    StartScan,
    Pair { mac_id: String },
    ConnectAndSync,
    Disconnect,
    Unlink,
    SetKnownDevice { mac_id: String },
}

/// One measurement as the SDK reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodPressureReading {
    #[serde(rename = "Systolic")]
    pub systolic: f64,
    #[serde(rename = "Diastolic")]
    pub diastolic: f64,
    #[serde(rename = "PulseRate")]
    pub pulse_rate: f64,
    #[serde(rename = "MeanArterialPressure")]
    pub mean_arterial_pressure: f64,
    #[serde(rename = "Unit")]
    pub unit: String,
    #[serde(rename = "UserID")]
    pub user_id: u32,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
}

/// Raw delegate shapes of the blood-pressure SDK.
#[derive(Debug, Clone)]
pub enum BloodPressureSdkEvent {
    DeviceFound {
        success: bool,
        name: String,
        mac_id: String,
        rssi: i16,
    },
    PairingSucceeded,
    PairingFailed {
        msg: String,
    },
    ConnectResult {
        success: bool,
        mac_id: String,
    },
    Readings(Vec<BloodPressureReading>),
    Disconnected,
    /// The SDK lost the link and is re-establishing it on its own.
    ReconnectAttempt,
    Error(String),
}

pub struct BloodPressureAdapter {
    commands: mpsc::UnboundedSender<BloodPressureCommand>,
    known_mac: Option<String>,
    connected: bool,
}

impl BloodPressureAdapter {
    pub fn new(commands: mpsc::UnboundedSender<BloodPressureCommand>) -> Self {
        Self {
            commands,
            known_mac: None,
            connected: false,
        }
    }

    fn dispatch(&self, command: BloodPressureCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow!("blood-pressure SDK channel closed"))
    }
}

fn readings_to_records(readings: Vec<BloodPressureReading>) -> Result<Vec<Record>> {
    readings
        .into_iter()
        .map(|reading| {
            let log_date = reading.timestamp.clone();
            let payload = serde_json::to_value(&reading)?;
            Ok(Record { log_date, payload })
        })
        .collect()
}

impl DeviceAdapter for BloodPressureAdapter {
    type SdkEvent = BloodPressureSdkEvent;

    fn normalize(&mut self, event: BloodPressureSdkEvent) -> Option<AdapterNotification> {
        match event {
            BloodPressureSdkEvent::DeviceFound {
                success,
                name,
                mac_id,
                rssi,
            } => {
                if !success {
                    return None;
                }
                Some(AdapterNotification::DeviceFound(DeviceDescriptor {
                    name,
                    mac_id,
                    rssi,
                }))
            }
            BloodPressureSdkEvent::PairingSucceeded => {
                // The mac arrives separately via ConnectResult; the
                // coordinator resolves it from session state.
                Some(AdapterNotification::PairingResult {
                    success: true,
                    mac_id: String::new(),
                    msg: "Device paired successfully.".to_string(),
                })
            }
            BloodPressureSdkEvent::PairingFailed { msg } => {
                Some(AdapterNotification::PairingResult {
                    success: false,
                    mac_id: String::new(),
                    msg,
                })
            }
            BloodPressureSdkEvent::ConnectResult { success, mac_id } => {
                if success {
                    self.known_mac = Some(mac_id.clone());
                    self.connected = true;
                } else {
                    self.connected = false;
                }
                Some(AdapterNotification::ConnectionResult { success, mac_id })
            }
            BloodPressureSdkEvent::Readings(readings) => match readings_to_records(readings) {
                Ok(records) => Some(AdapterNotification::DataReceived(records)),
                Err(e) => {
                    warn!("failed to convert blood-pressure readings: {e:#}");
                    Some(AdapterNotification::AdapterError(
                        "Error processing synced data.".to_string(),
                    ))
                }
            },
            BloodPressureSdkEvent::Disconnected => {
                self.connected = false;
                Some(AdapterNotification::Disconnected)
            }
            BloodPressureSdkEvent::ReconnectAttempt => Some(AdapterNotification::Reconnecting),
            BloodPressureSdkEvent::Error(msg) => Some(AdapterNotification::AdapterError(msg)),
        }
    }

    fn start_scan(&mut self) -> Result<()> {
        self.dispatch(BloodPressureCommand::StartScan)
    }

    fn connect(&mut self, mac_id: &str) -> Result<()> {
        self.dispatch(BloodPressureCommand::Pair {
            mac_id: mac_id.to_string(),
        })
    }

    fn connect_saved(&mut self) -> Result<()> {
        self.dispatch(BloodPressureCommand::ConnectAndSync)
    }

    fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        self.dispatch(BloodPressureCommand::Disconnect)
    }

    fn unlink(&mut self) -> Result<()> {
        self.known_mac = None;
        self.connected = false;
        self.dispatch(BloodPressureCommand::Unlink)
    }

    fn set_known_device(&mut self, mac_id: &str) -> Result<()> {
        self.known_mac = Some(mac_id.to_string());
        self.dispatch(BloodPressureCommand::SetKnownDevice {
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
