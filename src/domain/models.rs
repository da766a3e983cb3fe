//! Core data types shared by the coordinator, the vendor adapters and the
//! host-facing command surface.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A device reported by vendor discovery, normalized across SDKs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub name: String,
    #[serde(rename = "macId")]
    pub mac_id: String,
    pub rssi: i16,
}

/// One synced health-data sample.
///
/// `log_date` is the deduplication key; the payload is whatever the vendor
/// adapter produced and is passed through to the host untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "logDate", default)]
    pub log_date: String,
    #[serde(flatten)]
    pub payload: serde_json::Value,
}

/// Connection progress of the one live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Scanning,
    Connecting,
    Pairing,
    Connected,
    Syncing,
}

/// Which client command started the in-flight connection attempt. Consumed
/// (reset to `Idle`) by the first connection outcome, so a pairing flow can
/// never be mistaken for a reconnect later on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    #[default]
    Idle,
    Pairing,
    ReconnectSync,
}

/// Power state of the platform Bluetooth adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadioState {
    #[serde(rename = "BLUETOOTH_ON")]
    On,
    #[serde(rename = "BLUETOOTH_OFF")]
    Off,
    #[serde(rename = "BLUETOOTH_INITIALIZING")]
    Initializing,
}

/// Everything pushed through the registered event channel.
///
/// Serializes with a `code` discriminator so host glue can forward the
/// stream as-is, e.g. `{"code":"ON_DEVICE_FOUND","name":...,"macId":...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundEvent {
    BluetoothStateChanged {
        state: RadioState,
    },
    OnDeviceFound {
        name: String,
        #[serde(rename = "macId")]
        mac_id: String,
        rssi: i16,
    },
    DeviceConnected {
        #[serde(rename = "macId")]
        mac_id: String,
    },
    OnPairingSuccess,
    OnPairingFailed {
        msg: String,
    },
    OnDataReceived {
        records: Vec<Record>,
    },
    OnDataSyncedNoNewRecords,
    DeviceDisconnected,
    DeviceReconnecting,
    TimeoutExceeded {
        msg: String,
    },
    UnlinkSuccess,
    AdapterError {
        msg: String,
    },
}

/// Precondition failures reported synchronously as a command's immediate
/// result. Asynchronous outcomes never use this type; they arrive as
/// [`OutboundEvent`]s.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Bluetooth is not enabled")]
    BluetoothOff,
    #[error("no device discovered to pair with")]
    DeviceNotFound,
    #[error("no paired device to reconnect to")]
    NoPairedDevice,
    #[error("MAC ID must not be empty")]
    InvalidMac,
    #[error("MAC ID does not match the previously linked device")]
    MacMismatch,
    #[error("timeout must be a positive number of milliseconds")]
    InvalidTimeout,
    #[error("bridge service is no longer running")]
    ServiceStopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_code_discriminator() {
        let event = OutboundEvent::OnDeviceFound {
            name: "BGM-01".to_string(),
            mac_id: "AA:BB:CC:DD:EE:FF".to_string(),
            rssi: -60,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["code"], "ON_DEVICE_FOUND");
        assert_eq!(json["macId"], "AA:BB:CC:DD:EE:FF");
        assert_eq!(json["rssi"], -60);
    }

    #[test]
    fn radio_state_uses_plugin_wire_names() {
        let event = OutboundEvent::BluetoothStateChanged {
            state: RadioState::Off,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["code"], "BLUETOOTH_STATE_CHANGED");
        assert_eq!(json["state"], "BLUETOOTH_OFF");
    }

    #[test]
    fn record_payload_flattens_into_the_record_object() {
        let record = Record {
            log_date: "2024-01-01".to_string(),
            payload: serde_json::json!({"glucose": 104, "unit": "mg/dL"}),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["logDate"], "2024-01-01");
        assert_eq!(json["glucose"], 104);
    }
}
