//! Vendor SDK capability interface.
//!
//! Every supported vendor SDK is wrapped in an adapter implementing
//! [`DeviceAdapter`]: commands go down as non-blocking dispatches, raw SDK
//! callbacks come back up and are normalized into [`AdapterNotification`]s
//! before the coordinator sees them. The coordinator is written once against
//! this trait and never learns vendor-specific callback shapes.

use anyhow::Result;

use crate::domain::models::{DeviceDescriptor, Record};

/// Normalized notification shapes common to all vendors.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterNotification {
    DeviceFound(DeviceDescriptor),
    /// Outcome of an explicit pairing attempt. `mac_id` may be empty when the
    /// vendor SDK does not report one; the coordinator falls back to the
    /// session's discovered device.
    PairingResult {
        success: bool,
        mac_id: String,
        msg: String,
    },
    /// Outcome of a connection attempt to an already known device.
    ConnectionResult {
        success: bool,
        mac_id: String,
    },
    DataReceived(Vec<Record>),
    Disconnected,
    /// The SDK lost the link and is re-establishing it on its own.
    Reconnecting,
    AdapterError(String),
}

/// Capability surface of one vendor SDK.
///
/// Command methods return as soon as the command is handed to the SDK;
/// outcomes arrive later as notifications. A dispatch error means the SDK
/// glue itself is gone, not that the operation failed.
pub trait DeviceAdapter: Send {
    /// Raw callback/event type of the wrapped SDK.
    type SdkEvent: Send;

    /// Reduce one raw SDK event to a normalized notification, updating any
    /// adapter-held state (known device, link status) on the way. `None`
    /// means the event carries nothing the coordinator needs to see.
    fn normalize(&mut self, event: Self::SdkEvent) -> Option<AdapterNotification>;

    fn start_scan(&mut self) -> Result<()>;
    fn connect(&mut self, mac_id: &str) -> Result<()>;
    /// Connect to the device stored by a previous pairing and sync its data.
    fn connect_saved(&mut self) -> Result<()>;
    fn disconnect(&mut self) -> Result<()>;
    /// Disconnect and forget the stored device.
    fn unlink(&mut self) -> Result<()>;
    fn set_known_device(&mut self, mac_id: &str) -> Result<()>;
    fn known_device(&self) -> Option<String>;
    fn is_paired(&self) -> bool;
    fn is_connected(&self) -> bool;
}
