//! Per-registration session state.

use crate::domain::models::{ConnectionState, DeviceDescriptor, SessionMode};
use crate::infrastructure::timeout::Ticket;

/// State container for one client registration.
///
/// Exactly one `Session` is live per registered event channel; re-registering
/// discards the previous one wholesale. Holding these fields in an explicit
/// record (rather than scattered on a long-lived manager object) is what lets
/// the coordinator be constructed in tests without a hardware stack.
#[derive(Debug, Default)]
pub struct Session {
    pub state: ConnectionState,
    pub mode: SessionMode,
    /// At most one armed deadline at a time; re-arming replaces it.
    pub active_ticket: Option<Ticket>,
    /// Most recent discovery wins; pairing always acts on this one.
    pub discovered_device: Option<DeviceDescriptor>,
    /// One-shot: cleared after the next sync regardless of its outcome.
    pub force_full_resync: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }
}
