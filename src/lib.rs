//! Health Device Bridge
//!
//! Pairs Bluetooth health devices (glucometers, blood-pressure monitors)
//! with an embedding host application and syncs their stored readings,
//! delivering only records the client has not seen before.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      BridgeHandle                        │
//! │        (client API - commands in, events out)            │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │ one mpsc run loop
//!                       ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Coordinator                         │
//! │   (session state machine - the single serialization      │
//! │    point for commands, SDK events, timeouts, radio)      │
//! └───────┬───────────────┬───────────────┬─────────────────┘
//!         │               │               │
//!         ▼               ▼               ▼
//! ┌─────────────┐  ┌─────────────┐  ┌─────────────┐
//! │DeviceAdapter│  │   Timeout   │  │ SeenRecord  │
//! │             │  │ Supervisor  │  │    Store    │
//! │ - vendor SDK│  │ - one-shot  │  │ - dedup keys│
//! │   commands  │  │   deadlines │  │ - JSON file │
//! │ - normalize │  │ - generation│  │   or memory │
//! │   callbacks │  │   tickets   │  │             │
//! └─────────────┘  └─────────────┘  └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`domain`] - Session model, outbound events, record deduplication
//! - [`infrastructure`] - Vendor adapters, timeouts, radio feed, storage, logging
//! - [`coordinator`] - The pairing/sync state machine
//! - [`service`] - The run loop and the client-facing [`BridgeHandle`]
//! - [`config`] - Timeout and logging configuration

pub mod config;
pub mod coordinator;
pub mod domain;
pub mod infrastructure;
pub mod service;

pub use config::BridgeConfig;
pub use coordinator::Coordinator;
pub use domain::models::{CommandError, OutboundEvent, RadioState, Record};
pub use infrastructure::adapter::{AdapterNotification, DeviceAdapter};
pub use infrastructure::logging::{init_logging, LoggingGuard};
pub use infrastructure::radio::{radio_channel, RadioMonitor};
pub use infrastructure::storage::{JsonSeenRecordStore, MemorySeenRecordStore, SeenRecordStore};
pub use infrastructure::vendors::{BloodPressureAdapter, GlucometerAdapter};
pub use service::{BridgeHandle, BridgeService};
