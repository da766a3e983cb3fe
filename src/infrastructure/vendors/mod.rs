//! Per-vendor SDK adapters.
//!
//! Each vendor SDK reports events in its own shape; the adapters here reduce
//! them to the common [`crate::infrastructure::adapter::AdapterNotification`]
//! forms before anything reaches the coordinator.

pub mod blood_pressure;
pub mod glucometer;

pub use blood_pressure::BloodPressureAdapter;
pub use glucometer::GlucometerAdapter;
