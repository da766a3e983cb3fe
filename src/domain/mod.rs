pub mod dedup;
pub mod models;
pub mod session;
