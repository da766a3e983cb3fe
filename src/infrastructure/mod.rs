pub mod adapter;
pub mod logging;
pub mod radio;
pub mod storage;
pub mod timeout;
pub mod vendors;
