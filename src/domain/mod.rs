//! Domain layer - printer identity, replies, configuration and errors.
//!
//! Nothing in here touches the OS.

pub mod config;
pub mod error;
pub mod models;

pub use config::{AppConfig, StoreBackend};
pub use error::{Result, ZebraError};
pub use models::{
    Binding, ConnectedPrinter, DeviceReply, PrinterIdentity, PrinterSettings, ReadStatus, Role,
    SettingValue, UsbId,
};
