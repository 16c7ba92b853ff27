use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            console_logging_enabled: default_true(),
            file_logging_enabled: default_false(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "bleprint".to_string()
}

/// Service configuration. Fixed at construction; the service never mutates
/// it and exposes no way to change it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterConfig {
    /// Peripherals advertising none of these services are ignored entirely.
    #[serde(default = "default_service_uuids")]
    pub service_uuids: Vec<Uuid>,
    /// When non-empty, only these characteristics qualify as the writable
    /// endpoint. Empty means any characteristic supporting acknowledged
    /// writes qualifies.
    #[serde(default)]
    pub characteristic_uuids: Vec<Uuid>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// The transfer chunk size is the buffer length divided by this, with
    /// the last chunk clipped to the remaining bytes.
    #[serde(default = "default_chunk_divisor")]
    pub chunk_divisor: usize,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            service_uuids: default_service_uuids(),
            characteristic_uuids: Vec::new(),
            connect_timeout_secs: default_connect_timeout_secs(),
            chunk_divisor: default_chunk_divisor(),
            log_settings: LogSettings::default(),
        }
    }
}

impl PrinterConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// 0x18F0 is the de facto serial service advertised by ESC/POS BLE printers.
fn default_service_uuids() -> Vec<Uuid> {
    vec![Uuid::from_u128(0x000018f0_0000_1000_8000_00805f9b34fb)]
}
fn default_connect_timeout_secs() -> u64 {
    15
}
fn default_chunk_divisor() -> usize {
    5
}
