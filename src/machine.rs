//! Machine-readable output (`--machine`)
//!
//! Events are written as NDJSON, one object per line, each with an `event`
//! field naming its type and a millisecond `timestamp`.
//!
//! ```json
//! {"event":"device_detected","device_id":"FMR0223C13000649","emulator":false,"timestamp":1704700001000}
//! {"event":"app_started","device":"FMR0223C13000649","bundle_name":"com.example.demo","vm_service_uri":"http://127.0.0.1:52011/abc=/","timestamp":1704700002000}
//! ```

use chrono::Utc;
use serde::Serialize;
use std::io::{self, Write};

/// Events emitted in machine mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MachineEvent {
    DeviceDetected {
        device_id: String,
        emulator: bool,
        timestamp: i64,
    },

    /// Output of one external build
    BuildCompleted {
        kind: String,
        artifact: String,
        timestamp: i64,
    },

    AppStarted {
        device: String,
        bundle_name: String,
        vm_service_uri: Option<String>,
        timestamp: i64,
    },

    AppFailed {
        device: String,
        reason: String,
        timestamp: i64,
    },

    Log { message: String, timestamp: i64 },

    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },
}

impl MachineEvent {
    /// Write this event as one JSON line and flush
    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        serde_json::to_writer(&mut *out, self)?;
        writeln!(out)?;
        out.flush()
    }

    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn device_detected(device_id: &str, emulator: bool) -> Self {
        Self::DeviceDetected {
            device_id: device_id.to_string(),
            emulator,
            timestamp: Self::now(),
        }
    }

    pub fn build_completed(kind: &str, artifact: &std::path::Path) -> Self {
        Self::BuildCompleted {
            kind: kind.to_string(),
            artifact: artifact.display().to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn app_started(device: &str, bundle_name: &str, vm_service_uri: Option<String>) -> Self {
        Self::AppStarted {
            device: device.to_string(),
            bundle_name: bundle_name.to_string(),
            vm_service_uri,
            timestamp: Self::now(),
        }
    }

    pub fn app_failed(device: &str, reason: String) -> Self {
        Self::AppFailed {
            device: device.to_string(),
            reason,
            timestamp: Self::now(),
        }
    }

    pub fn log(message: String) -> Self {
        Self::Log {
            message,
            timestamp: Self::now(),
        }
    }

    pub fn error(message: String, fatal: bool) -> Self {
        Self::Error {
            message,
            fatal,
            timestamp: Self::now(),
        }
    }
}
