//! Application error types with rich context

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Environment Errors (SDK / toolchain / binaries)
    // ─────────────────────────────────────────────────────────────
    #[error("OpenHarmony SDK not found. Set {env_var} to the SDK location.")]
    SdkNotFound { env_var: String },

    #[error("Required tool '{tool}' not found: {hint}")]
    ToolNotFound { tool: String, hint: String },

    #[error("Unable to run '{program}'. Check that {env_var} points at a valid SDK: {reason}")]
    TransportUnavailable {
        program: String,
        env_var: String,
        reason: String,
    },

    // ─────────────────────────────────────────────────────────────
    // Process / Transport Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Process error: {message}")]
    Process { message: String },

    #[error("Failed to spawn '{program}': {reason}")]
    ProcessSpawn { program: String, reason: String },

    #[error("'{command}' exited with code {code:?}")]
    ProcessExit { command: String, code: Option<i32> },

    #[error("Transport command '{command}' failed: {message}")]
    Transport { command: String, message: String },

    #[error("Transport protocol error: {message}")]
    Protocol { message: String },

    // ─────────────────────────────────────────────────────────────
    // Project / Descriptor Errors
    // ─────────────────────────────────────────────────────────────
    #[error("No OpenHarmony project found in: {path}")]
    NoProject { path: PathBuf },

    #[error("Malformed descriptor {path}: {message}")]
    MalformedDescriptor { path: PathBuf, message: String },

    #[error("No entry module found in {path}. An installable package needs exactly one module of type 'entry'.")]
    MissingEntryModule { path: PathBuf },

    #[error("Project at {path} cannot be used as an embeddable module: {reason}")]
    NotAModule { path: PathBuf, reason: String },

    #[error("Expected build output not found: {path}")]
    MissingArtifact { path: PathBuf },

    #[error("Build error: {message}")]
    Build { message: String },

    #[error("{operation} is not supported: {reason}")]
    Unsupported { operation: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ─────────────────────────────────────────────────────────────
    // Channel / Stream Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Channel send error: {message}")]
    ChannelSend { message: String },

    #[error("Log reader stopped before {waiting_for} was found")]
    StreamClosed { waiting_for: String },

    #[error("Timed out after {seconds}s waiting for {waiting_for}")]
    Timeout { waiting_for: String, seconds: u64 },

    #[error("Cancelled while waiting for {waiting_for}")]
    Cancelled { waiting_for: String },
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn process(message: impl Into<String>) -> Self {
        Self::Process {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn transport(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            command: command.into(),
            message: message.into(),
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::MalformedDescriptor {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn build(message: impl Into<String>) -> Self {
        Self::Build {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn channel_send(message: impl Into<String>) -> Self {
        Self::ChannelSend {
            message: message.into(),
        }
    }

    pub fn tool_not_found(tool: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::ToolNotFound {
            tool: tool.into(),
            hint: hint.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Check if this is a recoverable error
    ///
    /// Recoverable errors are transport hiccups and stream anomalies that a
    /// caller may report and move past (e.g. a failed launch attempt).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. }
                | Error::Protocol { .. }
                | Error::ChannelSend { .. }
                | Error::StreamClosed { .. }
                | Error::Timeout { .. }
                | Error::Cancelled { .. }
        )
    }

    /// Check if this error should terminate the current command
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::SdkNotFound { .. }
                | Error::ToolNotFound { .. }
                | Error::TransportUnavailable { .. }
                | Error::ProcessSpawn { .. }
                | Error::ProcessExit { .. }
                | Error::NoProject { .. }
                | Error::MalformedDescriptor { .. }
                | Error::MissingEntryModule { .. }
                | Error::NotAModule { .. }
                | Error::MissingArtifact { .. }
                | Error::Build { .. }
                | Error::Unsupported { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions (for use with color-eyre)
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
