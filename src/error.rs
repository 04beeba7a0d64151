//! Error types for gearwire
//!
//! Provides a unified error type for codec, client state and transport.

use thiserror::Error;

use crate::client::JobState;

/// Result type alias using GearmanError
pub type Result<T> = std::result::Result<T, GearmanError>;

/// Unified error type for gearwire operations
#[derive(Debug, Error)]
pub enum GearmanError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Malformed magic")]
    MalformedMagic,

    #[error("Unknown command type: {0}")]
    UnknownCommand(u32),

    #[error("Command {command} arguments not equal to expected: {expected:?} != {actual:?}")]
    ArgumentMismatch {
        command: u32,
        expected: Vec<&'static str>,
        actual: Vec<String>,
    },

    #[error("Received wrong number of arguments to {command}: expected {expected}, got {actual}")]
    ArgumentCountMismatch {
        command: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Invalid numeric field {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Unknown job handle: {0}")]
    UnknownHandle(String),

    #[error("Unexpected command for a client connection: {0}")]
    UnexpectedCommand(&'static str),

    #[error("Server error {code}: {text}")]
    Server { code: String, text: String },

    // -------------------------------------------------------------------------
    // Client State Errors
    // -------------------------------------------------------------------------
    #[error(
        "Expected handle ({handle}) to be in state {expected}, got {}",
        describe_actual(.actual)
    )]
    InvalidClientState {
        handle: String,
        expected: JobState,
        actual: Option<JobState>,
    },

    #[error("Connection busy: {0} jobs in flight")]
    Busy(usize),

    // -------------------------------------------------------------------------
    // Payload Encoding Errors
    // -------------------------------------------------------------------------
    #[error("Encoding error: {0}")]
    Encoding(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GearmanError {
    /// True when the byte stream can no longer be trusted and the
    /// connection must be torn down.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            GearmanError::MalformedMagic
                | GearmanError::UnknownCommand(_)
                | GearmanError::ArgumentMismatch { .. }
                | GearmanError::ArgumentCountMismatch { .. }
                | GearmanError::InvalidNumber { .. }
                | GearmanError::UnknownHandle(_)
                | GearmanError::UnexpectedCommand(_)
        )
    }

    pub(crate) fn invalid_state(
        handle: Option<&[u8]>,
        expected: JobState,
        actual: Option<JobState>,
    ) -> Self {
        GearmanError::InvalidClientState {
            handle: handle
                .map(|h| String::from_utf8_lossy(h).into_owned())
                .unwrap_or_else(|| "none".to_string()),
            expected,
            actual,
        }
    }
}

fn describe_actual(actual: &Option<JobState>) -> String {
    match actual {
        Some(state) => state.to_string(),
        None => "no pending request".to_string(),
    }
}
