// Echo session error types and constants

use crate::error::ErrorCode;
use log::error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Echo error code constants shared with the host UI layer
///
/// The JNI bridge hands these numbers to Java unchanged, so they are the
/// single source of truth for error codes on both sides.
///
/// Error code range: 3001-3008
pub struct EchoErrorCodes {}

impl EchoErrorCodes {
    /// User declined the RECORD_AUDIO permission
    pub const PERMISSION_DENIED: i32 = 3001;

    /// A start or permission request is already outstanding
    pub const BUSY: i32 = 3002;

    /// Playback or capture engine construction failed
    pub const ENGINE_CREATE_FAILED: i32 = 3003;

    /// Live parameter update refused by the engine
    pub const CONFIGURE_REJECTED: i32 = 3004;

    /// Session is in Failed and needs an explicit reset
    pub const FAILED_NEEDS_RESET: i32 = 3005;

    /// Host audio subsystem cannot record
    pub const RECORDING_UNSUPPORTED: i32 = 3006;

    /// Session was destroyed by its hosting surface
    pub const SESSION_DESTROYED: i32 = 3007;

    /// Audio stream failed inside the engine
    pub const STREAM_FAILURE: i32 = 3008;
}

/// Which step of the two-phase engine bring-up failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStage {
    Playback,
    Capture,
    Configure,
}

impl fmt::Display for EngineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineStage::Playback => "playback",
            EngineStage::Capture => "capture",
            EngineStage::Configure => "configure",
        };
        f.write_str(name)
    }
}

/// Log an echo error with structured context
///
/// This function logs session errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: The operation that surfaced the error
pub fn log_echo_error(err: &EchoError, context: &str) {
    error!(
        "Echo error in {}: code={}, component=EchoSession, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Echo session errors
///
/// Every variant is reported synchronously to the caller of the operation
/// that triggered it. Nothing is retried automatically.
///
/// Error code ranges: 3001-3008
#[derive(Debug, Clone, PartialEq)]
pub enum EchoError {
    /// User declined; terminal for the current start attempt
    PermissionDenied,

    /// A second start arrived while a permission request was outstanding
    Busy,

    /// Engine construction failed; partially created engines were torn down
    EngineCreateFailed { stage: EngineStage },

    /// Engine refused new live parameters; previous ones remain in effect
    ConfigureRejected { delay_ms: u32, decay: f32 },

    /// Session is in Failed and only `reset()` leaves it
    FailedNeedsReset,

    /// Host reported that audio recording is not supported
    RecordingUnsupported,

    /// Session was destroyed; late calls are rejected
    SessionDestroyed,

    /// Audio stream failed inside an engine backend
    StreamFailure { reason: String },
}

impl ErrorCode for EchoError {
    fn code(&self) -> i32 {
        match self {
            EchoError::PermissionDenied => EchoErrorCodes::PERMISSION_DENIED,
            EchoError::Busy => EchoErrorCodes::BUSY,
            EchoError::EngineCreateFailed { .. } => EchoErrorCodes::ENGINE_CREATE_FAILED,
            EchoError::ConfigureRejected { .. } => EchoErrorCodes::CONFIGURE_REJECTED,
            EchoError::FailedNeedsReset => EchoErrorCodes::FAILED_NEEDS_RESET,
            EchoError::RecordingUnsupported => EchoErrorCodes::RECORDING_UNSUPPORTED,
            EchoError::SessionDestroyed => EchoErrorCodes::SESSION_DESTROYED,
            EchoError::StreamFailure { .. } => EchoErrorCodes::STREAM_FAILURE,
        }
    }

    fn message(&self) -> String {
        match self {
            EchoError::PermissionDenied => {
                "Error: Permission for RECORD_AUDIO was denied".to_string()
            }
            EchoError::Busy => "Permission check already in progress".to_string(),
            EchoError::EngineCreateFailed { stage } => match stage {
                EngineStage::Playback => "Failed to create Audio Player".to_string(),
                EngineStage::Capture => "Failed to create Audio Recorder".to_string(),
                EngineStage::Configure => {
                    "Failed to apply echo parameters to new engine".to_string()
                }
            },
            EchoError::ConfigureRejected { delay_ms, decay } => {
                format!(
                    "Engine rejected echo parameters (delay {} ms, decay {:.2})",
                    delay_ms, decay
                )
            }
            EchoError::FailedNeedsReset => {
                "Echo session failed. Call reset() before starting again.".to_string()
            }
            EchoError::RecordingUnsupported => {
                "Error: Audio recording is not supported".to_string()
            }
            EchoError::SessionDestroyed => "Echo session already destroyed".to_string(),
            EchoError::StreamFailure { reason } => format!("Audio stream failed: {}", reason),
        }
    }
}

impl fmt::Display for EchoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EchoError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for EchoError {}
