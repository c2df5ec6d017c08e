//! Value types shared by the session controller, backends, and host surfaces.

use serde::{Deserialize, Serialize};

use crate::error::{EchoError, ErrorCode};

/// Lifecycle state of an echo session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    AwaitingPermission,
    Ready,
    Echoing,
    Failed,
}

/// Status surfaced to the UI after every operation.
///
/// Mirrors [`SessionState`] and adds the two transient conditions that are
/// reported without being states of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Idle,
    AwaitingPermission,
    Ready,
    Echoing,
    Failed,
    PermissionDenied,
    Busy,
}

impl SessionStatus {
    /// Text for the status line of the hosting surface.
    pub fn message(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "Echo stopped",
            SessionStatus::AwaitingPermission => "Requesting RECORD_AUDIO Permission...",
            SessionStatus::Ready => "RECORD_AUDIO permission granted",
            SessionStatus::Echoing => "Engine Echoing ....",
            SessionStatus::Failed => "Echo engine failed",
            SessionStatus::PermissionDenied => "Error: Permission for RECORD_AUDIO was denied",
            SessionStatus::Busy => "Permission check already in progress",
        }
    }

    /// Stable integer form handed across the JNI boundary.
    pub fn as_i32(&self) -> i32 {
        match self {
            SessionStatus::Idle => 0,
            SessionStatus::AwaitingPermission => 1,
            SessionStatus::Ready => 2,
            SessionStatus::Echoing => 3,
            SessionStatus::Failed => 4,
            SessionStatus::PermissionDenied => 5,
            SessionStatus::Busy => 6,
        }
    }
}

impl From<SessionState> for SessionStatus {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Idle => SessionStatus::Idle,
            SessionState::AwaitingPermission => SessionStatus::AwaitingPermission,
            SessionState::Ready => SessionStatus::Ready,
            SessionState::Echoing => SessionStatus::Echoing,
            SessionState::Failed => SessionStatus::Failed,
        }
    }
}

/// Echo effect parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EchoParameters {
    pub delay_ms: u32,
    pub decay: f32,
}

impl EchoParameters {
    /// Hard ceiling on the delay, whatever the configuration asks for.
    pub const MAX_DELAY_MS: u32 = 1000;

    /// Whether both values are inside their valid ranges.
    ///
    /// `max_delay_ms` can only narrow [`Self::MAX_DELAY_MS`].
    pub fn is_valid(&self, max_delay_ms: u32) -> bool {
        self.delay_ms <= max_delay_ms.min(Self::MAX_DELAY_MS) && (0.0..=1.0).contains(&self.decay)
    }
}

/// Audio parameters queried from the host once, at session creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAudioParams {
    pub sample_rate: u32,
    pub frames_per_buffer: u32,
    /// False when the host cannot open a recorder at this rate.
    pub supports_recording: bool,
}

/// Timestamped status change published on the session event channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub timestamp_ms: u64,
    pub state: SessionState,
    pub status: SessionStatus,
    pub error_code: Option<i32>,
    pub detail: Option<String>,
}

impl SessionEvent {
    pub(crate) fn new(
        timestamp_ms: u64,
        state: SessionState,
        status: SessionStatus,
        error: Option<&EchoError>,
    ) -> Self {
        Self {
            timestamp_ms,
            state,
            status,
            error_code: error.map(|err| err.code()),
            detail: error.map(|err| err.message()),
        }
    }
}
