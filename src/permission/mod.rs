//! Runtime permission plumbing.
//!
//! The session never talks to a platform permission API directly. It asks an
//! injected [`PermissionGateway`] and later receives the answer through
//! `EchoSession::on_permission_outcome`, correlated by [`RequestId`].

use serde::{Deserialize, Serialize};

mod desktop;

pub use desktop::{PermissionPolicy, StaticPermissionGateway};

/// Dangerous permissions the echo session may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    RecordAudio,
}

impl Permission {
    /// Platform identifier of the permission.
    pub fn id(&self) -> &'static str {
        match self {
            Permission::RecordAudio => "android.permission.RECORD_AUDIO",
        }
    }
}

/// Identity of one outstanding permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

/// Gateway-level failure reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionErrorKind {
    /// No UI surface is attached to show the request.
    NotAttached,
    /// The gateway already has a request in flight.
    Busy,
}

/// Single-shot answer to a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionOutcome {
    Granted,
    Denied,
    Error(PermissionErrorKind),
}

impl From<bool> for PermissionOutcome {
    fn from(granted: bool) -> Self {
        if granted {
            PermissionOutcome::Granted
        } else {
            PermissionOutcome::Denied
        }
    }
}

/// The one permission request a session may have outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionRequest {
    pub id: RequestId,
    pub permission: Permission,
}

/// Platform permission service consumed by the session.
///
/// `request` must not block: the result is delivered later, once, on the
/// session owner thread. An immediate `Err` is a synchronous error result
/// (for example a gateway with no attached surface).
pub trait PermissionGateway {
    fn is_granted(&self, permission: Permission) -> bool;
    fn request(&mut self, permission: Permission, id: RequestId) -> Result<(), PermissionOutcome>;
}
