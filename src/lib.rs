// Audio Echo Core - Rust echo session controller
// Real-time capture/playback loop with delay and decay

// Module declarations
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod permission;

#[cfg(target_os = "android")]
mod android;

// Re-exports for convenience
pub use config::AppConfig;
pub use engine::{
    AudioEngine, DesktopStubEngine, EchoParameters, EchoSession, EngineBackend, HostAudioParams,
    SessionEvent, SessionState, SessionStatus,
};
pub use error::{EchoError, ErrorCode};
pub use permission::{
    Permission, PermissionGateway, PermissionOutcome, RequestId, StaticPermissionGateway,
};
