//! Engine module housing the echo session controller.
//!
//! `backend` holds the `AudioEngine` seam and its implementations, `core`
//! the `EchoSession` state machine and `types` the values both share.

pub mod backend;
pub mod core;
pub mod types;

#[cfg(not(target_os = "android"))]
pub use backend::CpalBackend;
#[cfg(target_os = "android")]
pub use backend::OboeBackend;
pub use backend::{
    AudioEngine, DesktopStubEngine, EngineBackend, EngineCall, FailurePlan, StubLedger, StubProbe,
    StubTimeSource, SystemTimeSource, TimeSource,
};
pub use core::EchoSession;
pub use types::{EchoParameters, HostAudioParams, SessionEvent, SessionState, SessionStatus};
