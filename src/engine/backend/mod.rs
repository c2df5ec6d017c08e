//! Backend abstractions for the echo session controller.

use std::time::Instant;

use crate::config::AudioConfig;

/// Native capture/playback primitive driven by [`crate::engine::EchoSession`].
///
/// Every call is synchronous and bounded. Creation and configuration report
/// plain success; the session decides what a failure means for its state.
/// Implementations do not need to be `Send`: the session lives on one owner
/// thread and desktop streams are thread-bound.
pub trait AudioEngine {
    /// Create the playback half at the host's fast-path parameters.
    fn create_playback(&mut self, sample_rate: u32, frames_per_buffer: u32) -> bool;
    /// Create the capture half. Requires live playback.
    fn create_capture(&mut self) -> bool;
    /// Start playback, then capture.
    ///
    /// Failures are logged by the engine and not reported back, so the
    /// session enters Echoing even if the streams stay paused.
    fn start(&mut self);
    /// Stop capture, then playback.
    fn stop(&mut self);
    fn destroy_playback(&mut self);
    fn destroy_capture(&mut self);
    /// Apply delay/decay. `false` when the engine rejects the values.
    fn configure(&mut self, delay_ms: u32, decay: f32) -> bool;
}

impl<E: AudioEngine + ?Sized> AudioEngine for Box<E> {
    fn create_playback(&mut self, sample_rate: u32, frames_per_buffer: u32) -> bool {
        (**self).create_playback(sample_rate, frames_per_buffer)
    }

    fn create_capture(&mut self) -> bool {
        (**self).create_capture()
    }

    fn start(&mut self) {
        (**self).start()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn destroy_playback(&mut self) {
        (**self).destroy_playback()
    }

    fn destroy_capture(&mut self) {
        (**self).destroy_capture()
    }

    fn configure(&mut self, delay_ms: u32, decay: f32) -> bool {
        (**self).configure(delay_ms, decay)
    }
}

/// Concrete engines selectable at runtime.
pub enum EngineBackend {
    /// Deterministic in-memory engine.
    Stub(DesktopStubEngine),
    #[cfg(not(target_os = "android"))]
    Cpal(CpalBackend),
    #[cfg(target_os = "android")]
    Oboe(OboeBackend),
}

impl EngineBackend {
    /// Real audio backend for the current target.
    pub fn platform_default(config: &AudioConfig) -> Self {
        #[cfg(target_os = "android")]
        let backend = EngineBackend::Oboe(OboeBackend::new(config.buffer_count));
        #[cfg(not(target_os = "android"))]
        let backend = EngineBackend::Cpal(CpalBackend::new(config.buffer_count));
        backend
    }

    pub fn name(&self) -> &'static str {
        match self {
            EngineBackend::Stub(_) => "stub",
            #[cfg(not(target_os = "android"))]
            EngineBackend::Cpal(_) => "cpal",
            #[cfg(target_os = "android")]
            EngineBackend::Oboe(_) => "oboe",
        }
    }

    fn engine_mut(&mut self) -> &mut dyn AudioEngine {
        match self {
            EngineBackend::Stub(engine) => engine,
            #[cfg(not(target_os = "android"))]
            EngineBackend::Cpal(engine) => engine,
            #[cfg(target_os = "android")]
            EngineBackend::Oboe(engine) => engine,
        }
    }
}

impl AudioEngine for EngineBackend {
    fn create_playback(&mut self, sample_rate: u32, frames_per_buffer: u32) -> bool {
        self.engine_mut()
            .create_playback(sample_rate, frames_per_buffer)
    }

    fn create_capture(&mut self) -> bool {
        self.engine_mut().create_capture()
    }

    fn start(&mut self) {
        self.engine_mut().start()
    }

    fn stop(&mut self) {
        self.engine_mut().stop()
    }

    fn destroy_playback(&mut self) {
        self.engine_mut().destroy_playback()
    }

    fn destroy_capture(&mut self) {
        self.engine_mut().destroy_capture()
    }

    fn configure(&mut self, delay_ms: u32, decay: f32) -> bool {
        self.engine_mut().configure(delay_ms, decay)
    }
}

/// Trait representing a monotonic time source used for event timestamps.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(target_os = "android")]
mod oboe;
#[cfg(target_os = "android")]
pub use oboe::OboeBackend;

#[cfg(not(target_os = "android"))]
mod cpal;
#[cfg(not(target_os = "android"))]
pub use cpal::CpalBackend;

mod desktop_stub;
pub use desktop_stub::{
    DesktopStubEngine, EngineCall, FailurePlan, StubLedger, StubProbe, StubTimeSource,
};
