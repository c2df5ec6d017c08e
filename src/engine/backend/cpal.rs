//! CPAL-based echo backend for desktop platforms (Linux, macOS, Windows)
//!
//! Adapts [`CpalEchoEngine`]'s `Result` API to the boolean [`AudioEngine`]
//! contract, logging the coded error for every failed call.

use std::sync::Arc;

use crate::audio::{CpalEchoEngine, StreamCounters};
use crate::error::log_echo_error;

use super::AudioEngine;

/// CPAL-based backend that delegates to [`CpalEchoEngine`]
pub struct CpalBackend {
    engine: CpalEchoEngine,
}

impl CpalBackend {
    pub fn new(buffer_count: usize) -> Self {
        Self {
            engine: CpalEchoEngine::new(buffer_count),
        }
    }

    pub fn counters(&self) -> Arc<StreamCounters> {
        self.engine.counters()
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }
}

impl AudioEngine for CpalBackend {
    fn create_playback(&mut self, sample_rate: u32, frames_per_buffer: u32) -> bool {
        match self.engine.create_playback(sample_rate, frames_per_buffer) {
            Ok(()) => true,
            Err(err) => {
                log_echo_error(&err, "CpalBackend::create_playback");
                false
            }
        }
    }

    fn create_capture(&mut self) -> bool {
        match self.engine.create_capture() {
            Ok(()) => true,
            Err(err) => {
                log_echo_error(&err, "CpalBackend::create_capture");
                false
            }
        }
    }

    fn start(&mut self) {
        if let Err(err) = self.engine.start() {
            log_echo_error(&err, "CpalBackend::start");
        }
    }

    fn stop(&mut self) {
        if let Err(err) = self.engine.stop() {
            log_echo_error(&err, "CpalBackend::stop");
        }
    }

    fn destroy_playback(&mut self) {
        self.engine.destroy_playback();
    }

    fn destroy_capture(&mut self) {
        self.engine.destroy_capture();
    }

    fn configure(&mut self, delay_ms: u32, decay: f32) -> bool {
        match self.engine.configure(delay_ms, decay) {
            Ok(()) => true,
            Err(err) => {
                log_echo_error(&err, "CpalBackend::configure");
                false
            }
        }
    }
}
