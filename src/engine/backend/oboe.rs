use std::sync::Arc;

use crate::audio::{OboeEchoEngine, StreamCounters};
use crate::error::log_echo_error;

use super::AudioEngine;

/// Android backend that drives the Oboe-powered echo engine.
pub struct OboeBackend {
    engine: OboeEchoEngine,
}

impl OboeBackend {
    pub fn new(buffer_count: usize) -> Self {
        Self {
            engine: OboeEchoEngine::new(buffer_count),
        }
    }

    pub fn counters(&self) -> Arc<StreamCounters> {
        self.engine.counters()
    }
}

impl AudioEngine for OboeBackend {
    fn create_playback(&mut self, sample_rate: u32, frames_per_buffer: u32) -> bool {
        match self.engine.create_playback(sample_rate, frames_per_buffer) {
            Ok(()) => true,
            Err(err) => {
                log_echo_error(&err, "OboeBackend::create_playback");
                false
            }
        }
    }

    fn create_capture(&mut self) -> bool {
        match self.engine.create_capture() {
            Ok(()) => true,
            Err(err) => {
                log_echo_error(&err, "OboeBackend::create_capture");
                false
            }
        }
    }

    fn start(&mut self) {
        if let Err(err) = self.engine.start() {
            log_echo_error(&err, "OboeBackend::start");
        }
    }

    fn stop(&mut self) {
        if let Err(err) = self.engine.stop() {
            log_echo_error(&err, "OboeBackend::stop");
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
                log_echo_error(&err, "OboeBackend::configure");
                false
            }
        }
    }
}
