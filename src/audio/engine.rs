//! OboeEchoEngine - Android full-duplex echo over Oboe
//!
//! Key features:
//! - Low-latency audio I/O via oboe-rs (AAudio/OpenSL ES backends)
//! - Capture and playback run as two async streams joined by the buffer pool
//! - Real-time safe: no allocations, locks, or blocking in either callback
//!
//! Streams are opened at the host's fast-path sample rate and burst size so
//! the device can keep both callbacks on the low-latency path.

use oboe::{
    AudioStream, AudioStreamAsync, AudioStreamBuilder, Input, Output, PerformanceMode,
    SharingMode,
};
use std::sync::{Arc, Mutex};

use super::buffer_pool::{BufferPool, CaptureChannels, DEFAULT_BUFFER_SIZE};
use super::callback::{CaptureCallback, PlaybackCallback, StreamCounters};
use super::delay::EchoDelay;
use crate::error::EchoError;

/// Echo engine for Android
///
/// # Example
/// ```ignore
/// let mut engine = OboeEchoEngine::new(16);
/// engine.create_playback(48000, 192)?;
/// engine.create_capture()?;
/// engine.start()?;
/// // ... echo runs in the stream callbacks
/// engine.stop()?;
/// ```
pub struct OboeEchoEngine {
    /// Output audio stream (playback, started first)
    output_stream: Option<AudioStreamAsync<Output, PlaybackCallback>>,
    /// Input audio stream (capture, feeds playback)
    input_stream: Option<AudioStreamAsync<Input, CaptureCallback>>,
    /// Capture ends of the pool, held between the two create calls
    pending_capture: Option<CaptureChannels>,
    /// Echo effect shared with the playback callback
    effect: Arc<Mutex<EchoDelay>>,
    counters: Arc<StreamCounters>,
    sample_rate: u32,
    frames_per_buffer: u32,
    buffer_count: usize,
    running: bool,
}

impl OboeEchoEngine {
    pub fn new(buffer_count: usize) -> Self {
        Self {
            output_stream: None,
            input_stream: None,
            pending_capture: None,
            effect: Arc::new(Mutex::new(EchoDelay::new(48000, 1, 0, 0.0))),
            counters: Arc::new(StreamCounters::default()),
            sample_rate: 48000,
            frames_per_buffer: 192,
            buffer_count: buffer_count.max(2),
            running: false,
        }
    }

    pub fn counters(&self) -> Arc<StreamCounters> {
        Arc::clone(&self.counters)
    }

    /// Open the output stream with the echo playback callback
    ///
    /// # Errors
    /// Returns error if the output stream cannot be opened
    pub fn create_playback(
        &mut self,
        sample_rate: u32,
        frames_per_buffer: u32,
    ) -> Result<(), EchoError> {
        self.sample_rate = sample_rate;
        self.frames_per_buffer = frames_per_buffer;

        let (delay_ms, decay) = match self.effect.lock() {
            Ok(effect) => (effect.delay_ms(), effect.decay()),
            Err(_) => (0, 0.0),
        };
        self.effect = Arc::new(Mutex::new(EchoDelay::new(sample_rate, 1, delay_ms, decay)));

        let buffer_size = (frames_per_buffer as usize * 4).max(DEFAULT_BUFFER_SIZE);
        let (capture, playback) =
            BufferPool::new(self.buffer_count, buffer_size).split_for_threads();
        let callback =
            PlaybackCallback::new(playback, Arc::clone(&self.effect), Arc::clone(&self.counters));

        let stream = AudioStreamBuilder::default()
            .set_performance_mode(PerformanceMode::LowLatency)
            .set_sharing_mode(SharingMode::Exclusive)
            .set_direction::<Output>()
            .set_sample_rate(sample_rate as i32)
            .set_frames_per_callback(frames_per_buffer as i32)
            .set_channel_count::<oboe::Mono>()
            .set_format::<f32>()
            .set_callback(callback)
            .open_stream()
            .map_err(|e| EchoError::StreamFailure {
                reason: format!("Output stream: {:?}", e),
            })?;

        self.output_stream = Some(stream);
        self.pending_capture = Some(capture);
        Ok(())
    }

    /// Open the input stream feeding the playback callback
    ///
    /// # Errors
    /// Returns error if playback was not created or the input stream cannot be opened
    pub fn create_capture(&mut self) -> Result<(), EchoError> {
        let channels = self
            .pending_capture
            .take()
            .ok_or_else(|| EchoError::StreamFailure {
                reason: "Capture requires a playback stream to feed".to_string(),
            })?;
        let callback = CaptureCallback::new(channels, Arc::clone(&self.counters));

        let stream = AudioStreamBuilder::default()
            .set_performance_mode(PerformanceMode::LowLatency)
            .set_sharing_mode(SharingMode::Exclusive)
            .set_direction::<Input>()
            .set_sample_rate(self.sample_rate as i32)
            .set_frames_per_callback(self.frames_per_buffer as i32)
            .set_channel_count::<oboe::Mono>()
            .set_format::<f32>()
            .set_callback(callback)
            .open_stream()
            .map_err(|e| EchoError::StreamFailure {
                reason: format!("Input stream: {:?}", e),
            })?;

        self.input_stream = Some(stream);
        Ok(())
    }

    /// Start playback, then the capture that feeds it
    pub fn start(&mut self) -> Result<(), EchoError> {
        let (Some(output), Some(input)) = (self.output_stream.as_mut(), self.input_stream.as_mut())
        else {
            return Err(EchoError::StreamFailure {
                reason: "Cannot start echo before both streams exist".to_string(),
            });
        };

        output.start().map_err(|e| EchoError::StreamFailure {
            reason: format!("Failed to start output stream: {:?}", e),
        })?;
        if let Err(e) = input.start() {
            let _ = output.stop();
            return Err(EchoError::StreamFailure {
                reason: format!("Failed to start input stream: {:?}", e),
            });
        }

        self.running = true;
        Ok(())
    }

    /// Stop capture, then playback
    pub fn stop(&mut self) -> Result<(), EchoError> {
        if !self.running {
            return Ok(());
        }
        self.running = false;

        if let Some(stream) = self.input_stream.as_mut() {
            stream.stop().map_err(|e| EchoError::StreamFailure {
                reason: format!("Failed to stop input stream: {:?}", e),
            })?;
        }
        if let Some(stream) = self.output_stream.as_mut() {
            stream.stop().map_err(|e| EchoError::StreamFailure {
                reason: format!("Failed to stop output stream: {:?}", e),
            })?;
        }
        Ok(())
    }

    pub fn destroy_playback(&mut self) {
        self.pending_capture = None;
        self.output_stream = None;
    }

    pub fn destroy_capture(&mut self) {
        self.input_stream = None;
    }

    pub fn configure(&mut self, delay_ms: u32, decay: f32) -> Result<(), EchoError> {
        let mut effect = self.effect.lock().map_err(|_| EchoError::StreamFailure {
            reason: "Echo effect lock poisoned".to_string(),
        })?;
        effect.set_delay_ms(delay_ms);
        effect.set_decay(decay);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}
