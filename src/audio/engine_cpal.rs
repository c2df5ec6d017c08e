//! CpalEchoEngine - desktop full-duplex echo over cpal
//!
//! Playback and capture are separate cpal streams joined by the buffer
//! pool. Streams are built paused by the create calls and only run between
//! `start()` and `stop()`.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};

use super::buffer_pool::{BufferPool, CaptureChannels, DEFAULT_BUFFER_SIZE};
use super::callback::{CaptureCallback, PlaybackCallback, StreamCounters};
use super::delay::EchoDelay;
use crate::error::EchoError;

pub struct CpalEchoEngine {
    /// Output audio stream, built by `create_playback`
    output_stream: Option<cpal::Stream>,
    /// Input audio stream, built by `create_capture`
    input_stream: Option<cpal::Stream>,
    /// Capture ends of the pool, held between the two create calls
    pending_capture: Option<CaptureChannels>,
    /// Echo effect shared with the playback callback
    effect: Arc<Mutex<EchoDelay>>,
    counters: Arc<StreamCounters>,
    buffer_count: usize,
    delay_ms: u32,
    decay: f32,
    running: bool,
}

impl CpalEchoEngine {
    pub fn new(buffer_count: usize) -> Self {
        Self {
            output_stream: None,
            input_stream: None,
            pending_capture: None,
            effect: Arc::new(Mutex::new(EchoDelay::new(48000, 1, 0, 0.0))),
            counters: Arc::new(StreamCounters::default()),
            buffer_count: buffer_count.max(2),
            delay_ms: 0,
            decay: 0.0,
            running: false,
        }
    }

    pub fn counters(&self) -> Arc<StreamCounters> {
        Arc::clone(&self.counters)
    }

    pub fn create_playback(
        &mut self,
        sample_rate: u32,
        frames_per_buffer: u32,
    ) -> Result<(), EchoError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| EchoError::StreamFailure {
                reason: "No default output device found".to_string(),
            })?;

        let config = device
            .default_output_config()
            .map_err(|e| EchoError::StreamFailure {
                reason: format!("Failed to get default output config: {:?}", e),
            })?;

        if !matches!(config.sample_format(), cpal::SampleFormat::F32) {
            return Err(EchoError::StreamFailure {
                reason: "Only F32 sample format is currently supported for output".to_string(),
            });
        }

        let stream_config: cpal::StreamConfig = config.into();
        let channels_count = stream_config.channels as usize;
        let device_rate = stream_config.sample_rate.0;
        if device_rate != sample_rate {
            log::info!(
                "[CpalEchoEngine] Host rate {} Hz differs from device rate {} Hz; using device rate",
                sample_rate,
                device_rate
            );
        }

        // The playback callback owns the effect from here on; rebuild it at the device rate.
        self.effect = Arc::new(Mutex::new(EchoDelay::new(
            device_rate,
            1,
            self.delay_ms,
            self.decay,
        )));

        let buffer_size = (frames_per_buffer as usize * 4).max(DEFAULT_BUFFER_SIZE);
        let (capture, playback) =
            BufferPool::new(self.buffer_count, buffer_size).split_for_threads();
        let mut callback =
            PlaybackCallback::new(playback, Arc::clone(&self.effect), Arc::clone(&self.counters));

        let err_fn = |err| log::error!("[CpalEchoEngine] Output stream error: {}", err);
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback.on_output(data, channels_count);
                },
                err_fn,
                None,
            )
            .map_err(|e| EchoError::StreamFailure {
                reason: format!("Output stream: {:?}", e),
            })?;

        // Some hosts start streams on build.
        let _ = stream.pause();

        self.output_stream = Some(stream);
        self.pending_capture = Some(capture);
        Ok(())
    }

    pub fn create_capture(&mut self) -> Result<(), EchoError> {
        let channels = self
            .pending_capture
            .take()
            .ok_or_else(|| EchoError::StreamFailure {
                reason: "Capture requires a playback stream to feed".to_string(),
            })?;

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| EchoError::StreamFailure {
                reason: "No default input device found".to_string(),
            })?;

        let config = device
            .default_input_config()
            .map_err(|e| EchoError::StreamFailure {
                reason: format!("Failed to get default input config: {:?}", e),
            })?;

        if !matches!(config.sample_format(), cpal::SampleFormat::F32) {
            return Err(EchoError::StreamFailure {
                reason: "Only F32 sample format is currently supported for input".to_string(),
            });
        }

        let stream_config: cpal::StreamConfig = config.into();
        let channels_count = stream_config.channels as usize;
        let mut callback = CaptureCallback::new(channels, Arc::clone(&self.counters));

        let err_fn = |err| log::error!("[CpalEchoEngine] Input stream error: {}", err);
        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    callback.on_input(data, channels_count);
                },
                err_fn,
                None,
            )
            .map_err(|e| EchoError::StreamFailure {
                reason: format!("Input stream: {:?}", e),
            })?;

        let _ = stream.pause();

        self.input_stream = Some(stream);
        Ok(())
    }

    /// Start playback first, then the capture that feeds it.
    pub fn start(&mut self) -> Result<(), EchoError> {
        let (Some(output), Some(input)) = (self.output_stream.as_ref(), self.input_stream.as_ref())
        else {
            return Err(EchoError::StreamFailure {
                reason: "Cannot start echo before both streams exist".to_string(),
            });
        };

        output.play().map_err(|e| EchoError::StreamFailure {
            reason: format!("Output start failed: {}", e),
        })?;
        if let Err(e) = input.play() {
            let _ = output.pause();
            return Err(EchoError::StreamFailure {
                reason: format!("Input start failed: {}", e),
            });
        }

        self.running = true;
        Ok(())
    }

    /// Halt capture, then playback.
    pub fn stop(&mut self) -> Result<(), EchoError> {
        if !self.running {
            return Ok(());
        }
        self.running = false;

        if let Some(stream) = self.input_stream.as_ref() {
            stream.pause().map_err(|e| EchoError::StreamFailure {
                reason: format!("Input stop failed: {}", e),
            })?;
        }
        if let Some(stream) = self.output_stream.as_ref() {
            stream.pause().map_err(|e| EchoError::StreamFailure {
                reason: format!("Output stop failed: {}", e),
            })?;
        }
        Ok(())
    }

    pub fn destroy_playback(&mut self) {
        self.pending_capture = None;
        if let Some(stream) = self.output_stream.take() {
            drop(stream);
        }
    }

    pub fn destroy_capture(&mut self) {
        if let Some(stream) = self.input_stream.take() {
            drop(stream);
        }
    }

    pub fn configure(&mut self, delay_ms: u32, decay: f32) -> Result<(), EchoError> {
        let mut effect = self.effect.lock().map_err(|_| EchoError::StreamFailure {
            reason: "Echo effect lock poisoned".to_string(),
        })?;
        effect.set_delay_ms(delay_ms);
        effect.set_decay(decay);
        self.delay_ms = delay_ms;
        self.decay = decay;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}
