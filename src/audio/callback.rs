//! Echo stream callbacks - real-time halves of the capture/playback loop
//!
//! [`CaptureCallback`] copies device input into pooled buffers and
//! [`PlaybackCallback`] drains them through the echo effect into device
//! output. Both are backend-neutral; the cpal engine calls them from its
//! stream closures and, on Android, they implement the oboe-rs callback
//! traits directly.
//!
//! # Real-Time Safety
//! - No heap allocations (buffers come from the pre-allocated pool)
//! - No blocking locks (the effect is only `try_lock`ed; when the control
//!   thread holds it, the block plays dry)
//! - Bounded execution time (one pass over the device buffer)
//!
//! # Architecture
//! ```text
//! capture device ──> CaptureCallback ──(RECORDED_QUEUE)──> PlaybackCallback ──> output device
//!                          ^                                     │
//!                          └────────────(FREE_QUEUE)─────────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::buffer_pool::{AudioBuffer, CaptureChannels, PlaybackChannels};
use super::delay::EchoDelay;

/// Counters shared between the callbacks and the control thread.
#[derive(Debug, Default)]
pub struct StreamCounters {
    /// Frames captured into pooled buffers
    pub captured_frames: AtomicU64,
    /// Frames written to the output device
    pub played_frames: AtomicU64,
    /// Capture blocks dropped because no free buffer was available
    pub overruns: AtomicU64,
    /// Output frames filled with silence because nothing was recorded yet
    pub underruns: AtomicU64,
}

/// Capture-side callback state.
pub struct CaptureCallback {
    channels: CaptureChannels,
    counters: Arc<StreamCounters>,
}

impl CaptureCallback {
    pub fn new(channels: CaptureChannels, counters: Arc<StreamCounters>) -> Self {
        Self { channels, counters }
    }

    /// Copy one device block into a pooled buffer, keeping the first channel.
    ///
    /// Frames beyond the pooled buffer capacity are dropped rather than
    /// growing the buffer.
    pub fn on_input(&mut self, data: &[f32], channel_count: usize) {
        let channel_count = channel_count.max(1);
        let mut buffer = match self.channels.free_consumer.pop() {
            Ok(buffer) => buffer,
            Err(_) => {
                self.counters.overruns.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let room = buffer.capacity();
        buffer.clear();
        for frame in data.chunks(channel_count).take(room) {
            buffer.push(frame[0]);
        }

        self.counters
            .captured_frames
            .fetch_add(buffer.len() as u64, Ordering::Relaxed);
        // The recorded queue holds every pooled buffer, so this cannot be full.
        let _ = self.channels.recorded_producer.push(buffer);
    }
}

/// Playback-side callback state.
pub struct PlaybackCallback {
    channels: PlaybackChannels,
    effect: Arc<Mutex<EchoDelay>>,
    counters: Arc<StreamCounters>,
    current: Option<AudioBuffer>,
    read_position: usize,
}

impl PlaybackCallback {
    pub fn new(
        channels: PlaybackChannels,
        effect: Arc<Mutex<EchoDelay>>,
        counters: Arc<StreamCounters>,
    ) -> Self {
        Self {
            channels,
            effect,
            counters,
            current: None,
            read_position: 0,
        }
    }

    /// Fill one interleaved device block with echoed capture audio.
    pub fn on_output(&mut self, data: &mut [f32], channel_count: usize) {
        let channel_count = channel_count.max(1);
        let effect_handle = Arc::clone(&self.effect);
        let mut effect = effect_handle.try_lock().ok();
        let mut underruns = 0_u64;
        let mut frames = 0_u64;

        for frame in data.chunks_mut(channel_count) {
            let mut sample = match self.next_sample() {
                Some(sample) => sample,
                None => {
                    underruns += 1;
                    0.0
                }
            };
            if let Some(effect) = effect.as_mut() {
                effect.process(std::slice::from_mut(&mut sample));
            }
            frame.fill(sample);
            frames += 1;
        }

        self.counters
            .played_frames
            .fetch_add(frames, Ordering::Relaxed);
        if underruns > 0 {
            self.counters
                .underruns
                .fetch_add(underruns, Ordering::Relaxed);
        }
    }

    fn next_sample(&mut self) -> Option<f32> {
        loop {
            if let Some(buffer) = self.current.as_ref() {
                if self.read_position < buffer.len() {
                    let sample = buffer[self.read_position];
                    self.read_position += 1;
                    return Some(sample);
                }
            }

            if let Some(drained) = self.current.take() {
                let _ = self.channels.free_producer.push(drained);
            }
            self.read_position = 0;
            self.current = Some(self.channels.recorded_consumer.pop().ok()?);
        }
    }
}

#[cfg(target_os = "android")]
mod oboe_callbacks {
    use oboe::{
        AudioInputCallback, AudioInputStreamSafe, AudioOutputCallback, AudioOutputStreamSafe,
        DataCallbackResult,
    };

    use super::{CaptureCallback, PlaybackCallback};

    impl AudioInputCallback for CaptureCallback {
        type FrameType = (f32, oboe::Mono);

        fn on_audio_ready(
            &mut self,
            _stream: &mut dyn AudioInputStreamSafe,
            frames: &[f32],
        ) -> DataCallbackResult {
            self.on_input(frames, 1);
            DataCallbackResult::Continue
        }
    }

    impl AudioOutputCallback for PlaybackCallback {
        type FrameType = (f32, oboe::Mono);

        fn on_audio_ready(
            &mut self,
            _stream: &mut dyn AudioOutputStreamSafe,
            frames: &mut [f32],
        ) -> DataCallbackResult {
            self.on_output(frames, 1);
            DataCallbackResult::Continue
        }
    }
}
