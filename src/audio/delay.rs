//! EchoDelay - delay line with decaying feedback
//!
//! Each incoming sample is swapped with the sample recorded `delay` earlier,
//! and the slot is refilled with a weighted mix of the old and the live
//! sample. The output is therefore the delayed signal only, and every pass
//! through the line attenuates it by the decay weight.
//!
//! Weights are quantized to 1/128 steps so that parameter changes map to
//! the same audible levels on every backend.

/// Fixed-point scale for the decay weight.
const FLOAT_TO_INT_MAP_FACTOR: i32 = 128;
const MS_PER_SEC: u64 = 1000;

/// Delay line applied to captured audio before it is played back.
#[derive(Debug, Clone)]
pub struct EchoDelay {
    sample_rate: u32,
    channel_count: usize,
    delay_ms: u32,
    decay: f32,
    feedback_factor: i32,
    live_factor: i32,
    buffer: Vec<f32>,
    position: usize,
}

impl EchoDelay {
    /// Create a delay line.
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz
    /// * `channel_count` - Interleaved channels in the processed buffers
    /// * `delay_ms` - Echo delay in milliseconds
    /// * `decay` - Feedback weight in [0.0, 1.0]
    pub fn new(sample_rate: u32, channel_count: usize, delay_ms: u32, decay: f32) -> Self {
        let mut delay = Self {
            sample_rate,
            channel_count: channel_count.max(1),
            delay_ms,
            decay: 0.0,
            feedback_factor: 0,
            live_factor: FLOAT_TO_INT_MAP_FACTOR,
            buffer: Vec::new(),
            position: 0,
        };
        delay.set_decay(decay);
        delay.allocate_buffer();
        delay
    }

    /// Change the delay time. Reallocates and clears the line.
    ///
    /// Must not be called from a real-time callback.
    pub fn set_delay_ms(&mut self, delay_ms: u32) {
        if delay_ms == self.delay_ms {
            return;
        }
        self.delay_ms = delay_ms;
        self.allocate_buffer();
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms
    }

    /// Change the feedback weight. Values outside [0.0, 1.0] are ignored.
    pub fn set_decay(&mut self, decay: f32) {
        if !(0.0..=1.0).contains(&decay) {
            return;
        }
        self.decay = decay;
        self.feedback_factor = (decay * FLOAT_TO_INT_MAP_FACTOR as f32 + 0.5) as i32;
        self.live_factor = FLOAT_TO_INT_MAP_FACTOR - self.feedback_factor;
    }

    pub fn decay(&self) -> f32 {
        self.decay
    }

    /// Length of the delay line in frames.
    pub fn frames(&self) -> usize {
        self.buffer.len() / self.channel_count
    }

    /// Run interleaved samples through the delay line in place.
    ///
    /// Leaves the samples untouched when the decay is zero or the delay line
    /// is empty. Allocation free.
    pub fn process(&mut self, samples: &mut [f32]) {
        if self.feedback_factor == 0 || self.buffer.is_empty() {
            return;
        }

        let feedback = self.feedback_factor as f32;
        let live = self.live_factor as f32;
        let scale = FLOAT_TO_INT_MAP_FACTOR as f32;

        for sample in samples.iter_mut() {
            let delayed = self.buffer[self.position];
            let mixed = ((delayed * feedback + *sample * live) / scale).clamp(-1.0, 1.0);
            *sample = delayed;
            self.buffer[self.position] = mixed;
            self.position += 1;
            if self.position == self.buffer.len() {
                self.position = 0;
            }
        }
    }

    fn allocate_buffer(&mut self) {
        let frames = (self.delay_ms as u64 * self.sample_rate as u64 + MS_PER_SEC / 2) / MS_PER_SEC;
        self.buffer = vec![0.0; frames as usize * self.channel_count];
        self.position = 0;
    }
}
