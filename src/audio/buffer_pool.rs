// BufferPool - lock-free buffer pool with dual SPSC queues
//
// Carries captured audio from the capture callback to the playback callback
// without allocating or locking on either real-time thread.
//
// Architecture:
// - FREE_QUEUE: playback returns drained buffers, capture recycles them
// - RECORDED_QUEUE: capture pushes filled buffers, playback consumes them
//
// Buffer flow:
// 1. Capture callback pops an empty buffer from FREE_QUEUE
// 2. Capture callback copies the device samples into it
// 3. Capture callback pushes the filled buffer to RECORDED_QUEUE
// 4. Playback callback pops the filled buffer from RECORDED_QUEUE
// 5. Playback callback runs the echo effect and writes the device output
// 6. Playback callback pushes the drained buffer back to FREE_QUEUE

use rtrb::{Consumer, Producer};

/// Configuration constants for buffer pool
pub const DEFAULT_BUFFER_COUNT: usize = 16;
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// Audio buffer type - pre-allocated vector of f32 samples
pub type AudioBuffer = Vec<f32>;

/// Queue ends owned by the capture callback.
pub struct CaptureChannels {
    /// Empty buffers ready to be filled
    pub free_consumer: Consumer<AudioBuffer>,
    /// Filled buffers handed to playback
    pub recorded_producer: Producer<AudioBuffer>,
}

/// Queue ends owned by the playback callback.
pub struct PlaybackChannels {
    /// Filled buffers waiting to be played
    pub recorded_consumer: Consumer<AudioBuffer>,
    /// Drained buffers returned for reuse
    pub free_producer: Producer<AudioBuffer>,
}

/// Both halves of a freshly allocated pool.
pub struct BufferPoolChannels {
    pub capture: CaptureChannels,
    pub playback: PlaybackChannels,
}

impl BufferPoolChannels {
    /// Hand each callback its own queue ends.
    pub fn split_for_threads(self) -> (CaptureChannels, PlaybackChannels) {
        (self.capture, self.playback)
    }
}

/// Lock-free buffer pool using dual SPSC ring buffers
///
/// Pre-allocates a fixed number of audio buffers and manages them through
/// two lock-free queues. All heap allocation happens here, before either
/// audio stream starts.
///
/// # Example
/// ```ignore
/// let (mut capture, mut playback) = BufferPool::new(16, 384).split_for_threads();
///
/// // In capture callback:
/// if let Ok(mut buffer) = capture.free_consumer.pop() {
///     buffer.clear();
///     buffer.extend_from_slice(input);
///     capture.recorded_producer.push(buffer).ok();
/// }
///
/// // In playback callback:
/// if let Ok(buffer) = playback.recorded_consumer.pop() {
///     output.copy_from_slice(&buffer);
///     playback.free_producer.push(buffer).ok();
/// }
/// ```
pub struct BufferPool;

impl BufferPool {
    /// Create a new BufferPool with specified buffer count and size
    ///
    /// # Arguments
    /// * `buffer_count` - Number of buffers to pre-allocate (typical: 8-32)
    /// * `buffer_size` - Capacity of each buffer in f32 samples
    ///
    /// # Panics
    /// Panics if buffer_count is 0 or buffer_size is 0
    #[allow(clippy::new_ret_no_self)]
    pub fn new(buffer_count: usize, buffer_size: usize) -> BufferPoolChannels {
        assert!(buffer_count > 0, "buffer_count must be greater than 0");
        assert!(buffer_size > 0, "buffer_size must be greater than 0");

        let (mut free_producer, free_consumer) = rtrb::RingBuffer::new(buffer_count);
        let (recorded_producer, recorded_consumer) = rtrb::RingBuffer::new(buffer_count);

        for _ in 0..buffer_count {
            let buffer = vec![0.0_f32; buffer_size];
            free_producer
                .push(buffer)
                .expect("Failed to push buffer to free queue during initialization");
        }

        BufferPoolChannels {
            capture: CaptureChannels {
                free_consumer,
                recorded_producer,
            },
            playback: PlaybackChannels {
                recorded_consumer,
                free_producer,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_pool_creation() {
        let (mut capture, mut playback) = BufferPool::new(16, 2048).split_for_threads();

        let mut available_buffers = 0;
        while capture.free_consumer.pop().is_ok() {
            available_buffers += 1;
        }
        assert_eq!(available_buffers, 16, "Expected 16 buffers in free queue");

        assert!(
            playback.recorded_consumer.pop().is_err(),
            "Recorded queue should be empty initially"
        );
    }

    #[test]
    fn test_buffer_circulation() {
        let (mut capture, mut playback) = BufferPool::new(4, 1024).split_for_threads();

        let mut buffer = capture
            .free_consumer
            .pop()
            .expect("Should have buffer in free queue");
        buffer[0] = 1.0;
        capture
            .recorded_producer
            .push(buffer)
            .expect("Should push to recorded queue");

        let buffer = playback
            .recorded_consumer
            .pop()
            .expect("Should have buffer in recorded queue");
        assert_eq!(buffer[0], 1.0, "Buffer data should be preserved");
        playback
            .free_producer
            .push(buffer)
            .expect("Should return buffer to free queue");

        let buffer = capture
            .free_consumer
            .pop()
            .expect("Buffer should be back in free queue");
        assert_eq!(buffer.len(), 1024, "Buffer size should be unchanged");
    }

    #[test]
    fn test_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CaptureChannels>();
        assert_send::<PlaybackChannels>();
    }

    #[test]
    fn test_pool_exhaustion() {
        let (mut capture, mut playback) = BufferPool::new(2, 512).split_for_threads();

        for i in 0..2 {
            let mut buffer = capture.free_consumer.pop().unwrap();
            buffer[0] = i as f32;
            capture.recorded_producer.push(buffer).unwrap();
        }

        assert!(
            capture.free_consumer.pop().is_err(),
            "Free queue should be exhausted"
        );

        for i in 0..2 {
            let buffer = playback.recorded_consumer.pop().unwrap();
            assert_eq!(buffer[0], i as f32);
            playback.free_producer.push(buffer).unwrap();
        }

        assert!(capture.free_consumer.pop().is_ok());
        assert!(capture.free_consumer.pop().is_ok());
        assert!(capture.free_consumer.pop().is_err());
    }

    #[test]
    #[should_panic(expected = "buffer_count must be greater than 0")]
    fn test_zero_buffer_count_panics() {
        BufferPool::new(0, 1024);
    }

    #[test]
    #[should_panic(expected = "buffer_size must be greater than 0")]
    fn test_zero_buffer_size_panics() {
        BufferPool::new(16, 0);
    }
}
