// Audio module - low-latency echo streams and the delay effect

pub mod buffer_pool;
pub mod callback;
pub mod delay;

#[cfg(target_os = "android")]
pub mod engine;
#[cfg(not(target_os = "android"))]
pub mod engine_cpal;

// Re-export commonly used types for convenience
pub use buffer_pool::{
    AudioBuffer, BufferPool, BufferPoolChannels, DEFAULT_BUFFER_COUNT, DEFAULT_BUFFER_SIZE,
};
pub use callback::StreamCounters;
pub use delay::EchoDelay;
#[cfg(target_os = "android")]
pub use engine::OboeEchoEngine;
#[cfg(not(target_os = "android"))]
pub use engine_cpal::CpalEchoEngine;
