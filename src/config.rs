//! Configuration management for the echo session
//!
//! Runtime configuration is loaded from a JSON file so echo limits and
//! engine buffering can be adjusted without recompilation. Nothing is
//! written back: configuration does not persist across process restarts.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::engine::{EchoParameters, HostAudioParams};

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub echo: EchoConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

/// Echo effect limits and defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EchoConfig {
    /// Upper bound of the delay slider in milliseconds
    pub max_delay_ms: u32,
    /// Initial delay as a fraction of `max_delay_ms`
    pub default_delay_fraction: f32,
    /// Initial decay weight in [0.0, 1.0]
    pub default_decay: f32,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            max_delay_ms: 1000,
            default_delay_fraction: 0.1,
            default_decay: 0.1,
        }
    }
}

impl EchoConfig {
    /// Effective delay ceiling: `max_delay_ms` capped at [`EchoParameters::MAX_DELAY_MS`].
    pub fn delay_limit_ms(&self) -> u32 {
        self.max_delay_ms.min(EchoParameters::MAX_DELAY_MS)
    }

    /// Parameters a fresh session starts with.
    pub fn default_parameters(&self) -> EchoParameters {
        let fraction = self.default_delay_fraction.clamp(0.0, 1.0);
        EchoParameters {
            delay_ms: (self.delay_limit_ms() as f32 * fraction).round() as u32,
            decay: self.default_decay.clamp(0.0, 1.0),
        }
    }
}

/// Audio engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate used when the host does not report one
    pub fallback_sample_rate: u32,
    /// Frames per buffer used when the host does not report one
    pub fallback_frames_per_buffer: u32,
    /// Number of pre-allocated buffers circulating between capture and playback
    pub buffer_count: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            fallback_sample_rate: 48000,
            fallback_frames_per_buffer: 192,
            buffer_count: 16,
        }
    }
}

impl AudioConfig {
    /// Host parameters built from the configured fallbacks.
    pub fn fallback_host_params(&self) -> HostAudioParams {
        HostAudioParams {
            sample_rate: self.fallback_sample_rate,
            frames_per_buffer: self.fallback_frames_per_buffer,
            supports_recording: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    Self::capped(config)
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    fn capped(mut config: Self) -> Self {
        let limit = config.echo.delay_limit_ms();
        if config.echo.max_delay_ms != limit {
            log::warn!(
                "[Config] max_delay_ms {} exceeds {} ms; capping",
                config.echo.max_delay_ms,
                limit
            );
            config.echo.max_delay_ms = limit;
        }
        config
    }

    /// Configuration on Android comes from defaults; the APK ships no config asset.
    #[cfg(target_os = "android")]
    pub fn load_android() -> Self {
        log::info!("[Config] Using default configuration on Android");
        Self::default()
    }

    /// Load configuration for non-Android platforms
    #[cfg(not(target_os = "android"))]
    pub fn load() -> Self {
        Self::load_from_file("assets/echo_config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.echo.max_delay_ms, 1000);
        assert_eq!(config.audio.buffer_count, 16);
        assert_eq!(config.audio.fallback_sample_rate, 48000);
    }

    #[test]
    fn test_default_parameters_are_fraction_of_max() {
        let echo = EchoConfig {
            max_delay_ms: 800,
            default_delay_fraction: 0.25,
            default_decay: 0.4,
        };
        let params = echo.default_parameters();
        assert_eq!(params.delay_ms, 200);
        assert!((params.decay - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn test_partial_json_falls_back_per_section() {
        let json = r#"{ "echo": { "max_delay_ms": 500, "default_delay_fraction": 0.5, "default_decay": 0.2 } }"#;
        let parsed: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.echo.max_delay_ms, 500);
        assert_eq!(parsed.audio.buffer_count, 16);
    }

    #[test]
    fn test_oversized_max_delay_is_capped() {
        let path = std::env::temp_dir().join(format!(
            "audio-echo-oversized-{}.json",
            std::process::id()
        ));
        fs::write(
            &path,
            r#"{ "echo": { "max_delay_ms": 5000, "default_delay_fraction": 0.5, "default_decay": 0.2 } }"#,
        )
        .unwrap();
        let config = AppConfig::load_from_file(&path);
        let _ = fs::remove_file(&path);

        assert_eq!(config.echo.max_delay_ms, 1000);
        assert_eq!(config.echo.default_parameters().delay_ms, 500);

        // Built in code rather than loaded, the limit still applies.
        let echo = EchoConfig {
            max_delay_ms: 5000,
            ..EchoConfig::default()
        };
        assert_eq!(echo.delay_limit_ms(), 1000);
        assert_eq!(echo.default_parameters().delay_ms, 100);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join(format!(
            "audio-echo-missing-{}.json",
            std::process::id()
        ));
        let config = AppConfig::load_from_file(&path);
        assert_eq!(config.echo.max_delay_ms, 1000);
    }

    #[test]
    fn test_invalid_json_uses_defaults() {
        let path = std::env::temp_dir().join(format!(
            "audio-echo-invalid-{}.json",
            std::process::id()
        ));
        fs::write(&path, "{ not json").unwrap();
        let config = AppConfig::load_from_file(&path);
        assert_eq!(config.audio.fallback_frames_per_buffer, 192);
        let _ = fs::remove_file(&path);
    }
}
