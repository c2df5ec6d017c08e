// Error types for the audio echo session
//
// This module defines the coded error type returned by session operations,
// providing structured error handling with error codes suitable for FFI communication.

mod echo;

pub use echo::{log_echo_error, EchoError, EchoErrorCodes, EngineStage};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the FFI boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
