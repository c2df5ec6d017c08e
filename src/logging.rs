//! Logging setup for the host surfaces.
//!
//! Library code logs through the `log` facade. Installing a `tracing`
//! subscriber also installs the `log` bridge, so both end up in the same
//! sink: logcat on Android, stderr on desktop.

use tracing_subscriber::filter::LevelFilter;

/// Install the platform subscriber. Later calls are no-ops.
pub fn init_logging(max_level: LevelFilter) {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "android")] {
            init_android(max_level);
        } else {
            init_desktop(max_level);
        }
    }
}

#[cfg(target_os = "android")]
fn init_android(max_level: LevelFilter) {
    use tracing_subscriber::prelude::*;

    match tracing_android::layer("AudioEcho") {
        Ok(layer) => {
            if tracing_subscriber::registry()
                .with(layer.with_filter(max_level))
                .try_init()
                .is_err()
            {
                log::debug!("[Logging] Subscriber already installed");
            }
        }
        Err(err) => eprintln!("Failed to open logcat writer: {}", err),
    }
}

#[cfg(not(target_os = "android"))]
fn init_desktop(max_level: LevelFilter) {
    if tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        log::debug!("[Logging] Subscriber already installed");
    }
}
