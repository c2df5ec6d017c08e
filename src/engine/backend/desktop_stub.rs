use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::{AudioEngine, TimeSource};

/// One call received by a [`DesktopStubEngine`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineCall {
    CreatePlayback {
        sample_rate: u32,
        frames_per_buffer: u32,
    },
    CreateCapture,
    Start,
    Stop,
    DestroyPlayback,
    DestroyCapture,
    Configure {
        delay_ms: u32,
        decay: f32,
    },
}

/// Failures the stub injects into subsequent calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailurePlan {
    pub fail_playback: bool,
    pub fail_capture: bool,
    pub reject_configure: bool,
}

/// Resource ledger kept by the stub engine.
#[derive(Debug, Clone, Default)]
pub struct StubLedger {
    pub playback_live: bool,
    pub capture_live: bool,
    pub running: bool,
    /// Destroy calls for a half that was not live
    pub spurious_destroys: u32,
    /// Last accepted configuration
    pub applied: Option<(u32, f32)>,
    pub failures: FailurePlan,
    pub calls: Vec<EngineCall>,
}

impl StubLedger {
    pub fn any_live(&self) -> bool {
        self.playback_live || self.capture_live
    }

    pub fn both_live(&self) -> bool {
        self.playback_live && self.capture_live
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.iter().filter(|call| pred(call)).count()
    }
}

/// Desktop stub engine used for deterministic testing and CLI tooling.
///
/// Simulates the engine lifecycle without real audio I/O. All calls land in
/// a shared [`StubLedger`] that stays readable through [`StubProbe`] after
/// the engine has been moved into a session.
pub struct DesktopStubEngine {
    ledger: Arc<Mutex<StubLedger>>,
}

/// Inspection and failure-injection handle for a [`DesktopStubEngine`].
#[derive(Clone)]
pub struct StubProbe {
    ledger: Arc<Mutex<StubLedger>>,
}

impl StubProbe {
    pub fn snapshot(&self) -> StubLedger {
        lock_ledger(&self.ledger).clone()
    }

    pub fn set_failures(&self, failures: FailurePlan) {
        lock_ledger(&self.ledger).failures = failures;
    }

    pub fn clear_calls(&self) {
        lock_ledger(&self.ledger).calls.clear();
    }
}

fn lock_ledger(ledger: &Mutex<StubLedger>) -> MutexGuard<'_, StubLedger> {
    ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DesktopStubEngine {
    pub fn new() -> Self {
        Self::with_failures(FailurePlan::default())
    }

    pub fn with_failures(failures: FailurePlan) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(StubLedger {
                failures,
                ..StubLedger::default()
            })),
        }
    }

    pub fn probe(&self) -> StubProbe {
        StubProbe {
            ledger: Arc::clone(&self.ledger),
        }
    }

    fn record(&self, call: EngineCall) -> MutexGuard<'_, StubLedger> {
        let mut ledger = lock_ledger(&self.ledger);
        log::trace!("[DesktopStubEngine] {:?}", call);
        ledger.calls.push(call);
        ledger
    }
}

impl Default for DesktopStubEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngine for DesktopStubEngine {
    fn create_playback(&mut self, sample_rate: u32, frames_per_buffer: u32) -> bool {
        let mut ledger = self.record(EngineCall::CreatePlayback {
            sample_rate,
            frames_per_buffer,
        });
        if ledger.failures.fail_playback || sample_rate == 0 || frames_per_buffer == 0 {
            return false;
        }
        ledger.playback_live = true;
        true
    }

    fn create_capture(&mut self) -> bool {
        let mut ledger = self.record(EngineCall::CreateCapture);
        if ledger.failures.fail_capture || !ledger.playback_live {
            return false;
        }
        ledger.capture_live = true;
        true
    }

    fn start(&mut self) {
        let mut ledger = self.record(EngineCall::Start);
        ledger.running = ledger.both_live();
    }

    fn stop(&mut self) {
        let mut ledger = self.record(EngineCall::Stop);
        ledger.running = false;
    }

    fn destroy_playback(&mut self) {
        let mut ledger = self.record(EngineCall::DestroyPlayback);
        if !ledger.playback_live {
            ledger.spurious_destroys += 1;
        }
        ledger.playback_live = false;
        ledger.running = false;
    }

    fn destroy_capture(&mut self) {
        let mut ledger = self.record(EngineCall::DestroyCapture);
        if !ledger.capture_live {
            ledger.spurious_destroys += 1;
        }
        ledger.capture_live = false;
        ledger.running = false;
    }

    fn configure(&mut self, delay_ms: u32, decay: f32) -> bool {
        let mut ledger = self.record(EngineCall::Configure { delay_ms, decay });
        if ledger.failures.reject_configure {
            return false;
        }
        ledger.applied = Some((delay_ms, decay));
        true
    }
}

/// Deterministic time source for desktop runs.
///
/// Each call to `now()` advances by a fixed 10ms to guarantee monotonic
/// timestamps even when no real audio stream is active.
pub struct StubTimeSource {
    start: Instant,
    offset_ms: AtomicU64,
}

impl StubTimeSource {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }
}

impl Default for StubTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for StubTimeSource {
    fn now(&self) -> Instant {
        let ms = self.offset_ms.fetch_add(10, Ordering::SeqCst);
        self.start + Duration::from_millis(ms)
    }
}
