//! EchoSession: the echo session controller.
//!
//! Owns the session state machine, the single outstanding permission
//! request, the recorded echo parameters and the exclusively-owned audio
//! engine. All transitions run on the owner thread through `&mut self`; the
//! only asynchronous boundary is the permission result, which re-enters via
//! [`EchoSession::on_permission_outcome`].
//!
//! ```text
//!            start (missing)             granted
//!   Idle ─────────────────> Awaiting ──────────────> Ready ──> Echoing
//!    ^  <─────────────────  Permission                 │          │
//!    │   denied / busy / suspend                       v          │
//!    │                                              Failed        │
//!    └──────────── reset ──────────────────────────────┘          │
//!    └──────────── stop / suspend / destroy ──────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::{AppConfig, EchoConfig};
use crate::engine::backend::{AudioEngine, TimeSource};
#[cfg(not(target_os = "android"))]
use crate::engine::backend::StubTimeSource;
#[cfg(target_os = "android")]
use crate::engine::backend::SystemTimeSource;
use crate::engine::types::{
    EchoParameters, HostAudioParams, SessionEvent, SessionState, SessionStatus,
};
use crate::error::{log_echo_error, EchoError, EngineStage};
use crate::permission::{
    Permission, PermissionErrorKind, PermissionGateway, PermissionOutcome, PermissionRequest,
    RequestId,
};

#[path = "core_subscriptions.rs"]
mod core_subscriptions;

#[cfg(test)]
mod tests;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Echo session controller.
pub struct EchoSession {
    echo_config: EchoConfig,
    host: HostAudioParams,
    engine: Box<dyn AudioEngine>,
    gateway: Box<dyn PermissionGateway>,
    state: SessionState,
    status: SessionStatus,
    params: EchoParameters,
    pending: Option<PermissionRequest>,
    next_request_id: u64,
    destroyed: bool,
    events_tx: broadcast::Sender<SessionEvent>,
    time_source: Arc<dyn TimeSource>,
    start_instant: Instant,
}

impl EchoSession {
    /// Create an Idle session.
    ///
    /// Zero host rates fall back to the configured defaults. The host
    /// parameters are fixed for the lifetime of the session.
    pub fn new(
        config: &AppConfig,
        host: HostAudioParams,
        engine: impl AudioEngine + 'static,
        gateway: impl PermissionGateway + 'static,
    ) -> Self {
        Self::with_time_source(config, host, engine, gateway, Self::create_time_source())
    }

    pub fn with_time_source(
        config: &AppConfig,
        host: HostAudioParams,
        engine: impl AudioEngine + 'static,
        gateway: impl PermissionGateway + 'static,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        let host = Self::normalize_host(config, host);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let start_instant = time_source.now();

        log::info!(
            "[EchoSession] Created (rate={} Hz, frames_per_buffer={}, recording={})",
            host.sample_rate,
            host.frames_per_buffer,
            host.supports_recording
        );

        Self {
            echo_config: config.echo.clone(),
            host,
            engine: Box::new(engine),
            gateway: Box::new(gateway),
            state: SessionState::Idle,
            status: SessionStatus::Idle,
            params: config.echo.default_parameters(),
            pending: None,
            next_request_id: 1,
            destroyed: false,
            events_tx,
            time_source,
            start_instant,
        }
    }

    #[cfg(target_os = "android")]
    fn create_time_source() -> Arc<dyn TimeSource> {
        Arc::new(SystemTimeSource::default())
    }

    #[cfg(not(target_os = "android"))]
    fn create_time_source() -> Arc<dyn TimeSource> {
        Arc::new(StubTimeSource::default())
    }

    fn normalize_host(config: &AppConfig, mut host: HostAudioParams) -> HostAudioParams {
        if host.sample_rate == 0 {
            log::warn!(
                "[EchoSession] Host reported no sample rate, using {} Hz",
                config.audio.fallback_sample_rate
            );
            host.sample_rate = config.audio.fallback_sample_rate;
        }
        if host.frames_per_buffer == 0 {
            log::warn!(
                "[EchoSession] Host reported no buffer size, using {} frames",
                config.audio.fallback_frames_per_buffer
            );
            host.frames_per_buffer = config.audio.fallback_frames_per_buffer;
        }
        host
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn parameters(&self) -> EchoParameters {
        self.params
    }

    pub fn host_params(&self) -> HostAudioParams {
        self.host
    }

    pub fn pending_request(&self) -> Option<PermissionRequest> {
        self.pending
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // ========================================================================
    // STATUS EVENTS
    // ========================================================================

    fn set_status(&mut self, state: SessionState, status: SessionStatus, error: Option<&EchoError>) {
        if state != self.state {
            log::debug!("[EchoSession] {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.status = status;

        let timestamp_ms = self.uptime_ms();
        let _ = self
            .events_tx
            .send(SessionEvent::new(timestamp_ms, state, status, error));
    }

    fn transition(&mut self, state: SessionState) {
        self.set_status(state, SessionStatus::from(state), None);
    }

    /// Report an error without touching the state.
    fn reject(&mut self, err: EchoError, context: &str) -> Result<SessionState, EchoError> {
        log_echo_error(&err, context);
        self.set_status(self.state, self.status, Some(&err));
        Err(err)
    }

    // ========================================================================
    // START / STOP
    // ========================================================================

    /// Start echoing, asking for the record permission first when missing.
    ///
    /// # Returns
    /// * `Ok(Echoing)` - engines created and started (or already echoing)
    /// * `Ok(AwaitingPermission)` - request issued; the answer arrives later
    /// * `Err(Busy)` - a permission request is already outstanding
    /// * `Err(EngineCreateFailed)` - the session is now Failed
    pub fn request_start(&mut self) -> Result<SessionState, EchoError> {
        if self.destroyed {
            return self.reject(EchoError::SessionDestroyed, "EchoSession::request_start");
        }

        match self.state {
            SessionState::Echoing => return Ok(SessionState::Echoing),
            SessionState::AwaitingPermission => {
                let err = EchoError::Busy;
                log::warn!("[EchoSession] Start ignored, permission request outstanding");
                self.set_status(self.state, SessionStatus::Busy, Some(&err));
                return Err(err);
            }
            SessionState::Failed => {
                return self.reject(EchoError::FailedNeedsReset, "EchoSession::request_start")
            }
            SessionState::Idle | SessionState::Ready => {}
        }

        if !self.host.supports_recording {
            return self.reject(EchoError::RecordingUnsupported, "EchoSession::request_start");
        }

        let permission = Permission::RecordAudio;
        if self.gateway.is_granted(permission) {
            self.transition(SessionState::Ready);
            return self.bring_up();
        }

        let id = RequestId(self.next_request_id);
        self.next_request_id += 1;
        self.pending = Some(PermissionRequest { id, permission });
        self.transition(SessionState::AwaitingPermission);
        log::info!("[EchoSession] Requesting {} ({:?})", permission.id(), id);

        match self.gateway.request(permission, id) {
            Ok(()) => Ok(SessionState::AwaitingPermission),
            Err(outcome) => self.on_permission_outcome(id, outcome),
        }
    }

    /// Two-phase engine creation from Ready.
    ///
    /// Whatever was created before a failing step is destroyed again, so
    /// Failed never holds live engines.
    fn bring_up(&mut self) -> Result<SessionState, EchoError> {
        let HostAudioParams {
            sample_rate,
            frames_per_buffer,
            ..
        } = self.host;
        let _span = tracing::debug_span!("bring_up", sample_rate, frames_per_buffer).entered();

        if !self.engine.create_playback(sample_rate, frames_per_buffer) {
            return self.fail(EngineStage::Playback);
        }

        if !self.engine.create_capture() {
            self.engine.destroy_playback();
            return self.fail(EngineStage::Capture);
        }

        let EchoParameters { delay_ms, decay } = self.params;
        if !self.engine.configure(delay_ms, decay) {
            self.engine.destroy_capture();
            self.engine.destroy_playback();
            return self.fail(EngineStage::Configure);
        }

        self.engine.start();
        self.transition(SessionState::Echoing);
        log::info!(
            "[EchoSession] Echoing (delay={} ms, decay={:.2})",
            delay_ms,
            decay
        );
        Ok(SessionState::Echoing)
    }

    fn fail(&mut self, stage: EngineStage) -> Result<SessionState, EchoError> {
        let err = EchoError::EngineCreateFailed { stage };
        log_echo_error(&err, "EchoSession::bring_up");
        self.set_status(SessionState::Failed, SessionStatus::Failed, Some(&err));
        Err(err)
    }

    fn teardown(&mut self) {
        // Playback stop halts capture first inside every engine.
        self.engine.stop();
        self.engine.destroy_capture();
        self.engine.destroy_playback();
    }

    /// Stop echoing and release both engines. No-op unless Echoing.
    pub fn request_stop(&mut self) -> Result<SessionState, EchoError> {
        if self.state != SessionState::Echoing {
            return Ok(self.state);
        }
        self.teardown();
        self.transition(SessionState::Idle);
        log::info!("[EchoSession] Echo stopped");
        Ok(SessionState::Idle)
    }

    /// Leave Failed. No-op from any other state.
    pub fn reset(&mut self) -> Result<SessionState, EchoError> {
        if self.destroyed {
            return self.reject(EchoError::SessionDestroyed, "EchoSession::reset");
        }
        if self.state == SessionState::Failed {
            self.transition(SessionState::Idle);
        }
        Ok(self.state)
    }

    // ========================================================================
    // PERMISSION RESULTS
    // ========================================================================

    /// Deliver the answer to the outstanding request.
    ///
    /// Results for an unknown or already answered request, or arriving after
    /// destroy, are ignored.
    pub fn on_permission_outcome(
        &mut self,
        id: RequestId,
        outcome: PermissionOutcome,
    ) -> Result<SessionState, EchoError> {
        if self.destroyed {
            log::debug!("[EchoSession] Permission result {:?} after destroy", id);
            return Ok(self.state);
        }
        match self.pending {
            Some(request) if request.id == id => self.pending = None,
            _ => {
                log::debug!("[EchoSession] Ignoring stray permission result {:?}", id);
                return Ok(self.state);
            }
        }

        match outcome {
            PermissionOutcome::Granted => {
                self.transition(SessionState::Ready);
                self.bring_up()
            }
            PermissionOutcome::Error(PermissionErrorKind::Busy) => {
                let err = EchoError::Busy;
                log_echo_error(&err, "EchoSession::on_permission_outcome");
                self.set_status(SessionState::Idle, SessionStatus::Busy, Some(&err));
                Err(err)
            }
            PermissionOutcome::Denied | PermissionOutcome::Error(PermissionErrorKind::NotAttached) => {
                let err = EchoError::PermissionDenied;
                log_echo_error(&err, "EchoSession::on_permission_outcome");
                self.set_status(SessionState::Idle, SessionStatus::PermissionDenied, Some(&err));
                Err(err)
            }
        }
    }

    /// Boolean form of [`Self::on_permission_outcome`] for the outstanding request.
    pub fn on_permission_result(&mut self, granted: bool) -> Result<SessionState, EchoError> {
        match self.pending {
            Some(request) => self.on_permission_outcome(request.id, granted.into()),
            None => {
                log::debug!("[EchoSession] Permission result without a request");
                Ok(self.state)
            }
        }
    }

    // ========================================================================
    // PARAMETERS
    // ========================================================================

    /// Change delay and decay.
    ///
    /// Out-of-range values are dropped and the last valid pair stays in
    /// effect. While echoing the engine is reconfigured immediately;
    /// otherwise the values are used by the next start.
    pub fn update_parameters(
        &mut self,
        delay_ms: u32,
        decay: f32,
    ) -> Result<SessionState, EchoError> {
        if self.destroyed {
            return self.reject(EchoError::SessionDestroyed, "EchoSession::update_parameters");
        }
        if self.state == SessionState::Failed {
            return self.reject(EchoError::FailedNeedsReset, "EchoSession::update_parameters");
        }

        let candidate = EchoParameters { delay_ms, decay };
        if !candidate.is_valid(self.echo_config.delay_limit_ms()) {
            log::warn!(
                "[EchoSession] Ignoring out-of-range parameters (delay={} ms, decay={}); keeping {:?}",
                delay_ms,
                decay,
                self.params
            );
            return Ok(self.state);
        }

        if self.state == SessionState::Echoing && !self.engine.configure(delay_ms, decay) {
            return self.reject(
                EchoError::ConfigureRejected { delay_ms, decay },
                "EchoSession::update_parameters",
            );
        }

        self.params = candidate;
        Ok(self.state)
    }

    pub fn set_delay(&mut self, delay_ms: u32) -> Result<SessionState, EchoError> {
        self.update_parameters(delay_ms, self.params.decay)
    }

    pub fn set_decay(&mut self, decay: f32) -> Result<SessionState, EchoError> {
        self.update_parameters(self.params.delay_ms, decay)
    }

    // ========================================================================
    // HOST LIFECYCLE
    // ========================================================================

    /// Host surface went to the background. Stops synchronously.
    ///
    /// An outstanding permission request is cancelled; its late result will
    /// be ignored. Failed is kept until `reset`.
    pub fn on_suspend(&mut self) -> Result<SessionState, EchoError> {
        if let Some(request) = self.pending.take() {
            log::info!("[EchoSession] Cancelling permission request {:?}", request.id);
        }

        match self.state {
            SessionState::Echoing => {
                self.teardown();
                self.transition(SessionState::Idle);
            }
            SessionState::AwaitingPermission | SessionState::Ready => {
                self.transition(SessionState::Idle);
            }
            SessionState::Idle | SessionState::Failed => {}
        }
        Ok(self.state)
    }

    /// Host surface is going away. Idempotent.
    pub fn on_destroy(&mut self) -> Result<SessionState, EchoError> {
        if self.destroyed {
            return Ok(self.state);
        }
        self.on_suspend()?;
        self.destroyed = true;
        self.transition(SessionState::Idle);
        log::info!("[EchoSession] Destroyed");
        Ok(SessionState::Idle)
    }
}

impl Drop for EchoSession {
    fn drop(&mut self) {
        let _ = self.on_destroy();
    }
}
