use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;
use crate::engine::backend::{
    DesktopStubEngine, EngineCall, FailurePlan, StubProbe, StubTimeSource,
};
use crate::permission::{PermissionPolicy, StaticPermissionGateway};

fn host() -> HostAudioParams {
    HostAudioParams {
        sample_rate: 48000,
        frames_per_buffer: 192,
        supports_recording: true,
    }
}

fn session_with(
    gateway: StaticPermissionGateway,
    failures: FailurePlan,
) -> (EchoSession, StubProbe, Rc<RefCell<Vec<RequestId>>>) {
    let engine = DesktopStubEngine::with_failures(failures);
    let probe = engine.probe();
    let requests = gateway.request_log();
    let session = EchoSession::new(&AppConfig::default(), host(), engine, gateway);
    (session, probe, requests)
}

fn granted_session() -> (EchoSession, StubProbe) {
    let (session, probe, _) =
        session_with(StaticPermissionGateway::granted(), FailurePlan::default());
    (session, probe)
}

fn prompting_session() -> (EchoSession, StubProbe, Rc<RefCell<Vec<RequestId>>>) {
    session_with(StaticPermissionGateway::prompting(), FailurePlan::default())
}

fn is_create(call: &EngineCall) -> bool {
    matches!(
        call,
        EngineCall::CreatePlayback { .. } | EngineCall::CreateCapture
    )
}

#[test]
fn denied_permission_returns_to_idle() {
    let (mut session, probe, requests) = prompting_session();

    assert_eq!(
        session.request_start(),
        Ok(SessionState::AwaitingPermission)
    );
    assert_eq!(requests.borrow().len(), 1);

    assert_eq!(
        session.on_permission_result(false),
        Err(EchoError::PermissionDenied)
    );
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.status(), SessionStatus::PermissionDenied);
    assert!(session.pending_request().is_none());
    assert!(probe.snapshot().calls.is_empty());
}

#[test]
fn granted_permission_starts_echo() {
    let (mut session, probe) = granted_session();

    assert_eq!(session.request_start(), Ok(SessionState::Echoing));
    assert_eq!(session.status(), SessionStatus::Echoing);

    let ledger = probe.snapshot();
    assert!(ledger.both_live());
    assert!(ledger.running);
    assert_eq!(
        ledger.calls,
        vec![
            EngineCall::CreatePlayback {
                sample_rate: 48000,
                frames_per_buffer: 192
            },
            EngineCall::CreateCapture,
            EngineCall::Configure {
                delay_ms: 100,
                decay: 0.1
            },
            EngineCall::Start,
        ]
    );
}

#[test]
fn live_update_reconfigures_engine() {
    let (mut session, probe) = granted_session();
    session.request_start().unwrap();
    assert_eq!(session.parameters().delay_ms, 100);
    probe.clear_calls();

    assert_eq!(
        session.update_parameters(50, 0.3),
        Ok(SessionState::Echoing)
    );
    assert_eq!(
        probe.snapshot().calls,
        vec![EngineCall::Configure {
            delay_ms: 50,
            decay: 0.3
        }]
    );
    assert_eq!(
        session.parameters(),
        EchoParameters {
            delay_ms: 50,
            decay: 0.3
        }
    );
}

#[test]
fn capture_failure_unwinds_playback() {
    let (mut session, probe, _) = session_with(
        StaticPermissionGateway::granted(),
        FailurePlan {
            fail_capture: true,
            ..FailurePlan::default()
        },
    );

    assert_eq!(
        session.request_start(),
        Err(EchoError::EngineCreateFailed {
            stage: EngineStage::Capture
        })
    );
    assert_eq!(session.state(), SessionState::Failed);

    let ledger = probe.snapshot();
    assert!(!ledger.any_live());
    assert_eq!(ledger.count(|c| *c == EngineCall::DestroyPlayback), 1);
    assert_eq!(ledger.count(|c| *c == EngineCall::DestroyCapture), 0);
    assert_eq!(ledger.count(|c| *c == EngineCall::Start), 0);
}

#[test]
fn destroy_while_awaiting_ignores_late_grant() {
    let (mut session, probe, _) = prompting_session();
    session.request_start().unwrap();

    assert_eq!(session.on_destroy(), Ok(SessionState::Idle));
    assert_eq!(session.on_permission_result(true), Ok(SessionState::Idle));
    assert_eq!(
        session.on_permission_outcome(RequestId(1), PermissionOutcome::Granted),
        Ok(SessionState::Idle)
    );

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(probe.snapshot().count(is_create), 0);
}

#[test]
fn second_start_while_awaiting_is_busy() {
    let (mut session, probe, requests) = prompting_session();

    session.request_start().unwrap();
    assert_eq!(session.request_start(), Err(EchoError::Busy));
    assert_eq!(session.state(), SessionState::AwaitingPermission);
    assert_eq!(session.status(), SessionStatus::Busy);
    assert_eq!(requests.borrow().len(), 1);

    // The original request is still live.
    assert_eq!(session.on_permission_result(true), Ok(SessionState::Echoing));
    assert!(probe.snapshot().both_live());
}

#[test]
fn stray_permission_result_is_noop() {
    let (mut session, probe, _) = prompting_session();

    assert_eq!(session.on_permission_result(true), Ok(SessionState::Idle));
    assert_eq!(session.status(), SessionStatus::Idle);

    session.request_start().unwrap();
    let pending = session.pending_request().unwrap();
    assert_eq!(
        session.on_permission_outcome(RequestId(pending.id.0 + 7), PermissionOutcome::Granted),
        Ok(SessionState::AwaitingPermission)
    );
    assert_eq!(session.pending_request(), Some(pending));
    assert_eq!(probe.snapshot().count(is_create), 0);
}

#[test]
fn destroy_releases_engines_exactly_once() {
    let (mut session, probe) = granted_session();
    session.request_start().unwrap();

    session.on_destroy().unwrap();
    session.on_destroy().unwrap();
    drop(session);

    let ledger = probe.snapshot();
    assert!(!ledger.any_live());
    assert_eq!(ledger.count(|c| *c == EngineCall::DestroyCapture), 1);
    assert_eq!(ledger.count(|c| *c == EngineCall::DestroyPlayback), 1);
    assert_eq!(ledger.spurious_destroys, 0);
}

#[test]
fn dropping_echoing_session_tears_down() {
    let (mut session, probe) = granted_session();
    session.request_start().unwrap();
    drop(session);

    let ledger = probe.snapshot();
    assert!(!ledger.any_live());
    assert!(!ledger.running);
}

#[test]
fn playback_failure_leaves_nothing_to_destroy() {
    let (mut session, probe, _) = session_with(
        StaticPermissionGateway::granted(),
        FailurePlan {
            fail_playback: true,
            ..FailurePlan::default()
        },
    );

    assert_eq!(
        session.request_start(),
        Err(EchoError::EngineCreateFailed {
            stage: EngineStage::Playback
        })
    );
    let ledger = probe.snapshot();
    assert_eq!(ledger.calls.len(), 1);
    assert_eq!(ledger.spurious_destroys, 0);
}

#[test]
fn configure_failure_during_start_unwinds_both_engines() {
    let (mut session, probe, _) = session_with(
        StaticPermissionGateway::granted(),
        FailurePlan {
            reject_configure: true,
            ..FailurePlan::default()
        },
    );

    assert_eq!(
        session.request_start(),
        Err(EchoError::EngineCreateFailed {
            stage: EngineStage::Configure
        })
    );
    let ledger = probe.snapshot();
    assert!(!ledger.any_live());
    let tail: Vec<EngineCall> = ledger.calls.iter().rev().take(2).rev().copied().collect();
    assert_eq!(
        tail,
        vec![EngineCall::DestroyCapture, EngineCall::DestroyPlayback]
    );
}

#[test]
fn rejected_live_update_keeps_previous_parameters() {
    let (mut session, probe) = granted_session();
    session.request_start().unwrap();
    let before = session.parameters();

    probe.set_failures(FailurePlan {
        reject_configure: true,
        ..FailurePlan::default()
    });
    assert_eq!(
        session.update_parameters(50, 0.3),
        Err(EchoError::ConfigureRejected {
            delay_ms: 50,
            decay: 0.3
        })
    );
    assert_eq!(session.state(), SessionState::Echoing);
    assert_eq!(session.status(), SessionStatus::Echoing);
    assert_eq!(session.parameters(), before);
    assert!(probe.snapshot().both_live());
}

#[test]
fn out_of_range_parameters_keep_last_valid() {
    let (mut session, probe) = granted_session();
    let before = session.parameters();

    assert_eq!(session.update_parameters(5000, 0.5), Ok(SessionState::Idle));
    assert_eq!(session.set_decay(1.5), Ok(SessionState::Idle));
    assert_eq!(session.set_decay(f32::NAN), Ok(SessionState::Idle));
    assert_eq!(session.set_decay(-0.2), Ok(SessionState::Idle));
    assert_eq!(session.parameters(), before);

    session.request_start().unwrap();
    probe.clear_calls();
    session.set_delay(1001).unwrap();
    assert!(probe.snapshot().calls.is_empty());

    session.set_delay(1000).unwrap();
    assert_eq!(session.parameters().delay_ms, 1000);
}

#[test]
fn configured_max_delay_cannot_exceed_one_second() {
    let mut config = AppConfig::default();
    config.echo.max_delay_ms = 5000;
    let mut session = EchoSession::new(
        &config,
        host(),
        DesktopStubEngine::new(),
        StaticPermissionGateway::granted(),
    );
    let before = session.parameters();

    assert_eq!(session.update_parameters(3000, 0.5), Ok(SessionState::Idle));
    assert_eq!(session.parameters(), before);

    session.update_parameters(1000, 0.5).unwrap();
    assert_eq!(session.parameters().delay_ms, 1000);
}

#[test]
fn parameters_set_while_awaiting_apply_at_start() {
    let (mut session, probe, _) = prompting_session();
    session.request_start().unwrap();

    assert_eq!(
        session.update_parameters(250, 0.6),
        Ok(SessionState::AwaitingPermission)
    );
    assert!(probe.snapshot().calls.is_empty());

    session.on_permission_result(true).unwrap();
    let ledger = probe.snapshot();
    assert_eq!(
        ledger.applied,
        Some((250, 0.6)),
        "pending parameters should reach the new engine"
    );
}

#[test]
fn failed_session_requires_reset() {
    let (mut session, probe, _) = session_with(
        StaticPermissionGateway::granted(),
        FailurePlan {
            fail_playback: true,
            ..FailurePlan::default()
        },
    );
    let _ = session.request_start();
    assert_eq!(session.state(), SessionState::Failed);

    assert_eq!(session.request_start(), Err(EchoError::FailedNeedsReset));
    assert_eq!(
        session.update_parameters(10, 0.2),
        Err(EchoError::FailedNeedsReset)
    );
    assert_eq!(session.request_stop(), Ok(SessionState::Failed));
    assert_eq!(session.on_suspend(), Ok(SessionState::Failed));

    probe.set_failures(FailurePlan::default());
    assert_eq!(session.reset(), Ok(SessionState::Idle));
    assert_eq!(session.request_start(), Ok(SessionState::Echoing));
}

#[test]
fn gateway_errors_resolve_immediately() {
    let (mut session, _, _) = session_with(
        StaticPermissionGateway::new(PermissionPolicy::Unavailable(
            PermissionErrorKind::NotAttached,
        )),
        FailurePlan::default(),
    );
    assert_eq!(session.request_start(), Err(EchoError::PermissionDenied));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.status(), SessionStatus::PermissionDenied);
    assert!(session.pending_request().is_none());

    let (mut session, _, _) = session_with(
        StaticPermissionGateway::new(PermissionPolicy::Unavailable(PermissionErrorKind::Busy)),
        FailurePlan::default(),
    );
    assert_eq!(session.request_start(), Err(EchoError::Busy));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.status(), SessionStatus::Busy);
}

#[test]
fn unsupported_recording_refuses_to_start() {
    let engine = DesktopStubEngine::new();
    let probe = engine.probe();
    let mut session = EchoSession::new(
        &AppConfig::default(),
        HostAudioParams {
            supports_recording: false,
            ..host()
        },
        engine,
        StaticPermissionGateway::granted(),
    );

    assert_eq!(
        session.request_start(),
        Err(EchoError::RecordingUnsupported)
    );
    assert_eq!(session.state(), SessionState::Idle);
    assert!(probe.snapshot().calls.is_empty());
}

#[test]
fn stop_is_idempotent() {
    let (mut session, probe) = granted_session();
    assert_eq!(session.request_stop(), Ok(SessionState::Idle));
    assert!(probe.snapshot().calls.is_empty());

    session.request_start().unwrap();
    probe.clear_calls();
    assert_eq!(session.request_stop(), Ok(SessionState::Idle));
    assert_eq!(session.request_stop(), Ok(SessionState::Idle));
    assert_eq!(
        probe.snapshot().calls,
        vec![
            EngineCall::Stop,
            EngineCall::DestroyCapture,
            EngineCall::DestroyPlayback
        ]
    );
}

#[test]
fn echoing_start_is_noop() {
    let (mut session, probe) = granted_session();
    session.request_start().unwrap();
    probe.clear_calls();

    assert_eq!(session.request_start(), Ok(SessionState::Echoing));
    assert!(probe.snapshot().calls.is_empty());
}

#[test]
fn suspend_cancels_outstanding_request() {
    let (mut session, probe, requests) = prompting_session();
    session.request_start().unwrap();

    assert_eq!(session.on_suspend(), Ok(SessionState::Idle));
    assert!(session.pending_request().is_none());
    assert_eq!(session.on_permission_result(true), Ok(SessionState::Idle));
    assert_eq!(probe.snapshot().count(is_create), 0);

    // Resuming issues a fresh request with a new identity.
    session.request_start().unwrap();
    let log = requests.borrow();
    assert_eq!(log.len(), 2);
    assert_ne!(log[0], log[1]);
}

#[test]
fn late_result_for_cancelled_request_leaves_new_request_pending() {
    let (mut session, probe, requests) = prompting_session();
    session.request_start().unwrap();
    session.on_suspend().unwrap();
    session.request_start().unwrap();

    let (cancelled, current) = {
        let log = requests.borrow();
        (log[0], log[1])
    };

    assert_eq!(
        session.on_permission_outcome(cancelled, PermissionOutcome::Denied),
        Ok(SessionState::AwaitingPermission)
    );
    assert_eq!(
        session.on_permission_outcome(cancelled, PermissionOutcome::Granted),
        Ok(SessionState::AwaitingPermission)
    );
    assert_eq!(session.status(), SessionStatus::AwaitingPermission);
    assert_eq!(session.pending_request().map(|r| r.id), Some(current));
    assert_eq!(probe.snapshot().count(is_create), 0);

    assert_eq!(
        session.on_permission_outcome(current, PermissionOutcome::Granted),
        Ok(SessionState::Echoing)
    );
}

#[test]
fn destroyed_session_rejects_new_work() {
    let (mut session, probe) = granted_session();
    session.on_destroy().unwrap();

    assert_eq!(session.request_start(), Err(EchoError::SessionDestroyed));
    assert_eq!(
        session.update_parameters(10, 0.2),
        Err(EchoError::SessionDestroyed)
    );
    assert!(session.is_destroyed());
    assert!(probe.snapshot().calls.is_empty());
}

#[test]
fn zero_host_params_use_configured_fallbacks() {
    let session = EchoSession::new(
        &AppConfig::default(),
        HostAudioParams {
            sample_rate: 0,
            frames_per_buffer: 0,
            supports_recording: true,
        },
        DesktopStubEngine::new(),
        StaticPermissionGateway::granted(),
    );
    assert_eq!(session.host_params().sample_rate, 48000);
    assert_eq!(session.host_params().frames_per_buffer, 192);
}

#[test]
fn status_changes_are_published() {
    let (mut session, _) = granted_session();
    let mut events = session.event_receiver();

    session.request_start().unwrap();
    session.request_stop().unwrap();

    let statuses: Vec<SessionStatus> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|event| event.status)
        .collect();
    assert_eq!(
        statuses,
        vec![
            SessionStatus::Ready,
            SessionStatus::Echoing,
            SessionStatus::Idle
        ]
    );
}

#[test]
fn failure_event_carries_error_code() {
    let (mut session, _, _) = session_with(
        StaticPermissionGateway::granted(),
        FailurePlan {
            fail_capture: true,
            ..FailurePlan::default()
        },
    );
    let mut events = session.event_receiver();
    let _ = session.request_start();

    let last = std::iter::from_fn(|| events.try_recv().ok()).last().unwrap();
    assert_eq!(last.state, SessionState::Failed);
    assert_eq!(last.error_code, Some(3003));
    assert_eq!(last.detail.as_deref(), Some("Failed to create Audio Recorder"));
}

#[test]
fn event_timestamps_follow_session_uptime() {
    let time_source = Arc::new(StubTimeSource::new());
    let mut session = EchoSession::with_time_source(
        &AppConfig::default(),
        host(),
        DesktopStubEngine::new(),
        StaticPermissionGateway::granted(),
        time_source,
    );
    let mut events = session.event_receiver();

    // Creation consumed the first 10 ms tick.
    assert_eq!(session.uptime_ms(), 10);
    session.request_start().unwrap();

    let stamps: Vec<u64> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|event| event.timestamp_ms)
        .collect();
    assert_eq!(stamps, vec![20, 30]);
    assert_eq!(session.uptime_ms(), 40);
}

#[test]
fn random_sequences_keep_state_and_engines_in_sync() {
    let mut rng = StdRng::seed_from_u64(0xEC40);

    for _ in 0..20 {
        let (mut session, probe, _) = prompting_session();

        for _ in 0..200 {
            match rng.gen_range(0..9) {
                0 | 1 => {
                    let _ = session.request_start();
                }
                2 => {
                    let _ = session.request_stop();
                }
                3 => {
                    let _ = session.on_permission_result(rng.gen_bool(0.7));
                }
                4 => {
                    let _ = session.update_parameters(rng.gen_range(0..1200), rng.gen_range(-0.2..1.2));
                }
                5 => {
                    let _ = session.on_suspend();
                }
                6 => {
                    let _ = session.reset();
                }
                7 => probe.set_failures(FailurePlan {
                    fail_playback: rng.gen_bool(0.1),
                    fail_capture: rng.gen_bool(0.1),
                    reject_configure: rng.gen_bool(0.1),
                }),
                _ => {
                    let _ = session.on_permission_outcome(
                        RequestId(rng.gen_range(0..4)),
                        PermissionOutcome::Granted,
                    );
                }
            }

            let ledger = probe.snapshot();
            let echoing = session.state() == SessionState::Echoing;
            assert_eq!(echoing, ledger.both_live(), "state {:?}", session.state());
            assert_eq!(echoing, ledger.running);
            if !echoing {
                assert!(!ledger.any_live());
            }
            assert!(session
                .parameters()
                .is_valid(AppConfig::default().echo.max_delay_ms));
            assert_eq!(ledger.spurious_destroys, 0);
        }

        session.on_destroy().unwrap();
        assert!(!probe.snapshot().any_live());
    }
}
