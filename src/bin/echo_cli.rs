use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use audio_echo::engine::{FailurePlan, StubProbe};
use audio_echo::permission::{PermissionErrorKind, PermissionPolicy};
use audio_echo::{
    AppConfig, DesktopStubEngine, EchoError, EchoSession, ErrorCode, HostAudioParams,
    SessionState, SessionStatus, StaticPermissionGateway,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "echo_cli", about = "Desktop harness for the audio echo session")]
struct Cli {
    /// Configuration file (defaults to assets/echo_config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log session transitions to stderr
    #[arg(long, short)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print host parameters and default echo settings as JSON
    Params {
        #[arg(long, default_value_t = 0)]
        sample_rate: u32,
        #[arg(long, default_value_t = 0)]
        frames_per_buffer: u32,
    },
    /// Drive a session over the stub engine and print one JSON line per action
    Simulate {
        /// Comma separated: start, stop, grant, deny, suspend, destroy, reset,
        /// delay=MS, decay=F, fail-playback, fail-capture, reject-configure, heal
        #[arg(long, value_delimiter = ',', required = true)]
        actions: Vec<Action>,
        #[arg(long, value_enum, default_value_t = PermissionMode::Granted)]
        permission: PermissionMode,
        /// Report the host as unable to record
        #[arg(long)]
        no_recording: bool,
    },
    /// Open the default devices and echo for a while
    Run {
        #[arg(long, default_value_t = 5)]
        seconds: u64,
        #[arg(long)]
        delay: Option<u32>,
        #[arg(long)]
        decay: Option<f32>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PermissionMode {
    Granted,
    Prompt,
    NotAttached,
    Busy,
}

impl From<PermissionMode> for PermissionPolicy {
    fn from(mode: PermissionMode) -> Self {
        match mode {
            PermissionMode::Granted => PermissionPolicy::AlreadyGranted,
            PermissionMode::Prompt => PermissionPolicy::Prompt,
            PermissionMode::NotAttached => {
                PermissionPolicy::Unavailable(PermissionErrorKind::NotAttached)
            }
            PermissionMode::Busy => PermissionPolicy::Unavailable(PermissionErrorKind::Busy),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Action {
    Start,
    Stop,
    Grant,
    Deny,
    Suspend,
    Destroy,
    Reset,
    Delay(u32),
    Decay(f32),
    Fail(FailurePlan),
    Heal,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(value) = s.strip_prefix("delay=") {
            return value
                .parse()
                .map(Action::Delay)
                .map_err(|e| format!("invalid delay '{}': {}", value, e));
        }
        if let Some(value) = s.strip_prefix("decay=") {
            return value
                .parse()
                .map(Action::Decay)
                .map_err(|e| format!("invalid decay '{}': {}", value, e));
        }
        let plan = FailurePlan::default();
        match s {
            "start" => Ok(Action::Start),
            "stop" => Ok(Action::Stop),
            "grant" => Ok(Action::Grant),
            "deny" => Ok(Action::Deny),
            "suspend" => Ok(Action::Suspend),
            "destroy" => Ok(Action::Destroy),
            "reset" => Ok(Action::Reset),
            "fail-playback" => Ok(Action::Fail(FailurePlan {
                fail_playback: true,
                ..plan
            })),
            "fail-capture" => Ok(Action::Fail(FailurePlan {
                fail_capture: true,
                ..plan
            })),
            "reject-configure" => Ok(Action::Fail(FailurePlan {
                reject_configure: true,
                ..plan
            })),
            "heal" => Ok(Action::Heal),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}

#[derive(Serialize)]
struct StepReport {
    step: usize,
    action: String,
    ok: bool,
    state: SessionState,
    status: SessionStatus,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    delay_ms: u32,
    decay: f32,
    engines_live: bool,
}

#[derive(Serialize)]
struct ParamsReport {
    host: HostAudioParams,
    max_delay_ms: u32,
    default_delay_ms: u32,
    default_decay: f32,
    buffer_count: usize,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    audio_echo::logging::init_logging(level);

    let config = match cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => default_config(),
    };

    match cli.command {
        Commands::Params {
            sample_rate,
            frames_per_buffer,
        } => run_params(&config, sample_rate, frames_per_buffer),
        Commands::Simulate {
            actions,
            permission,
            no_recording,
        } => run_simulate(&config, &actions, permission, no_recording),
        Commands::Run {
            seconds,
            delay,
            decay,
        } => run_live(&config, seconds, delay, decay),
    }
}

#[cfg(not(target_os = "android"))]
fn default_config() -> AppConfig {
    AppConfig::load()
}

#[cfg(target_os = "android")]
fn default_config() -> AppConfig {
    AppConfig::load_android()
}

fn host_params(config: &AppConfig, sample_rate: u32, frames_per_buffer: u32) -> HostAudioParams {
    HostAudioParams {
        sample_rate,
        frames_per_buffer,
        ..config.audio.fallback_host_params()
    }
}

fn run_params(config: &AppConfig, sample_rate: u32, frames_per_buffer: u32) -> Result<ExitCode> {
    let session = EchoSession::new(
        config,
        host_params(config, sample_rate, frames_per_buffer),
        DesktopStubEngine::new(),
        StaticPermissionGateway::granted(),
    );
    let defaults = session.parameters();
    let report = ParamsReport {
        host: session.host_params(),
        max_delay_ms: config.echo.delay_limit_ms(),
        default_delay_ms: defaults.delay_ms,
        default_decay: defaults.decay,
        buffer_count: config.audio.buffer_count,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}

fn run_simulate(
    config: &AppConfig,
    actions: &[Action],
    permission: PermissionMode,
    no_recording: bool,
) -> Result<ExitCode> {
    let engine = DesktopStubEngine::new();
    let probe = engine.probe();
    let host = HostAudioParams {
        supports_recording: !no_recording,
        ..config.audio.fallback_host_params()
    };
    let gateway = StaticPermissionGateway::new(permission.into());
    let mut session = EchoSession::new(config, host, engine, gateway);

    for (step, action) in actions.iter().enumerate() {
        let result = apply(&mut session, &probe, action);
        let report = report_step(step, action, &result, &session, &probe);
        println!(
            "{}",
            serde_json::to_string(&report)
                .with_context(|| format!("serializing step {}", step))?
        );
    }

    Ok(ExitCode::from(0))
}

fn apply(
    session: &mut EchoSession,
    probe: &StubProbe,
    action: &Action,
) -> Result<SessionState, EchoError> {
    match action {
        Action::Start => session.request_start(),
        Action::Stop => session.request_stop(),
        Action::Grant => session.on_permission_result(true),
        Action::Deny => session.on_permission_result(false),
        Action::Suspend => session.on_suspend(),
        Action::Destroy => session.on_destroy(),
        Action::Reset => session.reset(),
        Action::Delay(delay_ms) => session.set_delay(*delay_ms),
        Action::Decay(decay) => session.set_decay(*decay),
        Action::Fail(plan) => {
            probe.set_failures(*plan);
            Ok(session.state())
        }
        Action::Heal => {
            probe.set_failures(FailurePlan::default());
            Ok(session.state())
        }
    }
}

fn report_step(
    step: usize,
    action: &Action,
    result: &Result<SessionState, EchoError>,
    session: &EchoSession,
    probe: &StubProbe,
) -> StepReport {
    let params = session.parameters();
    let err = result.as_ref().err();
    StepReport {
        step,
        action: format!("{:?}", action),
        ok: result.is_ok(),
        state: session.state(),
        status: session.status(),
        message: session.status().message(),
        error_code: err.map(|e| e.code()),
        error: err.map(|e| e.message()),
        delay_ms: params.delay_ms,
        decay: params.decay,
        engines_live: probe.snapshot().any_live(),
    }
}

#[cfg(not(target_os = "android"))]
fn run_live(
    config: &AppConfig,
    seconds: u64,
    delay: Option<u32>,
    decay: Option<f32>,
) -> Result<ExitCode> {
    use audio_echo::EngineBackend;

    let engine = EngineBackend::platform_default(&config.audio);
    println!("Using {} backend", engine.name());
    let mut session = EchoSession::new(
        config,
        config.audio.fallback_host_params(),
        engine,
        StaticPermissionGateway::granted(),
    );
    let mut events = session.event_receiver();

    let defaults = session.parameters();
    session
        .update_parameters(
            delay.unwrap_or(defaults.delay_ms),
            decay.unwrap_or(defaults.decay),
        )
        .context("applying echo parameters")?;
    if session.parameters() != defaults {
        println!("Echo parameters: {:?}", session.parameters());
    }

    if let Err(err) = session.request_start() {
        bail!("echo failed to start: {}", err);
    }
    println!(
        "{} (delay {} ms, decay {:.2}) for {}s",
        session.status().message(),
        session.parameters().delay_ms,
        session.parameters().decay,
        seconds
    );

    std::thread::sleep(std::time::Duration::from_secs(seconds));
    session.request_stop().context("stopping echo")?;
    session.on_destroy().context("destroying session")?;
    drop(session);

    while let Ok(event) = events.try_recv() {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(ExitCode::from(0))
}

#[cfg(target_os = "android")]
fn run_live(
    _config: &AppConfig,
    _seconds: u64,
    _delay: Option<u32>,
    _decay: Option<f32>,
) -> Result<ExitCode> {
    bail!("live echo is driven by the Android activity")
}
