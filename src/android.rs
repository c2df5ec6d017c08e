//! JNI surface for `com.google.sample.echo.MainActivity`.
//!
//! The activity owns one session through an opaque `jlong` handle returned
//! by `createSession` and released by `destroySession`. Every call arrives
//! on the activity's main thread, which is the session owner thread.

use std::ffi::c_void;
use std::sync::Once;

use jni::objects::{GlobalRef, JClass, JObject, JValue};
use jni::sys::{jboolean, jfloat, jint, jlong, JNI_FALSE, JNI_VERSION_1_6};
use jni::{JNIEnv, JavaVM};
use log::info;
use tracing_subscriber::filter::LevelFilter;

use crate::config::AppConfig;
use crate::engine::{EchoSession, EngineBackend, HostAudioParams, SessionStatus};
use crate::logging::init_logging;
use crate::permission::{
    Permission, PermissionErrorKind, PermissionGateway, PermissionOutcome, RequestId,
};

/// `PackageManager.PERMISSION_GRANTED`
const PERMISSION_GRANTED: i32 = 0;

static CONTEXT_INIT: Once = Once::new();

/// JNI_OnLoad is called when the native library is loaded by Android
#[no_mangle]
pub extern "system" fn JNI_OnLoad(_vm: JavaVM, _reserved: *mut c_void) -> jint {
    init_logging(LevelFilter::DEBUG);
    info!("JNI_OnLoad called");
    JNI_VERSION_1_6
}

/// Hand oboe-rs the application context. Done once per process; the
/// application context outlives every activity.
fn bind_android_context(env: &mut JNIEnv, activity: &JObject) {
    CONTEXT_INIT.call_once(|| {
        let bound = (|| -> jni::errors::Result<()> {
            let vm = env.get_java_vm()?;
            let app_context = env
                .call_method(
                    activity,
                    "getApplicationContext",
                    "()Landroid/content/Context;",
                    &[],
                )?
                .l()?;
            let global = env.new_global_ref(app_context)?;
            // SAFETY: the VM pointer is valid for the process lifetime and the
            // global reference is leaked below, so the context stays valid.
            unsafe {
                ndk_context::initialize_android_context(
                    vm.get_java_vm_pointer() as *mut c_void,
                    global.as_obj().as_raw() as *mut c_void,
                );
            }
            std::mem::forget(global);
            Ok(())
        })();

        match bound {
            Ok(()) => info!("Android context initialized successfully"),
            Err(err) => log::error!("Failed to initialize Android context: {}", err),
        }
    });
}

/// Permission gateway backed by the activity's runtime permission API.
///
/// The answer comes back through `MainActivity.onRequestPermissionsResult`,
/// which forwards it to `onPermissionResult`.
struct JniPermissionGateway {
    vm: JavaVM,
    activity: GlobalRef,
}

impl JniPermissionGateway {
    fn new(env: &mut JNIEnv, activity: &JObject) -> jni::errors::Result<Self> {
        Ok(Self {
            vm: env.get_java_vm()?,
            activity: env.new_global_ref(activity)?,
        })
    }

    fn check(&self, permission: Permission) -> jni::errors::Result<bool> {
        let mut env = self.vm.attach_current_thread()?;
        let name = env.new_string(permission.id())?;
        let result = env
            .call_method(
                self.activity.as_obj(),
                "checkSelfPermission",
                "(Ljava/lang/String;)I",
                &[JValue::Object(&name)],
            )?
            .i()?;
        Ok(result == PERMISSION_GRANTED)
    }

    fn ask(&self, permission: Permission, id: RequestId) -> jni::errors::Result<()> {
        let mut env = self.vm.attach_current_thread()?;
        let name = env.new_string(permission.id())?;
        let permissions = env.new_object_array(1, "java/lang/String", &name)?;
        env.call_method(
            self.activity.as_obj(),
            "requestPermissions",
            "([Ljava/lang/String;I)V",
            &[JValue::Object(&permissions), JValue::Int(id.0 as i32)],
        )?;
        Ok(())
    }
}

impl PermissionGateway for JniPermissionGateway {
    fn is_granted(&self, permission: Permission) -> bool {
        self.check(permission).unwrap_or_else(|err| {
            log::error!("checkSelfPermission failed: {}", err);
            false
        })
    }

    fn request(&mut self, permission: Permission, id: RequestId) -> Result<(), PermissionOutcome> {
        self.ask(permission, id).map_err(|err| {
            log::error!("requestPermissions failed: {}", err);
            PermissionOutcome::Error(PermissionErrorKind::NotAttached)
        })
    }
}

/// Run `f` on the session behind `handle`, or return `default` for a null handle.
fn with_session<R>(handle: jlong, default: R, f: impl FnOnce(&mut EchoSession) -> R) -> R {
    if handle == 0 {
        log::warn!("Echo call on a null session handle");
        return default;
    }
    // SAFETY: non-zero handles come from `createSession` and stay valid until
    // `destroySession`; the activity calls both on its main thread only.
    let session = unsafe { &mut *(handle as *mut EchoSession) };
    f(session)
}

fn status_after(session: &mut EchoSession, op: impl FnOnce(&mut EchoSession)) -> jint {
    op(session);
    session.status().as_i32()
}

#[no_mangle]
pub extern "system" fn Java_com_google_sample_echo_MainActivity_createSession(
    mut env: JNIEnv,
    _class: JClass,
    sample_rate: jint,
    frames_per_buf: jint,
    supports_recording: jboolean,
    activity: JObject,
) -> jlong {
    bind_android_context(&mut env, &activity);

    let gateway = match JniPermissionGateway::new(&mut env, &activity) {
        Ok(gateway) => gateway,
        Err(err) => {
            log::error!("Failed to create permission gateway: {}", err);
            return 0;
        }
    };

    let config = AppConfig::load_android();
    let host = HostAudioParams {
        sample_rate: sample_rate.max(0) as u32,
        frames_per_buffer: frames_per_buf.max(0) as u32,
        supports_recording: supports_recording != JNI_FALSE,
    };
    let engine = EngineBackend::platform_default(&config.audio);
    let session = EchoSession::new(&config, host, engine, gateway);

    Box::into_raw(Box::new(session)) as jlong
}

#[no_mangle]
pub extern "system" fn Java_com_google_sample_echo_MainActivity_startEcho(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jint {
    with_session(handle, SessionStatus::Failed.as_i32(), |session| {
        status_after(session, |s| {
            let _ = s.request_start();
        })
    })
}

#[no_mangle]
pub extern "system" fn Java_com_google_sample_echo_MainActivity_stopEcho(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jint {
    with_session(handle, SessionStatus::Idle.as_i32(), |session| {
        status_after(session, |s| {
            let _ = s.request_stop();
        })
    })
}

#[no_mangle]
pub extern "system" fn Java_com_google_sample_echo_MainActivity_setDelay(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
    delay_ms: jint,
) -> jint {
    with_session(handle, SessionStatus::Failed.as_i32(), |session| {
        status_after(session, |s| {
            // Negative values are out of range like any other.
            let delay_ms = u32::try_from(delay_ms).unwrap_or(u32::MAX);
            let _ = s.set_delay(delay_ms);
        })
    })
}

#[no_mangle]
pub extern "system" fn Java_com_google_sample_echo_MainActivity_setDecay(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
    decay: jfloat,
) -> jint {
    with_session(handle, SessionStatus::Failed.as_i32(), |session| {
        status_after(session, |s| {
            let _ = s.set_decay(decay);
        })
    })
}

/// Forwarded from `onRequestPermissionsResult`. `request_code` is the code
/// passed to `requestPermissions`, so answers to cancelled requests are dropped.
#[no_mangle]
pub extern "system" fn Java_com_google_sample_echo_MainActivity_onPermissionResult(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
    request_code: jint,
    granted: jboolean,
) -> jint {
    with_session(handle, SessionStatus::Idle.as_i32(), |session| {
        status_after(session, |s| {
            let id = RequestId(u64::from(request_code as u32));
            let _ = s.on_permission_outcome(id, PermissionOutcome::from(granted != JNI_FALSE));
        })
    })
}

#[no_mangle]
pub extern "system" fn Java_com_google_sample_echo_MainActivity_onSuspend(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jint {
    with_session(handle, SessionStatus::Idle.as_i32(), |session| {
        status_after(session, |s| {
            let _ = s.on_suspend();
        })
    })
}

#[no_mangle]
pub extern "system" fn Java_com_google_sample_echo_MainActivity_destroySession(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    if handle == 0 {
        return;
    }
    // SAFETY: the handle was produced by `Box::into_raw` in `createSession`
    // and the activity never uses it after this call.
    let mut session = unsafe { Box::from_raw(handle as *mut EchoSession) };
    let _ = session.on_destroy();
}
