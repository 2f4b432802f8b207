//! C-compatible API for serving stacks outside Rust.
//!
//! A handle returned by `driftguard_open` owns one monitor; the host passes it
//! to every call and releases it with `driftguard_close`. Strings returned by
//! this module are JSON and must be released with `driftguard_free_str`.

use std::collections::BTreeMap;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use serde::Serialize;
use tracing::warn;

use crate::common::config::MonitorCfg;
use crate::common::error::DriftCode;
use crate::common::log;

use super::handle::MonitorHandle;

/// ABI version to coordinate with the host.
#[no_mangle]
pub extern "C" fn driftguard_api_version() -> u32 {
    1
}

/// Open a monitor from a JSON config object (null or `{}` for defaults).
///
/// Always returns a handle; if the config or reference is unusable the handle
/// reports `not_configured`.
#[no_mangle]
pub extern "C" fn driftguard_open(cfg_json: *const c_char) -> *mut MonitorHandle {
    let handle = MonitorHandle::pending();
    let cfg = match read_str(cfg_json) {
        None => Ok(MonitorCfg::default()),
        Some(raw) => MonitorCfg::from_json(&raw),
    };
    match cfg {
        Ok(cfg) => {
            log::init(&cfg.log_filter);
            handle.initialize(&cfg);
        }
        Err(err) => {
            handle.disable(err.to_string());
        }
    }
    Box::into_raw(Box::new(handle))
}

/// Release a handle from `driftguard_open`.
#[no_mangle]
pub extern "C" fn driftguard_close(handle: *mut MonitorHandle) {
    if handle.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(handle));
    }
}

/// Record a sample given as a JSON object of feature name to number.
///
/// Returns a [`DriftCode`]: `Ok` on success.
#[no_mangle]
pub extern "C" fn driftguard_add_sample(
    handle: *const MonitorHandle,
    values_json: *const c_char,
) -> u32 {
    let Some(handle) = (unsafe { handle.as_ref() }) else {
        return DriftCode::NotConfigured as u32;
    };
    let values = match read_str(values_json)
        .as_deref()
        .map(serde_json::from_str::<BTreeMap<String, f64>>)
    {
        Some(Ok(values)) => values,
        Some(Err(err)) => {
            warn!(%err, "sample json rejected");
            return DriftCode::InvalidInput as u32;
        }
        None => return DriftCode::InvalidInput as u32,
    };

    match handle.monitor() {
        Ok(monitor) => match monitor.record(values) {
            Ok(_) => DriftCode::Ok as u32,
            Err(err) => err.code() as u32,
        },
        Err(err) => err.code() as u32,
    }
}

/// Run an evaluation pass; returns the result as JSON.
#[no_mangle]
pub extern "C" fn driftguard_evaluate(handle: *const MonitorHandle) -> *const c_char {
    with_handle(handle, |h| to_json_raw(&h.evaluate()))
}

/// Current summary as JSON.
#[no_mangle]
pub extern "C" fn driftguard_summary(handle: *const MonitorHandle) -> *const c_char {
    with_handle(handle, |h| to_json_raw(&h.summary()))
}

/// Reference mean/std per feature as JSON.
#[no_mangle]
pub extern "C" fn driftguard_reference_features(handle: *const MonitorHandle) -> *const c_char {
    with_handle(handle, |h| to_json_raw(&h.reference_features()))
}

/// Free strings allocated by Rust.
#[no_mangle]
pub extern "C" fn driftguard_free_str(ptr: *const c_char) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        let _ = CString::from_raw(ptr as *mut c_char);
    }
}

fn read_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

fn with_handle(
    handle: *const MonitorHandle,
    f: impl FnOnce(&MonitorHandle) -> *const c_char,
) -> *const c_char {
    match unsafe { handle.as_ref() } {
        Some(handle) => f(handle),
        None => f(&MonitorHandle::pending()),
    }
}

fn to_json_raw<T: Serialize>(value: &T) -> *const c_char {
    serde_json::to_string(value)
        .ok()
        .and_then(|s| CString::new(s).ok())
        .map(CString::into_raw)
        .map(|p| p as *const c_char)
        .unwrap_or_else(fallback_json_raw)
}

fn fallback_json_raw() -> *const c_char {
    // Static literal without interior NULs.
    CString::new("{\"status\":\"error\"}")
        .map(CString::into_raw)
        .map(|p| p as *const c_char)
        .unwrap_or(std::ptr::null())
}
