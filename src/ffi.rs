//! FFI bindings for Synheart Engage
//!
//! This module provides C-compatible functions for driving the engagement
//! trackers from a host page runtime (WebView bridge, native shell, WASM glue).
//! The host owns the clock: it passes timestamped page events in and drains
//! analytics envelopes out. All functions use C strings (null-terminated) and
//! return allocated memory that must be freed with `engage_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::Arc;

use crate::config::EngageConfig;
use crate::encoder::EnvelopeEncoder;
use crate::error::EngageError;
use crate::pipeline::{encoder_for, replay_ndjson, EngagementProcessor};
use crate::reporter::MemoryReporter;
use crate::schema::PageEvent;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Join already-serialized JSON values into a JSON array
fn vec_to_json_array(vec: Vec<String>) -> String {
    format!("[{}]", vec.join(","))
}

/// Config from an optional C string; NULL means defaults
unsafe fn config_from_ptr(config_json: *const c_char) -> Result<EngageConfig, EngageError> {
    if config_json.is_null() {
        return Ok(EngageConfig::default());
    }
    match cstr_to_string(config_json) {
        Some(json) => EngageConfig::from_json(&json),
        None => Err(EngageError::ConfigError("config is not valid UTF-8".to_string())),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Replay an NDJSON page-event trace and return a JSON array of envelopes.
///
/// # Safety
/// - `trace` must be a valid null-terminated C string.
/// - `config_json` must be a valid null-terminated C string or NULL.
/// - Returns a newly allocated string that must be freed with `engage_free_string`.
/// - Returns NULL on error; call `engage_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engage_replay_ndjson(trace: *const c_char, config_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let trace_str = match cstr_to_string(trace) {
        Some(s) => s,
        None => {
            set_last_error("Invalid trace string pointer");
            return ptr::null_mut();
        }
    };

    let config = match config_from_ptr(config_json) {
        Ok(config) => config,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match replay_ndjson(&trace_str, config) {
        Ok(envelopes) => string_to_cstr(&vec_to_json_array(envelopes)),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to an EngagementProcessor
pub struct EngageProcessorHandle {
    processor: EngagementProcessor,
    reporter: Arc<MemoryReporter>,
    encoder: EnvelopeEncoder,
}

/// Create a new processor.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string or NULL for defaults.
/// - Returns a pointer to a newly allocated processor.
/// - Must be freed with `engage_processor_free`.
/// - Returns NULL on error; call `engage_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engage_processor_new(config_json: *const c_char) -> *mut EngageProcessorHandle {
    clear_last_error();

    let config = match config_from_ptr(config_json) {
        Ok(config) => config,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let reporter = Arc::new(MemoryReporter::new());
    let encoder = encoder_for(&config);
    match EngagementProcessor::with_config(config, reporter.clone()) {
        Ok(processor) => Box::into_raw(Box::new(EngageProcessorHandle {
            processor,
            reporter,
            encoder,
        })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `engage_processor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn engage_processor_free(processor: *mut EngageProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Feed one page event (a single engage.page_event.v1 JSON object).
///
/// # Safety
/// - `processor` must be a valid pointer returned by `engage_processor_new`.
/// - `event_json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error; call `engage_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn engage_processor_handle_event(
    processor: *mut EngageProcessorHandle,
    event_json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(event_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid event string pointer");
            return -1;
        }
    };

    let event: PageEvent = match serde_json::from_str(&json_str) {
        Ok(event) => event,
        Err(e) => {
            set_last_error(&EngageError::ParseError(e.to_string()).to_string());
            return -1;
        }
    };

    match handle.processor.handle(&event) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Advance the host clock, evaluating samples whose quiet period has ended.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `engage_processor_new`.
/// - Returns the number of evaluations performed, or -1 on error.
#[no_mangle]
pub unsafe extern "C" fn engage_processor_advance(processor: *mut EngageProcessorHandle, now_ms: u64) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;
    i32::try_from(handle.processor.advance(now_ms)).unwrap_or(i32::MAX)
}

/// Evaluate every pending sample now (page hidden or unloading).
///
/// # Safety
/// - `processor` must be a valid pointer returned by `engage_processor_new`.
/// - Returns the number of evaluations performed, or -1 on error.
#[no_mangle]
pub unsafe extern "C" fn engage_processor_finish(processor: *mut EngageProcessorHandle) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;
    i32::try_from(handle.processor.finish()).unwrap_or(i32::MAX)
}

/// Take every analytics envelope produced so far, as a JSON array.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `engage_processor_new`.
/// - Returns a newly allocated string that must be freed with `engage_free_string`.
/// - Returns NULL on error; call `engage_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engage_processor_drain_events(processor: *mut EngageProcessorHandle) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    let encoded: Result<Vec<String>, EngageError> = handle
        .reporter
        .drain()
        .iter()
        .map(|event| handle.encoder.encode_to_json(event))
        .collect();

    match encoded {
        Ok(envelopes) => string_to_cstr(&vec_to_json_array(envelopes)),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Engage functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an Engage function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn engage_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Engage function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn engage_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Engage library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn engage_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cstring(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    unsafe fn take_json(ptr: *mut c_char) -> serde_json::Value {
        assert!(!ptr.is_null());
        let value = serde_json::from_str(CStr::from_ptr(ptr).to_str().unwrap()).unwrap();
        engage_free_string(ptr);
        value
    }

    #[test]
    fn test_ffi_replay_ndjson() {
        let trace = cstring(
            "{\"at_ms\": 0, \"type\": \"navigate\", \"location\": \"/\"}\n\
             {\"at_ms\": 10, \"type\": \"scroll\", \"scroll_top\": 0.0, \"viewport_height\": 500.0, \"height_signals\": [1000.0]}\n",
        );

        unsafe {
            let result = take_json(engage_replay_ndjson(trace.as_ptr(), ptr::null()));
            let envelopes = result.as_array().unwrap();
            assert_eq!(envelopes.len(), 2);
            assert_eq!(envelopes[1]["event"]["percentage"], 50);
        }
    }

    #[test]
    fn test_ffi_processor_lifecycle() {
        unsafe {
            let config = cstring(r#"{"quiet_period_ms": 50, "instance_id": "webview-1"}"#);
            let processor = engage_processor_new(config.as_ptr());
            assert!(!processor.is_null());

            let scroll = cstring(
                r#"{"at_ms": 0, "type": "scroll", "scroll_top": 3000.0, "viewport_height": 1000.0, "height_signals": [4000.0]}"#,
            );
            assert_eq!(engage_processor_handle_event(processor, scroll.as_ptr()), 0);
            assert_eq!(engage_processor_advance(processor, 49), 0);
            assert_eq!(engage_processor_advance(processor, 50), 1);

            let drained = take_json(engage_processor_drain_events(processor));
            let envelopes = drained.as_array().unwrap();
            assert_eq!(envelopes.len(), 4);
            assert_eq!(envelopes[0]["producer"]["instance_id"], "webview-1");

            // Drained events are gone
            let empty = take_json(engage_processor_drain_events(processor));
            assert_eq!(empty, serde_json::json!([]));

            assert_eq!(engage_processor_finish(processor), 0);
            engage_processor_free(processor);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let processor = engage_processor_new(ptr::null());
            assert!(!processor.is_null());

            let invalid = cstring("not json");
            assert_eq!(engage_processor_handle_event(processor, invalid.as_ptr()), -1);

            let error = engage_last_error();
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());

            assert_eq!(engage_processor_handle_event(ptr::null_mut(), invalid.as_ptr()), -1);
            engage_processor_free(processor);

            let bad_config = cstring(r#"{"quiet_period_ms": 99999}"#);
            assert!(engage_processor_new(bad_config.as_ptr()).is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = engage_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, env!("CARGO_PKG_VERSION"));
        }
    }
}
