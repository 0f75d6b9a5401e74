//! FFI bindings for Synheart Insight
//!
//! This module provides C-compatible functions for calling Insight from other languages.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `insight_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::error::ComputeError;
use crate::pipeline::{analyze_json, correlate_json, relapse_risk_json, InsightEngine};

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

/// Read the input pointer, run `f`, and hand the JSON result back across the boundary
unsafe fn call_json<F>(json: *const c_char, f: F) -> *mut c_char
where
    F: FnOnce(String) -> Result<String, ComputeError>,
{
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match f(json_str) {
        Ok(result) => string_to_cstr(&result),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API (built-in catalog)
// ============================================================================

/// Analyze an input document and return the JSON insight report.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `insight_free_string`.
/// - Returns NULL on error; call `insight_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn insight_analyze(json: *const c_char) -> *mut c_char {
    call_json(json, analyze_json)
}

/// Build the correlation matrix for an input document.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `insight_free_string`.
/// - Returns NULL on error; call `insight_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn insight_correlate(json: *const c_char) -> *mut c_char {
    call_json(json, correlate_json)
}

/// Score relapse risk for an input document.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `insight_free_string`.
/// - Returns NULL on error; call `insight_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn insight_relapse_risk(json: *const c_char) -> *mut c_char {
    call_json(json, relapse_risk_json)
}

// ============================================================================
// Engine API (custom catalog)
// ============================================================================

/// Opaque handle to an InsightEngine
pub struct InsightEngineHandle {
    engine: InsightEngine,
}

/// Create an engine with the built-in biomarker catalog.
///
/// # Safety
/// - Returns a pointer to a newly allocated engine.
/// - Must be freed with `insight_engine_free`.
#[no_mangle]
pub unsafe extern "C" fn insight_engine_new() -> *mut InsightEngineHandle {
    clear_last_error();
    Box::into_raw(Box::new(InsightEngineHandle {
        engine: InsightEngine::new(),
    }))
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `insight_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn insight_engine_free(engine: *mut InsightEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Replace the engine's catalog from JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `insight_engine_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `insight_last_error` to get the error message. The
///   previous catalog stays in place.
#[no_mangle]
pub unsafe extern "C" fn insight_engine_load_catalog(
    engine: *mut InsightEngineHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    let handle = &mut *engine;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match handle.engine.load_catalog(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Analyze an input document with the engine's catalog.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `insight_engine_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `insight_free_string`.
/// - Returns NULL on error; call `insight_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn insight_engine_analyze(
    engine: *const InsightEngineHandle,
    json: *const c_char,
) -> *mut c_char {
    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &*engine;
    call_json(json, |input| handle.engine.analyze_json(&input))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Insight functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an Insight function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn insight_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Insight function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn insight_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the Insight library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn insight_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn sample_input_json() -> CString {
        CString::new(
            r#"{
            "biomarkers": [
                {"biomarkerType": "crp", "value": 4.0, "timestamp": "2024-03-01T08:00:00Z"},
                {"biomarkerType": "il6", "value": 9.0, "timestamp": "2024-03-01T08:00:00Z"},
                {"biomarkerType": "crp", "value": 4.5, "timestamp": "2024-03-02T08:00:00Z"},
                {"biomarkerType": "il6", "value": 9.5, "timestamp": "2024-03-02T08:00:00Z"},
                {"biomarkerType": "crp", "value": 5.0, "timestamp": "2024-03-03T08:00:00Z"},
                {"biomarkerType": "il6", "value": 10.0, "timestamp": "2024-03-03T08:00:00Z"}
            ],
            "moods": [
                {"moodScore": 5.0, "timestamp": "2024-03-01T20:00:00Z"},
                {"moodScore": 4.0, "timestamp": "2024-03-02T20:00:00Z"},
                {"moodScore": 3.0, "timestamp": "2024-03-03T20:00:00Z"}
            ]
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_ffi_analyze() {
        let json = sample_input_json();

        unsafe {
            let result = insight_analyze(json.as_ptr());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            assert!(result_str.contains("\"relapseRisk\""));
            assert!(result_str.contains("Inflammatory Pattern Detected"));

            insight_free_string(result);
        }
    }

    #[test]
    fn test_ffi_correlate_and_risk() {
        let json = sample_input_json();

        unsafe {
            let matrix = insight_correlate(json.as_ptr());
            assert!(!matrix.is_null());
            let matrix_str = CStr::from_ptr(matrix).to_str().unwrap();
            assert!(matrix_str.contains("\"labels\""));
            insight_free_string(matrix);

            let risk = insight_relapse_risk(json.as_ptr());
            assert!(!risk.is_null());
            let risk_str = CStr::from_ptr(risk).to_str().unwrap();
            assert!(risk_str.contains("\"score\""));
            insight_free_string(risk);
        }
    }

    #[test]
    fn test_ffi_engine_lifecycle() {
        unsafe {
            let engine = insight_engine_new();
            assert!(!engine.is_null());

            let bad_catalog = CString::new("{\"definitions\": 3}").unwrap();
            assert_ne!(insight_engine_load_catalog(engine, bad_catalog.as_ptr()), 0);
            assert!(!insight_last_error().is_null());

            let json = sample_input_json();
            let result = insight_engine_analyze(engine, json.as_ptr());
            assert!(!result.is_null());
            insight_free_string(result);

            insight_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid_json = CString::new("not json").unwrap();
            let result = insight_analyze(invalid_json.as_ptr());
            assert!(result.is_null());

            let error = insight_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(!error_str.is_empty());

            assert!(insight_analyze(ptr::null()).is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = insight_version();
            assert!(!version.is_null());
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
