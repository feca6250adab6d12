//! FFI bindings for Rapport
//!
//! C-compatible functions for scoring keypoint streams from other languages.
//! All functions take null-terminated UTF-8 strings and return allocated
//! strings that must be freed by the caller using `rapport_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, Utc};

use crate::analyzer::FrameAnalyzer;
use crate::config::RapportConfig;
use crate::error::RapportError;
use crate::export::SessionRecordEncoder;
use crate::scoring::{FinalResult, ScoreEngine};
use crate::types::{CommunicationScores, FeatureSnapshot, RecordedFrame, TextAxisScores};

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

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Convert a result into a C string, recording the error on failure
fn finish(result: Result<String, RapportError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Score a JSON array of feature snapshots and return the detail scores as JSON.
///
/// # Safety
/// - `timeline_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `rapport_free_string`.
/// - Returns NULL on error; call `rapport_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn rapport_score_timeline_json(timeline_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json = match cstr_to_string(timeline_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid timeline string pointer");
            return ptr::null_mut();
        }
    };

    finish(score_timeline(&json))
}

fn score_timeline(json: &str) -> Result<String, RapportError> {
    let snapshots: Vec<FeatureSnapshot> = serde_json::from_str(json)?;
    let scores = ScoreEngine::new().score(&snapshots);
    Ok(serde_json::to_string(&scores)?)
}

/// Combine detail scores with text axis scores into the final classification.
///
/// # Safety
/// - `scores_json` must be a valid null-terminated C string.
/// - `text_axes_json` may be NULL, in which case neutral axis scores are used.
/// - Returns a newly allocated string that must be freed with `rapport_free_string`.
/// - Returns NULL on error; call `rapport_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn rapport_classify_json(
    scores_json: *const c_char,
    text_axes_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let scores = match cstr_to_string(scores_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid scores string pointer");
            return ptr::null_mut();
        }
    };
    let text_axes = cstr_to_string(text_axes_json);

    finish(classify(&scores, text_axes.as_deref()))
}

fn classify(scores_json: &str, text_axes_json: Option<&str>) -> Result<String, RapportError> {
    let scores: CommunicationScores = serde_json::from_str(scores_json)?;
    let text = match text_axes_json {
        Some(json) => serde_json::from_str(json)?,
        None => TextAxisScores::NEUTRAL,
    };
    Ok(serde_json::to_string(&FinalResult::new(scores, text))?)
}

// ============================================================================
// Stateful Analyzer API
// ============================================================================

/// Opaque handle to a frame analyzer session
pub struct RapportAnalyzerHandle {
    analyzer: FrameAnalyzer,
    encoder: SessionRecordEncoder,
    started_at: DateTime<Utc>,
}

/// Create a new analyzer.
///
/// # Safety
/// - `config_json` may be NULL for the default configuration.
/// - Returns a pointer that must be freed with `rapport_analyzer_free`.
/// - Returns NULL on error; call `rapport_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn rapport_analyzer_new(
    config_json: *const c_char,
) -> *mut RapportAnalyzerHandle {
    clear_last_error();

    let config = match cstr_to_string(config_json) {
        Some(json) => match RapportConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        },
        None => RapportConfig::default(),
    };

    let handle = Box::new(RapportAnalyzerHandle {
        analyzer: FrameAnalyzer::new(&config),
        encoder: SessionRecordEncoder::new(),
        started_at: Utc::now(),
    });
    Box::into_raw(handle)
}

/// Free an analyzer.
///
/// # Safety
/// - `analyzer` must be a valid pointer returned by `rapport_analyzer_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn rapport_analyzer_free(analyzer: *mut RapportAnalyzerHandle) {
    if !analyzer.is_null() {
        drop(Box::from_raw(analyzer));
    }
}

/// Push one recorded frame (keypoints plus optional expressions) and return
/// the live detail scores as JSON.
///
/// # Safety
/// - `analyzer` must be a valid pointer returned by `rapport_analyzer_new`.
/// - `frame_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `rapport_free_string`.
/// - Returns NULL on error; call `rapport_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn rapport_analyzer_push_frame(
    analyzer: *mut RapportAnalyzerHandle,
    frame_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if analyzer.is_null() {
        set_last_error("Null analyzer pointer");
        return ptr::null_mut();
    }
    let handle = &mut *analyzer;

    let json = match cstr_to_string(frame_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid frame string pointer");
            return ptr::null_mut();
        }
    };

    finish(push_frame(handle, &json))
}

fn push_frame(handle: &mut RapportAnalyzerHandle, json: &str) -> Result<String, RapportError> {
    let frame: RecordedFrame = serde_json::from_str(json)?;
    let timestamp = frame.timestamp.unwrap_or_else(Utc::now);
    let scores = handle
        .analyzer
        .process_frame(timestamp, &frame.keypoints, frame.expressions)?;
    Ok(serde_json::to_string(&scores)?)
}

/// Export the session record (timeline, final scores, summary) as JSON.
///
/// # Safety
/// - `analyzer` must be a valid pointer returned by `rapport_analyzer_new`.
/// - Returns a newly allocated string that must be freed with `rapport_free_string`.
/// - Returns NULL on error; call `rapport_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn rapport_analyzer_export(
    analyzer: *const RapportAnalyzerHandle,
) -> *mut c_char {
    clear_last_error();

    if analyzer.is_null() {
        set_last_error("Null analyzer pointer");
        return ptr::null_mut();
    }
    let handle = &*analyzer;

    finish(handle.encoder.encode_to_json(
        handle.analyzer.timeline(),
        handle.analyzer.engine(),
        Some(handle.started_at),
        Some(Utc::now()),
    ))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by any rapport function.
///
/// # Safety
/// - `s` must be a pointer returned by a rapport function, or NULL.
#[no_mangle]
pub unsafe extern "C" fn rapport_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Get the last error message for the calling thread.
///
/// # Safety
/// - The returned pointer is valid until the next rapport call on this thread.
/// - Do not free the returned pointer.
/// - Returns NULL if there was no error.
#[no_mangle]
pub unsafe extern "C" fn rapport_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}
