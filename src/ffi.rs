//! C ABI for presentation layers written in other languages.
//!
//! Graphs are addressed through opaque integer handles rather than raw
//! pointers. The handle -> graph mapping lives entirely in Rust-controlled
//! memory, so a foreign runtime never holds a pointer into our heap except
//! for report strings, which it must hand back to `ragwatch_string_free`.
use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use parking_lot::Mutex;

use crate::config::{DetectionMode, TraceConfig};
use crate::detection::detect_with;
use crate::error::Error;
use crate::shared::SharedGraph;

lazy_static::lazy_static! {
    static ref GRAPH_HANDLES: Mutex<HashMap<usize, SharedGraph>> = Mutex::new(HashMap::new());
    static ref NEXT_HANDLE: Mutex<usize> = Mutex::new(1);
}

pub const RAGWATCH_OK: c_int = 0;
pub const RAGWATCH_ERR_INVALID_ARGUMENT: c_int = -1;
pub const RAGWATCH_ERR_DUPLICATE_NODE: c_int = -2;
pub const RAGWATCH_ERR_UNKNOWN_NODE: c_int = -3;
pub const RAGWATCH_ERR_CAPACITY_EXCEEDED: c_int = -4;
pub const RAGWATCH_ERR_EDGE_NOT_FOUND: c_int = -5;
pub const RAGWATCH_ERR_INVALID_MODE: c_int = -6;
pub const RAGWATCH_ERR_INVALID_INSTANCES: c_int = -7;

// Handles are never reused, so a stale handle can't reach a newer graph.
fn next_handle() -> usize {
    let mut handle = NEXT_HANDLE.lock();
    let id = *handle;
    *handle += 1;
    id
}

fn error_code(err: &Error) -> c_int {
    match err {
        Error::DuplicateNode(_) => RAGWATCH_ERR_DUPLICATE_NODE,
        Error::UnknownNode { .. } | Error::UnknownId(_) => RAGWATCH_ERR_UNKNOWN_NODE,
        Error::CapacityExceeded { .. } => RAGWATCH_ERR_CAPACITY_EXCEEDED,
        Error::EdgeNotFound { .. } => RAGWATCH_ERR_EDGE_NOT_FOUND,
        Error::InvalidMode { .. } => RAGWATCH_ERR_INVALID_MODE,
        Error::InvalidInstanceCount(_) => RAGWATCH_ERR_INVALID_INSTANCES,
        _ => RAGWATCH_ERR_INVALID_ARGUMENT,
    }
}

fn graph_for(handle: usize) -> Option<SharedGraph> {
    GRAPH_HANDLES.lock().get(&handle).cloned()
}

// Caller guarantees a nul-terminated string; anything else is UB on their side.
fn read_id<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

fn status(result: crate::Result<()>) -> c_int {
    match result {
        Ok(()) => RAGWATCH_OK,
        Err(err) => error_code(&err),
    }
}

/// Runs `op` against the graph behind `handle` with two string arguments.
fn with_pair(
    handle: usize,
    first: *const c_char,
    second: *const c_char,
    op: impl FnOnce(&SharedGraph, &str, &str) -> crate::Result<()>,
) -> c_int {
    let (Some(graph), Some(first), Some(second)) =
        (graph_for(handle), read_id(first), read_id(second))
    else {
        return RAGWATCH_ERR_INVALID_ARGUMENT;
    };
    status(op(&graph, first, second))
}

// ============================================================================
// Graph lifecycle
// ============================================================================

/// Create an empty graph and return its handle
#[no_mangle]
pub extern "C" fn ragwatch_graph_new() -> usize {
    let handle = next_handle();
    GRAPH_HANDLES.lock().insert(handle, SharedGraph::new());
    handle
}

/// Free a graph
#[no_mangle]
pub extern "C" fn ragwatch_graph_free(handle: usize) {
    GRAPH_HANDLES.lock().remove(&handle);
}

// ============================================================================
// Graph mutation
// ============================================================================

#[no_mangle]
pub extern "C" fn ragwatch_add_process(handle: usize, id: *const c_char) -> c_int {
    let (Some(graph), Some(id)) = (graph_for(handle), read_id(id)) else {
        return RAGWATCH_ERR_INVALID_ARGUMENT;
    };
    status(graph.add_process(id))
}

#[no_mangle]
pub extern "C" fn ragwatch_add_resource(handle: usize, id: *const c_char, instances: u32) -> c_int {
    let (Some(graph), Some(id)) = (graph_for(handle), read_id(id)) else {
        return RAGWATCH_ERR_INVALID_ARGUMENT;
    };
    status(graph.add_resource(id, instances))
}

#[no_mangle]
pub extern "C" fn ragwatch_allocate(
    handle: usize,
    resource: *const c_char,
    process: *const c_char,
) -> c_int {
    with_pair(handle, resource, process, |graph, r, p| graph.allocate(r, p))
}

#[no_mangle]
pub extern "C" fn ragwatch_request(
    handle: usize,
    process: *const c_char,
    resource: *const c_char,
) -> c_int {
    with_pair(handle, process, resource, |graph, p, r| graph.request(p, r))
}

#[no_mangle]
pub extern "C" fn ragwatch_release(
    handle: usize,
    resource: *const c_char,
    process: *const c_char,
) -> c_int {
    with_pair(handle, resource, process, |graph, r, p| graph.release(r, p))
}

#[no_mangle]
pub extern "C" fn ragwatch_withdraw_request(
    handle: usize,
    process: *const c_char,
    resource: *const c_char,
) -> c_int {
    with_pair(handle, process, resource, |graph, p, r| graph.withdraw_request(p, r))
}

// ============================================================================
// Detection
// ============================================================================

/// Run detection and return the JSON report.
///
/// `mode`: 0 = auto, 1 = single-instance, 2 = multi-instance. Returns null on
/// a bad handle or mode, or when single-instance detection is forced on a
/// multi-instance graph. The string must be freed with `ragwatch_string_free`.
#[no_mangle]
pub extern "C" fn ragwatch_detect_json(handle: usize, mode: c_int) -> *mut c_char {
    let mode = match mode {
        0 => DetectionMode::Auto,
        1 => DetectionMode::SingleInstance,
        2 => DetectionMode::MultiInstance,
        _ => return std::ptr::null_mut(),
    };
    let Some(graph) = graph_for(handle) else {
        return std::ptr::null_mut();
    };

    let json = match graph
        .read(|g| detect_with(g, mode, &TraceConfig::default()))
        .and_then(|report| report.to_json())
    {
        Ok(json) => json,
        Err(_) => return std::ptr::null_mut(),
    };

    // Allocate with libc malloc so the foreign side may free it with free()
    // as well as through ragwatch_string_free.
    let bytes = json.as_bytes();
    unsafe {
        let buf = libc::malloc(bytes.len() + 1) as *mut u8;
        if buf.is_null() {
            return std::ptr::null_mut();
        }
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf, bytes.len());
        *buf.add(bytes.len()) = 0;
        buf as *mut c_char
    }
}

/// Free a string returned by `ragwatch_detect_json`
#[no_mangle]
pub extern "C" fn ragwatch_string_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe { libc::free(ptr as *mut libc::c_void) };
    }
}

/// Get version information
#[no_mangle]
pub extern "C" fn ragwatch_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    #[test]
    fn test_build_and_detect_over_ffi() {
        let (p1, p2, r1, r2) = (c("P1"), c("P2"), c("R1"), c("R2"));
        let handle = ragwatch_graph_new();
        assert_eq!(ragwatch_add_process(handle, p1.as_ptr()), RAGWATCH_OK);
        assert_eq!(ragwatch_add_process(handle, p2.as_ptr()), RAGWATCH_OK);
        assert_eq!(ragwatch_add_resource(handle, r1.as_ptr(), 1), RAGWATCH_OK);
        assert_eq!(ragwatch_add_resource(handle, r2.as_ptr(), 1), RAGWATCH_OK);
        assert_eq!(ragwatch_allocate(handle, r1.as_ptr(), p1.as_ptr()), RAGWATCH_OK);
        assert_eq!(ragwatch_allocate(handle, r2.as_ptr(), p2.as_ptr()), RAGWATCH_OK);
        assert_eq!(ragwatch_request(handle, p1.as_ptr(), r2.as_ptr()), RAGWATCH_OK);
        assert_eq!(ragwatch_request(handle, p2.as_ptr(), r1.as_ptr()), RAGWATCH_OK);

        let ptr = ragwatch_detect_json(handle, 0);
        assert!(!ptr.is_null());
        let json = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
        ragwatch_string_free(ptr);

        let report: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(report["verdict"]["status"], "deadlocked");
        assert_eq!(report["mode"], "single_instance");

        ragwatch_graph_free(handle);
        assert!(ragwatch_detect_json(handle, 0).is_null());
    }

    #[test]
    fn test_error_codes() {
        let (p1, r1, r9) = (c("P1"), c("R1"), c("R9"));
        let handle = ragwatch_graph_new();
        assert_eq!(ragwatch_add_process(handle, p1.as_ptr()), RAGWATCH_OK);
        assert_eq!(ragwatch_add_process(handle, p1.as_ptr()), RAGWATCH_ERR_DUPLICATE_NODE);
        assert_eq!(ragwatch_add_resource(handle, r1.as_ptr(), 0), RAGWATCH_ERR_INVALID_INSTANCES);
        assert_eq!(ragwatch_add_resource(handle, r1.as_ptr(), 2), RAGWATCH_OK);
        assert_eq!(
            ragwatch_release(handle, r1.as_ptr(), p1.as_ptr()),
            RAGWATCH_ERR_EDGE_NOT_FOUND
        );
        assert_eq!(
            ragwatch_allocate(handle, r9.as_ptr(), p1.as_ptr()),
            RAGWATCH_ERR_UNKNOWN_NODE
        );
        assert_eq!(
            ragwatch_add_process(handle, std::ptr::null()),
            RAGWATCH_ERR_INVALID_ARGUMENT
        );

        // Forced single-instance run on a two-instance resource
        assert!(ragwatch_detect_json(handle, 1).is_null());
        assert!(ragwatch_detect_json(handle, 7).is_null());
        ragwatch_graph_free(handle);
    }

    #[test]
    fn test_version() {
        let version = unsafe { CStr::from_ptr(ragwatch_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }
}
