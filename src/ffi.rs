//! FFI (Foreign Function Interface) layer for host integration
//!
//! A host process (web server module, output-buffer hook, PHP extension)
//! links the static or dynamic library and feeds it one rendered page per
//! call.
//!
//! # FFI Boundary Contract
//!
//! ## String Representation
//!
//! **All strings use bytes + length (NOT NUL-terminated C strings).**
//!
//! Every string field pairs a pointer with a `_len` byte count. The length
//! never includes a NUL terminator and C code must not call `strlen()` on
//! these pointers.
//!
//! The rewritten document is returned in the charset it was decoded from,
//! so a page served as ISO-8859-1 comes back as ISO-8859-1.
//!
//! ## Memory Management
//!
//! - Rust allocates all output memory as `Box<[u8]>`
//! - C must call `dom_optimiser_result_free()` exactly once per result
//! - After free, all pointers in the result are NULL
//!
//! ```rust
//! use dom_optimiser::ffi::{dom_optimiser_result_free, DomOptimiserResult};
//! use std::ptr;
//!
//! let html = b"<p>kept</p>".to_vec();
//! let html_len = html.len();
//! let mut result = DomOptimiserResult {
//!     html: Box::into_raw(html.into_boxed_slice()) as *mut u8,
//!     html_len,
//!     passthrough: 1,
//!     nodes_changed: 0,
//!     error_code: 0,
//!     error_message: ptr::null_mut(),
//!     error_len: 0,
//! };
//!
//! unsafe { dom_optimiser_result_free(&mut result) };
//! assert!(result.html.is_null());
//! assert_eq!(result.html_len, 0);
//! ```
//!
//! ## Error Handling Contract
//!
//! **Success:** `error_code = 0`, `error_message = NULL`, `html` holds the
//! output. `passthrough = 1` when the input was returned unchanged without
//! parsing (too short, or every pass disabled).
//!
//! **Error:** `error_code != 0`, `error_message` describes the failure and
//! `html` is NULL. The host serves its original buffer.
//!
//! Panics never unwind into C; they are reported as `ERROR_INTERNAL`.
//!
//! ## Thread Safety
//!
//! A handle is NOT thread-safe. Each worker owns its own handle; separate
//! handles may be used concurrently.

use std::panic;
use std::ptr;
use std::slice;
use std::time::Duration;

use crate::error::OptimiseError;
use crate::optimiser::{DomOptimiser, OptimiseContext, OptimiseOutput, OptimiserOptions};
use crate::safety::PruneGuard;
use crate::scanner::ScriptReferenceScanner;

// ============================================================================
// Error Code Constants
// ============================================================================

/// Success - no error occurred
pub const ERROR_SUCCESS: u32 = 0;

/// No usable document could be built from the input
pub const ERROR_PARSE: u32 = 1;

/// Character encoding error (invalid bytes, unsupported charset)
pub const ERROR_ENCODING: u32 = 2;

/// Processing exceeded `timeout_ms`
pub const ERROR_TIMEOUT: u32 = 3;

/// The rewritten tree could not be serialized
pub const ERROR_SERIALIZATION: u32 = 4;

/// Invalid input data (NULL pointers, invalid parameters)
pub const ERROR_INVALID_INPUT: u32 = 5;

/// Internal error (unexpected condition, panic caught)
pub const ERROR_INTERNAL: u32 = 99;

// ============================================================================
// FFI Data Structures
// ============================================================================

/// Per-call options passed from C to Rust
///
/// # Field Descriptions
///
/// - `enable_wrapper_pruning`, `enable_ghost_removal`,
///   `enable_comment_stripping`, `enable_aggressive_mode`: 0 = off, any
///   other value = on. All four off is a valid no-op.
/// - `timeout_ms`: processing budget in milliseconds, 0 = no budget
/// - `content_type` / `content_type_len`: optional Content-Type header value
///   for charset detection; NULL with length 0 when unknown
///
/// # Example Usage (C)
///
/// ```c
/// dom_optimiser_options_t options = {
///     .enable_wrapper_pruning = 1,
///     .enable_ghost_removal = 1,
///     .enable_comment_stripping = 1,
///     .enable_aggressive_mode = 0,
///     .timeout_ms = 2000,
///     .content_type = NULL,
///     .content_type_len = 0
/// };
/// ```
#[repr(C)]
pub struct DomOptimiserOptions {
    /// Unwrap redundant wrappers: 0=no, 1=yes
    pub enable_wrapper_pruning: u8,
    /// Delete empty builder elements: 0=no, 1=yes
    pub enable_ghost_removal: u8,
    /// Delete comments: 0=no, 1=yes
    pub enable_comment_stripping: u8,
    /// Flatten containers: 0=no, 1=yes
    pub enable_aggressive_mode: u8,
    /// Processing timeout in milliseconds (0=no timeout)
    pub timeout_ms: u32,
    /// Content-Type header value for charset detection (can be NULL)
    pub content_type: *const u8,
    /// Length of content_type in bytes (0 if NULL)
    pub content_type_len: usize,
}

impl DomOptimiserOptions {
    fn pass_options(&self) -> OptimiserOptions {
        OptimiserOptions {
            enable_wrapper_pruning: self.enable_wrapper_pruning != 0,
            enable_ghost_removal: self.enable_ghost_removal != 0,
            enable_comment_stripping: self.enable_comment_stripping != 0,
            enable_aggressive_mode: self.enable_aggressive_mode != 0,
        }
    }
}

/// Result returned from Rust to C
///
/// # State Invariants
///
/// **Success (`error_code == 0`):**
/// - `html` is non-NULL, `html_len` is its byte length (may be 0 for empty input)
/// - `passthrough` is 1 when the input was copied back unchanged
/// - `nodes_changed` counts the nodes removed or unwrapped
/// - `error_message` is NULL, `error_len` is 0
///
/// **Error (`error_code != 0`):**
/// - `html` is NULL, `html_len`, `passthrough` and `nodes_changed` are 0
/// - `error_message` is non-NULL, `error_len` > 0
///
/// # Example Usage (C)
///
/// ```c
/// dom_optimiser_result_t result;
/// dom_optimiser_process(optimiser, page, page_len, &options, &result);
///
/// if (result.error_code == 0) {
///     send_response(result.html, result.html_len);
/// } else {
///     log_error(result.error_code, result.error_message, result.error_len);
///     send_response(page, page_len);
/// }
///
/// dom_optimiser_result_free(&result);
/// ```
#[repr(C)]
pub struct DomOptimiserResult {
    /// Rewritten document (NOT NUL-terminated), NULL on error
    pub html: *mut u8,

    /// Length of html in bytes
    pub html_len: usize,

    /// 1 when the entry guard returned the input unchanged
    pub passthrough: u8,

    /// Number of nodes removed or unwrapped
    pub nodes_changed: u32,

    /// Error code: 0=success, non-zero=error (see ERROR_* constants)
    pub error_code: u32,

    /// Error message (UTF-8 bytes, NULL on success)
    pub error_message: *mut u8,

    /// Length of error message in bytes
    pub error_len: usize,
}

/// Opaque handle to an optimiser instance
///
/// # Lifecycle
///
/// 1. Create: `dom_optimiser_new()`
/// 2. Use: `dom_optimiser_process()`, any number of times
/// 3. Destroy: `dom_optimiser_free()`
///
/// The handle carries no per-document state; options arrive with each call.
pub struct DomOptimiserHandle {
    guard: PruneGuard,
    scanner: ScriptReferenceScanner,
}

fn reset_result(result: &mut DomOptimiserResult) {
    result.html = ptr::null_mut();
    result.html_len = 0;
    result.passthrough = 0;
    result.nodes_changed = 0;
    result.error_code = ERROR_SUCCESS;
    result.error_message = ptr::null_mut();
    result.error_len = 0;
}

fn set_error_result(result: &mut DomOptimiserResult, error_code: u32, error_message: String) {
    let error_bytes = error_message.into_bytes().into_boxed_slice();
    result.error_code = error_code;
    result.error_len = error_bytes.len();
    result.error_message = Box::into_raw(error_bytes) as *mut u8;
}

fn set_success_result(result: &mut DomOptimiserResult, output: OptimiseOutput<Vec<u8>>) {
    let html = output.html.into_boxed_slice();
    result.html_len = html.len();
    result.html = Box::into_raw(html) as *mut u8;
    result.passthrough = u8::from(output.report.skipped.is_some());
    result.nodes_changed = u32::try_from(output.report.nodes_changed()).unwrap_or(u32::MAX);
    result.error_code = ERROR_SUCCESS;
    result.error_message = ptr::null_mut();
    result.error_len = 0;
}

fn required_ref<'a, T>(ptr: *const T, name: &str) -> Result<&'a T, OptimiseError> {
    if ptr.is_null() {
        return Err(OptimiseError::InvalidInput(format!("{name} pointer is NULL")));
    }

    // SAFETY: Caller provided a non-NULL pointer and accepts the FFI contract
    // that it points to a valid, properly aligned value.
    Ok(unsafe { &*ptr })
}

fn required_bytes<'a>(ptr: *const u8, len: usize, name: &str) -> Result<&'a [u8], OptimiseError> {
    if len == 0 {
        return Ok(&[]);
    }

    if ptr.is_null() {
        return Err(OptimiseError::InvalidInput(format!("{name} pointer is NULL")));
    }

    // SAFETY: Pointer was validated as non-NULL above; caller guarantees `len`
    // bytes are valid and readable for the duration of this call.
    Ok(unsafe { slice::from_raw_parts(ptr, len) })
}

fn optional_utf8<'a>(
    ptr: *const u8,
    len: usize,
    field_name: &str,
) -> Result<Option<&'a str>, OptimiseError> {
    if len == 0 {
        return Ok(None);
    }

    if ptr.is_null() {
        return Err(OptimiseError::InvalidInput(format!(
            "{field_name}_len > 0 with NULL {field_name} pointer"
        )));
    }

    // SAFETY: Pointer is non-NULL and caller guarantees `len` readable bytes.
    let bytes = unsafe { slice::from_raw_parts(ptr, len) };

    // A header that is not UTF-8 cannot name a charset; fall through to meta.
    Ok(std::str::from_utf8(bytes).ok())
}

fn process_inner(
    handle_ref: &DomOptimiserHandle,
    html_slice: &[u8],
    options_ref: &DomOptimiserOptions,
) -> Result<OptimiseOutput<Vec<u8>>, OptimiseError> {
    let content_type = optional_utf8(
        options_ref.content_type,
        options_ref.content_type_len,
        "content_type",
    )?;

    let timeout = Duration::from_millis(u64::from(options_ref.timeout_ms));
    let mut ctx = OptimiseContext::new(timeout);

    let optimiser = DomOptimiser::from_parts(
        options_ref.pass_options(),
        handle_ref.guard.clone(),
        handle_ref.scanner.clone(),
    );
    optimiser.process_bytes(html_slice, content_type, &mut ctx)
}

fn free_buffer(ptr_field: &mut *mut u8, len_field: &mut usize) {
    if (*ptr_field).is_null() {
        return;
    }

    let raw = ptr::slice_from_raw_parts_mut(*ptr_field, *len_field);
    // SAFETY: `raw` was allocated by `Box<[u8]>` via `Box::into_raw`.
    let _ = unsafe { Box::from_raw(raw) };
    *ptr_field = ptr::null_mut();
    *len_field = 0;
}

// ============================================================================
// FFI Functions
// ============================================================================

/// Create a new optimiser instance
///
/// Returns NULL if initialisation panicked. The handle must be released with
/// `dom_optimiser_free()`.
///
/// # Example (C)
///
/// ```c
/// dom_optimiser_t *optimiser = dom_optimiser_new();
/// if (optimiser == NULL) {
///     return -1;
/// }
/// ```
#[unsafe(no_mangle)]
pub extern "C" fn dom_optimiser_new() -> *mut DomOptimiserHandle {
    let result = panic::catch_unwind(|| {
        let handle = DomOptimiserHandle {
            guard: PruneGuard::new(),
            scanner: ScriptReferenceScanner::new(),
        };

        Box::into_raw(Box::new(handle))
    });

    result.unwrap_or(ptr::null_mut())
}

/// Optimise one HTML document
///
/// # Parameters
///
/// - `handle`: from `dom_optimiser_new()`, non-NULL, not shared across threads
/// - `html` / `html_len`: input bytes; `html` may be NULL only when `html_len == 0`
/// - `options`: non-NULL pointer to per-call options
/// - `result`: non-NULL pointer to the result to populate; previous contents
///   are overwritten without being freed
///
/// # Error Codes
///
/// - `ERROR_INVALID_INPUT` (5): NULL pointer or invalid parameter
/// - `ERROR_PARSE` (1): no usable document
/// - `ERROR_ENCODING` (2): invalid bytes or unsupported charset
/// - `ERROR_TIMEOUT` (3): `timeout_ms` exceeded
/// - `ERROR_SERIALIZATION` (4): output could not be written
/// - `ERROR_INTERNAL` (99): panic caught
///
/// # Safety
///
/// - Non-NULL pointers must be valid for the stated lengths
/// - Using a freed handle, or one handle from two threads at once, is UB
/// - Not calling `dom_optimiser_result_free()` leaks the output (not UB)
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dom_optimiser_process(
    handle: *mut DomOptimiserHandle,
    html: *const u8,
    html_len: usize,
    options: *const DomOptimiserOptions,
    result: *mut DomOptimiserResult,
) {
    // Cannot report anything without a result.
    if result.is_null() {
        return;
    }

    // SAFETY: `result` was validated as non-NULL above.
    let result_ref = unsafe { &mut *result };
    reset_result(result_ref);

    let panic_result = panic::catch_unwind(|| -> Result<OptimiseOutput<Vec<u8>>, OptimiseError> {
        let handle_ref = required_ref(handle.cast_const(), "Optimiser handle")?;
        let options_ref = required_ref(options, "Options")?;
        let html_slice = required_bytes(html, html_len, "HTML")?;
        process_inner(handle_ref, html_slice, options_ref)
    });

    settle_result(result_ref, panic_result);
}

/// Write the outcome of a guarded call into the result, panics included
fn settle_result(
    result: &mut DomOptimiserResult,
    outcome: std::thread::Result<Result<OptimiseOutput<Vec<u8>>, OptimiseError>>,
) {
    let outcome = outcome.unwrap_or_else(|_| {
        Err(OptimiseError::InternalError(
            "panic during optimisation".to_string(),
        ))
    });

    match outcome {
        Ok(output) => set_success_result(result, output),
        Err(e) => set_error_result(result, e.code(), e.to_string()),
    }
}

/// Free the buffers of a result
///
/// Safe to call more than once: after the first call every pointer is NULL
/// and later calls do nothing. Do NOT call C `free()` on result pointers.
///
/// # Safety
///
/// `result` must be NULL or point to a result populated by
/// `dom_optimiser_process()`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dom_optimiser_result_free(result: *mut DomOptimiserResult) {
    if result.is_null() {
        return;
    }

    // SAFETY: `result` was validated as non-NULL above.
    let result_ref = unsafe { &mut *result };
    free_buffer(&mut result_ref.html, &mut result_ref.html_len);
    free_buffer(&mut result_ref.error_message, &mut result_ref.error_len);
    result_ref.passthrough = 0;
    result_ref.nodes_changed = 0;
    result_ref.error_code = ERROR_SUCCESS;
}

/// Destroy an optimiser instance
///
/// # Safety
///
/// `handle` must be NULL or come from `dom_optimiser_new()`, must not have
/// been freed already, and must not be in use by another call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dom_optimiser_free(handle: *mut DomOptimiserHandle) {
    if handle.is_null() {
        return;
    }

    // SAFETY: `handle` is non-NULL and was created by `Box::into_raw` in
    // `dom_optimiser_new`.
    unsafe { drop(Box::from_raw(handle)) };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> DomOptimiserOptions {
        DomOptimiserOptions {
            enable_wrapper_pruning: 1,
            enable_ghost_removal: 1,
            enable_comment_stripping: 1,
            enable_aggressive_mode: 0,
            timeout_ms: 0,
            content_type: ptr::null(),
            content_type_len: 0,
        }
    }

    fn empty_result() -> DomOptimiserResult {
        DomOptimiserResult {
            html: ptr::null_mut(),
            html_len: 0,
            passthrough: 0,
            nodes_changed: 0,
            error_code: ERROR_SUCCESS,
            error_message: ptr::null_mut(),
            error_len: 0,
        }
    }

    #[test]
    fn test_error_codes_match_error_enum() {
        assert_eq!(OptimiseError::ParseError(String::new()).code(), ERROR_PARSE);
        assert_eq!(OptimiseError::EncodingError(String::new()).code(), ERROR_ENCODING);
        assert_eq!(OptimiseError::Timeout.code(), ERROR_TIMEOUT);
        assert_eq!(
            OptimiseError::SerializationError(String::new()).code(),
            ERROR_SERIALIZATION
        );
        assert_eq!(OptimiseError::InvalidInput(String::new()).code(), ERROR_INVALID_INPUT);
        assert_eq!(OptimiseError::InternalError(String::new()).code(), ERROR_INTERNAL);
    }

    #[test]
    fn test_caught_panic_reported_as_internal_error() {
        let mut result = empty_result();
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        settle_result(&mut result, Err(payload));

        assert_eq!(result.error_code, ERROR_INTERNAL);
        assert!(result.html.is_null());
        let message = unsafe { slice::from_raw_parts(result.error_message, result.error_len) };
        assert_eq!(message, b"Internal error: panic during optimisation");

        unsafe { dom_optimiser_result_free(&mut result) };
        assert!(result.error_message.is_null());
    }

    #[test]
    fn test_pass_options_treat_nonzero_as_on() {
        let mut opts = options();
        opts.enable_aggressive_mode = 7;
        opts.enable_ghost_removal = 0;
        let pass = opts.pass_options();
        assert!(pass.enable_aggressive_mode);
        assert!(!pass.enable_ghost_removal);
    }

    #[test]
    fn test_content_type_len_without_pointer_rejected() {
        let handle = dom_optimiser_new();
        let mut opts = options();
        opts.content_type_len = 5;
        let html = b"<p>x</p>";
        let mut result = empty_result();

        unsafe {
            dom_optimiser_process(handle, html.as_ptr(), html.len(), &opts, &mut result);
        }
        assert_eq!(result.error_code, ERROR_INVALID_INPUT);
        assert!(result.html.is_null());

        unsafe {
            dom_optimiser_result_free(&mut result);
            dom_optimiser_free(handle);
        }
    }
}
