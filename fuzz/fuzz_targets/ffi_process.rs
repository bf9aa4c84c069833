#![no_main]

use dom_optimiser::ffi::{
    DomOptimiserOptions, DomOptimiserResult, dom_optimiser_free, dom_optimiser_new,
    dom_optimiser_process, dom_optimiser_result_free,
};
use libfuzzer_sys::fuzz_target;
use std::ptr;

fuzz_target!(|data: &[u8]| {
    let handle = dom_optimiser_new();
    if handle.is_null() {
        return;
    }

    let options = DomOptimiserOptions {
        enable_wrapper_pruning: 1,
        enable_ghost_removal: 1,
        enable_comment_stripping: 1,
        enable_aggressive_mode: 1,
        timeout_ms: 1000,
        content_type: ptr::null(),
        content_type_len: 0,
    };
    let mut result = DomOptimiserResult {
        html: ptr::null_mut(),
        html_len: 0,
        passthrough: 0,
        nodes_changed: 0,
        error_code: 0,
        error_message: ptr::null_mut(),
        error_len: 0,
    };

    unsafe {
        dom_optimiser_process(handle, data.as_ptr(), data.len(), &options, &mut result);
        dom_optimiser_result_free(&mut result);
        dom_optimiser_free(handle);
    }
});
