#![no_main]

use dom_optimiser::{DomOptimiser, OptimiserOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&flags, rest)) = data.split_first() else {
        return;
    };
    let Ok(html) = std::str::from_utf8(rest) else {
        return;
    };

    let options = OptimiserOptions {
        enable_wrapper_pruning: flags & 0b0001 != 0,
        enable_ghost_removal: flags & 0b0010 != 0,
        enable_comment_stripping: flags & 0b0100 != 0,
        enable_aggressive_mode: flags & 0b1000 != 0,
    };
    let _ = DomOptimiser::with_options(options).process_or_passthrough(html);
});
