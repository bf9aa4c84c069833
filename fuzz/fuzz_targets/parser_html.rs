#![no_main]

use dom_optimiser::parser::{parse_html, serialize_document};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(dom) = parse_html(data) {
        let _ = serialize_document(&dom);
    }
});
