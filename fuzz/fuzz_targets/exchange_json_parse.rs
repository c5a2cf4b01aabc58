//! Fuzz target for exchange JSON parsing.
//!
//! Run with:
//!   cargo +nightly fuzz run exchange_json_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use tilelabel::ir::io_coco_json::from_coco_slice;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_coco_slice(data);
});
