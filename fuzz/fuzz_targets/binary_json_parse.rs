//! Fuzz target for Binary JSON parsing.
//!
//! Run with:
//!   cargo +nightly fuzz run binary_json_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use tilelabel::ir::io_binary_json::from_binary_slice;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_binary_slice(data);
});
