//! Fuzz target for FormData JSON parsing.
//!
//! Run with:
//!   cargo +nightly fuzz run formdata_json_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use tilelabel::ir::io_formdata_json::from_formdata_slice;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_formdata_slice(data);
});
