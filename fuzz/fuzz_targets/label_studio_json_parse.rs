//! Fuzz target for Label Studio JSON parsing.
//!
//! Run with:
//!   cargo +nightly fuzz run label_studio_json_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use tilelabel::ir::io_label_studio_json::from_label_studio_slice;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_label_studio_slice(data);
});
