//! Fuzz test for fio JSON output parsing
//!
//! Tests that arbitrary tool output never panics the parser.

#![no_main]

use libfuzzer_sys::fuzz_target;

use plateau_platform::parse_fio_json;

fuzz_target!(|data: &str| {
    if let Ok(record) = parse_fio_json(data) {
        // Accessors are plain arithmetic and must not panic
        let _ = record.total_iops();
        let _ = record.total_bandwidth_kbps();
    }

    // fio warnings are commonly printed ahead of the JSON document
    let prefixed = format!("fio: note: {}\n{{\"jobs\":[{}]}}", data, data);
    let _ = parse_fio_json(&prefixed);
});
