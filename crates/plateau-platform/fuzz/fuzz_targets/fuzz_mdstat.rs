//! Fuzz test for /proc/mdstat parsing

#![no_main]

use libfuzzer_sys::fuzz_target;

use plateau_platform::parse_mdstat;

fuzz_target!(|data: &str| {
    for array in parse_mdstat(data) {
        assert!(array.name.starts_with("md"));
        assert!(!array.is_ready() || array.active);
    }
});
