//! Fuzz test for block size parsing
//!
//! Tests that block size parsing handles arbitrary inputs safely.

#![no_main]

use libfuzzer_sys::fuzz_target;

use plateau_core::{parse_block_sizes, BlockSize, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};

fuzz_target!(|data: &str| {
    if let Ok(size) = data.parse::<BlockSize>() {
        let bytes = size.bytes();
        assert!(bytes.is_power_of_two(), "Block size should be power of 2");
        assert!((MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&bytes));

        // Display output must parse back to the same size
        let reparsed: BlockSize = size.to_string().parse().expect("display should reparse");
        assert_eq!(reparsed, size);
    }

    let _ = parse_block_sizes(data);

    let multi_input = format!("{},{}", data, data);
    let _ = parse_block_sizes(&multi_input);

    for suffix in ["", "b", "k", "K", "m", "M", "kb", "MB"] {
        let test_input = format!("{}{}", data.trim(), suffix);
        let _ = test_input.parse::<BlockSize>();
    }
});
