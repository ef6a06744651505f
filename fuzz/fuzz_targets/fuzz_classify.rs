#![no_main]

use e2carve_core::classify;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let block_count = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let predecessor = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let block = &data[8..];

    let loose = classify(block, block_count, None);
    let strict = classify(block, block_count, Some(predecessor));
    assert_eq!(loose, classify(block, block_count, None));
    // The predecessor check can only reject.
    if strict.is_some() {
        assert!(loose.is_some());
    }
});
