#![no_main]

use e2carve_core::layout::Superblock;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(sb) = Superblock::parse(data) {
        let _ = sb.block_size();
        let _ = sb.is_magic_valid();
    }
});
