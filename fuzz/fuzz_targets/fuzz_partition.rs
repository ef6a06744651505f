#![no_main]

use e2carve_core::layout::MasterBootRecord;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(mbr) = MasterBootRecord::parse(data) {
        let entry = mbr.first_partition;
        let _ = entry.byte_offset();
        let _ = entry.byte_len();
        let _ = mbr.has_boot_signature();
    }
});
