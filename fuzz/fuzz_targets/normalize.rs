#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    apidiff_fuzz::fuzz_normalize(data);
});
