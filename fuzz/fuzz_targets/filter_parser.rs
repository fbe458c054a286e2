#![no_main]

use libfuzzer_sys::fuzz_target;
use vatio::filter::FunctionFilter;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Invalid patterns are errors, never panics
        if let Ok(filter) = FunctionFilter::from_expr(input) {
            let _ = filter.matches_name(input);
        }
    }
});
