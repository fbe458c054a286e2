#![no_main]

use libfuzzer_sys::fuzz_target;
use vatio::power::{parse_line, EnvironmentLog};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        for (i, line) in input.lines().enumerate() {
            let _ = parse_line(line, i + 1, 1e9);
        }

        // A log that parses must yield a timeline whose average is computable
        if let Ok(log) = EnvironmentLog::from_reader(input.as_bytes(), 1e9) {
            let _ = log.timeline().time_weighted_average();
        }
    }
});
