//! Fuzz target for oriented-polygon line parsing, including the
//! polygon-to-envelope reduction.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rslabel::ir::io_dota::fuzz_parse_dota_line;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };

    let _ = fuzz_parse_dota_line(line);
});
