#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlnest::parser::{parse_bytes, ParseOptions};

fuzz_target!(|data: &[u8]| {
    // Encoding detection plus parsing should never panic
    let _ = parse_bytes(data, &ParseOptions::default());
    let _ = parse_bytes(data, &ParseOptions::default().no_blanks(true).max_depth(16));
});
