#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlnest::parser::{parse_str_with_options, ParseOptions};
use xmlnest::serial::{render_to_string, SaveOptions};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let opts = ParseOptions::default();
        // Anything that parses and renders must parse again and render
        // identically. An unknown encoding label renders as empty.
        if let Ok(doc) = parse_str_with_options(s, &opts) {
            let output = render_to_string(&doc, &SaveOptions::default());
            if output.is_empty() {
                return;
            }
            let again = parse_str_with_options(&output, &opts).expect("rendered output must parse");
            assert_eq!(render_to_string(&again, &SaveOptions::default()), output);
        }
    }
});
