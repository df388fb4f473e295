#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use sshlens::parser::LogParser;

static PARSER: OnceLock<LogParser> = OnceLock::new();

fuzz_target!(|data: &[u8]| {
    // Convert arbitrary bytes to UTF-8 string (lossy inputs are skipped)
    if let Ok(input) = std::str::from_utf8(data) {
        // Parsing must never panic regardless of input; malformed lines
        // and rows are skipped, not errors
        let parser = PARSER.get_or_init(LogParser::new);
        let _ = parser.parse_line(input);
        let _ = parser.parse_csv(input);
    }
});
