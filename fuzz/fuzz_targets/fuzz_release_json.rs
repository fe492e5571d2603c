#![no_main]

use libfuzzer_sys::fuzz_target;
use quicklaunch::update::source::parse_release;
use quicklaunch::update::verify::parse_checksum;

fuzz_target!(|data: &[u8]| {
    // Release API responses and checksum files come from the network; parsing
    // must never panic, whatever they contain
    if let Ok(s) = std::str::from_utf8(data) {
        let _release = parse_release(s);
        let _digest = parse_checksum(s, "quicklaunch-linux-x86_64");
    }
});
