//! Fuzz target for the settings parser.
//!
//! This target feeds arbitrary TOML strings to the settings parser
//! to find crashes and panics.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_settings_parser
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use sieve_filters::Settings;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // The parser should never panic, only return errors
        let _ = Settings::from_toml(input);
    }
});
