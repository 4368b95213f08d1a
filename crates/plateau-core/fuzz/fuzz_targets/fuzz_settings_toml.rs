//! Fuzz test for settings TOML parsing
//!
//! Tests that settings deserialization handles arbitrary TOML safely.

#![no_main]

use libfuzzer_sys::fuzz_target;

use plateau_core::Settings;

fuzz_target!(|data: &str| {
    if let Ok(settings) = Settings::from_toml(data) {
        // Should be able to serialize without panicking
        let _ = toml::to_string_pretty(&settings);

        // Conversion never panics; validation decides usability
        let _ = settings.to_config().validate();
    }

    // Test with table wrappers (how they appear in full config)
    for section in ["steady_state", "fio", "array", "output"] {
        let wrapped = format!("[{}]\n{}", section, data);
        if let Ok(settings) = Settings::from_toml(&wrapped) {
            let _ = settings.to_config().validate();
        }
    }
});
