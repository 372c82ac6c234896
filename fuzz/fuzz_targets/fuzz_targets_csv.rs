#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(rows) = microdoser_config::read_targets_csv(data) {
        for row in rows {
            // Target validation happens in the station, but well ids must survive parsing.
            let _ = microdoser_core::Well::parse(&row.well);
        }
    }
});
