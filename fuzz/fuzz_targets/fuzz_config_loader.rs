#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = microdoser_config::load_toml(data) {
        let _ = cfg.validate();
        let _ = microdoser_core::DosingCfg::try_from(&cfg);
    }
    if let Ok(file) = toml::from_str::<microdoser_config::FlowCalibrationFile>(data) {
        let _ = file.validate();
        let _ = microdoser_core::FlowRate::try_from(&file);
    }
});
