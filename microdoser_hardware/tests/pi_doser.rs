#![cfg(all(feature = "hardware", target_os = "linux"))]

use std::time::Duration;

use microdoser_hardware::pi_doser::{PiDoserParams, PiSolidDoser};
use microdoser_traits::{ManualClock, SolidDoser};

// NOTE: These tests need a Pi with a PCA9685 at 0x40 on the I2C bus. On any
// other machine open() fails, which is also asserted to be a clean error.

#[test]
fn open_reports_bus_errors_instead_of_panicking() {
    match PiSolidDoser::open_with_clock(PiDoserParams::default(), ManualClock::new()) {
        Ok(mut doser) => {
            doser.home().expect("home");
            doser.shutdown().expect("shutdown");
        }
        Err(e) => {
            let msg = e.to_string().to_lowercase();
            assert!(msg.contains("i2c") || msg.contains("gpio"), "{msg}");
        }
    }
}

#[test]
fn dispense_holds_for_duration() {
    let clock = ManualClock::new();
    let Ok(mut doser) = PiSolidDoser::open_with_clock(PiDoserParams::default(), clock.clone())
    else {
        return;
    };
    let before = clock.elapsed();
    doser
        .dispense(Duration::from_millis(300), Some(20.0))
        .expect("dispense");
    assert!(clock.elapsed() - before >= Duration::from_millis(300));
}

#[test]
fn zero_frequency_is_rejected() {
    let params = PiDoserParams {
        frequency: 0,
        ..PiDoserParams::default()
    };
    let err = PiSolidDoser::open_with_clock(params, ManualClock::new())
        .err()
        .expect("zero frequency must fail");
    assert!(err.to_string().contains("frequency"));
}
