//! Raspberry Pi solid doser: gate servo on a PCA9685 PWM board (I2C) and a
//! feed motor switched by one GPIO line.
use std::time::Duration;

use microdoser_traits::{Clock, DriverResult, MonotonicClock, SolidDoser};
use rppal::gpio::{Gpio, OutputPin};
use rppal::i2c::I2c;
use tracing::{debug, info};

use crate::error::{HwError, Result};

const MODE1: u8 = 0x00;
const PRESCALE: u8 = 0xFE;
const LED0_ON_L: u8 = 0x06;
const MODE1_SLEEP: u8 = 0x10;
const MODE1_AUTO_INC: u8 = 0x20;
const OSC_HZ: f64 = 25_000_000.0;

/// Servo pulse width range mapped onto 0..=180 degrees.
const PULSE_MIN_US: f64 = 500.0;
const PULSE_MAX_US: f64 = 2500.0;

/// Wiring and PWM parameters for the Pi doser.
#[derive(Debug, Clone, Copy)]
pub struct PiDoserParams {
    pub i2c_address: u8,
    pub motor_gpio_pin: u8,
    /// PWM frequency in Hz (50 for hobby servos)
    pub frequency: u32,
    /// PCA9685 channel driving the gate servo
    pub gate_channel: u8,
    /// Gate angle used when dispense() gets no explicit position
    pub open_deg: f64,
    pub closed_deg: f64,
}

impl Default for PiDoserParams {
    fn default() -> Self {
        Self {
            i2c_address: 0x40,
            motor_gpio_pin: 17,
            frequency: 50,
            gate_channel: 0,
            open_deg: 35.0,
            closed_deg: 0.0,
        }
    }
}

pub struct PiSolidDoser<C: Clock = MonotonicClock> {
    i2c: I2c,
    motor: OutputPin,
    params: PiDoserParams,
    clock: C,
}

impl PiSolidDoser<MonotonicClock> {
    pub fn open(params: PiDoserParams) -> Result<Self> {
        Self::open_with_clock(params, MonotonicClock::new())
    }
}

impl<C: Clock> PiSolidDoser<C> {
    pub fn open_with_clock(params: PiDoserParams, clock: C) -> Result<Self> {
        if params.frequency == 0 {
            return Err(HwError::Fault("pwm frequency must be > 0".into()));
        }
        let mut i2c = I2c::new().map_err(|e| HwError::I2c(e.to_string()))?;
        i2c.set_slave_address(u16::from(params.i2c_address))
            .map_err(|e| HwError::I2c(e.to_string()))?;
        let motor = Gpio::new()
            .and_then(|g| g.get(params.motor_gpio_pin))
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output_low();

        let mut doser = Self {
            i2c,
            motor,
            params,
            clock,
        };
        doser.init_pwm()?;
        info!(
            addr = params.i2c_address,
            motor_pin = params.motor_gpio_pin,
            hz = params.frequency,
            "pi doser ready"
        );
        Ok(doser)
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<()> {
        self.i2c
            .smbus_write_byte(reg, value)
            .map_err(|e| HwError::I2c(e.to_string()))
    }

    fn init_pwm(&mut self) -> Result<()> {
        let prescale = (OSC_HZ / (4096.0 * f64::from(self.params.frequency))).round() - 1.0;
        let prescale = prescale.clamp(3.0, 255.0) as u8;
        // Prescale can only be written while the oscillator sleeps.
        self.write_reg(MODE1, MODE1_SLEEP)?;
        self.write_reg(PRESCALE, prescale)?;
        self.write_reg(MODE1, MODE1_AUTO_INC)?;
        self.clock.sleep(Duration::from_millis(5));
        Ok(())
    }

    fn set_gate(&mut self, degrees: f64) -> Result<()> {
        let deg = degrees.clamp(0.0, 180.0);
        let pulse_us = PULSE_MIN_US + (PULSE_MAX_US - PULSE_MIN_US) * deg / 180.0;
        let period_us = 1_000_000.0 / f64::from(self.params.frequency);
        let off = ((pulse_us / period_us) * 4096.0).round().clamp(0.0, 4095.0) as u16;
        let reg = LED0_ON_L + 4 * self.params.gate_channel;
        debug!(deg, off, "gate servo");
        self.i2c
            .block_write(reg, &[0, 0, (off & 0xFF) as u8, (off >> 8) as u8])
            .map_err(|e| HwError::I2c(e.to_string()))
    }
}

impl<C: Clock> SolidDoser for PiSolidDoser<C> {
    fn home(&mut self) -> DriverResult<()> {
        self.motor.set_low();
        self.set_gate(self.params.closed_deg)?;
        Ok(())
    }

    fn dispense(&mut self, duration: Duration, gate_position: Option<f64>) -> DriverResult<()> {
        let gate = gate_position.unwrap_or(self.params.open_deg);
        self.set_gate(gate)?;
        self.motor.set_high();
        self.clock.sleep(duration);
        self.motor.set_low();
        self.set_gate(self.params.closed_deg)?;
        Ok(())
    }

    fn shutdown(&mut self) -> DriverResult<()> {
        self.motor.set_low();
        self.set_gate(self.params.closed_deg)?;
        self.write_reg(MODE1, MODE1_SLEEP)?;
        Ok(())
    }
}
