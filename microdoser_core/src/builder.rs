//! Type-state builder for `Station`.
//!
//! Balance and plate loader must be provided before `build()` is available.
//! `try_build()` is always available for dynamic checks.

use std::marker::PhantomData;

use microdoser_traits::{Balance, HardwareAvailable, OperatorPrompt, PlateLoader};
use tracing::info;

use crate::dosing::DosingSystem;
use crate::error::{BuildError, Result};
use crate::mocks::NoOperator;
use crate::station::Station;

pub const DEFAULT_PLATE_TYPE: &str = "shallow_plate";

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Station`.
pub struct StationBuilder<B, L> {
    balance: Option<Box<dyn Balance>>,
    loader: Option<Box<dyn PlateLoader>>,
    dosing: Option<Box<dyn DosingSystem>>,
    prompt: Option<Box<dyn OperatorPrompt>>,
    hardware: HardwareAvailable,
    plate_type: Option<String>,
    _b: PhantomData<B>,
    _l: PhantomData<L>,
}

impl Default for StationBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            balance: None,
            loader: None,
            dosing: None,
            prompt: None,
            hardware: HardwareAvailable::default(),
            plate_type: None,
            _b: PhantomData,
            _l: PhantomData,
        }
    }
}

impl<B, L> StationBuilder<B, L> {
    /// Fallible build available in any type-state; reports the missing piece.
    pub fn try_build(self) -> Result<Station> {
        let balance = self
            .balance
            .ok_or_else(|| eyre::Report::new(BuildError::MissingBalance))?;
        let loader = self
            .loader
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLoader))?;
        let plate_type = self
            .plate_type
            .unwrap_or_else(|| DEFAULT_PLATE_TYPE.to_string());
        if plate_type.trim().is_empty() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "plate type must not be empty",
            )));
        }

        info!(
            plate_type = %plate_type,
            dosing = self.dosing.as_ref().map(|d| d.name()).unwrap_or("none"),
            hardware = self.hardware.get(),
            "station assembled"
        );
        Ok(Station {
            balance,
            loader,
            dosing: self.dosing,
            prompt: self.prompt.unwrap_or_else(|| Box::new(NoOperator)),
            hardware: self.hardware,
            plate_type,
            plate_loaded: false,
            shut_down: false,
        })
    }
}

/// Chainable setters that do not affect type-state.
impl<B, L> StationBuilder<B, L> {
    pub fn with_dosing_system(mut self, dosing: impl DosingSystem + 'static) -> Self {
        self.dosing = Some(Box::new(dosing));
        self
    }

    /// Attach an already-boxed dosing system, or none for a weighing-only station.
    pub fn with_optional_dosing_system(mut self, dosing: Option<Box<dyn DosingSystem>>) -> Self {
        self.dosing = dosing;
        self
    }

    /// Who confirms positioning when there is no dosing system. Defaults to
    /// an operator that always declines.
    pub fn with_prompt(mut self, prompt: impl OperatorPrompt + 'static) -> Self {
        self.prompt = Some(Box::new(prompt));
        self
    }

    pub fn with_hardware(mut self, hardware: HardwareAvailable) -> Self {
        self.hardware = hardware;
        self
    }

    pub fn with_plate_type(mut self, plate_type: impl Into<String>) -> Self {
        self.plate_type = Some(plate_type.into());
        self
    }
}

// Setters that advance type-state
impl<L> StationBuilder<Missing, L> {
    pub fn with_balance(self, balance: impl Balance + 'static) -> StationBuilder<Set, L> {
        StationBuilder {
            balance: Some(Box::new(balance)),
            loader: self.loader,
            dosing: self.dosing,
            prompt: self.prompt,
            hardware: self.hardware,
            plate_type: self.plate_type,
            _b: PhantomData,
            _l: PhantomData,
        }
    }
}

impl<B> StationBuilder<B, Missing> {
    pub fn with_loader(self, loader: impl PlateLoader + 'static) -> StationBuilder<B, Set> {
        StationBuilder {
            balance: self.balance,
            loader: Some(Box::new(loader)),
            dosing: self.dosing,
            prompt: self.prompt,
            hardware: self.hardware,
            plate_type: self.plate_type,
            _b: PhantomData,
            _l: PhantomData,
        }
    }
}

impl StationBuilder<Set, Set> {
    /// Build once both drivers are present.
    pub fn build(self) -> Result<Station> {
        self.try_build()
    }
}
