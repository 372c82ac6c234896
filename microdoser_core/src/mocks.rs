//! Operator prompts that need no terminal.

use microdoser_traits::{DriverResult, OperatorPrompt};

/// Confirms every positioning request immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

impl OperatorPrompt for AutoConfirm {
    fn confirm_position(&mut self, _well: &str) -> DriverResult<()> {
        Ok(())
    }
}

/// No operator present; every positioning request fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOperator;

impl OperatorPrompt for NoOperator {
    fn confirm_position(&mut self, well: &str) -> DriverResult<()> {
        Err(format!("no operator available to position over {well}").into())
    }
}
