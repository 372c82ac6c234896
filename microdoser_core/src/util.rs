//! Unit helpers shared by the orchestrators.

/// Milligrams per gram.
pub const MG_PER_G: f64 = 1_000.0;

/// Verification errors at or above this magnitude (percent) get flagged.
pub const ACCEPTABLE_ERROR_PCT: f64 = 10.0;

/// Balance readings come in grams; results are reported in milligrams.
#[inline]
pub fn grams_to_mg(g: f64) -> f64 {
    g * MG_PER_G
}

/// `error_mg / target_mg * 100`. Targets are validated > 0 before dosing,
/// so a zero target only reaches here from external callers; it yields 0.
#[inline]
pub fn error_pct(error_mg: f64, target_mg: f64) -> f64 {
    if target_mg == 0.0 {
        return 0.0;
    }
    error_mg / target_mg * 100.0
}
