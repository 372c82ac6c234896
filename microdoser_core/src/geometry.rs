//! Well-to-machine-coordinate mapping.

use crate::error::DoserError;
use crate::well::{PlateFormat, Well};

/// Default center-to-center pitch of a 96-well plate (mm).
pub const DEFAULT_WELL_SPACING_MM: f64 = 9.0;

/// Plate placement on the CNC bed: position of well A1 and a uniform pitch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlateGeometry {
    origin_mm: (f64, f64),
    spacing_mm: f64,
    strict_bounds: bool,
}

impl Default for PlateGeometry {
    fn default() -> Self {
        Self {
            origin_mm: (0.0, 0.0),
            spacing_mm: DEFAULT_WELL_SPACING_MM,
            strict_bounds: false,
        }
    }
}

impl PlateGeometry {
    pub fn new(origin_mm: (f64, f64), spacing_mm: f64) -> Result<Self, DoserError> {
        if !(spacing_mm.is_finite() && spacing_mm > 0.0) {
            return Err(DoserError::Config(format!(
                "well spacing must be > 0 mm, got {spacing_mm}"
            )));
        }
        if !(origin_mm.0.is_finite() && origin_mm.1.is_finite()) {
            return Err(DoserError::Config("plate origin must be finite".into()));
        }
        Ok(Self {
            origin_mm,
            spacing_mm,
            strict_bounds: false,
        })
    }

    /// Reject wells that do not exist on the declared plate format.
    pub fn with_strict_bounds(mut self, strict: bool) -> Self {
        self.strict_bounds = strict;
        self
    }

    pub fn origin_mm(&self) -> (f64, f64) {
        self.origin_mm
    }

    pub fn spacing_mm(&self) -> f64 {
        self.spacing_mm
    }

    pub fn strict_bounds(&self) -> bool {
        self.strict_bounds
    }

    /// x = x0 + col * spacing, y = y0 + row * spacing (zero-based indices).
    pub fn coords_of(&self, well: Well) -> (f64, f64) {
        let x = self.origin_mm.0 + f64::from(well.col_index()) * self.spacing_mm;
        let y = self.origin_mm.1 + f64::from(well.row_index()) * self.spacing_mm;
        (x, y)
    }

    /// Parse `well` and map it to XY in mm.
    ///
    /// `format` is only enforced with strict bounds; otherwise wells beyond
    /// the plate still map to (off-plate) coordinates.
    pub fn well_to_coords(&self, well: &str, format: PlateFormat) -> Result<(f64, f64), DoserError> {
        let parsed = Well::parse(well)?;
        if self.strict_bounds && !parsed.fits(format) {
            return Err(DoserError::WellOutOfRange {
                well: parsed.to_string(),
                format,
            });
        }
        Ok(self.coords_of(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("A1", (0.0, 0.0))]
    #[case("B3", (18.0, 9.0))]
    #[case("H12", (99.0, 63.0))]
    #[case("a2", (9.0, 0.0))]
    fn default_geometry(#[case] well: &str, #[case] expected: (f64, f64)) {
        let g = PlateGeometry::default();
        assert_eq!(g.well_to_coords(well, PlateFormat::Well96).unwrap(), expected);
    }

    #[test]
    fn offset_origin_and_pitch() {
        let g = PlateGeometry::new((14.38, 11.24), 4.5).unwrap();
        let (x, y) = g.well_to_coords("C4", PlateFormat::Well384).unwrap();
        assert!((x - (14.38 + 3.0 * 4.5)).abs() < 1e-9);
        assert!((y - (11.24 + 2.0 * 4.5)).abs() < 1e-9);
    }

    #[rstest]
    #[case(0.0)]
    #[case(-9.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn rejects_bad_spacing(#[case] spacing: f64) {
        assert!(matches!(
            PlateGeometry::new((0.0, 0.0), spacing),
            Err(DoserError::Config(_))
        ));
    }

    #[test]
    fn out_of_range_is_allowed_unless_strict() {
        let lax = PlateGeometry::default();
        assert_eq!(
            lax.well_to_coords("Z30", PlateFormat::Well96).unwrap(),
            (29.0 * 9.0, 25.0 * 9.0)
        );

        let strict = lax.with_strict_bounds(true);
        match strict.well_to_coords("I1", PlateFormat::Well96) {
            Err(DoserError::WellOutOfRange { well, format }) => {
                assert_eq!(well, "I1");
                assert_eq!(format, PlateFormat::Well96);
            }
            other => panic!("expected WellOutOfRange, got {other:?}"),
        }
        assert!(strict.well_to_coords("I1", PlateFormat::Well384).is_ok());
    }

    #[test]
    fn malformed_well_is_reported() {
        let g = PlateGeometry::default();
        assert!(matches!(
            g.well_to_coords("11", PlateFormat::Well96),
            Err(DoserError::InvalidWellFormat(_))
        ));
    }

    proptest! {
        #[test]
        fn matches_affine_formula(
            row in 0u8..26,
            col in 1u32..=48,
            x0 in -200.0f64..200.0,
            y0 in -200.0f64..200.0,
            spacing in 0.5f64..20.0,
        ) {
            let g = PlateGeometry::new((x0, y0), spacing).unwrap();
            let id = format!("{}{}", char::from(b'A' + row), col);
            let (x, y) = g.well_to_coords(&id, PlateFormat::Well96).unwrap();
            prop_assert!((x - (x0 + f64::from(col - 1) * spacing)).abs() < 1e-9);
            prop_assert!((y - (y0 + f64::from(row) * spacing)).abs() < 1e-9);
        }
    }
}
