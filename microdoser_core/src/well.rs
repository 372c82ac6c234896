//! Well identifiers ("A1", "H12") and microplate formats.

use std::fmt;
use std::str::FromStr;

use crate::error::DoserError;

/// Standard microplate layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlateFormat {
    /// 8 rows (A–H) × 12 columns
    #[default]
    Well96,
    /// 16 rows (A–P) × 24 columns
    Well384,
}

impl PlateFormat {
    pub fn rows(self) -> u8 {
        match self {
            PlateFormat::Well96 => 8,
            PlateFormat::Well384 => 16,
        }
    }

    pub fn cols(self) -> u32 {
        match self {
            PlateFormat::Well96 => 12,
            PlateFormat::Well384 => 24,
        }
    }

    pub fn well_count(self) -> u32 {
        u32::from(self.rows()) * self.cols()
    }
}

impl fmt::Display for PlateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-well", self.well_count())
    }
}

impl FromStr for PlateFormat {
    type Err = DoserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches("-well") {
            "96" => Ok(PlateFormat::Well96),
            "384" => Ok(PlateFormat::Well384),
            other => Err(DoserError::Config(format!(
                "unsupported plate format '{other}' (expected 96 or 384)"
            ))),
        }
    }
}

/// A parsed well position. Indices are zero-based; display is the usual
/// row letter + 1-based column ("B3" is row 1, column 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Well {
    row: u8,
    col: u32,
}

impl Well {
    /// Build from zero-based indices. `row` must be < 26 and the 1-based
    /// column must fit in a `u32`, as it does for anything `parse` accepts.
    pub fn new(row: u8, col: u32) -> Result<Self, DoserError> {
        if row >= 26 {
            return Err(DoserError::InvalidWellFormat(format!("row index {row}")));
        }
        if col == u32::MAX {
            return Err(DoserError::InvalidWellFormat(format!("column index {col}")));
        }
        Ok(Self { row, col })
    }

    /// Parse "A1"-style identifiers. The row letter is case-insensitive;
    /// the column must be a positive integer (leading zeros allowed).
    pub fn parse(s: &str) -> Result<Self, DoserError> {
        let bad = || DoserError::InvalidWellFormat(s.to_string());
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let letter = chars.next().ok_or_else(bad)?;
        if !letter.is_ascii_alphabetic() {
            return Err(bad());
        }
        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        let col_1based: u32 = digits.parse().map_err(|_| bad())?;
        if col_1based == 0 {
            return Err(bad());
        }
        let row = letter.to_ascii_uppercase() as u8 - b'A';
        Ok(Self {
            row,
            col: col_1based - 1,
        })
    }

    #[inline]
    pub fn row_index(self) -> u8 {
        self.row
    }

    #[inline]
    pub fn col_index(self) -> u32 {
        self.col
    }

    pub fn row_letter(self) -> char {
        char::from(b'A' + self.row)
    }

    /// Whether this well exists on a plate of the given format.
    pub fn fits(self, format: PlateFormat) -> bool {
        self.row < format.rows() && self.col < format.cols()
    }
}

impl FromStr for Well {
    type Err = DoserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Well::parse(s)
    }
}

impl fmt::Display for Well {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row_letter(), self.col + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("A1", 0, 0)]
    #[case("b3", 1, 2)]
    #[case("H12", 7, 11)]
    #[case("P24", 15, 23)]
    #[case(" C05 ", 2, 4)]
    #[case("Z99", 25, 98)]
    fn parses_valid_wells(#[case] s: &str, #[case] row: u8, #[case] col: u32) {
        let w = Well::parse(s).unwrap();
        assert_eq!((w.row_index(), w.col_index()), (row, col));
    }

    #[rstest]
    #[case("")]
    #[case("A")]
    #[case("A0")]
    #[case("1A")]
    #[case("AA1")]
    #[case("A-1")]
    #[case("A1.5")]
    #[case("É1")]
    #[case("A99999999999")]
    fn rejects_malformed_wells(#[case] s: &str) {
        match Well::parse(s) {
            Err(DoserError::InvalidWellFormat(orig)) => assert_eq!(orig, s),
            other => panic!("expected InvalidWellFormat for {s:?}, got {other:?}"),
        }
    }

    #[test]
    fn display_normalizes_case() {
        assert_eq!(Well::parse("h7").unwrap().to_string(), "H7");
        assert_eq!(Well::new(1, 2).unwrap().to_string(), "B3");
    }

    #[test]
    fn largest_column_still_displays() {
        assert!(matches!(
            Well::new(0, u32::MAX),
            Err(DoserError::InvalidWellFormat(_))
        ));
        let last = Well::new(0, u32::MAX - 1).unwrap();
        assert_eq!(last.to_string(), format!("A{}", u32::MAX));
        assert_eq!(Well::parse(&last.to_string()).unwrap(), last);
    }

    #[test]
    fn format_bounds() {
        let h12 = Well::parse("H12").unwrap();
        let i1 = Well::parse("I1").unwrap();
        let a13 = Well::parse("A13").unwrap();
        assert!(h12.fits(PlateFormat::Well96));
        assert!(!i1.fits(PlateFormat::Well96));
        assert!(!a13.fits(PlateFormat::Well96));
        assert!(i1.fits(PlateFormat::Well384));
        assert!(!Well::parse("Q1").unwrap().fits(PlateFormat::Well384));
    }

    #[test]
    fn parses_formats() {
        assert_eq!("96".parse::<PlateFormat>().unwrap(), PlateFormat::Well96);
        assert_eq!(
            "384-well".parse::<PlateFormat>().unwrap(),
            PlateFormat::Well384
        );
        assert!("1536".parse::<PlateFormat>().is_err());
        assert_eq!(PlateFormat::Well384.to_string(), "384-well");
    }
}
