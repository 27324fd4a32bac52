//! Conversions between linear identifiers, grid positions and ISBN-13 strings.

use crate::core::constants::{BASE_ISBN, ROW_WIDTH, TOTAL_IDENTIFIERS};
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Offset of a book identifier from [`BASE_ISBN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identifier(pub u64);

impl Identifier {
    pub fn new(offset: u64) -> Self {
        Self(offset)
    }

    pub fn offset(self) -> u64 {
        self.0
    }

    /// The 12-digit ISBN prefix (without check digit).
    pub fn isbn12(self) -> u64 {
        BASE_ISBN + self.0
    }

    /// Parse a 12-digit ISBN prefix.
    pub fn from_isbn12(isbn12: u64) -> Result<Self> {
        if isbn12 < BASE_ISBN || isbn12 - BASE_ISBN >= TOTAL_IDENTIFIERS {
            return Err(MapError::InvalidIdentifier(format!(
                "{isbn12} is outside the mapped ISBN range"
            )));
        }
        Ok(Self(isbn12 - BASE_ISBN))
    }

    /// Parse an ISBN-13 string, ignoring hyphens. The check digit is validated.
    pub fn from_isbn13(isbn13: &str) -> Result<Self> {
        let digits: String = isbn13.chars().filter(|c| *c != '-').collect();
        if digits.len() != 13 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MapError::InvalidIdentifier(format!(
                "'{isbn13}' is not a 13-digit ISBN"
            )));
        }
        let (prefix, check) = digits.split_at(12);
        if check_digit(prefix) != check.as_bytes()[0] - b'0' {
            return Err(MapError::InvalidIdentifier(format!(
                "'{isbn13}' has a bad check digit"
            )));
        }
        let isbn12 = prefix
            .parse::<u64>()
            .map_err(|e| MapError::InvalidIdentifier(e.to_string()))?;
        Self::from_isbn12(isbn12)
    }

    /// Canonical 13-character display form.
    pub fn isbn13(self) -> String {
        checksum(self)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.isbn13())
    }
}

/// Column/row of an identifier in the fixed-width address grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPosition {
    pub col: u64,
    pub row: u64,
}

impl GridPosition {
    pub fn new(col: u64, row: u64) -> Self {
        Self { col, row }
    }
}

pub fn to_grid(id: Identifier) -> GridPosition {
    GridPosition {
        col: id.0 % ROW_WIDTH,
        row: id.0 / ROW_WIDTH,
    }
}

pub fn to_identifier(pos: GridPosition) -> Identifier {
    assert!(pos.col < ROW_WIDTH, "column {} outside row width", pos.col);
    Identifier(pos.row * ROW_WIDTH + pos.col)
}

/// Weighted-digit check digit (weights 1,3,1,3,...) of a string of decimal digits.
pub fn check_digit(digits: &str) -> u8 {
    let sum: u32 = digits
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            assert!(b.is_ascii_digit(), "non-numeric ISBN digit in '{digits}'");
            let d = (b - b'0') as u32;
            if i % 2 == 0 {
                d
            } else {
                d * 3
            }
        })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

/// ISBN-13 display string of an identifier: its 12-digit prefix plus check digit.
pub fn checksum(id: Identifier) -> String {
    let isbn12 = id.isbn12().to_string();
    let digit = check_digit(&isbn12);
    format!("{isbn12}{digit}")
}

/// Extend a registration-group prefix such as `"978-0"` to 12 digits with `fill`.
pub fn pad_prefix(prefix: &str, fill: char) -> u64 {
    let mut digits: String = prefix.chars().filter(|c| c.is_ascii_digit()).collect();
    while digits.len() < 12 {
        digits.push(fill);
    }
    digits.truncate(12);
    digits.parse().unwrap_or(BASE_ISBN)
}

/// Half-open identifier range covered by a registration-group prefix.
pub fn prefix_range(prefix: &str) -> Result<(Identifier, Identifier)> {
    let start = Identifier::from_isbn12(pad_prefix(prefix, '0'))?;
    let last = Identifier::from_isbn12(pad_prefix(prefix, '9'))?;
    Ok((start, Identifier(last.0 + 1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_round_trip() {
        for offset in [0, 1, 49_999, 50_000, 50_001, 123_456_789, TOTAL_IDENTIFIERS - 1] {
            let id = Identifier(offset);
            assert_eq!(to_identifier(to_grid(id)), id);
        }
    }

    #[test]
    fn test_second_row_starts_at_row_width() {
        assert_eq!(to_grid(Identifier(50_000)), GridPosition::new(0, 1));
    }

    #[test]
    fn test_checksum_of_base() {
        // 9*1 + 7*3 + 8*1 = 38, (10 - 8) % 10 = 2
        assert_eq!(check_digit("978000000000"), 2);
        assert_eq!(checksum(Identifier(0)), "9780000000002");
    }

    #[test]
    fn test_checksum_weighted_sum_is_multiple_of_ten() {
        for offset in [0u64, 7, 1_234_567, 99_999_999, 1_500_000_000] {
            let isbn13 = checksum(Identifier(offset));
            assert_eq!(isbn13.len(), 13);
            let sum: u32 = isbn13
                .bytes()
                .enumerate()
                .map(|(i, b)| {
                    let d = (b - b'0') as u32;
                    if i % 2 == 0 { d } else { d * 3 }
                })
                .sum();
            assert_eq!(sum % 10, 0, "{isbn13}");
        }
    }

    #[test]
    fn test_known_isbn() {
        // The Rust Programming Language, 2nd ed.
        let id = Identifier::from_isbn13("978-1-7185-0310-6").unwrap();
        assert_eq!(id.isbn13(), "9781718503106");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Identifier::from_isbn13("9781718503107").is_err());
        assert!(Identifier::from_isbn13("97817185031").is_err());
        assert!(Identifier::from_isbn13("977000000000X").is_err());
        assert!(Identifier::from_isbn12(977_999_999_999).is_err());
    }

    #[test]
    fn test_prefix_range() {
        let (start, end) = prefix_range("978-0").unwrap();
        assert_eq!(start, Identifier(0));
        assert_eq!(end, Identifier(100_000_000));

        let (start, end) = prefix_range("979-10").unwrap();
        assert_eq!(start, Identifier(1_100_000_000));
        assert_eq!(end, Identifier(1_110_000_000));
    }
}
