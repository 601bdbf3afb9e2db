//! GTIN (EAN-8, UPC-A, EAN-13, EAN-14) validation
//!
//! A GTIN is a string of 8, 12, 13 or 14 ASCII digits whose last digit is a
//! check digit computed from the others with alternating weights 3, 1, 3, …
//! starting on the digit immediately left of the check digit.
//!
//! ```
//! use honoua_common::gtin::{is_valid_gtin, check_digit};
//!
//! assert!(is_valid_gtin("5901234123457"));
//! assert!(!is_valid_gtin("5901234123458"));
//! assert!(!is_valid_gtin("123"));
//! assert_eq!(check_digit("590123412345"), Some(7));
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Accepted GTIN lengths
pub const GTIN_LENGTHS: [usize; 4] = [8, 12, 13, 14];

/// Barcode numbering scheme, identified by length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GtinKind {
    Ean8,
    UpcA,
    Ean13,
    Gtin14,
}

impl GtinKind {
    /// Kind for a digit string of the given length
    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            8 => Some(GtinKind::Ean8),
            12 => Some(GtinKind::UpcA),
            13 => Some(GtinKind::Ean13),
            14 => Some(GtinKind::Gtin14),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GtinKind::Ean8 => "EAN-8",
            GtinKind::UpcA => "UPC-A",
            GtinKind::Ean13 => "EAN-13",
            GtinKind::Gtin14 => "EAN-14",
        }
    }
}

impl fmt::Display for GtinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the check digit for `payload` (a GTIN without its final digit)
///
/// Returns `None` when `payload` is empty or contains anything but ASCII digits.
pub fn check_digit(payload: &str) -> Option<u8> {
    if payload.is_empty() || !payload.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let sum: u32 = payload
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            let weight = if i % 2 == 0 { 3 } else { 1 };
            digit * weight
        })
        .sum();

    Some(((10 - (sum % 10)) % 10) as u8)
}

/// True when `code` is an 8/12/13/14 digit string with a correct check digit
///
/// Never panics; any other input (wrong length, non-digits, whitespace,
/// non-ASCII) is simply invalid.
pub fn is_valid_gtin(code: &str) -> bool {
    let bytes = code.as_bytes();
    if !GTIN_LENGTHS.contains(&bytes.len()) || !bytes.iter().all(u8::is_ascii_digit) {
        return false;
    }

    let (payload, last) = code.split_at(code.len() - 1);
    let expected = match check_digit(payload) {
        Some(d) => d,
        None => return false,
    };

    last.as_bytes()[0] - b'0' == expected
}

/// A validated GTIN
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Gtin(String);

impl Gtin {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> GtinKind {
        // Length is checked on construction
        GtinKind::from_len(self.0.len()).unwrap_or(GtinKind::Ean13)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl FromStr for Gtin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if is_valid_gtin(trimmed) {
            Ok(Gtin(trimmed.to_string()))
        } else {
            Err(Error::InvalidInput(format!("not a valid GTIN: {:?}", s)))
        }
    }
}

impl fmt::Display for Gtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Gtin {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for Gtin {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Gtin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: [&str; 5] = [
        "96385074",       // EAN-8
        "036000291452",   // UPC-A
        "5901234123457",  // EAN-13
        "4006381333931",  // EAN-13
        "10012345678902", // EAN-14
    ];

    #[test]
    fn test_known_valid_codes() {
        for code in VALID {
            assert!(is_valid_gtin(code), "{} should be valid", code);
        }
    }

    #[test]
    fn test_altered_check_digit_rejected() {
        assert!(!is_valid_gtin("5901234123458"));
        assert!(!is_valid_gtin("96385075"));
    }

    #[test]
    fn test_any_single_digit_alteration_rejected() {
        // Weights 1 and 3 are both coprime with 10, so every single-digit
        // substitution changes the weighted sum modulo 10.
        for code in VALID {
            for pos in 0..code.len() {
                let original = code.as_bytes()[pos];
                for replacement in b'0'..=b'9' {
                    if replacement == original {
                        continue;
                    }
                    let mut altered = code.as_bytes().to_vec();
                    altered[pos] = replacement;
                    let altered = String::from_utf8(altered).unwrap();
                    assert!(!is_valid_gtin(&altered), "{} should be rejected", altered);
                }
            }
        }
    }

    #[test]
    fn test_wrong_lengths_rejected() {
        for code in ["", "1", "123", "1234567", "123456789", "12345678901", "123456789012345"] {
            assert!(!is_valid_gtin(code));
        }
    }

    #[test]
    fn test_non_digits_rejected() {
        assert!(!is_valid_gtin("590123412345A"));
        assert!(!is_valid_gtin(" 5901234123457"));
        assert!(!is_valid_gtin("5901234-23457"));
        // Non-ASCII digits (Arabic-Indic) of the right char count
        assert!(!is_valid_gtin("٥٩٠١٢٣٤١"));
        assert!(!is_valid_gtin("ééééé"));
    }

    #[test]
    fn test_check_digit() {
        assert_eq!(check_digit("590123412345"), Some(7));
        assert_eq!(check_digit("9638507"), Some(4));
        assert_eq!(check_digit("03600029145"), Some(2));
        assert_eq!(check_digit(""), None);
        assert_eq!(check_digit("12a"), None);
    }

    #[test]
    fn test_gtin_parse_and_kind() {
        let gtin: Gtin = " 5901234123457\n".parse().unwrap();
        assert_eq!(gtin.as_str(), "5901234123457");
        assert_eq!(gtin.kind(), GtinKind::Ean13);

        assert_eq!("96385074".parse::<Gtin>().unwrap().kind(), GtinKind::Ean8);
        assert_eq!("036000291452".parse::<Gtin>().unwrap().kind(), GtinKind::UpcA);
        assert_eq!("10012345678902".parse::<Gtin>().unwrap().kind(), GtinKind::Gtin14);

        assert!(matches!("123".parse::<Gtin>(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_gtin_serde_as_string() {
        let gtin: Gtin = "5901234123457".parse().unwrap();
        let json = serde_json::to_string(&gtin).unwrap();
        assert_eq!(json, "\"5901234123457\"");

        let back: Gtin = serde_json::from_str(&json).unwrap();
        assert_eq!(back, gtin);

        assert!(serde_json::from_str::<Gtin>("\"5901234123458\"").is_err());
    }
}
