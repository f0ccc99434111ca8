//! Validated ISBN identifiers.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::AlexandriaError;

/// A validated, normalized ISBN-10 or ISBN-13.
///
/// Construction goes through [`Isbn::parse`], which strips separators,
/// uppercases, and verifies the checksum, so a value of this type is
/// always safe to hand to providers and the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Isbn(String);

impl Isbn {
    /// Parse and validate a raw ISBN string.
    ///
    /// Normalization strips everything that is not a letter or digit and
    /// uppercases the remainder. A terminal `X` is accepted only as the
    /// ISBN-10 check character.
    ///
    /// # Errors
    /// Returns `InvalidArg` for wrong lengths, stray letters, or checksum
    /// failures.
    pub fn parse(raw: &str) -> Result<Self, AlexandriaError> {
        let normalized: String = raw
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match normalized.len() {
            10 => {
                if !Self::checksum10(&normalized) {
                    return Err(AlexandriaError::InvalidArg(format!(
                        "invalid ISBN-10 checksum: {raw}"
                    )));
                }
            }
            13 => {
                if !Self::checksum13(&normalized) {
                    return Err(AlexandriaError::InvalidArg(format!(
                        "invalid ISBN-13 checksum: {raw}"
                    )));
                }
            }
            n => {
                return Err(AlexandriaError::InvalidArg(format!(
                    "ISBN must normalize to 10 or 13 characters, got {n}: {raw}"
                )));
            }
        }

        Ok(Self(normalized))
    }

    /// The normalized string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a 10-character ISBN.
    #[must_use]
    pub fn is_isbn10(&self) -> bool {
        self.0.len() == 10
    }

    /// Whether this is a 13-character ISBN.
    #[must_use]
    pub fn is_isbn13(&self) -> bool {
        self.0.len() == 13
    }

    /// Lossless upgrade to ISBN-13.
    ///
    /// ISBN-13 values pass through unchanged; ISBN-10 values gain the
    /// `978` prefix and a recomputed check digit.
    #[must_use]
    pub fn to_isbn13(&self) -> Self {
        if self.is_isbn13() {
            return self.clone();
        }
        let mut digits = String::with_capacity(13);
        digits.push_str("978");
        digits.push_str(&self.0[..9]);
        let sum: u32 = digits
            .bytes()
            .enumerate()
            .map(|(i, b)| {
                let d = u32::from(b - b'0');
                if i % 2 == 0 { d } else { d * 3 }
            })
            .sum();
        let check = (10 - (sum % 10)) % 10;
        digits.push(char::from(b'0' + u8::try_from(check).unwrap_or(0)));
        Self(digits)
    }

    // Weighted sum 10..1 over digits (X = 10 in final position), mod 11.
    fn checksum10(s: &str) -> bool {
        let mut sum: u32 = 0;
        for (i, c) in s.chars().enumerate() {
            let value = match c {
                '0'..='9' => c as u32 - '0' as u32,
                'X' if i == 9 => 10,
                _ => return false,
            };
            sum += value * (10 - u32::try_from(i).unwrap_or(0));
        }
        sum % 11 == 0
    }

    // Alternating 1/3 weights, mod 10.
    fn checksum13(s: &str) -> bool {
        let mut sum: u32 = 0;
        for (i, c) in s.chars().enumerate() {
            let Some(d) = c.to_digit(10) else {
                return false;
            };
            sum += if i % 2 == 0 { d } else { d * 3 };
        }
        sum % 10 == 0
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Isbn {
    type Error = AlexandriaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Isbn> for String {
    fn from(isbn: Isbn) -> Self {
        isbn.0
    }
}

impl AsRef<str> for Isbn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_hyphenated_isbn13() {
        let isbn = Isbn::parse("978-0-439-06487-3").unwrap();
        assert_eq!(isbn.as_str(), "9780439064873");
        assert!(isbn.is_isbn13());
    }

    #[test]
    fn accepts_isbn10_with_x_check() {
        let isbn = Isbn::parse("043965548X").unwrap();
        assert!(isbn.is_isbn10());
    }

    #[test]
    fn rejects_bad_checksums() {
        assert!(Isbn::parse("9780439064874").is_err());
        assert!(Isbn::parse("0439655481").is_err());
    }

    #[test]
    fn rejects_embedded_letters() {
        assert!(Isbn::parse("97804390648AB").is_err());
        assert!(Isbn::parse("04396X548X").is_err());
    }

    #[test]
    fn upgrades_isbn10() {
        let ten = Isbn::parse("0439064872").unwrap();
        assert_eq!(ten.to_isbn13().as_str(), "9780439064873");
    }

    #[test]
    fn upgrade_is_stable_on_isbn13() {
        let thirteen = Isbn::parse("9780439064873").unwrap();
        assert_eq!(thirteen.to_isbn13(), thirteen);
    }
}
