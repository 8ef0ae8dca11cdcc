//! Settlement period keys
//!
//! Settlement windows are identified by canonical string keys:
//! - Weekly: `YYYY-Www` (ISO week, zero-padded, 01..=53)
//! - Quarterly: `YYYY-Qn` (1..=4)
//!
//! Every ledger entry, settlement, and summary is tagged with exactly one
//! period key. Carry-forward volume is tagged with the *following* key.
//!
//! # Critical Invariants
//!
//! 1. Parsing is strict: anything that does not match the canonical format
//!    is rejected (`InvalidPeriodKey` at the settlement boundary)
//! 2. `next()` is total: every valid key has a well-defined successor
//! 3. Keys are plain data - ordering and equality are string/field based,
//!    never wall-clock based

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settlement window granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    /// One ISO week (`YYYY-Www`)
    Weekly,
    /// One calendar quarter (`YYYY-Qn`)
    Quarterly,
}

/// Errors from period key parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodKeyError {
    #[error("Malformed period key: {key}")]
    Malformed { key: String },

    #[error("Period index out of range in key: {key}")]
    OutOfRange { key: String },
}

/// Canonical identifier for a settlement window
///
/// # Example
/// ```
/// use commission_engine_rs::core::period::{Granularity, PeriodKey};
///
/// let week = PeriodKey::parse("2026-W07").unwrap();
/// assert_eq!(week.granularity(), Granularity::Weekly);
/// assert_eq!(week.next().as_str(), "2026-W08");
///
/// let quarter = PeriodKey::parse("2026-Q4").unwrap();
/// assert_eq!(quarter.next().as_str(), "2027-Q1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodKey {
    raw: String,
    year: u16,
    granularity: Granularity,
    index: u8,
}

impl PeriodKey {
    /// Parse a canonical period key string
    ///
    /// # Returns
    /// - `Ok(PeriodKey)` for `YYYY-Www` (week 01..=53) or `YYYY-Qn` (1..=4)
    /// - `Err(PeriodKeyError)` for anything else
    pub fn parse(key: &str) -> Result<Self, PeriodKeyError> {
        let malformed = || PeriodKeyError::Malformed {
            key: key.to_string(),
        };

        let bytes = key.as_bytes();
        if bytes.len() < 7 || bytes[4] != b'-' {
            return Err(malformed());
        }

        let year: u16 = key[0..4].parse().map_err(|_| malformed())?;

        match bytes[5] {
            b'W' => {
                // Exactly two zero-padded digits
                if bytes.len() != 8 {
                    return Err(malformed());
                }
                let index: u8 = key[6..8].parse().map_err(|_| malformed())?;
                if !key[6..8].bytes().all(|b| b.is_ascii_digit()) {
                    return Err(malformed());
                }
                if !(1..=53).contains(&index) {
                    return Err(PeriodKeyError::OutOfRange {
                        key: key.to_string(),
                    });
                }
                Ok(Self {
                    raw: key.to_string(),
                    year,
                    granularity: Granularity::Weekly,
                    index,
                })
            }
            b'Q' => {
                if bytes.len() != 7 || !bytes[6].is_ascii_digit() {
                    return Err(malformed());
                }
                let index: u8 = key[6..7].parse().map_err(|_| malformed())?;
                if !(1..=4).contains(&index) {
                    return Err(PeriodKeyError::OutOfRange {
                        key: key.to_string(),
                    });
                }
                Ok(Self {
                    raw: key.to_string(),
                    year,
                    granularity: Granularity::Quarterly,
                    index,
                })
            }
            _ => Err(malformed()),
        }
    }

    /// Build a weekly key from parts (week is clamped to the valid range by the caller)
    pub fn weekly(year: u16, week: u8) -> Self {
        let raw = format!("{:04}-W{:02}", year, week);
        Self::parse(&raw).expect("weekly key parts must be in range")
    }

    /// Build a quarterly key from parts
    pub fn quarterly(year: u16, quarter: u8) -> Self {
        let raw = format!("{:04}-Q{}", year, quarter);
        Self::parse(&raw).expect("quarterly key parts must be in range")
    }

    /// Canonical string form
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    /// Week number (weekly keys) or quarter number (quarterly keys)
    pub fn index(&self) -> u8 {
        self.index
    }

    /// The following settlement window
    ///
    /// Weekly keys roll to W01 of the next year after W52 (or after W53 for
    /// keys explicitly tagged with a 53rd week). Quarterly keys roll Q4 -> Q1.
    pub fn next(&self) -> Self {
        match self.granularity {
            Granularity::Weekly => {
                if self.index >= 52 {
                    Self::weekly(self.year + 1, 1)
                } else {
                    Self::weekly(self.year, self.index + 1)
                }
            }
            Granularity::Quarterly => {
                if self.index == 4 {
                    Self::quarterly(self.year + 1, 1)
                } else {
                    Self::quarterly(self.year, self.index + 1)
                }
            }
        }
    }

    /// The quarter containing a weekly key
    ///
    /// Weeks 1-13 map to Q1, 14-26 to Q2, 27-39 to Q3, 40+ to Q4.
    /// Returns `self` unchanged for quarterly keys.
    pub fn quarter(&self) -> Self {
        match self.granularity {
            Granularity::Quarterly => self.clone(),
            Granularity::Weekly => {
                let q = match self.index {
                    1..=13 => 1,
                    14..=26 => 2,
                    27..=39 => 3,
                    _ => 4,
                };
                Self::quarterly(self.year, q)
            }
        }
    }

    /// Chronological sort key: (year, starting ISO week)
    ///
    /// A quarter sorts at its first week, so a quarter and its first week
    /// compare equal; callers use this for same-or-earlier checks, not for
    /// total ordering across granularities.
    pub fn sort_key(&self) -> (u16, u8) {
        match self.granularity {
            Granularity::Weekly => (self.year, self.index),
            Granularity::Quarterly => (self.year, (self.index - 1) * 13 + 1),
        }
    }

    /// True if `self` starts in the same week as `other` or later
    pub fn starts_no_earlier_than(&self, other: &PeriodKey) -> bool {
        self.sort_key() >= other.sort_key()
    }

    /// All weekly keys belonging to a quarterly key
    ///
    /// Used by quarterly settlement to collect the weekly summaries that
    /// form its input set. Q4 includes week 53 for years that have one.
    pub fn weeks(&self) -> Vec<PeriodKey> {
        assert_eq!(
            self.granularity,
            Granularity::Quarterly,
            "weeks() is only defined for quarterly keys"
        );
        let range = match self.index {
            1 => 1..=13,
            2 => 14..=26,
            3 => 27..=39,
            _ => 40..=53,
        };
        range.map(|w| Self::weekly(self.year, w)).collect()
    }
}

impl std::fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
