use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MINOR_PER_MAJOR: i64 = 100;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum PriceError {
    #[error("price is not a finite number: {0}")]
    NotFinite(f64),

    #[error("price out of range: {0}")]
    OutOfRange(f64),
}

/// Money amount held in minor units (cents).
///
/// The backend speaks decimal numbers; converting once at the boundary
/// keeps repeated counter-offers free of float drift.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    pub const ZERO: Price = Price(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Converts a decimal amount, rounding half away from zero to the cent.
    pub fn try_from_major(major: f64) -> Result<Self, PriceError> {
        if !major.is_finite() {
            return Err(PriceError::NotFinite(major));
        }

        let minor = (major * MINOR_PER_MAJOR as f64).round();
        if minor < i64::MIN as f64 || minor > i64::MAX as f64 {
            return Err(PriceError::OutOfRange(major));
        }

        Ok(Self(minor as i64))
    }

    pub fn to_major(&self) -> f64 {
        self.0 as f64 / MINOR_PER_MAJOR as f64
    }

    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = MINOR_PER_MAJOR as u64;
        write!(f, "{sign}{}.{:02}", abs / per, abs % per)
    }
}
