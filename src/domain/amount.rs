//! Amount type
//!
//! Domain primitives for money. Inside the ledger every value is an integer
//! count of minor units (cents); `Decimal` only appears at the outer boundary
//! when converting request/response amounts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minor units per major unit (2 fractional digits)
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

/// Maximum fractional digits accepted at the boundary
const MAX_SCALE: u32 = 2;

/// Amount represents a validated, strictly positive sum of money in minor units.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - Never constructed from floating point
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use wallet_ledger::domain::Amount;
///
/// let amount = Amount::from_decimal(Decimal::new(10050, 2)).unwrap();
/// assert_eq!(amount.minor_units(), 10050);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

/// Errors that can occur when creating an Amount or Balance
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount must be positive (got {0})")]
    NotPositive(Decimal),

    #[error("Amount has too many decimal places (max 2, got {0})")]
    TooManyDecimals(u32),

    #[error("Amount exceeds the representable range")]
    Overflow,

    #[error("Balance cannot be negative (got {0} minor units)")]
    NegativeBalance(i64),

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

impl Amount {
    /// Create an Amount from a count of minor units.
    pub fn from_minor_units(value: i64) -> Result<Self, AmountError> {
        if value <= 0 {
            return Err(AmountError::NotPositive(Decimal::new(value, MAX_SCALE)));
        }
        Ok(Self(value))
    }

    /// Convert a boundary decimal (e.g. `100.50`) into minor units.
    ///
    /// # Errors
    /// - `AmountError::NotPositive` if value <= 0
    /// - `AmountError::TooManyDecimals` if more than 2 significant decimal places
    /// - `AmountError::Overflow` if the minor-unit value does not fit in an i64
    pub fn from_decimal(value: Decimal) -> Result<Self, AmountError> {
        if value <= Decimal::ZERO {
            return Err(AmountError::NotPositive(value));
        }

        // 100.500 is fine, 100.505 is not
        let normalized = value.normalize();
        if normalized.scale() > MAX_SCALE {
            return Err(AmountError::TooManyDecimals(normalized.scale()));
        }

        let minor = normalized
            .checked_mul(Decimal::from(MINOR_UNITS_PER_MAJOR))
            .ok_or(AmountError::Overflow)?;
        let minor = i64::try_from(minor).map_err(|_| AmountError::Overflow)?;

        Self::from_minor_units(minor)
    }

    /// Get the value in minor units.
    pub fn minor_units(&self) -> i64 {
        self.0
    }

    /// Get the value as a decimal with two fractional digits.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, MAX_SCALE)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())
            .map_err(|e| AmountError::ParseError(e.to_string()))?;
        Amount::from_decimal(decimal)
    }
}

impl TryFrom<i64> for Amount {
    type Error = AmountError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Amount::from_minor_units(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Balance represents an account balance in minor units (zero or positive).
/// Unlike Amount, Balance can be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Balance(i64);

impl Balance {
    /// Create a new balance (zero or positive)
    pub fn new(value: i64) -> Result<Self, AmountError> {
        if value < 0 {
            return Err(AmountError::NegativeBalance(value));
        }
        Ok(Self(value))
    }

    /// Create a zero balance
    pub fn zero() -> Self {
        Self(0)
    }

    /// Get the value in minor units
    pub fn minor_units(&self) -> i64 {
        self.0
    }

    /// Get the value as a decimal with two fractional digits
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, MAX_SCALE)
    }

    /// Check if balance covers a withdrawal
    pub fn is_sufficient_for(&self, amount: &Amount) -> bool {
        self.0 >= amount.minor_units()
    }

    /// Add amount to balance
    pub fn credit(&self, amount: &Amount) -> Result<Balance, AmountError> {
        let value = self
            .0
            .checked_add(amount.minor_units())
            .ok_or(AmountError::Overflow)?;
        Balance::new(value)
    }

    /// Subtract amount from balance
    pub fn debit(&self, amount: &Amount) -> Result<Balance, AmountError> {
        let value = self
            .0
            .checked_sub(amount.minor_units())
            .ok_or(AmountError::Overflow)?;
        Balance::new(value)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::zero()
    }
}
