//! Money values
//!
//! Client-supplied amounts arrive as strings and are checked here before any
//! ledger arithmetic sees them.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Largest money value a single transaction or price may carry
const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Money is kept to four decimal places
const MAX_SCALE: u32 = 4;

/// A strictly positive money value within the ledger's bounds.
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use retail_ledger::domain::Amount;
///
/// let amount: Amount = "250.50".parse().unwrap();
/// assert_eq!(amount.value(), Decimal::new(25050, 2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(Decimal);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount must be positive (got {0})")]
    NotPositive(Decimal),

    #[error("Amount must not be negative (got {0})")]
    Negative(Decimal),

    #[error("Amount has too many decimal places (max {MAX_SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Amount exceeds maximum allowed value ({MAX_AMOUNT})")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value <= Decimal::ZERO {
            return Err(AmountError::NotPositive(value));
        }
        check_bounds(value)?;
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

fn check_bounds(value: Decimal) -> Result<(), AmountError> {
    if value.scale() > MAX_SCALE {
        return Err(AmountError::TooManyDecimals(value.scale()));
    }
    if value > Decimal::from(MAX_AMOUNT) {
        return Err(AmountError::Overflow);
    }
    Ok(())
}

fn parse_decimal(s: &str) -> Result<Decimal, AmountError> {
    Decimal::from_str(s.trim())
        .map(|value| value.normalize())
        .map_err(|e| AmountError::ParseError(e.to_string()))
}

/// Parse a money value that may be zero (paid amounts, unit prices).
pub fn parse_non_negative(s: &str) -> Result<Decimal, AmountError> {
    let value = parse_decimal(s)?;
    if value < Decimal::ZERO {
        return Err(AmountError::Negative(value));
    }
    check_bounds(value)?;
    Ok(value)
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::new(parse_decimal(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_positive_amounts_parse() {
        let amount: Amount = " 123.45 ".parse().unwrap();
        assert_eq!(amount.value(), dec!(123.45));
    }

    #[test]
    fn test_zero_and_negative_rejected() {
        assert!(matches!("0".parse::<Amount>(), Err(AmountError::NotPositive(_))));
        assert!(matches!("-100".parse::<Amount>(), Err(AmountError::NotPositive(_))));
    }

    #[test]
    fn test_scale_limit() {
        assert!(matches!(
            Amount::new(dec!(0.12345)),
            Err(AmountError::TooManyDecimals(5))
        ));
        // trailing zeros are dropped before the scale check
        assert_eq!("10.000000".parse::<Amount>().unwrap().value(), dec!(10));
    }

    #[test]
    fn test_upper_bound() {
        assert!(Amount::new(dec!(1000000000000)).is_ok());
        assert!(matches!(
            Amount::new(dec!(1000000000001)),
            Err(AmountError::Overflow)
        ));
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!("abc".parse::<Amount>(), Err(AmountError::ParseError(_))));
    }

    #[test]
    fn test_parse_non_negative() {
        assert_eq!(parse_non_negative("0").unwrap(), Decimal::ZERO);
        assert_eq!(parse_non_negative(" 300 ").unwrap(), dec!(300));
        assert!(matches!(parse_non_negative("-1"), Err(AmountError::Negative(_))));
        assert!(matches!(parse_non_negative("ten"), Err(AmountError::ParseError(_))));
        assert!(matches!(
            parse_non_negative("2000000000000"),
            Err(AmountError::Overflow)
        ));
    }
}
