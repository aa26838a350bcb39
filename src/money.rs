use decimal::d128;
use serde::de::{self, Visitor};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Currencies that are treated as legal tender rather than coins.
pub const FIAT_CURRENCIES: [&str; 5] = ["pln", "usd", "eur", "gbp", "chf"];

/// Currency every total is reported in.
pub const LOCAL_CURRENCY: &str = "pln";

#[non_exhaustive]
pub enum Error {
    Currency(Option<String>, Option<String>),
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Currency(left, right) => {
                f.write_str(&format!("left: {:#?} right: {:#?}", left, right))
            }
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Money {
    pub(crate) amount: d128,
    currency: Option<String>,
}

impl Money {
    pub fn with_currency(amount: d128, currency: &str) -> Self {
        Self {
            amount,
            currency: Some(currency.to_lowercase()),
        }
    }

    /// Zero in the local currency.
    pub fn local_zero() -> Self {
        Self::with_currency(d128::from(0), LOCAL_CURRENCY)
    }

    pub fn amount(&self) -> d128 {
        self.amount
    }

    pub fn currency(&self) -> Option<&str> {
        self.currency.as_deref()
    }

    pub fn add(&mut self, rhs: &Self) -> Result<(), Error> {
        self.validate(rhs)?;
        self.amount += rhs.amount;
        Ok(())
    }

    pub fn sub(&mut self, rhs: &Self) -> Result<(), Error> {
        self.validate(rhs)?;
        self.amount -= rhs.amount;
        Ok(())
    }

    /// Rounds to two decimal places, ties away from zero.
    pub fn round_to_cents(&self) -> Self {
        let hundred = d128::from(100);
        let scaled = self.amount * hundred;
        // quantize follows the context rounding, which breaks ties to even
        let mut whole = scaled.quantize(d128::from(1));
        if (scaled - whole).abs() == d128!(0.5) && whole.abs() < scaled.abs() {
            if scaled < d128::from(0) {
                whole -= d128::from(1);
            } else {
                whole += d128::from(1);
            }
        }

        Self {
            amount: (whole / hundred).quantize(d128!(0.01)),
            currency: self.currency.clone(),
        }
    }

    pub fn is_negative(&self) -> bool {
        self.amount < d128::from(0)
    }

    pub fn is_positive(&self) -> bool {
        self.amount > d128::from(0)
    }

    pub fn is_fiat(&self) -> bool {
        self.currency
            .as_deref()
            .map_or(false, |c| FIAT_CURRENCIES.contains(&c))
    }

    pub fn is_local(&self) -> bool {
        self.currency.as_deref() == Some(LOCAL_CURRENCY)
    }

    fn validate(&self, rhs: &Self) -> Result<(), Error> {
        let currency = rhs.currency.as_ref().map(|c| c.to_lowercase());
        if self.currency != currency {
            return Err(Error::Currency(self.currency.clone(), currency));
        }
        Ok(())
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.currency {
            Some(currency) => write!(f, "{} {}", self.amount, currency.to_uppercase()),
            None => write!(f, "{}", self.amount),
        }
    }
}

/// Parses a plain decimal number, rejecting NaN and infinities.
pub fn parse_amount(s: &str) -> Result<d128, String> {
    let amount = d128::from_str(s.trim()).map_err(|_| format!("invalid input: `{}`", s))?;
    if !amount.is_finite() {
        return Err(format!("invalid input: `{}`", s));
    }
    Ok(amount)
}

pub(crate) fn deserialize_amount<'de, D>(deserializer: D) -> Result<d128, D::Error>
where
    D: de::Deserializer<'de>,
{
    deserializer.deserialize_str(AmountVisitor)
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = d128;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a decimal number")
    }

    fn visit_str<E>(self, value: &str) -> Result<d128, E>
    where
        E: de::Error,
    {
        parse_amount(value).map_err(de::Error::custom)
    }
}
