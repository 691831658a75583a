use std::fmt::Display;

use rust_decimal::Decimal;
use time::Date;

use crate::{portfolio::Currency, util::decimal::PosDecimal};

/// base/quote. A rate for the pair converts an amount in `base` into
/// the equivalent amount in `quote`.
#[derive(PartialEq, Eq, Hash, Clone, Debug, PartialOrd, Ord)]
pub struct CurrencyPair {
    pub base: Currency,
    pub quote: Currency,
}

impl CurrencyPair {
    pub fn new(base: Currency, quote: Currency) -> CurrencyPair {
        CurrencyPair { base, quote }
    }

    /// Accepts "USD/INR", "USD-INR" or "USDINR".
    pub fn parse(s: &str) -> Result<CurrencyPair, String> {
        let t = s.trim();
        let (base, quote) = if let Some((b, q)) = t.split_once(['/', '-']) {
            (b, q)
        } else if t.len() == 6 && t.is_ascii() {
            t.split_at(3)
        } else {
            return Err(format!("Invalid currency pair '{}'", s));
        };
        Ok(CurrencyPair {
            base: Currency::parse(base)
                .map_err(|e| format!("Invalid currency pair '{}': {}", s, e))?,
            quote: Currency::parse(quote)
                .map_err(|e| format!("Invalid currency pair '{}': {}", s, e))?,
        })
    }

    pub fn inverse(&self) -> CurrencyPair {
        CurrencyPair {
            base: self.quote.clone(),
            quote: self.base.clone(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.base == self.quote
    }
}

impl Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct FxRate {
    pub pair: CurrencyPair,
    /// The date the rate was quoted for. When a rate is found by looking
    /// back from a trade date, this is the earlier date.
    pub date: Date,
    pub rate: PosDecimal,
}

impl FxRate {
    pub fn new(pair: CurrencyPair, date: Date, rate: PosDecimal) -> FxRate {
        FxRate { pair, date, rate }
    }

    pub fn identity(currency: &Currency, date: Date) -> FxRate {
        FxRate {
            pair: CurrencyPair::new(currency.clone(), currency.clone()),
            date,
            rate: PosDecimal::one(),
        }
    }

    /// Converts an amount in the base currency into the quote currency.
    pub fn convert(&self, amount: Decimal) -> Decimal {
        amount * *self.rate
    }

    pub fn inverse(&self) -> FxRate {
        FxRate {
            pair: self.pair.inverse(),
            date: self.date,
            rate: self.rate.inverse(),
        }
    }
}

// Auto-implements to_string()
impl Display for FxRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} : {}", self.pair, self.date, self.rate)
    }
}
