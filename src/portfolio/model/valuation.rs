use rust_decimal::Decimal;
use time::Date;

use super::currency::Currency;
use super::trade::Instrument;
use crate::util::decimal::PosDecimal;

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct PortfolioValuationPoint {
    pub date: Date,
    /// Home currency
    pub total_value: Decimal,
}

/// A daily close. `currency` tags what the close is denominated in, which
/// may not be the home currency.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct PricePoint {
    pub instrument: Instrument,
    pub date: Date,
    pub close: PosDecimal,
    pub currency: Currency,
}
