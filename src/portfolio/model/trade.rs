use std::fmt::Display;

use rust_decimal::Decimal;
use time::Date;

use crate::{
    fx::FxRate,
    util::decimal::{GreaterEqualZeroDecimal, PosDecimal},
};

use super::currency::Currency;

pub type Instrument = String;

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    fn pretty_str(&self) -> &str {
        match self {
            TradeSide::Buy => "Buy",
            TradeSide::Sell => "Sell",
        }
    }
}

impl Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pretty_str())
    }
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Trade {
    pub instrument: Instrument,
    pub trade_date: Date,
    pub side: TradeSide,
    // Direction lives in side only. Neither of these is ever signed.
    pub quantity: PosDecimal,
    pub price: PosDecimal,
    pub currency: Currency,
    pub fees: GreaterEqualZeroDecimal,

    // The absolute order in which the trade was read, across all files.
    // Used as a tiebreak in sorting.
    pub read_index: u32,

    // Set once the trade has been converted to the home currency.
    // The rate carries its own quote date, which may precede trade_date.
    pub fx_rate: Option<FxRate>,
}

impl Trade {
    pub fn gross_amount(&self) -> Decimal {
        *self.quantity * *self.price
    }

    /// Money spent on a buy, including fees.
    pub fn buy_outlay(&self) -> Decimal {
        self.gross_amount() + *self.fees
    }

    /// Money received for a sell, net of fees.
    pub fn sell_proceeds(&self) -> Decimal {
        self.gross_amount() - *self.fees
    }

    /// The amount as it appears in a cash flow schedule. Negative for buys.
    pub fn signed_cash_amount(&self) -> Decimal {
        match self.side {
            TradeSide::Buy => -self.buy_outlay(),
            TradeSide::Sell => self.sell_proceeds(),
        }
    }

    /// Chronological order, ties broken by the order the rows were read.
    pub fn sort_key(&self) -> (Date, u32) {
        (self.trade_date, self.read_index)
    }
}

/// Output of the normalizer: sorted, de-duplicated trades in their
/// original currencies, not yet adjusted for splits.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct NormalizedTrades(Vec<Trade>);

impl NormalizedTrades {
    pub(crate) fn new(mut trades: Vec<Trade>) -> NormalizedTrades {
        trades.sort_by_key(Trade::sort_key);
        NormalizedTrades(trades)
    }

    pub fn trades(&self) -> &[Trade] {
        &self.0
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Trades whose quantities and prices are on a post-split basis.
/// Can only be produced by adjust_for_splits, which consumes
/// NormalizedTrades, so no trade is adjusted twice.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct SplitAdjustedTrades(Vec<Trade>);

impl SplitAdjustedTrades {
    pub(crate) fn new(trades: Vec<Trade>) -> SplitAdjustedTrades {
        SplitAdjustedTrades(trades)
    }

    pub fn trades(&self) -> &[Trade] {
        &self.0
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.0
    }
}

/// Split-adjusted trades with all amounts in the home currency.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ConvertedTrades {
    pub trades: Vec<Trade>,
    pub home: Currency,
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::{
        gezdec, pdec,
        portfolio::{Currency, Trade, TradeSide},
        util::date::pub_testlib::ymd,
    };

    use super::NormalizedTrades;

    fn trade(side: TradeSide, day: u8, read_index: u32) -> Trade {
        Trade {
            instrument: "FOO".to_string(),
            trade_date: ymd(2023, 1, day),
            side,
            quantity: pdec!(10),
            price: pdec!(2.5),
            currency: Currency::inr(),
            fees: gezdec!(1),
            read_index,
            fx_rate: None,
        }
    }

    #[test]
    fn test_amounts() {
        let b = trade(TradeSide::Buy, 1, 0);
        assert_eq!(b.gross_amount(), dec!(25.0));
        assert_eq!(b.buy_outlay(), dec!(26.0));
        assert_eq!(b.signed_cash_amount(), dec!(-26.0));

        let s = trade(TradeSide::Sell, 1, 0);
        assert_eq!(s.sell_proceeds(), dec!(24.0));
        assert_eq!(s.signed_cash_amount(), dec!(24.0));
        assert_eq!(TradeSide::Sell.to_string(), "Sell");
    }

    #[test]
    fn test_normalized_sort() {
        let trades = NormalizedTrades::new(vec![
            trade(TradeSide::Buy, 3, 0),
            trade(TradeSide::Sell, 2, 5),
            trade(TradeSide::Buy, 2, 1),
        ]);
        let order: Vec<u32> = trades.trades().iter().map(|t| t.read_index).collect();
        assert_eq!(order, vec![1, 5, 0]);
        assert_eq!(trades.len(), 3);
    }
}
