use std::fmt::Display;

use rust_decimal::Decimal;
use time::Date;

#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum CashFlowKind {
    Buy,
    Sell,
    // Market value on the valuation date, as if liquidated
    Terminal,
}

impl Display for CashFlowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CashFlowKind::Buy => "Buy",
            CashFlowKind::Sell => "Sell",
            CashFlowKind::Terminal => "Terminal",
        };
        write!(f, "{}", s)
    }
}

/// Signed, home currency. Negative when money leaves the investor.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct CashFlow {
    pub date: Date,
    pub amount: Decimal,
    pub kind: CashFlowKind,
}

impl CashFlow {
    pub fn new(date: Date, amount: Decimal, kind: CashFlowKind) -> CashFlow {
        CashFlow { date, amount, kind }
    }
}
