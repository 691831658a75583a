use rust_decimal::Decimal;
use time::Date;

use crate::portfolio::{CashFlow, CashFlowKind, HoldingDelta, Trade, TradeSide};
use crate::util::decimal::is_positive;

pub fn trade_cash_flow(trade: &Trade) -> CashFlow {
    let kind = match trade.side {
        TradeSide::Buy => CashFlowKind::Buy,
        TradeSide::Sell => CashFlowKind::Sell,
    };
    CashFlow::new(trade.trade_date, trade.signed_cash_amount(), kind)
}

/// The cash flow schedule of a single holding: one flow per trade, plus the
/// terminal (as-if-liquidated) flow when `terminal_value` is positive.
pub fn holding_cash_flows(
    deltas: &[HoldingDelta],
    valuation_date: Date,
    terminal_value: Option<Decimal>,
) -> Vec<CashFlow> {
    let mut flows: Vec<CashFlow> = deltas.iter().map(|d| trade_cash_flow(&d.trade)).collect();
    if let Some(value) = terminal_value.filter(is_positive) {
        flows.push(CashFlow::new(valuation_date, value, CashFlowKind::Terminal));
    }
    flows
}

/// Merges per-holding schedules into one portfolio schedule, ordered by
/// date. Flows on the same date keep their relative order.
pub fn aggregate_cash_flows<'a, I>(schedules: I) -> Vec<CashFlow>
where
    I: IntoIterator<Item = &'a Vec<CashFlow>>,
{
    let mut all: Vec<CashFlow> = schedules.into_iter().flatten().cloned().collect();
    all.sort_by_key(|cf| cf.date);
    all
}
