use std::collections::BTreeMap;

use rust_decimal::Decimal;
use time::Date;

use crate::errors::OverdraftError;
use crate::portfolio::{Holding, HoldingDelta, Instrument, Trade, TradeSide};
use crate::util::date::days_inclusive;
use crate::util::decimal::{GreaterEqualZeroDecimal, PosDecimal};

/// Applies one trade to the holding before it, using the average cost
/// method.
///
/// Buy: quantity and total cost both grow; the cost includes fees.
/// Sell: total cost drops by sold_quantity * average_cost, and the realized
/// gain is the net proceeds less that same amount. Selling everything
/// leaves a total cost of exactly zero.
pub fn delta_for_trade(pre: &Holding, trade: &Trade) -> Result<HoldingDelta, OverdraftError> {
    let (post_quantity, post_total_cost, realized_gain) = match trade.side {
        TradeSide::Buy => {
            let outlay = GreaterEqualZeroDecimal::from(trade.quantity * trade.price)
                + trade.fees;
            (
                pre.quantity + GreaterEqualZeroDecimal::from(trade.quantity),
                pre.total_cost + outlay,
                None,
            )
        }
        TradeSide::Sell => {
            let overdraft = || OverdraftError {
                instrument: trade.instrument.clone(),
                date: trade.trade_date,
                sold: *trade.quantity,
                held: *pre.quantity,
            };
            let remaining = GreaterEqualZeroDecimal::try_from(*pre.quantity - *trade.quantity)
                .map_err(|_| overdraft())?;
            // Non-zero, since at least trade.quantity was held.
            let pre_quantity = PosDecimal::try_from(*pre.quantity).map_err(|_| overdraft())?;
            let avg_cost = pre.total_cost.div_pos(pre_quantity);

            let post_total_cost = match PosDecimal::try_from(*remaining) {
                Ok(rem) => avg_cost.mul_pos(rem),
                Err(_) => GreaterEqualZeroDecimal::zero(),
            };
            let realized = trade.sell_proceeds() - (*trade.quantity * *avg_cost);
            (remaining, post_total_cost, Some(realized))
        }
    };

    Ok(HoldingDelta {
        trade: trade.clone(),
        pre: pre.clone(),
        post: Holding {
            instrument: pre.instrument.clone(),
            as_of_date: trade.trade_date,
            quantity: post_quantity,
            total_cost: post_total_cost,
        },
        realized_gain,
    })
}

#[derive(Debug, PartialEq)]
pub struct HoldingsError {
    pub partial_deltas: Vec<HoldingDelta>,
    pub err: OverdraftError,
}

#[derive(Debug, PartialEq)]
pub struct HoldingsResult(pub Result<Vec<HoldingDelta>, HoldingsError>);

impl HoldingsResult {
    pub fn deltas_or_partial_deltas(&self) -> &Vec<HoldingDelta> {
        match &self.0 {
            Ok(d) => d,
            Err(e) => &e.partial_deltas,
        }
    }
}

impl From<Result<Vec<HoldingDelta>, HoldingsError>> for HoldingsResult {
    fn from(value: Result<Vec<HoldingDelta>, HoldingsError>) -> Self {
        HoldingsResult(value)
    }
}

/// Replays the (chronologically sorted) trades of a single instrument.
/// Stops at the first overdraft, returning the deltas computed before it.
pub fn trades_to_holding_deltas(instrument: &str, trades: &[Trade]) -> HoldingsResult {
    let mut deltas = Vec::<HoldingDelta>::with_capacity(trades.len());
    let mut current = match trades.first() {
        Some(t) => Holding::empty(instrument, t.trade_date),
        None => return Ok(deltas).into(),
    };

    for trade in trades {
        let delta = match delta_for_trade(&current, trade) {
            Ok(d) => d,
            Err(err) => {
                tracing::debug!("trades_to_holding_deltas: {}", err);
                return Err(HoldingsError {
                    partial_deltas: deltas,
                    err,
                })
                .into();
            }
        };
        tracing::trace!("trades_to_holding_deltas: {:#?}", delta);
        current = delta.post.clone();
        deltas.push(delta);
    }

    Ok(deltas).into()
}

/// Groups sorted trades by instrument, keeping their order.
pub fn split_trades_by_instrument(trades: Vec<Trade>) -> BTreeMap<Instrument, Vec<Trade>> {
    let mut by_instrument: BTreeMap<Instrument, Vec<Trade>> = BTreeMap::new();
    for t in trades {
        by_instrument.entry(t.instrument.clone()).or_default().push(t);
    }
    by_instrument
}

/// The full trade history of one instrument, answering "what was held at
/// the end of a given day".
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingTimeline {
    pub instrument: Instrument,
    pub deltas: Vec<HoldingDelta>,
}

impl HoldingTimeline {
    pub fn new(instrument: &str, deltas: Vec<HoldingDelta>) -> HoldingTimeline {
        HoldingTimeline {
            instrument: instrument.to_string(),
            deltas,
        }
    }

    pub fn first_trade_date(&self) -> Option<Date> {
        self.deltas.first().map(|d| d.trade.trade_date)
    }

    pub fn last_trade_date(&self) -> Option<Date> {
        self.deltas.last().map(|d| d.trade.trade_date)
    }

    /// Snapshot as of the end of `date`. Days without a trade carry the
    /// previous state forward.
    pub fn holding_on(&self, date: Date) -> Holding {
        let n_applied = self.deltas.partition_point(|d| d.trade.trade_date <= date);
        match n_applied {
            0 => Holding::empty(&self.instrument, date),
            n => self.deltas[n - 1].post.carried_to(date),
        }
    }

    /// One snapshot per calendar day in [start, end].
    pub fn daily_snapshots(&self, start: Date, end: Date) -> Vec<Holding> {
        days_inclusive(start, end).map(|d| self.holding_on(d)).collect()
    }

    pub fn realized_gain(&self) -> Decimal {
        self.deltas.iter().filter_map(|d| d.realized_gain).sum()
    }
}
