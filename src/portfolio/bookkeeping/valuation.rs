use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use time::Date;

use crate::errors::{AnalysisWarning, StalePriceWarning};
use crate::portfolio::{Holding, Instrument, PortfolioValuationPoint, PricePoint};
use crate::util::date::{days_inclusive, is_weekend};
use crate::util::decimal::PosDecimal;

use super::HoldingTimeline;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum PriceLookup {
    Exact(PosDecimal),
    /// The latest close before the requested date.
    Stale { close: PosDecimal, price_date: Date },
    Missing,
}

/// Daily closes in the home currency, per instrument.
#[derive(Debug, Default)]
pub struct PriceTable {
    closes: HashMap<Instrument, BTreeMap<Date, PosDecimal>>,
}

impl PriceTable {
    /// All points must already be in the home currency.
    pub fn new(points: Vec<PricePoint>) -> PriceTable {
        let mut table = PriceTable::default();
        for p in points {
            table.closes.entry(p.instrument).or_default().insert(p.date, p.close);
        }
        table
    }

    pub fn lookup(&self, instrument: &str, date: Date) -> PriceLookup {
        let latest = self
            .closes
            .get(instrument)
            .and_then(|c| c.range(..=date).next_back());
        match latest {
            Some((d, close)) if *d == date => PriceLookup::Exact(*close),
            Some((d, close)) => PriceLookup::Stale {
                close: *close,
                price_date: *d,
            },
            None => PriceLookup::Missing,
        }
    }
}

/// Market value of a holding on its as_of_date, in the home currency.
///
/// A closed holding is worth exactly zero, regardless of prices. An open
/// holding with no close on or before the date has no value (None), and
/// a MissingPrice warning is returned.
pub fn holding_market_value(
    holding: &Holding,
    prices: &PriceTable,
) -> (Option<Decimal>, Option<AnalysisWarning>) {
    if !holding.is_open() {
        return (Some(Decimal::ZERO), None);
    }
    let date = holding.as_of_date;
    match prices.lookup(&holding.instrument, date) {
        PriceLookup::Exact(close) => (Some(*holding.quantity * *close), None),
        PriceLookup::Stale { close, price_date } => (
            Some(*holding.quantity * *close),
            Some(AnalysisWarning::StalePrice(StalePriceWarning {
                instrument: holding.instrument.clone(),
                date,
                price_date,
            })),
        ),
        PriceLookup::Missing => (
            None,
            Some(AnalysisWarning::MissingPrice {
                instrument: holding.instrument.clone(),
                date,
            }),
        ),
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub struct ValuationOptions {
    pub include_weekends: bool,
}

#[derive(Debug, Default)]
pub struct ValuationResult {
    pub series: Vec<PortfolioValuationPoint>,
    pub warnings: Vec<AnalysisWarning>,
}

/// Values the portfolio on every trading day in [start, end].
///
/// Weekends are skipped unless opts.include_weekends is set, but `end` is
/// always valued. Instruments with no usable price contribute nothing to a
/// date, and are reported in the warnings.
pub fn value_portfolio(
    timelines: &[HoldingTimeline],
    prices: &PriceTable,
    start: Date,
    end: Date,
    opts: &ValuationOptions,
) -> ValuationResult {
    let mut res = ValuationResult::default();

    let dates = days_inclusive(start, end)
        .filter(|d| opts.include_weekends || !is_weekend(d) || *d == end);
    for date in dates {
        let mut total_value = Decimal::ZERO;
        for tl in timelines {
            let (value, warning) = holding_market_value(&tl.holding_on(date), prices);
            if let Some(v) = value {
                total_value += v;
            }
            if let Some(w) = warning {
                tracing::trace!("value_portfolio: {}", w);
                res.warnings.push(w);
            }
        }
        res.series.push(PortfolioValuationPoint { date, total_value });
    }

    tracing::debug!(
        "value_portfolio: {} points, {} warnings",
        res.series.len(),
        res.warnings.len()
    );
    res
}
