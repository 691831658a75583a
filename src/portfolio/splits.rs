use std::collections::{BTreeMap, HashMap};

use time::Date;

use crate::errors::AnalysisWarning;
use crate::portfolio::{
    Instrument, NormalizedTrades, SplitAdjustedTrades, SplitEvent, SplitRatio,
};
use crate::util::basic::SError;

/// Split events, indexed by instrument and ordered by effective date.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SplitTable {
    splits: HashMap<Instrument, BTreeMap<Date, SplitRatio>>,
}

impl SplitTable {
    /// Exact duplicate events (the same instrument, date and ratio) are
    /// collapsed, with a warning. Two different ratios for the same
    /// instrument and date cannot be resolved, and are an error.
    pub fn try_from_events(
        events: Vec<SplitEvent>,
    ) -> Result<(SplitTable, Vec<AnalysisWarning>), SError> {
        let mut table = SplitTable::default();
        let mut warnings = Vec::new();
        for ev in events {
            let by_date = table.splits.entry(ev.instrument.clone()).or_default();
            match by_date.get(&ev.effective_date) {
                Some(existing) if existing.same_factor(&ev.ratio) => {
                    warnings.push(AnalysisWarning::Other(format!(
                        "Duplicate {} split of {} on {} ignored",
                        ev.ratio, ev.instrument, ev.effective_date
                    )));
                }
                Some(existing) => {
                    return Err(format!(
                        "Conflicting splits of {} on {}: {} and {}",
                        ev.instrument, ev.effective_date, existing, ev.ratio
                    ));
                }
                None => {
                    by_date.insert(ev.effective_date, ev.ratio);
                }
            }
        }
        Ok((table, warnings))
    }

    pub fn is_empty(&self) -> bool {
        self.splits.values().all(|s| s.is_empty())
    }

    pub fn events_for(&self, instrument: &str) -> Vec<(Date, SplitRatio)> {
        self.splits
            .get(instrument)
            .map(|s| s.iter().map(|(d, r)| (*d, *r)).collect())
            .unwrap_or_default()
    }

    /// The composition of every split of `instrument` which takes effect
    /// after `trade_date`, applied in date order. Kept as a fraction, so
    /// that reverse splits like 1-for-3 restate whole share counts exactly.
    pub fn cumulative_factor(&self, instrument: &str, trade_date: Date) -> SplitRatio {
        let Some(by_date) = self.splits.get(instrument) else {
            return SplitRatio::one();
        };
        by_date
            .iter()
            .filter(|(date, _)| **date > trade_date)
            .fold(SplitRatio::one(), |acc, (_, ratio)| acc.compose(ratio))
    }
}

/// Restates every trade on a post-split basis: quantity is multiplied by
/// the cumulative split factor after the trade date, and price divided by
/// it. quantity * price is unchanged. Fees are not affected.
/// Multiplication happens before division, so 9 shares through a 1-for-3
/// split are exactly 3.
pub fn adjust_for_splits(
    trades: NormalizedTrades,
    splits: &SplitTable,
) -> SplitAdjustedTrades {
    let adjusted = trades
        .into_trades()
        .into_iter()
        .map(|mut t| {
            let factor = splits.cumulative_factor(&t.instrument, t.trade_date);
            if !factor.is_one() {
                tracing::trace!(
                    "adjust_for_splits: {} {} x{}",
                    t.instrument,
                    t.trade_date,
                    factor
                );
                t.quantity = factor.apply_to_quantity(t.quantity);
                t.price = factor.apply_to_price(t.price);
            }
            t
        })
        .collect();
    SplitAdjustedTrades::new(adjusted)
}
