use std::cmp::Ordering;

use itertools::Itertools;
use rust_decimal::Decimal;
use time::Date;

use crate::errors::{AnalysisWarning, DataUnavailableError, XirrError};
use crate::portfolio::bookkeeping::{holding_market_value, HoldingTimeline, PriceTable};
use crate::portfolio::cashflows::{aggregate_cash_flows, holding_cash_flows};
use crate::portfolio::xirr::{xirr, XirrOptions};
use crate::portfolio::{CashFlow, Instrument};
use crate::util::decimal::GreaterEqualZeroDecimal;

pub const DEFAULT_TOP_MOVERS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct HoldingSummary {
    pub instrument: Instrument,
    pub valuation_date: Date,
    pub quantity: GreaterEqualZeroDecimal,
    pub average_cost: Decimal,
    pub total_cost: GreaterEqualZeroDecimal,
    /// None when the position is open and has no price.
    pub current_value: Option<Decimal>,
    pub unrealized_gain: Option<Decimal>,
    pub realized_gain: Decimal,
    pub xirr: Result<f64, XirrError>,
    pub cash_flows: Vec<CashFlow>,
}

impl HoldingSummary {
    pub fn is_open(&self) -> bool {
        !self.quantity.is_zero()
    }

    /// True if the holding is open but could not be valued.
    pub fn is_unvalued(&self) -> bool {
        self.is_open() && self.current_value.is_none()
    }
}

/// Summarizes one holding as of valuation_date, and solves its XIRR.
pub fn summarize_holding(
    timeline: &HoldingTimeline,
    prices: &PriceTable,
    valuation_date: Date,
    xirr_opts: &XirrOptions,
) -> (HoldingSummary, Vec<AnalysisWarning>) {
    let holding = timeline.holding_on(valuation_date);
    let (current_value, warning) = holding_market_value(&holding, prices);
    let unrealized_gain = current_value.map(|v| v - *holding.total_cost);
    let cash_flows = holding_cash_flows(&timeline.deltas, valuation_date, current_value);

    let xirr = if holding.is_open() && current_value.is_none() {
        Err(XirrError::Unavailable(DataUnavailableError::new(
            format!("{} terminal value", timeline.instrument),
            format!("no price on or before {}", valuation_date),
        )))
    } else {
        xirr(&cash_flows, xirr_opts)
    };
    if let Err(e) = &xirr {
        tracing::debug!("summarize_holding: {} XIRR: {}", timeline.instrument, e);
    }

    let summary = HoldingSummary {
        instrument: timeline.instrument.clone(),
        valuation_date,
        quantity: holding.quantity,
        average_cost: holding.average_cost(),
        total_cost: holding.total_cost,
        current_value,
        unrealized_gain,
        realized_gain: timeline.realized_gain(),
        xirr,
        cash_flows,
    };
    (summary, warning.into_iter().collect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSummary {
    pub valuation_date: Date,
    pub total_value: Decimal,
    /// Cost basis of the positions still held.
    pub total_invested: Decimal,
    pub total_realized: Decimal,
    pub total_unrealized: Decimal,
    pub xirr: Result<f64, XirrError>,
}

/// Aggregates the holding summaries. The portfolio XIRR is solved over the
/// merged cash flows of every holding, and is unavailable when any open
/// holding could not be valued.
pub fn summarize_portfolio(
    holdings: &[HoldingSummary],
    valuation_date: Date,
    xirr_opts: &XirrOptions,
) -> PortfolioSummary {
    let total_value = holdings.iter().filter_map(|h| h.current_value).sum();
    let total_invested = holdings.iter().map(|h| *h.total_cost).sum();
    let total_realized = holdings.iter().map(|h| h.realized_gain).sum();
    let total_unrealized = holdings.iter().filter_map(|h| h.unrealized_gain).sum();

    let unvalued: Vec<&str> = holdings
        .iter()
        .filter(|h| h.is_unvalued())
        .map(|h| h.instrument.as_str())
        .collect();
    let xirr = if unvalued.is_empty() {
        xirr(&aggregate_cash_flows(holdings.iter().map(|h| &h.cash_flows)), xirr_opts)
    } else {
        Err(XirrError::Unavailable(DataUnavailableError::new(
            "portfolio terminal value",
            format!("no price for {}", unvalued.join(", ")),
        )))
    };

    PortfolioSummary {
        valuation_date,
        total_value,
        total_invested,
        total_realized,
        total_unrealized,
        xirr,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeStats {
    pub trade_count: usize,
    pub net_realized: Decimal,
    /// Sorted by instrument.
    pub realized_by_instrument: Vec<(Instrument, Decimal)>,
    /// Instruments with a realized gain, largest first.
    pub top_gainers: Vec<(Instrument, Decimal)>,
    /// Instruments with a realized loss, largest loss first.
    pub top_losers: Vec<(Instrument, Decimal)>,
}

pub fn trade_stats(timelines: &[HoldingTimeline], n_top: usize) -> TradeStats {
    let mut realized_by_instrument: Vec<(Instrument, Decimal)> = timelines
        .iter()
        .map(|tl| (tl.instrument.clone(), tl.realized_gain()))
        .collect();
    realized_by_instrument.sort_by(|a, b| a.0.cmp(&b.0));

    // Ties are broken by instrument, to keep the output stable.
    let by_gain = |a: &(Instrument, Decimal), b: &(Instrument, Decimal)| -> Ordering {
        b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0))
    };
    let top_gainers: Vec<(Instrument, Decimal)> = realized_by_instrument
        .iter()
        .filter(|(_, g)| g.is_sign_positive() && !g.is_zero())
        .cloned()
        .sorted_by(by_gain)
        .take(n_top)
        .collect();
    let top_losers: Vec<(Instrument, Decimal)> = realized_by_instrument
        .iter()
        .filter(|(_, g)| g.is_sign_negative() && !g.is_zero())
        .cloned()
        .sorted_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
        .take(n_top)
        .collect();

    TradeStats {
        trade_count: timelines.iter().map(|tl| tl.deltas.len()).sum(),
        net_realized: realized_by_instrument.iter().map(|(_, g)| *g).sum(),
        realized_by_instrument,
        top_gainers,
        top_losers,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::{
        errors::{AnalysisWarning, XirrError},
        gezdec, pdec,
        portfolio::{
            bookkeeping::{trades_to_holding_deltas, HoldingTimeline, PriceTable},
            xirr::XirrOptions,
            Currency, PricePoint, Trade, TradeSide,
        },
        util::{date::pub_testlib::ymd, decimal::PosDecimal},
    };

    use super::{summarize_holding, summarize_portfolio, trade_stats};

    fn tr(sym: &str, d: time::Date, side: TradeSide, q: PosDecimal, p: PosDecimal) -> Trade {
        Trade {
            instrument: sym.to_string(),
            trade_date: d,
            side,
            quantity: q,
            price: p,
            currency: Currency::inr(),
            fees: gezdec!(0),
            read_index: 0,
            fx_rate: None,
        }
    }

    fn timeline(trades: Vec<Trade>) -> HoldingTimeline {
        let sym = trades[0].instrument.clone();
        let deltas = trades_to_holding_deltas(&sym, &trades).0.unwrap();
        HoldingTimeline::new(&sym, deltas)
    }

    fn close(sym: &str, d: time::Date, c: PosDecimal) -> PricePoint {
        PricePoint {
            instrument: sym.to_string(),
            date: d,
            close: c,
            currency: Currency::inr(),
        }
    }

    #[test]
    fn test_closed_holding() {
        let tl = timeline(vec![
            tr("FOO", ymd(2023, 1, 1), TradeSide::Buy, pdec!(10), pdec!(100)),
            tr("FOO", ymd(2023, 6, 1), TradeSide::Sell, pdec!(10), pdec!(120)),
        ]);
        let (s, warnings) = summarize_holding(
            &tl,
            &PriceTable::default(),
            ymd(2023, 6, 1),
            &XirrOptions::default(),
        );
        assert!(warnings.is_empty());
        assert_eq!(s.quantity, gezdec!(0));
        assert_eq!(s.current_value, Some(dec!(0)));
        assert_eq!(s.realized_gain, dec!(200));
        let expected = 1.2f64.powf(365.0 / 151.0) - 1.0;
        assert!((s.xirr.clone().unwrap() - expected).abs() < 1e-8);
    }

    #[test]
    fn test_open_holding() {
        let tl = timeline(vec![tr("FOO", ymd(2023, 1, 1), TradeSide::Buy, pdec!(10), pdec!(100))]);
        let prices = PriceTable::new(vec![close("FOO", ymd(2023, 12, 29), pdec!(110))]);
        let (s, warnings) =
            summarize_holding(&tl, &prices, ymd(2024, 1, 1), &XirrOptions::default());

        assert_eq!(s.current_value, Some(dec!(1100)));
        assert_eq!(s.unrealized_gain, Some(dec!(100)));
        assert_eq!(s.average_cost, dec!(100));
        assert_eq!(s.cash_flows.len(), 2);
        assert!(matches!(warnings[..], [AnalysisWarning::StalePrice(_)]));
        assert!((s.xirr.unwrap() - 0.10).abs() < 1e-9);

        // Without a price, the XIRR cannot be computed
        let (s, warnings) = summarize_holding(
            &tl,
            &PriceTable::default(),
            ymd(2024, 1, 1),
            &XirrOptions::default(),
        );
        assert!(s.is_unvalued());
        assert_eq!(s.unrealized_gain, None);
        assert!(matches!(s.xirr, Err(XirrError::Unavailable(_))));
        assert!(matches!(warnings[..], [AnalysisWarning::MissingPrice { .. }]));

        let p = summarize_portfolio(&[s], ymd(2024, 1, 1), &XirrOptions::default());
        assert_eq!(
            p.xirr.unwrap_err().to_string(),
            "Data unavailable for portfolio terminal value: no price for FOO"
        );
        assert_eq!(p.total_value, dec!(0));
        assert_eq!(p.total_invested, dec!(1000));
    }

    #[test]
    fn test_portfolio() {
        let val_date = ymd(2024, 1, 1);
        let prices = PriceTable::new(vec![close("BAR", val_date, pdec!(60))]);
        let tls = vec![
            timeline(vec![
                tr("FOO", ymd(2023, 1, 1), TradeSide::Buy, pdec!(10), pdec!(100)),
                tr("FOO", ymd(2023, 7, 1), TradeSide::Sell, pdec!(10), pdec!(90)),
            ]),
            timeline(vec![tr("BAR", ymd(2023, 1, 1), TradeSide::Buy, pdec!(20), pdec!(50))]),
        ];
        let summaries: Vec<_> = tls
            .iter()
            .map(|tl| summarize_holding(tl, &prices, val_date, &XirrOptions::default()).0)
            .collect();
        let p = summarize_portfolio(&summaries, val_date, &XirrOptions::default());

        assert_eq!(p.total_value, dec!(1200));
        assert_eq!(p.total_invested, dec!(1000));
        assert_eq!(p.total_realized, dec!(-100));
        assert_eq!(p.total_unrealized, dec!(200));
        // Invested 2000, got back 900 + 1200
        let r = p.xirr.unwrap();
        assert!(r > 0.0 && r < 0.10, "{}", r);
    }

    #[test]
    fn test_trade_stats() {
        let round_trip = |sym: &str, sell: PosDecimal| {
            timeline(vec![
                tr(sym, ymd(2023, 1, 1), TradeSide::Buy, pdec!(1), pdec!(10)),
                tr(sym, ymd(2023, 2, 1), TradeSide::Sell, pdec!(1), sell),
            ])
        };
        let tls = vec![
            round_trip("A", pdec!(15)),
            round_trip("B", pdec!(5)),
            round_trip("C", pdec!(12)),
            round_trip("D", pdec!(10)),
            timeline(vec![tr("E", ymd(2023, 1, 1), TradeSide::Buy, pdec!(1), pdec!(1))]),
        ];
        let stats = trade_stats(&tls, 2);
        assert_eq!(stats.trade_count, 9);
        assert_eq!(stats.net_realized, dec!(2));
        assert_eq!(
            stats.top_gainers,
            vec![("A".to_string(), dec!(5)), ("C".to_string(), dec!(2))]
        );
        assert_eq!(stats.top_losers, vec![("B".to_string(), dec!(-5))]);
        assert_eq!(stats.realized_by_instrument.len(), 5);
        assert_eq!(stats.realized_by_instrument[4], ("E".to_string(), Decimal::ZERO));
    }
}
