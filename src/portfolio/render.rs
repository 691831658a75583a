use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::{AnalysisFailure, AnalysisWarning, XirrError};
use crate::fx::convert::ConversionLogEntry;
use crate::portfolio::summary::{HoldingSummary, PortfolioSummary, TradeStats};
use crate::portfolio::{HoldingDelta, PortfolioValuationPoint};
use crate::util::decimal::{money_str, to_string_min_precision};

pub const NOT_AVAILABLE: &str = "N/A";
pub const RATE_NOT_AVAILABLE: &str = "Rate Not Available";

/// A generic table model, fed to the text, csv or json writers.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct RenderTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub footer: Vec<String>,
    pub notes: Vec<String>,
    pub errors: Vec<String>,
}

fn strs(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn opt_money_str(d: &Option<Decimal>) -> String {
    d.as_ref().map(money_str).unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn plain_str(d: &Decimal) -> String {
    to_string_min_precision(d, 0)
}

pub fn xirr_str(r: &Result<f64, XirrError>) -> String {
    match r {
        Ok(rate) => format!("{:.2}%", rate * 100.0),
        Err(_) => NOT_AVAILABLE.to_string(),
    }
}

pub fn render_holdings(holdings: &[HoldingSummary], errors: Vec<String>) -> RenderTable {
    let header = strs(&[
        "Instrument",
        "Quantity",
        "Avg Cost",
        "Total Cost",
        "Current Value",
        "Unrealized P/L",
        "Realized P/L",
        "XIRR",
    ]);

    let mut rows = Vec::with_capacity(holdings.len());
    let mut notes = Vec::new();
    for h in holdings {
        rows.push(vec![
            h.instrument.clone(),
            plain_str(&h.quantity),
            money_str(&h.average_cost),
            money_str(&h.total_cost),
            opt_money_str(&h.current_value),
            opt_money_str(&h.unrealized_gain),
            money_str(&h.realized_gain),
            xirr_str(&h.xirr),
        ]);
        if let Err(e) = &h.xirr {
            notes.push(format!("XIRR of {} not available: {}", h.instrument, e));
        }
    }

    let total_cost: Decimal = holdings.iter().map(|h| *h.total_cost).sum();
    let total_value: Decimal = holdings.iter().filter_map(|h| h.current_value).sum();
    let total_unrealized: Decimal = holdings.iter().filter_map(|h| h.unrealized_gain).sum();
    let total_realized: Decimal = holdings.iter().map(|h| h.realized_gain).sum();
    let footer = vec![
        "Total".to_string(),
        String::new(),
        String::new(),
        money_str(&total_cost),
        money_str(&total_value),
        money_str(&total_unrealized),
        money_str(&total_realized),
        String::new(),
    ];

    RenderTable {
        header,
        rows,
        footer,
        notes,
        errors,
    }
}

pub fn render_portfolio_summary(summary: &PortfolioSummary, stats: &TradeStats) -> RenderTable {
    let row = |k: &str, v: String| vec![k.to_string(), v];
    let mut notes = Vec::new();
    if let Err(e) = &summary.xirr {
        notes.push(format!("Portfolio XIRR not available: {}", e));
    }
    RenderTable {
        header: strs(&["Metric", "Value"]),
        rows: vec![
            row("Valuation Date", summary.valuation_date.to_string()),
            row("Total Value", money_str(&summary.total_value)),
            row("Total Invested", money_str(&summary.total_invested)),
            row("Unrealized P/L", money_str(&summary.total_unrealized)),
            row("Realized P/L", money_str(&summary.total_realized)),
            row("XIRR", xirr_str(&summary.xirr)),
            row("Trades", stats.trade_count.to_string()),
        ],
        notes,
        ..Default::default()
    }
}

pub fn render_valuation_series(series: &[PortfolioValuationPoint]) -> RenderTable {
    RenderTable {
        header: strs(&["Date", "Total Value"]),
        rows: series
            .iter()
            .map(|p| vec![p.date.to_string(), money_str(&p.total_value)])
            .collect(),
        ..Default::default()
    }
}

/// Gainers and losers side by side, ranked by realized P/L.
pub fn render_top_movers(stats: &TradeStats) -> RenderTable {
    let n_rows = stats.top_gainers.len().max(stats.top_losers.len());
    let cells = |v: &Vec<(String, Decimal)>, i: usize| match v.get(i) {
        Some((inst, gain)) => (inst.clone(), money_str(gain)),
        None => (String::new(), String::new()),
    };
    let rows = (0..n_rows)
        .map(|i| {
            let (g_inst, g_val) = cells(&stats.top_gainers, i);
            let (l_inst, l_val) = cells(&stats.top_losers, i);
            vec![(i + 1).to_string(), g_inst, g_val, l_inst, l_val]
        })
        .collect();
    RenderTable {
        header: strs(&["#", "Top Gainer", "Realized P/L", "Top Loser", "Realized P/L"]),
        rows,
        footer: vec![
            String::new(),
            "Net Realized".to_string(),
            money_str(&stats.net_realized),
            String::new(),
            String::new(),
        ],
        ..Default::default()
    }
}

pub fn render_conversion_log(log: &[ConversionLogEntry]) -> RenderTable {
    let rows = log
        .iter()
        .map(|e| {
            let (rate, rate_date) = match &e.rate {
                Some(r) => (to_string_min_precision(&r.rate, 2), r.date.to_string()),
                None => (RATE_NOT_AVAILABLE.to_string(), String::new()),
            };
            vec![
                e.instrument.clone(),
                e.trade_date.to_string(),
                e.pair.to_string(),
                rate,
                rate_date,
            ]
        })
        .collect();
    RenderTable {
        header: strs(&["Instrument", "Trade Date", "Pair", "Rate", "Rate Date"]),
        rows,
        ..Default::default()
    }
}

pub fn render_issues(failures: &[AnalysisFailure], warnings: &[AnalysisWarning]) -> RenderTable {
    let mut rows: Vec<Vec<String>> = failures
        .iter()
        .map(|f| vec!["Error".to_string(), f.kind().to_string(), f.to_string()])
        .collect();
    rows.extend(
        warnings
            .iter()
            .map(|w| vec!["Warning".to_string(), w.kind().to_string(), w.to_string()]),
    );
    RenderTable {
        header: strs(&["Severity", "Kind", "Detail"]),
        rows,
        ..Default::default()
    }
}

/// The trade-by-trade history of one instrument.
pub fn render_holding_deltas(deltas: &[HoldingDelta]) -> RenderTable {
    let rows = deltas
        .iter()
        .map(|d| {
            let t = &d.trade;
            vec![
                t.trade_date.to_string(),
                t.side.to_string(),
                plain_str(&t.quantity),
                money_str(&t.price),
                money_str(&t.fees),
                t.fx_rate
                    .as_ref()
                    .map(|r| to_string_min_precision(&r.rate, 2))
                    .unwrap_or_default(),
                plain_str(&d.post.quantity),
                money_str(&d.post.average_cost()),
                money_str(&d.post.total_cost),
                d.realized_gain.as_ref().map(money_str).unwrap_or_default(),
            ]
        })
        .collect();
    RenderTable {
        header: strs(&[
            "Trade Date",
            "Side",
            "Quantity",
            "Price",
            "Fees",
            "FX Rate",
            "Quantity After",
            "Avg Cost After",
            "Total Cost After",
            "Realized P/L",
        ]),
        rows,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::{
        errors::{AnalysisWarning, XirrError},
        fx::{convert::ConversionLogEntry, CurrencyPair, FxRate},
        gezdec, pdec,
        portfolio::{
            summary::{HoldingSummary, TradeStats},
            Currency,
        },
        util::date::pub_testlib::ymd,
    };

    use super::{
        render_conversion_log, render_holdings, render_issues, render_top_movers, xirr_str,
    };

    #[test]
    fn test_xirr_str() {
        assert_eq!(xirr_str(&Ok(0.1)), "10.00%");
        assert_eq!(xirr_str(&Ok(-0.0512)), "-5.12%");
        assert_eq!(xirr_str(&Err(XirrError::InsufficientData(1))), "N/A");
    }

    #[test]
    fn test_render_holdings() {
        let h = HoldingSummary {
            instrument: "FOO".to_string(),
            valuation_date: ymd(2024, 1, 1),
            quantity: gezdec!(10),
            average_cost: dec!(100),
            total_cost: gezdec!(1000),
            current_value: None,
            unrealized_gain: None,
            realized_gain: dec!(12.345),
            xirr: Err(XirrError::InsufficientData(1)),
            cash_flows: vec![],
        };
        let t = render_holdings(&[h], vec!["oops".to_string()]);
        assert_eq!(
            t.rows[0],
            vec!["FOO", "10", "100.00", "1000.00", "N/A", "N/A", "12.35", "N/A"]
        );
        assert_eq!(t.footer[3], "1000.00");
        assert_eq!(t.footer[4], "0.00");
        assert_eq!(t.notes.len(), 1);
        assert_eq!(t.errors, vec!["oops"]);
    }

    #[test]
    fn test_render_top_movers() {
        let stats = TradeStats {
            trade_count: 4,
            net_realized: dec!(3),
            realized_by_instrument: vec![],
            top_gainers: vec![("A".to_string(), dec!(5)), ("C".to_string(), dec!(3))],
            top_losers: vec![("B".to_string(), dec!(-5))],
        };
        let t = render_top_movers(&stats);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[0], vec!["1", "A", "5.00", "B", "-5.00"]);
        assert_eq!(t.rows[1], vec!["2", "C", "3.00", "", ""]);
        assert_eq!(t.footer[2], "3.00");
    }

    #[test]
    fn test_render_conversion_log() {
        let pair = CurrencyPair::new(Currency::usd(), Currency::inr());
        let log = vec![
            ConversionLogEntry {
                instrument: "AAPL".to_string(),
                trade_date: ymd(2023, 1, 2),
                pair: pair.clone(),
                rate: Some(FxRate::new(pair.clone(), ymd(2022, 12, 30), pdec!(82.7))),
            },
            ConversionLogEntry {
                instrument: "AAPL".to_string(),
                trade_date: ymd(2023, 2, 2),
                pair: pair.clone(),
                rate: None,
            },
        ];
        let t = render_conversion_log(&log);
        assert_eq!(t.rows[0], vec!["AAPL", "2023-01-02", "USD/INR", "82.70", "2022-12-30"]);
        assert_eq!(t.rows[1][3], "Rate Not Available");
    }

    #[test]
    fn test_render_issues() {
        let t = render_issues(
            &[],
            &[AnalysisWarning::Other("something".to_string())],
        );
        assert_eq!(t.rows, vec![vec!["Warning", "Warning", "something"]]);
    }
}
