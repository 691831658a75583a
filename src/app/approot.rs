use std::fs::File;
use std::time::Duration as StdDuration;

use time::{Date, Duration};

use crate::{
    errors::{AnalysisError, AnalysisFailure, AnalysisWarning},
    fx::{
        convert::{convert_price_points, convert_trades, ConversionLogEntry},
        io::{FxRateSource, RateLoader, DEFAULT_FX_LOOKBACK_DAYS},
    },
    market::{fetch_all_prices, PriceSource},
    portfolio::{
        bookkeeping::{
            split_trades_by_instrument, trades_to_holding_deltas, value_portfolio,
            HoldingTimeline, PriceTable, ValuationOptions,
        },
        io::trade_csv::{write_trades_csv, TradeCsvParseOptions},
        normalize::normalize_trade_files,
        render::{
            render_conversion_log, render_holding_deltas, render_holdings, render_issues,
            render_portfolio_summary, render_top_movers, render_valuation_series, RenderTable,
        },
        splits::{adjust_for_splits, SplitTable},
        summary::{
            summarize_holding, summarize_portfolio, trade_stats, HoldingSummary,
            PortfolioSummary, TradeStats, DEFAULT_TOP_MOVERS,
        },
        xirr::XirrOptions,
        ConvertedTrades, Currency, Instrument, PortfolioValuationPoint,
    },
    util::{
        date::{today_local, DynDateFormat},
        rw::{DescribedReader, WriteHandle},
    },
    verboseln, write_errln,
};

use super::outfmt::{
    csv::CsvWriter,
    json::JsonWriter,
    model::{OutputType, ReportWriter},
    text::TextWriter,
};

pub type Error = String;

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

#[derive(Debug)]
pub struct Options {
    pub home_currency: Currency,
    /// Defaults to today.
    pub valuation_date: Option<Date>,
    pub fx_lookback_days: u32,
    pub fetch_timeout: Option<StdDuration>,
    pub include_weekends: bool,
    pub date_format: Option<DynDateFormat>,
    pub xirr: XirrOptions,
    pub show_trades: bool,
    pub csv_output_dir: Option<String>,
    pub output_json: bool,
    pub export_trades_path: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            home_currency: Currency::default_home(),
            valuation_date: None,
            fx_lookback_days: DEFAULT_FX_LOOKBACK_DAYS,
            fetch_timeout: Some(StdDuration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS)),
            include_weekends: false,
            date_format: None,
            xirr: XirrOptions::default(),
            show_trades: false,
            csv_output_dir: None,
            output_json: false,
            export_trades_path: None,
        }
    }
}

/// Everything besides the trades which the analysis consumes.
pub struct MarketData {
    pub splits: SplitTable,
    pub price_source: Box<dyn PriceSource>,
    pub fx_source: Box<dyn FxRateSource>,
    /// Issues met while loading the above, reported with the results.
    pub load_failures: Vec<AnalysisFailure>,
    pub load_warnings: Vec<AnalysisWarning>,
}

#[derive(Debug)]
pub struct PortfolioAnalysis {
    pub home_currency: Currency,
    pub start_date: Date,
    pub valuation_date: Date,
    pub trades: ConvertedTrades,
    /// Instruments which replayed cleanly. Only these are valued.
    pub timelines: Vec<HoldingTimeline>,
    /// Instruments stopped by an overdraft, with the deltas before it.
    pub overdrafted: Vec<HoldingTimeline>,
    pub holdings: Vec<HoldingSummary>,
    pub portfolio: PortfolioSummary,
    pub stats: TradeStats,
    pub series: Vec<PortfolioValuationPoint>,
    pub conversion_log: Vec<ConversionLogEntry>,
    pub rows_read: usize,
    pub duplicates_dropped: usize,
    /// In pipeline order.
    pub failures: Vec<AnalysisFailure>,
    pub warnings: Vec<AnalysisWarning>,
}

/// Runs the whole pipeline: normalize, split-adjust, convert, replay
/// holdings, fetch prices, value, and solve returns.
///
/// Row and instrument failures are collected in the result. Only a run
/// with no usable trades at all, or inconsistent options, is an Err.
pub async fn run_analysis(
    trade_readers: &[DescribedReader],
    market: MarketData,
    options: &Options,
    err_printer: &mut WriteHandle,
) -> Result<PortfolioAnalysis, AnalysisError> {
    let MarketData {
        splits,
        price_source,
        fx_source,
        load_failures,
        load_warnings,
    } = market;
    let mut failures = load_failures;
    let mut warnings = load_warnings;

    let parse_options = TradeCsvParseOptions {
        date_format: options.date_format.clone(),
        home_currency: options.home_currency.clone(),
    };
    let normalized = normalize_trade_files(trade_readers, &parse_options, err_printer);
    failures.extend(normalized.failures);
    warnings.extend(normalized.warnings);
    if normalized.trades.is_empty() {
        return Err(AnalysisError::NoValidTrades { failures });
    }
    verboseln!(
        "Read {} trades ({} rows, {} duplicates dropped)",
        normalized.trades.len(),
        normalized.rows_read,
        normalized.duplicates_dropped
    );

    let adjusted = adjust_for_splits(normalized.trades, &splits);

    let mut rate_loader =
        RateLoader::new(fx_source, options.fx_lookback_days, options.fetch_timeout);
    let conversion = convert_trades(adjusted, &options.home_currency, &mut rate_loader).await;
    failures.extend(conversion.failures.into_iter().map(AnalysisFailure::from));
    let trades = conversion.trades;
    if trades.trades.is_empty() {
        return Err(AnalysisError::NoValidTrades { failures });
    }

    // Trades are sorted, so the ends of the list bound the window.
    let (start_date, last_trade_date) = match (trades.trades.first(), trades.trades.last()) {
        (Some(first), Some(last)) => (first.trade_date, last.trade_date),
        _ => return Err(AnalysisError::NoValidTrades { failures }),
    };
    let valuation_date = options.valuation_date.unwrap_or_else(today_local);
    if valuation_date < last_trade_date {
        return Err(AnalysisError::Input(format!(
            "Valuation date {} is before the last trade ({})",
            valuation_date, last_trade_date
        )));
    }

    let mut timelines = Vec::new();
    let mut overdrafted = Vec::new();
    for (instrument, inst_trades) in split_trades_by_instrument(trades.trades.clone()) {
        let res = trades_to_holding_deltas(&instrument, &inst_trades);
        match res.0 {
            Ok(deltas) => timelines.push(HoldingTimeline::new(&instrument, deltas)),
            Err(e) => {
                failures.push(AnalysisFailure::Overdraft(e.err));
                overdrafted.push(HoldingTimeline::new(&instrument, e.partial_deltas));
            }
        }
    }

    let instruments: Vec<Instrument> =
        timelines.iter().map(|tl| tl.instrument.clone()).collect();
    let price_start =
        start_date.saturating_sub(Duration::days(options.fx_lookback_days as i64));
    verboseln!(
        "Fetching prices of {} instrument(s) from {} to {}",
        instruments.len(),
        price_start,
        valuation_date
    );
    let fetched = fetch_all_prices(
        price_source.as_ref(),
        &instruments,
        price_start,
        valuation_date,
        options.fetch_timeout,
    )
    .await;
    failures.extend(fetched.unavailable.into_iter().map(AnalysisFailure::from));

    // Instruments are fetched in a fixed order, so that conversion (and
    // the warnings it produces) is deterministic.
    let mut raw_points = Vec::new();
    let mut fetched_prices = fetched.prices;
    for instrument in &instruments {
        if let Some(points) = fetched_prices.remove(instrument) {
            raw_points.extend(points);
        }
    }
    let (points, price_warnings) =
        convert_price_points(raw_points, &options.home_currency, &mut rate_loader).await;
    warnings.extend(price_warnings);
    warnings.extend(
        rate_loader
            .take_unavailable()
            .into_iter()
            .map(|e| AnalysisWarning::Other(e.to_string())),
    );
    let prices = PriceTable::new(points);

    let valuation = value_portfolio(
        &timelines,
        &prices,
        start_date,
        valuation_date,
        &ValuationOptions {
            include_weekends: options.include_weekends,
        },
    );
    warnings.extend(valuation.warnings);

    let mut holdings = Vec::with_capacity(timelines.len());
    for tl in &timelines {
        // Price warnings on valuation_date were already reported by the
        // valuation, which always includes that date.
        let (summary, _) = summarize_holding(tl, &prices, valuation_date, &options.xirr);
        if let Err(err) = &summary.xirr {
            failures.push(AnalysisFailure::Xirr {
                instrument: summary.instrument.clone(),
                err: err.clone(),
            });
        }
        holdings.push(summary);
    }
    let portfolio = summarize_portfolio(&holdings, valuation_date, &options.xirr);
    let stats = trade_stats(&timelines, DEFAULT_TOP_MOVERS);

    Ok(PortfolioAnalysis {
        home_currency: options.home_currency.clone(),
        start_date,
        valuation_date,
        trades,
        timelines,
        overdrafted,
        holdings,
        portfolio,
        stats,
        series: valuation.series,
        conversion_log: conversion.log,
        rows_read: normalized.rows_read,
        duplicates_dropped: normalized.duplicates_dropped,
        failures,
        warnings,
    })
}

pub fn blocking_run_analysis(
    trade_readers: &[DescribedReader],
    market: MarketData,
    options: &Options,
    err_printer: &mut WriteHandle,
) -> Result<PortfolioAnalysis, AnalysisError> {
    async_std::task::block_on(run_analysis(trade_readers, market, options, err_printer))
}

pub struct AppRenderResult {
    pub portfolio_table: RenderTable,
    pub holdings_table: RenderTable,
    pub valuation_table: RenderTable,
    pub top_movers_table: RenderTable,
    pub conversion_log_table: RenderTable,
    pub issues_table: RenderTable,
    /// Per instrument, sorted by instrument. Empty unless requested.
    pub trade_tables: Vec<(Instrument, RenderTable)>,
}

pub fn render_analysis(analysis: &PortfolioAnalysis, show_trades: bool) -> AppRenderResult {
    let overdraft_errors: Vec<String> = analysis
        .failures
        .iter()
        .filter(|f| matches!(f, AnalysisFailure::Overdraft(_)))
        .map(|f| format!("{} (excluded from valuation)", f))
        .collect();

    let mut trade_tables = Vec::new();
    if show_trades {
        let mut all: Vec<&HoldingTimeline> =
            analysis.timelines.iter().chain(analysis.overdrafted.iter()).collect();
        all.sort_by(|a, b| a.instrument.cmp(&b.instrument));
        for tl in all {
            let mut table = render_holding_deltas(&tl.deltas);
            if analysis.overdrafted.iter().any(|o| o.instrument == tl.instrument) {
                table.errors.extend(
                    analysis
                        .failures
                        .iter()
                        .filter_map(|f| match f {
                            AnalysisFailure::Overdraft(e) if e.instrument == tl.instrument => {
                                Some(e.to_string())
                            }
                            _ => None,
                        }),
                );
            }
            trade_tables.push((tl.instrument.clone(), table));
        }
    }

    let mut portfolio_table = render_portfolio_summary(&analysis.portfolio, &analysis.stats);
    portfolio_table.notes.push(format!(
        "Amounts in {}. {} row(s) read, {} duplicate trade(s) dropped.",
        analysis.home_currency, analysis.rows_read, analysis.duplicates_dropped
    ));

    AppRenderResult {
        portfolio_table,
        holdings_table: render_holdings(&analysis.holdings, overdraft_errors),
        valuation_table: render_valuation_series(&analysis.series),
        top_movers_table: render_top_movers(&analysis.stats),
        conversion_log_table: render_conversion_log(&analysis.conversion_log),
        issues_table: render_issues(&analysis.failures, &analysis.warnings),
        trade_tables,
    }
}

fn write_render_result(
    render_res: &AppRenderResult,
    writer: &mut dyn ReportWriter,
) -> Result<(), Error> {
    for (inst, table) in &render_res.trade_tables {
        writer
            .print_render_table(OutputType::Trades, inst, table)
            .map_err(|e| format!("Rendering trades for {inst}: {e}"))?;
    }

    let tables = [
        (OutputType::ValuationSeries, &render_res.valuation_table),
        (OutputType::ConversionLog, &render_res.conversion_log_table),
        (OutputType::TopMovers, &render_res.top_movers_table),
        (OutputType::Holdings, &render_res.holdings_table),
        (OutputType::PortfolioSummary, &render_res.portfolio_table),
        (OutputType::Issues, &render_res.issues_table),
    ];
    for (out_type, table) in tables {
        writer
            .print_render_table(out_type, "", table)
            .map_err(|e| format!("Rendering {}: {e}", out_type.base_name()))?;
    }
    Ok(())
}

fn export_trades(analysis: &PortfolioAnalysis, path: &str) -> Result<(), Error> {
    let mut fp = File::create(path).map_err(|e| format!("Failed to create {path}: {e}"))?;
    write_trades_csv(&analysis.trades.trades, &mut fp)
        .map_err(|e| format!("Failed to write trades to {path}: {e}"))
}

/// Returned Err is for exit code determination only.
/// All errors are written to err_printer.
pub fn run_analysis_to_writer(
    writer: &mut dyn ReportWriter,
    trade_readers: &[DescribedReader],
    market: MarketData,
    options: &Options,
    mut err_printer: WriteHandle,
) -> Result<PortfolioAnalysis, ()> {
    let analysis = match blocking_run_analysis(trade_readers, market, options, &mut err_printer)
    {
        Ok(a) => a,
        Err(e) => {
            write_errln!(err_printer, "Error: {}", e);
            if let AnalysisError::NoValidTrades { failures } = &e {
                for f in failures {
                    write_errln!(err_printer, "  {}", f);
                }
            }
            return Err(());
        }
    };

    if let Some(path) = &options.export_trades_path {
        if let Err(e) = export_trades(&analysis, path) {
            write_errln!(err_printer, "{}", e);
            return Err(());
        }
        verboseln!("Wrote {} trades to {}", analysis.trades.trades.len(), path);
    }

    let render_res = render_analysis(&analysis, options.show_trades);
    if let Err(e) = write_render_result(&render_res, writer) {
        write_errln!(err_printer, "{}", e);
        return Err(());
    }

    if !analysis.failures.is_empty() {
        write_errln!(
            err_printer,
            "[!] {} issue(s) were encountered. See the issues table.",
            analysis.failures.len()
        );
    }
    Ok(analysis)
}

pub fn run_analysis_to_console(
    trade_readers: &[DescribedReader],
    market: MarketData,
    options: Options,
    mut err_printer: WriteHandle,
) -> Result<(), ()> {
    let mut writer: Box<dyn ReportWriter> = if options.output_json {
        Box::new(JsonWriter::new(WriteHandle::stdout_write_handle()))
    } else if let Some(dir_path) = &options.csv_output_dir {
        match CsvWriter::new(dir_path) {
            Ok(w) => Box::new(w),
            Err(e) => {
                write_errln!(err_printer, "Failed to create {}: {}", dir_path, e);
                return Err(());
            }
        }
    } else {
        Box::new(TextWriter::new(WriteHandle::stdout_write_handle()))
    };

    run_analysis_to_writer(
        writer.as_mut(),
        trade_readers,
        market,
        &options,
        err_printer.clone(),
    )?;

    writer.finish().map_err(|e| {
        write_errln!(err_printer, "{}", e);
    })
}

// MARK: Tests
#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::{
        app::outfmt::{model::ReportWriter, text::TextWriter},
        errors::{AnalysisError, AnalysisFailure},
        fx::{
            io::{pub_testlib::MockFxRateSource, CsvFxRateSource},
            CurrencyPair, FxRate,
        },
        gezdec,
        market::{pub_testlib::MockPriceSource, CsvPriceSource},
        pdec,
        portfolio::{
            io::trade_csv::testlib::{CsvFileBuilder, TestTradeCsvRow as Row},
            render::RenderTable,
            splits::SplitTable,
            Currency, PricePoint,
        },
        testlib::{assert_approx_eq, assert_re},
        util::{date::pub_testlib::ymd, rw::WriteHandle},
    };

    use super::{blocking_run_analysis, render_analysis, MarketData, Options};

    fn smoke_test_render(render_table: &RenderTable) {
        let wh = if std::env::var("VERBOSE").unwrap_or_default().is_empty() {
            WriteHandle::empty_write_handle()
        } else {
            WriteHandle::stderr_write_handle()
        };
        let mut w = TextWriter::new(wh);
        w.print_render_table(
            crate::app::outfmt::model::OutputType::Holdings,
            "",
            render_table,
        )
        .unwrap();
    }

    fn no_market_data() -> MarketData {
        MarketData {
            splits: SplitTable::default(),
            price_source: Box::new(CsvPriceSource::empty()),
            fx_source: Box::new(CsvFxRateSource::empty()),
            load_failures: vec![],
            load_warnings: vec![],
        }
    }

    fn close(sym: &str, d: time::Date, c: crate::util::decimal::PosDecimal) -> PricePoint {
        PricePoint {
            instrument: sym.to_string(),
            date: d,
            close: c,
            currency: Currency::inr(),
        }
    }

    fn opts_at(valuation_date: time::Date) -> Options {
        Options {
            valuation_date: Some(valuation_date),
            fetch_timeout: None,
            ..Options::default()
        }
    }

    #[test]
    fn test_round_trip_position() {
        let readers = CsvFileBuilder::with_standard_headers().split_csv_rows(
            &[2],
            &[
                Row { sym: "FOO", td: "2023-01-01", ty: "Buy", q: "10", p: "100", ..Row::default() },
                Row { sym: "FOO", td: "2023-06-01", ty: "Sell", q: "10", p: "120", ..Row::default() },
            ],
        );
        let analysis = blocking_run_analysis(
            &readers,
            no_market_data(),
            &opts_at(ymd(2023, 6, 1)),
            &mut WriteHandle::empty_write_handle(),
        )
        .unwrap();

        assert_eq!(analysis.holdings.len(), 1);
        let h = &analysis.holdings[0];
        assert_eq!(h.quantity, gezdec!(0));
        assert_eq!(h.realized_gain, dec!(200));
        let expected = 1.2f64.powf(365.0 / 151.0) - 1.0;
        assert_approx_eq(h.xirr.clone().unwrap(), expected, 1e-8);
        assert_approx_eq(analysis.portfolio.xirr.clone().unwrap(), expected, 1e-8);
        assert_eq!(analysis.failures, vec![]);

        let render_res = render_analysis(&analysis, true);
        smoke_test_render(&render_res.holdings_table);
        assert_eq!(render_res.trade_tables.len(), 1);
        assert_eq!(render_res.holdings_table.rows[0][6], "200.00");
    }

    #[test]
    fn test_overdraft_is_isolated() {
        let readers = CsvFileBuilder::with_standard_headers().split_csv_rows(
            &[3],
            &[
                Row { sym: "FOO", td: "2023-01-02", ty: "Sell", q: "5", p: "1", ..Row::default() },
                Row { sym: "BAR", td: "2023-01-02", ty: "Buy", q: "5", p: "1", ..Row::default() },
                Row { sym: "BAR", td: "2023-06-01", ty: "Buy", q: "5", p: "1", ..Row::default() },
            ],
        );
        let mut market = no_market_data();
        market.price_source = Box::new(MockPriceSource::new(vec![close(
            "BAR",
            ymd(2023, 6, 1),
            pdec!(1.1),
        )]));
        let analysis = blocking_run_analysis(
            &readers,
            market,
            &opts_at(ymd(2023, 6, 1)),
            &mut WriteHandle::empty_write_handle(),
        )
        .unwrap();

        assert_eq!(analysis.holdings.len(), 1);
        assert_eq!(analysis.holdings[0].instrument, "BAR");
        assert_eq!(analysis.portfolio.total_value, dec!(11));
        assert!(analysis.holdings[0].xirr.is_ok());
        assert_eq!(analysis.overdrafted.len(), 1);
        assert!(matches!(analysis.failures[..], [AnalysisFailure::Overdraft(_)]));

        let render_res = render_analysis(&analysis, false);
        assert_re("is more than the current holdings", &render_res.holdings_table.errors[0]);
        assert!(render_res.trade_tables.is_empty());
    }

    #[test]
    fn test_foreign_trades_and_prices() {
        let readers = CsvFileBuilder::with_standard_headers().split_csv_rows(
            &[2],
            &[
                Row { sym: "AAPL", td: "2023-01-02", ty: "Buy", q: "2", p: "100", cur: "USD", fee: "-1", ..Row::default() },
                Row { sym: "AAPL", td: "2023-03-01", ty: "Buy", q: "2", p: "100", cur: "USD", ..Row::default() },
            ],
        );
        let usd_inr = CurrencyPair::new(Currency::usd(), Currency::inr());
        let mut market = no_market_data();
        market.fx_source = Box::new(MockFxRateSource::new(vec![
            FxRate::new(usd_inr.clone(), ymd(2022, 12, 30), pdec!(80)),
            FxRate::new(usd_inr.clone(), ymd(2023, 1, 10), pdec!(81)),
        ]));
        market.price_source = Box::new(MockPriceSource::new(vec![PricePoint {
            instrument: "AAPL".to_string(),
            date: ymd(2023, 1, 10),
            close: pdec!(110),
            currency: Currency::usd(),
        }]));

        let analysis = blocking_run_analysis(
            &readers,
            market,
            &opts_at(ymd(2023, 3, 1)),
            &mut WriteHandle::empty_write_handle(),
        )
        .unwrap();

        // The March trade has no rate within a week, and is excluded.
        assert_eq!(analysis.trades.trades.len(), 1);
        assert!(matches!(analysis.failures[0], AnalysisFailure::MissingRate(_)));
        let h = &analysis.holdings[0];
        assert_eq!(h.total_cost, gezdec!(16080));
        assert_eq!(h.current_value, Some(dec!(17820)));
        assert_eq!(analysis.conversion_log.len(), 2);
    }

    #[test]
    fn test_no_valid_trades() {
        let readers = CsvFileBuilder::with_standard_headers().split_csv_rows(
            &[1],
            &[Row { sym: "FOO", td: "not a date", ty: "Buy", q: "1", p: "1", ..Row::default() }],
        );
        let err = blocking_run_analysis(
            &readers,
            no_market_data(),
            &opts_at(ymd(2023, 1, 3)),
            &mut WriteHandle::empty_write_handle(),
        )
        .unwrap_err();
        match err {
            AnalysisError::NoValidTrades { failures } => {
                assert!(matches!(failures[..], [AnalysisFailure::MalformedRecord(_)]));
            }
            _ => panic!("{:?}", err),
        }
    }

    #[test]
    fn test_valuation_date_before_last_trade() {
        let readers = CsvFileBuilder::with_standard_headers().split_csv_rows(
            &[1],
            &[Row { sym: "FOO", td: "2023-01-05", ty: "Buy", q: "1", p: "1", ..Row::default() }],
        );
        let err = blocking_run_analysis(
            &readers,
            no_market_data(),
            &opts_at(ymd(2023, 1, 3)),
            &mut WriteHandle::empty_write_handle(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            AnalysisError::Input(
                "Valuation date 2023-01-03 is before the last trade (2023-01-05)".to_string()
            )
        );
    }
}
