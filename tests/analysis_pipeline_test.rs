mod common;

use rust_decimal_macros::dec;

use portan::{
    app::{
        blocking_run_analysis, input_parse::load_market_data, outfmt::text::TextWriter,
        run_analysis_to_writer, MarketData, Options,
    },
    errors::{AnalysisFailure, AnalysisWarning},
    gezdec,
    testlib::{assert_approx_eq, assert_vec_eq},
    util::{
        date::pub_testlib::ymd,
        rw::{DescribedReader, WriteHandle},
    },
};

use common::{csv_reader, market_files, options_at};

const TRADES_HEADER: &str = "instrument,trade date,type,quantity,price,currency,fees\n";

fn market(splits: &str, prices: &str, fx_rates: &str, options: &Options) -> MarketData {
    load_market_data(
        &market_files(splits, prices, fx_rates),
        &options.home_currency,
        &options.date_format,
        &mut WriteHandle::empty_write_handle(),
    )
    .unwrap()
}

fn trades_file(name: &str, rows: &str) -> DescribedReader {
    csv_reader(name, &format!("{}{}", TRADES_HEADER, rows))
}

#[test]
fn test_buy_then_sell_report() {
    let options = options_at(2023, 6, 1);
    let readers = vec![trades_file(
        "trades.csv",
        "FOO,2023-01-01,Buy,10,100,INR,0\n\
         FOO,2023-06-01,Sell,10,120,INR,0\n",
    )];

    let (out, out_buff) = WriteHandle::string_buff_write_handle();
    let (err, err_buff) = WriteHandle::string_buff_write_handle();
    let mut writer = TextWriter::new(out);
    let analysis = run_analysis_to_writer(
        &mut writer,
        &readers,
        market("", "", "", &options),
        &options,
        err,
    )
    .unwrap();

    assert_eq!(err_buff.borrow().as_str(), "");
    let h = &analysis.holdings[0];
    assert_eq!(h.quantity, gezdec!(0));
    assert_eq!(h.realized_gain, dec!(200));
    assert_approx_eq(h.xirr.clone().unwrap(), 1.2f64.powf(365.0 / 151.0) - 1.0, 1e-8);

    let text = out_buff.borrow().as_str().to_string();
    assert!(text.contains("Holdings\n"), "{}", text);
    assert!(text.contains("Portfolio Summary\n"), "{}", text);
    assert!(text.contains(" 200.00 "), "{}", text);
}

#[test]
fn test_repeated_upload_is_idempotent() {
    let options = options_at(2024, 3, 1);
    let rows = "FOO,2024-01-02,Buy,10,100,INR,1\n\
                FOO,2024-01-02,Buy,10,100,INR,1\n\
                BAR,2024-01-03,Buy,5,20,INR,0\n\
                FOO,2024-02-01,Sell,4,110,INR,1\n";

    let once = blocking_run_analysis(
        &[trades_file("jan.csv", rows)],
        market("", "", "", &options),
        &options,
        &mut WriteHandle::empty_write_handle(),
    )
    .unwrap();
    let twice = blocking_run_analysis(
        &[trades_file("jan.csv", rows), trades_file("jan-again.csv", rows)],
        market("", "", "", &options),
        &options,
        &mut WriteHandle::empty_write_handle(),
    )
    .unwrap();

    // Identical rows within one file are kept as separate trades.
    assert_eq!(once.trades.trades.len(), 4);
    assert_eq!(once.duplicates_dropped, 0);
    assert_eq!(twice.duplicates_dropped, 4);

    let strip = |a: &portan::app::PortfolioAnalysis| {
        a.trades
            .trades
            .iter()
            .map(|t| {
                (
                    t.instrument.clone(),
                    t.trade_date,
                    t.side,
                    t.quantity,
                    t.price,
                    t.fees,
                )
            })
            .collect::<Vec<_>>()
    };
    assert_vec_eq(strip(&once), strip(&twice));
    assert_eq!(once.holdings, twice.holdings);
}

#[test]
fn test_split_adjusted_history() {
    let options = options_at(2023, 4, 3);
    let readers = vec![trades_file(
        "trades.csv",
        "FOO,2023-01-02,Buy,10,100,INR,0\n\
         FOO,2023-04-03,Sell,20,60,INR,0\n",
    )];
    let splits = "instrument,effective date,split ratio\nFOO,2023-03-01,2:1\n";

    let analysis = blocking_run_analysis(
        &readers,
        market(splits, "", "", &options),
        &options,
        &mut WriteHandle::empty_write_handle(),
    )
    .unwrap();

    assert_eq!(analysis.failures, vec![]);
    let buy = &analysis.trades.trades[0];
    assert_eq!(*buy.quantity, dec!(20));
    assert_eq!(*buy.price, dec!(50));
    assert_eq!(analysis.holdings[0].quantity, gezdec!(0));
    assert_eq!(analysis.holdings[0].realized_gain, dec!(200));
}

#[test]
fn test_reverse_split_then_full_sell() {
    let options = options_at(2023, 3, 1);
    let readers = vec![trades_file(
        "trades.csv",
        "FOO,2023-01-02,Buy,9,10,INR,0\n\
         FOO,2023-03-01,Sell,3,30,INR,0\n",
    )];
    let splits = "instrument,effective date,split ratio\nFOO,2023-02-01,1:3\n";

    let analysis = blocking_run_analysis(
        &readers,
        market(splits, "", "", &options),
        &options,
        &mut WriteHandle::empty_write_handle(),
    )
    .unwrap();

    assert_eq!(analysis.failures, vec![]);
    assert!(analysis.overdrafted.is_empty());
    assert_eq!(*analysis.trades.trades[0].quantity, dec!(3));
    assert_eq!(analysis.holdings[0].quantity, gezdec!(0));
    assert_eq!(analysis.holdings[0].realized_gain, dec!(0));
}

#[test]
fn test_foreign_trade_uses_lookback_rate() {
    let options = options_at(2024, 1, 22);
    let readers = vec![trades_file(
        "trades.csv",
        "AAPL,2024-01-08,Buy,2,100,USD,0\n\
         AAPL,2024-01-22,Buy,2,100,USD,0\n",
    )];
    // Only a Friday rate, two weeks before the second trade.
    let fx = "pair,date,rate\nUSD/INR,2024-01-05,83\n";
    let prices = "instrument,date,close,currency\nAAPL,2024-01-08,100,USD\n";

    let analysis = blocking_run_analysis(
        &readers,
        market("", prices, fx, &options),
        &options,
        &mut WriteHandle::empty_write_handle(),
    )
    .unwrap();

    assert_eq!(analysis.trades.trades.len(), 1);
    let t = &analysis.trades.trades[0];
    assert_eq!(*t.price, dec!(8300));
    assert_eq!(t.fx_rate.as_ref().unwrap().date, ymd(2024, 1, 5));

    assert!(matches!(
        analysis.failures[..],
        [AnalysisFailure::MissingRate(ref e)] if e.date == ymd(2024, 1, 22)
    ));
    assert_eq!(analysis.conversion_log.len(), 2);
    assert!(analysis.conversion_log[1].rate.is_none());

    // The close on 2024-01-08 is converted at the same lookback rate.
    assert_eq!(analysis.holdings[0].current_value, Some(dec!(16600)));
}

#[test]
fn test_stale_prices_are_warnings() {
    let options = options_at(2024, 1, 2);
    let readers = vec![trades_file("trades.csv", "FOO,2023-01-02,Buy,10,10,INR,0\n")];
    let prices = "instrument,date,close\nFOO,2023-01-02,11\n";

    let analysis = blocking_run_analysis(
        &readers,
        market("", prices, "", &options),
        &options,
        &mut WriteHandle::empty_write_handle(),
    )
    .unwrap();

    assert_eq!(analysis.failures, vec![]);
    assert!(!analysis.warnings.is_empty());
    assert!(analysis
        .warnings
        .iter()
        .all(|w| matches!(w, AnalysisWarning::StalePrice(_))));

    let last = analysis.series.last().unwrap();
    assert_eq!(last.date, ymd(2024, 1, 2));
    assert_eq!(last.total_value, dec!(110));
    assert_eq!(analysis.portfolio.total_unrealized, dec!(10));
    assert_approx_eq(analysis.portfolio.xirr.clone().unwrap(), 0.1, 1e-8);
}

#[test]
fn test_unreadable_trade_file_is_isolated() {
    let options = options_at(2024, 1, 3);
    let readers = vec![
        DescribedReader::from_file_path("/surely/not/a/real/path.csv".into()),
        trades_file("trades.csv", "FOO,2024-01-02,Buy,1,10,INR,0\n"),
    ];
    let analysis = blocking_run_analysis(
        &readers,
        market("", "", "", &options),
        &options,
        &mut WriteHandle::empty_write_handle(),
    )
    .unwrap();
    assert_eq!(analysis.trades.trades.len(), 1);
    assert!(matches!(analysis.failures[0], AnalysisFailure::InvalidFile { .. }));
}
