use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::{
    app::{
        input_parse::{
            load_market_data, parse_home_currency, parse_valuation_date, MarketDataFiles,
            FX_RATES_FILE_NAME, PRICES_FILE_NAME, SPLITS_FILE_NAME,
        },
        run_analysis_to_console, Options, PORTAN_APP_VERSION,
    },
    fx::io::DEFAULT_FX_LOOKBACK_DAYS,
    portfolio::{csv_common::TradeCol, DEFAULT_HOME_CURRENCY},
    util::{
        date::parse_dyn_date_format,
        rw::{DescribedReader, WriteHandle},
    },
    write_errln,
};

const ABOUT: &str = "Portfolio holdings, valuation and XIRR from broker trade exports";

fn get_long_about() -> String {
    format!(
        "\
Reads one or more broker trade CSV exports, merges and de-duplicates them,
and reports current holdings (average cost), unrealized and realized P/L,
a daily portfolio valuation, and money-weighted returns (XIRR), all in a
single home currency.

Each trade CSV should contain a header with (variants of) these columns:
{}
Rows which are not orders (dividends, fees, transfers, subtotals) are skipped.

Stock splits, daily closes and exchange rates are read from CSV files. When
not provided explicitly, {}, {} and {} are used from ~/.portan/ if present.

Exchange rates are quoted as FOREIGN/HOME, and multiply a foreign amount to
produce the home currency amount.",
        TradeCol::export_order_cols().join(", "),
        SPLITS_FILE_NAME,
        PRICES_FILE_NAME,
        FX_RATES_FILE_NAME,
    )
}

#[derive(Parser, Debug)]
#[command(version = PORTAN_APP_VERSION, about = ABOUT, long_about = get_long_about())]
pub struct Args {
    #[arg(required = true)]
    csv_files: Vec<PathBuf>,

    /// Print verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Stock split table (instrument, effective date, split ratio)
    #[arg(long)]
    pub splits: Option<String>,

    /// Daily closes (instrument, date, close, currency)
    #[arg(long)]
    pub prices: Option<String>,

    /// Exchange rates (pair, date, rate). Eg. USD/INR,2024-01-02,83.2
    #[arg(long)]
    pub fx_rates: Option<String>,

    /// Currency which all amounts are reported in
    #[arg(long, default_value_t = DEFAULT_HOME_CURRENCY.to_string())]
    pub home_currency: String,

    /// Date to value the portfolio on (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub valuation_date: Option<String>,

    /// Format of how dates appear in the trade and split csv files.
    /// Dates are otherwise detected from a set of common formats.
    ///
    /// See https://time-rs.github.io/book/api/format-description.html
    #[arg(long)]
    pub date_fmt: Option<String>,

    /// How many days back to look for an exchange rate when the trade date
    /// has none (weekends, holidays)
    #[arg(long, default_value_t = DEFAULT_FX_LOOKBACK_DAYS)]
    pub fx_lookback_days: u32,

    /// Seconds to wait on each price or rate query. 0 disables the limit.
    #[arg(long, default_value_t = crate::app::DEFAULT_FETCH_TIMEOUT_SECS)]
    pub fetch_timeout_secs: u64,

    /// Include Saturdays and Sundays in the daily valuation
    #[arg(long, default_value_t = false)]
    pub include_weekends: bool,

    /// Print the trade-by-trade history of each instrument
    #[arg(long, default_value_t = false)]
    pub show_trades: bool,

    /// Write output as CSV to the specified directory.
    #[arg(short = 'd', long)]
    pub csv_output_dir: Option<String>,

    /// Write output as a single JSON document to stdout.
    #[arg(long, default_value_t = false, conflicts_with = "csv_output_dir")]
    pub json: bool,

    /// Write the normalized, converted trades to this CSV file.
    #[arg(long)]
    pub export_trades: Option<String>,
}

fn options_from_args(args: &Args) -> Result<Options, String> {
    let date_format = match &args.date_fmt {
        Some(f) => Some(parse_dyn_date_format(f)?),
        None => None,
    };
    let valuation_date = match &args.valuation_date {
        Some(d) => Some(parse_valuation_date(d)?),
        None => None,
    };
    let fetch_timeout = match args.fetch_timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    Ok(Options {
        home_currency: parse_home_currency(&args.home_currency)?,
        valuation_date,
        fx_lookback_days: args.fx_lookback_days,
        fetch_timeout,
        include_weekends: args.include_weekends,
        date_format,
        show_trades: args.show_trades,
        csv_output_dir: args.csv_output_dir.clone(),
        output_json: args.json,
        export_trades_path: args.export_trades.clone(),
        ..Options::default()
    })
}

/// Returned Err is for exit code determination only.
pub fn command_main() -> Result<(), ()> {
    crate::tracing::setup_tracing();

    let args = Args::parse();
    crate::log::set_verbose(args.verbose);
    tracing::debug!("command_main: {:?}", args);

    let mut err_printer = WriteHandle::stderr_write_handle();

    let options = options_from_args(&args).map_err(|e| {
        write_errln!(err_printer, "Error: {}", e);
    })?;

    let files = MarketDataFiles::resolve(
        args.splits.as_deref(),
        args.prices.as_deref(),
        args.fx_rates.as_deref(),
    );
    let market = load_market_data(
        &files,
        &options.home_currency,
        &options.date_format,
        &mut err_printer,
    )
    .map_err(|e| {
        write_errln!(err_printer, "Error: {}", e);
    })?;

    let trade_readers: Vec<DescribedReader> = args
        .csv_files
        .iter()
        .map(|p| DescribedReader::from_file_path(p.clone()))
        .collect();

    run_analysis_to_console(&trade_readers, market, options, err_printer)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use crate::{portfolio::Currency, util::date::pub_testlib::ymd};

    use super::{options_from_args, Args};

    #[test]
    fn test_options_from_args() {
        let args = Args::try_parse_from([
            "portan",
            "a.csv",
            "b.csv",
            "--home-currency",
            "usd",
            "--valuation-date",
            "2024-03-31",
            "--fetch-timeout-secs",
            "0",
            "--json",
        ])
        .unwrap();
        assert_eq!(args.csv_files.len(), 2);
        let opts = options_from_args(&args).unwrap();
        assert_eq!(opts.home_currency, Currency::usd());
        assert_eq!(opts.valuation_date, Some(ymd(2024, 3, 31)));
        assert_eq!(opts.fetch_timeout, None);
        assert_eq!(opts.fx_lookback_days, 7);
        assert!(opts.output_json);

        let args =
            Args::try_parse_from(["portan", "a.csv", "--valuation-date", "31/03/2024"]).unwrap();
        let _ = options_from_args(&args).unwrap_err();

        let _ = Args::try_parse_from(["portan"]).unwrap_err();
        let _ = Args::try_parse_from(["portan", "a.csv", "--json", "-d", "out"]).unwrap_err();
    }
}
