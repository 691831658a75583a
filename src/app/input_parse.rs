use std::path::PathBuf;

use time::Date;

use crate::{
    errors::{AnalysisFailure, AnalysisWarning},
    fx::io::{CsvFxRateSource, FxRateSource},
    market::{CsvPriceSource, PriceSource},
    portfolio::{io::split_csv::parse_split_csv, splits::SplitTable, Currency},
    util::{
        basic::SError,
        date::{parse_standard_date, DynDateFormat},
        os::existing_data_file,
        rw::{DescribedReader, WriteHandle},
    },
};

use super::MarketData;

pub type Error = String;

pub const SPLITS_FILE_NAME: &str = "stock_splits.csv";
pub const PRICES_FILE_NAME: &str = "prices.csv";
pub const FX_RATES_FILE_NAME: &str = "fx_rates.csv";

pub fn parse_valuation_date(s: &str) -> Result<Date, Error> {
    parse_standard_date(s.trim()).map_err(|e| format!("Invalid valuation date '{s}': {e}"))
}

pub fn parse_home_currency(s: &str) -> Result<Currency, Error> {
    Currency::parse(s).map(|c| Currency::new(&c.as_str().to_uppercase()))
}

/// An explicitly provided path always wins. Otherwise, falls back to a file
/// of default_name in the data directory, if one exists.
pub fn resolve_data_file(explicit: Option<&str>, default_name: &str) -> Option<DescribedReader> {
    match explicit {
        Some(p) => Some(DescribedReader::from_file_path(PathBuf::from(p))),
        None => existing_data_file(default_name).map(DescribedReader::from_file_path),
    }
}

/// Malformed rows are returned as failures. A file which cannot be read at
/// all, or which contains conflicting splits, is an Err.
pub fn load_split_table(
    reader: Option<&DescribedReader>,
    date_format: &Option<DynDateFormat>,
    err_stream: &mut WriteHandle,
) -> Result<(SplitTable, Vec<AnalysisFailure>, Vec<AnalysisWarning>), SError> {
    let Some(reader) = reader else {
        return Ok((SplitTable::default(), Vec::new(), Vec::new()));
    };
    let parsed =
        parse_split_csv(reader, date_format, err_stream).map_err(|e| e.to_string())?;
    let failures = parsed.malformed.into_iter().map(AnalysisFailure::from).collect();
    let (table, warnings) = SplitTable::try_from_events(parsed.events)
        .map_err(|e| format!("{}: {}", reader.desc(), e))?;
    Ok((table, failures, warnings))
}

pub struct MarketDataFiles {
    pub splits: Option<DescribedReader>,
    pub prices: Option<DescribedReader>,
    pub fx_rates: Option<DescribedReader>,
}

impl MarketDataFiles {
    pub fn resolve(
        splits: Option<&str>,
        prices: Option<&str>,
        fx_rates: Option<&str>,
    ) -> MarketDataFiles {
        MarketDataFiles {
            splits: resolve_data_file(splits, SPLITS_FILE_NAME),
            prices: resolve_data_file(prices, PRICES_FILE_NAME),
            fx_rates: resolve_data_file(fx_rates, FX_RATES_FILE_NAME),
        }
    }
}

pub fn load_market_data(
    files: &MarketDataFiles,
    home_currency: &Currency,
    date_format: &Option<DynDateFormat>,
    err_stream: &mut WriteHandle,
) -> Result<MarketData, SError> {
    let (splits, load_failures, load_warnings) =
        load_split_table(files.splits.as_ref(), date_format, err_stream)?;

    let price_source: Box<dyn PriceSource> = match &files.prices {
        Some(r) => Box::new(CsvPriceSource::from_csv(r, home_currency, err_stream)?),
        None => Box::new(CsvPriceSource::empty()),
    };
    let fx_source: Box<dyn FxRateSource> = match &files.fx_rates {
        Some(r) => Box::new(CsvFxRateSource::from_csv(r, err_stream)?),
        None => Box::new(CsvFxRateSource::empty()),
    };

    Ok(MarketData {
        splits,
        price_source,
        fx_source,
        load_failures,
        load_warnings,
    })
}
