use std::collections::{BTreeMap, HashMap};

use time::Date;

use crate::errors::DataUnavailableError;
use crate::fx::{CurrencyPair, FxRate};
use crate::portfolio::csv_common::{csv_record_values, map_csv_headers, FxCol};
use crate::portfolio::Currency;
use crate::util::basic::SError;
use crate::util::date::parse_trade_date;
use crate::util::decimal::{parse_loose_decimal, PosDecimal};
use crate::util::rw::{DescribedReader, WriteHandle};

/// Supplies historical daily exchange rates.
///
/// Ok(None) means the source has no quote for that exact date (eg. a bank
/// holiday), which callers may resolve by looking at earlier dates.
/// DataUnavailableError means the source itself failed.
///
/// async_trait is required to be able to hold a Box<dyn FxRateSource>.
/// It is ?Send, since the pipeline runs on a single thread.
#[async_trait::async_trait(?Send)]
pub trait FxRateSource {
    async fn get_fx_rate(
        &self,
        pair: &CurrencyPair,
        date: Date,
    ) -> Result<Option<FxRate>, DataUnavailableError>;
}

/// Rates loaded up front from a CSV file, with either a `pair` column
/// ("USD/INR") or `base` and `quote` columns, plus `date` and `rate`.
/// A pair can also be answered from quotes of its inverse.
#[derive(Default)]
pub struct CsvFxRateSource {
    rates: HashMap<CurrencyPair, BTreeMap<Date, PosDecimal>>,
}

impl CsvFxRateSource {
    pub fn new(rates: Vec<FxRate>) -> CsvFxRateSource {
        let mut src = CsvFxRateSource::default();
        for r in rates {
            src.rates.entry(r.pair).or_default().insert(r.date, r.rate);
        }
        src
    }

    pub fn empty() -> CsvFxRateSource {
        CsvFxRateSource::default()
    }

    pub fn from_csv(
        desc_reader: &DescribedReader,
        err_stream: &mut WriteHandle,
    ) -> Result<CsvFxRateSource, SError> {
        let desc = desc_reader.desc();
        let reader = desc_reader.reader().map_err(|e| format!("{desc}: {e}"))?;
        let mut csv_r = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = csv_r
            .headers()
            .map_err(|e| format!("Error in csv headers of {desc}: {e}"))?;
        let cols = map_csv_headers(headers, FxCol::canonical_for_header, desc, err_stream);

        let mut rates = Vec::new();
        for (i, record_res) in csv_r.records().enumerate() {
            let row_num = i + 2;
            let record = record_res
                .map_err(|e| format!("Error on row {row_num} of {desc}: {e}"))?;
            let values = csv_record_values(&record, &cols);
            let rate = fx_rate_from_values(&values)
                .map_err(|e| format!("Error on row {row_num} of {desc}: {e}"))?;
            rates.push(rate);
        }
        tracing::debug!("CsvFxRateSource::from_csv: {} rates from {}", rates.len(), desc);
        Ok(CsvFxRateSource::new(rates))
    }

    fn lookup(&self, pair: &CurrencyPair, date: Date) -> Option<PosDecimal> {
        self.rates.get(pair).and_then(|r| r.get(&date)).copied()
    }
}

fn fx_rate_from_values(values: &HashMap<&'static str, String>) -> Result<FxRate, SError> {
    let get = |col: &'static str| values.get(col).ok_or_else(|| format!("Missing {}", col));

    let pair = match values.get(FxCol::PAIR) {
        Some(p) => CurrencyPair::parse(p)?,
        None => CurrencyPair::new(
            Currency::parse(get(FxCol::BASE)?)?,
            Currency::parse(get(FxCol::QUOTE)?)?,
        ),
    };
    let date = parse_trade_date(get(FxCol::DATE)?, &None)?;
    let rate_str = get(FxCol::RATE)?;
    let rate = PosDecimal::try_from(parse_loose_decimal(rate_str)?)
        .map_err(|_| format!("Invalid rate '{}'", rate_str))?;
    Ok(FxRate::new(pair, date, rate))
}

#[async_trait::async_trait(?Send)]
impl FxRateSource for CsvFxRateSource {
    async fn get_fx_rate(
        &self,
        pair: &CurrencyPair,
        date: Date,
    ) -> Result<Option<FxRate>, DataUnavailableError> {
        if let Some(rate) = self.lookup(pair, date) {
            return Ok(Some(FxRate::new(pair.clone(), date, rate)));
        }
        Ok(self
            .lookup(&pair.inverse(), date)
            .map(|inv| FxRate::new(pair.inverse(), date, inv).inverse()))
    }
}

// Used by both unit and integration tests
#[cfg(any(test, feature = "testlib"))]
pub mod pub_testlib {
    use std::{
        cell::Cell,
        collections::{HashMap, HashSet},
        rc::Rc,
    };

    use time::Date;

    use crate::{
        errors::DataUnavailableError,
        fx::{CurrencyPair, FxRate},
        util::decimal::PosDecimal,
    };

    use super::FxRateSource;

    #[derive(Default)]
    pub struct MockFxRateSource {
        pub rates: HashMap<(CurrencyPair, Date), PosDecimal>,
        /// Queries on these dates fail.
        pub unavailable_dates: HashSet<Date>,
        pub calls: Rc<Cell<usize>>,
    }

    impl MockFxRateSource {
        pub fn new(rates: Vec<FxRate>) -> MockFxRateSource {
            MockFxRateSource {
                rates: rates.into_iter().map(|r| ((r.pair, r.date), r.rate)).collect(),
                ..Default::default()
            }
        }

        pub fn call_counter(&self) -> Rc<Cell<usize>> {
            self.calls.clone()
        }
    }

    #[async_trait::async_trait(?Send)]
    impl FxRateSource for MockFxRateSource {
        async fn get_fx_rate(
            &self,
            pair: &CurrencyPair,
            date: Date,
        ) -> Result<Option<FxRate>, DataUnavailableError> {
            self.calls.set(self.calls.get() + 1);
            if self.unavailable_dates.contains(&date) {
                return Err(DataUnavailableError::new(
                    format!("{} on {}", pair, date),
                    "mock source is down",
                ));
            }
            Ok(self
                .rates
                .get(&(pair.clone(), date))
                .map(|r| FxRate::new(pair.clone(), date, *r)))
        }
    }
}
