use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use time::Date;

use crate::errors::DataUnavailableError;
use crate::portfolio::csv_common::{csv_record_values, map_csv_headers, PriceCol};
use crate::portfolio::{Currency, Instrument, PricePoint};
use crate::util::basic::SError;
use crate::util::date::parse_trade_date;
use crate::util::decimal::{parse_loose_decimal, PosDecimal};
use crate::util::fetch::fetch_with_timeout;
use crate::util::rw::{DescribedReader, WriteHandle};

/// Supplies historical daily closes.
///
/// Returns the closes available within [start, end], in date order. Days
/// with no trading are simply absent.
#[async_trait::async_trait(?Send)]
pub trait PriceSource {
    async fn get_daily_close(
        &self,
        instrument: &str,
        start: Date,
        end: Date,
    ) -> Result<Vec<PricePoint>, DataUnavailableError>;
}

/// Closes loaded up front from a CSV file of `symbol,date,close[,currency]`.
/// Rows with no currency are taken to be in `default_currency`.
#[derive(Default)]
pub struct CsvPriceSource {
    closes: HashMap<Instrument, BTreeMap<Date, (PosDecimal, Currency)>>,
}

impl CsvPriceSource {
    pub fn new(points: Vec<PricePoint>) -> CsvPriceSource {
        let mut src = CsvPriceSource::default();
        for p in points {
            src.closes
                .entry(p.instrument)
                .or_default()
                .insert(p.date, (p.close, p.currency));
        }
        src
    }

    pub fn empty() -> CsvPriceSource {
        CsvPriceSource::default()
    }

    pub fn from_csv(
        desc_reader: &DescribedReader,
        default_currency: &Currency,
        err_stream: &mut WriteHandle,
    ) -> Result<CsvPriceSource, SError> {
        let desc = desc_reader.desc();
        let reader = desc_reader.reader().map_err(|e| format!("{desc}: {e}"))?;
        let mut csv_r = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = csv_r
            .headers()
            .map_err(|e| format!("Error in csv headers of {desc}: {e}"))?;
        let cols = map_csv_headers(headers, PriceCol::canonical_for_header, desc, err_stream);

        let mut points = Vec::new();
        for (i, record_res) in csv_r.records().enumerate() {
            let row_num = i + 2;
            let record = record_res
                .map_err(|e| format!("Error on row {row_num} of {desc}: {e}"))?;
            let values = csv_record_values(&record, &cols);
            let point = price_point_from_values(&values, default_currency)
                .map_err(|e| format!("Error on row {row_num} of {desc}: {e}"))?;
            points.push(point);
        }
        tracing::debug!("CsvPriceSource::from_csv: {} closes from {}", points.len(), desc);
        Ok(CsvPriceSource::new(points))
    }
}

fn price_point_from_values(
    values: &HashMap<&'static str, String>,
    default_currency: &Currency,
) -> Result<PricePoint, SError> {
    let get = |col: &'static str| values.get(col).ok_or_else(|| format!("Missing {}", col));
    let close_str = get(PriceCol::CLOSE)?;
    Ok(PricePoint {
        instrument: get(PriceCol::INSTRUMENT)?.clone(),
        date: parse_trade_date(get(PriceCol::DATE)?, &None)?,
        close: PosDecimal::try_from(parse_loose_decimal(close_str)?)
            .map_err(|_| format!("Invalid close '{}'", close_str))?,
        currency: match values.get(PriceCol::CURRENCY) {
            Some(c) => Currency::parse(c)?,
            None => default_currency.clone(),
        },
    })
}

#[async_trait::async_trait(?Send)]
impl PriceSource for CsvPriceSource {
    async fn get_daily_close(
        &self,
        instrument: &str,
        start: Date,
        end: Date,
    ) -> Result<Vec<PricePoint>, DataUnavailableError> {
        if end < start {
            return Ok(Vec::new());
        }
        Ok(self
            .closes
            .get(instrument)
            .map(|closes| {
                closes
                    .range(start..=end)
                    .map(|(d, (close, currency))| PricePoint {
                        instrument: instrument.to_string(),
                        date: *d,
                        close: *close,
                        currency: currency.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[derive(Debug, Default)]
pub struct FetchedPrices {
    pub prices: HashMap<Instrument, Vec<PricePoint>>,
    /// One per instrument whose fetch failed or timed out. Those
    /// instruments have no entry in `prices`.
    pub unavailable: Vec<DataUnavailableError>,
}

/// Fetches closes over [start, end] for every instrument. The fetches are
/// independent and are joined concurrently, each bounded by `timeout`.
pub async fn fetch_all_prices(
    source: &dyn PriceSource,
    instruments: &[Instrument],
    start: Date,
    end: Date,
    timeout: Option<Duration>,
) -> FetchedPrices {
    let futures: Vec<_> = instruments
        .iter()
        .map(|instrument| async move {
            let subject = format!("{} prices", instrument);
            let res = fetch_with_timeout(
                &subject,
                timeout,
                source.get_daily_close(instrument, start, end),
            )
            .await;
            (instrument.clone(), res)
        })
        .collect();

    let results = futures::future::join_all(futures).await;

    let mut fetched = FetchedPrices::default();
    for (instrument, res) in results {
        match res {
            Ok(points) => {
                tracing::debug!("fetch_all_prices: {} closes for {}", points.len(), instrument);
                fetched.prices.insert(instrument, points);
            }
            Err(e) => {
                tracing::debug!("fetch_all_prices: {}", e);
                fetched.unavailable.push(e);
            }
        }
    }
    fetched
}

// Used by both unit and integration tests
#[cfg(any(test, feature = "testlib"))]
pub mod pub_testlib {
    use std::collections::HashSet;

    use time::Date;

    use crate::{
        errors::DataUnavailableError,
        portfolio::PricePoint,
    };

    use super::{CsvPriceSource, PriceSource};

    /// Serves closes from memory. Instruments in `failing` return an error,
    /// and instruments in `hanging` never resolve.
    #[derive(Default)]
    pub struct MockPriceSource {
        pub closes: CsvPriceSource,
        pub failing: HashSet<String>,
        pub hanging: HashSet<String>,
    }

    impl MockPriceSource {
        pub fn new(points: Vec<PricePoint>) -> MockPriceSource {
            MockPriceSource {
                closes: CsvPriceSource::new(points),
                ..Default::default()
            }
        }
    }

    #[async_trait::async_trait(?Send)]
    impl PriceSource for MockPriceSource {
        async fn get_daily_close(
            &self,
            instrument: &str,
            start: Date,
            end: Date,
        ) -> Result<Vec<PricePoint>, DataUnavailableError> {
            if self.failing.contains(instrument) {
                return Err(DataUnavailableError::new(
                    format!("{} prices", instrument),
                    "mock source is down",
                ));
            }
            if self.hanging.contains(instrument) {
                futures::future::pending::<()>().await;
            }
            self.closes.get_daily_close(instrument, start, end).await
        }
    }
}
