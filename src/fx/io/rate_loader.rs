use std::collections::HashMap;
use std::time::Duration as StdDuration;

use time::{Date, Duration};
use tracing::{debug, trace};

use crate::errors::DataUnavailableError;
use crate::fx::{CurrencyPair, FxRate};
use crate::util::basic::SError;
use crate::util::fetch::fetch_with_timeout;

use super::FxRateSource;

pub const DEFAULT_FX_LOOKBACK_DAYS: u32 = 7;

/// Resolves the effective exchange rate for a date, on top of an
/// FxRateSource. Results are memoized for the lifetime of the loader, so each
/// (pair, date) is only ever requested from the source once per run.
pub struct RateLoader {
    source: Box<dyn FxRateSource>,
    pub lookback_days: u32,
    pub fetch_timeout: Option<StdDuration>,

    memo: HashMap<(CurrencyPair, Date), Option<FxRate>>,
    unavailable: Vec<DataUnavailableError>,
}

impl RateLoader {
    pub fn new(
        source: Box<dyn FxRateSource>,
        lookback_days: u32,
        fetch_timeout: Option<StdDuration>,
    ) -> RateLoader {
        RateLoader {
            source,
            lookback_days,
            fetch_timeout,
            memo: HashMap::new(),
            unavailable: Vec::new(),
        }
    }

    /// The quote for `date` exactly. A failing source is treated the same as
    /// a missing quote, and the failure is kept for take_unavailable.
    async fn get_exact_rate(&mut self, pair: &CurrencyPair, date: Date) -> Option<FxRate> {
        let key = (pair.clone(), date);
        if let Some(memoized) = self.memo.get(&key) {
            return memoized.clone();
        }

        let subject = format!("{} rate on {}", pair, date);
        let res = fetch_with_timeout(
            &subject,
            self.fetch_timeout,
            self.source.get_fx_rate(pair, date),
        )
        .await;
        let rate = match res {
            Ok(r) => r,
            Err(e) => {
                debug!("RateLoader::get_exact_rate: {}", e);
                self.unavailable.push(e);
                None
            }
        };
        self.memo.insert(key, rate.clone());
        rate
    }

    /// Finds the rate in effect on `date`: the quote for that day, or else
    /// the quote from the closest preceding day, looking back at most
    /// lookback_days.
    pub async fn get_effective_rate(
        &mut self,
        pair: &CurrencyPair,
        date: Date,
    ) -> Result<FxRate, SError> {
        if pair.is_identity() {
            return Ok(FxRate::identity(&pair.base, date));
        }

        let mut lookup_date = date;
        for i in 0..=self.lookback_days {
            if i > 0 {
                lookup_date = lookup_date.saturating_sub(Duration::days(1));
            }
            if let Some(rate) = self.get_exact_rate(pair, lookup_date).await {
                if i > 0 {
                    trace!(
                        "RateLoader::get_effective_rate: {} {} resolved from {}",
                        pair,
                        date,
                        rate.date
                    );
                }
                return Ok(rate);
            }
        }

        Err(format!(
            "Could not find relevant exchange rate within the {} preceding days",
            self.lookback_days
        ))
    }

    pub fn blocking_get_effective_rate(
        &mut self,
        pair: &CurrencyPair,
        date: Date,
    ) -> Result<FxRate, SError> {
        async_std::task::block_on(self.get_effective_rate(pair, date))
    }

    /// Source failures seen so far. Each is returned once.
    pub fn take_unavailable(&mut self) -> Vec<DataUnavailableError> {
        std::mem::take(&mut self.unavailable)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::{
        fx::{io::pub_testlib::MockFxRateSource, CurrencyPair, FxRate},
        pdec,
        portfolio::Currency,
        util::date::pub_testlib::ymd,
    };

    use super::{RateLoader, DEFAULT_FX_LOOKBACK_DAYS};

    fn usd_inr() -> CurrencyPair {
        CurrencyPair::new(Currency::usd(), Currency::inr())
    }

    fn rate(day: u8, r: crate::util::decimal::PosDecimal) -> FxRate {
        FxRate::new(usd_inr(), ymd(2023, 1, day), r)
    }

    #[test]
    fn test_exact_and_preceding() {
        let src = MockFxRateSource::new(vec![rate(2, pdec!(82)), rate(3, pdec!(82.5))]);
        let calls = src.call_counter();
        let mut loader = RateLoader::new(Box::new(src), DEFAULT_FX_LOOKBACK_DAYS, None);

        assert_eq!(
            loader.blocking_get_effective_rate(&usd_inr(), ymd(2023, 1, 3)),
            Ok(rate(3, pdec!(82.5)))
        );
        assert_eq!(calls.get(), 1);

        // Weekend: falls back to Tuesday's quote, and keeps its date.
        assert_eq!(
            loader.blocking_get_effective_rate(&usd_inr(), ymd(2023, 1, 5)),
            Ok(rate(3, pdec!(82.5)))
        );
        assert_eq!(calls.get(), 3);

        // Memoized
        assert_eq!(
            loader.blocking_get_effective_rate(&usd_inr(), ymd(2023, 1, 5)),
            Ok(rate(3, pdec!(82.5)))
        );
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_lookback_bound() {
        let src = MockFxRateSource::new(vec![rate(2, pdec!(82))]);
        let mut loader = RateLoader::new(Box::new(src), 7, None);

        // 7 days after the last quote is still in range
        assert!(loader.blocking_get_effective_rate(&usd_inr(), ymd(2023, 1, 9)).is_ok());
        assert_eq!(
            loader.blocking_get_effective_rate(&usd_inr(), ymd(2023, 1, 10)),
            Err("Could not find relevant exchange rate within the 7 preceding days"
                .to_string())
        );

        let src = MockFxRateSource::new(vec![rate(2, pdec!(82))]);
        let mut loader = RateLoader::new(Box::new(src), 0, None);
        assert!(loader.blocking_get_effective_rate(&usd_inr(), ymd(2023, 1, 3)).is_err());
    }

    #[test]
    fn test_identity_pair() {
        let src = MockFxRateSource::default();
        let calls = src.call_counter();
        let mut loader = RateLoader::new(Box::new(src), 7, None);
        let inr = CurrencyPair::new(Currency::inr(), Currency::inr());
        assert_eq!(
            loader.blocking_get_effective_rate(&inr, ymd(2023, 1, 3)),
            Ok(FxRate::identity(&Currency::inr(), ymd(2023, 1, 3)))
        );
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_unavailable_is_non_fatal() {
        let mut src = MockFxRateSource::new(vec![rate(2, pdec!(82))]);
        src.unavailable_dates = HashSet::from([ymd(2023, 1, 3)]);
        let mut loader = RateLoader::new(Box::new(src), 7, None);

        assert_eq!(
            loader.blocking_get_effective_rate(&usd_inr(), ymd(2023, 1, 3)),
            Ok(rate(2, pdec!(82)))
        );
        let unavailable = loader.take_unavailable();
        assert_eq!(unavailable.len(), 1);
        assert_eq!(
            unavailable[0].to_string(),
            "Data unavailable for USD/INR on 2023-01-03: mock source is down"
        );
        assert!(loader.take_unavailable().is_empty());
    }
}
