use time::Date;

use crate::errors::{AnalysisWarning, MissingRateError};
use crate::fx::{io::RateLoader, CurrencyPair, FxRate};
use crate::portfolio::{ConvertedTrades, Currency, Instrument, PricePoint, SplitAdjustedTrades};

/// One row of the conversion audit log. `rate` is None when no rate could
/// be found, in which case the trade was excluded.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ConversionLogEntry {
    pub instrument: Instrument,
    pub trade_date: Date,
    pub pair: CurrencyPair,
    pub rate: Option<FxRate>,
}

#[derive(Debug)]
pub struct ConversionResult {
    pub trades: ConvertedTrades,
    pub failures: Vec<MissingRateError>,
    pub log: Vec<ConversionLogEntry>,
}

/// Converts the price and fees of every foreign-currency trade into `home`,
/// using the rate in effect on the trade date. Quantities are untouched.
///
/// A trade with no usable rate is dropped from the result, and reported as
/// a MissingRateError. It is never converted at a made-up rate.
pub async fn convert_trades(
    trades: SplitAdjustedTrades,
    home: &Currency,
    rate_loader: &mut RateLoader,
) -> ConversionResult {
    let mut converted = Vec::new();
    let mut failures = Vec::new();
    let mut log = Vec::new();

    for mut t in trades.into_trades() {
        if t.currency == *home {
            converted.push(t);
            continue;
        }

        let pair = CurrencyPair::new(t.currency.clone(), home.clone());
        match rate_loader.get_effective_rate(&pair, t.trade_date).await {
            Ok(rate) => {
                log.push(ConversionLogEntry {
                    instrument: t.instrument.clone(),
                    trade_date: t.trade_date,
                    pair,
                    rate: Some(rate.clone()),
                });
                t.price = t.price * rate.rate;
                t.fees = t.fees.mul_pos(rate.rate);
                t.currency = home.clone();
                t.fx_rate = Some(rate);
                converted.push(t);
            }
            Err(detail) => {
                tracing::debug!("convert_trades: {} {}: {}", t.instrument, t.trade_date, detail);
                log.push(ConversionLogEntry {
                    instrument: t.instrument.clone(),
                    trade_date: t.trade_date,
                    pair: pair.clone(),
                    rate: None,
                });
                failures.push(MissingRateError {
                    instrument: t.instrument,
                    date: t.trade_date,
                    pair,
                    detail,
                });
            }
        }
    }

    ConversionResult {
        trades: ConvertedTrades {
            trades: converted,
            home: home.clone(),
        },
        failures,
        log,
    }
}

/// Converts closes quoted in a foreign currency into `home`. Points which
/// cannot be converted are dropped with a warning, so that valuation falls
/// back to an earlier close (or reports the price as missing).
pub async fn convert_price_points(
    points: Vec<PricePoint>,
    home: &Currency,
    rate_loader: &mut RateLoader,
) -> (Vec<PricePoint>, Vec<AnalysisWarning>) {
    let mut converted = Vec::with_capacity(points.len());
    let mut warnings = Vec::new();
    for mut p in points {
        if p.currency == *home {
            converted.push(p);
            continue;
        }
        let pair = CurrencyPair::new(p.currency.clone(), home.clone());
        match rate_loader.get_effective_rate(&pair, p.date).await {
            Ok(rate) => {
                p.close = p.close * rate.rate;
                p.currency = home.clone();
                converted.push(p);
            }
            Err(e) => warnings.push(AnalysisWarning::Other(format!(
                "No {} exchange rate for {} price on {}: {}",
                pair, p.instrument, p.date, e
            ))),
        }
    }
    (converted, warnings)
}
