//! Failure and warning types produced while analyzing a portfolio.
//!
//! Row and instrument level failures are collected and reported alongside the
//! results. Only AnalysisError aborts a run.

use rust_decimal::Decimal;
use thiserror::Error;
use time::Date;

use crate::{fx::CurrencyPair, portfolio::Instrument, util::basic::SError};

/// A row in an input file which could not be turned into a trade.
/// `row` is 1-based, and counts the header line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Error on row {row} of {file}: {reason}")]
pub struct MalformedRecordError {
    pub file: String,
    pub row: usize,
    pub reason: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("No {pair} exchange rate for {instrument} trade on {date}: {detail}")]
pub struct MissingRateError {
    pub instrument: Instrument,
    pub date: Date,
    pub pair: CurrencyPair,
    pub detail: String,
}

/// An external price or rate query that failed or timed out.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Data unavailable for {subject}: {reason}")]
pub struct DataUnavailableError {
    pub subject: String,
    pub reason: String,
}

impl DataUnavailableError {
    pub fn new(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        DataUnavailableError {
            subject: subject.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "Sell order on {date} of {sold} shares of {instrument} is more than the \
    current holdings ({held})"
)]
pub struct OverdraftError {
    pub instrument: Instrument,
    pub date: Date,
    pub sold: Decimal,
    pub held: Decimal,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum XirrError {
    #[error("insufficient data ({0} cash flow(s), at least 2 are required)")]
    InsufficientData(usize),
    #[error("no convergence ({0})")]
    NoConvergence(String),
    #[error("{0}")]
    Unavailable(DataUnavailableError),
}

/// Isolated failures. None of these stop the analysis of other rows
/// or instruments.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisFailure {
    #[error("{0}")]
    MalformedRecord(#[from] MalformedRecordError),
    #[error("{file}: {reason}")]
    InvalidFile { file: String, reason: String },
    #[error("{0}")]
    MissingRate(#[from] MissingRateError),
    #[error("{0}")]
    DataUnavailable(#[from] DataUnavailableError),
    #[error("{0}")]
    Overdraft(#[from] OverdraftError),
    #[error("XIRR of {instrument}: {err}")]
    Xirr { instrument: String, err: XirrError },
}

impl AnalysisFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisFailure::MalformedRecord(_) => "Malformed record",
            AnalysisFailure::InvalidFile { .. } => "Invalid file",
            AnalysisFailure::MissingRate(_) => "Missing rate",
            AnalysisFailure::DataUnavailable(_) => "Data unavailable",
            AnalysisFailure::Overdraft(_) => "Overdraft",
            AnalysisFailure::Xirr { .. } => "XIRR",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "Stale price for {instrument} on {date}: using close of {price_date}"
)]
pub struct StalePriceWarning {
    pub instrument: Instrument,
    pub date: Date,
    pub price_date: Date,
}

/// Non-fatal observations about the input or the computed results.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisWarning {
    #[error("Skipped row {row} of {file} ({reason})")]
    SkippedRow {
        file: String,
        row: usize,
        reason: String,
    },
    #[error("Dropped {count} duplicate trade(s) of {instrument} on {date}")]
    DuplicateTrades {
        instrument: Instrument,
        date: Date,
        count: usize,
    },
    #[error("{0}")]
    StalePrice(#[from] StalePriceWarning),
    #[error("No price for {instrument} on or before {date}")]
    MissingPrice { instrument: Instrument, date: Date },
    #[error("{0}")]
    Other(String),
}

impl AnalysisWarning {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisWarning::SkippedRow { .. } => "Skipped row",
            AnalysisWarning::DuplicateTrades { .. } => "Duplicate",
            AnalysisWarning::StalePrice(_) => "Stale price",
            AnalysisWarning::MissingPrice { .. } => "Missing price",
            AnalysisWarning::Other(_) => "Warning",
        }
    }
}

/// Fatal, run-level failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("No valid trades found ({} failure(s) encountered)", .failures.len())]
    NoValidTrades { failures: Vec<AnalysisFailure> },
    #[error("{0}")]
    Input(SError),
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::{fx::CurrencyPair, portfolio::Currency, util::date::pub_testlib::ymd};

    use super::{
        AnalysisError, AnalysisFailure, MalformedRecordError, MissingRateError,
        OverdraftError, XirrError,
    };

    #[test]
    fn test_messages() {
        let e = MalformedRecordError {
            file: "a.csv".to_string(),
            row: 3,
            reason: "bad date".to_string(),
        };
        assert_eq!(e.to_string(), "Error on row 3 of a.csv: bad date");
        let f: AnalysisFailure = e.into();
        assert_eq!(f.kind(), "Malformed record");
        assert_eq!(f.to_string(), "Error on row 3 of a.csv: bad date");

        let e = OverdraftError {
            instrument: "FOO".to_string(),
            date: ymd(2023, 1, 2),
            sold: dec!(5),
            held: dec!(2),
        };
        assert_eq!(
            e.to_string(),
            "Sell order on 2023-01-02 of 5 shares of FOO is more than the current holdings (2)"
        );

        let e = MissingRateError {
            instrument: "AAPL".to_string(),
            date: ymd(2023, 1, 2),
            pair: CurrencyPair::new(Currency::usd(), Currency::inr()),
            detail: "none found".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "No USD/INR exchange rate for AAPL trade on 2023-01-02: none found"
        );

        let f = AnalysisFailure::Xirr {
            instrument: "FOO".to_string(),
            err: XirrError::InsufficientData(1),
        };
        assert_eq!(
            f.to_string(),
            "XIRR of FOO: insufficient data (1 cash flow(s), at least 2 are required)"
        );

        let e = AnalysisError::NoValidTrades { failures: vec![f] };
        assert_eq!(e.to_string(), "No valid trades found (1 failure(s) encountered)");
    }
}
