use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use time::Date;

use crate::errors::{AnalysisFailure, AnalysisWarning};
use crate::portfolio::io::trade_csv::{parse_trade_csv, TradeCsvParseOptions};
use crate::portfolio::{Instrument, NormalizedTrades, Trade, TradeSide};
use crate::util::rw::{DescribedReader, WriteHandle};
use crate::verboseln;

#[derive(Debug, Default)]
pub struct NormalizeResult {
    pub trades: NormalizedTrades,
    /// In the order encountered. Includes whole files which could not be read.
    pub failures: Vec<AnalysisFailure>,
    pub warnings: Vec<AnalysisWarning>,
    pub duplicates_dropped: usize,
    pub rows_read: usize,
}

type DedupKey = (Instrument, Date, Decimal, Decimal, TradeSide);

fn dedup_key(t: &Trade) -> DedupKey {
    (
        t.instrument.clone(),
        t.trade_date,
        *t.quantity,
        *t.price,
        t.side,
    )
}

/// Concatenates per-file trade lists (in read order), dropping trades which
/// were uploaded more than once.
///
/// The number of trades kept for a key is the largest number of times
/// that key occurs within any single file. Repeating a file therefore has
/// no effect, while identical fills listed within one file are all kept.
/// The earliest read occurrences survive.
pub fn merge_and_dedup(
    per_file_trades: Vec<Vec<Trade>>,
) -> (Vec<Trade>, Vec<AnalysisWarning>, usize) {
    let mut allowed: HashMap<DedupKey, usize> = HashMap::new();
    for file_trades in &per_file_trades {
        let mut in_file: HashMap<DedupKey, usize> = HashMap::new();
        for t in file_trades {
            *in_file.entry(dedup_key(t)).or_insert(0) += 1;
        }
        for (k, n) in in_file {
            let max = allowed.entry(k).or_insert(0);
            *max = (*max).max(n);
        }
    }

    let mut kept_counts: HashMap<DedupKey, usize> = HashMap::new();
    let mut dropped: BTreeMap<(Instrument, Date), usize> = BTreeMap::new();
    let mut merged = Vec::new();
    for t in per_file_trades.into_iter().flatten() {
        let key = dedup_key(&t);
        let kept = kept_counts.entry(key.clone()).or_insert(0);
        if *kept < allowed.get(&key).copied().unwrap_or(0) {
            *kept += 1;
            merged.push(t);
        } else {
            tracing::debug!("merge_and_dedup: dropping duplicate {:?}", t);
            *dropped.entry((t.instrument, t.trade_date)).or_insert(0) += 1;
        }
    }

    let n_dropped = dropped.values().sum();
    let warnings = dropped
        .into_iter()
        .map(|((instrument, date), count)| AnalysisWarning::DuplicateTrades {
            instrument,
            date,
            count,
        })
        .collect();
    (merged, warnings, n_dropped)
}

/// Parses every trade file, then merges, sorts and de-duplicates the
/// results. Files and rows which fail are reported in the result, and
/// never prevent the others from being read.
pub fn normalize_trade_files(
    readers: &[DescribedReader],
    parse_options: &TradeCsvParseOptions,
    err_stream: &mut WriteHandle,
) -> NormalizeResult {
    let mut result = NormalizeResult::default();
    let mut per_file_trades = Vec::with_capacity(readers.len());
    let mut global_read_index: u32 = 0;

    for reader in readers {
        verboseln!("Reading {}", reader.desc());
        match parse_trade_csv(reader, global_read_index, parse_options, err_stream) {
            Ok(parsed) => {
                tracing::debug!(
                    "normalize_trade_files: {}: {} rows, {} trades, {} malformed, {} skipped",
                    reader.desc(),
                    parsed.rows_read,
                    parsed.trades.len(),
                    parsed.malformed.len(),
                    parsed.skipped.len()
                );
                global_read_index += parsed.trades.len() as u32;
                result.rows_read += parsed.rows_read;
                result
                    .failures
                    .extend(parsed.malformed.into_iter().map(AnalysisFailure::from));
                result.warnings.extend(parsed.skipped);
                per_file_trades.push(parsed.trades);
            }
            Err(e) => {
                tracing::debug!("normalize_trade_files: {}", e);
                result.failures.push(e);
            }
        }
    }

    let (merged, dup_warnings, n_dropped) = merge_and_dedup(per_file_trades);
    result.duplicates_dropped = n_dropped;
    result.warnings.extend(dup_warnings);
    result.trades = NormalizedTrades::new(merged);
    result
}
