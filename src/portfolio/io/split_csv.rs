use std::collections::HashMap;

use crate::errors::{AnalysisFailure, MalformedRecordError};
use crate::portfolio::csv_common::{csv_record_values, map_csv_headers, SplitCol};
use crate::portfolio::{SplitEvent, SplitRatio};
use crate::util::date::{parse_trade_date, DynDateFormat};
use crate::util::rw::{DescribedReader, WriteHandle};

#[derive(Debug, Default)]
pub struct SplitCsvParseResult {
    pub events: Vec<SplitEvent>,
    pub malformed: Vec<MalformedRecordError>,
}

fn split_from_record(
    values: &HashMap<&'static str, String>,
    date_format: &Option<DynDateFormat>,
) -> Result<SplitEvent, String> {
    let get = |col: &'static str| {
        values.get(col).ok_or_else(|| format!("Missing {}", col))
    };
    let date_str = get(SplitCol::DATE)?;
    Ok(SplitEvent {
        instrument: get(SplitCol::INSTRUMENT)?.clone(),
        effective_date: parse_trade_date(date_str, date_format).map_err(|e| {
            format!("Failed to parse {} \"{}\": {}", SplitCol::DATE, date_str, e)
        })?,
        ratio: SplitRatio::parse(get(SplitCol::RATIO)?)?,
    })
}

/// Reads a split table, as `instrument,effective date,split ratio`
/// (or any accepted header variants).
pub fn parse_split_csv(
    desc_reader: &DescribedReader,
    date_format: &Option<DynDateFormat>,
    err_stream: &mut WriteHandle,
) -> Result<SplitCsvParseResult, AnalysisFailure> {
    let desc = desc_reader.desc().to_string();
    let invalid_file = |reason: String| AnalysisFailure::InvalidFile {
        file: desc.clone(),
        reason,
    };

    let reader = desc_reader.reader().map_err(|e| invalid_file(e.to_string()))?;
    let mut csv_r = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_r
        .headers()
        .map_err(|e| invalid_file(format!("Error in csv headers: {e}")))?;
    let col_index_to_name = map_csv_headers(
        headers,
        SplitCol::canonical_for_header,
        &desc,
        err_stream,
    );

    let mut result = SplitCsvParseResult::default();
    for (i, record_res) in csv_r.records().enumerate() {
        let row_num = i + 2;
        let parsed = record_res.map_err(|e| e.to_string()).and_then(|record| {
            split_from_record(&csv_record_values(&record, &col_index_to_name), date_format)
        });
        match parsed {
            Ok(ev) => result.events.push(ev),
            Err(reason) => result.malformed.push(MalformedRecordError {
                file: desc.clone(),
                row: row_num,
                reason,
            }),
        }
    }
    Ok(result)
}
