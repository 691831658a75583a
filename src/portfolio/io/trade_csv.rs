use std::borrow::BorrowMut;
use std::collections::{HashMap, HashSet};
use std::io::Read;

use rust_decimal::Decimal;

use crate::errors::{AnalysisFailure, AnalysisWarning, MalformedRecordError};
use crate::portfolio::csv_common::TradeCol;
use crate::portfolio::{Currency, Trade, TradeSide};
use crate::util::date::{parse_trade_date, DynDateFormat};
use crate::util::decimal::{
    parse_loose_decimal, to_string_min_precision, GreaterEqualZeroDecimal,
    PosDecimal,
};
use crate::util::rw::{DescribedReader, WriteHandle};
use crate::write_errln;

type Error = String;

#[derive(PartialEq, Eq, Debug)]
enum TypeClass {
    Side(TradeSide),
    // Generic order rows, where the quantity sign carries the direction
    FromQuantitySign,
    NotAnOrder(String),
}

fn classify_type(value: Option<&str>) -> TypeClass {
    let lower = value.map(|v| v.trim().to_lowercase()).unwrap_or_default();
    match lower.as_str() {
        "buy" | "bought" | "b" | "purchase" => TypeClass::Side(TradeSide::Buy),
        "sell" | "sold" | "s" | "sale" => TypeClass::Side(TradeSide::Sell),
        "" | "order" | "orders" | "trade" | "trades" => TypeClass::FromQuantitySign,
        _ => TypeClass::NotAnOrder(lower),
    }
}

enum RowOutcome {
    Trade(Trade),
    Skipped(String),
}

fn trade_from_csv_values(
    mut values: HashMap<&'static str, String>,
    read_index: u32,
    parse_options: &TradeCsvParseOptions,
) -> Result<RowOutcome, Error> {
    let parse_decimal = |value: &str, field_name: &str| {
        parse_loose_decimal(value).map_err(|e| {
            format!(
                "Failed to parse number for {} ('{}'): {}",
                field_name, value, e
            )
        })
    };

    // Type is checked first, so that dividend and fee rows (which often
    // lack a quantity or price) are skipped rather than reported malformed.
    let type_class = classify_type(values.get(TradeCol::TYPE).map(|s| s.as_str()));
    if let TypeClass::NotAnOrder(t) = &type_class {
        return Ok(RowOutcome::Skipped(format!("non-order type '{}'", t)));
    }

    let instrument = values
        .remove(TradeCol::INSTRUMENT)
        .ok_or_else(|| format!("Missing {}", TradeCol::INSTRUMENT))?;

    let trade_date = {
        let s = values
            .remove(TradeCol::TRADE_DATE)
            .ok_or_else(|| format!("Missing {}", TradeCol::TRADE_DATE))?;
        parse_trade_date(&s, &parse_options.date_format).map_err(|e| {
            format!("Failed to parse {} \"{}\": {}", TradeCol::TRADE_DATE, s, e)
        })?
    };

    let signed_quantity = {
        let s = values
            .remove(TradeCol::QUANTITY)
            .ok_or_else(|| format!("Missing {}", TradeCol::QUANTITY))?;
        parse_decimal(&s, TradeCol::QUANTITY)?
    };
    let quantity = PosDecimal::try_from(signed_quantity.abs())
        .map_err(|_| format!("{} is zero", TradeCol::QUANTITY))?;

    let side = match type_class {
        TypeClass::Side(side) => side,
        _ => {
            if signed_quantity.is_sign_negative() {
                TradeSide::Sell
            } else {
                TradeSide::Buy
            }
        }
    };

    let price = match (
        values.remove(TradeCol::PRICE),
        values.remove(TradeCol::PROCEEDS),
    ) {
        (Some(p), _) => parse_decimal(&p, TradeCol::PRICE)?.abs(),
        (None, Some(proceeds)) => {
            parse_decimal(&proceeds, TradeCol::PROCEEDS)?.abs() / *quantity
        }
        (None, None) => {
            return Err(format!(
                "Missing {} (no {} or {} value)",
                TradeCol::PRICE,
                TradeCol::PRICE,
                TradeCol::PROCEEDS
            ))
        }
    };
    let price = PosDecimal::try_from(price)
        .map_err(|_| format!("{} is zero", TradeCol::PRICE))?;

    let currency = match values.remove(TradeCol::CURRENCY) {
        Some(s) => Currency::parse(&s)?,
        None => parse_options.home_currency.clone(),
    };

    // Brokers commonly report commissions as negative amounts.
    let fees = match values.remove(TradeCol::FEES) {
        Some(s) => parse_decimal(&s, TradeCol::FEES)?.abs(),
        None => Decimal::ZERO,
    };
    let fees = GreaterEqualZeroDecimal::try_from(fees)?;

    Ok(RowOutcome::Trade(Trade {
        instrument,
        trade_date,
        side,
        quantity,
        price,
        currency,
        fees,
        read_index,
        fx_rate: None,
    }))
}

pub struct TradeCsvParseOptions {
    pub date_format: Option<DynDateFormat>,
    /// Assumed for rows with no currency value.
    pub home_currency: Currency,
}

impl Default for TradeCsvParseOptions {
    fn default() -> Self {
        Self {
            date_format: None,
            home_currency: Currency::default_home(),
        }
    }
}

#[derive(Debug, Default)]
pub struct TradeCsvParseResult {
    pub trades: Vec<Trade>,
    pub malformed: Vec<MalformedRecordError>,
    /// Non-order rows (dividends, fees, transfers, subtotals)
    pub skipped: Vec<AnalysisWarning>,
    pub rows_read: usize,
}

/// Parses one trade file. Bad rows are collected in the result, and do not
/// stop the parse. A file which cannot be read at all, or which lacks a
/// required column, fails as a whole.
pub fn parse_trade_csv(
    desc_reader: &DescribedReader,
    initial_global_read_index: u32,
    parse_options: &TradeCsvParseOptions,
    err_stream: &mut WriteHandle,
) -> Result<TradeCsvParseResult, AnalysisFailure> {
    let csv_desc = desc_reader.desc().to_string();
    let invalid_file = |reason: String| AnalysisFailure::InvalidFile {
        file: csv_desc.clone(),
        reason,
    };

    let mut reader_box = desc_reader.reader().map_err(|e| invalid_file(e.to_string()))?;
    let reader: &mut dyn Read = reader_box.borrow_mut();

    let mut csv_r = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut col_index_to_name: HashMap<usize, &'static str> = HashMap::new();
    let mut found_col_names: HashSet<&'static str> = HashSet::new();

    let headers = csv_r
        .headers()
        .map_err(|e| invalid_file(format!("Error in csv headers: {e}")))?;
    for (i, col) in headers.iter().enumerate() {
        let lower_col = col.to_lowercase();
        let san_col = lower_col.trim();
        match TradeCol::canonical_for_header(san_col) {
            Some(static_str) => {
                if found_col_names.insert(static_str) {
                    col_index_to_name.insert(i, static_str);
                } else {
                    write_errln!(
                        err_stream,
                        "Warning: Duplicate column in {csv_desc}: {san_col} \
                        (already read as {static_str})"
                    );
                }
            }
            None => {
                write_errln!(
                    err_stream,
                    "Warning: Unrecognized column in {csv_desc}: {san_col}"
                );
            }
        }
    }

    // Finalize these
    let col_index_to_name = col_index_to_name;

    let missing: Vec<&str> = TradeCol::required_cols()
        .into_iter()
        .filter(|c| !found_col_names.contains(c))
        .collect();
    if !missing.is_empty() {
        return Err(invalid_file(format!(
            "missing required column(s): {}",
            missing.join(", ")
        )));
    }
    if !found_col_names.contains(TradeCol::PRICE)
        && !found_col_names.contains(TradeCol::PROCEEDS)
    {
        return Err(invalid_file(format!(
            "missing required column: {} or {}",
            TradeCol::PRICE,
            TradeCol::PROCEEDS
        )));
    }

    let mut result = TradeCsvParseResult::default();
    let mut global_row_index = initial_global_read_index;

    for (i, record_res) in csv_r.records().enumerate() {
        // Start at 1 for the user, and include header.
        let row_num = i + 2;
        result.rows_read += 1;

        let record = match record_res {
            Ok(r) => r,
            Err(e) => {
                result.malformed.push(MalformedRecordError {
                    file: csv_desc.clone(),
                    row: row_num,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let mut trade_values = HashMap::<&'static str, String>::new();
        for (i, col_val) in record.iter().enumerate() {
            if !col_val.trim().is_empty() {
                // Values in unrecognized columns are ignored.
                if let Some(col_name) = col_index_to_name.get(&i) {
                    trade_values.insert(col_name, col_val.trim().to_string());
                }
            }
        }

        match trade_from_csv_values(trade_values, global_row_index, parse_options) {
            Ok(RowOutcome::Trade(t)) => {
                tracing::trace!("parse_trade_csv: {csv_desc} row {row_num}: {:?}", t);
                result.trades.push(t);
                global_row_index += 1;
            }
            Ok(RowOutcome::Skipped(reason)) => {
                tracing::debug!("parse_trade_csv: skipped {csv_desc} row {row_num}: {reason}");
                result.skipped.push(AnalysisWarning::SkippedRow {
                    file: csv_desc.clone(),
                    row: row_num,
                    reason,
                });
            }
            Err(reason) => {
                result.malformed.push(MalformedRecordError {
                    file: csv_desc.clone(),
                    row: row_num,
                    reason,
                });
            }
        }
    }

    Ok(result)
}

pub struct PlainCsvTable {
    pub header: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

pub fn trades_to_csv_table(trades: &[Trade]) -> PlainCsvTable {
    let headers = TradeCol::export_order_cols().to_vec();

    let mut records = Vec::<Vec<String>>::with_capacity(trades.len());
    for t in trades {
        let record = headers
            .iter()
            .map(|col| match *col {
                TradeCol::INSTRUMENT => t.instrument.clone(),
                TradeCol::TRADE_DATE => t.trade_date.to_string(),
                TradeCol::TYPE => t.side.to_string(),
                TradeCol::QUANTITY => to_string_min_precision(&t.quantity, 0),
                TradeCol::PRICE => to_string_min_precision(&t.price, 2),
                TradeCol::CURRENCY => t.currency.to_string(),
                TradeCol::FEES => to_string_min_precision(&t.fees, 2),
                _ => String::new(),
            })
            .collect();
        records.push(record);
    }

    PlainCsvTable {
        header: headers,
        rows: records,
    }
}

/// Writes trades in a form which parse_trade_csv reads back unchanged.
pub fn write_trades_csv(
    trades: &[Trade],
    writer: &mut dyn std::io::Write,
) -> Result<(), csv::Error> {
    let table = trades_to_csv_table(trades);

    let mut csv_w = csv::WriterBuilder::new().has_headers(true).from_writer(writer);
    csv_w.write_record(&table.header)?;
    for row in &table.rows {
        csv_w.write_record(row)?;
    }
    csv_w.flush()?;
    Ok(())
}

#[cfg(any(test, feature = "testlib"))]
pub mod testlib {
    use crate::{portfolio::csv_common::TradeCol, util::rw::DescribedReader};

    // The names here are abbreviated to make test writing as concise and
    // convenient as possible.
    #[derive(Default, Clone)]
    pub struct TestTradeCsvRow {
        pub sym: &'static str, // INSTRUMENT
        pub td: &'static str,  // TRADE_DATE
        pub ty: &'static str,  // TYPE
        pub q: &'static str,   // QUANTITY
        pub p: &'static str,   // PRICE
        pub pr: &'static str,  // PROCEEDS
        pub cur: &'static str, // CURRENCY
        pub fee: &'static str, // FEES
    }

    impl TestTradeCsvRow {
        /// `col` may be any accepted header variant.
        pub fn get_col(&self, col: &str) -> &'static str {
            match TradeCol::canonical_for_header(col) {
                Some(TradeCol::INSTRUMENT) => self.sym,
                Some(TradeCol::TRADE_DATE) => self.td,
                Some(TradeCol::TYPE) => self.ty,
                Some(TradeCol::QUANTITY) => self.q,
                Some(TradeCol::PRICE) => self.p,
                Some(TradeCol::PROCEEDS) => self.pr,
                Some(TradeCol::CURRENCY) => self.cur,
                Some(TradeCol::FEES) => self.fee,
                _ => "",
            }
        }

        pub fn make_row_line(&self, cols: &[&'static str]) -> String {
            let mut parts = Vec::new();
            for col in cols {
                let part = self.get_col(col);
                if part.contains(',') {
                    parts.push(format!("\"{}\"", part));
                } else {
                    parts.push(part.to_string());
                }
            }
            parts.join(",")
        }
    }

    pub struct CsvFileBuilder {
        headers: Vec<&'static str>,
    }

    impl CsvFileBuilder {
        pub fn with_headers(headers: Vec<&'static str>) -> CsvFileBuilder {
            CsvFileBuilder { headers }
        }

        /// The canonical export columns.
        pub fn with_standard_headers() -> CsvFileBuilder {
            CsvFileBuilder::with_headers(TradeCol::export_order_cols().to_vec())
        }

        /// Header names as they appear in a broker activity export.
        pub fn with_broker_headers() -> CsvFileBuilder {
            CsvFileBuilder::with_headers(vec![
                "DataDiscriminator",
                "Symbol",
                "Date/Time",
                "Quantity",
                "T. Price",
                "Proceeds",
                "Currency",
                "Comm/Fee",
                "Realized P/L",
            ])
        }

        pub fn header_str(&self) -> String {
            self.headers.join(",")
        }

        pub fn make_row_strings(&self, rows: &[TestTradeCsvRow]) -> Vec<String> {
            rows.iter().map(|r| r.make_row_line(&self.headers)).collect()
        }

        pub fn csv_contents(&self, rows: &[TestTradeCsvRow]) -> String {
            let mut lines = vec![self.header_str()];
            lines.extend(self.make_row_strings(rows));
            lines.join("\n")
        }

        pub fn single_csv_reader(&self, rows: &[TestTradeCsvRow]) -> DescribedReader {
            self.named_csv_reader("foo0.csv", rows)
        }

        pub fn named_csv_reader(
            &self,
            desc: &str,
            rows: &[TestTradeCsvRow],
        ) -> DescribedReader {
            DescribedReader::from_string(desc.to_string(), self.csv_contents(rows))
        }

        pub fn split_csv_rows(
            &self,
            file_lens: &[usize],
            rows: &[TestTradeCsvRow],
        ) -> Vec<DescribedReader> {
            let mut rows_read: usize = 0;
            let mut csv_readers = Vec::new();
            for (i, file_len) in file_lens.iter().enumerate() {
                csv_readers.push(self.named_csv_reader(
                    &format!("foo{i}.csv"),
                    &rows[rows_read..rows_read + *file_len],
                ));
                rows_read += *file_len;
            }
            csv_readers
        }
    }
}
