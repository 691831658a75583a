use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::util::rw::WriteHandle;
use crate::write_errln;

/// Version of the header-variant tables below. Bump when a variant is
/// added or re-targeted, since that changes how existing files are read.
pub const MAPPING_VERSION: u32 = 1;

/// Canonical trade columns, and the header variants which map to them.
/// Headers are matched after trimming and lower-casing.
pub struct TradeCol();
impl TradeCol {
    pub const INSTRUMENT: &'static str = "instrument";
    pub const TRADE_DATE: &'static str = "trade date";
    pub const TYPE: &'static str = "type";
    pub const QUANTITY: &'static str = "quantity";
    pub const PRICE: &'static str = "price";
    pub const PROCEEDS: &'static str = "proceeds";
    pub const CURRENCY: &'static str = "currency";
    pub const FEES: &'static str = "fees";

    const VARIANTS: [(&'static str, &'static [&'static str]); 8] = [
        (
            TradeCol::INSTRUMENT,
            &["symbol", "instrument", "security", "ticker"],
        ),
        (
            TradeCol::TRADE_DATE,
            &["date/time", "trade date", "tradedate", "date", "datetime"],
        ),
        (
            TradeCol::TYPE,
            &[
                "type",
                "transaction type",
                "action",
                "side",
                "buy/sell",
                "datadiscriminator",
            ],
        ),
        (TradeCol::QUANTITY, &["quantity", "qty", "shares"]),
        (
            TradeCol::PRICE,
            &["t. price", "trade price", "price", "amount/share"],
        ),
        (TradeCol::PROCEEDS, &["proceeds"]),
        (TradeCol::CURRENCY, &["currency", "curr"]),
        (TradeCol::FEES, &["comm/fee", "commission", "fees", "fee"]),
    ];

    pub fn canonical_for_header(header: &str) -> Option<&'static str> {
        TRADE_HEADER_MAP.get(header.trim().to_lowercase().as_str()).copied()
    }

    pub fn required_cols() -> [&'static str; 3] {
        [TradeCol::INSTRUMENT, TradeCol::TRADE_DATE, TradeCol::QUANTITY]
    }

    /// Column order of a cleaned trade export. Proceeds are not exported,
    /// since price is always resolved by then.
    pub fn export_order_cols() -> [&'static str; 7] {
        [
            TradeCol::INSTRUMENT,
            TradeCol::TRADE_DATE,
            TradeCol::TYPE,
            TradeCol::QUANTITY,
            TradeCol::PRICE,
            TradeCol::CURRENCY,
            TradeCol::FEES,
        ]
    }
}

pub struct SplitCol();
impl SplitCol {
    pub const INSTRUMENT: &'static str = "instrument";
    pub const DATE: &'static str = "effective date";
    pub const RATIO: &'static str = "split ratio";

    pub fn canonical_for_header(header: &str) -> Option<&'static str> {
        match header.trim().to_lowercase().as_str() {
            "symbol" | "instrument" | "security" | "ticker" => Some(SplitCol::INSTRUMENT),
            "date" | "effective date" | "ex date" | "ex-date" => Some(SplitCol::DATE),
            "split ratio" | "ratio" | "split" => Some(SplitCol::RATIO),
            _ => None,
        }
    }
}

pub struct PriceCol();
impl PriceCol {
    pub const INSTRUMENT: &'static str = "instrument";
    pub const DATE: &'static str = "date";
    pub const CLOSE: &'static str = "close";
    pub const CURRENCY: &'static str = "currency";

    pub fn canonical_for_header(header: &str) -> Option<&'static str> {
        match header.trim().to_lowercase().as_str() {
            "symbol" | "instrument" | "security" | "ticker" => Some(PriceCol::INSTRUMENT),
            "date" => Some(PriceCol::DATE),
            "close" | "close price" | "adj close" | "price" => Some(PriceCol::CLOSE),
            "currency" | "curr" => Some(PriceCol::CURRENCY),
            _ => None,
        }
    }
}

pub struct FxCol();
impl FxCol {
    pub const PAIR: &'static str = "pair";
    pub const BASE: &'static str = "base";
    pub const QUOTE: &'static str = "quote";
    pub const DATE: &'static str = "date";
    pub const RATE: &'static str = "rate";

    pub fn canonical_for_header(header: &str) -> Option<&'static str> {
        match header.trim().to_lowercase().as_str() {
            "pair" | "currency pair" => Some(FxCol::PAIR),
            "base" | "from" => Some(FxCol::BASE),
            "quote" | "to" => Some(FxCol::QUOTE),
            "date" => Some(FxCol::DATE),
            "rate" | "fx rate" | "exchange rate" => Some(FxCol::RATE),
            _ => None,
        }
    }
}

/// Maps header indices to canonical column names. Unrecognized columns are
/// reported once on err_stream, and their values are never read.
pub fn map_csv_headers(
    headers: &csv::StringRecord,
    canonical_for_header: fn(&str) -> Option<&'static str>,
    csv_desc: &str,
    err_stream: &mut WriteHandle,
) -> HashMap<usize, &'static str> {
    let mut col_index_to_name = HashMap::new();
    for (i, col) in headers.iter().enumerate() {
        match canonical_for_header(col) {
            Some(c) => {
                col_index_to_name.insert(i, c);
            }
            None => write_errln!(
                err_stream,
                "Warning: Unrecognized column in {csv_desc}: {}",
                col.trim().to_lowercase()
            ),
        }
    }
    col_index_to_name
}

/// The non-empty, trimmed values of a record, keyed by canonical column.
pub fn csv_record_values(
    record: &csv::StringRecord,
    col_index_to_name: &HashMap<usize, &'static str>,
) -> HashMap<&'static str, String> {
    record
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.trim().is_empty())
        .filter_map(|(i, v)| col_index_to_name.get(&i).map(|c| (*c, v.trim().to_string())))
        .collect()
}

lazy_static! {
    static ref TRADE_HEADER_MAP: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        for (canonical, variants) in TradeCol::VARIANTS.iter() {
            for v in variants.iter() {
                m.insert(*v, *canonical);
            }
        }
        m
    };
}
