pub mod split_csv;
pub mod trade_csv;
