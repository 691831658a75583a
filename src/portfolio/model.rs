pub mod cashflow;
pub mod currency;
pub mod holding;
pub mod split;
pub mod trade;
pub mod valuation;
