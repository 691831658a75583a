mod price_source;

// Exports
pub use self::price_source::*;
