mod holdings;
mod valuation;

// Exports
pub use self::holdings::*;
pub use self::valuation::*;
