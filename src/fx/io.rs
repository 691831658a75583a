mod rate_loader;
mod rate_source;

// Exports
pub use self::rate_loader::*;
pub use self::rate_source::*;
