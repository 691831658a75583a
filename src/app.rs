pub mod approot;
pub mod input_parse;
pub mod outfmt;

pub use self::approot::*;

// Version is of the format 0.YY.MM[.i], or 0.year.month.optional_minor_increment,
// so that it is obvious when the app was last updated.
pub const PORTAN_APP_VERSION: &str = "0.26.10";
