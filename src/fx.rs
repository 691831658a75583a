pub mod convert;
pub mod io;
mod model;

pub use self::model::*;
