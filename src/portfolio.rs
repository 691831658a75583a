pub mod bookkeeping;
pub mod cashflows;
pub mod csv_common;
pub mod io;
pub mod model;
pub mod normalize;
pub mod render;
pub mod splits;
pub mod summary;
pub mod xirr;

pub use self::model::cashflow::*;
pub use self::model::currency::*;
pub use self::model::holding::*;
pub use self::model::split::*;
pub use self::model::trade::*;
pub use self::model::valuation::*;
