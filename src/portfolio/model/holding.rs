use rust_decimal::Decimal;
use time::Date;

use crate::util::decimal::GreaterEqualZeroDecimal;

use super::trade::{Instrument, Trade};

/// Position in one instrument as of the end of a day. All costs are in
/// the home currency.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Holding {
    pub instrument: Instrument,
    pub as_of_date: Date,
    pub quantity: GreaterEqualZeroDecimal,
    pub total_cost: GreaterEqualZeroDecimal,
}

impl Holding {
    pub fn empty(instrument: &str, as_of_date: Date) -> Holding {
        Holding {
            instrument: instrument.to_string(),
            as_of_date,
            quantity: GreaterEqualZeroDecimal::zero(),
            total_cost: GreaterEqualZeroDecimal::zero(),
        }
    }

    pub fn average_cost(&self) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            *self.total_cost / *self.quantity
        }
    }

    pub fn is_open(&self) -> bool {
        !self.quantity.is_zero()
    }

    /// The same position, observed on a later day.
    pub fn carried_to(&self, date: Date) -> Holding {
        Holding {
            as_of_date: date,
            ..self.clone()
        }
    }
}

/// The effect of a single trade on a holding.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct HoldingDelta {
    pub trade: Trade,
    pub pre: Holding,
    pub post: Holding,
    /// Only set for sells.
    pub realized_gain: Option<Decimal>,
}
