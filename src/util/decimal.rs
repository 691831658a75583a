use std::{fmt::Display, marker::PhantomData, ops::Deref, str::FromStr};

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};

use self::constraint::{GreaterEqualZero, Pos};

// These were deprecated as methods on Decimal, so re-implement them.
// Those implementations don't actually do zero checks, and can result
// in weird behaviour.
pub fn is_positive(d: &Decimal) -> bool {
    d.is_sign_positive() && !d.is_zero()
}

pub fn is_negative(d: &Decimal) -> bool {
    d.is_sign_negative() && !d.is_zero()
}

/// Money is rendered to the cent, rounding half away from zero.
pub fn money_str(d: &Decimal) -> String {
    format!(
        "{:.2}",
        d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

/// Renders d with at least min_precision decimal places, but never drops
/// significant digits.
pub fn to_string_min_precision(d: &Decimal, min_precision: u32) -> String {
    let normalized = d.normalize();
    if normalized.scale() >= min_precision {
        normalized.to_string()
    } else {
        format!("{:.*}", min_precision as usize, normalized)
    }
}

/// Parses a number as it appears in exported spreadsheets. Thousands
/// separators are removed, and surrounding whitespace is ignored.
pub fn parse_loose_decimal(s: &str) -> Result<Decimal, String> {
    let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|e| e.to_string())
}

pub fn to_f64(d: &Decimal) -> Option<f64> {
    d.to_f64().filter(|f| f.is_finite())
}

pub trait DecConstraint {
    fn is_ok(d: &Decimal) -> bool;
}

pub mod constraint {
    use rust_decimal::Decimal;

    use super::{is_positive, DecConstraint};

    #[derive(PartialEq, Eq, Clone, Copy, Debug)]
    pub struct GreaterEqualZero(());
    impl DecConstraint for GreaterEqualZero {
        fn is_ok(d: &Decimal) -> bool {
            d.is_sign_positive() || d.is_zero()
        }
    }

    #[derive(PartialEq, Eq, Clone, Copy, Debug)]
    pub struct Pos(());
    impl DecConstraint for Pos {
        fn is_ok(d: &Decimal) -> bool {
            is_positive(d)
        }
    }
}

// A constrained instance of Decimal. This can only be created through ::try_from,
// which will enforce the DecConstraint. Quantities, prices and rates are
// carried in these so that a negative or zero value can never reach the
// bookkeeping code.
//
// PhantomData here is size zero, and only carries the constraint type.
pub struct ConstrainedDecimal<CONSTRAINT>(Decimal, PhantomData<CONSTRAINT>);

impl<CONSTRAINT: DecConstraint> TryFrom<Decimal> for ConstrainedDecimal<CONSTRAINT> {
    type Error = String;

    fn try_from(d: Decimal) -> Result<Self, Self::Error> {
        if CONSTRAINT::is_ok(&d) {
            Ok(Self(d, PhantomData))
        } else {
            Err(format!(
                "{} does not match constraints of {}",
                d,
                std::any::type_name::<CONSTRAINT>()
            ))
        }
    }
}

impl<CONSTRAINT: DecConstraint> Deref for ConstrainedDecimal<CONSTRAINT> {
    type Target = Decimal;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<CONSTRAINT: DecConstraint> Display for ConstrainedDecimal<CONSTRAINT> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl<CONSTRAINT: DecConstraint> std::fmt::Debug for ConstrainedDecimal<CONSTRAINT> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.0, f)
    }
}

impl<CONSTRAINT: DecConstraint> PartialEq for ConstrainedDecimal<CONSTRAINT> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<CONSTRAINT: DecConstraint> Eq for ConstrainedDecimal<CONSTRAINT> {}

impl<CONSTRAINT: DecConstraint> Clone for ConstrainedDecimal<CONSTRAINT> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<CONSTRAINT: DecConstraint> Copy for ConstrainedDecimal<CONSTRAINT> {}

impl std::ops::Add for ConstrainedDecimal<GreaterEqualZero> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        // GEZ + GEZ will never violate its own constraint
        Self(self.0 + rhs.0, PhantomData)
    }
}

impl std::ops::AddAssign for ConstrainedDecimal<GreaterEqualZero> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl From<ConstrainedDecimal<Pos>> for ConstrainedDecimal<GreaterEqualZero> {
    fn from(value: ConstrainedDecimal<Pos>) -> Self {
        Self(value.0, PhantomData)
    }
}

impl ConstrainedDecimal<GreaterEqualZero> {
    pub fn zero() -> Self {
        Self(Decimal::ZERO, PhantomData)
    }

    pub fn mul_pos(self, rhs: ConstrainedDecimal<Pos>) -> Self {
        // GEZ * Pos will never violate its own constraint
        Self(self.0 * rhs.0, PhantomData)
    }

    pub fn div_pos(self, rhs: ConstrainedDecimal<Pos>) -> Self {
        // GEZ / Pos will never violate its own constraint, or divide by zero
        Self(self.0 / rhs.0, PhantomData)
    }
}

impl std::ops::Mul for ConstrainedDecimal<Pos> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        // Pos * Pos will never violate its own constraint
        Self(self.0 * rhs.0, PhantomData)
    }
}

impl std::ops::Div for ConstrainedDecimal<Pos> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        // Pos / Pos will never violate its own constraint
        Self(self.0 / rhs.0, PhantomData)
    }
}

impl ConstrainedDecimal<Pos> {
    pub fn one() -> Self {
        Self(Decimal::ONE, PhantomData)
    }

    pub fn inverse(self) -> Self {
        Self(Decimal::ONE / self.0, PhantomData)
    }
}

// Convenience aliases
pub type GreaterEqualZeroDecimal = ConstrainedDecimal<constraint::GreaterEqualZero>;
pub type PosDecimal = ConstrainedDecimal<constraint::Pos>;

#[macro_export]
macro_rules! pdec {
    ($arg:literal) => {{
        use rust_decimal_macros::dec;
        $crate::util::decimal::PosDecimal::try_from(dec!($arg)).unwrap()
    }};
}

#[macro_export]
macro_rules! gezdec {
    ($arg:literal) => {{
        use rust_decimal_macros::dec;
        $crate::util::decimal::GreaterEqualZeroDecimal::try_from(dec!($arg)).unwrap()
    }};
}
