use std::fmt::Display;

use lazy_static::lazy_static;
use regex::Regex;
use time::Date;

use crate::util::decimal::{parse_loose_decimal, PosDecimal};

use super::trade::Instrument;

lazy_static! {
    static ref SPLIT_RATIO_RE: Regex =
        Regex::new(r"^\s*([0-9.]+)\s*(?:-?\s*for\s*-?|:)\s*([0-9.]+)\s*$")
            .unwrap();
}

/// new_shares / old_shares. A 2-for-1 split doubles the share count.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct SplitRatio {
    pub new_shares: PosDecimal,
    pub old_shares: PosDecimal,
}

impl SplitRatio {
    pub fn new(new_shares: PosDecimal, old_shares: PosDecimal) -> SplitRatio {
        SplitRatio { new_shares, old_shares }
    }

    /// Accepts "2-for-1", "2 for 1", "2:1", or a plain factor such as "1.5".
    pub fn parse(s: &str) -> Result<SplitRatio, String> {
        let err = || format!("\"{}\" does not match N-for-M split format", s);
        let pos = |v: &str| -> Result<PosDecimal, String> {
            let d = parse_loose_decimal(v).map_err(|_| err())?;
            PosDecimal::try_from(d).map_err(|_| err())
        };

        if let Some(caps) = SPLIT_RATIO_RE.captures(s) {
            return Ok(SplitRatio::new(pos(&caps[1])?, pos(&caps[2])?));
        }
        Ok(SplitRatio::new(pos(s)?, PosDecimal::one()))
    }

    pub fn one() -> SplitRatio {
        SplitRatio::new(PosDecimal::one(), PosDecimal::one())
    }

    /// Rounded to decimal precision. Use compose/apply_to_* for exact
    /// arithmetic on non-terminating ratios like 1-for-3.
    pub fn factor(&self) -> PosDecimal {
        self.new_shares / self.old_shares
    }

    pub fn is_one(&self) -> bool {
        self.new_shares == self.old_shares
    }

    /// Compares N/M fractions without dividing. 4-for-2 is 2-for-1.
    pub fn same_factor(&self, other: &SplitRatio) -> bool {
        *self.new_shares * *other.old_shares == *other.new_shares * *self.old_shares
    }

    /// The ratio of applying `self` then `other`, kept as a fraction.
    pub fn compose(&self, other: &SplitRatio) -> SplitRatio {
        SplitRatio::new(
            self.new_shares * other.new_shares,
            self.old_shares * other.old_shares,
        )
    }

    pub fn apply_to_quantity(&self, quantity: PosDecimal) -> PosDecimal {
        quantity * self.new_shares / self.old_shares
    }

    pub fn apply_to_price(&self, price: PosDecimal) -> PosDecimal {
        price * self.old_shares / self.new_shares
    }
}

impl Display for SplitRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-for-{}",
            self.new_shares.normalize(),
            self.old_shares.normalize()
        )
    }
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct SplitEvent {
    pub instrument: Instrument,
    /// Trades strictly before this date are adjusted.
    pub effective_date: Date,
    pub ratio: SplitRatio,
}
