//! Money-weighted return (XIRR) of a dated cash flow schedule.
//!
//! Solves sum(CF_i / (1 + r)^t_i) = 0, where t_i is the number of days
//! since the earliest flow divided by 365 (actual/365).

use crate::errors::XirrError;
use crate::portfolio::CashFlow;
use crate::util::decimal::to_f64;
use crate::util::math::{find_bracket, newton_bisect, SolverOptions};

const DAYS_PER_YEAR: f64 = 365.0;

/// Candidate bracket end points, used when [min_rate, max_rate] does not
/// bracket a root by itself (schedules with several sign changes).
pub const DEFAULT_RATE_GRID: [f64; 19] = [
    -0.99, -0.95, -0.9, -0.75, -0.5, -0.25, -0.1, 0.0, 0.05, 0.1, 0.2, 0.35, 0.5, 1.0, 2.0,
    5.0, 10.0, 25.0, 100.0,
];

#[derive(PartialEq, Clone, Debug)]
pub struct XirrOptions {
    pub tolerance: f64,
    pub max_iterations: u32,
    pub guess: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub grid: Vec<f64>,
}

impl Default for XirrOptions {
    fn default() -> Self {
        XirrOptions {
            tolerance: 1e-10,
            max_iterations: 200,
            guess: 0.1,
            min_rate: -0.99,
            max_rate: 100.0,
            grid: DEFAULT_RATE_GRID.to_vec(),
        }
    }
}

/// (amount, years since the earliest flow) pairs.
fn to_timed_amounts(flows: &[CashFlow]) -> Result<Vec<(f64, f64)>, XirrError> {
    let Some(first_date) = flows.iter().map(|cf| cf.date).min() else {
        return Ok(Vec::new());
    };
    flows
        .iter()
        .map(|cf| {
            let amount = to_f64(&cf.amount).ok_or_else(|| {
                XirrError::NoConvergence(format!("cash flow {} is out of range", cf.amount))
            })?;
            let years = (cf.date - first_date).whole_days() as f64 / DAYS_PER_YEAR;
            Ok((amount, years))
        })
        .collect()
}

/// Net present value of the timed amounts at `rate`, with its derivative.
fn xnpv_with_derivative(rate: f64, timed: &[(f64, f64)]) -> (f64, f64) {
    let base = 1.0 + rate;
    let mut npv = 0.0;
    let mut d_npv = 0.0;
    for (amount, t) in timed {
        let discounted = amount * base.powf(-t);
        npv += discounted;
        d_npv += -t * discounted / base;
    }
    (npv, d_npv)
}

pub fn xnpv(rate: f64, flows: &[CashFlow]) -> Result<f64, XirrError> {
    Ok(xnpv_with_derivative(rate, &to_timed_amounts(flows)?).0)
}

/// The annualized rate at which the schedule's net present value is zero.
///
/// Fewer than two flows is InsufficientData. A schedule with flows of only
/// one sign has no root, and is NoConvergence. So is a schedule whose flows
/// all share one date, or any failure of the solver to converge within opts.
pub fn xirr(flows: &[CashFlow], opts: &XirrOptions) -> Result<f64, XirrError> {
    if flows.len() < 2 {
        return Err(XirrError::InsufficientData(flows.len()));
    }
    let timed = to_timed_amounts(flows)?;

    let has_inflow = timed.iter().any(|(a, _)| *a > 0.0);
    let has_outflow = timed.iter().any(|(a, _)| *a < 0.0);
    if !(has_inflow && has_outflow) {
        return Err(XirrError::NoConvergence(
            "cash flows are all of the same sign".to_string(),
        ));
    }
    // NPV does not depend on the rate when every flow is on one date.
    if timed.iter().all(|(_, t)| *t == 0.0) {
        return Err(XirrError::NoConvergence(
            "all cash flows are on the same date".to_string(),
        ));
    }

    let npv = |r: f64| xnpv_with_derivative(r, &timed).0;
    let grid: Vec<f64> = opts
        .grid
        .iter()
        .copied()
        .filter(|r| *r >= opts.min_rate && *r <= opts.max_rate)
        .collect();
    let bracket = find_bracket(npv, opts.min_rate, opts.max_rate, &grid, opts.guess)
        .map_err(|e| XirrError::NoConvergence(e.to_string()))?;
    tracing::trace!("xirr: bracket {:?} for {} flows", bracket, flows.len());

    let solver_opts = SolverOptions {
        tolerance: opts.tolerance,
        max_iterations: opts.max_iterations,
    };
    newton_bisect(
        |r| xnpv_with_derivative(r, &timed),
        bracket,
        opts.guess,
        &solver_opts,
    )
    .map_err(|e| XirrError::NoConvergence(e.to_string()))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::{
        errors::XirrError,
        portfolio::{CashFlow, CashFlowKind},
        util::date::pub_testlib::ymd,
    };

    use super::{xirr, xnpv, XirrOptions};

    fn cf(d: time::Date, amount: rust_decimal::Decimal) -> CashFlow {
        let kind = if amount < dec!(0) {
            CashFlowKind::Buy
        } else {
            CashFlowKind::Sell
        };
        CashFlow::new(d, amount, kind)
    }

    #[test]
    fn test_one_year_ten_percent() {
        let flows = vec![
            cf(ymd(2023, 1, 1), dec!(-1000)),
            cf(ymd(2024, 1, 1), dec!(1100)),
        ];
        let r = xirr(&flows, &XirrOptions::default()).unwrap();
        assert!((r - 0.10).abs() < 1e-9, "{}", r);
        assert!(xnpv(r, &flows).unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_partial_year() {
        // 151 days, 1000 -> 1200
        let flows = vec![
            cf(ymd(2023, 1, 1), dec!(-1000)),
            cf(ymd(2023, 6, 1), dec!(1200)),
        ];
        let r = xirr(&flows, &XirrOptions::default()).unwrap();
        let expected = 1.2f64.powf(365.0 / 151.0) - 1.0;
        assert!((r - expected).abs() < 1e-8, "{} vs {}", r, expected);
    }

    #[test]
    fn test_loss() {
        let flows = vec![
            cf(ymd(2023, 1, 1), dec!(-1000)),
            cf(ymd(2023, 7, 1), dec!(-500)),
            cf(ymd(2024, 1, 1), dec!(900)),
        ];
        let r = xirr(&flows, &XirrOptions::default()).unwrap();
        assert!(r < 0.0, "{}", r);
        assert!(xnpv(r, &flows).unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_degenerate() {
        let flows = vec![
            cf(ymd(2023, 1, 1), dec!(-1000)),
            cf(ymd(2023, 6, 1), dec!(-1200)),
        ];
        assert!(matches!(
            xirr(&flows, &XirrOptions::default()),
            Err(XirrError::NoConvergence(_))
        ));

        let flows = vec![cf(ymd(2023, 1, 1), dec!(-1000))];
        assert_eq!(
            xirr(&flows, &XirrOptions::default()),
            Err(XirrError::InsufficientData(1))
        );
        assert_eq!(
            xirr(&[], &XirrOptions::default()),
            Err(XirrError::InsufficientData(0))
        );
    }

    #[test]
    fn test_same_day_round_trip() {
        let flows = vec![
            cf(ymd(2023, 1, 2), dec!(-1000)),
            cf(ymd(2023, 1, 2), dec!(1000)),
        ];
        assert!(matches!(
            xirr(&flows, &XirrOptions::default()),
            Err(XirrError::NoConvergence(_))
        ));
    }

    #[test]
    fn test_reproducible() {
        let flows = vec![
            cf(ymd(2020, 3, 2), dec!(-2500.5)),
            cf(ymd(2021, 1, 15), dec!(-700)),
            cf(ymd(2022, 8, 9), dec!(1234.56)),
            cf(ymd(2023, 12, 29), dec!(3100)),
        ];
        let opts = XirrOptions::default();
        let a = xirr(&flows, &opts).unwrap();
        let b = xirr(&flows, &opts).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }
}
