//! Bracketed root finding for smooth, monotone-ish functions of one variable.
//!
//! The solver is a safeguarded Newton iteration: Newton steps are taken while
//! they stay inside the current bracket and shrink it fast enough, otherwise
//! the step falls back to bisection. Everything is plain f64 arithmetic in a
//! fixed order, so results are reproducible for identical inputs.

#[derive(PartialEq, Clone, Copy, Debug)]
pub struct SolverOptions {
    /// Stop once the step size drops below this.
    pub tolerance: f64,
    pub max_iterations: u32,
}

#[derive(PartialEq, Clone, Debug)]
pub enum RootError {
    NoBracket { lo: f64, hi: f64 },
    NotFinite { x: f64 },
    MaxIterations { iterations: u32, last: f64 },
}

impl std::fmt::Display for RootError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RootError::NoBracket { lo, hi } => {
                write!(f, "no sign change found in [{}, {}]", lo, hi)
            }
            RootError::NotFinite { x } => {
                write!(f, "function was not finite at {}", x)
            }
            RootError::MaxIterations { iterations, last } => write!(
                f,
                "did not converge within {} iterations (last estimate {})",
                iterations, last
            ),
        }
    }
}

fn opposite_signs(a: f64, b: f64) -> bool {
    (a < 0.0 && b > 0.0) || (a > 0.0 && b < 0.0)
}

/// Finds an interval [a, b] with f(a) and f(b) of opposite sign.
///
/// The full [lo, hi] interval is tried first. Otherwise adjacent pairs of
/// `grid` (which must be ascending and within [lo, hi]) are scanned, and the
/// pair closest to `near` wins. A grid point that is an exact root yields a
/// degenerate bracket at that point.
pub fn find_bracket<F>(f: F, lo: f64, hi: f64, grid: &[f64], near: f64)
    -> Result<(f64, f64), RootError>
where
    F: Fn(f64) -> f64,
{
    let f_lo = f(lo);
    let f_hi = f(hi);
    if f_lo == 0.0 {
        return Ok((lo, lo));
    }
    if f_hi == 0.0 {
        return Ok((hi, hi));
    }
    if opposite_signs(f_lo, f_hi) {
        return Ok((lo, hi));
    }

    let values: Vec<(f64, f64)> = grid.iter().map(|x| (*x, f(*x))).collect();
    let mut best: Option<(f64, f64)> = None;
    let dist = |a: f64, b: f64| -> f64 {
        if near < a {
            a - near
        } else if near > b {
            near - b
        } else {
            0.0
        }
    };
    for w in values.windows(2) {
        let ((a, fa), (b, fb)) = (w[0], w[1]);
        if fa == 0.0 {
            return Ok((a, a));
        }
        if opposite_signs(fa, fb) {
            match best {
                Some((ba, bb)) if dist(ba, bb) <= dist(a, b) => (),
                _ => best = Some((a, b)),
            }
        }
    }
    best.ok_or(RootError::NoBracket { lo, hi })
}

/// Solves f(x) = 0 within a bracket [a, b] where f(a) and f(b) have
/// opposite signs (or a == b is already a root).
///
/// `fdf` returns (f(x), f'(x)). `guess` is used as the first iterate when it
/// lies inside the bracket.
pub fn newton_bisect<F>(
    fdf: F,
    bracket: (f64, f64),
    guess: f64,
    opts: &SolverOptions,
) -> Result<f64, RootError>
where
    F: Fn(f64) -> (f64, f64),
{
    let (a, b) = bracket;
    if a == b {
        return Ok(a);
    }
    let (fa, _) = fdf(a);
    let (fb, _) = fdf(b);
    if !fa.is_finite() {
        return Err(RootError::NotFinite { x: a });
    }
    if !fb.is_finite() {
        return Err(RootError::NotFinite { x: b });
    }
    if fa == 0.0 {
        return Ok(a);
    }
    if fb == 0.0 {
        return Ok(b);
    }
    if !opposite_signs(fa, fb) {
        return Err(RootError::NoBracket { lo: a, hi: b });
    }

    // Orient so that f(xl) < 0 < f(xh)
    let (mut xl, mut xh) = if fa < 0.0 { (a, b) } else { (b, a) };
    let (lo, hi) = (a.min(b), a.max(b));

    let mut x = if guess > lo && guess < hi { guess } else { 0.5 * (a + b) };
    let mut dx_old = (b - a).abs();
    let mut dx = dx_old;
    let (mut fx, mut dfx) = fdf(x);

    for _ in 0..opts.max_iterations {
        if !fx.is_finite() || !dfx.is_finite() {
            return Err(RootError::NotFinite { x });
        }
        if fx == 0.0 {
            return Ok(x);
        }

        let newton_leaves_bracket = ((x - xh) * dfx - fx) * ((x - xl) * dfx - fx) > 0.0;
        let newton_too_slow = (2.0 * fx).abs() > (dx_old * dfx).abs();
        if newton_leaves_bracket || newton_too_slow {
            dx_old = dx;
            dx = 0.5 * (xh - xl);
            x = xl + dx;
            if x == xl {
                return Ok(x);
            }
        } else {
            dx_old = dx;
            dx = fx / dfx;
            let prev = x;
            x -= dx;
            if x == prev {
                return Ok(x);
            }
        }

        if dx.abs() < opts.tolerance {
            return Ok(x);
        }

        (fx, dfx) = fdf(x);
        if fx < 0.0 {
            xl = x;
        } else {
            xh = x;
        }
    }

    Err(RootError::MaxIterations {
        iterations: opts.max_iterations,
        last: x,
    })
}
