//! Wright omega function.
//!
//! `omega(x)` is the unique `w > 0` with `w + ln(w) = x`, i.e.
//! `omega(x) = W0(exp(x))`. It inverts the exponential diode law in closed
//! form, which is what lets the diode clipper skip a per-sample Newton loop.
//!
//! The evaluation is fixed-work: a seed chosen by input range followed by a
//! constant number of Newton corrections.

/// Inputs with `|x|` at or below this use the Taylor seed around 0.
pub const OMEGA_TAYLOR_THRESHOLD: f64 = 1.5;

/// Taylor coefficients of omega around 0 (`c0 = W(1)`, the omega constant).
const TAYLOR: [f64; 6] = [
    0.5671432904097838,
    0.3618963236098023,
    0.0736778463779836,
    -0.0013437346889135,
    -0.0016355437889344,
    0.0002166542734346,
];

const TAYLOR_CORRECTIONS: usize = 2;
const TAIL_CORRECTIONS: usize = 3;

/// Evaluate the Wright omega function.
///
/// Total over `f64`: `+inf` maps to `+inf`, `-inf` to `0`, `NaN` to `NaN`.
/// Very negative inputs underflow gracefully to `0`.
#[inline]
pub fn omega(x: f64) -> f64 {
    if x.is_infinite() {
        return x.max(0.0);
    }

    if x.abs() <= OMEGA_TAYLOR_THRESHOLD {
        let mut w = taylor(x);
        for _ in 0..TAYLOR_CORRECTIONS {
            w = exp_correction(w, x);
        }
        w
    } else if x < -OMEGA_TAYLOR_THRESHOLD {
        // omega(x) ~ exp(x) as x -> -inf
        let mut w = x.exp();
        for _ in 0..TAIL_CORRECTIONS {
            w = exp_correction(w, x);
        }
        w
    } else {
        // omega(x) ~ x - ln(x) as x -> +inf; NaN also lands here and propagates
        let mut w = x - x.ln();
        for _ in 0..TAIL_CORRECTIONS {
            w = log_correction(w, x);
        }
        w
    }
}

#[inline]
fn taylor(x: f64) -> f64 {
    let [c0, c1, c2, c3, c4, c5] = TAYLOR;
    c0 + x * (c1 + x * (c2 + x * (c3 + x * (c4 + x * c5))))
}

/// Newton step on `w - exp(x - w) = 0`. Safe as `w -> 0`.
#[inline]
fn exp_correction(w: f64, x: f64) -> f64 {
    w - (w - (x - w).exp()) / (1.0 + w)
}

/// Newton step on `w + ln(w) - x = 0`. Converges fast for large `w`.
#[inline]
fn log_correction(w: f64, x: f64) -> f64 {
    w - (w + w.ln() - x) * w / (1.0 + w)
}
