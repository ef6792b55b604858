//! Bounded-work nonlinear solving.
//!
//! Every stage that cannot invert its device law in closed form finds the
//! unknown output of a sample as the root of a scalar residual:
//!
//! ```text
//! f(v) = 0,   v_(k+1) = v_k - f(v_k) / (f'(v_k) + epsilon)
//! ```
//!
//! The iteration count is a constant of the configuration rather than the
//! result of a convergence test, so a sample always costs the same amount of
//! work no matter what the input does.

mod newton;

pub use newton::{FixedIterationSolver, SolverConfig};

/// Newton updates per sample unless a stage asks for something else.
pub const DEFAULT_ITERATIONS: usize = 10;

/// Damping added to the derivative in every Newton update.
pub const DEFAULT_EPSILON: f64 = 1e-9;
