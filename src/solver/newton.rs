//! Fixed-iteration Newton-Raphson for per-sample nonlinear roots.

use super::{DEFAULT_EPSILON, DEFAULT_ITERATIONS};

/// Configuration for the fixed-iteration solver.
///
/// Both values are fixed when a stage is built and never change during a
/// solve, so the cost of every sample is the same.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Number of Newton updates performed per solve.
    pub iterations: usize,
    /// Added to the derivative before dividing.
    pub epsilon: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl SolverConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of Newton updates.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the denominator damping term.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }
}

/// Bounded Newton-Raphson solver.
///
/// Runs exactly `iterations` updates `x <- x - f(x) / (f'(x) + epsilon)`.
/// There is no convergence test and no early exit: worst-case cost equals
/// typical cost. The solver holds no state between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedIterationSolver {
    config: SolverConfig,
}

impl FixedIterationSolver {
    /// Create a solver with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a solver with a custom configuration.
    pub fn with_config(config: SolverConfig) -> Self {
        Self { config }
    }

    /// The configuration this solver runs with.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve `f(x) = 0` starting from `x0`.
    ///
    /// `residual` returns `(f(x), f'(x))`.
    #[inline]
    pub fn solve<F>(&self, x0: f64, mut residual: F) -> f64
    where
        F: FnMut(f64) -> (f64, f64),
    {
        let mut x = x0;
        for _ in 0..self.config.iterations {
            let (f, df) = residual(x);
            x -= f / (df + self.config.epsilon);
        }
        x
    }

    /// Solve `f(x) = 0` with `x` kept inside `[lo, hi]`.
    ///
    /// The seed is clamped first and every update is clamped afterwards, for
    /// device models that are undefined (or meaningless) outside the range.
    /// A NaN bound leaves that side open instead of panicking.
    #[inline]
    pub fn solve_clamped<F>(&self, x0: f64, lo: f64, hi: f64, mut residual: F) -> f64
    where
        F: FnMut(f64) -> (f64, f64),
    {
        let mut x = x0.max(lo).min(hi);
        for _ in 0..self.config.iterations {
            let (f, df) = residual(x);
            x = (x - f / (df + self.config.epsilon)).max(lo).min(hi);
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_square_root() {
        let solver = FixedIterationSolver::new();
        let x = solver.solve(1.0, |x| (x * x - 2.0, 2.0 * x));
        assert_abs_diff_eq!(x, std::f64::consts::SQRT_2, epsilon = 1e-9);
    }

    #[test]
    fn test_exact_iteration_count() {
        let solver = FixedIterationSolver::with_config(SolverConfig::new().with_iterations(7));
        let mut calls = 0;
        // Already at the root: a convergence check would stop early, we must not.
        solver.solve(0.0, |x| {
            calls += 1;
            (x, 1.0)
        });
        assert_eq!(calls, 7);
    }

    #[test]
    fn test_bit_identical_results() {
        let solver = FixedIterationSolver::new();
        let f = |x: f64| (x.exp() - 3.0 * x, x.exp() - 3.0);
        let a = solver.solve(0.3, f);
        let b = solver.solve(0.3, f);
        assert_eq!(a.to_bits(), b.to_bits());

        let c = solver.solve_clamped(4.0, 0.0, 9.0, f);
        let d = solver.solve_clamped(4.0, 0.0, 9.0, f);
        assert_eq!(c.to_bits(), d.to_bits());
    }

    #[test]
    fn test_zero_derivative_is_damped() {
        let solver = FixedIterationSolver::new();
        // f'(x) = 0 everywhere: epsilon keeps the update finite.
        let x = solver.solve_clamped(0.5, -1.0, 1.0, |_| (1e-12, 0.0));
        assert!(x.is_finite());
    }

    #[test]
    fn test_clamped_to_range() {
        let solver = FixedIterationSolver::new();
        // Root at -5 lies outside the range, so the result sits on the bound.
        let x = solver.solve_clamped(2.0, 0.0, 9.0, |x| (x + 5.0, 1.0));
        assert_eq!(x, 0.0);

        // Seed outside the range is pulled in before the first update.
        let y = solver.solve_clamped(100.0, 0.0, 9.0, |x| (x - 3.0, 1.0));
        assert_abs_diff_eq!(y, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_nan_bound_does_not_panic() {
        let solver = FixedIterationSolver::new();
        let x = solver.solve_clamped(1.0, 0.0, f64::NAN, |x| (x - 3.0, 1.0));
        assert_abs_diff_eq!(x, 3.0, epsilon = 1e-6);
    }
}
