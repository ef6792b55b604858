//! Special functions used by the closed-form stage solvers.

mod wright;

pub use wright::{omega, OMEGA_TAYLOR_THRESHOLD};
