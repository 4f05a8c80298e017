//! Bounded Newton-Raphson solutions of Kepler's equation.
//!
//! Both forms stop once a Newton step is smaller than the tolerance and report
//! [`KeplerError::NotConverged`] when the iteration cap is reached first, so a
//! caller never receives an unchecked anomaly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kepler iteration failure.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum KeplerError {
    #[error("Kepler iteration did not converge in {iterations} iterations (last step {last_step:e} rad)")]
    NotConverged { iterations: usize, last_step: f64 },
}

/// Tolerance and iteration cap for the Newton solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeplerSolver {
    /// Convergence threshold on the Newton step (rad).
    pub tolerance: f64,
    /// Maximum number of Newton steps.
    pub max_iterations: usize,
}

impl Default for KeplerSolver {
    fn default() -> Self {
        KeplerSolver {
            tolerance: 1e-12,
            max_iterations: 25,
        }
    }
}

impl KeplerSolver {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        KeplerSolver { tolerance, max_iterations }
    }

    /// Solve M = E - e sin(E) for the eccentric anomaly E.
    pub fn solve(&self, m: f64, e: f64) -> Result<f64, KeplerError> {
        let mut ea = if e < 0.8 { m } else { std::f64::consts::PI };
        let mut last_step = f64::INFINITY;

        for _ in 0..self.max_iterations {
            let f = ea - e * ea.sin() - m;
            let fp = 1.0 - e * ea.cos();
            let delta = f / fp;
            ea -= delta;
            last_step = delta.abs();
            if last_step < self.tolerance {
                return Ok(ea);
            }
        }
        Err(KeplerError::NotConverged {
            iterations: self.max_iterations,
            last_step,
        })
    }

    /// Solve the SGP4 form u = E' - axn sin(E') + ayn cos(E') for E' = E + ω,
    /// where (axn, ayn) is the eccentricity vector in the node frame.
    ///
    /// Steps are limited to ±0.95 rad as in the reference formulation.
    pub fn solve_equinoctial(&self, u: f64, axn: f64, ayn: f64) -> Result<f64, KeplerError> {
        let mut eo1 = u;
        let mut last_step = f64::INFINITY;

        for _ in 0..self.max_iterations {
            let (sin_e, cos_e) = eo1.sin_cos();
            let denom = 1.0 - cos_e * axn - sin_e * ayn;
            let step = ((u - ayn * cos_e + axn * sin_e - eo1) / denom).clamp(-0.95, 0.95);
            eo1 += step;
            last_step = step.abs();
            if last_step < self.tolerance {
                return Ok(eo1);
            }
        }
        Err(KeplerError::NotConverged {
            iterations: self.max_iterations,
            last_step,
        })
    }

    /// Convert mean anomaly to true anomaly.
    pub fn mean_to_true_anomaly(&self, m: f64, e: f64) -> Result<f64, KeplerError> {
        let ea = self.solve(m, e)?;
        Ok(2.0 * ((1.0 + e).sqrt() * (ea / 2.0).sin()).atan2((1.0 - e).sqrt() * (ea / 2.0).cos()))
    }
}
