//! Orbit propagation interface and the analytical secular model.
//!
//! Every model implements [`Propagator`]: derived state is computed once at
//! construction and each query is a pure function of the requested instant,
//! so a propagator can be shared across threads without locking.
//!
//! Failures at a single instant are data, not errors: [`Propagator::position_at`]
//! returns [`PositionSample::Invalid`] carrying the [`PropagationFault`].
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::*;
use crate::elements::{ElementSet, MeanElements};
use crate::kepler::{KeplerError, KeplerSolver};
use crate::sgp4::Sgp4;

// ── State vector ──

/// Cartesian state vector in an Earth-centered inertial frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    /// Position (km): [x, y, z]
    pub r: [f64; 3],
    /// Velocity (km/s): [vx, vy, vz]
    pub v: [f64; 3],
    /// Instant the state refers to.
    pub epoch: DateTime<Utc>,
}

impl StateVector {
    /// Position magnitude (km).
    pub fn r_mag(&self) -> f64 {
        (self.r[0].powi(2) + self.r[1].powi(2) + self.r[2].powi(2)).sqrt()
    }

    /// Velocity magnitude (km/s).
    pub fn v_mag(&self) -> f64 {
        (self.v[0].powi(2) + self.v[1].powi(2) + self.v[2].powi(2)).sqrt()
    }

    /// Altitude above Earth surface (km).
    pub fn altitude(&self) -> f64 {
        self.r_mag() - R_EARTH
    }

    /// Specific orbital energy (km²/s²).
    pub fn energy(&self) -> f64 {
        self.v_mag().powi(2) / 2.0 - MU_EARTH / self.r_mag()
    }

    /// Convert from Keplerian elements with true anomaly `nu`.
    pub fn from_keplerian(
        a: f64,
        e: f64,
        i: f64,
        raan: f64,
        aop: f64,
        nu: f64,
        epoch: DateTime<Utc>,
    ) -> Self {
        // Perifocal frame
        let p = a * (1.0 - e.powi(2));
        let r_pf = p / (1.0 + e * nu.cos());

        let r_pqw = [r_pf * nu.cos(), r_pf * nu.sin(), 0.0];
        let v_factor = (MU_EARTH / p).sqrt();
        let v_pqw = [v_factor * (-nu.sin()), v_factor * (e + nu.cos()), 0.0];

        // Rotation matrix PQW -> ECI
        let (sin_raan, cos_raan) = raan.sin_cos();
        let (sin_aop, cos_aop) = aop.sin_cos();
        let (sin_i, cos_i) = i.sin_cos();

        let rot = [
            [
                cos_raan * cos_aop - sin_raan * sin_aop * cos_i,
                -cos_raan * sin_aop - sin_raan * cos_aop * cos_i,
                sin_raan * sin_i,
            ],
            [
                sin_raan * cos_aop + cos_raan * sin_aop * cos_i,
                -sin_raan * sin_aop + cos_raan * cos_aop * cos_i,
                -cos_raan * sin_i,
            ],
            [sin_aop * sin_i, cos_aop * sin_i, cos_i],
        ];

        let mut r = [0.0; 3];
        let mut v = [0.0; 3];
        for j in 0..3 {
            for k in 0..3 {
                r[j] += rot[j][k] * r_pqw[k];
                v[j] += rot[j][k] * v_pqw[k];
            }
        }

        StateVector { r, v, epoch }
    }
}

// ── Samples and faults ──

/// Why a propagator could not produce a state at an instant.
#[derive(Error, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PropagationFault {
    #[error("Kepler solve did not converge in {iterations} iterations")]
    KeplerNotConverged { iterations: usize },

    #[error("orbit decayed: radius {radius_km:.1} km below decay threshold")]
    Decayed { radius_km: f64 },

    #[error("mean eccentricity {0} left [0, 1)")]
    EccentricityOutOfRange(f64),

    #[error("mean motion {0} is not positive")]
    MeanMotionNonPositive(f64),

    #[error("semi-latus rectum {0} is negative")]
    SemiLatusRectumNegative(f64),

    #[error("propagation produced a non-finite state")]
    NonFinite,

    #[error("instant too far from element epoch")]
    TimeOutOfRange,
}

impl PropagationFault {
    /// The object has re-entered, as opposed to a numerical breakdown.
    pub fn is_decay(&self) -> bool {
        matches!(self, PropagationFault::Decayed { .. })
    }
}

impl From<KeplerError> for PropagationFault {
    fn from(err: KeplerError) -> Self {
        match err {
            KeplerError::NotConverged { iterations, .. } => {
                PropagationFault::KeplerNotConverged { iterations }
            }
        }
    }
}

/// Position at one instant, or the reason it is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PositionSample {
    /// ECI position (km).
    Valid([f64; 3]),
    Invalid(PropagationFault),
}

impl PositionSample {
    pub fn is_valid(&self) -> bool {
        matches!(self, PositionSample::Valid(_))
    }

    pub fn position(&self) -> Option<[f64; 3]> {
        match self {
            PositionSample::Valid(r) => Some(*r),
            PositionSample::Invalid(_) => None,
        }
    }

    pub fn fault(&self) -> Option<PropagationFault> {
        match self {
            PositionSample::Valid(_) => None,
            PositionSample::Invalid(fault) => Some(*fault),
        }
    }

    /// Euclidean distance to another sample when both are valid (km).
    pub fn distance_to(&self, other: &PositionSample) -> Option<f64> {
        let (a, b) = (self.position()?, other.position()?);
        Some(((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt())
    }
}

impl From<Result<StateVector, PropagationFault>> for PositionSample {
    fn from(result: Result<StateVector, PropagationFault>) -> Self {
        match result {
            Ok(state) => PositionSample::Valid(state.r),
            Err(fault) => PositionSample::Invalid(fault),
        }
    }
}

// ── Propagator interface ──

/// A state propagator bound to one element set.
pub trait Propagator: Send + Sync {
    /// Elements the propagator was built from.
    fn elements(&self) -> &ElementSet;

    /// Full state at an absolute instant.
    fn state_at(&self, at: DateTime<Utc>) -> Result<StateVector, PropagationFault>;

    /// Position at an absolute instant, with failures marked.
    fn position_at(&self, at: DateTime<Utc>) -> PositionSample {
        self.state_at(at).into()
    }
}

/// Which analytical model to build for each object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropagationModel {
    /// SGP4 near-Earth model, the standard for TLE data.
    #[default]
    Sgp4,
    /// Keplerian motion with J2 secular drift of node, perigee and mean anomaly.
    J2Secular,
    /// Pure Keplerian motion.
    TwoBody,
}

impl PropagationModel {
    /// Build a propagator of this model for one object.
    pub fn build(self, elements: &ElementSet) -> Box<dyn Propagator> {
        match self {
            PropagationModel::Sgp4 => Box::new(Sgp4::new(elements)),
            PropagationModel::J2Secular => Box::new(J2SecularPropagator::new(elements)),
            PropagationModel::TwoBody => Box::new(J2SecularPropagator::two_body(elements)),
        }
    }
}

/// Build one propagator per the chosen model.
pub fn build_propagator(model: PropagationModel, elements: &ElementSet) -> Box<dyn Propagator> {
    model.build(elements)
}

impl std::fmt::Display for PropagationModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PropagationModel::Sgp4 => "sgp4",
            PropagationModel::J2Secular => "j2-secular",
            PropagationModel::TwoBody => "two-body",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for PropagationModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sgp4" => Ok(PropagationModel::Sgp4),
            "j2-secular" | "j2" => Ok(PropagationModel::J2Secular),
            "two-body" | "kepler" => Ok(PropagationModel::TwoBody),
            other => Err(format!("unknown propagation model '{other}'")),
        }
    }
}

// ── Analytical J2 secular propagation ──

/// Mean elements drifted with J2 secular rates, converted through Kepler's
/// equation. No drag, no periodic terms.
#[derive(Debug, Clone)]
pub struct J2SecularPropagator {
    elements: ElementSet,
    mean: MeanElements,
    j2: bool,
    solver: KeplerSolver,
    decay_radius_km: f64,
}

impl J2SecularPropagator {
    pub fn new(elements: &ElementSet) -> Self {
        J2SecularPropagator {
            elements: elements.clone(),
            mean: elements.to_mean_elements(),
            j2: true,
            solver: KeplerSolver::default(),
            decay_radius_km: R_EARTH,
        }
    }

    /// Keplerian motion only.
    pub fn two_body(elements: &ElementSet) -> Self {
        J2SecularPropagator { j2: false, ..Self::new(elements) }
    }

    pub fn with_solver(mut self, solver: KeplerSolver) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_decay_radius(mut self, radius_km: f64) -> Self {
        self.decay_radius_km = radius_km;
        self
    }

    /// Mean elements `dt` seconds after epoch.
    pub fn mean_elements_at(&self, dt: f64) -> MeanElements {
        if self.j2 {
            self.mean.propagate(dt)
        } else {
            self.mean.propagate_two_body(dt)
        }
    }
}

impl Propagator for J2SecularPropagator {
    fn elements(&self) -> &ElementSet {
        &self.elements
    }

    fn state_at(&self, at: DateTime<Utc>) -> Result<StateVector, PropagationFault> {
        let dt = (at - self.elements.epoch())
            .num_microseconds()
            .ok_or(PropagationFault::TimeOutOfRange)? as f64
            / 1e6;
        let m = self.mean_elements_at(dt);
        let nu = self.solver.mean_to_true_anomaly(m.ma, m.e)?;
        let state = StateVector::from_keplerian(m.a, m.e, m.i, m.raan, m.aop, nu, at);

        if state.r.iter().chain(state.v.iter()).any(|c| !c.is_finite()) {
            return Err(PropagationFault::NonFinite);
        }
        let radius_km = state.r_mag();
        if radius_km < self.decay_radius_km {
            return Err(PropagationFault::Decayed { radius_km });
        }
        Ok(state)
    }
}
