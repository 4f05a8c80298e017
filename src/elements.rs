//! Orbital element representations.
//!
//! [`ElementSet`] is the validated, immutable product of parsing a TLE and the
//! only input a propagator accepts. [`MeanElements`] carries classical mean
//! elements with J2 secular rates for the analytical secular model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::*;

/// Element values that violate the orbital invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ElementError {
    #[error("eccentricity {0} outside [0, 1)")]
    Eccentricity(f64),

    #[error("mean motion {0} rad/min must be positive")]
    MeanMotion(f64),

    #[error("field '{0}' is not a finite number")]
    NonFinite(&'static str),
}

/// Plain element values, as read from a TLE or supplied by a caller.
///
/// Angles in radians, mean motion in rad/min, B* in 1/earth radii.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementFields {
    pub catalog_number: u32,
    pub name: Option<String>,
    pub intl_designator: String,
    pub epoch: DateTime<Utc>,
    /// First derivative of mean motion / 2 (rad/min²).
    pub mean_motion_dot: f64,
    /// Second derivative of mean motion / 6 (rad/min³).
    pub mean_motion_ddot: f64,
    pub bstar: f64,
    pub inclination: f64,
    pub raan: f64,
    pub eccentricity: f64,
    pub arg_perigee: f64,
    pub mean_anomaly: f64,
    pub mean_motion: f64,
    pub rev_number: u32,
}

/// A validated orbital element set.
///
/// Invariants: `0 <= eccentricity < 1`, `mean_motion > 0`, every value finite.
/// The fields are only reachable through accessors so the invariants hold for
/// the lifetime of the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ElementFields", into = "ElementFields")]
pub struct ElementSet {
    catalog_number: u32,
    name: Option<String>,
    intl_designator: String,
    epoch: DateTime<Utc>,
    mean_motion_dot: f64,
    mean_motion_ddot: f64,
    bstar: f64,
    inclination: f64,
    raan: f64,
    eccentricity: f64,
    arg_perigee: f64,
    mean_anomaly: f64,
    mean_motion: f64,
    rev_number: u32,
}

impl ElementSet {
    /// Validate raw element values.
    pub fn new(fields: ElementFields) -> Result<Self, ElementError> {
        let finite = [
            ("mean_motion_dot", fields.mean_motion_dot),
            ("mean_motion_ddot", fields.mean_motion_ddot),
            ("bstar", fields.bstar),
            ("inclination", fields.inclination),
            ("raan", fields.raan),
            ("eccentricity", fields.eccentricity),
            ("arg_perigee", fields.arg_perigee),
            ("mean_anomaly", fields.mean_anomaly),
            ("mean_motion", fields.mean_motion),
        ];
        if let Some((name, _)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ElementError::NonFinite(*name));
        }
        if !(0.0..1.0).contains(&fields.eccentricity) {
            return Err(ElementError::Eccentricity(fields.eccentricity));
        }
        if fields.mean_motion <= 0.0 {
            return Err(ElementError::MeanMotion(fields.mean_motion));
        }

        Ok(ElementSet {
            catalog_number: fields.catalog_number,
            name: fields.name,
            intl_designator: fields.intl_designator,
            epoch: fields.epoch,
            mean_motion_dot: fields.mean_motion_dot,
            mean_motion_ddot: fields.mean_motion_ddot,
            bstar: fields.bstar,
            inclination: fields.inclination,
            raan: fields.raan,
            eccentricity: fields.eccentricity,
            arg_perigee: fields.arg_perigee,
            mean_anomaly: fields.mean_anomaly,
            mean_motion: fields.mean_motion,
            rev_number: fields.rev_number,
        })
    }

    pub fn catalog_number(&self) -> u32 {
        self.catalog_number
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name for display, falling back to the catalog number.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("NORAD {}", self.catalog_number),
        }
    }

    pub fn intl_designator(&self) -> &str {
        &self.intl_designator
    }

    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    pub fn mean_motion_dot(&self) -> f64 {
        self.mean_motion_dot
    }

    pub fn mean_motion_ddot(&self) -> f64 {
        self.mean_motion_ddot
    }

    pub fn bstar(&self) -> f64 {
        self.bstar
    }

    /// Inclination (rad).
    pub fn inclination(&self) -> f64 {
        self.inclination
    }

    /// Right ascension of ascending node (rad).
    pub fn raan(&self) -> f64 {
        self.raan
    }

    pub fn eccentricity(&self) -> f64 {
        self.eccentricity
    }

    /// Argument of perigee (rad).
    pub fn arg_perigee(&self) -> f64 {
        self.arg_perigee
    }

    /// Mean anomaly (rad).
    pub fn mean_anomaly(&self) -> f64 {
        self.mean_anomaly
    }

    /// Kozai mean motion (rad/min).
    pub fn mean_motion(&self) -> f64 {
        self.mean_motion
    }

    pub fn rev_number(&self) -> u32 {
        self.rev_number
    }

    /// Mean motion in revolutions per day.
    pub fn mean_motion_rev_day(&self) -> f64 {
        self.mean_motion * MINUTES_PER_DAY / TAU
    }

    /// Orbital period (seconds).
    pub fn period(&self) -> f64 {
        TAU / self.mean_motion * 60.0
    }

    /// Semi-major axis derived from mean motion (km).
    ///
    /// Uses Kepler's third law: a = (μ / n²)^(1/3)
    pub fn semi_major_axis(&self) -> f64 {
        let n_rad_s = self.mean_motion / 60.0;
        (MU_EARTH / n_rad_s.powi(2)).powf(1.0 / 3.0)
    }

    /// Altitude above Earth's surface (km), assuming circular orbit.
    pub fn altitude(&self) -> f64 {
        self.semi_major_axis() - R_EARTH
    }

    /// Period of 225 minutes or more puts an object in the SGP4 deep-space regime.
    pub fn is_deep_space(&self) -> bool {
        self.period() >= 225.0 * 60.0
    }

    /// Mean elements at epoch for the secular model.
    pub fn to_mean_elements(&self) -> MeanElements {
        MeanElements {
            a: self.semi_major_axis(),
            e: self.eccentricity,
            i: self.inclination,
            raan: self.raan,
            aop: self.arg_perigee,
            ma: self.mean_anomaly,
        }
    }
}

impl TryFrom<ElementFields> for ElementSet {
    type Error = ElementError;

    fn try_from(fields: ElementFields) -> Result<Self, Self::Error> {
        ElementSet::new(fields)
    }
}

impl From<ElementSet> for ElementFields {
    fn from(set: ElementSet) -> Self {
        ElementFields {
            catalog_number: set.catalog_number,
            name: set.name,
            intl_designator: set.intl_designator,
            epoch: set.epoch,
            mean_motion_dot: set.mean_motion_dot,
            mean_motion_ddot: set.mean_motion_ddot,
            bstar: set.bstar,
            inclination: set.inclination,
            raan: set.raan,
            eccentricity: set.eccentricity,
            arg_perigee: set.arg_perigee,
            mean_anomaly: set.mean_anomaly,
            mean_motion: set.mean_motion,
            rev_number: set.rev_number,
        }
    }
}

impl std::fmt::Display for ElementSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (NORAD {}) - {:.1} km, {:.1}° inc, {:.4} ecc, {:.2} rev/day",
            self.name.as_deref().unwrap_or("UNKNOWN"),
            self.catalog_number,
            self.altitude(),
            self.inclination * RAD2DEG,
            self.eccentricity,
            self.mean_motion_rev_day(),
        )
    }
}

/// Mean orbital elements with J2 secular drift rates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MeanElements {
    /// Mean semi-major axis (km)
    pub a: f64,
    /// Mean eccentricity
    pub e: f64,
    /// Mean inclination (rad)
    pub i: f64,
    /// Mean RAAN (rad)
    pub raan: f64,
    /// Mean argument of perigee (rad)
    pub aop: f64,
    /// Mean anomaly (rad)
    pub ma: f64,
}

impl MeanElements {
    /// Unperturbed mean motion (rad/s).
    pub fn mean_motion(&self) -> f64 {
        (MU_EARTH / self.a.powi(3)).sqrt()
    }

    /// J2 secular drift rate of RAAN (rad/s).
    ///
    /// dΩ/dt = -3/2 * n * J2 * (R_E/p)² * cos(i)
    pub fn raan_rate(&self) -> f64 {
        let p = self.a * (1.0 - self.e.powi(2));
        -1.5 * self.mean_motion() * J2 * (R_EARTH / p).powi(2) * self.i.cos()
    }

    /// J2 secular drift rate of argument of perigee (rad/s).
    ///
    /// dω/dt = 3/2 * n * J2 * (R_E/p)² * (2 - 5/2 sin²i)
    pub fn aop_rate(&self) -> f64 {
        let p = self.a * (1.0 - self.e.powi(2));
        1.5 * self.mean_motion() * J2 * (R_EARTH / p).powi(2) * (2.0 - 2.5 * self.i.sin().powi(2))
    }

    /// J2-perturbed mean motion (rad/s).
    ///
    /// n_J2 = n * [1 + 3/2 * J2 * (R_E/a)² * (1 - 3/2 sin²i) / (1-e²)^(3/2)]
    pub fn mean_motion_j2(&self) -> f64 {
        let eta = (1.0 - self.e.powi(2)).sqrt();
        let ratio = R_EARTH / self.a;
        self.mean_motion()
            * (1.0 + 1.5 * J2 * ratio.powi(2) * (1.0 - 1.5 * self.i.sin().powi(2)) / eta.powi(3))
    }

    /// Propagate forward by dt seconds with J2 secular rates.
    pub fn propagate(&self, dt: f64) -> MeanElements {
        MeanElements {
            a: self.a,
            e: self.e,
            i: self.i,
            raan: normalize_angle(self.raan + self.raan_rate() * dt),
            aop: normalize_angle(self.aop + self.aop_rate() * dt),
            ma: normalize_angle(self.ma + self.mean_motion_j2() * dt),
        }
    }

    /// Propagate forward by dt seconds with Keplerian motion only.
    pub fn propagate_two_body(&self, dt: f64) -> MeanElements {
        MeanElements {
            ma: normalize_angle(self.ma + self.mean_motion() * dt),
            ..*self
        }
    }
}

/// Normalize angle to [0, 2π).
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle % TAU;
    if a < 0.0 { a + TAU } else { a }
}
