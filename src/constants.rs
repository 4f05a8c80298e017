//! Physical and astrodynamic constants.
//!
//! SGP4 is defined against the WGS-72 geopotential; element sets are fitted
//! with these values, so the propagator must use them rather than WGS-84.

/// Earth gravitational parameter (km³/s²) (WGS84)
pub const MU_EARTH: f64 = 398600.4418;

/// Earth equatorial radius (km) (WGS84)
pub const R_EARTH: f64 = 6378.137;

/// Earth J2 zonal harmonic (WGS84)/EGM96
pub const J2: f64 = 1.08262668e-3;

/// Mean Earth radius (km), used for display and reporting.
pub const R_EARTH_MEAN: f64 = 6371.0;

/// WGS-72 constants used by SGP4.
pub mod wgs72 {
    /// Equatorial radius (km).
    pub const RADIUS: f64 = 6378.135;
    /// sqrt(GM) in earth radii^1.5 per minute.
    pub const XKE: f64 = 0.074_366_916_133_173_4;
    pub const J2: f64 = 0.001_082_616;
    pub const J3: f64 = -0.000_002_538_81;
    pub const J4: f64 = -0.000_001_655_97;
    pub const J3OJ2: f64 = J3 / J2;
}

/// Seconds per solar day
pub const SOLAR_DAY: f64 = 86400.0;

/// Minutes per solar day
pub const MINUTES_PER_DAY: f64 = 1440.0;

/// Two pi
pub const TAU: f64 = std::f64::consts::TAU;

/// Degrees to radians
pub const DEG2RAD: f64 = std::f64::consts::PI / 180.0;

/// Radians to degrees
pub const RAD2DEG: f64 = 180.0 / std::f64::consts::PI;
