//! # conjunction-screen
//!
//! Screens a set of space objects for close approaches over a future window.
//! Two-line element sets are parsed into validated element sets, propagated
//! with SGP4 (or a simpler analytical model), sampled on a shared time grid,
//! and compared pairwise to find each pair's closest approach, which is then
//! classified against a distance threshold.
//!
//! ```no_run
//! use conjunction_screen::{config::ScreeningConfig, report, screening, source::TleFileSource};
//!
//! let source = TleFileSource::open("catalog.tle").unwrap();
//! let config = ScreeningConfig::for_objects([25544, 48274]);
//! let now = chrono::Utc::now();
//! let result = screening::run(&config, &source, now).unwrap();
//! print!("{}", report::render(&result, now));
//! ```

pub mod constants;
pub mod elements;
pub mod tle;
pub mod kepler;
pub mod propagator;
pub mod sgp4;
pub mod trajectory;
pub mod conjunction;
pub mod risk;
pub mod config;
pub mod source;
pub mod screening;
pub mod report;

#[cfg(feature = "python")]
mod pybridge;

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn conjunction_screen(m: &Bound<'_, PyModule>) -> PyResult<()> {
    pybridge::register(m)?;
    Ok(())
}
