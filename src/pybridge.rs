//! Python bindings via PyO3.
//!
//! Instants cross the boundary as RFC 3339 strings.
use chrono::{DateTime, TimeDelta, Utc};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::config::ScreeningConfig;
use crate::constants;
use crate::elements::ElementSet;
use crate::propagator::{PositionSample, PropagationModel, Propagator};
use crate::source::TleFileSource;
use crate::{report, risk, screening, tle, trajectory};

fn value_error(e: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn parse_instant(s: &str) -> PyResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(value_error)
}

fn seconds(s: f64) -> TimeDelta {
    TimeDelta::milliseconds((s * 1000.0).round() as i64)
}

fn sample_to_py(sample: &PositionSample) -> Option<Vec<f64>> {
    sample.position().map(|r| r.to_vec())
}

// ElementSet
#[pyclass(name = "ElementSet")]
#[derive(Clone)]
pub struct PyElementSet {
    inner: ElementSet,
}

#[pymethods]
impl PyElementSet {
    /// Parse a 2- or 3-line record.
    #[staticmethod]
    fn parse(text: &str) -> PyResult<Self> {
        tle::parse(text).map(|e| PyElementSet { inner: e }).map_err(value_error)
    }

    /// Parse a multi-record text, skipping bad records.
    #[staticmethod]
    fn parse_batch(text: &str) -> PyResult<Vec<PyElementSet>> {
        let results = tle::parse_batch(text).map_err(value_error)?;
        Ok(results
            .into_iter()
            .filter_map(Result::ok)
            .map(|e| PyElementSet { inner: e })
            .collect())
    }

    fn period(&self) -> f64 { self.inner.period() }
    fn altitude(&self) -> f64 { self.inner.altitude() }
    fn is_deep_space(&self) -> bool { self.inner.is_deep_space() }

    #[getter] fn catalog_number(&self) -> u32 { self.inner.catalog_number() }
    #[getter] fn name(&self) -> Option<String> { self.inner.name().map(str::to_string) }
    #[getter] fn epoch(&self) -> String { self.inner.epoch().to_rfc3339() }
    #[getter] fn inclination_deg(&self) -> f64 { self.inner.inclination() * constants::RAD2DEG }
    #[getter] fn raan_deg(&self) -> f64 { self.inner.raan() * constants::RAD2DEG }
    #[getter] fn eccentricity(&self) -> f64 { self.inner.eccentricity() }
    #[getter] fn arg_perigee_deg(&self) -> f64 { self.inner.arg_perigee() * constants::RAD2DEG }
    #[getter] fn mean_anomaly_deg(&self) -> f64 { self.inner.mean_anomaly() * constants::RAD2DEG }
    #[getter] fn mean_motion(&self) -> f64 { self.inner.mean_motion_rev_day() }
    #[getter] fn bstar(&self) -> f64 { self.inner.bstar() }

    fn __repr__(&self) -> String {
        format!("ElementSet({})", self.inner)
    }
}

// Propagator
#[pyclass(name = "Propagator")]
pub struct PyPropagator {
    inner: Box<dyn Propagator>,
}

#[pymethods]
impl PyPropagator {
    /// Build a propagator; `model` is "sgp4", "j2-secular" or "two-body".
    #[new]
    #[pyo3(signature = (elements, model = "sgp4"))]
    fn new(elements: &PyElementSet, model: &str) -> PyResult<Self> {
        let model: PropagationModel = model.parse().map_err(PyValueError::new_err)?;
        Ok(PyPropagator { inner: model.build(&elements.inner) })
    }

    /// Position [x, y, z] (km) at an instant, or None if propagation failed there.
    fn position_at(&self, at: &str) -> PyResult<Option<Vec<f64>>> {
        Ok(sample_to_py(&self.inner.position_at(parse_instant(at)?)))
    }

    /// State [x, y, z, vx, vy, vz] (km, km/s); raises on propagation failure.
    fn state_at(&self, at: &str) -> PyResult<Vec<f64>> {
        let sv = self.inner.state_at(parse_instant(at)?).map_err(value_error)?;
        Ok(vec![sv.r[0], sv.r[1], sv.r[2], sv.v[0], sv.v[1], sv.v[2]])
    }

    /// Positions over a window; failed instants are None.
    fn sample(&self, start: &str, window_s: f64, step_s: f64) -> PyResult<Vec<Option<Vec<f64>>>> {
        let traj = trajectory::sample(self.inner.as_ref(), parse_instant(start)?, seconds(window_s), seconds(step_s))
            .map_err(value_error)?;
        Ok(traj.samples.iter().map(sample_to_py).collect())
    }
}

// Free functions
#[pyfunction]
fn classify(min_distance_km: f64, threshold_km: f64) -> String {
    risk::classify(min_distance_km, threshold_km).to_string()
}

#[pyfunction]
fn countdown(now: &str, event: &str) -> PyResult<String> {
    Ok(report::countdown(parse_instant(now)?, parse_instant(event)?))
}

/// Screen the listed objects of a TLE catalog text. Returns the report as JSON
/// plus a summary dict.
#[pyfunction]
#[pyo3(signature = (catalog, object_ids, threshold_km = 50.0, window_hours = 6.0, step_seconds = 60.0, now = None))]
fn screen(
    py: Python<'_>,
    catalog: &str,
    object_ids: Vec<u32>,
    threshold_km: f64,
    window_hours: f64,
    step_seconds: f64,
    now: Option<&str>,
) -> PyResult<(String, Py<PyDict>)> {
    let config = ScreeningConfig {
        threshold_km,
        window_hours,
        step_seconds,
        ..ScreeningConfig::for_objects(object_ids)
    };
    let now = match now {
        Some(s) => parse_instant(s)?,
        None => Utc::now(),
    };
    let source = TleFileSource::from_text(catalog);
    let result = screening::run(&config, &source, now).map_err(value_error)?;

    let summary = report::Summary::of(&result);
    let dict = PyDict::new(py);
    dict.set_item("pairs", summary.pairs)?;
    dict.set_item("alerts", summary.alerts)?;
    dict.set_item("safe", summary.safe)?;
    dict.set_item("indeterminate", summary.indeterminate)?;
    dict.set_item("errors", summary.errors)?;
    dict.set_item("excluded", summary.excluded)?;

    let json = report::to_json(&result).map_err(value_error)?;
    Ok((json, dict.unbind()))
}

// Module registration
pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyElementSet>()?;
    m.add_class::<PyPropagator>()?;
    m.add_function(wrap_pyfunction!(classify, m)?)?;
    m.add_function(wrap_pyfunction!(countdown, m)?)?;
    m.add_function(wrap_pyfunction!(screen, m)?)?;
    Ok(())
}
