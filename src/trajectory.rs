//! Fixed-step sampling of propagators into position trajectories.
//!
//! A [`TimeGrid`] is shared by every trajectory of a screening run. Index `i`
//! of a trajectory always refers to `start + i * step`, including indices where
//! the propagator failed, so two trajectories on the same grid can be compared
//! index by index.

use chrono::{DateTime, TimeDelta, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::propagator::{PositionSample, Propagator};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SampleError {
    #[error("step must be positive, got {0}")]
    NonPositiveStep(TimeDelta),

    #[error("window must be positive, got {0}")]
    NonPositiveWindow(TimeDelta),

    #[error("window {window} is shorter than step {step}")]
    WindowShorterThanStep { window: TimeDelta, step: TimeDelta },

    #[error("grid of {0} samples exceeds the limit of {max}", max = MAX_SAMPLES)]
    TooManySamples(i128),

    #[error("{count} samples of {step} from {start} run past the representable time range")]
    OutOfRange {
        start: DateTime<Utc>,
        step: TimeDelta,
        count: usize,
    },
}

/// Largest number of samples a single grid may hold.
pub const MAX_SAMPLES: usize = 10_000_000;

/// Evenly spaced sampling instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGrid")]
pub struct TimeGrid {
    start: DateTime<Utc>,
    #[serde(rename = "step_seconds", with = "seconds")]
    step: TimeDelta,
    count: usize,
}

fn total_nanos(d: TimeDelta) -> i128 {
    d.num_seconds() as i128 * 1_000_000_000 + d.subsec_nanos() as i128
}

impl TimeGrid {
    /// Grid covering `window` from `start`: `floor(window / step)` samples.
    pub fn new(start: DateTime<Utc>, window: TimeDelta, step: TimeDelta) -> Result<Self, SampleError> {
        if step <= TimeDelta::zero() {
            return Err(SampleError::NonPositiveStep(step));
        }
        if window <= TimeDelta::zero() {
            return Err(SampleError::NonPositiveWindow(window));
        }
        if window < step {
            return Err(SampleError::WindowShorterThanStep { window, step });
        }

        let count = total_nanos(window) / total_nanos(step);
        if count > MAX_SAMPLES as i128 {
            return Err(SampleError::TooManySamples(count));
        }
        Self::checked(start, step, count as usize)
    }

    /// Grid of `count` samples, provided every instant is a valid date.
    fn checked(start: DateTime<Utc>, step: TimeDelta, count: usize) -> Result<Self, SampleError> {
        if count > MAX_SAMPLES {
            return Err(SampleError::TooManySamples(count as i128));
        }
        let out_of_range = || SampleError::OutOfRange { start, step, count };
        let last = i32::try_from(count.saturating_sub(1)).map_err(|_| out_of_range())?;
        step.checked_mul(last)
            .and_then(|offset| start.checked_add_signed(offset))
            .ok_or_else(out_of_range)?;
        Ok(TimeGrid { start, step, count })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn step(&self) -> TimeDelta {
        self.step
    }

    /// Number of samples.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Instant of sample `index`.
    pub fn instant(&self, index: usize) -> DateTime<Utc> {
        // the last instant is checked at construction
        self.start + self.step * index as i32
    }

    /// Every instant of the grid, in order.
    pub fn instants(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        (0..self.count).map(|i| self.instant(i))
    }

    /// Instant of the last sample.
    pub fn end(&self) -> DateTime<Utc> {
        self.instant(self.count.saturating_sub(1))
    }
}

/// Positions of one object over a [`TimeGrid`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub object_id: u32,
    pub name: String,
    pub grid: TimeGrid,
    /// One entry per grid index; failed instants are kept as `Invalid`.
    pub samples: Vec<PositionSample>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn valid_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_valid()).count()
    }

    /// Index of the first invalid sample caused by decay, if any.
    pub fn decay_index(&self) -> Option<usize> {
        self.samples
            .iter()
            .position(|s| s.fault().is_some_and(|f| f.is_decay()))
    }

    /// (instant, sample) pairs in grid order.
    pub fn iter(&self) -> impl Iterator<Item = (DateTime<Utc>, &PositionSample)> + '_ {
        self.samples
            .iter()
            .enumerate()
            .map(|(i, s)| (self.grid.instant(i), s))
    }
}

/// Sample a propagator from `start` over `window` every `step`.
pub fn sample<P: Propagator + ?Sized>(
    propagator: &P,
    start: DateTime<Utc>,
    window: TimeDelta,
    step: TimeDelta,
) -> Result<Trajectory, SampleError> {
    let grid = TimeGrid::new(start, window, step)?;
    Ok(sample_grid(propagator, &grid))
}

/// Sample a propagator on an existing grid.
pub fn sample_grid<P: Propagator + ?Sized>(propagator: &P, grid: &TimeGrid) -> Trajectory {
    let samples = grid.instants().map(|t| propagator.position_at(t)).collect();
    trajectory(propagator, grid, samples)
}

/// Like [`sample_grid`], with grid indices evaluated on the rayon pool.
pub fn sample_par<P: Propagator + ?Sized>(propagator: &P, grid: &TimeGrid) -> Trajectory {
    let samples = (0..grid.count())
        .into_par_iter()
        .map(|i| propagator.position_at(grid.instant(i)))
        .collect();
    trajectory(propagator, grid, samples)
}

/// Sample many propagators on one grid, one rayon task per object.
/// Output order follows input order.
pub fn sample_all(propagators: &[Box<dyn Propagator>], grid: &TimeGrid) -> Vec<Trajectory> {
    propagators
        .par_iter()
        .map(|p| sample_grid(p.as_ref(), grid))
        .collect()
}

fn trajectory<P: Propagator + ?Sized>(
    propagator: &P,
    grid: &TimeGrid,
    samples: Vec<PositionSample>,
) -> Trajectory {
    let elements = propagator.elements();
    let traj = Trajectory {
        object_id: elements.catalog_number(),
        name: elements.display_name(),
        grid: *grid,
        samples,
    };
    log::debug!(
        "sampled NORAD {}: {}/{} valid",
        traj.object_id,
        traj.valid_count(),
        traj.len()
    );
    traj
}

/// Deserialized grids go through the same range checks as [`TimeGrid::new`].
#[derive(Deserialize)]
struct RawGrid {
    start: DateTime<Utc>,
    #[serde(rename = "step_seconds", with = "seconds")]
    step: TimeDelta,
    count: usize,
}

impl TryFrom<RawGrid> for TimeGrid {
    type Error = SampleError;

    fn try_from(raw: RawGrid) -> Result<Self, Self::Error> {
        if raw.step <= TimeDelta::zero() {
            return Err(SampleError::NonPositiveStep(raw.step));
        }
        TimeGrid::checked(raw.start, raw.step, raw.count)
    }
}

/// TimeDelta as floating-point seconds.
mod seconds {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &TimeDelta, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(super::total_nanos(*d) as f64 / 1e9)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<TimeDelta, D::Error> {
        let secs = f64::deserialize(d)?;
        if !secs.is_finite() {
            return Err(serde::de::Error::custom("step must be finite"));
        }
        Ok(TimeDelta::nanoseconds((secs * 1e9).round() as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::elements::{ElementFields, ElementSet};
    use crate::propagator::J2SecularPropagator;
    use chrono::TimeZone;

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
    }

    fn leo() -> ElementSet {
        ElementSet::new(ElementFields {
            catalog_number: 42,
            name: Some("TEST-LEO".into()),
            intl_designator: String::new(),
            epoch: epoch(),
            mean_motion_dot: 0.0,
            mean_motion_ddot: 0.0,
            bstar: 0.0,
            inclination: 53.0 * DEG2RAD,
            raan: 0.0,
            eccentricity: 0.001,
            arg_perigee: 0.0,
            mean_anomaly: 0.0,
            mean_motion: 15.0 * TAU / MINUTES_PER_DAY,
            rev_number: 0,
        })
        .unwrap()
    }

    #[test]
    fn test_count_is_floor_of_window_over_step() {
        let grid = TimeGrid::new(epoch(), TimeDelta::hours(6), TimeDelta::seconds(60)).unwrap();
        assert_eq!(grid.count(), 360);

        let grid = TimeGrid::new(epoch(), TimeDelta::seconds(100), TimeDelta::seconds(30)).unwrap();
        assert_eq!(grid.count(), 3);
        assert_eq!(grid.instant(2), epoch() + TimeDelta::seconds(60));
        assert_eq!(grid.end(), grid.instant(2));
    }

    #[test]
    fn test_window_equal_to_step_gives_one_sample() {
        let grid = TimeGrid::new(epoch(), TimeDelta::seconds(60), TimeDelta::seconds(60)).unwrap();
        assert_eq!(grid.count(), 1);
        assert_eq!(grid.instant(0), epoch());
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let p = J2SecularPropagator::new(&leo());
        assert_eq!(
            sample(&p, epoch(), TimeDelta::hours(1), TimeDelta::zero()).unwrap_err(),
            SampleError::NonPositiveStep(TimeDelta::zero())
        );
        assert!(matches!(
            sample(&p, epoch(), TimeDelta::hours(1), TimeDelta::seconds(-5)),
            Err(SampleError::NonPositiveStep(_))
        ));
        assert!(matches!(
            sample(&p, epoch(), TimeDelta::zero(), TimeDelta::seconds(60)),
            Err(SampleError::NonPositiveWindow(_))
        ));
        assert!(matches!(
            sample(&p, epoch(), TimeDelta::seconds(30), TimeDelta::seconds(60)),
            Err(SampleError::WindowShorterThanStep { .. })
        ));
    }

    #[test]
    fn test_grid_past_the_calendar_is_an_error() {
        let p = J2SecularPropagator::new(&leo());
        assert!(matches!(
            sample(&p, epoch(), TimeDelta::MAX, TimeDelta::MAX / 2),
            Err(SampleError::OutOfRange { count: 2, .. })
        ));
        // ~3.2 million years per step
        let step = TimeDelta::seconds(100_000_000_000_000);
        assert!(matches!(
            TimeGrid::new(epoch(), step * 3, step),
            Err(SampleError::OutOfRange { count: 3, .. })
        ));
    }

    #[test]
    fn test_sample_count_is_capped() {
        let window = TimeDelta::seconds(MAX_SAMPLES as i64 + 1);
        assert_eq!(
            TimeGrid::new(epoch(), window, TimeDelta::seconds(1)).unwrap_err(),
            SampleError::TooManySamples(MAX_SAMPLES as i128 + 1)
        );
        let grid = TimeGrid::new(epoch(), window - TimeDelta::seconds(1), TimeDelta::seconds(1)).unwrap();
        assert_eq!(grid.count(), MAX_SAMPLES);
    }

    #[test]
    fn test_deserialized_grid_is_range_checked() {
        let value = serde_json::json!({
            "start": "2025-03-01T00:00:00Z",
            "step_seconds": 1.0e9,
            "count": 20_000,
        });
        assert!(serde_json::from_value::<TimeGrid>(value).is_err());
    }

    #[test]
    fn test_sample_names_and_positions() {
        let p = J2SecularPropagator::new(&leo());
        let traj = sample(&p, epoch(), TimeDelta::minutes(90), TimeDelta::minutes(1)).unwrap();
        assert_eq!(traj.object_id, 42);
        assert_eq!(traj.name, "TEST-LEO");
        assert_eq!(traj.len(), 90);
        assert_eq!(traj.valid_count(), 90);
        assert_eq!(traj.samples[10], p.position_at(epoch() + TimeDelta::minutes(10)));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let p = J2SecularPropagator::new(&leo());
        let grid = TimeGrid::new(epoch(), TimeDelta::hours(3), TimeDelta::seconds(45)).unwrap();
        assert_eq!(sample_grid(&p, &grid), sample_par(&p, &grid));
    }

    #[test]
    fn test_invalid_samples_keep_their_index() {
        let p = J2SecularPropagator::new(&leo()).with_decay_radius(R_EARTH + 10_000.0);
        let grid = TimeGrid::new(epoch(), TimeDelta::minutes(10), TimeDelta::minutes(1)).unwrap();
        let traj = sample_grid(&p, &grid);
        assert_eq!(traj.len(), 10);
        assert_eq!(traj.valid_count(), 0);
        assert_eq!(traj.decay_index(), Some(0));
    }

    #[test]
    fn test_sample_all_preserves_order() {
        let mut second = ElementFields::from(leo());
        second.catalog_number = 7;
        let props: Vec<Box<dyn Propagator>> = vec![
            Box::new(J2SecularPropagator::new(&leo())),
            Box::new(J2SecularPropagator::new(&ElementSet::new(second).unwrap())),
        ];
        let grid = TimeGrid::new(epoch(), TimeDelta::hours(1), TimeDelta::minutes(5)).unwrap();
        let ids: Vec<u32> = sample_all(&props, &grid).iter().map(|t| t.object_id).collect();
        assert_eq!(ids, vec![42, 7]);
    }

    #[test]
    fn test_grid_serializes_step_in_seconds() {
        let grid = TimeGrid::new(epoch(), TimeDelta::hours(1), TimeDelta::seconds(90)).unwrap();
        let value = serde_json::to_value(grid).unwrap();
        assert_eq!(value["step_seconds"], serde_json::json!(90.0));
        assert_eq!(value["count"], serde_json::json!(40));
        let back: TimeGrid = serde_json::from_value(value).unwrap();
        assert_eq!(back, grid);
    }
}
