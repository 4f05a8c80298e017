//! Pairwise closest-approach analysis over sampled trajectories.
//!
//! Distances are only taken at grid indices where both objects have a valid
//! sample. Every unordered pair yields its own [`PairOutcome`]; one failing
//! pair never hides the others.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::risk::{classify, RiskCategory};
use crate::trajectory::Trajectory;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisError {
    #[error("trajectories of {a} and {b} are on different time grids")]
    GridMismatch { a: u32, b: u32 },

    #[error("{a} and {b} have no instant where both positions are valid")]
    NoValidOverlap { a: u32, b: u32 },
}

/// Closest approach of one pair within the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConjunctionEvent {
    pub object_a: u32,
    pub name_a: String,
    pub object_b: u32,
    pub name_b: String,
    /// Minimum separation (km).
    pub min_distance_km: f64,
    /// Grid index of the minimum (earliest on ties).
    pub index: usize,
    pub instant: DateTime<Utc>,
    pub risk: RiskCategory,
}

/// Analysis result for one unordered pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairOutcome {
    pub object_a: u32,
    pub object_b: u32,
    pub result: Result<ConjunctionEvent, AnalysisError>,
}

/// Separation at every grid index, `None` where either sample is invalid.
pub fn separation_series(a: &Trajectory, b: &Trajectory) -> Result<Vec<Option<f64>>, AnalysisError> {
    check_grids(a, b)?;
    Ok(a.samples
        .iter()
        .zip(&b.samples)
        .map(|(sa, sb)| sa.distance_to(sb))
        .collect())
}

/// Minimum separation of two trajectories on the same grid.
pub fn closest_approach(
    a: &Trajectory,
    b: &Trajectory,
    threshold_km: f64,
) -> Result<ConjunctionEvent, AnalysisError> {
    let series = separation_series(a, b)?;

    let mut best: Option<(usize, f64)> = None;
    for (index, distance) in series.into_iter().enumerate() {
        let Some(d) = distance else { continue };
        match best {
            Some((_, min)) if d >= min => {}
            _ => best = Some((index, d)),
        }
    }

    let (index, min_distance_km) = best.ok_or(AnalysisError::NoValidOverlap {
        a: a.object_id,
        b: b.object_id,
    })?;

    Ok(ConjunctionEvent {
        object_a: a.object_id,
        name_a: a.name.clone(),
        object_b: b.object_id,
        name_b: b.name.clone(),
        min_distance_km,
        index,
        instant: a.grid.instant(index),
        risk: classify(min_distance_km, threshold_km),
    })
}

/// Closest approach for all N·(N−1)/2 unordered pairs.
///
/// Pairs are evaluated in parallel; output is ordered (0,1), (0,2) … (1,2) …
/// following the input order.
pub fn analyze_all(trajectories: &[Trajectory], threshold_km: f64) -> Vec<PairOutcome> {
    let n = trajectories.len();
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
        .collect();

    pairs
        .par_iter()
        .map(|&(i, j)| {
            let (a, b) = (&trajectories[i], &trajectories[j]);
            let result = closest_approach(a, b, threshold_km);
            if let Err(e) = &result {
                log::warn!("pair {}-{}: {e}", a.object_id, b.object_id);
            }
            PairOutcome {
                object_a: a.object_id,
                object_b: b.object_id,
                result,
            }
        })
        .collect()
}

fn check_grids(a: &Trajectory, b: &Trajectory) -> Result<(), AnalysisError> {
    if a.grid != b.grid || a.samples.len() != b.samples.len() {
        return Err(AnalysisError::GridMismatch {
            a: a.object_id,
            b: b.object_id,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagator::{PositionSample, PropagationFault};
    use crate::trajectory::TimeGrid;
    use chrono::{TimeDelta, TimeZone};

    fn grid(count: i64) -> TimeGrid {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        TimeGrid::new(start, TimeDelta::seconds(60 * count), TimeDelta::seconds(60)).unwrap()
    }

    fn traj(id: u32, samples: Vec<PositionSample>) -> Trajectory {
        Trajectory {
            object_id: id,
            name: format!("OBJ-{id}"),
            grid: grid(samples.len() as i64),
            samples,
        }
    }

    fn line(xs: &[f64]) -> Vec<PositionSample> {
        xs.iter().map(|&x| PositionSample::Valid([x, 0.0, 0.0])).collect()
    }

    #[test]
    fn test_identical_trajectories_meet_at_zero() {
        let a = traj(1, line(&[7000.0, 7001.0, 7002.0]));
        let b = traj(2, line(&[7000.0, 7001.0, 7002.0]));
        let event = closest_approach(&a, &b, 50.0).unwrap();
        assert_eq!(event.min_distance_km, 0.0);
        assert_eq!(event.index, 0);
        assert_eq!(event.risk, RiskCategory::Alert);
    }

    #[test]
    fn test_minimum_and_instant() {
        let a = traj(1, line(&[0.0, 0.0, 0.0, 0.0]));
        let b = traj(2, line(&[300.0, 120.0, 80.0, 200.0]));
        let event = closest_approach(&a, &b, 50.0).unwrap();
        assert_eq!(event.index, 2);
        assert_eq!(event.min_distance_km, 80.0);
        assert_eq!(event.instant, a.grid.start() + TimeDelta::minutes(2));
        assert_eq!(event.risk, RiskCategory::Safe);
        assert_eq!((event.name_a.as_str(), event.name_b.as_str()), ("OBJ-1", "OBJ-2"));
    }

    #[test]
    fn test_ties_resolve_to_earliest_index() {
        let a = traj(1, line(&[0.0; 5]));
        let b = traj(2, line(&[30.0, 10.0, 20.0, 10.0, 10.0]));
        assert_eq!(closest_approach(&a, &b, 50.0).unwrap().index, 1);
    }

    #[test]
    fn test_invalid_indices_are_skipped() {
        let mut b = line(&[1.0, 50.0, 60.0]);
        b[0] = PositionSample::Invalid(PropagationFault::KeplerNotConverged { iterations: 25 });
        let event = closest_approach(&traj(1, line(&[0.0; 3])), &traj(2, b), 10.0).unwrap();
        assert_eq!(event.index, 1);
        assert_eq!(event.risk, RiskCategory::Safe);
    }

    #[test]
    fn test_no_valid_overlap() {
        let decayed = PositionSample::Invalid(PropagationFault::Decayed { radius_km: 6000.0 });
        let a = traj(1, vec![decayed, PositionSample::Valid([0.0; 3])]);
        let b = traj(2, vec![PositionSample::Valid([0.0; 3]), decayed]);
        assert_eq!(
            closest_approach(&a, &b, 50.0).unwrap_err(),
            AnalysisError::NoValidOverlap { a: 1, b: 2 }
        );
    }

    #[test]
    fn test_grid_mismatch_is_per_pair() {
        let a = traj(1, line(&[0.0, 0.0, 0.0]));
        let b = traj(2, line(&[5.0, 5.0, 5.0]));
        let c = traj(3, line(&[0.0, 0.0]));
        assert_eq!(
            closest_approach(&a, &c, 50.0).unwrap_err(),
            AnalysisError::GridMismatch { a: 1, b: 3 }
        );

        let outcomes = analyze_all(&[a, b, c], 50.0);
        let pairs: Vec<(u32, u32)> = outcomes.iter().map(|o| (o.object_a, o.object_b)).collect();
        assert_eq!(pairs, vec![(1, 2), (1, 3), (2, 3)]);
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(outcomes[1].result, Err(AnalysisError::GridMismatch { .. })));
        assert!(matches!(outcomes[2].result, Err(AnalysisError::GridMismatch { .. })));
    }

    #[test]
    fn test_analyze_all_counts_pairs() {
        let trajs: Vec<Trajectory> = (0..5).map(|id| traj(id, line(&[id as f64 * 100.0; 4]))).collect();
        assert_eq!(analyze_all(&trajs, 50.0).len(), 10);
        assert!(analyze_all(&trajs[..1], 50.0).is_empty());
    }

    #[test]
    fn test_separation_series_marks_gaps() {
        let a = traj(1, vec![PositionSample::Valid([0.0; 3]), PositionSample::Invalid(PropagationFault::NonFinite)]);
        let b = traj(2, line(&[3.0, 4.0]));
        assert_eq!(separation_series(&a, &b).unwrap(), vec![Some(3.0), None]);
    }
}
