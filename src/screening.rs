//! One screening run: source → parser → propagator → sampler → analyzer.
//!
//! Objects whose records cannot be fetched or parsed are excluded and listed
//! in the report with the reason; the remaining objects are still screened.
//! The run reads no clock and keeps no state of its own: the same config,
//! source and `now` give the same report.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, ScreeningConfig};
use crate::conjunction::{analyze_all, ConjunctionEvent, PairOutcome};
use crate::elements::ElementSet;
use crate::propagator::{Propagator, PropagationModel};
use crate::source::ElementSource;
use crate::tle;
use crate::trajectory::{sample_all, SampleError, TimeGrid, Trajectory};

#[derive(Error, Debug)]
pub enum ScreeningError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Grid(#[from] SampleError),
}

/// An object left out of the run, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Exclusion {
    Fetch { object_id: u32, reason: String },
    Parse { object_id: u32, reason: String, checksum: bool },
    IdMismatch { object_id: u32, found: u32 },
}

impl Exclusion {
    pub fn object_id(&self) -> u32 {
        match self {
            Exclusion::Fetch { object_id, .. }
            | Exclusion::Parse { object_id, .. }
            | Exclusion::IdMismatch { object_id, .. } => *object_id,
        }
    }
}

impl std::fmt::Display for Exclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Exclusion::Fetch { object_id, reason } => write!(f, "{object_id}: fetch failed: {reason}"),
            Exclusion::Parse { object_id, reason, .. } => write!(f, "{object_id}: bad record: {reason}"),
            Exclusion::IdMismatch { object_id, found } => {
                write!(f, "{object_id}: source returned object {found}")
            }
        }
    }
}

/// Everything a screening run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub grid: TimeGrid,
    pub threshold_km: f64,
    pub body_radius_km: f64,
    pub model: PropagationModel,
    pub excluded: Vec<Exclusion>,
    pub trajectories: BTreeMap<u32, Trajectory>,
    /// One entry per unordered pair of screened objects, in config order.
    pub outcomes: Vec<PairOutcome>,
}

impl ScreeningReport {
    /// Successfully analyzed pairs.
    pub fn events(&self) -> impl Iterator<Item = &ConjunctionEvent> + '_ {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn alerts(&self) -> impl Iterator<Item = &ConjunctionEvent> + '_ {
        self.events().filter(|e| e.risk.is_alert())
    }

    pub fn has_alerts(&self) -> bool {
        self.alerts().next().is_some()
    }

    /// Smallest closest approach over all pairs.
    pub fn closest(&self) -> Option<&ConjunctionEvent> {
        self.events().min_by(|a, b| a.min_distance_km.total_cmp(&b.min_distance_km))
    }
}

/// Run a screening with elements drawn from `source`.
///
/// `now` is the window start unless the config fixes one.
pub fn run(
    config: &ScreeningConfig,
    source: &dyn ElementSource,
    now: DateTime<Utc>,
) -> Result<ScreeningReport, ScreeningError> {
    config.validate()?;
    let grid = config.time_grid(now)?;

    let mut excluded = Vec::new();
    let mut elements = Vec::with_capacity(config.object_ids.len());
    for &id in &config.object_ids {
        match load(source, id) {
            Ok(set) => elements.push(set),
            Err(exclusion) => {
                log::warn!("excluding {exclusion}");
                excluded.push(exclusion);
            }
        }
    }

    let mut report = screen(&elements, config, grid)?;
    report.excluded = excluded;
    Ok(report)
}

/// Screen already-parsed element sets on a grid.
///
/// Trajectories are keyed by catalog number, so two sets with the same number
/// are rejected.
pub fn screen(
    elements: &[ElementSet],
    config: &ScreeningConfig,
    grid: TimeGrid,
) -> Result<ScreeningReport, ScreeningError> {
    let mut seen = BTreeSet::new();
    if let Some(dup) = elements.iter().find(|e| !seen.insert(e.catalog_number())) {
        return Err(ConfigError::DuplicateObject(dup.catalog_number()).into());
    }

    log::info!(
        "screening {} objects with {} over {} samples from {}",
        elements.len(),
        config.model,
        grid.count(),
        grid.start()
    );
    if elements.len() < 2 {
        log::warn!("fewer than two usable objects, no pairs to analyze");
    }

    let propagators: Vec<Box<dyn Propagator>> = elements.iter().map(|e| config.model.build(e)).collect();
    let trajectories = sample_all(&propagators, &grid);
    for traj in trajectories.iter().filter(|t| t.valid_count() == 0) {
        log::warn!("{} (NORAD {}) has no valid samples in the window", traj.name, traj.object_id);
    }

    let outcomes = analyze_all(&trajectories, config.threshold_km);
    let alerts = outcomes
        .iter()
        .filter(|o| o.result.as_ref().is_ok_and(|e| e.risk.is_alert()))
        .count();
    log::info!("{} pairs analyzed, {} alerts", outcomes.len(), alerts);

    Ok(ScreeningReport {
        grid,
        threshold_km: config.threshold_km,
        body_radius_km: config.body_radius_km,
        model: config.model,
        excluded: Vec::new(),
        trajectories: trajectories.into_iter().map(|t| (t.object_id, t)).collect(),
        outcomes,
    })
}

fn load(source: &dyn ElementSource, id: u32) -> Result<ElementSet, Exclusion> {
    let raw = source.fetch(id).map_err(|e| Exclusion::Fetch {
        object_id: id,
        reason: e.to_string(),
    })?;
    let set = tle::parse(&raw).map_err(|e| Exclusion::Parse {
        object_id: id,
        reason: e.to_string(),
        checksum: e.is_checksum(),
    })?;
    if set.catalog_number() != id {
        return Err(Exclusion::IdMismatch {
            object_id: id,
            found: set.catalog_number(),
        });
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticSource;
    use chrono::TimeZone;

    const ISS: &str = "\
ISS (ZARYA)
1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927
2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";

    const OTHER: &str = "\
1 58215U 23170A   08264.50000000  .00001000  00000-0  50000-4 0  9999
2 58215  43.0000 100.0000 0001500  90.0000 270.0000 15.05000000 10007";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2008, 9, 21, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_bad_records_are_excluded_not_fatal() {
        let corrupted = ISS.replace("2927", "2928");
        let source = StaticSource::new()
            .with_record(25544, corrupted)
            .with_record(58215, OTHER)
            .with_record(77, OTHER);
        let config = ScreeningConfig::for_objects([25544, 58215, 77, 99]);

        let report = run(&config, &source, now()).unwrap();
        assert_eq!(report.trajectories.len(), 1);
        assert!(report.trajectories.contains_key(&58215));
        assert!(report.outcomes.is_empty());

        let excluded: Vec<u32> = report.excluded.iter().map(Exclusion::object_id).collect();
        assert_eq!(excluded, vec![25544, 77, 99]);
        assert!(matches!(report.excluded[0], Exclusion::Parse { checksum: true, .. }));
        assert!(matches!(report.excluded[1], Exclusion::IdMismatch { found: 58215, .. }));
        assert!(matches!(report.excluded[2], Exclusion::Fetch { .. }));
    }

    #[test]
    fn test_two_objects_give_one_pair() {
        let source = StaticSource::new().with_record(25544, ISS).with_record(58215, OTHER);
        let config = ScreeningConfig::for_objects([25544, 58215]);
        let report = run(&config, &source, now()).unwrap();

        assert_eq!(report.grid.count(), 360);
        assert_eq!(report.grid.start(), now());
        assert_eq!(report.outcomes.len(), 1);
        let event = report.outcomes[0].result.as_ref().unwrap();
        assert_eq!((event.object_a, event.object_b), (25544, 58215));
        assert_eq!(report.closest(), Some(event));
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let config = ScreeningConfig::for_objects(Vec::<u32>::new());
        assert!(matches!(
            run(&config, &StaticSource::new(), now()),
            Err(ScreeningError::Config(ConfigError::NoObjects))
        ));
    }

    #[test]
    fn test_repeated_catalog_number_is_rejected() {
        let iss = tle::parse(ISS).unwrap();
        let config = ScreeningConfig::for_objects([25544]);
        let grid = config.time_grid(now()).unwrap();
        assert!(matches!(
            screen(&[iss.clone(), iss], &config, grid),
            Err(ScreeningError::Config(ConfigError::DuplicateObject(25544)))
        ));
    }

    #[test]
    fn test_runs_are_deterministic() {
        let source = StaticSource::new().with_record(25544, ISS).with_record(58215, OTHER);
        let config = ScreeningConfig::for_objects([25544, 58215]);
        assert_eq!(run(&config, &source, now()).unwrap(), run(&config, &source, now()).unwrap());
    }
}
