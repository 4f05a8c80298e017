//! Human-readable status lines and JSON export of a screening report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conjunction::{AnalysisError, PairOutcome};
use crate::risk::RiskCategory;
use crate::screening::ScreeningReport;

/// Label shown for one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusLabel {
    Alert,
    Safe,
    /// No instant where both objects had a valid position.
    Indeterminate,
    Error,
}

impl StatusLabel {
    pub fn of(outcome: &PairOutcome) -> Self {
        match &outcome.result {
            Ok(event) => match event.risk {
                RiskCategory::Alert => StatusLabel::Alert,
                RiskCategory::Safe => StatusLabel::Safe,
            },
            Err(AnalysisError::NoValidOverlap { .. }) => StatusLabel::Indeterminate,
            Err(AnalysisError::GridMismatch { .. }) => StatusLabel::Error,
        }
    }
}

impl std::fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StatusLabel::Alert => "ALERT",
            StatusLabel::Safe => "SAFE",
            StatusLabel::Indeterminate => "INDETERMINATE",
            StatusLabel::Error => "ERROR",
        })
    }
}

/// Time left until `event`, as "N min S sec left", or "Event Passed".
pub fn countdown(now: DateTime<Utc>, event: DateTime<Utc>) -> String {
    let remaining = event - now;
    if remaining <= chrono::TimeDelta::zero() {
        return "Event Passed".to_string();
    }
    let secs = remaining.num_seconds();
    format!("{} min {} sec left", secs / 60, secs % 60)
}

/// Status line for one pair.
pub fn status_line(outcome: &PairOutcome, now: DateTime<Utc>) -> String {
    let label = StatusLabel::of(outcome);
    match &outcome.result {
        Ok(event) => format!(
            "[{label}] {} ({}) x {} ({}): {:.3} km at {} ({})",
            event.name_a,
            event.object_a,
            event.name_b,
            event.object_b,
            event.min_distance_km,
            event.instant.format("%Y-%m-%d %H:%M:%S UTC"),
            countdown(now, event.instant),
        ),
        Err(err) => format!("[{label}] {} x {}: {err}", outcome.object_a, outcome.object_b),
    }
}

/// Counts of pair labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub pairs: usize,
    pub alerts: usize,
    pub safe: usize,
    pub indeterminate: usize,
    pub errors: usize,
    pub excluded: usize,
}

impl Summary {
    pub fn of(report: &ScreeningReport) -> Self {
        let mut summary = Summary {
            pairs: report.outcomes.len(),
            excluded: report.excluded.len(),
            ..Summary::default()
        };
        for outcome in &report.outcomes {
            match StatusLabel::of(outcome) {
                StatusLabel::Alert => summary.alerts += 1,
                StatusLabel::Safe => summary.safe += 1,
                StatusLabel::Indeterminate => summary.indeterminate += 1,
                StatusLabel::Error => summary.errors += 1,
            }
        }
        summary
    }
}

/// Full plain-text report: header, one line per pair, then exclusions.
pub fn render(report: &ScreeningReport, now: DateTime<Utc>) -> String {
    let summary = Summary::of(report);
    let mut out = format!(
        "Conjunction screening {} .. {} ({} samples, step {} s, model {}, threshold {} km)\n",
        report.grid.start().format("%Y-%m-%d %H:%M:%S"),
        report.grid.end().format("%Y-%m-%d %H:%M:%S"),
        report.grid.count(),
        report.grid.step().num_milliseconds() as f64 / 1000.0,
        report.model,
        report.threshold_km,
    );
    out.push_str(&format!(
        "{} pairs: {} alert, {} safe, {} indeterminate, {} error\n",
        summary.pairs, summary.alerts, summary.safe, summary.indeterminate, summary.errors
    ));
    for outcome in &report.outcomes {
        out.push_str(&status_line(outcome, now));
        out.push('\n');
    }
    if !report.excluded.is_empty() {
        out.push_str("Excluded:\n");
        for exclusion in &report.excluded {
            out.push_str(&format!("  {exclusion}\n"));
        }
    }
    out
}

/// Pretty JSON of the whole report.
pub fn to_json(report: &ScreeningReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conjunction::ConjunctionEvent;
    use crate::propagator::PropagationModel;
    use crate::screening::Exclusion;
    use crate::trajectory::TimeGrid;
    use chrono::{TimeDelta, TimeZone};
    use std::collections::BTreeMap;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 4, 10, 0, 0).unwrap()
    }

    fn event(distance: f64, risk: RiskCategory) -> ConjunctionEvent {
        ConjunctionEvent {
            object_a: 1,
            name_a: "ALPHA".into(),
            object_b: 2,
            name_b: "BRAVO".into(),
            min_distance_km: distance,
            index: 5,
            instant: t0() + TimeDelta::minutes(5),
            risk,
        }
    }

    #[test]
    fn test_countdown() {
        assert_eq!(countdown(t0(), t0() + TimeDelta::seconds(125)), "2 min 5 sec left");
        assert_eq!(countdown(t0(), t0() + TimeDelta::seconds(1)), "0 min 1 sec left");
        assert_eq!(countdown(t0(), t0()), "Event Passed");
        assert_eq!(countdown(t0(), t0() - TimeDelta::seconds(1)), "Event Passed");
    }

    #[test]
    fn test_labels() {
        let alert = PairOutcome { object_a: 1, object_b: 2, result: Ok(event(3.0, RiskCategory::Alert)) };
        let none = PairOutcome {
            object_a: 1,
            object_b: 2,
            result: Err(AnalysisError::NoValidOverlap { a: 1, b: 2 }),
        };
        assert_eq!(StatusLabel::of(&alert), StatusLabel::Alert);
        assert_eq!(StatusLabel::of(&none), StatusLabel::Indeterminate);

        let line = status_line(&alert, t0());
        assert!(line.starts_with("[ALERT] ALPHA (1) x BRAVO (2): 3.000 km"), "{line}");
        assert!(line.ends_with("(5 min 0 sec left)"), "{line}");
        assert!(status_line(&none, t0()).starts_with("[INDETERMINATE] 1 x 2"));
    }

    #[test]
    fn test_render_and_summary() {
        let report = ScreeningReport {
            grid: TimeGrid::new(t0(), TimeDelta::hours(1), TimeDelta::minutes(1)).unwrap(),
            threshold_km: 50.0,
            body_radius_km: 6371.0,
            model: PropagationModel::Sgp4,
            excluded: vec![Exclusion::Fetch { object_id: 3, reason: "not found".into() }],
            trajectories: BTreeMap::new(),
            outcomes: vec![
                PairOutcome { object_a: 1, object_b: 2, result: Ok(event(120.0, RiskCategory::Safe)) },
                PairOutcome { object_a: 1, object_b: 4, result: Err(AnalysisError::GridMismatch { a: 1, b: 4 }) },
            ],
        };
        let summary = Summary::of(&report);
        assert_eq!((summary.pairs, summary.safe, summary.errors, summary.excluded), (2, 1, 1, 1));

        let text = render(&report, t0() + TimeDelta::hours(2));
        assert!(text.contains("[SAFE] ALPHA (1) x BRAVO (2): 120.000 km"));
        assert!(text.contains("Event Passed"));
        assert!(text.contains("[ERROR] 1 x 4"));
        assert!(text.contains("3: fetch failed: not found"));

        let json: serde_json::Value = serde_json::from_str(&to_json(&report).unwrap()).unwrap();
        assert_eq!(json["outcomes"][0]["result"]["Ok"]["risk"], "SAFE");
        assert_eq!(json["excluded"][0]["stage"], "fetch");
    }
}
