//! Threshold classification of closest-approach distances.

use serde::{Deserialize, Serialize};

/// Risk category of one conjunction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskCategory {
    /// Minimum distance strictly below the threshold.
    Alert,
    Safe,
}

impl RiskCategory {
    pub fn is_alert(&self) -> bool {
        matches!(self, RiskCategory::Alert)
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskCategory::Alert => f.write_str("ALERT"),
            RiskCategory::Safe => f.write_str("SAFE"),
        }
    }
}

/// `Alert` iff `min_distance_km < threshold_km`. A distance equal to the
/// threshold is `Safe`.
pub fn classify(min_distance_km: f64, threshold_km: f64) -> RiskCategory {
    if min_distance_km < threshold_km {
        RiskCategory::Alert
    } else {
        RiskCategory::Safe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(classify(49.999, 50.0), RiskCategory::Alert);
        assert_eq!(classify(50.0, 50.0), RiskCategory::Safe);
        assert_eq!(classify(50.001, 50.0), RiskCategory::Safe);
        assert_eq!(classify(0.0, 50.0), RiskCategory::Alert);
    }

    #[test]
    fn test_zero_threshold_never_alerts() {
        assert_eq!(classify(0.0, 0.0), RiskCategory::Safe);
    }

    #[test]
    fn test_labels() {
        assert_eq!(RiskCategory::Alert.to_string(), "ALERT");
        assert_eq!(serde_json::to_string(&RiskCategory::Safe).unwrap(), "\"SAFE\"");
        assert!(RiskCategory::Alert.is_alert());
    }
}
