// SPDX-License-Identifier: GPL-3.0-or-later
use serde::{Deserialize, Serialize};

/// Concern level as reported on (or expected of) an analysis result.
///
/// The source this system was distilled from used two different
/// enumerations for this concept — one in the validator's required-field
/// check, a narrower one in the score-to-concern derivation — and the spec
/// calls out that divergence as an open question to resolve (§9). This
/// crate canonicalizes on a single six-variant enumeration and uses it on
/// both sides of the consistency check in `cadence-quality`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcernLevel {
    VeryLow,
    Low,
    Moderate,
    Medium,
    High,
    VeryHigh,
}

impl ConcernLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ConcernLevel::VeryLow => "Very Low",
            ConcernLevel::Low => "Low",
            ConcernLevel::Moderate => "Moderate",
            ConcernLevel::Medium => "Medium",
            ConcernLevel::High => "High",
            ConcernLevel::VeryHigh => "Very High",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Very Low" | "very_low" | "VeryLow" => Some(ConcernLevel::VeryLow),
            "Low" | "low" => Some(ConcernLevel::Low),
            "Moderate" | "moderate" => Some(ConcernLevel::Moderate),
            "Medium" | "medium" => Some(ConcernLevel::Medium),
            "High" | "high" => Some(ConcernLevel::High),
            "Very High" | "very_high" | "VeryHigh" => Some(ConcernLevel::VeryHigh),
            _ => None,
        }
    }
}

/// Derive the concern level a well-calibrated analyzer should have reported
/// for a given `christian_score` (0..100 scale, §4.5: `_get_expected_concern_level`).
pub fn expected_concern_level(christian_score: f64) -> ConcernLevel {
    if christian_score >= 85.0 {
        ConcernLevel::Low
    } else if christian_score >= 70.0 {
        ConcernLevel::Medium
    } else if christian_score >= 50.0 {
        ConcernLevel::High
    } else {
        ConcernLevel::VeryHigh
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityGrade {
    Failed,
    Poor,
    Acceptable,
    Good,
    Excellent,
}

impl QualityGrade {
    /// Top-down threshold table (§4.5): first match wins.
    pub fn from_score(overall: f64, validation_error_count: usize) -> Self {
        if overall >= 0.85 && validation_error_count == 0 {
            QualityGrade::Excellent
        } else if overall >= 0.75 && validation_error_count <= 1 {
            QualityGrade::Good
        } else if overall >= 0.55 && validation_error_count <= 3 {
            QualityGrade::Acceptable
        } else if overall >= 0.25 {
            QualityGrade::Poor
        } else {
            QualityGrade::Failed
        }
    }
}

/// Per-analysis grading output, attached to the analyzer result as an
/// optional annotation — it is not persisted on its own; its lifetime is
/// the single validation call that produced it (§3: "Quality metrics").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub completeness: f64,
    pub confidence: f64,
    pub consistency: f64,
    pub overall: f64,
    pub grade: QualityGrade,
    pub missing_fields: Vec<String>,
    pub validation_errors: Vec<String>,
    pub recommendations: Vec<String>,
}

impl QualityMetrics {
    pub fn new(
        completeness: f64,
        confidence: f64,
        consistency: f64,
        missing_fields: Vec<String>,
        validation_errors: Vec<String>,
        recommendations: Vec<String>,
    ) -> Self {
        let overall = 0.4 * completeness + 0.4 * confidence + 0.2 * consistency;
        let grade = QualityGrade::from_score(overall, validation_errors.len());
        Self {
            completeness,
            confidence,
            consistency,
            overall,
            grade,
            missing_fields,
            validation_errors,
            recommendations,
        }
    }
}

/// A re-enqueue instruction attached to a `failed` or `poor` decision
/// (§4.5 decision matrix).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reenqueue {
    pub priority: crate::job::JobPriority,
    pub delay_secs: u64,
}

/// What the quality gate decides to do with a job once it has been scored
/// (§4.5 decision matrix). `poor` both persists (flagged for review) *and*
/// re-enqueues, which is why `persist`/`requires_review` and `reenqueue`
/// are independent fields rather than mutually exclusive variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityDecision {
    pub grade: QualityGrade,
    pub persist: bool,
    pub requires_review: bool,
    pub reenqueue: Option<Reenqueue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_ordering_is_failed_lowest() {
        assert!(QualityGrade::Failed < QualityGrade::Poor);
        assert!(QualityGrade::Poor < QualityGrade::Acceptable);
        assert!(QualityGrade::Acceptable < QualityGrade::Good);
        assert!(QualityGrade::Good < QualityGrade::Excellent);
    }

    #[test]
    fn excellent_requires_zero_validation_errors() {
        assert_eq!(QualityGrade::from_score(0.9, 0), QualityGrade::Excellent);
        assert_eq!(QualityGrade::from_score(0.9, 1), QualityGrade::Good);
    }

    #[test]
    fn overall_is_monotonic_in_each_component() {
        let base = QualityMetrics::new(0.5, 0.5, 0.5, vec![], vec![], vec![]).overall;
        let bumped = QualityMetrics::new(0.6, 0.5, 0.5, vec![], vec![], vec![]).overall;
        assert!(bumped > base);
    }

    #[test]
    fn concern_level_round_trips_through_display_string() {
        for level in [
            ConcernLevel::VeryLow,
            ConcernLevel::Low,
            ConcernLevel::Moderate,
            ConcernLevel::Medium,
            ConcernLevel::High,
            ConcernLevel::VeryHigh,
        ] {
            assert_eq!(ConcernLevel::parse(level.as_str()), Some(level));
        }
    }

    #[test]
    fn expected_concern_level_matches_spec_thresholds() {
        assert_eq!(expected_concern_level(90.0), ConcernLevel::Low);
        assert_eq!(expected_concern_level(75.0), ConcernLevel::Medium);
        assert_eq!(expected_concern_level(55.0), ConcernLevel::High);
        assert_eq!(expected_concern_level(10.0), ConcernLevel::VeryHigh);
    }
}
