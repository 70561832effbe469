// SPDX-License-Identifier: GPL-3.0-or-later
//! C8: grades an opaque analyzer result map and decides how the worker
//! should route it (accept, accept-with-review, re-enqueue). The analyzer
//! itself is out of scope (§9) — this crate only ever sees its output as a
//! JSON object.

use cadence_domain::{expected_concern_level, ConcernLevel, JobPriority, QualityDecision, QualityGrade, QualityMetrics, Reenqueue};
use serde_json::Value;

/// Re-enqueue delay for a `poor` grade (§4.5).
pub const POOR_REENQUEUE_DELAY_SECS: u64 = 5 * 60;
/// Re-enqueue delay for a `failed` grade (§4.5).
pub const FAILED_REENQUEUE_DELAY_SECS: u64 = 60;

struct RequiredField {
    name: &'static str,
}

const REQUIRED_FIELDS: &[RequiredField] = &[
    RequiredField { name: "christian_score" },
    RequiredField { name: "concern_level" },
    RequiredField { name: "biblical_themes" },
    RequiredField { name: "supporting_scripture" },
    RequiredField { name: "explanation" },
];

const DESIRABLE_FIELDS: &[&str] = &[
    "positive_themes",
    "purity_flags",
    "detailed_concerns",
    "positive_score_bonus",
    "analysis_version",
];

fn is_valid_required_field(name: &str, value: &Value) -> Result<(), String> {
    match name {
        "christian_score" => match value.as_f64() {
            Some(n) if (0.0..=100.0).contains(&n) => Ok(()),
            Some(n) => Err(format!("christian_score {n} outside valid range 0..=100")),
            None => Err("christian_score must be a number".into()),
        },
        "concern_level" => match value.as_str() {
            Some(s) if ConcernLevel::parse(s).is_some() => Ok(()),
            Some(s) => Err(format!("concern_level has invalid value '{s}'")),
            None => Err("concern_level must be a string".into()),
        },
        "biblical_themes" => {
            if value.is_array() {
                Ok(())
            } else {
                Err("biblical_themes must be a list".into())
            }
        }
        "supporting_scripture" => {
            if value.is_object() {
                Ok(())
            } else {
                Err("supporting_scripture must be a mapping".into())
            }
        }
        "explanation" => match value.as_str() {
            Some(s) if s.trim().chars().count() >= 10 => Ok(()),
            Some(_) => Err("explanation is too short; minimum 10 characters".into()),
            None => Err("explanation must be a string".into()),
        },
        _ => Ok(()),
    }
}

fn is_valid_desirable_field(name: &str, value: &Value) -> bool {
    match name {
        "positive_themes" | "purity_flags" | "detailed_concerns" => value.is_array(),
        "positive_score_bonus" => value.as_f64().map(|n| (0.0..=200.0).contains(&n)).unwrap_or(false),
        "analysis_version" => value.is_string(),
        _ => false,
    }
}

fn object_get<'a>(result: &'a Value, field: &str) -> Option<&'a Value> {
    result.as_object().and_then(|obj| obj.get(field))
}

/// Validate an analyzer result and grade it (§4.5 scoring + grade table).
pub fn validate(result: &Value) -> QualityMetrics {
    let mut missing_fields = Vec::new();
    let mut validation_errors = Vec::new();

    let mut present_required = 0usize;
    for field in REQUIRED_FIELDS {
        match object_get(result, field.name) {
            None => {
                missing_fields.push(field.name.to_string());
                validation_errors.push(format!("Missing required field: {}", field.name));
            }
            Some(value) => match is_valid_required_field(field.name, value) {
                Ok(()) => present_required += 1,
                Err(message) => validation_errors.push(message),
            },
        }
    }

    let present_desirable = DESIRABLE_FIELDS
        .iter()
        .filter(|field| object_get(result, field).map(|v| is_valid_desirable_field(field, v)).unwrap_or(false))
        .count();

    let completeness =
        (present_required as f64 / REQUIRED_FIELDS.len() as f64 + 0.1 * present_desirable as f64).clamp(0.0, 1.0);

    let christian_score = object_get(result, "christian_score").and_then(Value::as_f64);
    let biblical_themes = object_get(result, "biblical_themes").and_then(Value::as_array);
    let supporting_scripture = object_get(result, "supporting_scripture").and_then(Value::as_object);
    let explanation = object_get(result, "explanation").and_then(Value::as_str);

    let mut confidence = 0.0;
    if let Some(score) = christian_score {
        if (0.0..=100.0).contains(&score) {
            confidence += 0.3;
        }
    }
    if let Some(themes) = biblical_themes {
        if !themes.is_empty() {
            confidence += 0.3;
            if themes.len() >= 3 {
                confidence += 0.1;
            }
        }
    }
    if let Some(scripture) = supporting_scripture {
        if !scripture.is_empty() {
            confidence += 0.3;
        }
    }
    if let Some(explanation) = explanation {
        if explanation.trim().chars().count() >= 50 {
            confidence += 0.1;
        }
    }
    let confidence = confidence.clamp(0.0, 1.0);

    let mut consistency = 1.0f64;
    let reported_concern = object_get(result, "concern_level").and_then(Value::as_str).and_then(ConcernLevel::parse);
    if let (Some(score), Some(reported)) = (christian_score, reported_concern) {
        let expected = expected_concern_level(score);
        if expected != reported {
            consistency -= 0.1;
            validation_errors.push(format!(
                "Inconsistent score ({score}) and concern level ({}). Expected: {}",
                reported.as_str(),
                expected.as_str()
            ));
        }
    }
    if let (Some(score), Some(themes)) = (christian_score, biblical_themes) {
        let theme_count = themes.len();
        if score >= 80.0 && theme_count == 0 {
            consistency -= 0.2;
            validation_errors.push("High Christian score but no biblical themes detected".into());
        } else if score <= 30.0 && theme_count > 2 {
            consistency -= 0.15;
            validation_errors.push("Low Christian score but many biblical themes detected".into());
        }
    }
    let consistency = consistency.max(0.0);

    let mut recommendations = Vec::new();
    if completeness < 0.8 {
        recommendations.push("ensure required fields".to_string());
    }
    if confidence < 0.7 {
        recommendations.push("improve biblical content detection".to_string());
    }
    if consistency < 0.8 {
        recommendations.push("review internal logic".to_string());
    }
    if !missing_fields.is_empty() {
        recommendations.push(format!("add missing fields: {}", missing_fields.join(", ")));
    }

    QualityMetrics::new(completeness, confidence, consistency, missing_fields, validation_errors, recommendations)
}

/// Route a graded result per the §4.5 decision matrix.
pub fn decide(metrics: &QualityMetrics) -> QualityDecision {
    match metrics.grade {
        QualityGrade::Excellent | QualityGrade::Good | QualityGrade::Acceptable => QualityDecision {
            grade: metrics.grade,
            persist: true,
            requires_review: false,
            reenqueue: None,
        },
        QualityGrade::Poor => QualityDecision {
            grade: metrics.grade,
            persist: true,
            requires_review: true,
            reenqueue: Some(Reenqueue {
                priority: JobPriority::Medium,
                delay_secs: POOR_REENQUEUE_DELAY_SECS,
            }),
        },
        QualityGrade::Failed => QualityDecision {
            grade: metrics.grade,
            persist: false,
            requires_review: false,
            reenqueue: Some(Reenqueue {
                priority: JobPriority::High,
                delay_secs: FAILED_REENQUEUE_DELAY_SECS,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn well_formed_result() -> Value {
        json!({
            "christian_score": 92,
            "concern_level": "Low",
            "biblical_themes": ["grace", "redemption", "faith"],
            "supporting_scripture": {"John 3:16": "For God so loved the world..."},
            "explanation": "This song draws heavily on themes of grace and redemption throughout its lyrics.",
            "analysis_version": "2.1",
        })
    }

    #[test]
    fn well_formed_result_grades_excellent_and_is_accepted() {
        let metrics = validate(&well_formed_result());
        assert_eq!(metrics.grade, QualityGrade::Excellent);
        assert!(metrics.validation_errors.is_empty());

        let decision = decide(&metrics);
        assert!(decision.persist);
        assert!(!decision.requires_review);
        assert!(decision.reenqueue.is_none());
    }

    /// S5 from the spec: missing two required fields, an out-of-range
    /// score, and an invalid concern_level string.
    #[test]
    fn scenario_s5_grades_failed_and_reenqueues_at_high_priority() {
        let result = json!({
            "christian_score": 150,
            "concern_level": "Invalid",
        });

        let metrics = validate(&result);
        assert_eq!(metrics.grade, QualityGrade::Failed);

        let decision = decide(&metrics);
        assert!(!decision.persist);
        let reenqueue = decision.reenqueue.expect("failed grade must re-enqueue");
        assert_eq!(reenqueue.priority, JobPriority::High);
        assert_eq!(reenqueue.delay_secs, FAILED_REENQUEUE_DELAY_SECS);
    }

    #[test]
    fn poor_grade_persists_flagged_and_reenqueues_at_medium_priority() {
        // Two required fields missing (drags completeness and confidence
        // down) plus a score/concern_level mismatch (one validation error),
        // landing just under the acceptable threshold.
        let result = json!({
            "christian_score": 10,
            "concern_level": "Low",
            "explanation": "A short explanation of analysis result.",
        });

        let metrics = validate(&result);
        assert_eq!(metrics.grade, QualityGrade::Poor);

        let decision = decide(&metrics);
        assert!(decision.persist);
        assert!(decision.requires_review);
        let reenqueue = decision.reenqueue.expect("poor grade must re-enqueue");
        assert_eq!(reenqueue.priority, JobPriority::Medium);
        assert_eq!(reenqueue.delay_secs, POOR_REENQUEUE_DELAY_SECS);
    }

    #[test]
    fn overall_is_monotonic_non_decreasing_in_each_input() {
        let low = QualityMetrics::new(0.5, 0.5, 0.5, vec![], vec![], vec![]);
        let higher_completeness = QualityMetrics::new(0.9, 0.5, 0.5, vec![], vec![], vec![]);
        let higher_confidence = QualityMetrics::new(0.5, 0.9, 0.5, vec![], vec![], vec![]);
        let higher_consistency = QualityMetrics::new(0.5, 0.5, 0.9, vec![], vec![], vec![]);
        assert!(higher_completeness.overall >= low.overall);
        assert!(higher_confidence.overall >= low.overall);
        assert!(higher_consistency.overall >= low.overall);
    }

    #[test]
    fn missing_desirable_fields_do_not_fail_validation() {
        let mut result = well_formed_result();
        result.as_object_mut().unwrap().remove("analysis_version");
        let metrics = validate(&result);
        assert!(metrics.validation_errors.is_empty());
    }
}
