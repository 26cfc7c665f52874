//! Technical feasibility output.

use serde::{Deserialize, Serialize};

use super::string_or_number;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProCon {
    pub point: String,
    /// "minor", "moderate" or "major"
    #[serde(default)]
    pub weight: String,
}

/// Assessment of one pass-1 recommendation, keyed by its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityAssessment {
    pub recommendation_id: String,
    /// "easy", "moderate", "hard" or "requires_migration"
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub cost_estimate: String,
    /// e.g. "1-2 days"; models sometimes send a bare number
    #[serde(default, deserialize_with = "string_or_number")]
    pub developer_days: String,
    #[serde(default)]
    pub new_dependencies: Vec<String>,
    #[serde(default)]
    pub migration_path: String,
    #[serde(default)]
    pub risk: String,
    #[serde(default)]
    pub pros: Vec<ProCon>,
    #[serde(default)]
    pub cons: Vec<ProCon>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpQa {
    pub question: String,
    pub answer: String,
    /// RFC 3339 timestamp
    #[serde(default)]
    pub asked_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityOutput {
    pub assessments: Vec<FeasibilityAssessment>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub follow_up_qa: Vec<FollowUpQa>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_developer_days_accepts_numbers() {
        let out: FeasibilityOutput = serde_json::from_str(
            r#"{"assessments": [
                {"recommendation_id": "REC-001", "developer_days": 3},
                {"recommendation_id": "REC-002", "developer_days": 1.5},
                {"recommendation_id": "REC-003", "developer_days": "1-2 weeks"},
                {"recommendation_id": "REC-004"}
            ]}"#,
        )
        .unwrap();
        let days: Vec<_> = out.assessments.iter().map(|a| a.developer_days.as_str()).collect();
        assert_eq!(days, vec!["3", "1.5", "1-2 weeks", ""]);
    }

    #[test]
    fn test_pros_and_cons() {
        let a: FeasibilityAssessment = serde_json::from_str(
            r#"{"recommendation_id": "REC-001", "pros": [{"point": "small"}],
                "cons": [{"point": "new dep", "weight": "minor"}]}"#,
        )
        .unwrap();
        assert_eq!(a.pros[0].weight, "");
        assert_eq!(a.cons[0].weight, "minor");
    }

    #[test]
    fn test_output_with_numeric_days_round_trips() {
        let out: FeasibilityOutput = serde_json::from_str(
            r#"{
                "assessments": [{"recommendation_id": "REC-001", "rating": "easy",
                                 "developer_days": 2, "new_dependencies": ["fuse.js"],
                                 "pros": [{"point": "small", "weight": "minor"}]}],
                "summary": "Mostly easy",
                "follow_up_qa": [{"question": "SSR?", "answer": "Yes",
                                  "asked_at": "2026-01-01T00:00:00Z"}]
            }"#,
        )
        .unwrap();
        let again: FeasibilityOutput =
            serde_json::from_str(&serde_json::to_string(&out).unwrap()).unwrap();
        assert_eq!(again, out);
        assert_eq!(again.assessments[0].developer_days, "2");
    }
}
