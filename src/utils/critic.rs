use crate::utils::{identifier_label, ClientError};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Display order of the critic's scoring categories. Categories missing from a
/// payload are skipped; categories not listed here are not shown.
pub const CRITIC_CATEGORIES: [&str; 6] = [
    "preference_alignment",
    "information_accuracy",
    "search_integration",
    "conversational_flow",
    "clarity_and_conciseness",
    "helpfulness",
];

pub const EVALUATION_UNAVAILABLE: &str = "Evaluation unavailable";

#[derive(Clone, Debug, PartialEq)]
pub struct CriticResult {
    pub total_score: f64,
    pub summary: Option<String>,
    pub category_scores: HashMap<String, f64>,
}

impl CriticResult {
    /// Accepts the critique either as a JSON object or as a string holding one.
    pub fn parse(value: &Value) -> Result<Self, ClientError> {
        match value {
            Value::Object(map) => Self::from_map(map),
            Value::String(raw) => {
                let parsed: Value = serde_json::from_str(raw)
                    .map_err(|e| ClientError::parse("critic result", e))?;
                match parsed {
                    Value::Object(map) => Self::from_map(&map),
                    _ => Err(ClientError::parse("critic result", "not a JSON object")),
                }
            }
            _ => Err(ClientError::parse("critic result", "unexpected JSON type")),
        }
    }

    fn from_map(map: &Map<String, Value>) -> Result<Self, ClientError> {
        let total_score = map
            .get("total_score")
            .and_then(as_score)
            .ok_or_else(|| ClientError::parse("critic result", "missing total_score"))?;

        let summary = map
            .get("summary")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut category_scores = HashMap::new();
        // Categories arrive either flattened next to total_score or nested.
        let nested = map.get("category_scores").and_then(Value::as_object);
        for (key, entry) in map.iter().chain(nested.into_iter().flatten()) {
            if let Some(score) = entry.get("score").and_then(as_score) {
                category_scores.insert(key.clone(), score);
            }
        }

        Ok(Self {
            total_score,
            summary,
            category_scores,
        })
    }

    /// Known categories present in the payload, in display order.
    pub fn ordered_categories(&self) -> Vec<(String, f64)> {
        CRITIC_CATEGORIES
            .iter()
            .filter_map(|key| {
                self.category_scores
                    .get(*key)
                    .map(|score| (identifier_label(key), *score))
            })
            .collect()
    }
}

fn as_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Renders a score without a trailing `.0` for whole numbers.
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{}", score as i64)
    } else {
        format!("{:.1}", score)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BadgeTone {
    Regenerated,
    Good,
    Fair,
    Poor,
}

impl BadgeTone {
    pub fn for_score(score: f64, regenerated: bool) -> Self {
        if regenerated {
            BadgeTone::Regenerated
        } else if score >= 8.0 {
            BadgeTone::Good
        } else if score >= 5.0 {
            BadgeTone::Fair
        } else {
            BadgeTone::Poor
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            BadgeTone::Regenerated => "bg-blue-500",
            BadgeTone::Good => "bg-green-500",
            BadgeTone::Fair => "bg-yellow-500",
            BadgeTone::Poor => "bg-red-500",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoreBadge {
    pub score: f64,
    pub tone: BadgeTone,
}

impl ScoreBadge {
    pub fn new(score: f64, regenerated: bool) -> Self {
        Self {
            score,
            tone: BadgeTone::for_score(score, regenerated),
        }
    }

    pub fn label(&self) -> String {
        format_score(self.score)
    }

    pub fn is_regenerated(&self) -> bool {
        self.tone == BadgeTone::Regenerated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(9.0, BadgeTone::Good)]
    #[case(8.0, BadgeTone::Good)]
    #[case(6.0, BadgeTone::Fair)]
    #[case(5.0, BadgeTone::Fair)]
    #[case(4.0, BadgeTone::Poor)]
    fn test_badge_thresholds(#[case] score: f64, #[case] tone: BadgeTone) {
        assert_eq!(BadgeTone::for_score(score, false), tone);
    }

    #[test]
    fn test_regenerated_badge_is_blue_regardless_of_score() {
        let badge = ScoreBadge::new(3.0, true);
        assert_eq!(badge.tone, BadgeTone::Regenerated);
        assert_eq!(badge.tone.css_class(), "bg-blue-500");
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(9.0), "9");
        assert_eq!(format_score(8.5), "8.5");
    }

    #[test]
    fn test_parse_flattened_categories() {
        let critic = CriticResult::parse(&json!({
            "total_score": 7.5,
            "summary": "Solid answer",
            "helpfulness": {"score": 8, "strengths": "clear"},
            "preference_alignment": {"score": 7},
            "unrelated": "ignored"
        }))
        .unwrap();

        assert_eq!(critic.total_score, 7.5);
        assert_eq!(critic.summary.as_deref(), Some("Solid answer"));
        assert_eq!(
            critic.ordered_categories(),
            vec![
                ("Preference Alignment".to_string(), 7.0),
                ("Helpfulness".to_string(), 8.0),
            ]
        );
    }

    #[test]
    fn test_parse_string_payload() {
        let critic =
            CriticResult::parse(&json!("{\"total_score\": 9, \"category_scores\": {\"search_integration\": {\"score\": 6}}}"))
                .unwrap();
        assert_eq!(critic.total_score, 9.0);
        assert_eq!(critic.category_scores.get("search_integration"), Some(&6.0));
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        assert!(matches!(
            CriticResult::parse(&json!("{not json")),
            Err(ClientError::Parse { .. })
        ));
        assert!(CriticResult::parse(&json!({"summary": "no score"})).is_err());
        assert!(CriticResult::parse(&json!(12)).is_err());
    }
}
