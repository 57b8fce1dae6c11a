use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{CineError, CineResult};

const INVALID_SCORE: &str = "myScore must be an integer between 0 and 10";

/// Raw `myScore` as callers send it: a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScoreInput {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ScoreInput {
    pub fn to_integer(&self) -> CineResult<i64> {
        match self {
            ScoreInput::Integer(value) => Ok(*value),
            ScoreInput::Float(value) if value.is_finite() && value.fract() == 0.0 => {
                Ok(*value as i64)
            }
            ScoreInput::Float(_) => Err(CineError::InvalidRequest(INVALID_SCORE.into())),
            ScoreInput::Text(text) => text
                .trim()
                .parse::<i64>()
                .map_err(|_| CineError::InvalidRequest(INVALID_SCORE.into())),
        }
    }
}

impl From<i64> for ScoreInput {
    fn from(value: i64) -> Self {
        ScoreInput::Integer(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Validate)]
pub struct UserAnnotations {
    #[validate(range(min = 0, max = 10))]
    pub my_score: i64,
    pub my_review: Option<String>,
}

impl UserAnnotations {
    /// A score is required on every upsert.
    pub fn parse(score: Option<&ScoreInput>, review: Option<String>) -> CineResult<Self> {
        let score = score.ok_or_else(|| CineError::InvalidRequest(INVALID_SCORE.into()))?;
        let annotations = Self {
            my_score: score.to_integer()?,
            my_review: review,
        };
        annotations
            .validate()
            .map_err(|_| CineError::InvalidRequest(INVALID_SCORE.into()))?;
        Ok(annotations)
    }
}

/// Body of a partial update. `null` is the same as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatchPayload {
    #[serde(rename = "myScore", default)]
    pub my_score: Option<ScoreInput>,
    #[serde(rename = "myReview", default)]
    pub my_review: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Validate)]
pub struct MoviePatch {
    #[validate(range(min = 0, max = 10))]
    pub my_score: Option<i64>,
    pub my_review: Option<String>,
}

impl MoviePatch {
    pub fn parse(payload: PatchPayload) -> CineResult<Self> {
        let patch = Self {
            my_score: payload
                .my_score
                .as_ref()
                .map(ScoreInput::to_integer)
                .transpose()?,
            my_review: payload.my_review,
        };
        patch
            .validate()
            .map_err(|_| CineError::InvalidRequest(INVALID_SCORE.into()))?;
        Ok(patch)
    }

    pub fn is_empty(&self) -> bool {
        self.my_score.is_none() && self.my_review.is_none()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn score(value: serde_json::Value) -> ScoreInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn accepts_integers_and_numeric_strings() {
        assert_eq!(score(json!(9)).to_integer().unwrap(), 9);
        assert_eq!(score(json!("7")).to_integer().unwrap(), 7);
        assert_eq!(score(json!(" 3 ")).to_integer().unwrap(), 3);
        assert_eq!(score(json!(8.0)).to_integer().unwrap(), 8);
    }

    #[test]
    fn rejects_fractional_and_non_numeric_scores() {
        assert!(score(json!(7.5)).to_integer().is_err());
        assert!(score(json!("seven")).to_integer().is_err());
        assert!(score(json!("")).to_integer().is_err());
    }

    #[test]
    fn annotations_enforce_range() {
        for value in [0i64, 5, 10] {
            let parsed = UserAnnotations::parse(Some(&value.into()), None).unwrap();
            assert_eq!(parsed.my_score, value);
        }
        for value in [-1i64, 11, 15] {
            let err = UserAnnotations::parse(Some(&value.into()), None).unwrap_err();
            assert!(matches!(err, CineError::InvalidRequest(_)));
        }
    }

    #[test]
    fn annotations_require_a_score() {
        let err = UserAnnotations::parse(None, Some("no score".into())).unwrap_err();
        assert!(matches!(err, CineError::InvalidRequest(_)));
    }

    #[test]
    fn patch_keeps_only_present_fields() {
        let payload: PatchPayload = serde_json::from_value(json!({ "myReview": "Rewatched." })).unwrap();
        let patch = MoviePatch::parse(payload).unwrap();
        assert_eq!(patch.my_score, None);
        assert_eq!(patch.my_review.as_deref(), Some("Rewatched."));

        let payload: PatchPayload =
            serde_json::from_value(json!({ "myScore": null, "myReview": null })).unwrap();
        assert!(MoviePatch::parse(payload).unwrap().is_empty());
    }

    #[test]
    fn patch_rejects_out_of_range_score() {
        let payload: PatchPayload = serde_json::from_value(json!({ "myScore": 42 })).unwrap();
        assert!(matches!(
            MoviePatch::parse(payload),
            Err(CineError::InvalidRequest(_))
        ));
    }
}
