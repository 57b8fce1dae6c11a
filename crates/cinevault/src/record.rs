use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::annotations::{MoviePatch, UserAnnotations};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Value")]
    pub value: String,
}

/// Allow-list of catalog fields copied into a stored record. Anything else
/// the catalog sends is dropped during deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMetadata {
    #[serde(rename = "Title", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "Year", default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(rename = "Rated", default, skip_serializing_if = "Option::is_none")]
    pub rated: Option<String>,
    #[serde(rename = "Released", default, skip_serializing_if = "Option::is_none")]
    pub released: Option<String>,
    #[serde(rename = "Runtime", default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(rename = "Genre", default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(rename = "Director", default, skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(rename = "Writer", default, skip_serializing_if = "Option::is_none")]
    pub writer: Option<String>,
    #[serde(rename = "Actors", default, skip_serializing_if = "Option::is_none")]
    pub actors: Option<String>,
    #[serde(rename = "Plot", default, skip_serializing_if = "Option::is_none")]
    pub plot: Option<String>,
    #[serde(rename = "Language", default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(rename = "Country", default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(rename = "Awards", default, skip_serializing_if = "Option::is_none")]
    pub awards: Option<String>,
    #[serde(rename = "Ratings", default)]
    pub ratings: Vec<Rating>,
    #[serde(rename = "Metascore", default, skip_serializing_if = "Option::is_none")]
    pub metascore: Option<String>,
    #[serde(rename = "imdbRating", default, skip_serializing_if = "Option::is_none")]
    pub imdb_rating: Option<String>,
    #[serde(rename = "imdbVotes", default, skip_serializing_if = "Option::is_none")]
    pub imdb_votes: Option<String>,
    #[serde(rename = "BoxOffice", default, skip_serializing_if = "Option::is_none")]
    pub box_office: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct MovieRecord {
    #[serde(rename = "imdbID")]
    #[validate(length(min = 1))]
    pub imdb_id: String,
    #[serde(flatten)]
    pub metadata: CatalogMetadata,
    #[serde(rename = "myScore")]
    #[validate(range(min = 0, max = 10))]
    pub my_score: i64,
    #[serde(rename = "myReview", default, skip_serializing_if = "Option::is_none")]
    pub my_review: Option<String>,
}

impl MovieRecord {
    pub fn merge(
        imdb_id: impl Into<String>,
        metadata: CatalogMetadata,
        annotations: UserAnnotations,
    ) -> Self {
        Self {
            imdb_id: imdb_id.into(),
            metadata,
            my_score: annotations.my_score,
            my_review: annotations.my_review,
        }
    }

    pub fn apply_patch(&mut self, patch: &MoviePatch) {
        if let Some(score) = patch.my_score {
            self.my_score = score;
        }
        if let Some(review) = &patch.my_review {
            self.my_review = Some(review.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMovie {
    #[serde(flatten)]
    pub record: MovieRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredMovie {
    pub fn new(record: MovieRecord) -> Self {
        let now = Utc::now();
        Self {
            record,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn imdb_id(&self) -> &str {
        &self.record.imdb_id
    }

    /// Response projection: strips store bookkeeping.
    pub fn into_record(self) -> MovieRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn matrix() -> MovieRecord {
        MovieRecord::merge(
            "tt0133093",
            CatalogMetadata {
                title: Some("The Matrix".into()),
                ratings: vec![Rating {
                    source: "Internet Movie Database".into(),
                    value: "8.7/10".into(),
                }],
                ..CatalogMetadata::default()
            },
            UserAnnotations {
                my_score: 9,
                my_review: Some("Seminal.".into()),
            },
        )
    }

    #[test]
    fn serializes_with_catalog_field_names() {
        let value = serde_json::to_value(matrix()).unwrap();
        assert_eq!(
            value,
            json!({
                "imdbID": "tt0133093",
                "Title": "The Matrix",
                "Ratings": [{"Source": "Internet Movie Database", "Value": "8.7/10"}],
                "myScore": 9,
                "myReview": "Seminal."
            })
        );
    }

    #[test]
    fn projection_drops_bookkeeping() {
        let stored = StoredMovie::new(matrix());
        let stored_json = serde_json::to_value(&stored).unwrap();
        assert!(stored_json.get("created_at").is_some());

        let projected = serde_json::to_value(stored.into_record()).unwrap();
        assert!(projected.get("created_at").is_none());
        assert!(projected.get("updated_at").is_none());
        assert_eq!(projected["Title"], "The Matrix");
    }

    #[test]
    fn patch_touches_only_present_fields() {
        let mut record = matrix();
        record.apply_patch(&MoviePatch {
            my_score: None,
            my_review: Some("Still holds up.".into()),
        });
        assert_eq!(record.my_score, 9);
        assert_eq!(record.my_review.as_deref(), Some("Still holds up."));

        record.apply_patch(&MoviePatch {
            my_score: Some(7),
            my_review: None,
        });
        assert_eq!(record.my_score, 7);
        assert_eq!(record.my_review.as_deref(), Some("Still holds up."));
    }

    #[test]
    fn rejects_out_of_range_score_on_validate() {
        let mut record = matrix();
        record.my_score = 11;
        assert!(record.validate().is_err());
        record.my_score = 10;
        assert!(record.validate().is_ok());
    }
}
