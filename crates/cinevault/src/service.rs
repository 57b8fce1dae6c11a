use std::{sync::Arc, time::Instant};

use chrono::Utc;
use metrics::{counter, histogram};
use serde::{Deserialize, Deserializer};
use tracing::{info, instrument};

use crate::{
    annotations::{MoviePatch, PatchPayload, ScoreInput, UserAnnotations},
    catalog::{CatalogClient, CatalogLookup, CatalogMovie},
    error::{CineError, CineResult},
    metrics::{CATALOG_LATENCY, CATALOG_LOOKUPS, MOVIES_WRITTEN},
    record::{MovieRecord, StoredMovie},
    storage::MovieStore,
    telemetry::{TelemetryEvent, TelemetryHub},
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ByIdPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "myScore", default)]
    pub my_score: Option<ScoreInput>,
    #[serde(rename = "myReview", default)]
    pub my_review: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ByTitlePayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub year: Option<String>,
    #[serde(rename = "myScore", default)]
    pub my_score: Option<ScoreInput>,
    #[serde(rename = "myReview", default)]
    pub my_review: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }
    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    }))
}

#[derive(Clone)]
pub struct MovieService {
    catalog: Arc<dyn CatalogClient>,
    store: Arc<dyn MovieStore>,
    telemetry: TelemetryHub,
}

impl MovieService {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        store: Arc<dyn MovieStore>,
        telemetry: TelemetryHub,
    ) -> Self {
        Self {
            catalog,
            store,
            telemetry,
        }
    }

    pub fn store(&self) -> Arc<dyn MovieStore> {
        self.store.clone()
    }

    pub fn telemetry(&self) -> &TelemetryHub {
        &self.telemetry
    }

    pub async fn upsert_by_id(&self, payload: ByIdPayload) -> CineResult<MovieRecord> {
        let lookup = CatalogLookup::by_id(payload.id)?;
        let annotations = UserAnnotations::parse(payload.my_score.as_ref(), payload.my_review)?;
        self.upsert(lookup, annotations).await
    }

    pub async fn upsert_by_title(&self, payload: ByTitlePayload) -> CineResult<MovieRecord> {
        let lookup = CatalogLookup::by_title(payload.title, payload.year)?;
        let annotations = UserAnnotations::parse(payload.my_score.as_ref(), payload.my_review)?;
        self.upsert(lookup, annotations).await
    }

    /// The catalog's `imdbID` is the key, not whatever the caller sent.
    #[instrument(skip(self, lookup, annotations), fields(lookup = %lookup))]
    pub async fn upsert(
        &self,
        lookup: CatalogLookup,
        annotations: UserAnnotations,
    ) -> CineResult<MovieRecord> {
        let movie = self.fetch(&lookup).await?;
        let record = MovieRecord::merge(movie.imdb_id, movie.metadata, annotations);
        let outcome = self.with_store(move |store| store.upsert(record)).await?;
        let op = if outcome.created { "insert" } else { "replace" };
        counter!(MOVIES_WRITTEN, 1, "op" => op);
        info!(imdb_id = outcome.movie.imdb_id(), op, "movie stored");
        self.telemetry.publish(TelemetryEvent::MovieUpserted {
            imdb_id: outcome.movie.imdb_id().to_string(),
            created: outcome.created,
            timestamp: Utc::now(),
        });
        Ok(outcome.movie.into_record())
    }

    async fn fetch(&self, lookup: &CatalogLookup) -> CineResult<CatalogMovie> {
        let start = Instant::now();
        let result = self.catalog.lookup(lookup).await;
        let elapsed = start.elapsed();
        let outcome = match &result {
            Ok(_) => "found",
            Err(CineError::NotFound(_)) => "not_found",
            Err(_) => "error",
        };
        counter!(CATALOG_LOOKUPS, 1, "outcome" => outcome);
        histogram!(CATALOG_LATENCY, elapsed.as_secs_f64());
        self.telemetry.publish(TelemetryEvent::CatalogLookup {
            catalog: self.catalog.name().to_string(),
            lookup: lookup.to_string(),
            found: result.is_ok(),
            latency_ms: elapsed.as_secs_f64() * 1000.0,
            timestamp: Utc::now(),
        });
        result
    }

    // LMDB transactions block, and a writer waits on the environment mutex.
    async fn with_store<T, F>(&self, op: F) -> CineResult<T>
    where
        F: FnOnce(&dyn MovieStore) -> CineResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|err| CineError::Internal(format!("storage task failed: {err}")))?
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> CineResult<Vec<MovieRecord>> {
        let movies = self.with_store(|store| store.list()).await?;
        Ok(movies.into_iter().map(StoredMovie::into_record).collect())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, imdb_id: &str) -> CineResult<MovieRecord> {
        let key = imdb_id.to_string();
        self.with_store(move |store| store.find(&key))
            .await?
            .map(StoredMovie::into_record)
            .ok_or_else(|| CineError::movie_not_found(imdb_id))
    }

    #[instrument(skip(self, payload))]
    pub async fn patch(&self, imdb_id: &str, payload: PatchPayload) -> CineResult<MovieRecord> {
        let patch = MoviePatch::parse(payload)?;
        let key = imdb_id.to_string();
        let movie = self
            .with_store(move |store| store.patch(&key, &patch))
            .await?
            .ok_or_else(|| CineError::movie_not_found(imdb_id))?;
        counter!(MOVIES_WRITTEN, 1, "op" => "patch");
        self.telemetry.publish(TelemetryEvent::MoviePatched {
            imdb_id: imdb_id.to_string(),
            timestamp: Utc::now(),
        });
        Ok(movie.into_record())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, imdb_id: &str) -> CineResult<MovieRecord> {
        let key = imdb_id.to_string();
        let movie = self
            .with_store(move |store| store.delete(&key))
            .await?
            .ok_or_else(|| CineError::movie_not_found(imdb_id))?;
        counter!(MOVIES_WRITTEN, 1, "op" => "delete");
        info!(imdb_id, "movie deleted");
        self.telemetry.publish(TelemetryEvent::MovieDeleted {
            imdb_id: imdb_id.to_string(),
            timestamp: Utc::now(),
        });
        Ok(movie.into_record())
    }
}
