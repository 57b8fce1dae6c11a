use std::{collections::BTreeMap, fs, path::Path, sync::Arc};

use chrono::Utc;
use heed::{
    types::{SerdeJson, Str},
    Database, Env, EnvOpenOptions,
};
use parking_lot::RwLock;
use tracing::info;
use validator::Validate;

use crate::{
    annotations::MoviePatch,
    config::StorageConfig,
    error::{CineError, CineResult},
    record::{MovieRecord, StoredMovie},
};

const MOVIE_DB: &str = "movies";

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub movie: StoredMovie,
    pub created: bool,
}

pub trait MovieStore: Send + Sync {
    fn backend(&self) -> &'static str;
    fn find(&self, imdb_id: &str) -> CineResult<Option<StoredMovie>>;
    fn list(&self) -> CineResult<Vec<StoredMovie>>;
    /// Inserts, or replaces the whole document when the id already exists.
    fn upsert(&self, record: MovieRecord) -> CineResult<UpsertOutcome>;
    fn patch(&self, imdb_id: &str, patch: &MoviePatch) -> CineResult<Option<StoredMovie>>;
    fn delete(&self, imdb_id: &str) -> CineResult<Option<StoredMovie>>;
    fn close(&self) -> CineResult<()> {
        Ok(())
    }
}

pub fn open_store(config: &StorageConfig) -> CineResult<Arc<dyn MovieStore>> {
    let url = config
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| {
            CineError::Configuration("storage connection string is not configured".into())
        })?;
    let store: Arc<dyn MovieStore> = match url.split_once("://") {
        Some(("memory", _)) => Arc::new(MemoryStore::new()),
        Some(("lmdb", path)) => Arc::new(LmdbStore::open(Path::new(path), config.map_size_mb)?),
        Some((scheme, _)) => {
            return Err(CineError::Configuration(format!(
                "unsupported storage scheme `{scheme}`"
            )))
        }
        None => Arc::new(LmdbStore::open(Path::new(url), config.map_size_mb)?),
    };
    info!(backend = store.backend(), "storage connected");
    Ok(store)
}

fn replace(existing: Option<StoredMovie>, record: MovieRecord) -> CineResult<UpsertOutcome> {
    record.validate()?;
    Ok(match existing {
        Some(previous) => UpsertOutcome {
            movie: StoredMovie {
                record,
                created_at: previous.created_at,
                updated_at: Utc::now(),
            },
            created: false,
        },
        None => UpsertOutcome {
            movie: StoredMovie::new(record),
            created: true,
        },
    })
}

fn patched(mut movie: StoredMovie, patch: &MoviePatch) -> StoredMovie {
    movie.record.apply_patch(patch);
    movie.updated_at = Utc::now();
    movie
}

/// LMDB-backed store. Documents are JSON encoded, iteration is in key order.
#[derive(Clone)]
pub struct LmdbStore {
    env: Arc<Env>,
    movie_db: Database<Str, SerdeJson<StoredMovie>>,
}

impl LmdbStore {
    pub fn open(path: &Path, map_size_mb: usize) -> CineResult<Self> {
        fs::create_dir_all(path).map_err(|err| CineError::Storage(err.to_string()))?;
        // SAFETY: the environment directory is owned by this process and
        // opened once per path.
        let env = unsafe {
            EnvOpenOptions::new()
                .max_dbs(4)
                .map_size(map_size_mb.max(1) * 1024 * 1024)
                .open(path)?
        };
        let mut txn = env.write_txn()?;
        let movie_db = env.create_database(&mut txn, Some(MOVIE_DB))?;
        txn.commit()?;
        Ok(Self {
            env: Arc::new(env),
            movie_db,
        })
    }
}

impl MovieStore for LmdbStore {
    fn backend(&self) -> &'static str {
        "lmdb"
    }

    fn find(&self, imdb_id: &str) -> CineResult<Option<StoredMovie>> {
        let txn = self.env.read_txn()?;
        Ok(self.movie_db.get(&txn, imdb_id)?)
    }

    fn list(&self) -> CineResult<Vec<StoredMovie>> {
        let txn = self.env.read_txn()?;
        let mut result = Vec::new();
        for item in self.movie_db.iter(&txn)? {
            let (_, movie) = item?;
            result.push(movie);
        }
        Ok(result)
    }

    fn upsert(&self, record: MovieRecord) -> CineResult<UpsertOutcome> {
        let mut txn = self.env.write_txn()?;
        let existing = self.movie_db.get(&txn, &record.imdb_id)?;
        let outcome = replace(existing, record)?;
        self.movie_db
            .put(&mut txn, outcome.movie.imdb_id(), &outcome.movie)?;
        txn.commit()?;
        Ok(outcome)
    }

    fn patch(&self, imdb_id: &str, patch: &MoviePatch) -> CineResult<Option<StoredMovie>> {
        let mut txn = self.env.write_txn()?;
        let Some(existing) = self.movie_db.get(&txn, imdb_id)? else {
            return Ok(None);
        };
        if patch.is_empty() {
            return Ok(Some(existing));
        }
        let movie = patched(existing, patch);
        self.movie_db.put(&mut txn, imdb_id, &movie)?;
        txn.commit()?;
        Ok(Some(movie))
    }

    fn delete(&self, imdb_id: &str) -> CineResult<Option<StoredMovie>> {
        let mut txn = self.env.write_txn()?;
        let existing = self.movie_db.get(&txn, imdb_id)?;
        if existing.is_some() {
            self.movie_db.delete(&mut txn, imdb_id)?;
            txn.commit()?;
        }
        Ok(existing)
    }

    fn close(&self) -> CineResult<()> {
        self.env.force_sync()?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    movies: RwLock<BTreeMap<String, StoredMovie>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MovieStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn find(&self, imdb_id: &str) -> CineResult<Option<StoredMovie>> {
        Ok(self.movies.read().get(imdb_id).cloned())
    }

    fn list(&self) -> CineResult<Vec<StoredMovie>> {
        Ok(self.movies.read().values().cloned().collect())
    }

    fn upsert(&self, record: MovieRecord) -> CineResult<UpsertOutcome> {
        let mut movies = self.movies.write();
        let outcome = replace(movies.get(&record.imdb_id).cloned(), record)?;
        movies.insert(outcome.movie.imdb_id().to_string(), outcome.movie.clone());
        Ok(outcome)
    }

    fn patch(&self, imdb_id: &str, patch: &MoviePatch) -> CineResult<Option<StoredMovie>> {
        let mut movies = self.movies.write();
        let Some(existing) = movies.get(imdb_id).cloned() else {
            return Ok(None);
        };
        if patch.is_empty() {
            return Ok(Some(existing));
        }
        let movie = patched(existing, patch);
        movies.insert(imdb_id.to_string(), movie.clone());
        Ok(Some(movie))
    }

    fn delete(&self, imdb_id: &str) -> CineResult<Option<StoredMovie>> {
        Ok(self.movies.write().remove(imdb_id))
    }
}
