pub mod annotations;
pub mod catalog;
pub mod config;
pub mod error;
pub mod metrics;
pub mod record;
pub mod server;
pub mod service;
pub mod storage;
pub mod telemetry;

pub use annotations::{MoviePatch, PatchPayload, ScoreInput, UserAnnotations};
pub use catalog::{CatalogClient, CatalogLookup, CatalogMovie, OmdbClient};
pub use config::{CineConfig, LogFormat};
pub use error::{CineError, CineResult};
pub use metrics::MetricsService;
pub use record::{CatalogMetadata, MovieRecord, Rating, StoredMovie};
pub use server::{build_router, ApiState, CineServer};
pub use service::{ByIdPayload, ByTitlePayload, MovieService};
pub use storage::{open_store, LmdbStore, MemoryStore, MovieStore, UpsertOutcome};
pub use telemetry::{ActivitySummary, TelemetryEvent, TelemetryHub};
