use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::{
    config::CatalogConfig,
    error::{CineError, CineResult},
    record::CatalogMetadata,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogLookup {
    ById(String),
    ByTitle { title: String, year: Option<String> },
}

impl CatalogLookup {
    pub fn by_id(id: Option<String>) -> CineResult<Self> {
        match non_blank(id) {
            Some(id) => Ok(CatalogLookup::ById(id)),
            None => Err(CineError::InvalidRequest("Movie ID is required".into())),
        }
    }

    pub fn by_title(title: Option<String>, year: Option<String>) -> CineResult<Self> {
        match non_blank(title) {
            Some(title) => Ok(CatalogLookup::ByTitle {
                title,
                year: non_blank(year),
            }),
            None => Err(CineError::InvalidRequest("Movie title is required".into())),
        }
    }

    fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        match self {
            CatalogLookup::ById(id) => vec![("i", id.as_str())],
            CatalogLookup::ByTitle { title, year } => {
                let mut pairs = vec![("t", title.as_str())];
                if let Some(year) = year {
                    pairs.push(("y", year.as_str()));
                }
                pairs
            }
        }
    }
}

impl fmt::Display for CatalogLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogLookup::ById(id) => write!(f, "id={id}"),
            CatalogLookup::ByTitle {
                title,
                year: Some(year),
            } => write!(f, "title={title} year={year}"),
            CatalogLookup::ByTitle { title, year: None } => write!(f, "title={title}"),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogMovie {
    pub imdb_id: String,
    pub metadata: CatalogMetadata,
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    fn name(&self) -> &str;
    async fn lookup(&self, lookup: &CatalogLookup) -> CineResult<CatalogMovie>;
}

#[derive(Debug, Deserialize)]
struct OmdbResponse {
    #[serde(rename = "Response", default)]
    response: String,
    #[serde(rename = "Error", default)]
    error: Option<String>,
    #[serde(rename = "imdbID", default)]
    imdb_id: Option<String>,
    #[serde(flatten)]
    metadata: CatalogMetadata,
}

impl OmdbResponse {
    fn into_movie(self) -> CineResult<CatalogMovie> {
        if !self.response.eq_ignore_ascii_case("true") {
            return Err(CineError::NotFound(
                self.error.unwrap_or_else(|| "Movie not found!".to_string()),
            ));
        }
        let imdb_id = non_blank(self.imdb_id).ok_or_else(|| {
            CineError::Upstream("catalog response is missing imdbID".to_string())
        })?;
        Ok(CatalogMovie {
            imdb_id,
            metadata: self.metadata,
        })
    }
}

#[derive(Clone)]
pub struct OmdbClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl OmdbClient {
    pub fn new(config: &CatalogConfig) -> CineResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|err| CineError::Configuration(format!("catalog.base_url: {err}")))?;
        let client = Client::builder()
            .user_agent(concat!("cinevault/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| CineError::Configuration(err.to_string()))?;
        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl CatalogClient for OmdbClient {
    fn name(&self) -> &str {
        "omdb"
    }

    #[instrument(skip(self, lookup), fields(lookup = %lookup))]
    async fn lookup(&self, lookup: &CatalogLookup) -> CineResult<CatalogMovie> {
        let mut request = self.client.get(self.base_url.clone());
        if let Some(key) = &self.api_key {
            request = request.query(&[("apikey", key.as_str())]);
        }
        let response = request
            .query(&lookup.query_pairs())
            .send()
            .await
            .map_err(|err| CineError::Upstream(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CineError::Upstream(format!(
                "catalog request failed with status {status}"
            )));
        }
        let body: OmdbResponse = response
            .json()
            .await
            .map_err(|err| CineError::Upstream(err.to_string()))?;
        debug!(response = %body.response, "catalog responded");
        body.into_movie()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;

    fn matrix_json() -> serde_json::Value {
        json!({
            "Title": "The Matrix",
            "Year": "1999",
            "Rated": "R",
            "Director": "Lana Wachowski, Lilly Wachowski",
            "Ratings": [
                {"Source": "Internet Movie Database", "Value": "8.7/10"},
                {"Source": "Rotten Tomatoes", "Value": "83%"}
            ],
            "Poster": "https://example.invalid/matrix.jpg",
            "Type": "movie",
            "imdbID": "tt0133093",
            "imdbRating": "8.7",
            "Response": "True"
        })
    }

    async fn fake_omdb(
        Query(params): Query<HashMap<String, String>>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        if params.get("apikey").map(String::as_str) != Some("test-key") {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"Response": "False", "Error": "Invalid API key!"})),
            );
        }
        let by_id = params.get("i").map(String::as_str) == Some("tt0133093");
        let by_title = params.get("t").map(String::as_str) == Some("The Matrix")
            && params.get("y").map_or(true, |year| year == "1999");
        if by_id || by_title {
            (StatusCode::OK, Json(matrix_json()))
        } else {
            (
                StatusCode::OK,
                Json(json!({"Response": "False", "Error": "Movie not found!"})),
            )
        }
    }

    async fn spawn_catalog() -> String {
        let app = Router::new().route("/", get(fake_omdb));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn client(base_url: String, api_key: &str) -> OmdbClient {
        OmdbClient::new(&CatalogConfig {
            base_url,
            api_key: Some(api_key.to_string()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn lookup_requires_a_key() {
        assert!(matches!(
            CatalogLookup::by_id(Some("  ".into())),
            Err(CineError::InvalidRequest(_))
        ));
        assert!(matches!(
            CatalogLookup::by_title(None, Some("1999".into())),
            Err(CineError::InvalidRequest(_))
        ));
        assert_eq!(
            CatalogLookup::by_title(Some("Heat".into()), Some("".into())).unwrap(),
            CatalogLookup::ByTitle {
                title: "Heat".into(),
                year: None
            }
        );
    }

    #[test]
    fn drops_fields_outside_the_allow_list() {
        let response: OmdbResponse = serde_json::from_value(matrix_json()).unwrap();
        let movie = response.into_movie().unwrap();
        assert_eq!(movie.imdb_id, "tt0133093");
        assert_eq!(movie.metadata.ratings.len(), 2);
        assert_eq!(movie.metadata.ratings[1].source, "Rotten Tomatoes");

        let value = serde_json::to_value(&movie.metadata).unwrap();
        assert!(value.get("Poster").is_none());
        assert!(value.get("Type").is_none());
        assert_eq!(value["Title"], "The Matrix");
    }

    #[tokio::test]
    async fn looks_up_by_id_and_title() {
        let catalog = client(spawn_catalog().await, "test-key");

        let movie = catalog
            .lookup(&CatalogLookup::ById("tt0133093".into()))
            .await
            .unwrap();
        assert_eq!(movie.metadata.title.as_deref(), Some("The Matrix"));

        let movie = catalog
            .lookup(&CatalogLookup::ByTitle {
                title: "The Matrix".into(),
                year: Some("1999".into()),
            })
            .await
            .unwrap();
        assert_eq!(movie.imdb_id, "tt0133093");
    }

    #[tokio::test]
    async fn catalog_miss_is_not_found() {
        let catalog = client(spawn_catalog().await, "test-key");
        let err = catalog
            .lookup(&CatalogLookup::ById("tt0000000".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, CineError::NotFound(ref msg) if msg == "Movie not found!"));
    }

    #[tokio::test]
    async fn rejected_api_key_is_upstream_failure() {
        let catalog = client(spawn_catalog().await, "wrong-key");
        let err = catalog
            .lookup(&CatalogLookup::ById("tt0133093".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, CineError::Upstream(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
