use axum::http::StatusCode;
use thiserror::Error;

pub type CineResult<T> = Result<T, CineError>;

#[derive(Debug, Error)]
pub enum CineError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("catalog error: {0}")]
    Upstream(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl CineError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CineError::NotFound(_) => StatusCode::NOT_FOUND,
            CineError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CineError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn movie_not_found(imdb_id: &str) -> Self {
        CineError::NotFound(format!("Movie {imdb_id} not found"))
    }
}

impl From<heed::Error> for CineError {
    fn from(value: heed::Error) -> Self {
        CineError::Storage(value.to_string())
    }
}

impl From<validator::ValidationErrors> for CineError {
    fn from(value: validator::ValidationErrors) -> Self {
        CineError::InvalidRequest(value.to_string())
    }
}
