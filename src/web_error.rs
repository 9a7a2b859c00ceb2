use actix_web::{
    error::BlockingError,
    http::{header::ContentType, StatusCode},
    HttpResponse, ResponseError,
};

use pdbcharges_web::{
    bundle::BundleError,
    charges::ParseError,
    code::{CodeError, StructureCode},
    fetcher::CacheError,
};

use crate::pages::{self, Notice};

/// Failure of a request handler, rendered as an HTML page.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid PDB ID: {0}")]
    InvalidCode(#[from] CodeError),
    #[error("no results for structure `{0}`")]
    NotFound(StructureCode),
    #[error("result file `{0}` is not available")]
    ArtifactMissing(String),
    #[error("failed to read charges: {0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Internal(String),
}

impl From<CacheError> for AppError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::NotFound(code) => Self::NotFound(code),
            CacheError::Io(e) => Self::Internal(format!("result cache: {e}")),
        }
    }
}

impl From<BundleError> for AppError {
    fn from(e: BundleError) -> Self {
        match e {
            BundleError::ArtifactMissing(name) => Self::ArtifactMissing(name),
            BundleError::Parse(e) => Self::Parse(e),
            e => Self::Internal(format!("bundling results: {e}")),
        }
    }
}

impl From<BlockingError> for AppError {
    fn from(e: BlockingError) -> Self {
        Self::Internal(format!("blocking task: {e}"))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCode(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) | Self::ArtifactMissing(_) => StatusCode::NOT_FOUND,
            Self::Parse(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            Self::InvalidCode(_) => pages::index(Some(Notice::Message(&self.to_string()))),
            Self::NotFound(code) => pages::no_results(code),
            Self::ArtifactMissing(name) => {
                log::debug!("Requested artifact {name} is missing");
                pages::not_found()
            }
            Self::Parse(_) | Self::Internal(_) => {
                log::error!("{self}");
                pages::internal_error()
            }
        };
        HttpResponse::build(self.status_code())
            .content_type(ContentType::html())
            .body(body)
    }
}
