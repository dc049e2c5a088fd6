// src/error.rs

use reqwest::StatusCode;
use thiserror::Error;

use crate::model::ProjectKey;

/// Failure of a single DataCatalog fetch. Any page failing aborts the whole fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GET {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GET {url} returned {status}")]
    Status { url: String, status: StatusCode },

    #[error("decoding page body from {url}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid base url")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// More than one CRS row exists for a key that a WB project looks up.
    #[error("ambiguous CRS key {key}: {matches} matching rows")]
    AmbiguousKey { key: ProjectKey, matches: usize },
}
