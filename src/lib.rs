//! Client of the myanimelist API.
//!
//! Two API generations live side by side: the legacy XML API under
//! `myanimelist.net/api` (Basic auth) and the v2 JSON API (Bearer auth).
//! Both go through the same [`Client`], which builds, sends and decodes
//! every request; the façades returned by [`Client::account`],
//! [`Client::anime`], [`Client::manga`], [`Client::user`] and
//! [`Client::forum`] only compose paths and pick options.

pub mod account;
pub mod anime;
mod client;
mod decode;
pub mod forum;
pub mod manga;
pub mod option;
mod transport;
pub mod user;

pub use client::{
    Client, ClientConfig, ClientConfigBuilder, ClientConfigBuilderError, StaticToken, TokenSource,
    DEFAULT_API_URL, DEFAULT_BASE_URL, DEFAULT_USER_AGENT,
};
pub use decode::DecodeError;
pub use option::*;
pub use tokio_util::sync::CancellationToken;
pub use transport::{BoxError, Request, ReqwestService, Response};

use reqwest::StatusCode;
use serde::Deserialize;

/// Error document of the v2 API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error: String,
}

/// Partially decoded legacy list attached to a soft error.
#[derive(Debug, Clone)]
pub enum LegacyList {
    Anime(anime::AnimeList),
    Manga(manga::MangaList),
}

/// Coarse classification of [`MalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequestConstruction,
    Transport,
    NoContent,
    HttpStatus,
    Api,
    Decode,
    SoftError,
}

#[derive(Debug, thiserror::Error)]
pub enum MalError {
    #[error("invalid url '{url}'")]
    UrlParseError {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid path segment '{0}'")]
    InvalidPathSegment(String),
    #[error("failed to encode request body")]
    EncodeError(#[source] quick_xml::DeError),
    #[error(transparent)]
    HeaderError(#[from] reqwest::header::InvalidHeaderValue),
    #[error("token source failed")]
    TokenError(#[source] BoxError),
    #[error("request failed")]
    RequestError(#[source] BoxError),
    #[error("request cancelled")]
    Cancelled,
    #[error("no content")]
    NoContent(Box<Response>),
    #[error("HTTP {status}: {text}")]
    StatusError {
        status: StatusCode,
        text: String,
        response: Box<Response>,
    },
    #[error("api error '{}': {}", .payload.error, .payload.message)]
    ApiError {
        payload: ErrorPayload,
        response: Box<Response>,
    },
    #[error("failed to decode response body")]
    DeserializeError {
        #[source]
        source: DecodeError,
        response: Box<Response>,
    },
    #[error("{message}")]
    SoftError {
        message: String,
        list: Box<LegacyList>,
        response: Box<Response>,
    },
}

impl MalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UrlParseError { .. }
            | Self::InvalidPathSegment(_)
            | Self::EncodeError(_)
            | Self::HeaderError(_) => ErrorKind::BadRequestConstruction,
            Self::TokenError(_) | Self::RequestError(_) | Self::Cancelled => ErrorKind::Transport,
            Self::NoContent(_) => ErrorKind::NoContent,
            Self::StatusError { .. } => ErrorKind::HttpStatus,
            Self::ApiError { .. } => ErrorKind::Api,
            Self::DeserializeError { .. } => ErrorKind::Decode,
            Self::SoftError { .. } => ErrorKind::SoftError,
        }
    }

    /// The response the server sent, when one was received.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::NoContent(response)
            | Self::StatusError { response, .. }
            | Self::ApiError { response, .. }
            | Self::DeserializeError { response, .. }
            | Self::SoftError { response, .. } => Some(&**response),
            _ => None,
        }
    }
}
