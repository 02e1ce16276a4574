use std::sync::Arc;

use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::{classify_unauthorized, ApiError, ErrorBody};
use crate::config::ClientConfig;
use crate::session::SessionContext;

/// Authorized HTTP client for the operations backend.
///
/// Every request goes through `send`, which applies the session policy
/// uniformly: no token or a locally-expired token fails before the network,
/// and a recognized 401 clears the session and surfaces `ApiError::Auth`.
pub struct ApiClient {
    base: Url,
    http: reqwest::Client,
    session: Arc<SessionContext>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, session: Arc<SessionContext>) -> Result<Self, ApiError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| ApiError::HttpClient(format!("Invalid base URL {}: {e}", config.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::HttpClient(format!("Invalid base URL {}", config.base_url)));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ApiError::HttpClient(e.to_string()))?;

        Ok(Self { base, http, session })
    }

    /// Route URL under the base path. Each segment is percent-encoded on its
    /// own, so ids containing `/`, `?`, `#` or `%` stay a single segment.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send one authorized request. Non-401 statuses are returned to the
    /// caller untouched.
    pub(crate) async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<reqwest::Response, ApiError> {
        let token = self.session.bearer_token()?;
        let path = url.path().to_string();

        let mut request = self.http.request(method, url).bearer_auth(token.as_str());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                ApiError::Connection(self.base.to_string())
            } else {
                ApiError::HttpClient(e.to_string())
            }
        })?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return match classify_unauthorized(&body) {
                Some(failure) => {
                    tracing::warn!(path, code = failure.code(), "Backend rejected session");
                    self.session.invalidate(failure);
                    Err(ApiError::Auth(failure))
                }
                None => Err(ApiError::Status { status: 401, body }),
            };
        }

        Ok(response)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let response = self.send::<()>(Method::GET, url, None).await?;
        read_json(response).await
    }

    /// GET where 404 means "not there yet" rather than an error.
    pub(crate) async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, ApiError> {
        let response = self.send::<()>(Method::GET, url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        read_json(response).await
    }

    /// Send a user action (create, close, grant, ...).
    ///
    /// A non-auth 4xx is a rejection meant for the user: it becomes
    /// `Domain` with the backend's `error`/`message` text, or `fallback`.
    pub(crate) async fn send_action<B, T>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        fallback: &str,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let path = url.path().to_string();
        let response = self.send(method, url, body).await?;

        let status = response.status();
        if status.is_client_error() {
            let raw = response.text().await.unwrap_or_default();
            let message = ErrorBody::parse(&raw)
                .text()
                .map(str::to_string)
                .unwrap_or_else(|| fallback.to_string());
            tracing::info!(path, status = status.as_u16(), %message, "Action rejected");
            return Err(ApiError::Domain(message));
        }

        read_json(response).await
    }
}

pub(crate) async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| ApiError::ResponseParsing(e.to_string()))
}

/// Single-record endpoints answer with either an object or a one-element
/// array, depending on the route. `Many` is tried first: an all-default
/// record would otherwise accept `[]`.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub(crate) fn into_first(self) -> Option<T> {
        match self {
            Self::One(item) => Some(item),
            Self::Many(items) => items.into_iter().next(),
        }
    }
}
