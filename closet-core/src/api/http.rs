use std::marker::PhantomData;
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::{ApiError, EntityApi};
use crate::models::SyncEntity;
use crate::sync::{ConnectivityProbe, NetworkState, ProbeError};

/// Shared HTTP connection settings for every collection on one server.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Fatal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.filter(|key| !key.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds an HTTP URL for a given path. A base URL without a scheme is
    /// assumed to be plain http.
    fn build_url(&self, path: &str) -> String {
        let base_url = if !self.base_url.starts_with("http://")
            && !self.base_url.starts_with("https://")
        {
            format!("http://{}", self.base_url)
        } else {
            self.base_url.clone()
        };

        format!("{}{}", base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.client.request(method, self.build_url(path));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(transport_error)?;
        check_status(response).await
    }
}

fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_builder() {
        ApiError::Fatal(e.to_string())
    } else {
        ApiError::Retryable(e.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, &body))
}

/// Server errors, request timeouts and rate limiting are worth retrying;
/// any other rejection is permanent.
fn classify_status(status: StatusCode, body: &str) -> ApiError {
    let body = body.trim();
    let msg = if body.is_empty() {
        format!("Server returned status {}", status)
    } else {
        format!("Server returned status {}: {}", status, body)
    };

    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        ApiError::Retryable(msg)
    } else {
        ApiError::Fatal(msg)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response
        .json()
        .await
        .map_err(|e| ApiError::Fatal(format!("Invalid response body: {}", e)))
}

/// JSON-over-HTTP client for the collection of `E`.
pub struct HttpEntityApi<E> {
    client: ApiClient,
    _entity: PhantomData<fn() -> E>,
}

impl<E: SyncEntity> HttpEntityApi<E> {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            _entity: PhantomData,
        }
    }

    fn collection_path() -> String {
        format!("/{}", E::COLLECTION)
    }

    fn entity_path(id: &str) -> String {
        format!("/{}/{}", E::COLLECTION, urlencoding::encode(id))
    }
}

impl<E: SyncEntity> EntityApi<E> for HttpEntityApi<E> {
    fn create<'a>(&'a self, input: &'a E::Input) -> BoxFuture<'a, Result<E, ApiError>> {
        Box::pin(async move {
            let request = self
                .client
                .request(Method::POST, &Self::collection_path())
                .json(input);
            decode(self.client.send(request).await?).await
        })
    }

    fn update<'a>(
        &'a self,
        id: &'a str,
        changes: &'a E::Changes,
    ) -> BoxFuture<'a, Result<E, ApiError>> {
        Box::pin(async move {
            let request = self
                .client
                .request(Method::PATCH, &Self::entity_path(id))
                .json(changes);
            decode(self.client.send(request).await?).await
        })
    }

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            let response = self
                .client
                .request(Method::DELETE, &Self::entity_path(id))
                .send()
                .await
                .map_err(transport_error)?;

            if response.status() == StatusCode::NOT_FOUND {
                tracing::debug!("{} {} already deleted on server", E::ENTITY_TYPE, id);
                return Ok(());
            }
            check_status(response).await.map(|_| ())
        })
    }

    fn list<'a>(&'a self, owner_id: &'a str) -> BoxFuture<'a, Result<Vec<E>, ApiError>> {
        Box::pin(async move {
            let path = format!(
                "{}?owner_id={}",
                Self::collection_path(),
                urlencoding::encode(owner_id)
            );
            let request = self.client.request(Method::GET, &path);
            decode(self.client.send(request).await?).await
        })
    }
}

/// Reachability probe that asks the entity server's `/health` endpoint.
///
/// Any HTTP response counts as reachable; only transport failures report the
/// server as unreachable.
pub struct HttpProbe {
    client: ApiClient,
}

impl HttpProbe {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl ConnectivityProbe for HttpProbe {
    fn probe(&self) -> BoxFuture<'_, Result<NetworkState, ProbeError>> {
        Box::pin(async move {
            match self.client.request(Method::GET, "/health").send().await {
                Ok(_) => Ok(NetworkState::online()),
                Err(e) if e.is_builder() => Err(ProbeError::Unavailable(e.to_string())),
                Err(e) => {
                    tracing::debug!("Health check failed: {}", e);
                    Ok(NetworkState {
                        is_connected: true,
                        is_internet_reachable: Some(false),
                    })
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, Outfit};

    fn client(base_url: &str) -> ApiClient {
        ApiClient::new(base_url, None, Duration::from_millis(500)).unwrap()
    }

    #[test]
    fn test_build_url() {
        assert_eq!(
            client("http://localhost:8080").build_url("/items"),
            "http://localhost:8080/items"
        );
        assert_eq!(
            client("https://closet.example.com/").build_url("/health"),
            "https://closet.example.com/health"
        );
        assert_eq!(
            client("localhost:8080").build_url("/outfits"),
            "http://localhost:8080/outfits"
        );
    }

    #[test]
    fn test_entity_paths() {
        assert_eq!(HttpEntityApi::<Item>::collection_path(), "/items");
        assert_eq!(HttpEntityApi::<Outfit>::entity_path("a b/c"), "/outfits/a%20b%2Fc");
    }

    #[test]
    fn test_empty_api_key_is_ignored() {
        let client = ApiClient::new("localhost", Some(String::new()), Duration::from_secs(1)).unwrap();
        assert!(client.api_key.is_none());
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, ""),
            ApiError::Retryable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, ""),
            ApiError::Retryable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::Retryable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::REQUEST_TIMEOUT, ""),
            ApiError::Retryable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, ""),
            ApiError::Fatal(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, ""),
            ApiError::Fatal(_)
        ));
    }

    #[test]
    fn test_classify_status_message() {
        let err = classify_status(StatusCode::BAD_REQUEST, " name is required\n");
        assert_eq!(
            err.to_string(),
            "Server returned status 400 Bad Request: name is required"
        );
    }

    #[tokio::test]
    async fn test_probe_unreachable_server_is_offline() {
        let probe = HttpProbe::new(client("http://127.0.0.1:1"));
        let state = probe.probe().await.unwrap();
        assert!(!state.is_online());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_retryable() {
        let api: HttpEntityApi<Item> = HttpEntityApi::new(client("http://127.0.0.1:1"));
        let err = api.list("me").await.unwrap_err();
        assert!(matches!(err, ApiError::Retryable(_)));
    }
}
