//! HTTP client for a running pcbuilder daemon.
//!
//! [`PcBuilderClient`] implements [`ComponentCatalog`] and [`BuildPersistence`] over the
//! `/api/v1` routes, so a [`crate::BuildSession`] can run against a remote daemon exactly as
//! it runs against a local store.

use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{
    BuildId, BuildPersistence, BuildRecord, BuilderConfig, Component, ComponentCatalog,
    ComponentId, ComponentPage, CreateBuildRequest, CreateComponentRequest, DataStoreError,
    ListBuildsQuery, ListComponentsQuery, StepGraph, UpdateBuildRequest, UpdateComponentRequest,
};

/// Client for the pcbuilder HTTP API.
#[derive(Debug, Clone)]
pub struct PcBuilderClient {
    client: Client,
    base_url: String,
}

fn transport_error(e: reqwest::Error) -> DataStoreError {
    DataStoreError::IoError(e.to_string())
}

/// Maps an error response onto the store error the daemon started from.
async fn status_error(response: Response) -> DataStoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body = if body.is_empty() {
        "No error details".to_string()
    } else {
        body
    };
    match status {
        StatusCode::NOT_FOUND => DataStoreError::NotFound,
        StatusCode::CONFLICT => DataStoreError::AlreadyExists,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            DataStoreError::InvalidInput(body)
        }
        _ => DataStoreError::Internal(format!("HTTP {}: {}", status.as_u16(), body)),
    }
}

impl PcBuilderClient {
    /// Creates a client for the daemon at `base_url`, e.g. `http://localhost:8080`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The daemon's base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Constructs a full API URL from a path
    pub fn api_url(&self, path: &str) -> String {
        let path = path.strip_prefix('/').unwrap_or(path);
        format!("{}/api/v1/{}", self.base_url, path)
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T, DataStoreError> {
        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| DataStoreError::SerializationError(e.to_string()))
        } else {
            Err(status_error(response).await)
        }
    }

    /// Makes a GET request and handles the response
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, DataStoreError> {
        let response = self
            .client
            .get(self.api_url(path))
            .send()
            .await
            .map_err(transport_error)?;
        self.handle_response(response).await
    }

    /// Makes a GET request with query parameters.
    pub async fn get_with_query<Q, T>(&self, path: &str, query: &Q) -> Result<T, DataStoreError>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .get(self.api_url(path))
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        self.handle_response(response).await
    }

    /// Makes a POST request with a JSON body.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, DataStoreError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.api_url(path))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        self.handle_response(response).await
    }

    /// Makes a PUT request with a JSON body.
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, DataStoreError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .put(self.api_url(path))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        self.handle_response(response).await
    }

    /// Makes a DELETE request; no body is expected back.
    pub async fn delete(&self, path: &str) -> Result<(), DataStoreError> {
        let response = self
            .client
            .delete(self.api_url(path))
            .send()
            .await
            .map_err(transport_error)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(response).await)
        }
    }

    /// Fetches the daemon's configuration.
    pub async fn config(&self) -> Result<BuilderConfig, DataStoreError> {
        self.get("config").await
    }

    /// Fetches the step graph the daemon runs.
    pub async fn steps(&self) -> Result<StepGraph, DataStoreError> {
        self.get("config/steps").await
    }
}

fn found<T>(result: Result<T, DataStoreError>) -> Result<Option<T>, DataStoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(DataStoreError::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

fn deleted(result: Result<(), DataStoreError>) -> Result<bool, DataStoreError> {
    match result {
        Ok(()) => Ok(true),
        Err(DataStoreError::NotFound) => Ok(false),
        Err(e) => Err(e),
    }
}

impl ComponentCatalog for PcBuilderClient {
    async fn list_components(
        &self,
        query: &ListComponentsQuery,
    ) -> Result<ComponentPage, DataStoreError> {
        self.get_with_query("component", query).await
    }

    async fn get_component(&self, id: ComponentId) -> Result<Option<Component>, DataStoreError> {
        found(self.get(&format!("component/{id}")).await)
    }

    async fn create_component(
        &self,
        request: &CreateComponentRequest,
    ) -> Result<Component, DataStoreError> {
        self.post("component", request).await
    }

    async fn update_component(
        &self,
        id: ComponentId,
        request: &UpdateComponentRequest,
    ) -> Result<Component, DataStoreError> {
        self.put(&format!("component/{id}"), request).await
    }

    async fn delete_component(&self, id: ComponentId) -> Result<bool, DataStoreError> {
        deleted(self.delete(&format!("component/{id}")).await)
    }
}

impl BuildPersistence for PcBuilderClient {
    async fn create_build(&self, request: &CreateBuildRequest) -> Result<BuildRecord, DataStoreError> {
        self.post("build", request).await
    }

    async fn update_build(
        &self,
        id: BuildId,
        request: &UpdateBuildRequest,
    ) -> Result<BuildRecord, DataStoreError> {
        self.put(&format!("build/{id}"), request).await
    }

    async fn get_build(&self, id: BuildId) -> Result<Option<BuildRecord>, DataStoreError> {
        found(self.get(&format!("build/{id}")).await)
    }

    async fn list_builds(&self, query: &ListBuildsQuery) -> Result<Vec<BuildRecord>, DataStoreError> {
        self.get_with_query("build", query).await
    }

    async fn delete_build(&self, id: BuildId) -> Result<bool, DataStoreError> {
        deleted(self.delete(&format!("build/{id}")).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_urls() {
        let client = PcBuilderClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(
            client.api_url("/component/7"),
            "http://localhost:8080/api/v1/component/7"
        );
        assert_eq!(client.api_url("build"), "http://localhost:8080/api/v1/build");
    }

    #[test]
    fn not_found_is_absent() {
        assert_eq!(found::<u8>(Err(DataStoreError::NotFound)), Ok(None));
        assert_eq!(deleted(Err(DataStoreError::NotFound)), Ok(false));
        assert_eq!(
            deleted(Err(DataStoreError::IoError("refused".into()))),
            Err(DataStoreError::IoError("refused".into()))
        );
    }

    #[tokio::test]
    async fn unreachable_daemon_is_io_error() {
        let client = PcBuilderClient::new("http://127.0.0.1:9");
        let err = client.get_build(BuildId(1)).await.unwrap_err();
        assert!(matches!(err, DataStoreError::IoError(_)));
    }
}
