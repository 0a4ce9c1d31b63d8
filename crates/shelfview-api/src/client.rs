//! Async HTTP client for the library server's REST API

use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::protocol::{
    Collection, Library, Model, ModelFile, ScanResponse, SetPreviewRequest, Tag,
};

/// Thin request/response client. Any non-2xx status is an error.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    /// Create a client rooted at `base` (e.g. `http://host:3000/api`)
    pub fn new(base: impl Into<String>) -> Self {
        Self::with_http(reqwest::Client::new(), base)
    }

    /// Create a client sharing an existing connection pool
    pub fn with_http(http: reqwest::Client, base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self { http, base }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Absolute URL of an endpoint path such as `/models/3`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// URL the raw bytes of a file are served from
    pub fn download_url(&self, file_id: i64) -> String {
        self.url(&format!("/files/{}/download", file_id))
    }

    pub async fn models(&self) -> Result<Vec<Model>, ApiError> {
        self.get_list("/models").await
    }

    pub async fn model(&self, id: i64) -> Result<Model, ApiError> {
        self.get_json(&format!("/models/{}", id)).await
    }

    pub async fn model_files(&self, id: i64) -> Result<Vec<ModelFile>, ApiError> {
        self.get_list(&format!("/models/{}/files", id)).await
    }

    pub async fn file(&self, id: i64) -> Result<ModelFile, ApiError> {
        self.get_json(&format!("/files/{}", id)).await
    }

    pub async fn libraries(&self) -> Result<Vec<Library>, ApiError> {
        self.get_list("/libraries").await
    }

    pub async fn collections(&self) -> Result<Vec<Collection>, ApiError> {
        self.get_list("/collections").await
    }

    pub async fn tags(&self) -> Result<Vec<Tag>, ApiError> {
        self.get_list("/tags").await
    }

    /// Make `file_id` the preview file of `model_id`
    pub async fn set_model_preview(&self, model_id: i64, file_id: i64) -> Result<(), ApiError> {
        let path = format!("/models/{}/preview", model_id);
        let response = self
            .http
            .post(self.url(&path))
            .json(&SetPreviewRequest { file_id })
            .send()
            .await?;
        check_status(&path, response.status())?;
        Ok(())
    }

    /// Queue a rescan of a library on the server
    pub async fn scan_library(&self, id: i64) -> Result<ScanResponse, ApiError> {
        let path = format!("/libraries/{}/scan", id);
        let response = self.http.post(self.url(&path)).send().await?;
        check_status(&path, response.status())?;
        Ok(response.json().await?)
    }

    /// Fetch the raw bytes of a file
    pub async fn download(&self, file_id: i64) -> Result<Vec<u8>, ApiError> {
        let path = format!("/files/{}/download", file_id);
        let response = self.http.get(self.url(&path)).send().await?;
        check_status(&path, response.status())?;
        let bytes = response.bytes().await?;
        log::debug!("Downloaded file {} ({} bytes)", file_id, bytes.len());
        Ok(bytes.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.http.get(self.url(path)).send().await?;
        check_status(path, response.status())?;
        Ok(response.json().await?)
    }

    /// The server encodes empty lists as `null`
    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let items: Option<Vec<T>> = self.get_json(path).await?;
        Ok(items.unwrap_or_default())
    }
}

fn check_status(path: &str, status: reqwest::StatusCode) -> Result<(), ApiError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(ApiError::Status {
            endpoint: path.to_string(),
            status: status.as_u16(),
        })
    }
}
