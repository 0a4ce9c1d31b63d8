//! Where previews and views get their data

use shelfview_api::{ApiClient, Collection, Library, Model, ModelFile, ScanResponse, Tag};

use crate::core::types::Result;

/// The library server's request/response interface.
///
/// Every call suspends only on I/O. Implemented by [`ApiClient`]; tests use
/// in-memory sources.
#[allow(async_fn_in_trait)]
pub trait LibrarySource {
    async fn models(&self) -> Result<Vec<Model>>;
    async fn model(&self, id: i64) -> Result<Model>;
    async fn model_files(&self, id: i64) -> Result<Vec<ModelFile>>;
    async fn file(&self, id: i64) -> Result<ModelFile>;
    async fn libraries(&self) -> Result<Vec<Library>>;
    async fn collections(&self) -> Result<Vec<Collection>>;
    async fn tags(&self) -> Result<Vec<Tag>>;
    async fn set_model_preview(&self, model_id: i64, file_id: i64) -> Result<()>;
    async fn scan_library(&self, id: i64) -> Result<ScanResponse>;
    async fn download(&self, file_id: i64) -> Result<Vec<u8>>;

    /// Public URL of a file's bytes
    fn download_url(&self, file_id: i64) -> String;
}

impl LibrarySource for ApiClient {
    async fn models(&self) -> Result<Vec<Model>> {
        Ok(ApiClient::models(self).await?)
    }

    async fn model(&self, id: i64) -> Result<Model> {
        Ok(ApiClient::model(self, id).await?)
    }

    async fn model_files(&self, id: i64) -> Result<Vec<ModelFile>> {
        Ok(ApiClient::model_files(self, id).await?)
    }

    async fn file(&self, id: i64) -> Result<ModelFile> {
        Ok(ApiClient::file(self, id).await?)
    }

    async fn libraries(&self) -> Result<Vec<Library>> {
        Ok(ApiClient::libraries(self).await?)
    }

    async fn collections(&self) -> Result<Vec<Collection>> {
        Ok(ApiClient::collections(self).await?)
    }

    async fn tags(&self) -> Result<Vec<Tag>> {
        Ok(ApiClient::tags(self).await?)
    }

    async fn set_model_preview(&self, model_id: i64, file_id: i64) -> Result<()> {
        Ok(ApiClient::set_model_preview(self, model_id, file_id).await?)
    }

    async fn scan_library(&self, id: i64) -> Result<ScanResponse> {
        Ok(ApiClient::scan_library(self, id).await?)
    }

    async fn download(&self, file_id: i64) -> Result<Vec<u8>> {
        Ok(ApiClient::download(self, file_id).await?)
    }

    fn download_url(&self, file_id: i64) -> String {
        ApiClient::download_url(self, file_id)
    }
}
