//! Fetching the raw dataset text.

use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use tracing::debug;

/// Retrieves raw dataset text from a location.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, location: &str) -> PipelineResult<String>;
}

/// Downloads `http://` and `https://` sources.
#[derive(Debug, Clone, Default)]
pub struct HttpSourceFetcher {
    client: Client,
}

impl HttpSourceFetcher {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch(&self, location: &str) -> PipelineResult<String> {
        debug!(url = location, "downloading dataset");
        let fetch_err =
            |reason: String| PipelineError::Fetch { location: location.to_string(), reason };

        let response = self.client.get(location).send().await.map_err(|e| fetch_err(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {}", status.as_u16())));
        }
        response.text().await.map_err(|e| fetch_err(e.to_string()))
    }
}

/// Reads a local path, with or without a `file://` prefix.
#[derive(Debug, Clone, Default)]
pub struct LocalSourceFetcher;

#[async_trait]
impl SourceFetcher for LocalSourceFetcher {
    async fn fetch(&self, location: &str) -> PipelineResult<String> {
        let path = PathBuf::from(location.strip_prefix("file://").unwrap_or(location));
        debug!(path = %path.display(), "reading dataset");
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PipelineError::Fetch { location: location.to_string(), reason: e.to_string() })
    }
}

/// Dispatches on the location scheme: HTTP(S) over the network, anything else from disk.
#[derive(Debug, Clone, Default)]
pub struct DefaultSourceFetcher {
    http: HttpSourceFetcher,
    local: LocalSourceFetcher,
}

impl DefaultSourceFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_remote(location: &str) -> bool {
    let lower = location.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[async_trait]
impl SourceFetcher for DefaultSourceFetcher {
    async fn fetch(&self, location: &str) -> PipelineResult<String> {
        if is_remote(location) {
            self.http.fetch(location).await
        } else {
            self.local.fetch(location).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fetch_local_file_and_file_url() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("german.data");
        std::fs::write(&path, "A11 6 1\n").unwrap();

        let fetcher = DefaultSourceFetcher::new();
        assert_eq!(fetcher.fetch(path.to_str().unwrap()).await.unwrap(), "A11 6 1\n");
        let url = format!("file://{}", path.display());
        assert_eq!(fetcher.fetch(&url).await.unwrap(), "A11 6 1\n");
    }

    #[tokio::test]
    async fn test_fetch_missing_file_is_fetch_error() {
        let err = DefaultSourceFetcher::new().fetch("/definitely/not/here.data").await.unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_fetch_http() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/german.data")
            .with_status(200)
            .with_body("A11 6 1\nA12 48 2\n")
            .create_async()
            .await;

        let url = format!("{}/german.data", server.url());
        let text = DefaultSourceFetcher::new().fetch(&url).await.unwrap();
        assert_eq!(text.lines().count(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_http_error_status() {
        let mut server = Server::new_async().await;
        server.mock("GET", "/gone").with_status(404).create_async().await;

        let url = format!("{}/gone", server.url());
        let err = DefaultSourceFetcher::new().fetch(&url).await.unwrap_err();
        match err {
            PipelineError::Fetch { reason, .. } => assert_eq!(reason, "HTTP 404"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
