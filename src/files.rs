use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::StatusError;

#[async_trait]
pub trait FileLoader: Send + Sync {
    /// Resolves a user-supplied target to a filesystem path.
    fn resolve_path(&self, target: &str) -> PathBuf;

    /// `Some(true)` for a directory, `Some(false)` for a file, `None` when
    /// nothing exists at `path`.
    async fn is_directory(&self, path: &Path) -> Option<bool>;

    async fn list_directory(&self, path: &Path) -> Result<Vec<String>, StatusError>;

    /// Reads a local path or fetches an http(s) URL.
    async fn fetch_file_contents(&self, location: &str) -> Result<String, StatusError>;

    /// Identity of a directory for cycle detection.
    async fn canonical_path(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

pub fn is_url(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

/// Splits a multi-document YAML blob, skipping empty documents.
pub fn parse_yaml_documents(text: &str) -> Result<Vec<Value>, StatusError> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document)
            .map_err(|err| StatusError::InvalidDocument(err.to_string()))?;
        if !value.is_null() {
            documents.push(value);
        }
    }
    Ok(documents)
}

/// Loader backed by the local filesystem and an HTTP client.
pub struct LocalFiles {
    /// Always absolute, so resolving an already resolved path is a no-op.
    base_dir: PathBuf,
    http: reqwest::Client,
}

impl LocalFiles {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            base_dir: std::path::absolute(&base_dir).unwrap_or(base_dir),
            http: reqwest::Client::new(),
        }
    }
}

fn load_error(location: &str, err: impl std::fmt::Display) -> StatusError {
    StatusError::Load {
        location: location.to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl FileLoader for LocalFiles {
    fn resolve_path(&self, target: &str) -> PathBuf {
        let path = Path::new(target);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    async fn is_directory(&self, path: &Path) -> Option<bool> {
        tokio::fs::metadata(path)
            .await
            .ok()
            .map(|metadata| metadata.is_dir())
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<String>, StatusError> {
        let location = path.display().to_string();
        let mut entries = tokio::fs::read_dir(path)
            .await
            .map_err(|err| load_error(&location, err))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| load_error(&location, err))?
        {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn fetch_file_contents(&self, location: &str) -> Result<String, StatusError> {
        if is_url(location) {
            let response = self
                .http
                .get(location)
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|err| load_error(location, err))?;
            return response.text().await.map_err(|err| load_error(location, err));
        }

        tokio::fs::read_to_string(self.resolve_path(location))
            .await
            .map_err(|err| load_error(location, err))
    }

    async fn canonical_path(&self, path: &Path) -> PathBuf {
        tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
