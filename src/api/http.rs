use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

use super::{apply_database_update, DatabaseUpdate, DownloadStream, ProjectApi, ProjectRef};
use crate::catalog::cache::{CachedModel, CachedModelList};
use crate::config::Config;
use crate::download::{DownloadEvent, DownloadRequest};
use crate::error::ApiError;
use crate::project::{Database, PreviewRequest, PreviewResponse, ProjectConfig, ProjectEnvelope};

#[derive(Deserialize)]
struct CreatedDatabase {
    database: Database,
}

/// `reqwest` implementation of [`ProjectApi`] against the designer server.
pub struct HttpApi {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::Rejected(format!("Invalid server URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Rejected(format!("Invalid server URL '{base_url}'")));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            timeout,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ApiError> {
        Self::new(&cfg.server_url, cfg.request_timeout())
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn project_endpoint(&self, project: &ProjectRef, rest: &[&str]) -> Url {
        let mut segments = vec!["v1", "projects", project.namespace.as_str(), project.project.as_str()];
        segments.extend_from_slice(rest);
        self.endpoint(&segments)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(ApiError::Status { status, body })
    }
}

#[async_trait]
impl ProjectApi for HttpApi {
    async fn get_project(&self, project: &ProjectRef) -> Result<ProjectConfig, ApiError> {
        let resp = self
            .client
            .get(self.project_endpoint(project, &[]))
            .timeout(self.timeout)
            .send()
            .await?;
        let envelope: ProjectEnvelope = Self::check(resp).await?.json().await?;
        tracing::debug!("Fetched project {project}");
        Ok(envelope.project.config)
    }

    async fn update_database(
        &self,
        project: &ProjectRef,
        old_name: &str,
        update: &DatabaseUpdate,
        base: &ProjectConfig,
    ) -> Result<ProjectConfig, ApiError> {
        let next = apply_database_update(base, old_name, update)?;
        let resp = self
            .client
            .put(self.project_endpoint(project, &[]))
            .timeout(self.timeout)
            .json(&json!({ "config": next }))
            .send()
            .await?;
        let envelope: ProjectEnvelope = Self::check(resp).await?.json().await?;
        Ok(envelope.project.config)
    }

    async fn create_database(&self, project: &ProjectRef, database: &Database) -> Result<Database, ApiError> {
        let resp = self
            .client
            .post(self.project_endpoint(project, &["rag", "databases"]))
            .timeout(self.timeout)
            .json(database)
            .send()
            .await?;
        let created: CreatedDatabase = Self::check(resp).await?.json().await?;
        Ok(created.database)
    }

    async fn delete_database(
        &self,
        project: &ProjectRef,
        name: &str,
        reassign_to: Option<&str>,
    ) -> Result<(), ApiError> {
        let mut url = self.project_endpoint(project, &["rag", "databases", name]);
        if let Some(target) = reassign_to {
            url.query_pairs_mut().append_pair("reassign_to", target);
        }
        let resp = self.client.delete(url).timeout(self.timeout).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn cached_models(&self) -> Result<Vec<CachedModel>, ApiError> {
        let resp = self
            .client
            .get(self.endpoint(&["v1", "models", "cache"]))
            .timeout(self.timeout)
            .send()
            .await?;
        let list: CachedModelList = Self::check(resp).await?.json().await?;
        Ok(list.data)
    }

    /// Streams server-sent download events. No request timeout: large models take
    /// longer than any sensible limit.
    async fn download_model(&self, request: &DownloadRequest) -> Result<DownloadStream, ApiError> {
        let resp = self
            .client
            .post(self.endpoint(&["v1", "models", "download"]))
            .json(request)
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        let mut body = Box::pin(resp.bytes_stream());

        let stream = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) => buffer.extend_from_slice(&bytes),
                    Err(e) => {
                        yield Err(ApiError::Transport(e));
                        return;
                    }
                }
                while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    if let Some(event) = parse_frame(&String::from_utf8_lossy(&line)) {
                        yield event;
                    }
                }
            }
            if let Some(event) = parse_frame(&String::from_utf8_lossy(&buffer)) {
                yield event;
            }
        };
        Ok(Box::pin(stream))
    }

    async fn preview(
        &self,
        project: &ProjectRef,
        database: &str,
        request: &PreviewRequest,
    ) -> Result<PreviewResponse, ApiError> {
        let resp = self
            .client
            .post(self.project_endpoint(project, &["rag", "databases", database, "preview"]))
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }
}

/// Parses one line of the download stream. Accepts SSE `data:` lines and bare JSON
/// lines; comments, `event:` lines and blanks yield nothing.
pub fn parse_frame(line: &str) -> Option<Result<DownloadEvent, ApiError>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') || line.starts_with("event:") || line.starts_with("id:") {
        return None;
    }
    let payload = line.strip_prefix("data:").map(str::trim).unwrap_or(line);
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    Some(serde_json::from_str(payload).map_err(ApiError::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame() {
        let progress = parse_frame(r#"data: {"event":"progress","downloaded":10,"total":100}"#)
            .unwrap()
            .unwrap();
        assert_eq!(progress, DownloadEvent::Progress { downloaded: 10, total: 100 });

        let done = parse_frame(r#"{"event":"done"}"#).unwrap().unwrap();
        assert_eq!(done, DownloadEvent::Done);

        assert!(parse_frame("").is_none());
        assert!(parse_frame(": keep-alive").is_none());
        assert!(parse_frame("event: message").is_none());
        assert!(parse_frame("data: not json").unwrap().is_err());
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let api = HttpApi::new("http://localhost:8000/api/", Duration::from_secs(5)).unwrap();
        let url = api.project_endpoint(&ProjectRef::new("team a", "docs"), &["rag", "databases"]);
        assert_eq!(url.as_str(), "http://localhost:8000/api/v1/projects/team%20a/docs/rag/databases");
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(HttpApi::new("not a url", Duration::from_secs(5)).is_err());
    }
}
