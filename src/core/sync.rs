use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::SyncConfig;
use crate::error::Error;

/// Remote snapshot push. Version conflicts against the remote store are the
/// collaborator's problem, not the dispatch engine's.
#[async_trait]
pub trait StateSync: Send + Sync {
    async fn push(&self, snapshot: &str, message: &str) -> Result<(), Error>;
}

#[derive(Deserialize)]
struct ContentMeta {
    sha: String,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

/// Pushes the store snapshot through the GitHub Contents API: read the
/// current blob SHA on the branch, then conditionally PUT the new content.
pub struct GitHubSync {
    client: Client,
    token: String,
    repo: String,
    branch: String,
    file_name: String,
}

impl GitHubSync {
    pub fn new(cfg: &SyncConfig, file_name: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: cfg.token.clone(),
            repo: cfg.repo.clone(),
            branch: cfg.branch.clone(),
            file_name: file_name.into(),
        }
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", "autopitch")
    }
}

#[async_trait]
impl StateSync for GitHubSync {
    async fn push(&self, snapshot: &str, message: &str) -> Result<(), Error> {
        let url = format!(
            "https://api.github.com/repos/{}/contents/{}",
            self.repo, self.file_name
        );

        // The Contents API rejects updates without the current SHA; a 404
        // means the file does not exist yet and the PUT creates it.
        let res = self
            .request(self.client.get(&url))
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await
            .map_err(|e| Error::Sync(e.to_string()))?;
        let sha = match res.status().as_u16() {
            200 => {
                let meta: ContentMeta = res
                    .json()
                    .await
                    .map_err(|e| Error::Sync(format!("sha lookup: {e}")))?;
                Some(meta.sha)
            }
            404 => None,
            status => return Err(Error::Sync(format!("sha lookup: HTTP {status}"))),
        };

        let payload = UpdateRequest {
            message,
            content: BASE64.encode(snapshot),
            branch: &self.branch,
            sha,
        };
        let res = self
            .request(self.client.put(&url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Sync(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(Error::Sync(format!(
                "push failed: HTTP {status}: {}",
                error_detail(&body)
            )));
        }
        info!(repo = %self.repo, branch = %self.branch, file = %self.file_name, "snapshot pushed");
        Ok(())
    }
}

/// GitHub error bodies are JSON with a human-readable `message`; fall back
/// to the raw body when the shape is anything else.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message")?.as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}
