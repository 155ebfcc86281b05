//! `SessionArchive` over the GitHub repository contents API.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use beacon_core::{
    config::ArchiveConfig,
    error::BeaconError,
    traits::{ArchiveEntry, SessionArchive},
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const API_BASE: &str = "https://api.github.com";

/// Credential files stored in a directory of a GitHub repository.
pub struct GithubArchive {
    http: reqwest::Client,
    api_base: String,
    owner: String,
    repo: String,
    token: String,
    path: String,
    branch: String,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    name: String,
    sha: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ContentFile {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

impl GithubArchive {
    /// Build from config. Returns `None` when no token is configured, which
    /// disables archiving entirely.
    pub fn from_config(config: &ArchiveConfig, http: reqwest::Client) -> Option<Self> {
        if !config.is_enabled() {
            return None;
        }
        Some(Self {
            http,
            api_base: API_BASE.to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            token: config.token.clone(),
            path: config.path.trim_matches('/').to_string(),
            branch: config.branch.clone(),
        })
    }

    fn dir_url(&self) -> String {
        contents_url(&self.api_base, &self.owner, &self.repo, &self.path, None)
    }

    fn file_url(&self, name: &str) -> String {
        contents_url(&self.api_base, &self.owner, &self.repo, &self.path, Some(name))
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(reqwest::header::USER_AGENT, "beacon")
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<reqwest::Response, BeaconError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| BeaconError::TransientNetwork(format!("github {what}: {e}")))?;
        Ok(resp)
    }
}

/// `{api}/repos/{owner}/{repo}/contents/{path}[/{name}]`.
fn contents_url(api: &str, owner: &str, repo: &str, path: &str, name: Option<&str>) -> String {
    let mut url = format!("{api}/repos/{owner}/{repo}/contents");
    if !path.is_empty() {
        url.push('/');
        url.push_str(path);
    }
    if let Some(name) = name {
        url.push('/');
        url.push_str(name);
    }
    url
}

/// GitHub wraps base64 content at 60 columns.
fn decode_content(file: &ContentFile) -> Result<Vec<u8>, BeaconError> {
    if !file.encoding.is_empty() && file.encoding != "base64" {
        return Err(BeaconError::Archive(format!(
            "unsupported content encoding '{}'",
            file.encoding
        )));
    }
    let compact: String = file.content.split_whitespace().collect();
    STANDARD
        .decode(compact)
        .map_err(|e| BeaconError::Archive(format!("invalid base64 content: {e}")))
}

async fn status_error(resp: reqwest::Response, what: &str) -> BeaconError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        BeaconError::TransientNetwork(format!("github {what} returned {status}: {body}"))
    } else {
        BeaconError::Archive(format!("github {what} returned {status}: {body}"))
    }
}

#[async_trait]
impl SessionArchive for GithubArchive {
    async fn list(&self) -> Result<Vec<ArchiveEntry>, BeaconError> {
        let builder = self
            .request(reqwest::Method::GET, &self.dir_url())
            .query(&[("ref", self.branch.as_str())]);
        let resp = self.send(builder, "list").await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("archive directory {} does not exist yet", self.path);
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            return Err(status_error(resp, "list").await);
        }

        let items: Vec<ContentItem> = resp
            .json()
            .await
            .map_err(|e| BeaconError::Archive(format!("github list parse: {e}")))?;
        Ok(items
            .into_iter()
            .filter(|item| item.kind == "file")
            .map(|item| ArchiveEntry {
                name: item.name,
                sha: item.sha,
            })
            .collect())
    }

    async fn fetch(&self, entry: &ArchiveEntry) -> Result<Vec<u8>, BeaconError> {
        let builder = self
            .request(reqwest::Method::GET, &self.file_url(&entry.name))
            .query(&[("ref", self.branch.as_str())]);
        let resp = self.send(builder, "fetch").await?;
        if !resp.status().is_success() {
            return Err(status_error(resp, "fetch").await);
        }

        let file: ContentFile = resp
            .json()
            .await
            .map_err(|e| BeaconError::Archive(format!("github fetch parse: {e}")))?;
        decode_content(&file)
    }

    async fn upload(&self, name: &str, content: &[u8]) -> Result<(), BeaconError> {
        let body = json!({
            "message": format!("Add {name}"),
            "content": STANDARD.encode(content),
            "branch": self.branch,
        });
        let builder = self
            .request(reqwest::Method::PUT, &self.file_url(name))
            .json(&body);
        let resp = self.send(builder, "upload").await?;
        if !resp.status().is_success() {
            return Err(status_error(resp, "upload").await);
        }
        Ok(())
    }

    async fn delete(&self, entry: &ArchiveEntry) -> Result<(), BeaconError> {
        let body = json!({
            "message": format!("Delete {}", entry.name),
            "sha": entry.sha,
            "branch": self.branch,
        });
        let builder = self
            .request(reqwest::Method::DELETE, &self.file_url(&entry.name))
            .json(&body);
        let resp = self.send(builder, "delete").await?;
        // Already gone counts as deleted.
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !resp.status().is_success() {
            return Err(status_error(resp, "delete").await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_token() {
        let cfg = ArchiveConfig {
            owner: "me".into(),
            repo: "sessions".into(),
            ..Default::default()
        };
        assert!(GithubArchive::from_config(&cfg, reqwest::Client::new()).is_none());
    }

    #[test]
    fn test_contents_url() {
        assert_eq!(
            contents_url(API_BASE, "me", "sessions", "session", Some("creds_1_2.json")),
            "https://api.github.com/repos/me/sessions/contents/session/creds_1_2.json"
        );
        assert_eq!(
            contents_url(API_BASE, "me", "sessions", "", None),
            "https://api.github.com/repos/me/sessions/contents"
        );
    }

    #[test]
    fn test_decode_wrapped_content() {
        let encoded = STANDARD.encode(b"{\"number\":\"555\"}");
        let (a, b) = encoded.split_at(8);
        let file = ContentFile {
            content: format!("{a}\n{b}\n"),
            encoding: "base64".into(),
        };
        assert_eq!(decode_content(&file).unwrap(), b"{\"number\":\"555\"}");
    }

    #[test]
    fn test_decode_rejects_unknown_encoding() {
        let file = ContentFile {
            content: "abc".into(),
            encoding: "none".into(),
        };
        assert!(decode_content(&file).is_err());
    }
}
