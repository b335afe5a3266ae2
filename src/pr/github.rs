use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::types::{PullRequestPayload, RepositoryPayload};
use super::PrError;
use crate::config::Secret;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Minimal read-only GitHub REST client.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: Secret,
}

impl GitHubClient {
    pub fn new(token: Secret, api_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// GET /repos/{owner}/{repo}/pulls/{number}
    #[instrument(skip(self))]
    pub async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullRequestPayload, PrError> {
        let url = format!("{}/repos/{owner}/{repo}/pulls/{number}", self.api_url);
        let pr: PullRequestPayload = self.get_json(&url).await.map_err(PrError::FetchPullRequest)?;
        debug!(title = ?pr.title, state = ?pr.state, "received PR metadata");
        Ok(pr)
    }

    /// GET /repos/{owner}/{repo}
    #[instrument(skip(self))]
    pub async fn get_repository(&self, owner: &str, repo: &str) -> Result<RepositoryPayload, PrError> {
        let url = format!("{}/repos/{owner}/{repo}", self.api_url);
        self.get_json(&url).await.map_err(PrError::FetchRepository)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, reqwest::Error> {
        self.http
            .get(url)
            .header("User-Agent", "pr-notion-sync")
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(self.token.expose())
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await
    }
}
