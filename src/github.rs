use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::cancel::run_cancellable;
use crate::error::{ClientError, ClientResult};
use crate::models::{Commit, CommitAuthor, GitHubUser, Repository};
use crate::source::CommitSource;

pub const GITHUB_API_BASE_URL: &str = "https://api.github.com";
pub const GITHUB_API_VERSION: &str = "2022-11-28";
pub const GITHUB_ACCEPT: &str = "application/vnd.github+json";
pub const MAX_PER_PAGE: u32 = 100;

const USER_AGENT: &str = "commit-digest";

#[derive(Debug, Deserialize)]
struct RawCommit {
    sha: String,
    commit: RawCommitDetail,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct RawCommitDetail {
    message: String,
    author: RawCommitAuthor,
}

#[derive(Debug, Deserialize)]
struct RawCommitAuthor {
    name: String,
    email: String,
    date: DateTime<Utc>,
}

impl RawCommit {
    fn into_commit(self, repository: &str) -> Commit {
        Commit {
            sha: self.sha,
            message: self.commit.message,
            author: CommitAuthor {
                name: self.commit.author.name,
                email: self.commit.author.email,
                date: self.commit.author.date,
            },
            repository: repository.to_string(),
            url: self.html_url,
        }
    }
}

/// Read-only client for the handful of GitHub REST endpoints the dashboard needs.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_url: String,
}

impl GitHubClient {
    pub fn new() -> ClientResult<Self> {
        Self::with_base_url(GITHUB_API_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> ClientResult<Self> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the account that owns `token`.
    pub async fn fetch_user(
        &self,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<GitHubUser> {
        let url = format!("{}/user", self.base_url);
        self.get_json(url, token, cancel)
            .await
            .inspect_err(|e| log_failure(e, "Error fetching user details"))
    }

    /// List up to 100 repositories of `account`, most recently updated first.
    pub async fn fetch_repositories(
        &self,
        account: &str,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<Vec<Repository>> {
        if account.trim().is_empty() {
            return Err(ClientError::validation(
                "Owner or organization name is required",
            ));
        }

        let url = format!(
            "{}/users/{}/repos?per_page={}&sort=updated&direction=desc",
            self.base_url, account, MAX_PER_PAGE
        );
        let repos: Vec<Repository> = self
            .get_json(url, token, cancel)
            .await
            .inspect_err(|e| log_failure(e, &format!("Error fetching repositories for {}", account)))?;

        tracing::debug!("Fetched {} repositories for {}", repos.len(), account);
        Ok(repos)
    }

    /// Fetch one page of commits of `owner/repo`.
    pub async fn fetch_commits_by_page(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
        per_page: u32,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<Vec<Commit>> {
        validate_commit_page(owner, repo, page, per_page)?;

        let url = format!(
            "{}/repos/{}/{}/commits?page={}&per_page={}",
            self.base_url, owner, repo, page, per_page
        );
        let raw: Vec<RawCommit> = self
            .get_json(url, token, cancel)
            .await
            .inspect_err(|e| log_failure(e, &format!("Error fetching commits for {}/{}", owner, repo)))?;

        tracing::debug!("Fetched {} commits for {}/{} page {}", raw.len(), owner, repo, page);
        Ok(raw.into_iter().map(|c| c.into_commit(repo)).collect())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<T> {
        let headers = build_headers(token)?;
        tracing::debug!("GET {}", url);

        let request = async {
            let response = self.http.get(&url).headers(headers).send().await?;
            let response = validate_response(response, &url)?;
            let body = response.bytes().await?;
            serde_json::from_slice(&body).map_err(|source| ClientError::Decode {
                url: url.clone(),
                source,
            })
        };

        run_cancellable(cancel, request).await
    }
}

#[async_trait]
impl CommitSource for GitHubClient {
    async fn repositories(
        &self,
        account: &str,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<Vec<Repository>> {
        self.fetch_repositories(account, token, cancel).await
    }

    async fn commits(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
        per_page: u32,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<Vec<Commit>> {
        self.fetch_commits_by_page(owner, repo, page, per_page, token, cancel)
            .await
    }
}

/// Local preconditions shared by every commit-page source.
pub(crate) fn validate_commit_page(
    owner: &str,
    repo: &str,
    page: u32,
    per_page: u32,
) -> ClientResult<()> {
    if owner.trim().is_empty() || repo.trim().is_empty() {
        return Err(ClientError::validation("Owner and repository are required"));
    }
    if page < 1 {
        return Err(ClientError::validation("Page number must be greater than 0"));
    }
    if !(1..=MAX_PER_PAGE).contains(&per_page) {
        return Err(ClientError::validation("perPage must be between 1 and 100"));
    }
    Ok(())
}

fn build_headers(token: Option<&str>) -> ClientResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
    headers.insert(
        HeaderName::from_static("x-github-api-version"),
        HeaderValue::from_static(GITHUB_API_VERSION),
    );

    if let Some(token) = token.filter(|t| !t.is_empty()) {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ClientError::validation("GitHub token contains invalid characters"))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}

/// Turn any non-2xx response into [`ClientError::Api`] carrying the requested URL.
pub(crate) fn validate_response(response: Response, url: &str) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    Err(ClientError::Api {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("").to_string(),
        url: url.to_string(),
    })
}

pub(crate) fn log_failure(error: &ClientError, what: &str) {
    if !error.is_cancelled() {
        tracing::error!("{}: {}", what, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn commits_json() -> String {
        r#"[
  {
    "sha": "a1",
    "commit": {
      "message": "feat: X\n\nbody",
      "author": { "name": "Alice", "email": "alice@example.com", "date": "2024-01-01T10:00:00Z" }
    },
    "html_url": "https://github.com/o/r/commit/a1"
  },
  {
    "sha": "b2",
    "commit": {
      "message": "Fix bug",
      "author": { "name": "Bob", "email": "bob@example.com", "date": "2024-03-01T10:00:00Z" }
    },
    "html_url": "https://github.com/o/r/commit/b2"
  }
]"#
        .to_string()
    }

    fn repos_json() -> String {
        r#"[
  {
    "id": 1,
    "name": "r",
    "full_name": "o/r",
    "description": null,
    "private": false,
    "html_url": "https://github.com/o/r",
    "created_at": "2023-01-01T00:00:00Z",
    "updated_at": "2024-03-01T00:00:00Z",
    "pushed_at": "2024-03-01T00:00:00Z",
    "language": "Rust",
    "stargazers_count": 5,
    "watchers_count": 5,
    "forks_count": 1,
    "owner": { "login": "o" }
  }
]"#
        .to_string()
    }

    #[tokio::test]
    async fn user_request_sends_github_headers() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/user")
            .match_header("accept", GITHUB_ACCEPT)
            .match_header("x-github-api-version", GITHUB_API_VERSION)
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 7, "login": "octo", "avatar_url": "https://a/7.png", "name": "Octo"}"#)
            .create_async()
            .await;

        let client = GitHubClient::with_base_url(&server.url()).unwrap();
        let user = client.fetch_user(Some("tok"), None).await.unwrap();

        m.assert_async().await;
        assert_eq!(user.login, "octo");
        assert_eq!(user.id, 7);
        assert_eq!(user.avatar_url, "https://a/7.png");
    }

    #[tokio::test]
    async fn anonymous_request_omits_authorization() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/user")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"id": 1, "login": "x", "avatar_url": ""}"#)
            .create_async()
            .await;

        let client = GitHubClient::with_base_url(&server.url()).unwrap();
        client.fetch_user(None, None).await.unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn repositories_use_single_sorted_page() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/users/o/repos")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("per_page".into(), "100".into()),
                Matcher::UrlEncoded("sort".into(), "updated".into()),
                Matcher::UrlEncoded("direction".into(), "desc".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(repos_json())
            .create_async()
            .await;

        let client = GitHubClient::with_base_url(&server.url()).unwrap();
        let repos = client.fetch_repositories("o", Some("t"), None).await.unwrap();

        m.assert_async().await;
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].full_name, "o/r");
        assert_eq!(repos[0].description, None);
        assert_eq!(repos[0].language.as_deref(), Some("Rust"));
        assert_eq!(repos[0].forks_count, 1);
    }

    #[tokio::test]
    async fn null_repository_timestamps_are_accepted() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/users/o/repos")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(repos_json().replace(
                r#""pushed_at": "2024-03-01T00:00:00Z""#,
                r#""pushed_at": null"#,
            ))
            .create_async()
            .await;

        let client = GitHubClient::with_base_url(&server.url()).unwrap();
        let repos = client.fetch_repositories("o", Some("t"), None).await.unwrap();

        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].pushed_at, None);
        assert!(repos[0].updated_at.is_some());
    }

    #[tokio::test]
    async fn empty_account_is_rejected() {
        let client = GitHubClient::with_base_url("http://127.0.0.1:9").unwrap();
        let err = client.fetch_repositories("", Some("t"), None).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)), "{err}");
    }

    #[tokio::test]
    async fn commits_are_flattened_and_keep_full_message() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/repos/o/r/commits")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "2".into()),
                Matcher::UrlEncoded("per_page".into(), "30".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(commits_json())
            .create_async()
            .await;

        let client = GitHubClient::with_base_url(&server.url()).unwrap();
        let commits = client
            .fetch_commits_by_page("o", "r", 2, 30, Some("t"), None)
            .await
            .unwrap();

        m.assert_async().await;
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].sha, "a1");
        assert_eq!(commits[0].message, "feat: X\n\nbody");
        assert_eq!(commits[0].author.name, "Alice");
        assert_eq!(commits[0].author.email, "alice@example.com");
        assert_eq!(commits[0].repository, "r");
        assert_eq!(commits[0].url, "https://github.com/o/r/commit/a1");
    }

    #[tokio::test]
    async fn invalid_commit_arguments_never_hit_the_network() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let client = GitHubClient::with_base_url(&server.url()).unwrap();

        let cases: [(&str, &str, u32, u32); 6] = [
            ("o", "r", 1, 0),
            ("o", "r", 1, 101),
            ("o", "r", 1, 1000),
            ("o", "r", 0, 10),
            ("", "r", 1, 10),
            ("o", "", 1, 10),
        ];
        for (owner, repo, page, per_page) in cases {
            let err = client
                .fetch_commits_by_page(owner, repo, page, per_page, Some("t"), None)
                .await
                .unwrap_err();
            assert!(
                matches!(err, ClientError::Validation(_)),
                "{owner}/{repo} page={page} per_page={per_page}: {err}"
            );
        }

        m.assert_async().await;
    }

    #[tokio::test]
    async fn not_found_maps_to_api_error_with_url() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", Matcher::Any)
            .with_status(404)
            .with_body(r#"{"message":"Not Found"}"#)
            .create_async()
            .await;
        let client = GitHubClient::with_base_url(&server.url()).unwrap();
        let base = server.url();

        let err = client.fetch_user(Some("t"), None).await.unwrap_err();
        assert_api_404(err, &format!("{}/user", base));

        let err = client.fetch_repositories("o", Some("t"), None).await.unwrap_err();
        assert_api_404(
            err,
            &format!("{}/users/o/repos?per_page=100&sort=updated&direction=desc", base),
        );

        let err = client
            .fetch_commits_by_page("o", "r", 1, 100, Some("t"), None)
            .await
            .unwrap_err();
        assert_api_404(err, &format!("{}/repos/o/r/commits?page=1&per_page=100", base));
    }

    fn assert_api_404(err: ClientError, expected_url: &str) {
        match err {
            ClientError::Api {
                status,
                status_text,
                url,
            } => {
                assert_eq!(status, 404);
                assert_eq!(status_text, "Not Found");
                assert_eq!(url, expected_url);
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pre_cancelled_requests_report_cancellation() {
        // Nothing listens on the discard port, so a real request would fail with a transport error.
        let client = GitHubClient::with_base_url("http://127.0.0.1:9").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client.fetch_user(Some("t"), Some(&cancel)).await.unwrap_err();
        assert!(err.is_cancelled(), "{err}");

        let err = client
            .fetch_repositories("o", Some("t"), Some(&cancel))
            .await
            .unwrap_err();
        assert!(err.is_cancelled(), "{err}");

        let err = client
            .fetch_commits_by_page("o", "r", 1, 100, Some("t"), Some(&cancel))
            .await
            .unwrap_err();
        assert!(err.is_cancelled(), "{err}");
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/user")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = GitHubClient::with_base_url(&server.url()).unwrap();
        let err = client.fetch_user(Some("t"), None).await.unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }), "{err}");
    }
}
