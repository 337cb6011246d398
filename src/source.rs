use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use crate::cancel::run_cancellable;
use crate::error::{ClientError, ClientResult};
use crate::github::validate_commit_page;
use crate::models::{Commit, CommitAuthor, Repository};

/// Where the commit screen gets its data from.
///
/// [`crate::github::GitHubClient`] serves live data; [`FixtureSource`] serves a fixed
/// in-memory set so the screen can run without network access.
#[async_trait]
pub trait CommitSource: Send + Sync {
    async fn repositories(
        &self,
        account: &str,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<Vec<Repository>>;

    async fn commits(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
        per_page: u32,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<Vec<Commit>>;
}

#[derive(Debug, Default)]
pub struct FixtureSource {
    repositories: Vec<Repository>,
    commits: HashMap<String, Vec<Commit>>,
    failing_commits: HashSet<String>,
    fail_repositories: bool,
    calls: Mutex<Vec<String>>,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repositories are listed in insertion order.
    pub fn with_repository(mut self, repository: Repository, commits: Vec<Commit>) -> Self {
        self.commits.insert(repository.name.clone(), commits);
        self.repositories.push(repository);
        self
    }

    /// Commit requests for `repo` answer with a 500.
    pub fn with_failing_commits(mut self, repo: &str) -> Self {
        self.failing_commits.insert(repo.to_string());
        self
    }

    pub fn with_failing_repositories(mut self) -> Self {
        self.fail_repositories = true;
        self
    }

    /// Requests served so far, as `repos:<account>` or `commits:<owner>/<repo>@<page>`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    /// Canned data for demos.
    pub fn sample() -> Self {
        let day = |d: u32| Utc.with_ymd_and_hms(2024, 5, d, 9, 30, 0).single();
        let commit = |sha: &str, message: &str, name: &str, d: u32, repo: &str| {
            let date = day(d).unwrap_or_default();
            fixture_commit(sha, message, name, date, repo)
        };

        Self::new()
            .with_repository(
                fixture_repository(1, "dashboard"),
                vec![
                    commit("9f2c1e0", "feat: add commit search\n\nDebounced filter over author and message.", "Alice", 14, "dashboard"),
                    commit("71ab3d4", "fix: keep selection after refresh", "Bob", 12, "dashboard"),
                    commit("c03e9aa", "refactor: split api client", "Alice", 9, "dashboard"),
                    commit("5e66f01", "docs: update readme", "Carol", 3, "dashboard"),
                ],
            )
            .with_repository(
                fixture_repository(2, "api-gateway"),
                vec![
                    commit("e11d7b2", "feat: rate limit per token", "Dave", 11, "api-gateway"),
                    commit("0b9f4c8", "Fix bug in header parsing", "Carol", 6, "api-gateway"),
                ],
            )
    }
}

#[async_trait]
impl CommitSource for FixtureSource {
    async fn repositories(
        &self,
        account: &str,
        _token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<Vec<Repository>> {
        if account.trim().is_empty() {
            return Err(ClientError::validation(
                "Owner or organization name is required",
            ));
        }
        run_cancellable(cancel, async {
            self.record(format!("repos:{}", account));
            if self.fail_repositories {
                return Err(fixture_failure(format!("fixture://users/{}/repos", account)));
            }
            Ok(self.repositories.clone())
        })
        .await
    }

    async fn commits(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
        per_page: u32,
        _token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<Vec<Commit>> {
        validate_commit_page(owner, repo, page, per_page)?;
        run_cancellable(cancel, async {
            self.record(format!("commits:{}/{}@{}", owner, repo, page));
            if self.failing_commits.contains(repo) {
                return Err(fixture_failure(format!("fixture://repos/{}/{}/commits", owner, repo)));
            }
            let skip = (page as usize - 1) * per_page as usize;
            Ok(self
                .commits
                .get(repo)
                .map(|all| all.iter().skip(skip).take(per_page as usize).cloned().collect())
                .unwrap_or_default())
        })
        .await
    }
}

fn fixture_failure(url: String) -> ClientError {
    ClientError::Api {
        status: 500,
        status_text: "Internal Server Error".into(),
        url,
    }
}

pub fn fixture_repository(id: u64, name: &str) -> Repository {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single();
    Repository {
        id,
        name: name.to_string(),
        full_name: format!("demo/{}", name),
        description: None,
        private: false,
        html_url: format!("https://github.com/demo/{}", name),
        created_at: at,
        updated_at: at,
        pushed_at: at,
        language: None,
        stargazers_count: 0,
        watchers_count: 0,
        forks_count: 0,
    }
}

pub fn fixture_commit(
    sha: &str,
    message: &str,
    author: &str,
    date: DateTime<Utc>,
    repository: &str,
) -> Commit {
    Commit {
        sha: sha.to_string(),
        message: message.to_string(),
        author: CommitAuthor {
            name: author.to_string(),
            email: format!("{}@example.com", author.to_lowercase()),
            date,
        },
        repository: repository.to_string(),
        url: format!("https://github.com/demo/{}/commit/{}", repository, sha),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pages_are_sliced() {
        let source = FixtureSource::sample();
        let first = source.commits("demo", "dashboard", 1, 3, None, None).await.unwrap();
        let second = source.commits("demo", "dashboard", 2, 3, None, None).await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].sha, "5e66f01");
        assert_eq!(
            source.calls(),
            vec!["commits:demo/dashboard@1", "commits:demo/dashboard@2"]
        );
    }

    #[tokio::test]
    async fn fixture_honours_validation_and_cancellation() {
        let source = FixtureSource::sample();
        let err = source.commits("demo", "dashboard", 0, 10, None, None).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = source.repositories("demo", None, Some(&cancel)).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(source.calls().is_empty());
    }
}
