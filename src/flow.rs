use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::debounce::Debouncer;
use crate::error::{ClientError, ClientResult};
use crate::filter::{filter_commits, sort_newest_first};
use crate::github::MAX_PER_PAGE;
use crate::models::{Commit, Repository};
use crate::source::CommitSource;
use crate::store::{CredentialStore, Credentials};
use crate::summary::SummaryPanel;

/// Repository selector value meaning "no repository chosen".
pub const ALL_REPOSITORIES: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoFilter {
    All,
    Named(String),
}

impl RepoFilter {
    pub fn parse(value: &str) -> Self {
        if value.is_empty() || value == ALL_REPOSITORIES {
            RepoFilter::All
        } else {
            RepoFilter::Named(value.to_string())
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            RepoFilter::All => None,
            RepoFilter::Named(name) => Some(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Uninitialized,
    /// Required credentials are absent; the host should leave this screen.
    NoCredentials,
    LoadingRepositories,
    RepositoriesLoaded,
    LoadingCommits,
    CommitsLoaded,
}

/// One in-flight commit-page request, issued by [`CommitFlow::begin_switch`].
///
/// The flow keeps a clone of the cancellation token and cancels it as soon as another fetch
/// is issued. Results handed back with an out-of-date ticket are discarded.
#[derive(Debug, Clone)]
pub struct CommitFetch {
    ticket: u64,
    owner: String,
    repo: String,
    token: String,
    cancel: CancellationToken,
}

impl CommitFetch {
    pub fn repository(&self) -> &str {
        &self.repo
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn run(&self, source: &dyn CommitSource) -> ClientResult<Vec<Commit>> {
        source
            .commits(
                &self.owner,
                &self.repo,
                1,
                MAX_PER_PAGE,
                Some(&self.token),
                Some(&self.cancel),
            )
            .await
    }
}

/// View state of the commit screen.
pub struct CommitFlow {
    source: Arc<dyn CommitSource>,
    store: Arc<dyn CredentialStore>,
    state: FlowState,
    credentials: Option<Credentials>,
    repositories: Vec<Repository>,
    selected: RepoFilter,
    commits: Vec<Commit>,
    visible: Vec<Commit>,
    query: String,
    selection: BTreeSet<String>,
    search: Debouncer,
    repo_cancel: Option<CancellationToken>,
    commit_cancel: Option<CancellationToken>,
    commit_ticket: u64,
    state_before_fetch: FlowState,
    last_error: Option<String>,
    summary: SummaryPanel,
}

impl CommitFlow {
    pub fn new(source: Arc<dyn CommitSource>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            source,
            store,
            state: FlowState::Uninitialized,
            credentials: None,
            repositories: Vec::new(),
            selected: RepoFilter::All,
            commits: Vec::new(),
            visible: Vec::new(),
            query: String::new(),
            selection: BTreeSet::new(),
            search: Debouncer::default(),
            repo_cancel: None,
            commit_cancel: None,
            commit_ticket: 0,
            state_before_fetch: FlowState::Uninitialized,
            last_error: None,
            summary: SummaryPanel::default(),
        }
    }

    pub fn with_search_debounce(mut self, delay: Duration) -> Self {
        self.search = Debouncer::new(delay);
        self
    }

    /// Screen entry: load credentials, list repositories, open the first one.
    pub async fn bootstrap(&mut self) -> FlowState {
        let credentials = match Credentials::load(self.store.as_ref()) {
            Ok(Some(credentials)) => credentials,
            Ok(None) => {
                tracing::info!("No stored credentials, leaving commit screen");
                self.state = FlowState::NoCredentials;
                return self.state;
            }
            Err(e) => {
                tracing::error!("Failed to read stored credentials: {}", e);
                self.state = FlowState::NoCredentials;
                return self.state;
            }
        };
        self.credentials = Some(credentials.clone());

        if let Some(previous) = self.repo_cancel.take() {
            previous.cancel();
        }
        let cancel = CancellationToken::new();
        self.repo_cancel = Some(cancel.clone());

        let prior = self.state;
        self.state = FlowState::LoadingRepositories;
        tracing::info!("Loading repositories for {}", credentials.account);

        let result = self
            .source
            .repositories(
                &credentials.account,
                Some(&credentials.github_token),
                Some(&cancel),
            )
            .await;
        self.repo_cancel = None;

        match result {
            Ok(repositories) => {
                tracing::info!("Loaded {} repositories", repositories.len());
                self.selected = repositories
                    .first()
                    .map(|r| RepoFilter::Named(r.name.clone()))
                    .unwrap_or(RepoFilter::All);
                self.repositories = repositories;
                self.state = FlowState::RepositoriesLoaded;
            }
            Err(e) => {
                self.record_failure("Error fetching repositories", &e);
                self.state = prior;
                return self.state;
            }
        }

        if let Some(fetch) = self.begin_commit_fetch() {
            let result = fetch.run(self.source.as_ref()).await;
            self.complete_commit_fetch(&fetch, result);
        }
        self.state
    }

    /// Select another repository and load its first page of commits.
    pub async fn switch_repository(&mut self, value: &str) -> FlowState {
        if let Some(fetch) = self.begin_switch(value) {
            let result = fetch.run(self.source.as_ref()).await;
            self.complete_commit_fetch(&fetch, result);
        }
        self.state
    }

    /// Commit the repository switch and issue its fetch without awaiting it.
    ///
    /// The query and the selection are cleared before the fetch exists. Returns `None` when no
    /// request is needed (the "all" sentinel, or no credentials).
    pub fn begin_switch(&mut self, value: &str) -> Option<CommitFetch> {
        self.selected = RepoFilter::parse(value);
        self.query.clear();
        self.search.cancel();
        self.selection.clear();
        // A failed fetch keeps the current list, so it must already match the empty query.
        self.visible = filter_commits(&self.commits, &self.query);
        tracing::debug!("Switched repository to {:?}", self.selected);
        self.begin_commit_fetch()
    }

    fn begin_commit_fetch(&mut self) -> Option<CommitFetch> {
        // Only one commit fetch may be live; the newer selection always wins.
        if let Some(previous) = self.commit_cancel.take() {
            tracing::debug!("Cancelling superseded commit fetch");
            previous.cancel();
        }
        self.commit_ticket += 1;

        let Some(repo) = self.selected.name().map(str::to_string) else {
            self.commits.clear();
            self.visible.clear();
            self.selection.clear();
            self.state = FlowState::CommitsLoaded;
            return None;
        };
        let Some(credentials) = self.credentials.as_ref() else {
            tracing::warn!("Cannot load commits for {} without credentials", repo);
            return None;
        };

        let cancel = CancellationToken::new();
        self.commit_cancel = Some(cancel.clone());
        if self.state != FlowState::LoadingCommits {
            self.state_before_fetch = self.state;
        }
        self.state = FlowState::LoadingCommits;
        tracing::info!("Loading commits for {}/{}", credentials.account, repo);

        Some(CommitFetch {
            ticket: self.commit_ticket,
            owner: credentials.account.clone(),
            repo,
            token: credentials.github_token.clone(),
            cancel,
        })
    }

    /// Apply the outcome of `fetch`. Returns `false` if the fetch was superseded and ignored.
    pub fn complete_commit_fetch(
        &mut self,
        fetch: &CommitFetch,
        result: ClientResult<Vec<Commit>>,
    ) -> bool {
        // Every begin_commit_fetch bumps the ticket, so anything older lost the race.
        if fetch.ticket != self.commit_ticket {
            tracing::debug!("Discarding stale commits for {}", fetch.repo);
            return false;
        }
        self.commit_cancel = None;

        match result {
            Ok(mut commits) => {
                sort_newest_first(&mut commits);
                tracing::info!("Loaded {} commits for {}", commits.len(), fetch.repo);
                self.selection
                    .retain(|sha| commits.iter().any(|c| &c.sha == sha));
                self.visible = filter_commits(&commits, &self.query);
                self.commits = commits;
                self.last_error = None;
                self.state = FlowState::CommitsLoaded;
            }
            Err(e) => {
                // Keep the previous lists on screen and drop back to where we were.
                self.record_failure(&format!("Error fetching commits for {}", fetch.repo), &e);
                self.state = self.state_before_fetch;
            }
        }
        true
    }

    fn record_failure(&mut self, what: &str, error: &ClientError) {
        if error.is_cancelled() {
            tracing::debug!("{}: cancelled", what);
            return;
        }
        tracing::error!("{}: {}", what, error);
        self.last_error = Some(error.to_string());
    }

    /// Record a new query and restart the debounce window.
    pub fn set_search_query(&mut self, query: &str) {
        self.query = query.to_string();
        self.search.trigger();
    }

    /// Recompute the visible list if the debounce window has elapsed by `now`.
    pub fn poll_search(&mut self, now: Instant) -> bool {
        if self.search.take_due(now) {
            self.apply_search();
            true
        } else {
            false
        }
    }

    /// Wait out the debounce window, then recompute the visible list.
    pub async fn settle_search(&mut self) -> bool {
        if self.search.wait().await {
            self.apply_search();
            true
        } else {
            false
        }
    }

    fn apply_search(&mut self) {
        self.visible = filter_commits(&self.commits, &self.query);
        tracing::debug!(
            "Search {:?} matched {} of {} commits",
            self.query,
            self.visible.len(),
            self.commits.len()
        );
    }

    /// Flip one commit in or out of the selection. Unknown hashes are ignored.
    pub fn toggle_commit(&mut self, sha: &str) -> bool {
        let selected = !self.selection.contains(sha);
        self.select_commit(sha, selected);
        self.selection.contains(sha)
    }

    pub fn select_commit(&mut self, sha: &str, checked: bool) {
        if !checked {
            self.selection.remove(sha);
        } else if self.commits.iter().any(|c| c.sha == sha) {
            self.selection.insert(sha.to_string());
        }
    }

    /// Select exactly the visible commits, or clear the selection.
    pub fn select_all(&mut self, checked: bool) {
        self.selection = if checked {
            self.visible.iter().map(|c| c.sha.clone()).collect()
        } else {
            BTreeSet::new()
        };
    }

    pub fn toggle_select_all(&mut self) {
        let checked = !self.all_visible_selected();
        self.select_all(checked);
    }

    pub fn all_visible_selected(&self) -> bool {
        !self.visible.is_empty() && self.visible.iter().all(|c| self.selection.contains(&c.sha))
    }

    /// Selected commits resolved against the full fetched list, in display order.
    pub fn selected_commits(&self) -> Vec<Commit> {
        self.commits
            .iter()
            .filter(|c| self.selection.contains(&c.sha))
            .cloned()
            .collect()
    }

    /// Hand the selected commits to the summary panel. Does nothing with an empty selection.
    pub fn process(&mut self) -> bool {
        if self.selection.is_empty() {
            return false;
        }
        let commits = self.selected_commits();
        tracing::info!("Processing {} selected commits", commits.len());
        self.summary.show(commits);
        true
    }

    /// Cancel any in-flight fetch.
    pub fn cancel_pending(&mut self) {
        for token in [self.repo_cancel.take(), self.commit_cancel.take()]
            .into_iter()
            .flatten()
        {
            token.cancel();
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    pub fn selected_repository(&self) -> &RepoFilter {
        &self.selected
    }

    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    pub fn visible_commits(&self) -> &[Commit] {
        &self.visible
    }

    pub fn search_query(&self) -> &str {
        &self.query
    }

    pub fn selection(&self) -> &BTreeSet<String> {
        &self.selection
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn summary(&self) -> &SummaryPanel {
        &self.summary
    }

    pub fn summary_mut(&mut self) -> &mut SummaryPanel {
        &mut self.summary
    }

    pub fn source(&self) -> Arc<dyn CommitSource> {
        Arc::clone(&self.source)
    }
}

impl Drop for CommitFlow {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
