use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ClientResult;
use crate::models::Commit;
use crate::openai::OpenAiClient;

const SYSTEM_PROMPT: &str = "You summarize git commits for a status update. \
Group related changes, mention notable fixes and features, and keep it under 200 words.";

/// Produces the description shown for a set of selected commits.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn summarize(
        &self,
        commits: &[Commit],
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<String>;
}

/// Canned description built locally from commit titles. Never touches the network.
#[derive(Debug, Default, Clone)]
pub struct MockSummary;

#[async_trait]
impl SummaryProvider for MockSummary {
    async fn summarize(
        &self,
        commits: &[Commit],
        _cancel: Option<&CancellationToken>,
    ) -> ClientResult<String> {
        if commits.is_empty() {
            return Ok("No commits selected.".to_string());
        }

        let mut out = format!(
            "Summary of {} commit{}:\n",
            commits.len(),
            if commits.len() == 1 { "" } else { "s" }
        );
        for commit in commits {
            out.push_str(&format!(
                "- [{}] {} ({})\n",
                commit.kind().label(),
                commit.title(),
                commit.author.name
            ));
        }
        Ok(out)
    }
}

/// Asks an OpenAI chat model to describe the selected commits.
#[derive(Debug, Clone)]
pub struct OpenAiSummary {
    client: OpenAiClient,
    api_key: String,
}

impl OpenAiSummary {
    pub fn new(client: OpenAiClient, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SummaryProvider for OpenAiSummary {
    async fn summarize(
        &self,
        commits: &[Commit],
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<String> {
        let prompt = render_prompt(commits);
        tracing::info!(
            "Requesting summary of {} commits from {}",
            commits.len(),
            self.client.model()
        );
        self.client
            .complete(Some(&self.api_key), SYSTEM_PROMPT, &prompt, cancel)
            .await
    }
}

fn render_prompt(commits: &[Commit]) -> String {
    let mut prompt = String::from("Summarize these commits:\n\n");
    for commit in commits {
        prompt.push_str(&format!(
            "commit {} ({}) by {} on {}\n{}\n\n",
            commit.sha,
            commit.repository,
            commit.author.name,
            commit.author.date.to_rfc3339(),
            commit.message.trim_end()
        ));
    }
    prompt
}

/// The hand-off surface: open or closed, and exactly the commits handed to it.
#[derive(Debug, Default, Clone)]
pub struct SummaryPanel {
    open: bool,
    commits: Vec<Commit>,
}

impl SummaryPanel {
    pub fn show(&mut self, commits: Vec<Commit>) {
        self.commits = commits;
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.commits.clear();
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    /// Render the panel's commits with `provider`. Closed panels render nothing.
    pub async fn render(
        &self,
        provider: &dyn SummaryProvider,
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<Option<String>> {
        if !self.open {
            return Ok(None);
        }
        provider.summarize(&self.commits, cancel).await.map(Some)
    }
}
