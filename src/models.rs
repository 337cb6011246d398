use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
    pub date: DateTime<Utc>,
}

/// A commit as shown on the dashboard, scoped to one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    /// Full message. Summary and body stay joined by their original newlines.
    pub message: String,
    pub author: CommitAuthor,
    pub repository: String,
    pub url: String,
}

impl Commit {
    /// First line of the message.
    pub fn title(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    /// Everything after the first line, trimmed. `None` for one-line messages.
    pub fn body(&self) -> Option<String> {
        let (_, rest) = self.message.split_once('\n')?;
        let rest = rest.trim();
        if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    }

    pub fn kind(&self) -> CommitKind {
        CommitKind::classify(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub private: bool,
    pub html_url: String,
    // Nullable in GitHub's minimal-repository shape (e.g. pushed_at on an empty repo).
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub language: Option<String>,
    pub stargazers_count: u64,
    pub watchers_count: u64,
    pub forks_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubUser {
    pub id: u64,
    pub login: String,
    pub avatar_url: String,
}

/// Coarse label derived from the commit message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitKind {
    Fix,
    Feature,
    Refactor,
    Update,
}

impl CommitKind {
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("fix") {
            CommitKind::Fix
        } else if lower.contains("feat") {
            CommitKind::Feature
        } else if lower.contains("refactor") {
            CommitKind::Refactor
        } else {
            CommitKind::Update
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CommitKind::Fix => "Fix",
            CommitKind::Feature => "Feature",
            CommitKind::Refactor => "Refactor",
            CommitKind::Update => "Update",
        }
    }
}

/// Human-friendly age: hours under a day, days under a week, otherwise the calendar date.
pub fn format_relative(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = (now - date).num_hours();
    if hours < 24 {
        format!("{}h ago", hours)
    } else if hours < 168 {
        format!("{}d ago", hours / 24)
    } else {
        date.format("%Y-%m-%d").to_string()
    }
}
