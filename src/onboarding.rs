use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;
use crate::github::GitHubClient;
use crate::openai::OpenAiClient;
use crate::store::{CredentialStore, Credentials, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenField {
    GitHubToken,
    OpenAiToken,
}

impl std::fmt::Display for TokenField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenField::GitHubToken => write!(f, "GitHub token"),
            TokenField::OpenAiToken => write!(f, "OpenAI API key"),
        }
    }
}

#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error("required fields missing: {}", list_fields(.0))]
    MissingFields(Vec<TokenField>),

    #[error("GitHub token was rejected: {0}")]
    GitHub(#[source] ClientError),

    #[error("OpenAI API key was rejected: {0}")]
    OpenAi(#[source] ClientError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OnboardingError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            OnboardingError::GitHub(e) | OnboardingError::OpenAi(e) => e.is_cancelled(),
            _ => false,
        }
    }
}

fn list_fields(fields: &[TokenField]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate both tokens against their services and persist them.
///
/// The GitHub token resolves the account login; the OpenAI key must complete a test
/// request. The store is written only after both checks pass.
pub async fn onboard(
    github: &GitHubClient,
    openai: &OpenAiClient,
    store: &dyn CredentialStore,
    github_token: &str,
    openai_token: &str,
    cancel: Option<&CancellationToken>,
) -> Result<Credentials, OnboardingError> {
    let github_token = github_token.trim();
    let openai_token = openai_token.trim();

    let mut missing = Vec::new();
    if github_token.is_empty() {
        missing.push(TokenField::GitHubToken);
    }
    if openai_token.is_empty() {
        missing.push(TokenField::OpenAiToken);
    }
    if !missing.is_empty() {
        return Err(OnboardingError::MissingFields(missing));
    }

    let user = github
        .fetch_user(Some(github_token), cancel)
        .await
        .map_err(OnboardingError::GitHub)?;
    openai
        .test_api_key(Some(openai_token), cancel)
        .await
        .map_err(OnboardingError::OpenAi)?;

    let credentials = Credentials {
        account: user.login,
        github_token: github_token.to_string(),
        openai_token: openai_token.to_string(),
    };
    credentials.save(store)?;
    tracing::info!("Stored credentials for {}", credentials.account);
    Ok(credentials)
}
