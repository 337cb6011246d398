use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commit_digest::config::{AppConfig, DataSource, SummaryMode};
use commit_digest::github::GitHubClient;
use commit_digest::models::format_relative;
use commit_digest::onboarding::onboard;
use commit_digest::openai::OpenAiClient;
use commit_digest::source::{CommitSource, FixtureSource};
use commit_digest::store::{CredentialStore, Credentials, FileStore};
use commit_digest::summary::{MockSummary, OpenAiSummary, SummaryProvider};
use commit_digest::{CommitFlow, FlowState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    let github = GitHubClient::with_base_url(&config.github_api_base_url)
        .context("Failed to build GitHub client")?;
    let openai = OpenAiClient::with_base_url(&config.openai_api_base_url, &config.openai_model)
        .context("Failed to build OpenAI client")?;
    let store: Arc<dyn CredentialStore> = Arc::new(FileStore::new(&config.credentials_path));
    tracing::info!("Using credential store at {:?}", config.credentials_path);

    if let (Some(github_token), Some(openai_key)) = (&config.github_token, &config.openai_api_key) {
        tracing::info!("Validating tokens (GitHub length: {})", github_token.len());
        onboard(&github, &openai, store.as_ref(), github_token, openai_key, None)
            .await
            .context("Onboarding failed")?;
    }

    let source: Arc<dyn CommitSource> = match config.data_source {
        DataSource::GitHub => Arc::new(github),
        DataSource::Fixture => {
            tracing::info!("Serving fixture data");
            Arc::new(FixtureSource::sample())
        }
    };

    let mut flow = CommitFlow::new(source, Arc::clone(&store))
        .with_search_debounce(config.search_debounce);

    if flow.bootstrap().await == FlowState::NoCredentials {
        tracing::warn!("No stored credentials; set GITHUB_TOKEN and OPENAI_API_KEY to onboard");
        return Ok(());
    }

    let names: Vec<&str> = flow.repositories().iter().map(|r| r.name.as_str()).collect();
    tracing::info!("Repositories: {}", names.join(", "));

    if let Some(repository) = &config.repository {
        flow.switch_repository(repository).await;
    }
    if let Some(query) = &config.search_query {
        flow.set_search_query(query);
        flow.settle_search().await;
    }
    if let Some(error) = flow.last_error() {
        tracing::warn!("Showing previous results after error: {}", error);
    }

    let now = Utc::now();
    tracing::info!(
        "{} commits found in {} repository",
        flow.visible_commits().len(),
        flow.selected_repository().name().unwrap_or("no")
    );
    for commit in flow.visible_commits() {
        let short = commit.sha.get(..7).unwrap_or(&commit.sha);
        println!(
            "{}  {:<8} {}  ({}, {})",
            short,
            commit.kind().label(),
            commit.title(),
            commit.author.name,
            format_relative(commit.author.date, now)
        );
    }

    flow.select_all(true);
    if !flow.process() {
        return Ok(());
    }

    let provider: Box<dyn SummaryProvider> = match config.summary_mode {
        SummaryMode::Mock => Box::new(MockSummary),
        SummaryMode::OpenAi => {
            let credentials = Credentials::load(store.as_ref())?
                .context("OpenAI key disappeared from the credential store")?;
            Box::new(OpenAiSummary::new(openai, credentials.openai_token))
        }
    };

    if let Some(summary) = flow
        .summary()
        .render(provider.as_ref(), None)
        .await
        .context("Failed to summarize commits")?
    {
        println!("\n{}", summary);
    }

    Ok(())
}
