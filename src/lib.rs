//! Commit browsing and summarising on top of the GitHub and OpenAI REST APIs.
//!
//! The [`flow::CommitFlow`] holds the commit screen's view state: repository list, fetched
//! commits, debounced search, selection, and the hand-off to a [`summary::SummaryProvider`].
//! Data comes from any [`source::CommitSource`]; credentials live in a
//! [`store::CredentialStore`] filled by [`onboarding::onboard`].

pub mod cancel;
pub mod config;
pub mod debounce;
pub mod error;
pub mod filter;
pub mod flow;
pub mod github;
pub mod models;
pub mod onboarding;
pub mod openai;
pub mod source;
pub mod store;
pub mod summary;

pub use error::{ClientError, ClientResult};
pub use flow::{CommitFlow, FlowState, RepoFilter};
pub use models::{Commit, CommitAuthor, CommitKind, GitHubUser, Repository};
