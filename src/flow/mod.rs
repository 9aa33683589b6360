//! GitHub organization folder creation flow.

mod cache;
mod completion;
mod manager;
mod status;
mod steps;
mod types;

#[cfg(test)]
mod tests;

pub use completion::CompletionState;
pub use manager::{FlowChange, FlowManager, FlowSettings, TokenOutcome};
pub use status::FlowStatus;
pub use steps::FlowStep;
pub use types::{Credential, JobEvent, OrgFolder, Organization, Repository, RepositoryPage};
