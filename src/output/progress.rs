use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::debug;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use super::styling::{bright_green, bright_red, bright_yellow};
use crate::flow::{FlowChange, FlowStatus};

/// Spinner on stderr that follows a flow's change notifications.
pub struct FlowProgress {
    pb: ProgressBar,
    follower: JoinHandle<()>,
}

impl FlowProgress {
    pub fn follow(mut changes: broadcast::Receiver<FlowChange>) -> Self {
        let pb = create_spinner(bright_yellow("Starting").to_string());
        let spinner = pb.clone();

        let follower = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        if let Some(message) = describe_change(&change) {
                            spinner.set_message(bright_yellow(message).to_string());
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Progress skipped {skipped} flow changes");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Self { pb, follower }
    }

    /// Stops following and leaves a final line for `status`.
    pub fn finish(self, status: FlowStatus) {
        self.follower.abort();
        let message = format!("{} {}", status_message(status), finish_mark(status));
        if status.is_error() {
            self.pb.abandon_with_message(bright_red(message).to_string());
        } else if status.is_pending() {
            self.pb.abandon_with_message(bright_yellow(message).to_string());
        } else {
            self.pb.finish_with_message(bright_green(message).to_string());
        }
    }
}

fn finish_mark(status: FlowStatus) -> &'static str {
    if status.is_error() {
        "✗"
    } else if status.is_pending() {
        "…"
    } else {
        "✓"
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

pub fn status_message(status: FlowStatus) -> &'static str {
    match status {
        FlowStatus::LoadingCredentials => "Looking up GitHub credential",
        FlowStatus::AccessTokenEntry => "Waiting for a GitHub access token",
        FlowStatus::LoadingOrganizations => "Loading organizations",
        FlowStatus::ChooseOrganization => "Organizations loaded",
        FlowStatus::OrganizationsError => "Failed to load organizations",
        FlowStatus::ChooseDiscover => "Organization selected",
        FlowStatus::LoadingRepositories => "Loading repositories",
        FlowStatus::RepositoriesError => "Failed to load repositories",
        FlowStatus::AlreadyDiscover => "Organization already discovers every repository",
        FlowStatus::ConfirmDiscover => "Ready to discover every repository",
        FlowStatus::ChooseRepository => "Repositories loaded",
        FlowStatus::Saving => "Saving organization folder",
        FlowStatus::SaveError => "Failed to save organization folder",
        FlowStatus::Saved => "Waiting for the first scan",
        FlowStatus::Complete => "Pipeline created",
        FlowStatus::EventError => "First scan failed",
        FlowStatus::EventTimeout => "Timed out waiting for the first scan",
    }
}

/// Spinner text for `change`, or `None` when it has nothing to show.
pub fn describe_change(change: &FlowChange) -> Option<String> {
    match change {
        FlowChange::Status(status) => Some(status_message(*status).to_string()),
        FlowChange::Organizations(count) => Some(format!("Found {count} organizations")),
        FlowChange::RepositoriesPage {
            organization,
            page,
            total,
        } => Some(format!(
            "Loading repositories for {organization} (page {page}, {total} so far)"
        )),
        FlowChange::Saved(folder) => Some(format!(
            "Saved {}, waiting for the first scan",
            folder.name
        )),
        FlowChange::Steps { .. }
        | FlowChange::CredentialReady
        | FlowChange::OrganizationSelected(_)
        | FlowChange::RepositorySelected(_) => None,
    }
}
