use std::fmt::Write;

use super::styling::{bright_green, bright_yellow, cyan, dim};
use crate::flow::{CompletionState, FlowStep, OrgFolder};

/// What a finished `create` run did, for the closing report.
pub struct CreationSummary<'a> {
    pub organization: &'a str,
    pub folder: &'a OrgFolder,
    /// `None` when every repository is discovered.
    pub repository: Option<&'a str>,
    pub credential_id: Option<&'a str>,
    pub steps: &'a [FlowStep],
    pub completion: CompletionState,
}

pub fn render_creation_summary(summary: &CreationSummary<'_>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "{} {}", bright_green("✓"), cyan(summary.folder.display_name()));
    let _ = writeln!(output, "  {} {}", dim("Organization:"), summary.organization);

    let scope = match summary.repository {
        Some(repo) => format!("single repository ({repo})"),
        None => "every repository".to_string(),
    };
    let _ = writeln!(output, "  {} {}", dim("Scanning:"), scope);

    if let Some(credential_id) = summary.credential_id {
        let _ = writeln!(output, "  {} {}", dim("Credential:"), credential_id);
    }

    let first_scan = if summary.completion == CompletionState::Resolved {
        bright_green("finished").to_string()
    } else {
        bright_yellow("still running").to_string()
    };
    let _ = writeln!(output, "  {} {}", dim("First scan:"), first_scan);

    let trail: Vec<&str> = summary.steps.iter().map(FlowStep::title).collect();
    let _ = write!(output, "  {} {}", dim("Steps:"), dim(trail.join(" → ")));

    output
}
