use serde::Serialize;

/// Identifies one screen of the creation wizard.
///
/// The flow only decides which step is current; drawing it is up to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    Loading,
    AccessToken,
    ChooseOrganization,
    ChooseDiscover,
    AlreadyDiscover,
    ConfirmDiscover,
    ChooseRepository,
    Complete,
}

impl FlowStep {
    /// Breadcrumb title.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Loading => "Loading",
            Self::AccessToken => "Connect to GitHub",
            Self::ChooseOrganization => "Which organization does the repository belong to?",
            Self::ChooseDiscover => "Create a single Pipeline or discover all Pipelines?",
            Self::AlreadyDiscover => "Already discovering",
            Self::ConfirmDiscover => "Confirm",
            Self::ChooseRepository => "Choose a repository",
            Self::Complete => "Complete",
        }
    }
}

/// Ordered stack of wizard steps. The last entry is the visible one.
#[derive(Debug, Clone)]
pub struct StepStack {
    steps: Vec<FlowStep>,
    pending: Vec<String>,
}

impl StepStack {
    pub fn new(initial: FlowStep) -> Self {
        Self {
            steps: vec![initial],
            pending: Vec::new(),
        }
    }

    pub fn current(&self) -> FlowStep {
        // Never empty: every mutation leaves at least one step behind.
        self.steps[self.steps.len() - 1]
    }

    pub fn steps(&self) -> &[FlowStep] {
        &self.steps
    }

    pub fn push(&mut self, step: FlowStep) {
        self.steps.push(step);
    }

    /// Drops everything above `after` and pushes `step` on top of it.
    ///
    /// Falls back to a plain push when `after` is not on the stack.
    pub fn push_after(&mut self, after: FlowStep, step: FlowStep) {
        if let Some(index) = self.steps.iter().rposition(|s| *s == after) {
            self.steps.truncate(index + 1);
        }
        self.steps.push(step);
    }

    pub fn replace_current(&mut self, step: FlowStep) {
        let last = self.steps.len() - 1;
        self.steps[last] = step;
    }

    /// Removes the current step unless it is the only one left.
    #[cfg(test)]
    pub fn pop(&mut self) -> Option<FlowStep> {
        if self.steps.len() > 1 {
            self.steps.pop()
        } else {
            None
        }
    }

    pub fn reset(&mut self, step: FlowStep) {
        self.steps.clear();
        self.steps.push(step);
        self.pending.clear();
    }

    /// Titles of the steps still ahead of the user.
    pub fn pending_steps(&self) -> &[String] {
        &self.pending
    }

    pub fn set_pending_steps<I, S>(&mut self, titles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending = titles.into_iter().map(Into::into).collect();
    }

    pub fn clear_pending_steps(&mut self) {
        self.pending.clear();
    }
}
