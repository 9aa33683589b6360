use serde::Serialize;
use std::fmt;

/// Where the creation flow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    LoadingCredentials,
    AccessTokenEntry,
    LoadingOrganizations,
    ChooseOrganization,
    OrganizationsError,
    ChooseDiscover,
    LoadingRepositories,
    RepositoriesError,
    AlreadyDiscover,
    ConfirmDiscover,
    ChooseRepository,
    Saving,
    SaveError,
    /// The org folder exists; waiting for its first scan to finish.
    Saved,
    Complete,
    EventError,
    EventTimeout,
}

impl FlowStatus {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::OrganizationsError
                | Self::RepositoriesError
                | Self::SaveError
                | Self::EventError
                | Self::EventTimeout
        )
    }

    /// No further transition happens without the user starting over.
    pub fn is_terminal(&self) -> bool {
        self.is_error() || matches!(self, Self::Complete | Self::AlreadyDiscover)
    }

    /// Waiting on the network rather than on the user.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::LoadingCredentials
                | Self::LoadingOrganizations
                | Self::LoadingRepositories
                | Self::Saving
                | Self::Saved
        )
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LoadingCredentials => "loading_credentials",
            Self::AccessTokenEntry => "access_token_entry",
            Self::LoadingOrganizations => "loading_organizations",
            Self::ChooseOrganization => "choose_organization",
            Self::OrganizationsError => "organizations_error",
            Self::ChooseDiscover => "choose_discover",
            Self::LoadingRepositories => "loading_repositories",
            Self::RepositoriesError => "repositories_error",
            Self::AlreadyDiscover => "already_discover",
            Self::ConfirmDiscover => "confirm_discover",
            Self::ChooseRepository => "choose_repository",
            Self::Saving => "saving",
            Self::SaveError => "save_error",
            Self::Saved => "saved",
            Self::Complete => "complete",
            Self::EventError => "event_error",
            Self::EventTimeout => "event_timeout",
        };
        write!(f, "{s}")
    }
}
