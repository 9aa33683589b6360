mod events;
mod jenkins;
pub mod sse;

use async_trait::async_trait;

use crate::auth::Token;
use crate::error::Result;
use crate::flow::{Credential, JobEvent, OrgFolder, Organization, RepositoryPage};

pub use events::LocalEventBus;
pub use jenkins::JenkinsClient;

/// Where GitHub credentials live on the Jenkins side.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Credential created by an earlier session, if any.
    async fn find_existing_credential(&self) -> Result<Option<Credential>>;

    /// Validates `token` with GitHub and stores it. Rejections surface as
    /// `FlowError::Api` carrying the response body.
    async fn create_access_token(&self, token: &Token) -> Result<Credential>;
}

/// Server API backing the creation flow.
#[async_trait]
pub trait CreationApi: Send + Sync {
    async fn list_organizations(&self, credential: &Credential) -> Result<Vec<Organization>>;

    async fn list_repositories(
        &self,
        credential: &Credential,
        organization: &str,
        page_number: u32,
        page_size: u32,
    ) -> Result<RepositoryPage>;

    /// `repositories: None` asks the folder to scan every repository.
    async fn create_org_folder(
        &self,
        credential: &Credential,
        organization: &Organization,
        repositories: Option<&[String]>,
    ) -> Result<OrgFolder>;

    async fn update_org_folder(
        &self,
        credential: &Credential,
        organization: &Organization,
        repositories: Option<&[String]>,
    ) -> Result<OrgFolder>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

pub type EventHandler = Box<dyn Fn(JobEvent) + Send + Sync>;

/// Push channel for server-originated job events.
pub trait EventBus: Send + Sync {
    fn register_handler(&self, handler: EventHandler) -> SubscriptionId;

    /// Unknown or already removed ids are ignored.
    fn remove_handler(&self, id: SubscriptionId);
}
