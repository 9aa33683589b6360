use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::broadcast;

use super::cache::RepositoryCache;
use super::completion::{CompletionSignal, CompletionState, CompletionWatch};
use super::status::FlowStatus;
use super::steps::{FlowStep, StepStack};
use super::types::{Credential, JobEvent, OrgFolder, Organization, Repository};
use crate::auth::Token;
use crate::error::{FlowError, Result};
use crate::providers::{CreationApi, CredentialStore, EventBus};
use crate::wait::wait_at_least;

const CHANGE_CHANNEL_CAPACITY: usize = 64;
const INDEXING_SUCCESS: &str = "SUCCESS";
const INDEXING_FAILURE: &str = "FAILURE";

/// Timing and paging knobs for a [`FlowManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowSettings {
    /// Floor on how fast a visible network step may resolve.
    pub min_delay: Duration,
    pub page_size: u32,
    /// How long to wait for the first scan after saving.
    pub completion_timeout: Duration,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(500),
            page_size: 100,
            completion_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of submitting an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOutcome {
    Accepted,
    /// `detail` is the server's response body.
    Rejected { detail: String },
}

impl TokenOutcome {
    #[cfg(test)]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Notification sent whenever observable flow state changes.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowChange {
    Status(FlowStatus),
    Steps {
        current: FlowStep,
        pending: Vec<String>,
    },
    CredentialReady,
    Organizations(usize),
    OrganizationSelected(String),
    RepositoriesPage {
        organization: String,
        page: u32,
        total: usize,
    },
    RepositorySelected(String),
    Saved(OrgFolder),
}

/// Drives the GitHub organization folder creation wizard.
///
/// Network calls go through the injected collaborators; every operation that
/// shows a loading step is held back to at least `min_delay`. All state is
/// owned here and only changes inside the `&mut self` operations, each of
/// which announces what it changed on the [`FlowChange`] channel.
pub struct FlowManager {
    credentials: Arc<dyn CredentialStore>,
    api: Arc<dyn CreationApi>,
    events: Arc<dyn EventBus>,
    settings: FlowSettings,

    status: FlowStatus,
    steps: StepStack,
    credential: Option<Credential>,
    organizations: Vec<Organization>,
    selected_organization: Option<Organization>,
    selected_auto_discover: bool,
    repositories: Vec<Repository>,
    selected_repository: Option<Repository>,
    cache: RepositoryCache,
    saved_org_folder: Option<OrgFolder>,

    completion: Option<CompletionWatch>,
    completion_state: CompletionState,

    changes: broadcast::Sender<FlowChange>,
}

impl FlowManager {
    #[cfg(test)]
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        api: Arc<dyn CreationApi>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self::with_settings(credentials, api, events, FlowSettings::default())
    }

    pub fn with_settings(
        credentials: Arc<dyn CredentialStore>,
        api: Arc<dyn CreationApi>,
        events: Arc<dyn EventBus>,
        settings: FlowSettings,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        Self {
            credentials,
            api,
            events,
            settings,
            status: FlowStatus::LoadingCredentials,
            steps: StepStack::new(FlowStep::Loading),
            credential: None,
            organizations: Vec::new(),
            selected_organization: None,
            selected_auto_discover: false,
            repositories: Vec::new(),
            selected_repository: None,
            cache: RepositoryCache::new(),
            saved_org_folder: None,
            completion: None,
            completion_state: CompletionState::Idle,
            changes,
        }
    }

    /// Subscribe to state change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<FlowChange> {
        self.changes.subscribe()
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    pub fn status(&self) -> FlowStatus {
        self.status
    }

    pub fn current_step(&self) -> FlowStep {
        self.steps.current()
    }

    pub fn steps(&self) -> &[FlowStep] {
        self.steps.steps()
    }

    pub fn pending_steps(&self) -> &[String] {
        self.steps.pending_steps()
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn organizations(&self) -> &[Organization] {
        &self.organizations
    }

    pub fn find_organization(&self, name: &str) -> Option<&Organization> {
        self.organizations
            .iter()
            .find(|org| org.name.eq_ignore_ascii_case(name))
    }

    pub fn selected_organization(&self) -> Option<&Organization> {
        self.selected_organization.as_ref()
    }

    pub fn selected_auto_discover(&self) -> bool {
        self.selected_auto_discover
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    #[cfg(test)]
    pub fn is_loading_repositories(&self) -> bool {
        self.status == FlowStatus::LoadingRepositories
    }

    /// Repositories the user may still pick: those not already scanned by an
    /// existing org folder.
    pub fn selectable_repositories(&self) -> Vec<&Repository> {
        self.repositories
            .iter()
            .filter(|repo| !repo.pipeline_created)
            .collect()
    }

    pub fn selected_repository(&self) -> Option<&Repository> {
        self.selected_repository.as_ref()
    }

    pub fn cache(&self) -> &RepositoryCache {
        &self.cache
    }

    pub fn saved_org_folder(&self) -> Option<&OrgFolder> {
        self.saved_org_folder.as_ref()
    }

    pub fn completion_state(&self) -> CompletionState {
        self.completion_state
    }

    #[cfg(test)]
    pub fn is_completion_armed(&self) -> bool {
        self.completion.is_some()
    }

    // Credentials

    /// Begins the flow: reuse an existing credential or ask for a token.
    pub async fn start(&mut self) {
        self.disarm();
        self.steps.reset(FlowStep::Loading);
        self.notify_steps();
        self.set_status(FlowStatus::LoadingCredentials);

        let credentials = Arc::clone(&self.credentials);
        let existing = wait_at_least(
            self.settings.min_delay,
            credentials.find_existing_credential(),
        )
        .await
        .unwrap_or_else(|err| {
            warn!("Failed to look up existing credential: {err}");
            None
        });

        match existing {
            Some(credential) => {
                info!("Reusing existing credential {}", credential.credential_id);
                self.set_credential(credential);
                if let Err(err) = self.list_organizations().await {
                    warn!("Cannot list organizations: {err}");
                }
            }
            None => {
                info!("No existing credential, asking for an access token");
                self.steps.replace_current(FlowStep::AccessToken);
                self.notify_steps();
                self.set_status(FlowStatus::AccessTokenEntry);
            }
        }
    }

    /// Validates and stores `token`.
    ///
    /// A rejected token leaves the step and status untouched so the entry
    /// form can show `detail` inline.
    pub async fn create_access_token(&mut self, token: &Token) -> TokenOutcome {
        let credentials = Arc::clone(&self.credentials);
        let result = wait_at_least(
            self.settings.min_delay,
            credentials.create_access_token(token),
        )
        .await;

        match result {
            Ok(credential) => {
                info!("Access token accepted, credential {}", credential.credential_id);
                self.set_credential(credential);
                self.steps.replace_current(FlowStep::Loading);
                self.notify_steps();
                if let Err(err) = self.list_organizations().await {
                    warn!("Cannot list organizations: {err}");
                }
                TokenOutcome::Accepted
            }
            Err(err) => {
                warn!("Access token rejected: {err}");
                TokenOutcome::Rejected {
                    detail: err.detail(),
                }
            }
        }
    }

    // Organizations

    /// Loads the organization list for the stored credential.
    ///
    /// A failed fetch is recorded as `OrganizationsError`; only a missing
    /// credential is returned as an error.
    pub async fn list_organizations(&mut self) -> Result<()> {
        let credential = self.credential.clone().ok_or(FlowError::NoCredential)?;
        self.set_status(FlowStatus::LoadingOrganizations);

        let api = Arc::clone(&self.api);
        let result = wait_at_least(
            self.settings.min_delay,
            api.list_organizations(&credential),
        )
        .await;

        match result {
            Ok(organizations) => {
                info!("Loaded {} organizations", organizations.len());
                self.organizations = organizations;
                let _ = self
                    .changes
                    .send(FlowChange::Organizations(self.organizations.len()));

                self.steps.replace_current(FlowStep::ChooseOrganization);
                self.steps.set_pending_steps([FlowStep::Complete.title()]);
                self.notify_steps();
                self.set_status(FlowStatus::ChooseOrganization);
            }
            Err(err) => {
                warn!("Failed to load organizations: {err}");
                self.set_status(FlowStatus::OrganizationsError);
            }
        }
        Ok(())
    }

    pub fn select_organization(&mut self, organization: Organization) {
        info!("Selected organization {}", organization.name);
        let name = organization.name.clone();
        self.selected_organization = Some(organization);
        self.selected_repository = None;
        self.selected_auto_discover = false;
        self.repositories.clear();
        let _ = self.changes.send(FlowChange::OrganizationSelected(name));

        self.set_status(FlowStatus::ChooseDiscover);
        self.steps
            .push_after(FlowStep::ChooseOrganization, FlowStep::ChooseDiscover);
        self.notify_steps();
    }

    // Discovery and repositories

    /// Records whether every repository should be scanned, then either
    /// confirms an existing auto-discovering folder or loads repositories.
    pub async fn select_discover(&mut self, auto_discover: bool) -> Result<()> {
        let organization = self.selected_organization.clone().ok_or_else(|| {
            FlowError::InvalidState("an organization must be selected first".to_string())
        })?;
        self.selected_auto_discover = auto_discover;
        debug!(
            "Discover choice for {}: auto={auto_discover}",
            organization.name
        );

        if organization.auto_discover && auto_discover {
            self.steps
                .push_after(FlowStep::ChooseDiscover, FlowStep::AlreadyDiscover);
            self.notify_steps();
            self.set_status(FlowStatus::AlreadyDiscover);
            return Ok(());
        }

        self.load_all_repositories(&organization).await
    }

    async fn load_all_repositories(&mut self, organization: &Organization) -> Result<()> {
        let credential = self.credential.clone().ok_or(FlowError::NoCredential)?;
        let org_name = organization.name.as_str();

        if let Some(cached) = self.cache.get_complete(org_name) {
            debug!("Using {} cached repositories for {org_name}", cached.len());
            self.repositories = cached.to_vec();
            self.load_all_repositories_complete();
            return Ok(());
        }

        self.set_status(FlowStatus::LoadingRepositories);
        self.repositories.clear();

        let api = Arc::clone(&self.api);
        let page_size = self.settings.page_size;
        let mut page_number = 1;

        loop {
            debug!("Fetching repositories for {org_name}, page {page_number}");
            let fetch = api.list_repositories(&credential, org_name, page_number, page_size);
            // Only the first page is held to the minimum delay.
            let result = if page_number == 1 {
                wait_at_least(self.settings.min_delay, fetch).await
            } else {
                fetch.await
            };

            let page = match result {
                Ok(page) => page,
                Err(err) => {
                    warn!("Failed to load repositories for {org_name} (page {page_number}): {err}");
                    self.repositories.clear();
                    self.set_status(FlowStatus::RepositoriesError);
                    return Ok(());
                }
            };

            self.repositories.extend(page.items);
            self.cache.update(org_name, &self.repositories);
            let _ = self.changes.send(FlowChange::RepositoriesPage {
                organization: org_name.to_string(),
                page: page_number,
                total: self.repositories.len(),
            });

            match page.next_page {
                Some(next) if next > page_number => page_number = next,
                Some(next) => {
                    warn!("Server returned non-advancing next page {next} after {page_number}, stopping");
                    break;
                }
                None => break,
            }
        }

        self.cache.mark_complete(org_name);
        info!(
            "Loaded {} repositories for {org_name}",
            self.repositories.len()
        );
        self.load_all_repositories_complete();
        Ok(())
    }

    fn load_all_repositories_complete(&mut self) {
        if self.selected_auto_discover {
            self.steps
                .push_after(FlowStep::ChooseDiscover, FlowStep::ConfirmDiscover);
            self.notify_steps();
            self.set_status(FlowStatus::ConfirmDiscover);
        } else {
            self.steps
                .push_after(FlowStep::ChooseDiscover, FlowStep::ChooseRepository);
            self.notify_steps();
            self.set_status(FlowStatus::ChooseRepository);
        }
    }

    /// Selects a repository that no org folder scans yet.
    pub fn select_repository(&mut self, name: &str) -> Result<()> {
        let repository = self
            .loaded_repositories()?
            .iter()
            .find(|repo| !repo.pipeline_created && repo.name == name)
            .cloned()
            .ok_or_else(|| {
                FlowError::InvalidState(format!("repository {name} is not selectable"))
            })?;

        info!("Selected repository {}", repository.name);
        self.selected_repository = Some(repository);
        let _ = self
            .changes
            .send(FlowChange::RepositorySelected(name.to_string()));
        Ok(())
    }

    /// Fully paginated repositories of the selected organization.
    fn loaded_repositories(&self) -> Result<&[Repository]> {
        let organization = self.selected_organization.as_ref().ok_or_else(|| {
            FlowError::InvalidState("an organization must be selected first".to_string())
        })?;
        self.cache.get_complete(&organization.name).ok_or_else(|| {
            FlowError::InvalidState(format!(
                "repositories for {} are not fully loaded",
                organization.name
            ))
        })
    }

    // Saving

    /// Saves a folder scanning the already-scanned repositories plus the
    /// selected one.
    pub async fn save_single_repo(&mut self) -> Result<()> {
        let organization = self.require_organization()?;
        let repository = self.selected_repository.as_ref().ok_or_else(|| {
            FlowError::InvalidState("a repository must be selected first".to_string())
        })?;

        let mut names = self.cache.scanned_names(&organization.name)?;
        names.push(repository.name.clone());

        self.save_org_folder(organization, Some(names)).await;
        Ok(())
    }

    /// Saves a folder that scans every repository in the organization.
    pub async fn save_auto_discover(&mut self) -> Result<()> {
        let organization = self.require_organization()?;
        self.save_org_folder(organization, None).await;
        Ok(())
    }

    fn require_organization(&self) -> Result<Organization> {
        if self.credential.is_none() {
            return Err(FlowError::NoCredential);
        }
        self.selected_organization.clone().ok_or_else(|| {
            FlowError::InvalidState("an organization must be selected first".to_string())
        })
    }

    async fn save_org_folder(&mut self, organization: Organization, repositories: Option<Vec<String>>) {
        let Some(credential) = self.credential.clone() else {
            return;
        };
        // A retry must not leave the previous attempt's listener behind.
        self.disarm();

        self.set_status(FlowStatus::Saving);
        if self.steps.current() != FlowStep::Complete {
            self.steps.push(FlowStep::Complete);
        }
        self.steps.clear_pending_steps();
        self.notify_steps();

        let update = organization.has_org_folder();
        info!(
            "{} org folder for {} ({})",
            if update { "Updating" } else { "Creating" },
            organization.name,
            match &repositories {
                Some(names) => format!("repositories: {}", names.join(", ")),
                None => "all repositories".to_string(),
            }
        );

        let api = Arc::clone(&self.api);
        let save = async {
            if update {
                api.update_org_folder(&credential, &organization, repositories.as_deref())
                    .await
            } else {
                api.create_org_folder(&credential, &organization, repositories.as_deref())
                    .await
            }
        };

        match wait_at_least(self.settings.min_delay, save).await {
            Ok(folder) => {
                info!("Saved org folder {}", folder.name);
                self.saved_org_folder = Some(folder.clone());
                let _ = self.changes.send(FlowChange::Saved(folder));
                self.set_status(FlowStatus::Saved);
                self.arm_completion();
            }
            Err(err) => {
                warn!("Failed to save org folder for {}: {err}", organization.name);
                self.set_status(FlowStatus::SaveError);
            }
        }
    }

    // Completion

    fn arm_completion(&mut self) {
        self.disarm();
        self.completion = Some(CompletionWatch::arm(
            Arc::clone(&self.events),
            self.settings.completion_timeout,
        ));
        self.completion_state = CompletionState::Armed;
    }

    /// Releases the completion subscription and its timer. Safe to call at any time.
    pub fn disarm(&mut self) {
        if self.completion.take().is_some() && self.completion_state == CompletionState::Armed {
            self.completion_state = CompletionState::Idle;
        }
    }

    fn finish_completion(&mut self, state: CompletionState, status: FlowStatus) {
        self.completion = None;
        self.completion_state = state;
        self.set_status(status);
    }

    /// Reacts to a job event while the completion listener is armed.
    ///
    /// Only queue-task-complete events for the saved folder with a
    /// `SUCCESS` or `FAILURE` indexing result are terminal; anything else,
    /// including payloads with missing fields, keeps waiting.
    pub fn handle_event(&mut self, event: &JobEvent) {
        if self.completion.is_none() {
            debug!("Ignoring event, completion listener is not armed");
            return;
        }
        let Some(folder) = &self.saved_org_folder else {
            return;
        };
        if !event.targets(folder) {
            debug!(
                "Ignoring event for {:?}",
                event.blueocean_job_rest_url.as_deref()
            );
            return;
        }
        if !event.is_queue_task_complete() {
            return;
        }

        match event.job_multibranch_indexing_result.as_deref() {
            Some(INDEXING_SUCCESS) => {
                info!("First scan of {} finished", folder.name);
                self.finish_completion(CompletionState::Resolved, FlowStatus::Complete);
            }
            Some(INDEXING_FAILURE) => {
                warn!("First scan of {} failed", folder.name);
                self.finish_completion(CompletionState::Resolved, FlowStatus::EventError);
            }
            other => {
                debug!("Indexing result {other:?} is not final, still waiting");
            }
        }
    }

    /// Gives up on the completion event.
    pub fn handle_timeout(&mut self) {
        if self.completion.is_none() {
            return;
        }
        warn!(
            "No completion event within {:?}",
            self.settings.completion_timeout
        );
        self.finish_completion(CompletionState::TimedOut, FlowStatus::EventTimeout);
    }

    /// Handles signals that already arrived without waiting for more.
    pub fn poll_completion(&mut self) {
        while let Some(signal) = self.completion.as_mut().and_then(CompletionWatch::try_next_signal) {
            self.handle_signal(signal);
        }
    }

    /// Waits until the completion listener resolves or times out and returns
    /// the resulting status. Returns immediately when nothing is armed.
    pub async fn wait_for_completion(&mut self) -> FlowStatus {
        self.poll_completion();
        while let Some(watch) = self.completion.as_mut() {
            let signal = watch.next_signal().await;
            match signal {
                Some(signal) => self.handle_signal(signal),
                None => self.handle_timeout(),
            }
        }
        self.status
    }

    fn handle_signal(&mut self, signal: CompletionSignal) {
        match signal {
            CompletionSignal::Event(event) => self.handle_event(&event),
            CompletionSignal::TimedOut => self.handle_timeout(),
        }
    }

    // Navigation

    /// Steps back one screen. The first step is never removed.
    #[cfg(test)]
    pub fn go_back(&mut self) -> Option<FlowStep> {
        let popped = self.steps.pop();
        if popped.is_some() {
            self.notify_steps();
        }
        popped
    }

    fn set_credential(&mut self, credential: Credential) {
        self.credential = Some(credential);
        let _ = self.changes.send(FlowChange::CredentialReady);
    }

    fn set_status(&mut self, status: FlowStatus) {
        if self.status != status {
            info!("Flow status: {} -> {status}", self.status);
        }
        self.status = status;
        let _ = self.changes.send(FlowChange::Status(status));
    }

    fn notify_steps(&self) {
        let _ = self.changes.send(FlowChange::Steps {
            current: self.steps.current(),
            pending: self.steps.pending_steps().to_vec(),
        });
    }
}
