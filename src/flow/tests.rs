use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use super::*;
use crate::auth::Token;
use crate::error::{FlowError, Result};
use crate::providers::{CreationApi, CredentialStore, LocalEventBus};

const MIN_DELAY: Duration = Duration::from_millis(500);

#[derive(Default)]
struct MockCredentials {
    existing: Option<Credential>,
    rejection: Option<String>,
}

#[async_trait]
impl CredentialStore for MockCredentials {
    async fn find_existing_credential(&self) -> Result<Option<Credential>> {
        Ok(self.existing.clone())
    }

    async fn create_access_token(&self, _token: &Token) -> Result<Credential> {
        match &self.rejection {
            Some(body) => Err(FlowError::Api {
                status: 428,
                message: body.clone(),
            }),
            None => Ok(Credential::new("github")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct SaveCall {
    update: bool,
    organization: String,
    repositories: Option<Vec<String>>,
}

#[derive(Default)]
struct MockApi {
    organizations: Vec<Organization>,
    pages: Mutex<VecDeque<Result<RepositoryPage>>>,
    page_requests: Mutex<Vec<(String, u32, u32)>>,
    saves: Mutex<Vec<SaveCall>>,
    fail_organizations: bool,
    fail_save: bool,
}

impl MockApi {
    fn with_pages(mut self, pages: Vec<RepositoryPage>) -> Self {
        self.pages = Mutex::new(pages.into_iter().map(Ok).collect());
        self
    }

    fn page_requests(&self) -> Vec<(String, u32, u32)> {
        self.page_requests.lock().unwrap().clone()
    }

    fn saves(&self) -> Vec<SaveCall> {
        self.saves.lock().unwrap().clone()
    }

    fn record_save(
        &self,
        update: bool,
        organization: &Organization,
        repositories: Option<&[String]>,
    ) -> Result<OrgFolder> {
        self.saves.lock().unwrap().push(SaveCall {
            update,
            organization: organization.name.clone(),
            repositories: repositories.map(<[String]>::to_vec),
        });
        if self.fail_save {
            return Err(FlowError::Api {
                status: 500,
                message: "boom".to_string(),
            });
        }
        Ok(folder(&organization.name))
    }
}

#[async_trait]
impl CreationApi for MockApi {
    async fn list_organizations(&self, _credential: &Credential) -> Result<Vec<Organization>> {
        if self.fail_organizations {
            return Err(FlowError::Api {
                status: 502,
                message: "bad gateway".to_string(),
            });
        }
        Ok(self.organizations.clone())
    }

    async fn list_repositories(
        &self,
        _credential: &Credential,
        organization: &str,
        page_number: u32,
        page_size: u32,
    ) -> Result<RepositoryPage> {
        self.page_requests
            .lock()
            .unwrap()
            .push((organization.to_string(), page_number, page_size));
        self.pages.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(RepositoryPage {
                items: vec![],
                next_page: None,
            })
        })
    }

    async fn create_org_folder(
        &self,
        _credential: &Credential,
        organization: &Organization,
        repositories: Option<&[String]>,
    ) -> Result<OrgFolder> {
        self.record_save(false, organization, repositories)
    }

    async fn update_org_folder(
        &self,
        _credential: &Credential,
        organization: &Organization,
        repositories: Option<&[String]>,
    ) -> Result<OrgFolder> {
        self.record_save(true, organization, repositories)
    }
}

fn href(org: &str) -> String {
    format!("/blue/rest/organizations/jenkins/pipelines/{org}/")
}

fn folder(org: &str) -> OrgFolder {
    serde_json::from_value(json!({
        "name": org,
        "_links": {"self": {"href": href(org)}},
    }))
    .unwrap()
}

fn org(name: &str, auto_discover: bool, has_folder: bool) -> Organization {
    serde_json::from_value(json!({
        "name": name,
        "autoDiscover": auto_discover,
        "jenkinsOrganizationPipeline": has_folder,
    }))
    .unwrap()
}

fn page(names: &[(&str, bool)], next_page: Option<u32>) -> RepositoryPage {
    RepositoryPage {
        items: names
            .iter()
            .map(|(name, created)| Repository::new(*name, *created))
            .collect(),
        next_page,
    }
}

fn complete_event(org: &str, result: Option<&str>) -> JobEvent {
    JobEvent {
        blueocean_job_rest_url: Some(href(org)),
        jenkins_event: Some("job_run_queue_task_complete".to_string()),
        job_multibranch_indexing_result: result.map(str::to_string),
    }
}

struct Harness {
    flow: FlowManager,
    api: Arc<MockApi>,
    bus: Arc<LocalEventBus>,
}

fn harness(credentials: MockCredentials, api: MockApi) -> Harness {
    let api = Arc::new(api);
    let bus = LocalEventBus::new();
    let flow = FlowManager::new(Arc::new(credentials), api.clone(), bus.clone());
    Harness { flow, api, bus }
}

fn with_credential() -> MockCredentials {
    MockCredentials {
        existing: Some(Credential::new("github")),
        rejection: None,
    }
}

/// Starts the flow and selects `organization`.
async fn at_discover_choice(api: MockApi, organization: Organization) -> Harness {
    let mut h = harness(with_credential(), api);
    h.flow.start().await;
    h.flow.select_organization(organization);
    h
}

/// Drives the flow up to a saved single-repository folder for `acme`.
async fn saved_single_repo() -> Harness {
    let api = MockApi::default().with_pages(vec![page(&[("web", false)], None)]);
    let mut h = at_discover_choice(api, org("acme", false, false)).await;
    h.flow.select_discover(false).await.unwrap();
    h.flow.select_repository("web").unwrap();
    h.flow.save_single_repo().await.unwrap();
    assert_eq!(h.flow.status(), FlowStatus::Saved);
    h
}

// Credentials

#[tokio::test(start_paused = true)]
async fn test_start_with_existing_credential_lists_organizations() {
    let api = MockApi {
        organizations: vec![org("acme", false, false), org("umbrella", true, true)],
        ..MockApi::default()
    };
    let mut h = harness(with_credential(), api);

    h.flow.start().await;

    assert_eq!(h.flow.credential(), Some(&Credential::new("github")));
    assert_eq!(h.flow.organizations().len(), 2);
    assert_eq!(h.flow.status(), FlowStatus::ChooseOrganization);
    assert_eq!(h.flow.steps(), &[FlowStep::ChooseOrganization]);
    assert_eq!(h.flow.pending_steps(), &["Complete".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_start_without_credential_asks_for_token() {
    let mut h = harness(MockCredentials::default(), MockApi::default());

    h.flow.start().await;

    assert_eq!(h.flow.current_step(), FlowStep::AccessToken);
    assert_eq!(h.flow.status(), FlowStatus::AccessTokenEntry);
    assert!(h.flow.credential().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_accepted_token_loads_organizations() {
    let api = MockApi {
        organizations: vec![org("acme", false, false)],
        ..MockApi::default()
    };
    let mut h = harness(MockCredentials::default(), api);
    h.flow.start().await;

    let outcome = h.flow.create_access_token(&Token::from("ghp_valid")).await;

    assert!(outcome.is_success());
    assert_eq!(h.flow.current_step(), FlowStep::ChooseOrganization);
    assert_eq!(h.flow.status(), FlowStatus::ChooseOrganization);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_token_returns_detail_and_keeps_step() {
    let credentials = MockCredentials {
        existing: None,
        rejection: Some(r#"{"message":"Invalid accessToken"}"#.to_string()),
    };
    let mut h = harness(credentials, MockApi::default());
    h.flow.start().await;

    let outcome = h.flow.create_access_token(&Token::from("nope")).await;

    assert_eq!(
        outcome,
        TokenOutcome::Rejected {
            detail: r#"{"message":"Invalid accessToken"}"#.to_string()
        }
    );
    assert_eq!(h.flow.current_step(), FlowStep::AccessToken);
    assert_eq!(h.flow.status(), FlowStatus::AccessTokenEntry);
}

#[tokio::test(start_paused = true)]
async fn test_delayed_operations_respect_minimum_delay() {
    let mut h = harness(MockCredentials::default(), MockApi::default());

    let started = Instant::now();
    h.flow.start().await;
    assert!(started.elapsed() >= MIN_DELAY);

    let started = Instant::now();
    let outcome = h.flow.create_access_token(&Token::from("ghp")).await;
    assert!(outcome.is_success());
    // Token creation and the organization listing are each held back.
    assert!(started.elapsed() >= MIN_DELAY * 2);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_token_still_waits_minimum_delay() {
    let credentials = MockCredentials {
        existing: None,
        rejection: Some("bad credentials".to_string()),
    };
    let mut h = harness(credentials, MockApi::default());
    h.flow.start().await;

    let started = Instant::now();
    let outcome = h.flow.create_access_token(&Token::from("nope")).await;

    assert!(!outcome.is_success());
    assert!(started.elapsed() >= MIN_DELAY);
}

#[tokio::test(start_paused = true)]
async fn test_organization_failure_sets_error_status() {
    let api = MockApi {
        fail_organizations: true,
        ..MockApi::default()
    };
    let mut h = harness(with_credential(), api);

    h.flow.start().await;

    assert_eq!(h.flow.status(), FlowStatus::OrganizationsError);
    assert!(h.flow.organizations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_list_organizations_requires_credential() {
    let mut h = harness(MockCredentials::default(), MockApi::default());
    let result = h.flow.list_organizations().await;
    assert!(matches!(result, Err(FlowError::NoCredential)));
}

// Organizations and discovery

#[tokio::test(start_paused = true)]
async fn test_select_organization_pushes_discover_step() {
    let h = at_discover_choice(MockApi::default(), org("acme", false, false)).await;

    assert_eq!(h.flow.selected_organization().unwrap().name, "acme");
    assert_eq!(h.flow.status(), FlowStatus::ChooseDiscover);
    assert_eq!(
        h.flow.steps(),
        &[FlowStep::ChooseOrganization, FlowStep::ChooseDiscover]
    );
}

#[tokio::test(start_paused = true)]
async fn test_reselecting_organization_clears_repository_and_later_steps() {
    let api = MockApi::default().with_pages(vec![page(&[("web", false)], None)]);
    let mut h = at_discover_choice(api, org("acme", false, false)).await;
    h.flow.select_discover(false).await.unwrap();
    h.flow.select_repository("web").unwrap();

    h.flow.select_organization(org("umbrella", false, false));

    assert!(h.flow.selected_repository().is_none());
    assert_eq!(
        h.flow.steps(),
        &[FlowStep::ChooseOrganization, FlowStep::ChooseDiscover]
    );
}

#[tokio::test(start_paused = true)]
async fn test_auto_discover_org_skips_repository_fetch() {
    let mut h = at_discover_choice(MockApi::default(), org("acme", true, true)).await;

    h.flow.select_discover(true).await.unwrap();

    assert_eq!(h.flow.current_step(), FlowStep::AlreadyDiscover);
    assert_eq!(h.flow.status(), FlowStatus::AlreadyDiscover);
    assert!(h.api.page_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_select_discover_requires_organization() {
    let mut h = harness(with_credential(), MockApi::default());
    h.flow.start().await;

    let result = h.flow.select_discover(false).await;
    assert!(matches!(result, Err(FlowError::InvalidState(_))));
}

// Pagination

#[tokio::test(start_paused = true)]
async fn test_pagination_concatenates_pages_in_order() {
    let api = MockApi::default().with_pages(vec![
        page(&[("a", false), ("b", true)], Some(2)),
        page(&[("c", false)], Some(3)),
        page(&[("d", true), ("e", false)], None),
    ]);
    let mut h = at_discover_choice(api, org("acme", false, false)).await;

    h.flow.select_discover(false).await.unwrap();

    let names: Vec<&str> = h.flow.repositories().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
    assert_eq!(h.flow.cache().get("acme").unwrap(), h.flow.repositories());
    assert!(h.flow.cache().is_complete("acme"));
    assert_eq!(
        h.api.page_requests(),
        vec![
            ("acme".to_string(), 1, 100),
            ("acme".to_string(), 2, 100),
            ("acme".to_string(), 3, 100),
        ]
    );
    assert!(!h.flow.is_loading_repositories());
}

#[tokio::test(start_paused = true)]
async fn test_single_page_fetches_once() {
    let api = MockApi::default().with_pages(vec![page(&[("a", false)], None)]);
    let mut h = at_discover_choice(api, org("acme", false, false)).await;

    h.flow.select_discover(false).await.unwrap();

    assert_eq!(h.api.page_requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_only_first_page_is_delayed() {
    let api = MockApi::default().with_pages(vec![
        page(&[("a", false)], Some(2)),
        page(&[("b", false)], Some(3)),
        page(&[("c", false)], Some(4)),
        page(&[("d", false)], None),
    ]);
    let mut h = at_discover_choice(api, org("acme", false, false)).await;

    let started = Instant::now();
    h.flow.select_discover(false).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= MIN_DELAY);
    assert!(elapsed < MIN_DELAY * 2);
}

#[tokio::test(start_paused = true)]
async fn test_choose_one_goes_to_repository_picker() {
    let api = MockApi::default().with_pages(vec![page(&[("a", false)], None)]);
    let mut h = at_discover_choice(api, org("acme", false, false)).await;

    h.flow.select_discover(false).await.unwrap();

    assert_eq!(h.flow.current_step(), FlowStep::ChooseRepository);
    assert_eq!(h.flow.status(), FlowStatus::ChooseRepository);
}

#[tokio::test(start_paused = true)]
async fn test_auto_discover_without_existing_folder_confirms() {
    let api = MockApi::default().with_pages(vec![page(&[("a", false)], None)]);
    let mut h = at_discover_choice(api, org("acme", false, false)).await;

    h.flow.select_discover(true).await.unwrap();

    assert_eq!(h.flow.current_step(), FlowStep::ConfirmDiscover);
    assert_eq!(h.flow.status(), FlowStatus::ConfirmDiscover);
    assert_eq!(h.api.page_requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_completed_cache_is_not_refetched() {
    let api = MockApi::default().with_pages(vec![
        page(&[("a", false)], Some(2)),
        page(&[("b", false)], None),
    ]);
    let mut h = at_discover_choice(api, org("acme", false, false)).await;
    h.flow.select_discover(false).await.unwrap();

    h.flow.select_organization(org("acme", false, false));
    h.flow.select_discover(false).await.unwrap();

    assert_eq!(h.api.page_requests().len(), 2);
    assert_eq!(h.flow.repositories().len(), 2);
    assert_eq!(h.flow.status(), FlowStatus::ChooseRepository);
}

#[tokio::test(start_paused = true)]
async fn test_page_failure_sets_error_and_leaves_cache_incomplete() {
    let api = MockApi::default();
    *api.pages.lock().unwrap() = VecDeque::from(vec![
        Ok(page(&[("a", false)], Some(2))),
        Err(FlowError::Api {
            status: 500,
            message: "oops".to_string(),
        }),
    ]);
    let mut h = at_discover_choice(api, org("acme", false, false)).await;

    h.flow.select_discover(false).await.unwrap();

    assert_eq!(h.flow.status(), FlowStatus::RepositoriesError);
    assert!(!h.flow.cache().is_complete("acme"));
    assert!(!h.flow.is_loading_repositories());
}

#[tokio::test(start_paused = true)]
async fn test_failed_pagination_blocks_selection_and_save() {
    let api = MockApi::default();
    *api.pages.lock().unwrap() = VecDeque::from(vec![
        Ok(page(&[("A", true), ("x", false)], Some(2))),
        Err(FlowError::Api {
            status: 500,
            message: "oops".to_string(),
        }),
    ]);
    let mut h = at_discover_choice(api, org("acme", false, true)).await;
    h.flow.select_discover(false).await.unwrap();

    assert_eq!(h.flow.status(), FlowStatus::RepositoriesError);
    assert!(h.flow.repositories().is_empty());
    assert!(matches!(
        h.flow.select_repository("x"),
        Err(FlowError::InvalidState(_))
    ));
    assert!(matches!(
        h.flow.save_single_repo().await,
        Err(FlowError::InvalidState(_))
    ));
    assert!(h.api.saves().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_switching_organization_drops_previous_repositories() {
    let api = MockApi::default().with_pages(vec![page(&[("acme-only", false)], None)]);
    let mut h = at_discover_choice(api, org("acme", false, false)).await;
    h.flow.select_discover(true).await.unwrap();
    assert_eq!(h.flow.repositories().len(), 1);

    h.flow.select_organization(org("umbrella", false, true));

    assert!(h.flow.repositories().is_empty());
    assert!(!h.flow.selected_auto_discover());
    assert!(matches!(
        h.flow.select_repository("acme-only"),
        Err(FlowError::InvalidState(_))
    ));
    assert!(h.flow.save_single_repo().await.is_err());
    assert!(h.api.saves().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_selectable_repositories_exclude_scanned() {
    let api = MockApi::default().with_pages(vec![
        page(&[("a", true), ("b", false)], Some(2)),
        page(&[("c", true), ("d", false)], None),
    ]);
    let mut h = at_discover_choice(api, org("acme", false, true)).await;
    h.flow.select_discover(false).await.unwrap();

    let selectable: Vec<&str> = h
        .flow
        .selectable_repositories()
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(selectable, vec!["b", "d"]);
    assert!(h.flow.select_repository("a").is_err());
    assert!(h.flow.select_repository("d").is_ok());
}

// Saving

#[tokio::test(start_paused = true)]
async fn test_single_repo_save_merges_scanned_repositories() {
    let api = MockApi::default().with_pages(vec![
        page(&[("A", true), ("other", false)], Some(2)),
        page(&[("B", true), ("X", false)], None),
    ]);
    let mut h = at_discover_choice(api, org("acme", false, true)).await;
    h.flow.select_discover(false).await.unwrap();
    h.flow.select_repository("X").unwrap();

    h.flow.save_single_repo().await.unwrap();

    assert_eq!(
        h.api.saves(),
        vec![SaveCall {
            update: true,
            organization: "acme".to_string(),
            repositories: Some(vec!["A".to_string(), "B".to_string(), "X".to_string()]),
        }]
    );
    assert_eq!(h.flow.status(), FlowStatus::Saved);
    assert_eq!(h.flow.current_step(), FlowStep::Complete);
    assert!(h.flow.pending_steps().is_empty());
    assert_eq!(h.flow.completion_state(), CompletionState::Armed);
    assert_eq!(h.bus.handler_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_auto_discover_save_creates_without_names() {
    let api = MockApi::default().with_pages(vec![page(&[("a", false)], None)]);
    let mut h = at_discover_choice(api, org("acme", false, false)).await;
    h.flow.select_discover(true).await.unwrap();

    h.flow.save_auto_discover().await.unwrap();

    assert_eq!(
        h.api.saves(),
        vec![SaveCall {
            update: false,
            organization: "acme".to_string(),
            repositories: None,
        }]
    );
    assert_eq!(h.flow.saved_org_folder(), Some(&folder("acme")));
}

/// Loads a one-repository organization, saves it and reports how long the
/// save took together with the recorded save calls.
async fn timed_save(organization: Organization, auto_discover: bool) -> (Duration, Vec<SaveCall>) {
    let api = MockApi::default().with_pages(vec![page(&[("web", false)], None)]);
    let mut h = at_discover_choice(api, organization).await;
    h.flow.select_discover(auto_discover).await.unwrap();

    let started = Instant::now();
    if auto_discover {
        h.flow.save_auto_discover().await.unwrap();
    } else {
        h.flow.select_repository("web").unwrap();
        h.flow.save_single_repo().await.unwrap();
    }
    (started.elapsed(), h.api.saves())
}

#[tokio::test(start_paused = true)]
async fn test_saves_respect_minimum_delay() {
    let cases = [
        (org("acme", false, false), false, false),
        (org("acme", false, true), false, true),
        (org("acme", false, false), true, false),
        (org("acme", false, true), true, true),
    ];

    for (organization, auto_discover, update) in cases {
        let (elapsed, saves) = timed_save(organization, auto_discover).await;
        assert!(elapsed >= MIN_DELAY, "auto={auto_discover} update={update}");
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].update, update);
    }
}

#[tokio::test(start_paused = true)]
async fn test_save_failure_sets_error_without_arming() {
    let api = MockApi {
        fail_save: true,
        ..MockApi::default()
    }
    .with_pages(vec![page(&[("web", false)], None)]);
    let mut h = at_discover_choice(api, org("acme", false, false)).await;
    h.flow.select_discover(false).await.unwrap();
    h.flow.select_repository("web").unwrap();

    h.flow.save_single_repo().await.unwrap();

    assert_eq!(h.flow.status(), FlowStatus::SaveError);
    assert!(!h.flow.is_completion_armed());
    assert_eq!(h.bus.handler_count(), 0);
    assert_eq!(h.api.saves().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_save_single_repo_requires_repository() {
    let api = MockApi::default().with_pages(vec![page(&[("web", false)], None)]);
    let mut h = at_discover_choice(api, org("acme", false, false)).await;
    h.flow.select_discover(false).await.unwrap();

    let result = h.flow.save_single_repo().await;

    assert!(matches!(result, Err(FlowError::InvalidState(_))));
    assert!(h.api.saves().is_empty());
}

// Completion

#[tokio::test(start_paused = true)]
async fn test_success_event_completes_flow() {
    let mut h = saved_single_repo().await;

    h.bus.publish(&complete_event("acme", Some("SUCCESS")));
    let status = h.flow.wait_for_completion().await;

    assert_eq!(status, FlowStatus::Complete);
    assert_eq!(h.flow.completion_state(), CompletionState::Resolved);
    assert_eq!(h.bus.handler_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failure_event_sets_event_error() {
    let mut h = saved_single_repo().await;

    h.flow.handle_event(&complete_event("acme", Some("FAILURE")));

    assert_eq!(h.flow.status(), FlowStatus::EventError);
    assert!(!h.flow.is_completion_armed());
}

#[tokio::test(start_paused = true)]
async fn test_non_matching_event_is_ignored() {
    let mut h = saved_single_repo().await;

    h.flow.handle_event(&complete_event("other-org", Some("SUCCESS")));

    assert_eq!(h.flow.status(), FlowStatus::Saved);
    assert!(h.flow.is_completion_armed());
}

#[tokio::test(start_paused = true)]
async fn test_partial_and_unknown_results_stay_armed() {
    let mut h = saved_single_repo().await;

    h.flow.handle_event(&complete_event("acme", None));
    h.flow.handle_event(&complete_event("acme", Some("UNSTABLE")));
    h.flow.handle_event(&JobEvent {
        blueocean_job_rest_url: Some(href("acme")),
        ..JobEvent::default()
    });

    assert_eq!(h.flow.status(), FlowStatus::Saved);
    assert_eq!(h.flow.completion_state(), CompletionState::Armed);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_disarms_and_ignores_late_events() {
    let mut h = saved_single_repo().await;

    let started = Instant::now();
    let status = h.flow.wait_for_completion().await;

    assert_eq!(status, FlowStatus::EventTimeout);
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert_eq!(h.flow.completion_state(), CompletionState::TimedOut);
    assert_eq!(h.bus.handler_count(), 0);

    h.bus.publish(&complete_event("acme", Some("SUCCESS")));
    h.flow.handle_event(&complete_event("acme", Some("SUCCESS")));
    h.flow.poll_completion();
    assert_eq!(h.flow.status(), FlowStatus::EventTimeout);
}

#[tokio::test(start_paused = true)]
async fn test_wait_skips_unrelated_events_before_success() {
    let mut h = saved_single_repo().await;

    h.bus.publish(&complete_event("other-org", Some("FAILURE")));
    h.bus.publish(&complete_event("acme", None));
    h.bus.publish(&complete_event("acme", Some("SUCCESS")));

    assert_eq!(h.flow.wait_for_completion().await, FlowStatus::Complete);
}

#[tokio::test(start_paused = true)]
async fn test_poll_completion_handles_queued_events() {
    let mut h = saved_single_repo().await;

    h.bus.publish(&complete_event("acme", Some("SUCCESS")));
    h.flow.poll_completion();

    assert_eq!(h.flow.status(), FlowStatus::Complete);
}

#[tokio::test(start_paused = true)]
async fn test_disarm_is_idempotent() {
    let mut h = saved_single_repo().await;

    h.flow.disarm();
    h.flow.disarm();

    assert_eq!(h.bus.handler_count(), 0);
    assert_eq!(h.flow.completion_state(), CompletionState::Idle);
    assert_eq!(h.flow.wait_for_completion().await, FlowStatus::Saved);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_manager_releases_subscription() {
    let h = saved_single_repo().await;
    let bus = h.bus.clone();

    drop(h);

    assert_eq!(bus.handler_count(), 0);
}

// Notifications and navigation

#[tokio::test(start_paused = true)]
async fn test_changes_are_broadcast() {
    let mut h = harness(with_credential(), MockApi::default());
    let mut changes = h.flow.subscribe();

    h.flow.start().await;

    let mut statuses = Vec::new();
    while let Ok(change) = changes.try_recv() {
        if let FlowChange::Status(status) = change {
            statuses.push(status);
        }
    }
    assert_eq!(
        statuses,
        vec![
            FlowStatus::LoadingCredentials,
            FlowStatus::LoadingOrganizations,
            FlowStatus::ChooseOrganization,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_go_back_keeps_first_step() {
    let mut h = at_discover_choice(MockApi::default(), org("acme", false, false)).await;

    assert_eq!(h.flow.go_back(), Some(FlowStep::ChooseDiscover));
    assert_eq!(h.flow.go_back(), None);
    assert_eq!(h.flow.current_step(), FlowStep::ChooseOrganization);
}
