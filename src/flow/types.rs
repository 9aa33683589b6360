use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Jenkins event name announcing that an indexing run has left the queue.
pub const QUEUE_TASK_COMPLETE: &str = "job_run_queue_task_complete";

/// Proof that the user authorized Jenkins to talk to GitHub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "credentialId")]
    pub credential_id: String,
}

impl Credential {
    pub fn new(credential_id: impl Into<String>) -> Self {
        Self {
            credential_id: credential_id.into(),
        }
    }
}

/// A GitHub organization (or user account) visible through the credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub name: String,
    /// Whether the existing org folder already scans every repository.
    #[serde(default)]
    pub auto_discover: bool,
    /// `false`/absent when no org folder exists, otherwise the folder resource
    /// (older servers send `true`).
    #[serde(default)]
    pub jenkins_organization_pipeline: Value,
}

impl Organization {
    pub fn has_org_folder(&self) -> bool {
        !matches!(
            self.jenkins_organization_pipeline,
            Value::Null | Value::Bool(false)
        )
    }
}

/// A repository in the selected organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub name: String,
    /// Already scanned by the organization's existing org folder.
    #[serde(default)]
    pub pipeline_created: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
}

impl Repository {
    pub fn new(name: impl Into<String>, pipeline_created: bool) -> Self {
        Self {
            name: name.into(),
            pipeline_created,
            full_name: None,
            description: None,
            private: false,
            default_branch: None,
        }
    }
}

/// One page of repositories; `next_page` is `None` on the last page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryPage {
    #[serde(default)]
    pub items: Vec<Repository>,
    #[serde(default)]
    pub next_page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderLinks {
    #[serde(rename = "self")]
    pub self_: Link,
}

/// The organization folder created or updated by a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgFolder {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(rename = "_links")]
    pub links: FolderLinks,
}

impl OrgFolder {
    /// REST href used to recognise events about this folder.
    pub fn self_href(&self) -> &str {
        &self.links.self_.href
    }

    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.name)
    }
}

/// Server-sent job event. Every field is optional: payloads are known to
/// arrive partially filled when the server is rate limited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    #[serde(default)]
    pub blueocean_job_rest_url: Option<String>,
    #[serde(default)]
    pub jenkins_event: Option<String>,
    #[serde(default)]
    pub job_multibranch_indexing_result: Option<String>,
}

impl JobEvent {
    pub fn targets(&self, folder: &OrgFolder) -> bool {
        self.blueocean_job_rest_url.as_deref() == Some(folder.self_href())
    }

    pub fn is_queue_task_complete(&self) -> bool {
        self.jenkins_event.as_deref() == Some(QUEUE_TASK_COMPLETE)
    }
}
