use serde::{Deserialize, Serialize};

use crate::flow::{Credential, RepositoryPage};

pub const CREATE_REQUEST_CLASS: &str =
    "io.jenkins.blueocean.blueocean_github_pipeline.GithubPipelineCreateRequest";
pub const UPDATE_REQUEST_CLASS: &str =
    "io.jenkins.blueocean.blueocean_github_pipeline.GithubPipelineUpdateRequest";

/// Response of `GET scm/github/`.
#[derive(Debug, Deserialize)]
pub struct ScmInfo {
    #[serde(rename = "credentialId", default)]
    credential_id: Option<String>,
}

impl ScmInfo {
    pub fn credential(self) -> Option<Credential> {
        self.credential_id
            .filter(|id| !id.is_empty())
            .map(Credential::new)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenRequest<'a> {
    pub access_token: &'a str,
}

/// Response of `GET scm/github/organizations/{org}/repositories/`.
#[derive(Debug, Deserialize)]
pub struct RepositoriesResponse {
    pub repositories: RepositoryPage,
}

/// Body of the org folder create (`POST pipelines/`) and update
/// (`PUT pipelines/{org}/`) calls.
#[derive(Debug, Serialize)]
pub struct OrgFolderRequest<'a> {
    name: &'a str,
    #[serde(rename = "$class")]
    class: &'a str,
    #[serde(rename = "scmConfig")]
    scm_config: ScmConfig<'a>,
}

#[derive(Debug, Serialize)]
struct ScmConfig<'a> {
    #[serde(rename = "credentialId")]
    credential_id: &'a str,
    uri: &'a str,
    config: OrgConfig<'a>,
}

#[derive(Debug, Serialize)]
struct OrgConfig<'a> {
    #[serde(rename = "orgName")]
    org_name: &'a str,
    /// Omitted to scan every repository.
    #[serde(skip_serializing_if = "Option::is_none")]
    repos: Option<&'a [String]>,
}

impl<'a> OrgFolderRequest<'a> {
    pub fn new(
        class: &'a str,
        org_name: &'a str,
        credential_id: &'a str,
        api_url: &'a str,
        repos: Option<&'a [String]>,
    ) -> Self {
        Self {
            name: org_name,
            class,
            scm_config: ScmConfig {
                credential_id,
                uri: api_url,
                config: OrgConfig { org_name, repos },
            },
        }
    }
}
