use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::auth::Token;
use crate::error::{FlowError, Result};
use crate::flow::{Credential, OrgFolder, Organization, RepositoryPage};
use crate::providers::{CreationApi, CredentialStore};

use super::types::{
    AccessTokenRequest, CREATE_REQUEST_CLASS, OrgFolderRequest, RepositoriesResponse, ScmInfo,
    UPDATE_REQUEST_CLASS,
};

const USER_AGENT: &str = concat!("orgflow/", env!("CARGO_PKG_VERSION"));

/// Blue Ocean REST client for the GitHub creation endpoints.
pub struct JenkinsClient {
    client: Client,
    /// `{base}/blue/rest/organizations/{organization}/`
    organization_url: Url,
    github_api_url: String,
    username: Option<String>,
    api_token: Option<Token>,
}

impl JenkinsClient {
    /// Creates a client for the Jenkins instance at `base_url`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Jenkins root URL (e.g., <http://localhost:8080/jenkins>)
    /// * `organization` - Blue Ocean organization, `jenkins` on a stock install
    /// * `github_api_url` - GitHub (Enterprise) API URL the credential belongs to
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the URL is invalid.
    pub fn new(base_url: &str, organization: &str, github_api_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FlowError::Config(format!("Failed to create HTTP client: {e}")))?;

        let mut base = Url::parse(base_url)
            .map_err(|e| FlowError::Config(format!("Invalid Jenkins URL: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let organization_url = base
            .join("blue/rest/organizations/")
            .and_then(|url| url.join(&format!("{organization}/")))
            .map_err(|e| FlowError::Config(format!("Invalid organization URL: {e}")))?;

        Ok(Self {
            client,
            organization_url,
            github_api_url: github_api_url.to_string(),
            username: None,
            api_token: None,
        })
    }

    /// Authenticates every request as `username` with a Jenkins API token.
    pub fn with_basic_auth(mut self, username: String, api_token: Token) -> Self {
        self.username = Some(username);
        self.api_token = Some(api_token);
        self
    }

    pub fn organization_url(&self) -> &Url {
        &self.organization_url
    }

    /// Authenticated GET for endpoints outside the REST tree (e.g. the SSE gateway).
    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.auth_request(self.client.get(url))
    }

    fn auth_request(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.username, &self.api_token) {
            (Some(user), Some(token)) => request.basic_auth(user, Some(token.as_str())),
            _ => request,
        }
    }

    /// Builds `{organization_url}/{segments...}/` with each segment escaped.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.organization_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| FlowError::Config("Jenkins URL cannot be a base".to_string()))?;
            path.pop_if_empty();
            path.extend(segments);
            path.push("");
        }
        Ok(url)
    }

    async fn send<T, B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        debug!("{method} {url}");
        let mut request = self.auth_request(self.client.request(method, url));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(FlowError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        Ok(response.json().await?)
    }

    fn org_folder_request<'a>(
        &'a self,
        class: &'a str,
        credential: &'a Credential,
        organization: &'a Organization,
        repositories: Option<&'a [String]>,
    ) -> OrgFolderRequest<'a> {
        OrgFolderRequest::new(
            class,
            &organization.name,
            &credential.credential_id,
            &self.github_api_url,
            repositories,
        )
    }
}

#[async_trait]
impl CredentialStore for JenkinsClient {
    async fn find_existing_credential(&self) -> Result<Option<Credential>> {
        let mut url = self.endpoint(&["scm", "github"])?;
        url.query_pairs_mut()
            .append_pair("apiUrl", &self.github_api_url);

        let scm: ScmInfo = self.send(Method::GET, url, None::<&()>).await?;
        Ok(scm.credential())
    }

    async fn create_access_token(&self, token: &Token) -> Result<Credential> {
        let mut url = self.endpoint(&["scm", "github", "validate"])?;
        url.query_pairs_mut()
            .append_pair("apiUrl", &self.github_api_url);

        let body = AccessTokenRequest {
            access_token: token.as_str(),
        };
        self.send(Method::PUT, url, Some(&body)).await
    }
}

#[async_trait]
impl CreationApi for JenkinsClient {
    async fn list_organizations(&self, credential: &Credential) -> Result<Vec<Organization>> {
        let mut url = self.endpoint(&["scm", "github", "organizations"])?;
        url.query_pairs_mut()
            .append_pair("credentialId", &credential.credential_id)
            .append_pair("apiUrl", &self.github_api_url);

        self.send(Method::GET, url, None::<&()>).await
    }

    async fn list_repositories(
        &self,
        credential: &Credential,
        organization: &str,
        page_number: u32,
        page_size: u32,
    ) -> Result<RepositoryPage> {
        let mut url = self.endpoint(&[
            "scm",
            "github",
            "organizations",
            organization,
            "repositories",
        ])?;
        url.query_pairs_mut()
            .append_pair("credentialId", &credential.credential_id)
            .append_pair("pageNumber", &page_number.to_string())
            .append_pair("pageSize", &page_size.to_string())
            .append_pair("apiUrl", &self.github_api_url);

        let response: RepositoriesResponse = self.send(Method::GET, url, None::<&()>).await?;
        Ok(response.repositories)
    }

    async fn create_org_folder(
        &self,
        credential: &Credential,
        organization: &Organization,
        repositories: Option<&[String]>,
    ) -> Result<OrgFolder> {
        let url = self.endpoint(&["pipelines"])?;
        let body =
            self.org_folder_request(CREATE_REQUEST_CLASS, credential, organization, repositories);
        self.send(Method::POST, url, Some(&body)).await
    }

    async fn update_org_folder(
        &self,
        credential: &Credential,
        organization: &Organization,
        repositories: Option<&[String]>,
    ) -> Result<OrgFolder> {
        let url = self.endpoint(&["pipelines", &organization.name])?;
        let body =
            self.org_folder_request(UPDATE_REQUEST_CLASS, credential, organization, repositories);
        self.send(Method::PUT, url, Some(&body)).await
    }
}
