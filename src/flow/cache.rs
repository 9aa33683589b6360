use indexmap::IndexMap;
use log::debug;

use super::types::Repository;
use crate::error::{FlowError, Result};

/// Repositories fetched for one organization.
#[derive(Debug, Clone, Default)]
struct CachedRepositories {
    repositories: Vec<Repository>,
    /// Every page has been fetched.
    complete: bool,
}

/// Repository cache keyed by organization name.
///
/// An entry is refreshed after every page while pagination runs and marked
/// complete after the last page. Complete entries are authoritative for the
/// rest of the session and are never refetched.
#[derive(Debug, Default)]
pub struct RepositoryCache {
    organizations: IndexMap<String, CachedRepositories>,
}

impl RepositoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the entry for `org` with the repositories gathered so far.
    pub fn update(&mut self, org: &str, repositories: &[Repository]) {
        let entry = self.organizations.entry(org.to_string()).or_default();
        entry.repositories = repositories.to_vec();
        entry.complete = false;
        debug!("Cached {} repositories for {org}", repositories.len());
    }

    pub fn mark_complete(&mut self, org: &str) {
        if let Some(entry) = self.organizations.get_mut(org) {
            entry.complete = true;
        }
    }

    #[cfg(test)]
    pub fn is_complete(&self, org: &str) -> bool {
        self.organizations
            .get(org)
            .is_some_and(|entry| entry.complete)
    }

    /// Every cached repository for `org`, complete or not.
    #[cfg(test)]
    pub fn get(&self, org: &str) -> Option<&[Repository]> {
        self.organizations
            .get(org)
            .map(|entry| entry.repositories.as_slice())
    }

    /// Fully paginated repositories for `org`; `None` while pagination is unfinished.
    pub fn get_complete(&self, org: &str) -> Option<&[Repository]> {
        self.organizations
            .get(org)
            .filter(|entry| entry.complete)
            .map(|entry| entry.repositories.as_slice())
    }

    /// Names of the repositories already scanned by an org folder, in cache
    /// order. Only a fully paginated entry can answer this.
    pub fn scanned_names(&self, org: &str) -> Result<Vec<String>> {
        let repositories = self.get_complete(org).ok_or_else(|| {
            FlowError::InvalidState(format!("repositories for {org} are not fully loaded"))
        })?;

        Ok(repositories
            .iter()
            .filter(|repo| repo.pipeline_created)
            .map(|repo| repo.name.clone())
            .collect())
    }

    pub fn len(&self) -> usize {
        self.organizations.len()
    }
}
