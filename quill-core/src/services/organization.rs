//! Organization service

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::Organization;
use crate::ports::Repository;

pub struct OrganizationService {
    repository: Arc<dyn Repository>,
}

impl OrganizationService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Create an organization. Its slug follows the username rules and must
    /// not collide with any username or other slug.
    pub fn create(&self, name: &str, slug: &str) -> Result<Organization> {
        let org = Organization::new(Uuid::new_v4(), name.trim(), slug.trim());

        let mut errors = org.validate();
        if !errors.has("slug") && self.repository.namespace_owner(&org.slug)?.is_some() {
            errors.add("slug", "has already been taken");
        }
        errors.into_result()?;

        self.repository
            .create_organization(&org)
            .map_err(|e| match e {
                Error::Conflict(_) => Error::invalid("slug", "has already been taken"),
                other => other,
            })?;
        Ok(org)
    }

    pub fn list(&self) -> Result<Vec<Organization>> {
        self.repository.list_organizations()
    }

    pub fn find_by_slug(&self, slug: &str) -> Result<Option<Organization>> {
        self.repository.find_organization_by_slug(slug.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbRepository;
    use crate::domain::User;

    fn setup() -> (Arc<DuckDbRepository>, OrganizationService) {
        let repo = DuckDbRepository::in_memory().unwrap();
        repo.ensure_schema().unwrap();
        let repo = Arc::new(repo);
        (repo.clone(), OrganizationService::new(repo))
    }

    #[test]
    fn test_create_and_find() {
        let (_repo, service) = setup();
        let org = service.create("Acme Corp", "acme").unwrap();

        let found = service.find_by_slug("ACME").unwrap().unwrap();
        assert_eq!(found.id, org.id);
        assert_eq!(service.list().unwrap().len(), 1);
    }

    #[test]
    fn test_slug_taken_by_user() {
        let (repo, service) = setup();
        repo.create_user(&User::new(Uuid::new_v4(), "ben")).unwrap();

        let err = service.create("Ben Inc", "Ben").unwrap_err();
        assert!(err.validation_errors().unwrap().has("slug"));
    }

    #[test]
    fn test_invalid_slug() {
        let (_repo, service) = setup();
        let err = service.create("", "a.b").unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors.has("slug"));
        assert!(errors.has("name"));
    }
}
