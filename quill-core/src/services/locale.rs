//! Default-language estimation for new users

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Provider, User};
use crate::ports::Repository;

pub struct LocaleService {
    repository: Arc<dyn Repository>,
}

impl LocaleService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Estimate and store the user's default language.
    ///
    /// A `.jp` email means Japanese. Otherwise the `lang` reported by a
    /// linked Twitter account is used. Anything else leaves the estimate empty.
    pub fn estimate_default_language(&self, user_id: Uuid) -> Result<Option<String>> {
        let mut user = self
            .repository
            .get_user(user_id)?
            .ok_or_else(|| Error::not_found(format!("User {}", user_id)))?;

        let estimate = self.estimate(&user)?;
        if estimate != user.estimated_default_language {
            user.estimated_default_language = estimate.clone();
            self.repository.update_user(&user)?;
        }
        Ok(estimate)
    }

    fn estimate(&self, user: &User) -> Result<Option<String>> {
        if let Some(email) = &user.email {
            if email.trim().to_lowercase().ends_with(".jp") {
                return Ok(Some("ja".to_string()));
            }
        }

        let identities = self.repository.identities_for_user(user.id)?;
        Ok(identities
            .iter()
            .find(|i| i.provider == Provider::Twitter)
            .and_then(|i| i.raw_info_str("lang"))
            .map(|lang| lang.trim().to_string())
            .filter(|lang| !lang.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbRepository;
    use crate::domain::{AuthPayload, Identity};
    use serde_json::json;

    fn setup() -> (Arc<DuckDbRepository>, LocaleService) {
        let repo = DuckDbRepository::in_memory().unwrap();
        repo.ensure_schema().unwrap();
        let repo = Arc::new(repo);
        let service = LocaleService::new(repo.clone());
        (repo, service)
    }

    #[test]
    fn test_no_signal_gives_none() {
        let (repo, service) = setup();
        let user = User::new(Uuid::new_v4(), "ben");
        repo.create_user(&user).unwrap();

        assert_eq!(service.estimate_default_language(user.id).unwrap(), None);
    }

    #[test]
    fn test_jp_email_gives_japanese() {
        let (repo, service) = setup();
        let mut user = User::new(Uuid::new_v4(), "ben");
        user.email = Some("ben@hello.jp".to_string());
        repo.create_user(&user).unwrap();

        assert_eq!(
            service.estimate_default_language(user.id).unwrap().as_deref(),
            Some("ja")
        );
        let stored = repo.get_user(user.id).unwrap().unwrap();
        assert_eq!(stored.estimated_default_language.as_deref(), Some("ja"));
    }

    #[test]
    fn test_twitter_lang_from_dump() {
        let (repo, service) = setup();
        let user = User::new(Uuid::new_v4(), "ben");
        let mut payload = AuthPayload::new(Provider::Twitter, "123");
        payload.extra.raw_info = json!({"lang": "pt"});
        let identity = Identity::from_payload(user.id, &payload).unwrap();
        repo.create_user_with_identity(&user, &identity).unwrap();

        assert_eq!(
            service.estimate_default_language(user.id).unwrap().as_deref(),
            Some("pt")
        );
    }

    #[test]
    fn test_github_dump_is_ignored() {
        let (repo, service) = setup();
        let user = User::new(Uuid::new_v4(), "ben");
        let mut payload = AuthPayload::new(Provider::Github, "123");
        payload.extra.raw_info = json!({"lang": "de"});
        let identity = Identity::from_payload(user.id, &payload).unwrap();
        repo.create_user_with_identity(&user, &identity).unwrap();

        assert_eq!(service.estimate_default_language(user.id).unwrap(), None);
    }

    #[test]
    fn test_missing_user() {
        let (_repo, service) = setup();
        let err = service.estimate_default_language(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
