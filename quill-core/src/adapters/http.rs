//! HTTP clients for the search index and the newsletter provider
//!
//! Both clients are optional: built without an endpoint they are disabled
//! and every call reports `CallOutcome::Skipped`.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::{Error as DomainError, Result as DomainResult};
use crate::ports::{CallOutcome, Newsletter, NewsletterSubscription, SearchIndex, UserDocument};

const REQUEST_TIMEOUT_SECS: u64 = 30;

fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .context("Failed to create HTTP client")
}

fn map_request_error(service: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        anyhow::anyhow!(
            "{} request timed out after {} seconds",
            service,
            REQUEST_TIMEOUT_SECS
        )
    } else if error.is_connect() {
        anyhow::anyhow!("Unable to connect to {}", service)
    } else {
        anyhow::anyhow!("{} request failed: {}", service, error)
    }
}

fn check_response_status(service: &str, response: reqwest::blocking::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        anyhow::bail!("{} returned HTTP {}", service, status)
    }
    anyhow::bail!("{} returned HTTP {}: {}", service, status, body)
}

fn to_domain(err: anyhow::Error) -> DomainError {
    DomainError::Collaborator(format!("{:#}", err))
}

fn normalize_base_url(url: Option<&str>) -> Option<String> {
    url.map(str::trim)
        .filter(|u| !u.is_empty())
        .map(|u| u.trim_end_matches('/').to_string())
}

// =============================================================================
// Search index
// =============================================================================

/// Search index reached over HTTP.
///
/// `POST {base}/users` upserts a document, `DELETE {base}/users/{id}`
/// removes it.
#[derive(Debug)]
pub struct HttpSearchIndex {
    client: Client,
    base_url: Option<String>,
}

impl HttpSearchIndex {
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: normalize_base_url(base_url),
        })
    }

    /// A client that never sends anything
    pub fn disabled() -> Result<Self> {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }

    fn upsert(&self, base_url: &str, doc: &UserDocument) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/users", base_url))
            .json(doc)
            .send()
            .map_err(|e| map_request_error("Search index", e))?;
        check_response_status("Search index", response)
    }

    fn remove(&self, base_url: &str, user_id: Uuid) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/users/{}", base_url, user_id))
            .send()
            .map_err(|e| map_request_error("Search index", e))?;
        // Removing a document that was never indexed is fine
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_response_status("Search index", response)
    }
}

impl SearchIndex for HttpSearchIndex {
    fn upsert_user(&self, doc: &UserDocument) -> DomainResult<CallOutcome> {
        let Some(base_url) = &self.base_url else {
            return Ok(CallOutcome::Skipped);
        };
        self.upsert(base_url, doc).map_err(to_domain)?;
        Ok(CallOutcome::Delivered)
    }

    fn remove_user(&self, user_id: Uuid) -> DomainResult<CallOutcome> {
        let Some(base_url) = &self.base_url else {
            return Ok(CallOutcome::Skipped);
        };
        self.remove(base_url, user_id).map_err(to_domain)?;
        Ok(CallOutcome::Delivered)
    }
}

// =============================================================================
// Newsletter
// =============================================================================

#[derive(Debug, Serialize)]
struct SubscribeRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    list_id: Option<&'a str>,
    email: &'a str,
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

/// Mailing-list provider reached over HTTP (`POST {url}`)
#[derive(Debug)]
pub struct HttpNewsletter {
    client: Client,
    url: Option<String>,
    list_id: Option<String>,
}

impl HttpNewsletter {
    pub fn new(url: Option<&str>, list_id: Option<&str>) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            url: normalize_base_url(url),
            list_id: list_id.map(str::to_string),
        })
    }

    pub fn disabled() -> Result<Self> {
        Self::new(None, None)
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    fn send(&self, url: &str, subscription: &NewsletterSubscription) -> Result<()> {
        let body = SubscribeRequest {
            list_id: self.list_id.as_deref(),
            email: &subscription.email,
            username: &subscription.username,
            name: subscription.name.as_deref(),
        };
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .map_err(|e| map_request_error("Newsletter", e))?;
        check_response_status("Newsletter", response)
    }
}

impl Newsletter for HttpNewsletter {
    fn subscribe(&self, subscription: &NewsletterSubscription) -> DomainResult<CallOutcome> {
        let Some(url) = &self.url else {
            return Ok(CallOutcome::Skipped);
        };
        self.send(url, subscription).map_err(to_domain)?;
        Ok(CallOutcome::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_url_disables_client() {
        let index = HttpSearchIndex::new(Some("   ")).unwrap();
        assert!(!index.is_enabled());

        let newsletter = HttpNewsletter::new(Some(""), Some("weekly")).unwrap();
        assert!(!newsletter.is_enabled());
    }

    #[test]
    fn test_disabled_clients_skip() {
        let index = HttpSearchIndex::disabled().unwrap();
        let doc = UserDocument {
            id: Uuid::new_v4(),
            username: "ben".to_string(),
            name: None,
            summary: None,
            profile_image_url: None,
        };
        assert_eq!(index.upsert_user(&doc).unwrap(), CallOutcome::Skipped);
        assert_eq!(index.remove_user(doc.id).unwrap(), CallOutcome::Skipped);

        let newsletter = HttpNewsletter::disabled().unwrap();
        let sub = NewsletterSubscription {
            email: "ben@example.com".to_string(),
            username: "ben".to_string(),
            name: None,
        };
        assert_eq!(newsletter.subscribe(&sub).unwrap(), CallOutcome::Skipped);
    }

    #[test]
    fn test_unreachable_endpoint_is_collaborator_error() {
        // Port 9 (discard) on localhost is closed in test environments
        let index = HttpSearchIndex::new(Some("http://127.0.0.1:9/")).unwrap();
        let err = index.remove_user(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, DomainError::Collaborator(_)));
    }

    #[test]
    fn test_subscribe_request_shape() {
        let body = SubscribeRequest {
            list_id: None,
            email: "ben@example.com",
            username: "ben",
            name: Some("Ben"),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("list_id").is_none());
        assert_eq!(json["name"], "Ben");
    }
}
